use serde::Serialize;

const APP_TITLE: &str = "Tab Organizer";

/// A user-facing notification (title and one-line message)
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(title: &str, message: &str) -> Self {
        Self {
            title: title.to_string(),
            message: message.to_string(),
        }
    }

    pub fn missing_api_key() -> Self {
        Self::new(APP_TITLE, "Please set your Gemini API key in Options.")
    }

    pub fn success() -> Self {
        Self::new(APP_TITLE, "Tabs organized successfully!")
    }

    pub fn nothing_to_do() -> Self {
        Self::new(APP_TITLE, "No tabs to organize.")
    }

    /// A run that failed as a whole
    pub fn run_failed(message: &str) -> Self {
        Self::new("Error", message)
    }

    /// One new group could not be created; the rest of the run went on
    pub fn group_failed(name: &str) -> Self {
        Self::new(
            "Grouping Error",
            &format!("Could not create group '{}'. Check console for details.", name),
        )
    }
}

/// Where notifications are shown.
/// Implementations decide how (desktop toast, console line, test log).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Drops every notification
pub struct NullNotifier;

impl Notifier for NullNotifier {
    fn notify(&self, _notification: &Notification) {}
}
