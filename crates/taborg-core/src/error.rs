use taborg_config::PreferenceError;
use thiserror::Error;

/// Errors that end an organize run as a whole.
///
/// Per-item problems (an unusable model action, a stale tab or group id, a
/// failed grouping call) are not errors at this level: they are recorded in
/// the run report and the batch keeps going.
#[derive(Debug, Error)]
pub enum OrganizeError {
    #[error("Gemini API key is not configured")]
    ConfigMissing,

    #[error("language model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("malformed model response: {0}")]
    MalformedResponse(String),

    #[error("could not read browser tabs: {0}")]
    Browser(String),

    #[error("could not read preferences: {0}")]
    Preferences(#[from] PreferenceError),

    #[error("an organize run is already in progress")]
    AlreadyRunning,
}
