use taborg_config::Preferences;
use taborg_core::{ActionStatus, ModelAction, Notification, Notifier, Outcome, SkipReason};

/// Shows notifications as console lines
#[derive(Clone, Default)]
pub struct ConsoleNotifier;

impl ConsoleNotifier {
    pub fn new() -> Self {
        ConsoleNotifier
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) {
        println!("[{}] {}", notification.title, notification.message);
    }
}

/// One line per model action, describing what happened to it
pub fn describe_outcome(outcome: &Outcome) -> Vec<String> {
    let report = match outcome {
        Outcome::NothingToDo => return Vec::new(),
        Outcome::Organized(report) => report,
    };

    let mut lines = Vec::new();
    if !report.ungrouped.is_empty() {
        lines.push(format!("ungrouped {} tabs", report.ungrouped.len()));
    }
    if let Some(error) = &report.ungroup_error {
        lines.push(format!("could not ungroup tabs: {}", error));
    }

    for outcome in &report.outcomes {
        let target = match &outcome.action {
            ModelAction::CreateGroup { name, .. } => format!("new group '{}'", name),
            ModelAction::AddToExistingGroup { group_id, .. } => format!("group {}", group_id),
        };
        let line = match &outcome.status {
            ActionStatus::Applied {
                tab_ids,
                color: Some(color),
                ..
            } => format!("{}: {} tabs, {}", target, tab_ids.len(), color),
            ActionStatus::Applied { tab_ids, .. } => {
                format!("{}: added {} tabs", target, tab_ids.len())
            }
            ActionStatus::Skipped(SkipReason::UnknownGroup(_)) => {
                format!("{}: skipped, no such group", target)
            }
            ActionStatus::Skipped(SkipReason::NoEligibleTabs) => {
                format!("{}: skipped, no usable tabs", target)
            }
            ActionStatus::Failed(error) => format!("{}: failed ({})", target, error),
        };
        lines.push(line);
    }

    for rejected in &report.rejected {
        lines.push(format!("ignored model item #{}: {}", rejected.index, rejected.reason));
    }
    lines
}

/// Preferences for display, with the key masked
pub fn describe_preferences(preferences: &Preferences) -> Vec<String> {
    let key = match preferences.api_key() {
        Some(key) => mask_key(key),
        None => "(not set)".to_string(),
    };
    vec![
        format!("geminiApiKey:   {}", key),
        format!("organizeOption: {}", preferences.organize_option),
    ]
}

fn mask_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), tail)
}
