use serde_json::Value;

use crate::snapshot::OrganizeMode;

/// Message action the popup sends to start a run
pub const ORGANIZE_ACTION: &str = "organizeTabs";

/// What started an organize run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Popup button: the mode comes with the message
    Message { regroup_all: bool },
    /// Keyboard shortcut: the mode comes from the stored preference
    Shortcut,
}

impl Trigger {
    /// Parse `{"action": "organizeTabs", "regroupAll": bool}`.
    ///
    /// Messages with any other `action` are not triggers. A missing or
    /// non-boolean `regroupAll` means "new tabs only".
    pub fn from_message(message: &Value) -> Option<Self> {
        if message.get("action").and_then(Value::as_str) != Some(ORGANIZE_ACTION) {
            return None;
        }
        let regroup_all = message
            .get("regroupAll")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        Some(Trigger::Message { regroup_all })
    }

    /// The mode carried by the trigger itself, if any
    pub fn explicit_mode(&self) -> Option<OrganizeMode> {
        match self {
            Trigger::Message { regroup_all } => Some(OrganizeMode::from_regroup_all(*regroup_all)),
            Trigger::Shortcut => None,
        }
    }
}
