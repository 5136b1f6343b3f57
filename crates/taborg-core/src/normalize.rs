//! Turn the model's free-form answer into typed grouping actions.
//!
//! The answer is expected to be a JSON array, possibly wrapped in a markdown
//! code fence. Two element shapes are understood:
//!
//! - `{"action": "create_new", "group": "...", "tabIds": [..]}` and the older
//!   `{"group": "...", "tabIds": [..]}` without an `action` field
//! - `{"action": "add_to_existing", "groupId": 12, "tabIds": [..]}`
//!
//! Elements that fit neither are rejected one by one; only an answer that is
//! not a JSON array at all fails the run.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use taborg_browser::{GroupId, TabId};
use tracing::{debug, warn};

use crate::error::OrganizeError;

static FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)```(?:json)?\s*([\s\S]*?)\s*```").expect("fence regex is valid")
});

const ACTION_CREATE: &str = "create_new";
const ACTION_ADD: &str = "add_to_existing";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelAction {
    CreateGroup { name: String, tab_ids: Vec<TabId> },
    AddToExistingGroup { group_id: GroupId, tab_ids: Vec<TabId> },
}

/// An array element that could not be used
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidAction {
    /// Position in the model's array
    pub index: usize,
    pub reason: String,
    pub raw: Value,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedResponse {
    /// Usable actions, in the order the model gave them
    pub actions: Vec<ModelAction>,
    pub rejected: Vec<InvalidAction>,
}

/// The fenced block's content if there is one, else the whole text
pub fn strip_fence(raw: &str) -> &str {
    match FENCE_RE.captures(raw).and_then(|caps| caps.get(1)) {
        Some(inner) => inner.as_str().trim(),
        None => raw,
    }
}

pub fn normalize(raw: &str) -> Result<NormalizedResponse, OrganizeError> {
    let cleaned = strip_fence(raw);
    debug!("Cleaned model text for parsing: {}", cleaned);

    let value: Value = serde_json::from_str(cleaned).map_err(|e| {
        OrganizeError::MalformedResponse(format!("response is not valid JSON: {}", e))
    })?;

    let elements = match value {
        Value::Array(elements) => elements,
        other => {
            return Err(OrganizeError::MalformedResponse(format!(
                "Expected JSON array response but received: {}",
                json_type_name(&other)
            )))
        }
    };

    let mut response = NormalizedResponse::default();
    for (index, element) in elements.into_iter().enumerate() {
        match parse_action(&element) {
            Ok(action) => response.actions.push(action),
            Err(reason) => {
                warn!("Skipping invalid group data at index {}: {} ({})", index, reason, element);
                response.rejected.push(InvalidAction {
                    index,
                    reason,
                    raw: element,
                });
            }
        }
    }

    Ok(response)
}

/// Recognized shapes: `action` is `"create_new"` or `"add_to_existing"`, or
/// `action` is absent and `group` is present (legacy create). Any other
/// `action` value is rejected even when a `group` field is present.
fn parse_action(element: &Value) -> Result<ModelAction, String> {
    let object = element
        .as_object()
        .ok_or_else(|| format!("expected an object, got {}", json_type_name(element)))?;

    match object.get("action") {
        Some(Value::String(action)) if action == ACTION_CREATE => parse_create(object),
        Some(Value::String(action)) if action == ACTION_ADD => parse_add(object),
        Some(other) => Err(format!("unknown action {}", other)),
        None if object.contains_key("group") => parse_create(object),
        None => Err("missing \"action\" and \"group\" fields".to_string()),
    }
}

fn parse_create(object: &Map<String, Value>) -> Result<ModelAction, String> {
    let name = match object.get("group") {
        Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Value::String(_)) => return Err("group name is empty".to_string()),
        Some(other) => return Err(format!("group name must be a string, got {}", json_type_name(other))),
        None => return Err("missing \"group\" name".to_string()),
    };
    let tab_ids = parse_tab_ids(object)?;
    Ok(ModelAction::CreateGroup { name, tab_ids })
}

fn parse_add(object: &Map<String, Value>) -> Result<ModelAction, String> {
    let group_id = object
        .get("groupId")
        .and_then(Value::as_i64)
        .ok_or_else(|| "\"groupId\" must be an integer".to_string())?;
    let tab_ids = parse_tab_ids(object)?;
    Ok(ModelAction::AddToExistingGroup { group_id, tab_ids })
}

fn parse_tab_ids(object: &Map<String, Value>) -> Result<Vec<TabId>, String> {
    let ids = object
        .get("tabIds")
        .and_then(Value::as_array)
        .ok_or_else(|| "\"tabIds\" must be an array".to_string())?;
    if ids.is_empty() {
        return Err("\"tabIds\" is empty".to_string());
    }
    ids.iter()
        .map(|id| {
            id.as_i64()
                .ok_or_else(|| format!("tab id {} is not an integer", id))
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
