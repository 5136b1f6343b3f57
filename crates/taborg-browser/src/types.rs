use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque browser-assigned tab id, unique within a session
pub type TabId = i64;

/// Opaque browser-assigned tab group id
pub type GroupId = i64;

/// The browser's "not in a group" value on the wire
pub const TAB_GROUP_ID_NONE: GroupId = -1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    pub id: TabId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default, with = "group_id_sentinel")]
    pub group_id: Option<GroupId>,
}

impl Tab {
    pub fn new(id: TabId, title: &str, url: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            url: url.to_string(),
            group_id: None,
        }
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn is_grouped(&self) -> bool {
        self.group_id.is_some()
    }
}

/// A group as the browser reports it: no member list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub color: GroupColor,
}

/// A group together with the tabs that currently belong to it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabGroup {
    pub id: GroupId,
    pub title: String,
    pub color: GroupColor,
    pub tab_ids: Vec<TabId>,
}

impl TabGroup {
    /// Attach the members of `info` found in `tabs`
    pub fn from_info(info: &GroupInfo, tabs: &[Tab]) -> Self {
        Self {
            id: info.id,
            title: info.title.clone(),
            color: info.color,
            tab_ids: tabs
                .iter()
                .filter(|tab| tab.group_id == Some(info.id))
                .map(|tab| tab.id)
                .collect(),
        }
    }
}

/// Tab group colors, declared in palette order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    #[default]
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

impl GroupColor {
    /// Round-robin order used for newly created groups
    pub const PALETTE: [GroupColor; 9] = [
        GroupColor::Grey,
        GroupColor::Blue,
        GroupColor::Red,
        GroupColor::Yellow,
        GroupColor::Green,
        GroupColor::Pink,
        GroupColor::Purple,
        GroupColor::Cyan,
        GroupColor::Orange,
    ];

    /// `PALETTE[index mod 9]`
    pub fn from_palette(index: usize) -> Self {
        Self::PALETTE[index % Self::PALETTE.len()]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
            GroupColor::Orange => "orange",
        }
    }
}

impl fmt::Display for GroupColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Option<GroupId>` <-> the browser's `-1` sentinel
mod group_id_sentinel {
    use super::{GroupId, TAB_GROUP_ID_NONE};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<GroupId>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.unwrap_or(TAB_GROUP_ID_NONE))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<GroupId>, D::Error> {
        let raw = Option::<GroupId>::deserialize(deserializer)?;
        Ok(raw.filter(|id| *id != TAB_GROUP_ID_NONE))
    }
}
