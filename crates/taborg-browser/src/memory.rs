//! In-memory [`TabHost`] for a single browser window.
//!
//! Mirrors how the browser behaves for the calls the organizer makes:
//! moving a tab into a group takes it out of its previous one, and a group
//! left without tabs disappears. Window state can be loaded from and written
//! back to a JSON file, which is how the CLI runs against a saved window.
//!
//! Tests can inject faults per operation and can close a tab right before
//! an operation runs, to exercise the "state changed since validation" path.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

use crate::types::{GroupColor, GroupId, GroupInfo, Tab, TabId};
use crate::TabHost;

/// Serializable snapshot of one window
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowState {
    pub tabs: Vec<Tab>,
    #[serde(default)]
    pub groups: Vec<GroupInfo>,
}

impl WindowState {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read window state {}", path.display()))?;
        let state: WindowState = serde_json::from_str(&content)
            .with_context(|| format!("Invalid window state in {}", path.display()))?;
        Ok(state)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write window state {}", path.display()))?;
        Ok(())
    }

    fn tab_mut(&mut self, tab_id: TabId) -> Result<&mut Tab> {
        self.tabs
            .iter_mut()
            .find(|tab| tab.id == tab_id)
            .ok_or_else(|| anyhow::anyhow!("No tab with id: {}.", tab_id))
    }

    fn require_tabs(&self, tab_ids: &[TabId]) -> Result<()> {
        if tab_ids.is_empty() {
            anyhow::bail!("At least one tab id must be given.");
        }
        for id in tab_ids {
            if !self.tabs.iter().any(|tab| tab.id == *id) {
                anyhow::bail!("No tab with id: {}.", id);
            }
        }
        Ok(())
    }

    fn require_group(&self, group_id: GroupId) -> Result<()> {
        if !self.groups.iter().any(|group| group.id == group_id) {
            anyhow::bail!("No group with id: {}.", group_id);
        }
        Ok(())
    }

    fn next_group_id(&self) -> GroupId {
        let max_group = self.groups.iter().map(|g| g.id).max().unwrap_or(0);
        let max_tab_ref = self.tabs.iter().filter_map(|t| t.group_id).max().unwrap_or(0);
        max_group.max(max_tab_ref) + 1
    }

    fn move_tabs(&mut self, tab_ids: &[TabId], group_id: Option<GroupId>) -> Result<()> {
        for id in tab_ids {
            self.tab_mut(*id)?.group_id = group_id;
        }
        self.drop_empty_groups();
        Ok(())
    }

    fn drop_empty_groups(&mut self) {
        let tabs = &self.tabs;
        self.groups
            .retain(|group| tabs.iter().any(|tab| tab.group_id == Some(group.id)));
    }
}

/// Operations of [`TabHost`], used to target injected faults
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    QueryTabs,
    QueryGroups,
    CreateGroup,
    SetGroupMeta,
    AddToGroup,
    Ungroup,
}

/// Record of one call made against the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    QueryTabs,
    QueryGroups,
    CreateGroup { tab_ids: Vec<TabId> },
    SetGroupMeta { group_id: GroupId, title: String, color: GroupColor },
    AddToGroup { group_id: GroupId, tab_ids: Vec<TabId> },
    Ungroup { tab_ids: Vec<TabId> },
}

impl HostCall {
    /// True for calls that change window state
    pub fn is_mutation(&self) -> bool {
        !matches!(self, HostCall::QueryTabs | HostCall::QueryGroups)
    }
}

#[derive(Debug, Default)]
struct Faults {
    always: HashMap<HostOp, String>,
    once: HashMap<HostOp, VecDeque<String>>,
    close_before: HashMap<HostOp, VecDeque<TabId>>,
}

#[derive(Debug, Default)]
pub struct MemoryTabHost {
    state: Mutex<WindowState>,
    faults: Mutex<Faults>,
    calls: Mutex<Vec<HostCall>>,
}

impl MemoryTabHost {
    pub fn new(state: WindowState) -> Self {
        Self {
            state: Mutex::new(state),
            faults: Mutex::new(Faults::default()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_tabs(tabs: Vec<Tab>, groups: Vec<GroupInfo>) -> Self {
        Self::new(WindowState { tabs, groups })
    }

    /// Current window state
    pub fn state(&self) -> WindowState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn tab(&self, tab_id: TabId) -> Option<Tab> {
        self.state().tabs.into_iter().find(|tab| tab.id == tab_id)
    }

    pub fn group(&self, group_id: GroupId) -> Option<GroupInfo> {
        self.state().groups.into_iter().find(|group| group.id == group_id)
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Only the calls that changed state
    pub fn mutations(&self) -> Vec<HostCall> {
        self.calls().into_iter().filter(HostCall::is_mutation).collect()
    }

    /// Make every call of `op` fail
    pub fn fail_always(&self, op: HostOp, message: &str) {
        self.lock_faults().always.insert(op, message.to_string());
    }

    /// Make the next call of `op` fail; queued faults fire in order
    pub fn fail_next(&self, op: HostOp, message: &str) {
        self.lock_faults()
            .once
            .entry(op)
            .or_default()
            .push_back(message.to_string());
    }

    /// Remove `tab_id` from the window just before the next call of `op`
    pub fn close_tab_before(&self, op: HostOp, tab_id: TabId) {
        self.lock_faults()
            .close_before
            .entry(op)
            .or_default()
            .push_back(tab_id);
    }

    /// Close a tab now, as the user would
    pub fn close_tab(&self, tab_id: TabId) {
        let mut state = self.lock_state();
        state.tabs.retain(|tab| tab.id != tab_id);
        state.drop_empty_groups();
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_faults(&self) -> std::sync::MutexGuard<'_, Faults> {
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record the call, then apply any fault scheduled for `op`
    fn enter(&self, op: HostOp, call: HostCall) -> Result<()> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);

        let (closing, failure) = {
            let mut faults = self.lock_faults();
            let closing = faults.close_before.get_mut(&op).and_then(VecDeque::pop_front);
            let failure = faults
                .once
                .get_mut(&op)
                .and_then(VecDeque::pop_front)
                .or_else(|| faults.always.get(&op).cloned());
            (closing, failure)
        };

        if let Some(tab_id) = closing {
            debug!("Closing tab {} before {:?}", tab_id, op);
            self.close_tab(tab_id);
        }
        if let Some(message) = failure {
            anyhow::bail!(message);
        }
        Ok(())
    }
}

#[async_trait]
impl TabHost for MemoryTabHost {
    async fn query_tabs(&self) -> Result<Vec<Tab>> {
        self.enter(HostOp::QueryTabs, HostCall::QueryTabs)?;
        Ok(self.lock_state().tabs.clone())
    }

    async fn query_groups(&self) -> Result<Vec<GroupInfo>> {
        self.enter(HostOp::QueryGroups, HostCall::QueryGroups)?;
        Ok(self.lock_state().groups.clone())
    }

    async fn create_group(&self, tab_ids: &[TabId]) -> Result<GroupId> {
        self.enter(
            HostOp::CreateGroup,
            HostCall::CreateGroup { tab_ids: tab_ids.to_vec() },
        )?;

        let mut state = self.lock_state();
        state.require_tabs(tab_ids)?;
        let group_id = state.next_group_id();
        state.groups.push(GroupInfo {
            id: group_id,
            title: String::new(),
            color: GroupColor::default(),
        });
        state.move_tabs(tab_ids, Some(group_id))?;
        Ok(group_id)
    }

    async fn set_group_meta(&self, group_id: GroupId, title: &str, color: GroupColor) -> Result<()> {
        self.enter(
            HostOp::SetGroupMeta,
            HostCall::SetGroupMeta {
                group_id,
                title: title.to_string(),
                color,
            },
        )?;

        let mut state = self.lock_state();
        state.require_group(group_id)?;
        if let Some(group) = state.groups.iter_mut().find(|g| g.id == group_id) {
            group.title = title.to_string();
            group.color = color;
        }
        Ok(())
    }

    async fn add_to_group(&self, group_id: GroupId, tab_ids: &[TabId]) -> Result<()> {
        self.enter(
            HostOp::AddToGroup,
            HostCall::AddToGroup {
                group_id,
                tab_ids: tab_ids.to_vec(),
            },
        )?;

        let mut state = self.lock_state();
        state.require_group(group_id)?;
        state.require_tabs(tab_ids)?;
        state.move_tabs(tab_ids, Some(group_id))
    }

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<()> {
        self.enter(HostOp::Ungroup, HostCall::Ungroup { tab_ids: tab_ids.to_vec() })?;

        let mut state = self.lock_state();
        state.require_tabs(tab_ids)?;
        state.move_tabs(tab_ids, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn host() -> MemoryTabHost {
        MemoryTabHost::with_tabs(
            vec![
                Tab::new(1, "Docs", "https://docs.rs"),
                Tab::new(2, "News", "https://news.ycombinator.com"),
                Tab::new(3, "Mail", "https://mail.example.com").in_group(5),
            ],
            vec![GroupInfo {
                id: 5,
                title: "Work".to_string(),
                color: GroupColor::Blue,
            }],
        )
    }

    #[tokio::test]
    async fn test_create_group_moves_tabs_and_assigns_fresh_id() {
        let host = host();

        let id = host.create_group(&[1, 2]).await.unwrap();
        host.set_group_meta(id, "Reading", GroupColor::Red).await.unwrap();

        assert_eq!(id, 6);
        assert_eq!(host.tab(1).unwrap().group_id, Some(6));
        assert_eq!(host.group(6).unwrap().title, "Reading");
        assert_eq!(host.group(6).unwrap().color, GroupColor::Red);
    }

    #[tokio::test]
    async fn test_moving_last_member_removes_old_group() {
        let host = host();

        host.create_group(&[3]).await.unwrap();

        assert!(host.group(5).is_none(), "group 5 lost its only tab");
    }

    #[tokio::test]
    async fn test_ungroup_clears_membership() {
        let host = host();

        host.ungroup(&[3]).await.unwrap();

        assert_eq!(host.tab(3).unwrap().group_id, None);
        assert!(host.state().groups.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_tab_or_group_errors() {
        let host = host();

        assert!(host.create_group(&[42]).await.is_err());
        assert!(host.create_group(&[]).await.is_err());
        assert!(host.add_to_group(99, &[1]).await.is_err());
        assert!(host.set_group_meta(99, "x", GroupColor::Grey).await.is_err());
        assert_eq!(host.tab(1).unwrap().group_id, None);
    }

    #[tokio::test]
    async fn test_fail_next_fires_once() {
        let host = host();
        host.fail_next(HostOp::CreateGroup, "Tabs cannot be edited right now");

        assert!(host.create_group(&[1]).await.is_err());
        assert!(host.create_group(&[1]).await.is_ok());
    }

    #[tokio::test]
    async fn test_close_tab_before_operation() {
        let host = host();
        host.close_tab_before(HostOp::AddToGroup, 1);

        let err = host.add_to_group(5, &[1]).await.unwrap_err();

        assert!(err.to_string().contains("No tab with id: 1"));
        assert!(host.tab(1).is_none());
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let host = host();

        host.query_tabs().await.unwrap();
        host.ungroup(&[3]).await.unwrap();

        assert_eq!(host.calls().len(), 2);
        assert_eq!(host.mutations(), vec![HostCall::Ungroup { tab_ids: vec![3] }]);
    }

    #[test]
    fn test_window_state_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("window.json");
        let state = host().state();

        state.save(&path).unwrap();
        let loaded = WindowState::load(&path).unwrap();

        assert_eq!(loaded, state);
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"groupId\": -1"), "{}", raw);
    }
}
