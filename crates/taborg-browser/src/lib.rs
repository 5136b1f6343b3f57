pub mod memory;
pub mod types;

pub use memory::{HostCall, HostOp, MemoryTabHost, WindowState};
pub use types::*;

use anyhow::Result;
use async_trait::async_trait;

/// The browser's tab and tab-group API for the current window.
///
/// Every call may fail on its own (a tab closed a moment ago, the group was
/// removed by the user), so callers treat each one as fallible and never
/// assume an earlier query still holds.
#[async_trait]
pub trait TabHost: Send + Sync {
    /// All tabs in the current window
    async fn query_tabs(&self) -> Result<Vec<Tab>>;

    /// All tab groups in the current window (without member lists)
    async fn query_groups(&self) -> Result<Vec<GroupInfo>>;

    /// Put `tab_ids` into a brand-new group and return its id
    async fn create_group(&self, tab_ids: &[TabId]) -> Result<GroupId>;

    /// Set a group's title and color
    async fn set_group_meta(&self, group_id: GroupId, title: &str, color: GroupColor) -> Result<()>;

    /// Move `tab_ids` into an existing group
    async fn add_to_group(&self, group_id: GroupId, tab_ids: &[TabId]) -> Result<()>;

    /// Take `tab_ids` out of whatever group they are in
    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<()>;
}

#[async_trait]
impl<T: TabHost + ?Sized> TabHost for std::sync::Arc<T> {
    async fn query_tabs(&self) -> Result<Vec<Tab>> {
        (**self).query_tabs().await
    }

    async fn query_groups(&self) -> Result<Vec<GroupInfo>> {
        (**self).query_groups().await
    }

    async fn create_group(&self, tab_ids: &[TabId]) -> Result<GroupId> {
        (**self).create_group(tab_ids).await
    }

    async fn set_group_meta(&self, group_id: GroupId, title: &str, color: GroupColor) -> Result<()> {
        (**self).set_group_meta(group_id, title, color).await
    }

    async fn add_to_group(&self, group_id: GroupId, tab_ids: &[TabId]) -> Result<()> {
        (**self).add_to_group(group_id, tab_ids).await
    }

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<()> {
        (**self).ungroup(tab_ids).await
    }
}
