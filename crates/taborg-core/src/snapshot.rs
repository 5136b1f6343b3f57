//! Read-only view of the window taken at the start of a run.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use taborg_browser::{GroupId, Tab, TabGroup, TabHost};
use taborg_config::OrganizeOption;
use tracing::{debug, warn};

/// Which tabs a run is allowed to (re)organize
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrganizeMode {
    /// Only ungrouped tabs; existing groups are kept and may be extended
    NewOnly,
    /// Every tab; existing groups are dissolved before regrouping
    RegroupAll,
}

impl OrganizeMode {
    pub fn from_regroup_all(regroup_all: bool) -> Self {
        if regroup_all {
            OrganizeMode::RegroupAll
        } else {
            OrganizeMode::NewOnly
        }
    }
}

impl From<OrganizeOption> for OrganizeMode {
    fn from(option: OrganizeOption) -> Self {
        match option {
            OrganizeOption::New => OrganizeMode::NewOnly,
            OrganizeOption::All => OrganizeMode::RegroupAll,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub mode: OrganizeMode,
    pub tabs: Vec<Tab>,
    /// Always empty for `RegroupAll`
    pub existing_groups: Vec<TabGroup>,
}

impl Snapshot {
    /// Tabs the model is asked about
    pub fn eligible_tabs(&self) -> Vec<Tab> {
        self.tabs
            .iter()
            .filter(|tab| match self.mode {
                OrganizeMode::RegroupAll => true,
                OrganizeMode::NewOnly => !tab.is_grouped(),
            })
            .cloned()
            .collect()
    }

    pub fn has_eligible_tabs(&self) -> bool {
        match self.mode {
            OrganizeMode::RegroupAll => !self.tabs.is_empty(),
            OrganizeMode::NewOnly => self.tabs.iter().any(|tab| !tab.is_grouped()),
        }
    }

    /// Whether `group_id` was an existing group when the snapshot was taken
    pub fn knows_group(&self, group_id: GroupId) -> bool {
        self.existing_groups.iter().any(|group| group.id == group_id)
    }
}

/// Query the window's tabs, plus its groups in `NewOnly` mode.
///
/// A failing group query degrades to "no existing groups" so the run falls
/// back to fresh grouping. A failing tab query is returned as an error.
pub async fn read_snapshot(host: &dyn TabHost, mode: OrganizeMode) -> Result<Snapshot> {
    let tabs = host.query_tabs().await?;

    let existing_groups = match mode {
        OrganizeMode::RegroupAll => Vec::new(),
        OrganizeMode::NewOnly => match host.query_groups().await {
            Ok(groups) => groups
                .iter()
                .map(|info| TabGroup::from_info(info, &tabs))
                .collect(),
            Err(e) => {
                warn!("Could not query tab groups, treating window as ungrouped: {}", e);
                Vec::new()
            }
        },
    };

    debug!(
        "Snapshot: {} tabs, {} existing groups ({:?})",
        tabs.len(),
        existing_groups.len(),
        mode
    );

    Ok(Snapshot {
        mode,
        tabs,
        existing_groups,
    })
}
