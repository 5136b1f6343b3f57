//! Apply normalized model actions to the live window.
//!
//! Actions run strictly in model order. Before each one the live tab list is
//! queried again, because the snapshot the model saw may be stale by then:
//! tabs get closed, moved, or grouped by the user while the model thinks.
//! A failing action never stops the ones after it.

use serde::Serialize;
use std::collections::HashSet;
use taborg_browser::{GroupColor, GroupId, Tab, TabHost, TabId};
use tracing::{debug, error, info, warn};

use crate::normalize::{InvalidAction, ModelAction, NormalizedResponse};
use crate::snapshot::{OrganizeMode, Snapshot};

/// Which live tabs an action may touch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterPolicy {
    /// The tab exists and is not in any group
    Strict,
    /// The tab exists
    Permissive,
}

impl FilterPolicy {
    /// Policy for `CreateGroup` actions. `RegroupAll` dissolved every group
    /// first, so it may take any live tab. `AddToExistingGroup` is always
    /// strict.
    pub fn for_create(mode: OrganizeMode) -> Self {
        match mode {
            OrganizeMode::RegroupAll => FilterPolicy::Permissive,
            OrganizeMode::NewOnly => FilterPolicy::Strict,
        }
    }

    pub fn admits(&self, tab: &Tab) -> bool {
        match self {
            FilterPolicy::Strict => !tab.is_grouped(),
            FilterPolicy::Permissive => true,
        }
    }
}

/// Keep the requested ids the policy admits against `live`, dropping
/// duplicates and preserving the model's order.
pub fn filter_tab_ids(requested: &[TabId], live: &[Tab], policy: FilterPolicy) -> Vec<TabId> {
    let mut seen = HashSet::new();
    requested
        .iter()
        .copied()
        .filter(|id| {
            live.iter()
                .any(|tab| tab.id == *id && policy.admits(tab))
        })
        .filter(|id| seen.insert(*id))
        .collect()
}

/// Position in the color palette for the next new group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCursor(usize);

impl ColorCursor {
    pub fn new() -> Self {
        Self(0)
    }

    pub fn color(&self) -> GroupColor {
        GroupColor::from_palette(self.0)
    }

    pub fn advance(self) -> Self {
        Self(self.0 + 1)
    }

    /// Number of groups colored so far
    pub fn position(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    /// The group was not in the window when the snapshot was taken
    UnknownGroup(GroupId),
    /// None of the requested tabs passed the filter
    NoEligibleTabs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ActionStatus {
    Applied {
        group_id: GroupId,
        tab_ids: Vec<TabId>,
        /// Set for newly created groups only
        color: Option<GroupColor>,
    },
    Skipped(SkipReason),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionOutcome {
    pub action: ModelAction,
    pub status: ActionStatus,
}

/// Everything one reconciliation pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    /// Tabs taken out of their groups by the `RegroupAll` pre-step
    pub ungrouped: Vec<TabId>,
    pub ungroup_error: Option<String>,
    pub outcomes: Vec<ActionOutcome>,
    pub rejected: Vec<InvalidAction>,
}

impl RunReport {
    pub fn applied_count(&self) -> usize {
        self.count(|status| matches!(status, ActionStatus::Applied { .. }))
    }

    pub fn skipped_count(&self) -> usize {
        self.count(|status| matches!(status, ActionStatus::Skipped(_)))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|status| matches!(status, ActionStatus::Failed(_)))
    }

    /// Names of new groups whose creation failed
    pub fn failed_group_names(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter_map(|outcome| match (&outcome.action, &outcome.status) {
                (ModelAction::CreateGroup { name, .. }, ActionStatus::Failed(_)) => {
                    Some(name.as_str())
                }
                _ => None,
            })
            .collect()
    }

    fn count(&self, predicate: impl Fn(&ActionStatus) -> bool) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| predicate(&outcome.status))
            .count()
    }
}

/// Applies actions to a [`TabHost`]. Holds no state between runs.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    create_policy: FilterPolicy,
}

impl Reconciler {
    pub fn new(create_policy: FilterPolicy) -> Self {
        Self { create_policy }
    }

    pub fn for_mode(mode: OrganizeMode) -> Self {
        Self::new(FilterPolicy::for_create(mode))
    }

    pub async fn run(
        &self,
        host: &dyn TabHost,
        snapshot: &Snapshot,
        response: NormalizedResponse,
    ) -> RunReport {
        let mut report = RunReport {
            rejected: response.rejected,
            ..RunReport::default()
        };

        if snapshot.mode == OrganizeMode::RegroupAll && !response.actions.is_empty() {
            match ungroup_all(host).await {
                Ok(ungrouped) => report.ungrouped = ungrouped,
                Err(e) => {
                    error!("Failed to ungroup tabs before regrouping: {}", e);
                    report.ungroup_error = Some(e.to_string());
                }
            }
        }

        let mut cursor = ColorCursor::new();
        for action in response.actions {
            let (status, next) = match &action {
                ModelAction::CreateGroup { name, tab_ids } => {
                    self.create_group(host, name, tab_ids, cursor).await
                }
                ModelAction::AddToExistingGroup { group_id, tab_ids } => (
                    add_to_group(host, snapshot, *group_id, tab_ids).await,
                    cursor,
                ),
            };
            cursor = next;
            report.outcomes.push(ActionOutcome { action, status });
        }

        info!(
            "Reconciled: {} applied, {} skipped, {} failed, {} rejected",
            report.applied_count(),
            report.skipped_count(),
            report.failed_count(),
            report.rejected.len()
        );
        report
    }

    async fn create_group(
        &self,
        host: &dyn TabHost,
        name: &str,
        requested: &[TabId],
        cursor: ColorCursor,
    ) -> (ActionStatus, ColorCursor) {
        let live = match host.query_tabs().await {
            Ok(tabs) => tabs,
            Err(e) => {
                error!("Error grouping tabs for group '{}': {}", name, e);
                return (ActionStatus::Failed(e.to_string()), cursor);
            }
        };

        let tab_ids = filter_tab_ids(requested, &live, self.create_policy);
        if tab_ids.is_empty() {
            warn!(
                "No valid tabs found for group '{}' with tab IDs: {:?}",
                name, requested
            );
            return (ActionStatus::Skipped(SkipReason::NoEligibleTabs), cursor);
        }

        let group_id = match host.create_group(&tab_ids).await {
            Ok(id) => id,
            Err(e) => {
                error!("Error grouping tabs for group '{}': {}", name, e);
                return (ActionStatus::Failed(e.to_string()), cursor);
            }
        };

        let color = cursor.color();
        if let Err(e) = host.set_group_meta(group_id, name, color).await {
            error!("Error naming group {} as '{}': {}", group_id, name, e);
            return (ActionStatus::Failed(e.to_string()), cursor);
        }

        info!("Created group '{}' ({}) with {} tabs", name, color, tab_ids.len());
        (
            ActionStatus::Applied {
                group_id,
                tab_ids,
                color: Some(color),
            },
            cursor.advance(),
        )
    }
}

async fn add_to_group(
    host: &dyn TabHost,
    snapshot: &Snapshot,
    group_id: GroupId,
    requested: &[TabId],
) -> ActionStatus {
    if !snapshot.knows_group(group_id) {
        warn!("Model referenced unknown group {}, skipping", group_id);
        return ActionStatus::Skipped(SkipReason::UnknownGroup(group_id));
    }

    let live = match host.query_tabs().await {
        Ok(tabs) => tabs,
        Err(e) => {
            error!("Error adding tabs to group {}: {}", group_id, e);
            return ActionStatus::Failed(e.to_string());
        }
    };

    let tab_ids = filter_tab_ids(requested, &live, FilterPolicy::Strict);
    if tab_ids.is_empty() {
        warn!(
            "No valid, ungrouped tabs for group {} with tab IDs: {:?}",
            group_id, requested
        );
        return ActionStatus::Skipped(SkipReason::NoEligibleTabs);
    }

    match host.add_to_group(group_id, &tab_ids).await {
        Ok(()) => {
            info!("Added {} tabs to group {}", tab_ids.len(), group_id);
            ActionStatus::Applied {
                group_id,
                tab_ids,
                color: None,
            }
        }
        Err(e) => {
            error!("Error adding tabs to group {}: {}", group_id, e);
            ActionStatus::Failed(e.to_string())
        }
    }
}

/// Take every currently grouped tab out of its group in one call
async fn ungroup_all(host: &dyn TabHost) -> anyhow::Result<Vec<TabId>> {
    let grouped: Vec<TabId> = host
        .query_tabs()
        .await?
        .iter()
        .filter(|tab| tab.is_grouped())
        .map(|tab| tab.id)
        .collect();

    if grouped.is_empty() {
        debug!("No grouped tabs to dissolve");
        return Ok(grouped);
    }

    host.ungroup(&grouped).await?;
    debug!("Ungrouped {} tabs", grouped.len());
    Ok(grouped)
}
