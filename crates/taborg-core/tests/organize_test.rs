//! End-to-end organize runs against an in-memory window.
//!
//! What this test protects:
//! - a run with nothing eligible never reaches the model or the window
//! - stale or hallucinated ids from the model never move the wrong tab
//! - new groups get palette colors in order, however adds are interleaved
//! - the lifecycle (key check, timeout, re-entrancy, notifications)

use std::sync::{Arc, Mutex};
use std::time::Duration;

use taborg_browser::{GroupColor, GroupInfo, HostCall, HostOp, MemoryTabHost, Tab, TabHost};
use taborg_config::{MemoryPreferenceStore, OrganizeOption, PreferenceStore, Preferences};
use taborg_core::{
    fixed_provider, ActionStatus, Notification, Notifier, OrganizeError, OrganizeMode, Organizer,
    Outcome, RunReport, SkipReason, Trigger,
};
use taborg_providers::mock::{MockProvider, MockResponse};

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    fn seen(&self) -> Vec<Notification> {
        self.seen.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.seen.lock().unwrap().push(notification.clone());
    }
}

struct Harness {
    host: Arc<MemoryTabHost>,
    provider: MockProvider,
    notifier: Arc<RecordingNotifier>,
    organizer: Organizer,
}

fn harness_with(host: MemoryTabHost, preferences: MemoryPreferenceStore, provider: MockProvider) -> Harness {
    let host = Arc::new(host);
    let notifier = Arc::new(RecordingNotifier::default());
    let tab_host: Arc<dyn TabHost> = host.clone();
    let organizer = Organizer::new(tab_host, Arc::new(preferences), fixed_provider(provider.clone()))
        .with_notifier(notifier.clone());
    Harness {
        host,
        provider,
        notifier,
        organizer,
    }
}

fn harness(host: MemoryTabHost, provider: MockProvider) -> Harness {
    harness_with(host, MemoryPreferenceStore::with_api_key("test-key"), provider)
}

fn answer(text: &str) -> MockProvider {
    MockProvider::new().with_response(MockResponse::text(text))
}

fn report(outcome: Outcome) -> RunReport {
    match outcome {
        Outcome::Organized(report) => report,
        Outcome::NothingToDo => panic!("expected an organized run"),
    }
}

fn work_group(id: i64) -> GroupInfo {
    GroupInfo {
        id,
        title: "Work".to_string(),
        color: GroupColor::Blue,
    }
}

fn prompt_of(provider: &MockProvider) -> String {
    provider.get_requests()[0].messages[0].content.clone()
}

#[tokio::test]
async fn test_nothing_eligible_makes_no_request_and_no_mutation() {
    let h = harness(
        MemoryTabHost::with_tabs(
            vec![Tab::new(1, "Mail", "https://mail.example.com").in_group(10)],
            vec![work_group(10)],
        ),
        answer(r#"[{"group":"X","tabIds":[1]}]"#),
    );

    let outcome = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap();

    assert_eq!(outcome, Outcome::NothingToDo);
    assert_eq!(h.provider.request_count(), 0);
    assert!(h.host.mutations().is_empty());
    assert_eq!(h.notifier.seen(), vec![Notification::nothing_to_do()]);
}

#[tokio::test]
async fn test_empty_window_in_regroup_all_is_nothing_to_do() {
    let h = harness(MemoryTabHost::default(), MockProvider::new());

    let outcome = h.organizer.run_organize(OrganizeMode::RegroupAll).await.unwrap();

    assert_eq!(outcome, Outcome::NothingToDo);
    assert_eq!(h.provider.request_count(), 0);
}

#[tokio::test]
async fn test_new_only_mixed_actions() {
    let h = harness(
        MemoryTabHost::with_tabs(
            vec![
                Tab::new(1, "Jira", "https://jira.example.com").in_group(10),
                Tab::new(2, "Confluence", "https://wiki.example.com"),
                Tab::new(3, "Flights", "https://flights.example.com"),
                Tab::new(4, "Hotels", "https://hotels.example.com"),
            ],
            vec![work_group(10)],
        ),
        answer(
            r#"[
                {"action":"add_to_existing","groupId":10,"tabIds":[2]},
                {"action":"create_new","group":"Travel","tabIds":[3,4]},
                {"action":"add_to_existing","groupId":99,"tabIds":[3]}
            ]"#,
        ),
    );

    let report = report(h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap());

    let prompt = prompt_of(&h.provider);
    assert!(prompt.contains("add_to_existing"));
    assert!(!prompt.contains("Jira"), "grouped tabs are not offered to the model");

    assert_eq!(h.host.tab(2).unwrap().group_id, Some(10));
    let travel_id = h.host.tab(3).unwrap().group_id.unwrap();
    assert_eq!(h.host.tab(4).unwrap().group_id, Some(travel_id));
    let travel = h.host.group(travel_id).unwrap();
    assert_eq!(travel.title, "Travel");
    assert_eq!(travel.color, GroupColor::Grey);
    assert_eq!(h.host.group(10).unwrap().title, "Work");
    assert_eq!(h.host.group(10).unwrap().color, GroupColor::Blue);

    assert_eq!(
        report.outcomes[2].status,
        ActionStatus::Skipped(SkipReason::UnknownGroup(99))
    );
    assert_eq!(report.applied_count(), 2);
    assert_eq!(h.notifier.seen(), vec![Notification::success()]);
}

#[tokio::test]
async fn test_regroup_all_ungroups_first_and_takes_any_tab() {
    let h = harness(
        MemoryTabHost::with_tabs(
            vec![
                Tab::new(1, "crates.io", "https://crates.io").in_group(10),
                Tab::new(2, "docs.rs", "https://docs.rs").in_group(10),
                Tab::new(3, "GitHub", "https://github.com"),
            ],
            vec![work_group(10)],
        ),
        answer(r#"[{"group":"Dev","tabIds":[1,3]},{"group":"Docs","tabIds":[2]}]"#),
    );

    let report = report(h.organizer.run_organize(OrganizeMode::RegroupAll).await.unwrap());

    assert!(!prompt_of(&h.provider).contains("add_to_existing"));
    assert_eq!(report.ungrouped, vec![1, 2]);

    let mutations = h.host.mutations();
    assert_eq!(mutations[0], HostCall::Ungroup { tab_ids: vec![1, 2] });
    assert_eq!(mutations[1], HostCall::CreateGroup { tab_ids: vec![1, 3] });
    assert_eq!(mutations[3], HostCall::CreateGroup { tab_ids: vec![2] });

    let dev = h.host.group(h.host.tab(1).unwrap().group_id.unwrap()).unwrap();
    let docs = h.host.group(h.host.tab(2).unwrap().group_id.unwrap()).unwrap();
    assert_eq!((dev.title.as_str(), dev.color), ("Dev", GroupColor::Grey));
    assert_eq!((docs.title.as_str(), docs.color), ("Docs", GroupColor::Blue));
    assert!(h.host.state().groups.iter().all(|g| g.title != "Work"));
}

#[tokio::test]
async fn test_strict_filter_never_moves_grouped_tab() {
    let h = harness(
        MemoryTabHost::with_tabs(
            vec![Tab::new(1, "Mail", "u").in_group(10), Tab::new(2, "News", "u")],
            vec![work_group(10)],
        ),
        answer(r#"[{"group":"Everything","tabIds":[1,2,1]}]"#),
    );

    h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap();

    assert_eq!(h.host.tab(1).unwrap().group_id, Some(10));
    assert!(h
        .host
        .mutations()
        .contains(&HostCall::CreateGroup { tab_ids: vec![2] }));
}

#[tokio::test]
async fn test_colors_cycle_across_ten_groups_with_adds_between() {
    let mut tabs: Vec<Tab> = (1..=12).map(|id| Tab::new(id, "t", "u")).collect();
    tabs.push(Tab::new(50, "w", "u").in_group(10));
    let mut actions = Vec::new();
    for id in 1..=10 {
        actions.push(format!(r#"{{"action":"create_new","group":"G{}","tabIds":[{}]}}"#, id, id));
        if id % 3 == 0 {
            actions.push(format!(
                r#"{{"action":"add_to_existing","groupId":10,"tabIds":[{}]}}"#,
                10 + id / 3
            ));
        }
    }
    let h = harness(
        MemoryTabHost::with_tabs(tabs, vec![work_group(10)]),
        answer(&format!("[{}]", actions.join(","))),
    );

    let report = report(h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap());

    let colors: Vec<GroupColor> = report
        .outcomes
        .iter()
        .filter_map(|outcome| match outcome.status {
            ActionStatus::Applied { color, .. } => color,
            _ => None,
        })
        .collect();
    let expected: Vec<GroupColor> = (0..10).map(GroupColor::from_palette).collect();
    assert_eq!(colors, expected);
    assert_eq!(colors[9], GroupColor::Grey);
    assert_eq!(h.host.group(10).unwrap().color, GroupColor::Blue);
}

#[tokio::test]
async fn test_fenced_answer_is_applied_like_bare_json() {
    let h = harness(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u"), Tab::new(2, "b", "u")], vec![]),
        answer("```json\n[{\"group\":\"Both\",\"tabIds\":[1,2]}]\n```"),
    );

    let report = report(h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap());

    assert_eq!(report.applied_count(), 1);
    assert_eq!(h.host.state().groups[0].title, "Both");
}

#[tokio::test]
async fn test_prose_answer_fails_run_without_mutation() {
    let h = harness(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]),
        answer("I grouped your tabs by topic, hope that helps!"),
    );

    let err = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap_err();

    assert!(matches!(err, OrganizeError::MalformedResponse(_)));
    assert!(h.host.mutations().is_empty());
    let seen = h.notifier.seen();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].title, "Error");
}

#[tokio::test]
async fn test_missing_key_stops_before_any_query() {
    let h = harness_with(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]),
        MemoryPreferenceStore::default(),
        MockProvider::new(),
    );

    let err = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap_err();

    assert!(matches!(err, OrganizeError::ConfigMissing));
    assert!(h.host.calls().is_empty());
    assert_eq!(h.provider.request_count(), 0);
    assert_eq!(h.notifier.seen(), vec![Notification::missing_api_key()]);
}

#[tokio::test]
async fn test_provider_error_is_model_unavailable() {
    let h = harness(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]),
        MockProvider::new().with_response(MockResponse::error("Gemini API error (403 Forbidden): bad key")),
    );

    let err = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap_err();

    assert!(matches!(err, OrganizeError::ModelUnavailable(_)));
    assert!(h.notifier.seen()[0].message.contains("403"));
    assert!(h.host.mutations().is_empty());
}

#[tokio::test]
async fn test_empty_model_text_is_malformed() {
    let h = harness(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]),
        answer("   "),
    );

    let err = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap_err();

    assert!(matches!(err, OrganizeError::MalformedResponse(_)));
}

#[tokio::test]
async fn test_slow_model_times_out() {
    let mut h = harness(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]),
        MockProvider::new().with_response(MockResponse::text("[]").delayed(Duration::from_secs(10))),
    );
    h.organizer = h.organizer.with_model_timeout(Duration::from_millis(50));

    let err = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap_err();

    assert!(matches!(err, OrganizeError::ModelUnavailable(_)));
    assert!(!h.organizer.is_running());
}

#[tokio::test]
async fn test_second_run_while_running_is_rejected() {
    let h = harness(
        MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]),
        MockProvider::new().with_response(
            MockResponse::text(r#"[{"group":"A","tabIds":[1]}]"#).delayed(Duration::from_millis(100)),
        ),
    );

    let (first, second) = tokio::join!(
        h.organizer.run_organize(OrganizeMode::NewOnly),
        h.organizer.run_organize(OrganizeMode::RegroupAll),
    );

    assert!(matches!(second, Err(OrganizeError::AlreadyRunning)));
    assert_eq!(report(first.unwrap()).applied_count(), 1);
    assert_eq!(h.provider.request_count(), 1);
    assert_eq!(h.notifier.seen(), vec![Notification::success()]);

    // The lock is released once the first run is over
    let again = h.organizer.run_organize(OrganizeMode::NewOnly).await;
    assert!(again.is_ok());
}

#[tokio::test]
async fn test_tab_closed_mid_run_only_fails_its_group() {
    let host = MemoryTabHost::with_tabs(
        vec![Tab::new(1, "a", "u"), Tab::new(2, "b", "u"), Tab::new(3, "c", "u")],
        vec![],
    );
    host.close_tab_before(HostOp::CreateGroup, 1);
    let h = harness(
        host,
        answer(r#"[{"group":"First","tabIds":[1,2]},{"group":"Second","tabIds":[3]}]"#),
    );

    let report = report(h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap());

    assert!(matches!(report.outcomes[0].status, ActionStatus::Failed(_)));
    assert_eq!(h.host.tab(2).unwrap().group_id, None);
    let second = h.host.group(h.host.tab(3).unwrap().group_id.unwrap()).unwrap();
    assert_eq!(second.color, GroupColor::Grey);
    assert_eq!(
        h.notifier.seen(),
        vec![Notification::group_failed("First"), Notification::success()]
    );
}

#[tokio::test]
async fn test_group_query_failure_falls_back_to_fresh_prompt() {
    let host = MemoryTabHost::with_tabs(
        vec![Tab::new(1, "a", "u").in_group(10), Tab::new(2, "b", "u")],
        vec![work_group(10)],
    );
    host.fail_always(HostOp::QueryGroups, "tabGroups API unavailable");
    let h = harness(host, answer(r#"[{"group":"B","tabIds":[2]}]"#));

    let report = report(h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap());

    assert!(!prompt_of(&h.provider).contains("add_to_existing"));
    assert_eq!(report.applied_count(), 1);
}

#[tokio::test]
async fn test_tab_query_failure_is_a_run_error() {
    let host = MemoryTabHost::with_tabs(vec![Tab::new(1, "a", "u")], vec![]);
    host.fail_always(HostOp::QueryTabs, "No current window");
    let h = harness(host, MockProvider::new());

    let err = h.organizer.run_organize(OrganizeMode::NewOnly).await.unwrap_err();

    assert!(matches!(err, OrganizeError::Browser(_)));
    assert_eq!(h.provider.request_count(), 0);
}

#[tokio::test]
async fn test_shortcut_uses_stored_option() {
    let preferences = MemoryPreferenceStore::new(Preferences {
        gemini_api_key: Some("k".to_string()),
        organize_option: OrganizeOption::All,
    });
    let h = harness_with(
        MemoryTabHost::with_tabs(
            vec![Tab::new(1, "a", "u").in_group(10), Tab::new(2, "b", "u")],
            vec![work_group(10)],
        ),
        preferences,
        answer(r#"[{"group":"All","tabIds":[1,2]}]"#),
    );

    let report = report(h.organizer.handle_trigger(Trigger::Shortcut).await.unwrap());

    assert_eq!(report.ungrouped, vec![1]);
    assert!(!h.host.calls().contains(&HostCall::QueryGroups));
}

#[tokio::test]
async fn test_message_trigger_overrides_stored_option() {
    let preferences = MemoryPreferenceStore::with_api_key("k");
    preferences.set_organize_option(OrganizeOption::All).unwrap();
    let h = harness_with(
        MemoryTabHost::with_tabs(
            vec![Tab::new(1, "a", "u").in_group(10), Tab::new(2, "b", "u")],
            vec![work_group(10)],
        ),
        preferences,
        answer(r#"[{"group":"New","tabIds":[1,2]}]"#),
    );
    let trigger = Trigger::from_message(&serde_json::json!({"action": "organizeTabs"})).unwrap();

    h.organizer.handle_trigger(trigger).await.unwrap();

    assert_eq!(h.host.tab(1).unwrap().group_id, Some(10));
    assert!(h.host.calls().contains(&HostCall::QueryGroups));
}
