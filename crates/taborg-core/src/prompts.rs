use serde::Serialize;
use taborg_browser::{GroupId, Tab, TabGroup, TabId};

const FRESH_GROUPING_PROMPT: &str = "
You are an assistant that organizes Chrome tabs. Given this JSON array of tabs:
{tabs}
Return a JSON array of objects with fields \"group\" (string) and \"tabIds\" (array of numbers). Example:
[{\"group\":\"Work\",\"tabIds\":[1,2,3]}]

Very important: Return ONLY the JSON array with no additional text, explanation, or markdown formatting.
";

const INCREMENTAL_GROUPING_PROMPT: &str = "
You are an assistant that organizes Chrome tabs. These tab groups already exist in the window:
{groups}
These tabs are not in any group yet:
{tabs}
Put each ungrouped tab into the existing group it fits, or into a new group when none fits.
Return a JSON array mixing two kinds of objects:
- {\"action\":\"add_to_existing\",\"groupId\":number,\"tabIds\":[numbers]} to add tabs to an existing group
- {\"action\":\"create_new\",\"group\":string,\"tabIds\":[numbers]} to create a new group
Example:
[{\"action\":\"add_to_existing\",\"groupId\":12,\"tabIds\":[4]},{\"action\":\"create_new\",\"group\":\"Travel\",\"tabIds\":[7,8]}]

Very important: Return ONLY the JSON array with no additional text, explanation, or markdown formatting.
";

/// What the model gets to see of a tab
#[derive(Serialize)]
struct TabSummary<'a> {
    id: TabId,
    title: &'a str,
    url: &'a str,
}

/// What the model gets to see of an existing group
#[derive(Serialize)]
struct GroupSummary<'a> {
    id: GroupId,
    title: &'a str,
}

/// Build the grouping prompt for `tabs`.
///
/// With no `existing_groups` the model is asked for fresh groups only;
/// otherwise it may also extend the listed groups. Tabs are reduced to
/// id, title and url, and keep their input order.
pub fn build_prompt(tabs: &[Tab], existing_groups: &[TabGroup]) -> String {
    let tab_summaries: Vec<TabSummary> = tabs
        .iter()
        .map(|tab| TabSummary {
            id: tab.id,
            title: &tab.title,
            url: &tab.url,
        })
        .collect();
    let tabs_json = to_pretty_json(&tab_summaries);

    if existing_groups.is_empty() {
        return FRESH_GROUPING_PROMPT.replace("{tabs}", &tabs_json);
    }

    let group_summaries: Vec<GroupSummary> = existing_groups
        .iter()
        .map(|group| GroupSummary {
            id: group.id,
            title: &group.title,
        })
        .collect();

    INCREMENTAL_GROUPING_PROMPT
        .replace("{groups}", &to_pretty_json(&group_summaries))
        .replace("{tabs}", &tabs_json)
}

fn to_pretty_json<T: Serialize>(value: &T) -> String {
    // Plain structs of strings and integers always serialize
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}
