//! Epics view: each epic with its children and progress counts.

use serde_json::json;

use crate::error::CoreResult;
use crate::issue::{Issue, IssueStatus, IssueType, Snapshot};
use crate::views::ViewParams;

/// Hierarchical epic tree.
pub fn compute(_params: &ViewParams, snapshot: &Snapshot) -> CoreResult<serde_json::Value> {
    let mut epics: Vec<&Issue> = snapshot
        .issues
        .iter()
        .filter(|i| i.issue_type == IssueType::Epic)
        .collect();
    epics.sort_by(|a, b| a.id.cmp(&b.id));

    let entries: Vec<serde_json::Value> = epics
        .into_iter()
        .map(|epic| {
            let mut children: Vec<&Issue> = snapshot
                .issues
                .iter()
                .filter(|i| i.epic_id.as_deref() == Some(epic.id.as_str()))
                .collect();
            children.sort_by(|a, b| a.priority.cmp(&b.priority).then(a.id.cmp(&b.id)));

            let closed = children
                .iter()
                .filter(|i| i.status == IssueStatus::Closed)
                .count();

            json!({
                "epic": epic,
                "children": children,
                "total": children.len(),
                "closed": closed,
            })
        })
        .collect();

    Ok(json!({ "epics": entries }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::views::tests::issue;

    #[test]
    fn test_children_grouped_under_epic() {
        let mut epic = issue("ep-1", IssueStatus::Open, 1);
        epic.issue_type = IssueType::Epic;
        let mut child_a = issue("is-1", IssueStatus::Closed, 1);
        child_a.epic_id = Some("ep-1".to_string());
        let mut child_b = issue("is-2", IssueStatus::Open, 0);
        child_b.epic_id = Some("ep-1".to_string());
        let orphan = issue("is-3", IssueStatus::Open, 2);

        let snapshot = Snapshot {
            issues: vec![epic, child_a, child_b, orphan],
        };
        let data = compute(&ViewParams::default(), &snapshot).unwrap();
        let entry = &data["epics"][0];
        assert_eq!(entry["epic"]["id"], "ep-1");
        assert_eq!(entry["total"], 2);
        assert_eq!(entry["closed"], 1);
        assert_eq!(entry["children"][0]["id"], "is-2");
    }

    #[test]
    fn test_no_epics_yields_empty_tree() {
        let snapshot = Snapshot {
            issues: vec![issue("is-1", IssueStatus::Open, 1)],
        };
        let data = compute(&ViewParams::default(), &snapshot).unwrap();
        assert!(data["epics"].as_array().unwrap().is_empty());
    }
}
