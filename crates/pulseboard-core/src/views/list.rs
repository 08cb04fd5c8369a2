//! Flat issue list view.

use serde_json::json;

use crate::error::CoreResult;
use crate::issue::{Issue, IssueStatus, Snapshot};
use crate::views::ViewParams;

/// Filtered, sorted issue list.
///
/// Closed issues are excluded unless the subscription explicitly filters
/// for them, matching what the tracker CLI shows by default.
pub fn compute(params: &ViewParams, snapshot: &Snapshot) -> CoreResult<serde_json::Value> {
    let status_filter = params.status();
    let mut issues: Vec<&Issue> = snapshot
        .issues
        .iter()
        .filter(|i| match status_filter {
            Some(status) => i.status == status,
            None => i.status != IssueStatus::Closed,
        })
        .filter(|i| params.assignee().is_none_or(|a| i.assignee.as_deref() == Some(a)))
        .filter(|i| params.priority().is_none_or(|p| i.priority == p))
        .filter(|i| params.issue_type().is_none_or(|t| i.issue_type == t))
        .collect();

    match params.sort() {
        "updated" => issues.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id))),
        "created" => issues.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id))),
        // Default: most urgent first, recently touched breaking ties.
        _ => issues.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(b.updated_at.cmp(&a.updated_at))
                .then(a.id.cmp(&b.id))
        }),
    }

    Ok(json!({
        "issues": issues,
        "total": issues.len(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::IssueStatus;
    use crate::views::tests::issue;

    fn snapshot() -> Snapshot {
        Snapshot {
            issues: vec![
                issue("is-1", IssueStatus::Open, 2),
                issue("is-2", IssueStatus::InProgress, 0),
                issue("is-3", IssueStatus::Closed, 1),
                issue("is-4", IssueStatus::Open, 1),
            ],
        }
    }

    #[test]
    fn test_excludes_closed_by_default() {
        let data = compute(&ViewParams::default(), &snapshot()).unwrap();
        assert_eq!(data["total"], 3);
        let ids: Vec<&str> = data["issues"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap())
            .collect();
        assert!(!ids.contains(&"is-3"));
    }

    #[test]
    fn test_priority_sort_is_default() {
        let data = compute(&ViewParams::default(), &snapshot()).unwrap();
        let ids: Vec<&str> = data["issues"]
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["is-2", "is-4", "is-1"]);
    }

    #[test]
    fn test_status_filter_includes_closed_when_asked() {
        let params = ViewParams::default().set("status", "closed");
        let data = compute(&params, &snapshot()).unwrap();
        assert_eq!(data["total"], 1);
        assert_eq!(data["issues"][0]["id"], "is-3");
    }

    #[test]
    fn test_unrecognized_status_filter_is_ignored() {
        // Must behave like no status filter at all, not like status=open.
        let params = ViewParams::default().set("status", "bogus");
        let data = compute(&params, &snapshot()).unwrap();
        assert_eq!(data, compute(&ViewParams::default(), &snapshot()).unwrap());
        assert_eq!(data["total"], 3);
    }

    #[test]
    fn test_priority_filter() {
        let params = ViewParams::default().set("priority", "1");
        let data = compute(&params, &snapshot()).unwrap();
        assert_eq!(data["total"], 1);
        assert_eq!(data["issues"][0]["id"], "is-4");
    }
}
