//! Kanban board view: one column per status.

use serde_json::json;

use crate::error::CoreResult;
use crate::issue::{Issue, IssueStatus, Snapshot};
use crate::views::ViewParams;

/// The closed column only shows the most recently finished work.
const CLOSED_COLUMN_CAP: usize = 50;

/// Grouped board columns in fixed status order.
pub fn compute(params: &ViewParams, snapshot: &Snapshot) -> CoreResult<serde_json::Value> {
    let columns: Vec<serde_json::Value> = IssueStatus::BOARD_ORDER
        .iter()
        .map(|&status| {
            let mut issues: Vec<&Issue> = snapshot
                .issues
                .iter()
                .filter(|i| i.status == status)
                .filter(|i| params.assignee().is_none_or(|a| i.assignee.as_deref() == Some(a)))
                .collect();

            if status == IssueStatus::Closed {
                issues.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
                issues.truncate(CLOSED_COLUMN_CAP);
            } else {
                issues.sort_by(|a, b| {
                    a.priority
                        .cmp(&b.priority)
                        .then(b.updated_at.cmp(&a.updated_at))
                        .then(a.id.cmp(&b.id))
                });
            }

            json!({
                "status": status.as_str(),
                "count": issues.len(),
                "issues": issues,
            })
        })
        .collect();

    Ok(json!({ "columns": columns }))
}
