//! Telemetry view: aggregate counts for dashboard widgets.

use std::collections::BTreeMap;

use serde_json::json;

use crate::error::CoreResult;
use crate::issue::Snapshot;
use crate::views::ViewParams;

/// Counts by status, priority, and type.
pub fn compute(_params: &ViewParams, snapshot: &Snapshot) -> CoreResult<serde_json::Value> {
    let mut by_status: BTreeMap<&str, u64> = BTreeMap::new();
    let mut by_priority: BTreeMap<String, u64> = BTreeMap::new();
    let mut by_type: BTreeMap<&str, u64> = BTreeMap::new();

    for issue in &snapshot.issues {
        *by_status.entry(issue.status.as_str()).or_default() += 1;
        *by_priority.entry(issue.priority.to_string()).or_default() += 1;
        *by_type.entry(issue.issue_type.as_str()).or_default() += 1;
    }

    Ok(json!({
        "total": snapshot.issues.len(),
        "by_status": by_status,
        "by_priority": by_priority,
        "by_type": by_type,
    }))
}
