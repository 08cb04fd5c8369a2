//! Issue domain: models and snapshot loading.

pub mod model;

pub use model::{Issue, IssueStatus, IssueType, Snapshot};

use crate::error::CoreResult;
use pulseboard_db::DbPool;

/// Load a point-in-time snapshot of all issues.
pub fn load_snapshot(pool: &DbPool) -> CoreResult<Snapshot> {
    let rows = pulseboard_db::queries::issues::list_issues(pool)?;
    Ok(Snapshot::from_rows(rows))
}
