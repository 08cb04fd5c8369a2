//! Issue-related database queries.
//!
//! The schema is owned by the external tracker CLI. Columns other than the
//! primary key are read as optional so that a row written mid-transaction
//! never aborts a snapshot read.

use rusqlite::params;
use tracing::debug;

use crate::pool::{DbError, DbPool, DbResult};

/// Issue row from the database.
#[derive(Debug, Clone)]
pub struct IssueRow {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub priority: Option<i64>,
    pub issue_type: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<String>,
    pub epic_id: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

/// Read a snapshot of every issue, with its epic link resolved.
///
/// Rows that cannot be decoded at all are skipped rather than failing the
/// whole snapshot; the database may be read mid-mutation.
pub fn list_issues(pool: &DbPool) -> DbResult<Vec<IssueRow>> {
    pool.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT i.id, i.title, i.description, i.status, i.priority,
                    i.issue_type, i.assignee, i.labels,
                    (SELECT d.depends_on_id FROM dependencies d
                     WHERE d.issue_id = i.id AND d.dep_type = 'parent-child'
                     LIMIT 1) AS epic_id,
                    i.created_at, i.updated_at
             FROM issues i
             ORDER BY i.id",
        )?;

        let rows = stmt.query_map(params![], |row| {
            Ok(IssueRow {
                id: row.get(0)?,
                title: row.get(1).unwrap_or(None),
                description: row.get(2).unwrap_or(None),
                status: row.get(3).unwrap_or(None),
                priority: row.get(4).unwrap_or(None),
                issue_type: row.get(5).unwrap_or(None),
                assignee: row.get(6).unwrap_or(None),
                labels: row.get(7).unwrap_or(None),
                epic_id: row.get(8).unwrap_or(None),
                created_at: row.get(9).unwrap_or(None),
                updated_at: row.get(10).unwrap_or(None),
            })
        })?;

        let mut issues = Vec::new();
        for row in rows {
            match row {
                Ok(issue) => issues.push(issue),
                Err(e) => debug!(error = %e, "Skipping undecodable issue row"),
            }
        }
        Ok(issues)
    })
}

/// Count issues, used by the health endpoint.
pub fn count_issues(pool: &DbPool) -> DbResult<i64> {
    pool.with_conn(|conn| {
        conn.query_row("SELECT COUNT(*) FROM issues", params![], |row| row.get(0))
            .map_err(DbError::from)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;
    use std::path::Path;

    fn write_fixture(path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE issues (
                 id TEXT PRIMARY KEY,
                 title TEXT,
                 description TEXT,
                 status TEXT,
                 priority INTEGER,
                 issue_type TEXT,
                 assignee TEXT,
                 labels TEXT,
                 created_at TEXT,
                 updated_at TEXT
             );
             CREATE TABLE dependencies (
                 issue_id TEXT,
                 depends_on_id TEXT,
                 dep_type TEXT
             );
             INSERT INTO issues VALUES
                 ('is-1', 'Fix login', NULL, 'open', 1, 'bug', 'ana', '[\"auth\"]',
                  '2026-01-01T00:00:00Z', '2026-01-02T00:00:00Z'),
                 ('is-2', 'Epic: Auth', NULL, 'open', 2, 'epic', NULL, NULL,
                  '2026-01-01T00:00:00Z', '2026-01-01T00:00:00Z'),
                 ('is-3', NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL, NULL);
             INSERT INTO dependencies VALUES ('is-1', 'is-2', 'parent-child');",
        )
        .unwrap();
    }

    #[test]
    fn test_list_issues_resolves_epic_link() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.db");
        write_fixture(&path);

        let pool = DbPool::open(&path).unwrap();
        let issues = list_issues(&pool).unwrap();
        assert_eq!(issues.len(), 3);
        assert_eq!(issues[0].id, "is-1");
        assert_eq!(issues[0].epic_id.as_deref(), Some("is-2"));
        assert_eq!(issues[1].epic_id, None);
    }

    #[test]
    fn test_list_issues_tolerates_null_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.db");
        write_fixture(&path);

        let pool = DbPool::open(&path).unwrap();
        let issues = list_issues(&pool).unwrap();
        let partial = issues.iter().find(|i| i.id == "is-3").unwrap();
        assert!(partial.title.is_none());
        assert!(partial.status.is_none());
    }

    #[test]
    fn test_count_issues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issues.db");
        write_fixture(&path);

        let pool = DbPool::open(&path).unwrap();
        assert_eq!(count_issues(&pool).unwrap(), 3);
    }
}
