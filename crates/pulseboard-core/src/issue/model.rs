//! Issue domain models.

use pulseboard_db::queries::issues::IssueRow;
use serde::{Deserialize, Serialize};

/// Priority used when the stored value is missing or out of range.
pub const DEFAULT_PRIORITY: u8 = 2;

/// A tracked issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: IssueStatus,
    /// 0 is most urgent, 4 least.
    pub priority: u8,
    pub issue_type: IssueType,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub epic_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Issue {
    /// Build an Issue from a database row, defaulting anything malformed.
    ///
    /// The database may be read mid-mutation, so a half-written row must
    /// yield a usable (if bland) issue rather than an error.
    pub fn from_row(row: IssueRow) -> Self {
        let labels: Vec<String> = row
            .labels
            .as_ref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();

        let priority = match row.priority {
            Some(p) if (0..=4).contains(&p) => p as u8,
            _ => DEFAULT_PRIORITY,
        };

        Self {
            id: row.id,
            title: row.title.unwrap_or_default(),
            description: row.description,
            status: row.status.as_deref().map(IssueStatus::from_str).unwrap_or_default(),
            priority,
            issue_type: row
                .issue_type
                .as_deref()
                .map(IssueType::from_str)
                .unwrap_or_default(),
            assignee: row.assignee,
            labels,
            epic_id: row.epic_id,
            created_at: row.created_at.unwrap_or_default(),
            updated_at: row.updated_at.unwrap_or_default(),
        }
    }
}

/// Issue status (board column).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    #[default]
    Open,
    InProgress,
    Blocked,
    Closed,
}

impl IssueStatus {
    /// Parse from string. Unknown values fall back to Open so a row written
    /// by a newer tracker version still shows up on the board.
    pub fn from_str(s: &str) -> Self {
        Self::try_from_str(s).unwrap_or_default()
    }

    /// Strict parse, for filter parameters: an unrecognized value is `None`,
    /// never a silent `Open` filter.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "open" => Some(Self::Open),
            "in_progress" => Some(Self::InProgress),
            "blocked" => Some(Self::Blocked),
            "closed" | "done" => Some(Self::Closed),
            _ => None,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Blocked => "blocked",
            Self::Closed => "closed",
        }
    }

    /// Board column order, open work first.
    pub const BOARD_ORDER: [IssueStatus; 4] =
        [Self::Open, Self::InProgress, Self::Blocked, Self::Closed];
}

/// Issue type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    #[default]
    Task,
    Bug,
    Feature,
    Chore,
    Epic,
}

impl IssueType {
    /// Parse from string.
    pub fn from_str(s: &str) -> Self {
        Self::try_from_str(s).unwrap_or_default()
    }

    /// Strict parse, for filter parameters.
    pub fn try_from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "task" => Some(Self::Task),
            "bug" => Some(Self::Bug),
            "feature" => Some(Self::Feature),
            "chore" => Some(Self::Chore),
            "epic" => Some(Self::Epic),
            _ => None,
        }
    }

    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Feature => "feature",
            Self::Chore => "chore",
            Self::Epic => "epic",
        }
    }
}

/// A point-in-time, read-only view of the issue database.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub issues: Vec<Issue>,
}

impl Snapshot {
    /// Convert raw rows into domain issues.
    pub fn from_rows(rows: Vec<pulseboard_db::queries::issues::IssueRow>) -> Self {
        Self {
            issues: rows.into_iter().map(Issue::from_row).collect(),
        }
    }
}
