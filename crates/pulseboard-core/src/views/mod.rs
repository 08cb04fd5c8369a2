//! View adapters.
//!
//! Each adapter is a pure function from (parameters, snapshot) to a payload.
//! Determinism matters: the same snapshot and parameters must produce a
//! byte-identical digest, since digest comparison is what suppresses
//! redundant sends.

pub mod board;
pub mod epics;
pub mod list;
pub mod telemetry;

use std::collections::BTreeMap;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{CoreError, CoreResult};
use crate::issue::{IssueStatus, IssueType, Snapshot};

/// The category of projection a subscription asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewKind {
    List,
    Board,
    Epics,
    Telemetry,
}

impl ViewKind {
    /// Convert to string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Board => "board",
            Self::Epics => "epics",
            Self::Telemetry => "telemetry",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> CoreResult<Self> {
        match s {
            "list" => Ok(Self::List),
            "board" => Ok(Self::Board),
            "epics" => Ok(Self::Epics),
            "telemetry" => Ok(Self::Telemetry),
            other => Err(CoreError::UnknownViewKind(other.to_string())),
        }
    }
}

/// Opaque filter/sort parameters attached to a subscription.
///
/// A sorted map keeps serialization (and therefore digests) canonical.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ViewParams(pub BTreeMap<String, String>);

impl ViewParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn set(mut self, key: &str, value: &str) -> Self {
        self.0.insert(key.to_string(), value.to_string());
        self
    }

    /// `status` filter, ignored when unrecognized: a typo'd value must not
    /// masquerade as a `status=open` filter.
    pub fn status(&self) -> Option<IssueStatus> {
        self.get("status").and_then(IssueStatus::try_from_str)
    }

    /// `priority` filter, ignored when unparseable.
    pub fn priority(&self) -> Option<u8> {
        self.get("priority").and_then(|p| p.parse().ok())
    }

    /// `issue_type` filter, ignored when unrecognized.
    pub fn issue_type(&self) -> Option<IssueType> {
        self.get("issue_type").and_then(IssueType::try_from_str)
    }

    /// `assignee` filter.
    pub fn assignee(&self) -> Option<&str> {
        self.get("assignee")
    }

    /// `sort` key for the list view.
    pub fn sort(&self) -> &str {
        self.get("sort").unwrap_or("priority")
    }
}

/// A freshly computed view, ready for transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ViewPayload {
    pub view_kind: ViewKind,
    pub data: serde_json::Value,
    pub digest: String,
}

impl ViewPayload {
    fn new(view_kind: ViewKind, data: serde_json::Value) -> CoreResult<Self> {
        let digest = digest_of(&data)?;
        Ok(Self {
            view_kind,
            data,
            digest,
        })
    }
}

/// Compute the payload for one subscription.
pub fn compute(kind: ViewKind, params: &ViewParams, snapshot: &Snapshot) -> CoreResult<ViewPayload> {
    let data = match kind {
        ViewKind::List => list::compute(params, snapshot)?,
        ViewKind::Board => board::compute(params, snapshot)?,
        ViewKind::Epics => epics::compute(params, snapshot)?,
        ViewKind::Telemetry => telemetry::compute(params, snapshot)?,
    };
    ViewPayload::new(kind, data)
}

/// SHA-256 over the canonical JSON bytes, base64-encoded.
///
/// serde_json's default map is ordered by key, so equal values always
/// serialize to equal bytes.
pub fn digest_of(data: &serde_json::Value) -> CoreResult<String> {
    let bytes = serde_json::to_vec(data)?;
    let hash = Sha256::digest(&bytes);
    Ok(STANDARD.encode(hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issue::Issue;

    pub(crate) fn issue(id: &str, status: IssueStatus, priority: u8) -> Issue {
        Issue {
            id: id.to_string(),
            title: format!("Issue {}", id),
            description: None,
            status,
            priority,
            issue_type: IssueType::Task,
            assignee: None,
            labels: Vec::new(),
            epic_id: None,
            created_at: "2026-01-01T00:00:00Z".to_string(),
            updated_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_digest_is_deterministic() {
        let snapshot = Snapshot {
            issues: vec![
                issue("is-1", IssueStatus::Open, 1),
                issue("is-2", IssueStatus::Closed, 3),
            ],
        };
        let params = ViewParams::default();
        let a = compute(ViewKind::Board, &params, &snapshot).unwrap();
        let b = compute(ViewKind::Board, &params, &snapshot).unwrap();
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.data, b.data);
    }

    #[test]
    fn test_digest_changes_with_data() {
        let params = ViewParams::default();
        let one = Snapshot {
            issues: vec![issue("is-1", IssueStatus::Open, 1)],
        };
        let two = Snapshot {
            issues: vec![issue("is-1", IssueStatus::Closed, 1)],
        };
        let a = compute(ViewKind::List, &params, &one).unwrap();
        let b = compute(ViewKind::List, &params, &two).unwrap();
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_view_kind_round_trip() {
        for kind in [
            ViewKind::List,
            ViewKind::Board,
            ViewKind::Epics,
            ViewKind::Telemetry,
        ] {
            assert_eq!(ViewKind::from_str(kind.as_str()).unwrap(), kind);
        }
        assert!(ViewKind::from_str("gantt").is_err());
    }
}
