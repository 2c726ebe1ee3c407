//! Persisted per-session pointer state.

use arbor_core::{BranchId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Active leaf and current branch of one session.
///
/// `current_branch_id` normally equals the active leaf's tag. Between a
/// fork and the first message logged on the new branch it names the new
/// tag while the active leaf is still the fork point.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    /// Message new turns attach to.
    #[serde(default)]
    pub active_leaf_id: Option<MessageId>,
    /// Tag new turns are written under; `None` means `main`.
    #[serde(default)]
    pub current_branch_id: Option<BranchId>,
    /// When the session was first opened.
    pub created_at: DateTime<Utc>,
    /// Last save time.
    pub updated_at: DateTime<Utc>,
    /// Messages logged minus messages deleted.
    #[serde(default)]
    pub total_messages: u64,
}

impl SessionState {
    /// Zero state for a fresh session.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            active_leaf_id: None,
            current_branch_id: None,
            created_at: now,
            updated_at: now,
            total_messages: 0,
        }
    }

    /// Whether nothing has been logged yet (or everything was deleted).
    pub fn is_empty(&self) -> bool {
        self.active_leaf_id.is_none()
    }
}
