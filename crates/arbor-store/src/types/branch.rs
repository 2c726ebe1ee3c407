//! Derived branch summary.

use arbor_core::{BranchId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One branch as seen by a full scan. Never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchInfo {
    /// Effective tag.
    pub id: BranchId,
    /// Most recently appended message of the tag with no same-tag child.
    pub leaf_id: MessageId,
    /// Messages carrying the tag.
    pub message_count: usize,
    /// Timestamp of the leaf.
    pub last_active: DateTime<Utc>,
}
