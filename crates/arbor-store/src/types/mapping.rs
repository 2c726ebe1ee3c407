//! External id mapping record.

use arbor_core::{ExternalId, MessageId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Links a chat-surface message id to an internal message id.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalMapping {
    /// Id assigned by the chat surface.
    pub external_id: ExternalId,
    /// Id of the stored message.
    pub internal_id: MessageId,
    /// Session the message belongs to.
    pub session_id: SessionId,
    /// When the mapping was last written.
    pub timestamp: DateTime<Utc>,
}
