//! Storage seams.
//!
//! [`MessageStore`] is the append-only log of one session, [`StateStore`]
//! holds that session's pointer record, and [`MappingStore`] holds the
//! external id table shared by all sessions. The JSONL and `SQLite`
//! backends each implement all three.

use arbor_core::{ExternalId, MessageId, SessionId};

use crate::errors::{Result, StoreError};
use crate::types::{ExternalMapping, Message, SessionState};

/// Durable, append-only log of one session's messages.
#[cfg_attr(test, mockall::automock)]
pub trait MessageStore: Send {
    /// Append one message. Durable before returning. No dedup.
    fn append(&self, message: &Message) -> Result<()>;

    /// Append a batch as a single write. Either every message lands or none.
    fn append_all(&self, messages: &[Message]) -> Result<()>;

    /// Look up a message by id.
    fn find(&self, id: &MessageId) -> Result<Option<Message>>;

    /// Look up a message by the external id it was logged with.
    fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Message>>;

    /// Every message in physical append order.
    fn scan_all(&self) -> Result<Vec<Message>>;

    /// Atomically replace the whole log with `messages`.
    fn rewrite(&self, messages: &[Message]) -> Result<()>;
}

/// Persisted pointer record of one session.
#[cfg_attr(test, mockall::automock)]
pub trait StateStore: Send {
    /// Read the record. `None` when missing or unreadable.
    fn load(&self) -> Result<Option<SessionState>>;

    /// Replace the record.
    fn save(&self, state: &SessionState) -> Result<()>;
}

/// External id table shared by all sessions.
pub trait MappingStore: Send {
    /// Every stored mapping.
    fn load_all(&self) -> Result<Vec<ExternalMapping>>;

    /// Insert or overwrite the mapping for `(session_id, external_id)`.
    fn upsert(&self, mapping: &ExternalMapping) -> Result<()>;

    /// Drop the mapping for `(session_id, external_id)` if present.
    fn remove(&self, session_id: &SessionId, external_id: &ExternalId) -> Result<()>;
}

/// Reject session ids that are empty, contain path separators or NUL, or
/// start with a dot.
pub fn validate_session_id(session_id: &SessionId) -> Result<()> {
    let raw = session_id.as_str();
    let bad = raw.trim().is_empty()
        || raw.starts_with('.')
        || raw.contains(['/', '\\', '\0']);
    if bad {
        return Err(StoreError::InvalidSessionId(raw.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn accepts_plain_ids() {
        for id in ["telegram-42", "0192f1c4-7c1e-7a00-9d4b-1b2c3d4e5f60", "chat_1.backup"] {
            assert!(validate_session_id(&SessionId::from(id)).is_ok(), "{id}");
        }
    }

    #[test]
    fn rejects_unsafe_ids() {
        for id in ["", "  ", "../etc", "a/b", "a\\b", ".hidden", "nul\0byte"] {
            assert_matches!(
                validate_session_id(&SessionId::from(id)),
                Err(StoreError::InvalidSessionId(_)),
                "{id:?}"
            );
        }
    }
}
