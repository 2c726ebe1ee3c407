//! Trait implementations over a shared connection pool.
//!
//! Each call checks out one connection and returns it before the call
//! ends. Multi-row writes run inside a single transaction.

use arbor_core::{ExternalId, MessageId, SessionId};
use tracing::debug;

use super::connection::ConnectionPool;
use super::repositories::{MappingRepo, MessageRepo, StateRepo};
use crate::errors::Result;
use crate::store::{MappingStore, MessageStore, StateStore, validate_session_id};
use crate::types::{ExternalMapping, Message, SessionState};

/// One session's rows in the `messages` table.
#[derive(Clone, Debug)]
pub struct SqliteMessageStore {
    pool: ConnectionPool,
    session_id: SessionId,
}

impl SqliteMessageStore {
    /// Store scoped to `session_id`.
    pub fn new(pool: ConnectionPool, session_id: SessionId) -> Result<Self> {
        validate_session_id(&session_id)?;
        Ok(Self { pool, session_id })
    }
}

impl MessageStore for SqliteMessageStore {
    fn append(&self, message: &Message) -> Result<()> {
        let conn = self.pool.get()?;
        MessageRepo::insert(&conn, &self.session_id, message)?;
        debug!(id = %message.id, session_id = %self.session_id, "appended message");
        Ok(())
    }

    fn append_all(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        for message in messages {
            MessageRepo::insert(&tx, &self.session_id, message)?;
        }
        tx.commit()?;
        debug!(count = messages.len(), session_id = %self.session_id, "appended batch");
        Ok(())
    }

    fn find(&self, id: &MessageId) -> Result<Option<Message>> {
        let conn = self.pool.get()?;
        MessageRepo::get_by_id(&conn, &self.session_id, id)
    }

    fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Message>> {
        let conn = self.pool.get()?;
        MessageRepo::get_by_external_id(&conn, &self.session_id, external_id)
    }

    fn scan_all(&self) -> Result<Vec<Message>> {
        let conn = self.pool.get()?;
        MessageRepo::list_by_session(&conn, &self.session_id)
    }

    fn rewrite(&self, messages: &[Message]) -> Result<()> {
        let conn = self.pool.get()?;
        let tx = conn.unchecked_transaction()?;
        let removed = MessageRepo::delete_by_session(&tx, &self.session_id)?;
        for message in messages {
            MessageRepo::insert(&tx, &self.session_id, message)?;
        }
        tx.commit()?;
        debug!(
            removed,
            kept = messages.len(),
            session_id = %self.session_id,
            "rewrote message log"
        );
        Ok(())
    }
}

/// One session's row in `session_state`.
#[derive(Clone, Debug)]
pub struct SqliteStateStore {
    pool: ConnectionPool,
    session_id: SessionId,
}

impl SqliteStateStore {
    /// Store scoped to `session_id`.
    pub fn new(pool: ConnectionPool, session_id: SessionId) -> Result<Self> {
        validate_session_id(&session_id)?;
        Ok(Self { pool, session_id })
    }
}

impl StateStore for SqliteStateStore {
    fn load(&self) -> Result<Option<SessionState>> {
        let conn = self.pool.get()?;
        StateRepo::get(&conn, &self.session_id)
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        let conn = self.pool.get()?;
        StateRepo::upsert(&conn, &self.session_id, state)
    }
}

/// The `external_mappings` table.
#[derive(Clone, Debug)]
pub struct SqliteMappingStore {
    pool: ConnectionPool,
}

impl SqliteMappingStore {
    /// Mapping store over `pool`.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }
}

impl MappingStore for SqliteMappingStore {
    fn load_all(&self) -> Result<Vec<ExternalMapping>> {
        let conn = self.pool.get()?;
        MappingRepo::list_all(&conn)
    }

    fn upsert(&self, mapping: &ExternalMapping) -> Result<()> {
        let conn = self.pool.get()?;
        MappingRepo::upsert(&conn, mapping)
    }

    fn remove(&self, session_id: &SessionId, external_id: &ExternalId) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = MappingRepo::delete(&conn, session_id, external_id)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
