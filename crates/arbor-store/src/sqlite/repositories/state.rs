//! Session pointer rows.

use arbor_core::{BranchId, MessageId, SessionId};
use rusqlite::{Connection, OptionalExtension, params};

use super::{format_ts, parse_ts};
use crate::errors::Result;
use crate::types::SessionState;

/// Session state repository. Stateless; every method takes `&Connection`.
pub struct StateRepo;

impl StateRepo {
    /// Read the session's state row.
    pub fn get(conn: &Connection, session_id: &SessionId) -> Result<Option<SessionState>> {
        let row = conn
            .query_row(
                "SELECT active_leaf_id, current_branch_id, created_at, updated_at, total_messages
                 FROM session_state WHERE session_id = ?1",
                params![session_id.as_str()],
                |row| {
                    let created: String = row.get(2)?;
                    let updated: String = row.get(3)?;
                    let total: i64 = row.get(4)?;
                    Ok(SessionState {
                        active_leaf_id: row.get::<_, Option<String>>(0)?.map(MessageId::from),
                        current_branch_id: row.get::<_, Option<String>>(1)?.map(BranchId::from),
                        created_at: parse_ts(2, &created)?,
                        updated_at: parse_ts(3, &updated)?,
                        total_messages: u64::try_from(total).unwrap_or(0),
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    /// Insert or replace the session's state row.
    pub fn upsert(conn: &Connection, session_id: &SessionId, state: &SessionState) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO session_state
               (session_id, active_leaf_id, current_branch_id, created_at, updated_at, total_messages)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(session_id) DO UPDATE SET
               active_leaf_id = excluded.active_leaf_id,
               current_branch_id = excluded.current_branch_id,
               created_at = excluded.created_at,
               updated_at = excluded.updated_at,
               total_messages = excluded.total_messages",
            params![
                session_id.as_str(),
                state.active_leaf_id.as_deref(),
                state.current_branch_id.as_deref(),
                format_ts(&state.created_at),
                format_ts(&state.updated_at),
                i64::try_from(state.total_messages).unwrap_or(i64::MAX),
            ],
        )?;
        Ok(())
    }
}
