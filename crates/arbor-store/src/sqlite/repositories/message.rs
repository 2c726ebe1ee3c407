//! Message rows.

use arbor_core::{BranchId, ExternalId, MessageId, SessionId};
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};

use super::{format_ts, parse_ts};
use crate::errors::Result;
use crate::types::{Message, Role};

const COLUMNS: &str = "id, parent_id, role, content, timestamp, branch_id, external_id";

/// Message repository. Stateless; every method takes `&Connection`.
pub struct MessageRepo;

impl MessageRepo {
    /// Insert one message at the end of the session's log.
    pub fn insert(conn: &Connection, session_id: &SessionId, message: &Message) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO messages (id, session_id, parent_id, role, content, timestamp, branch_id, external_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.id.as_str(),
                session_id.as_str(),
                message.parent_id.as_deref(),
                message.role.as_str(),
                message.content,
                format_ts(&message.timestamp),
                message.branch_id.as_deref(),
                message.external_id.as_deref(),
            ],
        )?;
        Ok(())
    }

    /// Get a message of the session by id.
    pub fn get_by_id(
        conn: &Connection,
        session_id: &SessionId,
        id: &MessageId,
    ) -> Result<Option<Message>> {
        let row = conn
            .query_row(
                &format!("SELECT {COLUMNS} FROM messages WHERE session_id = ?1 AND id = ?2"),
                params![session_id.as_str(), id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// Get a message of the session by external id.
    pub fn get_by_external_id(
        conn: &Connection,
        session_id: &SessionId,
        external_id: &ExternalId,
    ) -> Result<Option<Message>> {
        let row = conn
            .query_row(
                &format!(
                    "SELECT {COLUMNS} FROM messages WHERE session_id = ?1 AND external_id = ?2"
                ),
                params![session_id.as_str(), external_id.as_str()],
                Self::map_row,
            )
            .optional()?;
        Ok(row)
    }

    /// All messages of the session in append order.
    pub fn list_by_session(conn: &Connection, session_id: &SessionId) -> Result<Vec<Message>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM messages WHERE session_id = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt
            .query_map(params![session_id.as_str()], Self::map_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete every message of the session. Returns rows removed.
    pub fn delete_by_session(conn: &Connection, session_id: &SessionId) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM messages WHERE session_id = ?1",
            params![session_id.as_str()],
        )?)
    }

    /// Distinct session ids that have messages, sorted.
    pub fn list_sessions(conn: &Connection) -> Result<Vec<SessionId>> {
        let mut stmt =
            conn.prepare("SELECT DISTINCT session_id FROM messages ORDER BY session_id")?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0).map(SessionId::from))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn map_row(row: &Row<'_>) -> rusqlite::Result<Message> {
        let role: String = row.get(2)?;
        let role = role
            .parse::<Role>()
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, e.into()))?;
        let timestamp: String = row.get(4)?;
        Ok(Message {
            id: MessageId::from(row.get::<_, String>(0)?),
            parent_id: row.get::<_, Option<String>>(1)?.map(MessageId::from),
            role,
            content: row.get(3)?,
            timestamp: parse_ts(4, &timestamp)?,
            branch_id: row.get::<_, Option<String>>(5)?.map(BranchId::from),
            external_id: row.get::<_, Option<String>>(6)?.map(ExternalId::from),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::sqlite::migrations::run_migrations;
    use chrono::Utc;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        conn
    }

    #[test]
    fn insert_and_read_back_exactly() {
        let conn = setup();
        let s = SessionId::from("s1");
        let root = Message::new(None, Role::System, "be brief", Utc::now());
        let child = Message::new(Some(root.id.clone()), Role::User, "hi", Utc::now())
            .with_branch(Some(BranchId::from("alt")))
            .with_external_id(Some(ExternalId::from("tg-9")));
        MessageRepo::insert(&conn, &s, &root).unwrap();
        MessageRepo::insert(&conn, &s, &child).unwrap();

        assert_eq!(
            MessageRepo::get_by_id(&conn, &s, &child.id).unwrap(),
            Some(child.clone())
        );
        assert_eq!(
            MessageRepo::get_by_external_id(&conn, &s, &ExternalId::from("tg-9")).unwrap(),
            Some(child.clone())
        );
        assert_eq!(
            MessageRepo::list_by_session(&conn, &s).unwrap(),
            vec![root, child]
        );
    }

    #[test]
    fn sessions_are_isolated() {
        let conn = setup();
        let a = SessionId::from("a");
        let b = SessionId::from("b");
        let m = Message::new(None, Role::User, "x", Utc::now());
        MessageRepo::insert(&conn, &a, &m).unwrap();

        assert_eq!(MessageRepo::get_by_id(&conn, &b, &m.id).unwrap(), None);
        assert!(MessageRepo::list_by_session(&conn, &b).unwrap().is_empty());
        assert_eq!(MessageRepo::list_sessions(&conn).unwrap(), vec![a.clone()]);

        assert_eq!(MessageRepo::delete_by_session(&conn, &b).unwrap(), 0);
        assert_eq!(MessageRepo::delete_by_session(&conn, &a).unwrap(), 1);
    }
}
