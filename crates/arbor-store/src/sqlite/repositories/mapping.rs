//! External id mapping rows.

use arbor_core::{ExternalId, MessageId, SessionId};
use rusqlite::{Connection, params};

use super::{format_ts, parse_ts};
use crate::errors::Result;
use crate::types::ExternalMapping;

/// Mapping repository. Stateless; every method takes `&Connection`.
pub struct MappingRepo;

impl MappingRepo {
    /// All mappings, ordered by session then external id.
    pub fn list_all(conn: &Connection) -> Result<Vec<ExternalMapping>> {
        let mut stmt = conn.prepare(
            "SELECT external_id, internal_id, session_id, timestamp
             FROM external_mappings ORDER BY session_id, external_id",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let ts: String = row.get(3)?;
                Ok(ExternalMapping {
                    external_id: ExternalId::from(row.get::<_, String>(0)?),
                    internal_id: MessageId::from(row.get::<_, String>(1)?),
                    session_id: SessionId::from(row.get::<_, String>(2)?),
                    timestamp: parse_ts(3, &ts)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Insert or overwrite the mapping for `(session_id, external_id)`.
    pub fn upsert(conn: &Connection, mapping: &ExternalMapping) -> Result<()> {
        let _ = conn.execute(
            "INSERT INTO external_mappings (session_id, external_id, internal_id, timestamp)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(session_id, external_id) DO UPDATE SET
               internal_id = excluded.internal_id,
               timestamp = excluded.timestamp",
            params![
                mapping.session_id.as_str(),
                mapping.external_id.as_str(),
                mapping.internal_id.as_str(),
                format_ts(&mapping.timestamp),
            ],
        )?;
        Ok(())
    }

    /// Delete one mapping. Returns rows removed.
    pub fn delete(
        conn: &Connection,
        session_id: &SessionId,
        external_id: &ExternalId,
    ) -> Result<usize> {
        Ok(conn.execute(
            "DELETE FROM external_mappings WHERE session_id = ?1 AND external_id = ?2",
            params![session_id.as_str(), external_id.as_str()],
        )?)
    }
}
