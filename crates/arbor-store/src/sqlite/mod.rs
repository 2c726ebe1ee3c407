//! `SQLite` backend: one database file shared by every session, rows
//! scoped by `session_id`.

pub mod connection;
pub mod migrations;
pub mod repositories;
pub mod store;

use std::path::Path;

use tracing::info;

use crate::errors::Result;

pub use connection::{ConnectionConfig, ConnectionPool};
pub use store::{SqliteMappingStore, SqliteMessageStore, SqliteStateStore};

/// Open (creating if needed) a database file and bring its schema up to date.
pub fn open(path: &Path, config: &ConnectionConfig) -> Result<ConnectionPool> {
    let pool = connection::new_file(path, config)?;
    migrate(&pool)?;
    info!(path = %path.display(), "opened sqlite history store");
    Ok(pool)
}

/// Fresh in-memory database with the schema applied.
pub fn open_in_memory() -> Result<ConnectionPool> {
    let pool = connection::new_in_memory(&ConnectionConfig::default())?;
    migrate(&pool)?;
    Ok(pool)
}

fn migrate(pool: &ConnectionPool) -> Result<()> {
    let conn = pool.get()?;
    let _ = migrations::run_migrations(&conn)?;
    Ok(())
}
