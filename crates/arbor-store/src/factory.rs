//! Backend selection from settings.

use std::path::{Path, PathBuf};

use arbor_core::SessionId;
use arbor_settings::{ContextSettings, StorageBackendKind, StorageSettings};
use tracing::debug;

use crate::errors::Result;
use crate::jsonl::{self, JsonMappingStore, JsonlMessageStore, JsonlStateStore};
use crate::mapping::ExternalIdMap;
use crate::router::Router;
use crate::session::BranchSession;
use crate::sqlite::{
    self, ConnectionConfig, ConnectionPool, SqliteMappingStore, SqliteMessageStore,
    SqliteStateStore,
};
use crate::sqlite::repositories::MessageRepo;
use crate::store::{MappingStore, MessageStore, StateStore};

/// An opened storage backend that hands out per-session stores.
#[derive(Clone, Debug)]
pub enum StorageBackend {
    /// JSON-lines files in one directory.
    Jsonl {
        /// Directory holding per-session files.
        session_dir: PathBuf,
        /// Shared external id mapping file.
        mappings_path: PathBuf,
    },
    /// One `SQLite` database.
    Sqlite {
        /// Pool over the database.
        pool: ConnectionPool,
    },
}

impl StorageBackend {
    /// Open the backend selected by `settings`.
    pub fn from_settings(settings: &StorageSettings) -> Result<Self> {
        match settings.backend {
            StorageBackendKind::Jsonl => Ok(Self::jsonl(
                &settings.session_dir,
                settings.resolved_mappings_path(),
            )),
            StorageBackendKind::Sqlite => {
                let pool = sqlite::open(&settings.database_path, &ConnectionConfig::from(settings))?;
                Ok(Self::Sqlite { pool })
            }
        }
    }

    /// File backend rooted at `session_dir`.
    pub fn jsonl(session_dir: &Path, mappings_path: impl Into<PathBuf>) -> Self {
        Self::Jsonl {
            session_dir: session_dir.to_path_buf(),
            mappings_path: mappings_path.into(),
        }
    }

    /// Fresh in-memory `SQLite` backend.
    pub fn sqlite_in_memory() -> Result<Self> {
        Ok(Self::Sqlite {
            pool: sqlite::open_in_memory()?,
        })
    }

    /// Backend kind.
    pub fn kind(&self) -> StorageBackendKind {
        match self {
            Self::Jsonl { .. } => StorageBackendKind::Jsonl,
            Self::Sqlite { .. } => StorageBackendKind::Sqlite,
        }
    }

    /// Message log of `session_id`.
    pub fn message_store(&self, session_id: &SessionId) -> Result<Box<dyn MessageStore>> {
        Ok(match self {
            Self::Jsonl { session_dir, .. } => {
                Box::new(JsonlMessageStore::new(session_dir, session_id)?)
            }
            Self::Sqlite { pool } => {
                Box::new(SqliteMessageStore::new(pool.clone(), session_id.clone())?)
            }
        })
    }

    /// State record of `session_id`.
    pub fn state_store(&self, session_id: &SessionId) -> Result<Box<dyn StateStore>> {
        Ok(match self {
            Self::Jsonl { session_dir, .. } => {
                Box::new(JsonlStateStore::new(session_dir, session_id)?)
            }
            Self::Sqlite { pool } => {
                Box::new(SqliteStateStore::new(pool.clone(), session_id.clone())?)
            }
        })
    }

    /// Shared mapping table.
    pub fn mapping_store(&self) -> Box<dyn MappingStore> {
        match self {
            Self::Jsonl { mappings_path, .. } => Box::new(JsonMappingStore::new(mappings_path)),
            Self::Sqlite { pool } => Box::new(SqliteMappingStore::new(pool.clone())),
        }
    }

    /// Open `session_id` for branch operations.
    pub fn open_session(
        &self,
        session_id: &SessionId,
        context: &ContextSettings,
    ) -> Result<BranchSession> {
        debug!(session_id = %session_id, backend = ?self.kind(), "opening session");
        BranchSession::open(
            session_id.clone(),
            self.message_store(session_id)?,
            self.state_store(session_id)?,
            context.clone(),
        )
    }

    /// Open `session_id` with its external id table for reply and command
    /// handling.
    pub fn open_router(&self, session_id: &SessionId, context: &ContextSettings) -> Result<Router> {
        let session = self.open_session(session_id, context)?;
        let mappings = ExternalIdMap::load(session_id.clone(), self.mapping_store())?;
        Router::new(session, mappings)
    }

    /// Sessions that have stored messages.
    pub fn list_sessions(&self) -> Result<Vec<SessionId>> {
        match self {
            Self::Jsonl { session_dir, .. } => jsonl::list_sessions(session_dir),
            Self::Sqlite { pool } => {
                let conn = pool.get()?;
                MessageRepo::list_sessions(&conn)
            }
        }
    }
}

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::session::LogOptions;
    use crate::types::Role;

    #[test]
    fn jsonl_from_settings_uses_session_dir() {
        let dir = tempfile::tempdir().unwrap();
        let settings = StorageSettings {
            session_dir: dir.path().to_path_buf(),
            ..StorageSettings::default()
        };
        let backend = StorageBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.kind(), StorageBackendKind::Jsonl);

        let sid = SessionId::from("s1");
        let mut session = backend
            .open_session(&sid, &ContextSettings::default())
            .unwrap();
        session
            .log_message(Role::User, "hi", LogOptions::default())
            .unwrap();
        assert!(dir.path().join("s1.jsonl").exists());
        assert!(dir.path().join("s1.state.json").exists());
        assert_eq!(backend.list_sessions().unwrap(), vec![sid]);
    }

    #[test]
    fn sqlite_from_settings_creates_database() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("arbor.db");
        let settings = StorageSettings {
            backend: StorageBackendKind::Sqlite,
            database_path: db.clone(),
            ..StorageSettings::default()
        };
        let backend = StorageBackend::from_settings(&settings).unwrap();
        assert_eq!(backend.kind(), StorageBackendKind::Sqlite);

        for name in ["b", "a"] {
            let mut s = backend
                .open_session(&SessionId::from(name), &ContextSettings::default())
                .unwrap();
            s.log_message(Role::User, name, LogOptions::default()).unwrap();
        }
        assert!(db.exists());
        assert_eq!(
            backend.list_sessions().unwrap(),
            vec![SessionId::from("a"), SessionId::from("b")]
        );
    }

    #[test]
    fn invalid_session_id_rejected_by_both() {
        let dir = tempfile::tempdir().unwrap();
        let backends = [
            StorageBackend::jsonl(dir.path(), dir.path().join("m.json")),
            StorageBackend::sqlite_in_memory().unwrap(),
        ];
        for backend in &backends {
            assert!(
                backend
                    .open_session(&SessionId::from("../x"), &ContextSettings::default())
                    .is_err()
            );
        }
    }
}
