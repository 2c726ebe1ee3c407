//! `<session>.state.json` pointer record.

use std::path::{Path, PathBuf};

use arbor_core::SessionId;
use tracing::warn;

use super::{state_path, write_atomic};
use crate::errors::{Result, StoreError};
use crate::store::StateStore;
use crate::types::SessionState;

/// Pretty-printed JSON state file.
#[derive(Clone, Debug)]
pub struct JsonlStateStore {
    path: PathBuf,
}

impl JsonlStateStore {
    /// State file for `session_id` under `session_dir`.
    pub fn new(session_dir: &Path, session_id: &SessionId) -> Result<Self> {
        Ok(Self {
            path: state_path(session_dir, session_id)?,
        })
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonlStateStore {
    fn load(&self) -> Result<Option<SessionState>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io("load_state", &self.path, e)),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "state file unparsable, starting fresh");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &SessionState) -> Result<()> {
        let json = serde_json::to_vec_pretty(state)?;
        write_atomic(&self.path, &json, "save_state")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_core::MessageId;
    use chrono::Utc;

    #[test]
    fn missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStateStore::new(dir.path(), &SessionId::from("s")).unwrap();
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStateStore::new(dir.path(), &SessionId::from("s")).unwrap();
        let mut state = SessionState::new(Utc::now());
        state.active_leaf_id = Some(MessageId::from("m1"));
        state.total_messages = 3;
        store.save(&state).unwrap();
        assert_eq!(store.load().unwrap(), Some(state));

        let raw = std::fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\n  \"activeLeafId\": \"m1\""));
    }

    #[test]
    fn garbage_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonlStateStore::new(dir.path(), &SessionId::from("s")).unwrap();
        std::fs::write(store.path(), "{ broken").unwrap();
        assert_eq!(store.load().unwrap(), None);
    }
}
