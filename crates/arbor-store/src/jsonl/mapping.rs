//! Shared external id mapping file.

use std::path::{Path, PathBuf};

use arbor_core::{ExternalId, SessionId};
use chrono::Utc;
use tracing::warn;

use super::write_atomic;
use crate::errors::{Result, StoreError};
use crate::store::MappingStore;
use crate::types::ExternalMapping;

/// JSON array of [`ExternalMapping`] records, rewritten whole on every change.
///
/// A file that does not parse is moved aside on load and the table starts
/// empty.
#[derive(Clone, Debug)]
pub struct JsonMappingStore {
    path: PathBuf,
}

impl JsonMappingStore {
    /// Mapping file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move an unparsable file to `<name>.corrupt-<timestamp>` so the next
    /// write cannot drop other sessions' rows with it.
    fn quarantine(&self) -> Result<PathBuf> {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let target = self.path.with_file_name(format!(
            "{name}.corrupt-{}",
            Utc::now().format("%Y%m%dT%H%M%S%3f")
        ));
        std::fs::rename(&self.path, &target)
            .map_err(|e| StoreError::io("quarantine_mappings", &self.path, e))?;
        Ok(target)
    }

    fn write(&self, mappings: &[ExternalMapping]) -> Result<()> {
        let json = serde_json::to_vec_pretty(mappings)?;
        write_atomic(&self.path, &json, "save_mappings")
    }
}

impl MappingStore for JsonMappingStore {
    fn load_all(&self) -> Result<Vec<ExternalMapping>> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io("load_mappings", &self.path, e)),
        };
        match serde_json::from_str(&raw) {
            Ok(mappings) => Ok(mappings),
            Err(e) => {
                let moved_to = self.quarantine()?;
                warn!(
                    path = %self.path.display(),
                    moved_to = %moved_to.display(),
                    error = %e,
                    "mapping file unparsable, moved aside"
                );
                Ok(Vec::new())
            }
        }
    }

    fn upsert(&self, mapping: &ExternalMapping) -> Result<()> {
        let mut all = self.load_all()?;
        match all.iter_mut().find(|m| {
            m.session_id == mapping.session_id && m.external_id == mapping.external_id
        }) {
            Some(existing) => existing.clone_from(mapping),
            None => all.push(mapping.clone()),
        }
        self.write(&all)
    }

    fn remove(&self, session_id: &SessionId, external_id: &ExternalId) -> Result<()> {
        let mut all = self.load_all()?;
        let before = all.len();
        all.retain(|m| !(&m.session_id == session_id && &m.external_id == external_id));
        if all.len() == before {
            return Ok(());
        }
        self.write(&all)
    }
}
