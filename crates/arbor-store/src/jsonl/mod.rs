//! File backend: one JSON-lines log and one state file per session, plus a
//! shared mapping file.
//!
//! ```text
//! <session_dir>/<session>.jsonl          messages, one per line, append order
//! <session_dir>/<session>.state.json     pretty-printed SessionState
//! <session_dir>/message-mappings.json    ExternalMapping array (default path)
//! ```
//!
//! Appends are `O_APPEND` writes followed by `fsync`. Whole-file writes go
//! through a temp file in the same directory that is synced and renamed
//! over the target, so readers see either the old or the new file.

mod mapping;
mod messages;
mod state;

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use arbor_core::SessionId;
use tempfile::NamedTempFile;

use crate::errors::{Result, StoreError};
use crate::store::validate_session_id;

pub use mapping::JsonMappingStore;
pub use messages::JsonlMessageStore;
pub use state::JsonlStateStore;

/// Path of a session's message log.
pub fn log_path(session_dir: &Path, session_id: &SessionId) -> Result<PathBuf> {
    validate_session_id(session_id)?;
    Ok(session_dir.join(format!("{session_id}.jsonl")))
}

/// Path of a session's state file.
pub fn state_path(session_dir: &Path, session_id: &SessionId) -> Result<PathBuf> {
    validate_session_id(session_id)?;
    Ok(session_dir.join(format!("{session_id}.state.json")))
}

/// Session ids that have a log file in `session_dir`, sorted.
pub fn list_sessions(session_dir: &Path) -> Result<Vec<SessionId>> {
    let entries = match fs::read_dir(session_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(StoreError::io("list_sessions", session_dir, e)),
    };

    let mut ids: Vec<SessionId> = entries
        .filter_map(std::result::Result::ok)
        .filter_map(|entry| {
            let name = entry.file_name().into_string().ok()?;
            name.strip_suffix(".jsonl").map(SessionId::from)
        })
        .filter(|id| validate_session_id(id).is_ok())
        .collect();
    ids.sort();
    Ok(ids)
}

fn ensure_parent(path: &Path, operation: &'static str) -> Result<PathBuf> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    if !parent.as_os_str().is_empty() {
        fs::create_dir_all(parent).map_err(|e| StoreError::io(operation, parent, e))?;
    }
    Ok(parent.to_path_buf())
}

/// Replace `path` with `contents` via temp file, fsync and rename.
pub(crate) fn write_atomic(path: &Path, contents: &[u8], operation: &'static str) -> Result<()> {
    let parent = ensure_parent(path, operation)?;
    let io_err = |e: std::io::Error| StoreError::io(operation, path, e);

    let mut tmp = NamedTempFile::new_in(&parent).map_err(io_err)?;
    tmp.write_all(contents).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    let _ = tmp.persist(path).map_err(|e| io_err(e.error))?;

    // best effort: persist the rename itself
    if let Ok(dir) = fs::File::open(&parent) {
        let _ = dir.sync_all();
    }
    Ok(())
}
