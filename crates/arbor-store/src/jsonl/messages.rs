//! JSON-lines message log.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use arbor_core::{ExternalId, MessageId, SessionId};
use tracing::{debug, warn};

use super::{ensure_parent, log_path, write_atomic};
use crate::errors::{Result, StoreError};
use crate::store::MessageStore;
use crate::types::Message;

/// Append-only `<session>.jsonl` log.
#[derive(Clone, Debug)]
pub struct JsonlMessageStore {
    path: PathBuf,
}

impl JsonlMessageStore {
    /// Store for `session_id` under `session_dir`. Nothing is created until
    /// the first write.
    pub fn new(session_dir: &Path, session_id: &SessionId) -> Result<Self> {
        Ok(Self {
            path: log_path(session_dir, session_id)?,
        })
    }

    /// Store backed by an explicit file.
    pub fn at_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Raw file bytes. Missing file is empty; an unreadable file is logged
    /// and treated as empty.
    fn read_raw(&self) -> Vec<u8> {
        match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "message log unreadable, treating as empty");
                Vec::new()
            }
        }
    }

    fn encode(messages: &[Message]) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for message in messages {
            serde_json::to_writer(&mut buf, message)?;
            buf.push(b'\n');
        }
        Ok(buf)
    }

    fn append_bytes(&self, bytes: &[u8]) -> Result<()> {
        let _ = ensure_parent(&self.path, "append")?;
        let io_err = |e: std::io::Error| StoreError::io("append", &self.path, e);

        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(io_err)?;

        // a torn final line from an earlier crash must not swallow this record
        if ends_without_newline(&mut file).map_err(io_err)? {
            file.write_all(b"\n").map_err(io_err)?;
        }
        file.write_all(bytes).map_err(io_err)?;
        file.sync_data().map_err(io_err)?;
        Ok(())
    }
}

fn ends_without_newline(file: &mut File) -> std::io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let _ = file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Parse a log, skipping blank and malformed lines.
fn parse_lines(path: &Path, raw: &[u8]) -> Vec<Message> {
    let text = String::from_utf8_lossy(raw);
    let mut messages = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<Message>(line) {
            Ok(message) => messages.push(message),
            Err(e) => warn!(
                path = %path.display(),
                line = idx + 1,
                error = %e,
                "skipping malformed message line"
            ),
        }
    }
    messages
}

impl MessageStore for JsonlMessageStore {
    fn append(&self, message: &Message) -> Result<()> {
        let bytes = Self::encode(std::slice::from_ref(message))?;
        self.append_bytes(&bytes)?;
        debug!(id = %message.id, path = %self.path.display(), "appended message");
        Ok(())
    }

    fn append_all(&self, messages: &[Message]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        // whole-file replace keeps a batch all-or-nothing
        let mut contents = self.read_raw();
        if contents.last().is_some_and(|b| *b != b'\n') {
            contents.push(b'\n');
        }
        contents.extend(Self::encode(messages)?);
        write_atomic(&self.path, &contents, "append")?;
        debug!(count = messages.len(), path = %self.path.display(), "appended batch");
        Ok(())
    }

    fn find(&self, id: &MessageId) -> Result<Option<Message>> {
        Ok(self.scan_all()?.into_iter().find(|m| &m.id == id))
    }

    fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Message>> {
        Ok(self
            .scan_all()?
            .into_iter()
            .find(|m| m.external_id.as_ref() == Some(external_id)))
    }

    fn scan_all(&self) -> Result<Vec<Message>> {
        Ok(parse_lines(&self.path, &self.read_raw()))
    }

    fn rewrite(&self, messages: &[Message]) -> Result<()> {
        write_atomic(&self.path, &Self::encode(messages)?, "rewrite")?;
        debug!(count = messages.len(), path = %self.path.display(), "rewrote message log");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
