//! Error types for the history store.
//!
//! [`StoreError`] is returned by every store, session and router operation.
//! [`StoreError::kind`] collapses the variants into the four outcomes a
//! caller acts on: not found, bad branch number, storage failure, invalid
//! request.

use std::path::PathBuf;

use thiserror::Error;

/// Coarse classification of a [`StoreError`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced message or external id does not exist.
    NotFound,
    /// A 1-based branch number is outside the current branch list.
    InvalidBranchIndex,
    /// Persistence failed; the operation was not applied.
    StorageFailure,
    /// The request itself is malformed or conflicts with stored data.
    Invalid,
}

/// Errors that can occur during history store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A message id given to `operation` does not exist in the session.
    #[error("{operation}: message not found: {id}")]
    MessageNotFound {
        /// Operation that looked the message up.
        operation: &'static str,
        /// Missing message id.
        id: String,
    },

    /// No message or mapping is known for an external id.
    #[error("no message mapped to external id {id}")]
    ExternalIdNotFound {
        /// External id that failed to resolve.
        id: String,
    },

    /// Branch number outside `1..=count`.
    #[error("{}", invalid_index_message(.index, .count))]
    InvalidBranchIndex {
        /// Requested 1-based number.
        index: usize,
        /// Number of branches at the time of the request.
        count: usize,
    },

    /// Filesystem I/O failed.
    #[error("{operation} failed for {}: {source}", .path.display())]
    Storage {
        /// What was being done (e.g. `append`, `rewrite`).
        operation: &'static str,
        /// File involved.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// `SQLite` database error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// JSON serialization/deserialization error.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Schema migration failed.
    #[error("migration error: {message}")]
    Migration {
        /// Describes which migration failed and why.
        message: String,
    },

    /// The external id is already attached to another message in the session.
    #[error("external id {external_id} already belongs to message {existing}")]
    DuplicateExternalId {
        /// Rejected external id.
        external_id: String,
        /// Message already carrying it.
        existing: String,
    },

    /// Session id would not map to a safe storage key.
    #[error("invalid session id {0:?}")]
    InvalidSessionId(String),

    /// Parent links loop back on themselves.
    #[error("corrupt tree: {0}")]
    CorruptTree(String),

    /// A chain that must be walked whole is longer than `context.maxWalk`.
    #[error("chain from {start} is longer than the walk limit of {max_walk}")]
    WalkLimit {
        /// Where the walk started.
        start: String,
        /// Configured limit.
        max_walk: usize,
    },
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn invalid_index_message(index: &usize, count: &usize) -> String {
    if *count == 0 {
        format!("invalid branch number {index}: there are no branches")
    } else {
        format!("invalid branch number {index}: valid branches are 1..={count}")
    }
}

impl StoreError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MessageNotFound { .. } | Self::ExternalIdNotFound { .. } => ErrorKind::NotFound,
            Self::InvalidBranchIndex { .. } => ErrorKind::InvalidBranchIndex,
            Self::Storage { .. }
            | Self::Sqlite(_)
            | Self::Pool(_)
            | Self::Serde(_)
            | Self::Migration { .. } => ErrorKind::StorageFailure,
            Self::DuplicateExternalId { .. }
            | Self::InvalidSessionId(_)
            | Self::CorruptTree(_)
            | Self::WalkLimit { .. } => ErrorKind::Invalid,
        }
    }

    /// Whether this is a not-found outcome.
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn not_found(operation: &'static str, id: impl Into<String>) -> Self {
        Self::MessageNotFound {
            operation,
            id: id.into(),
        }
    }

    pub(crate) fn io(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::Storage {
            operation,
            path: path.into(),
            source,
        }
    }
}

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_not_found_display() {
        let err = StoreError::not_found("switch_branch", "msg_1");
        assert_eq!(err.to_string(), "switch_branch: message not found: msg_1");
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn invalid_index_lists_range() {
        let err = StoreError::InvalidBranchIndex { index: 5, count: 3 };
        assert_eq!(
            err.to_string(),
            "invalid branch number 5: valid branches are 1..=3"
        );
        assert_eq!(err.kind(), ErrorKind::InvalidBranchIndex);
    }

    #[test]
    fn invalid_index_with_no_branches() {
        let err = StoreError::InvalidBranchIndex { index: 1, count: 0 };
        assert!(err.to_string().contains("no branches"));
    }

    #[test]
    fn storage_display_names_path() {
        let err = StoreError::io(
            "append",
            "/data/s.jsonl",
            std::io::Error::other("disk full"),
        );
        assert_eq!(err.to_string(), "append failed for /data/s.jsonl: disk full");
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn from_rusqlite_error() {
        let err: StoreError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, StoreError::Sqlite(_)));
        assert_eq!(err.kind(), ErrorKind::StorageFailure);
    }

    #[test]
    fn from_serde_error() {
        let serde_err = serde_json::from_str::<String>("bad").unwrap_err();
        let err: StoreError = serde_err.into();
        assert!(matches!(err, StoreError::Serde(_)));
    }

    #[test]
    fn invalid_kinds() {
        assert_eq!(
            StoreError::InvalidSessionId("../x".into()).kind(),
            ErrorKind::Invalid
        );
        assert_eq!(
            StoreError::CorruptTree("cycle at msg_1".into()).kind(),
            ErrorKind::Invalid
        );
        let dup = StoreError::DuplicateExternalId {
            external_id: "tg-1".into(),
            existing: "msg_1".into(),
        };
        assert_eq!(dup.kind(), ErrorKind::Invalid);
        assert!(dup.to_string().contains("tg-1"));

        let limit = StoreError::WalkLimit {
            start: "msg_9".into(),
            max_walk: 3,
        };
        assert_eq!(limit.kind(), ErrorKind::Invalid);
        assert_eq!(
            limit.to_string(),
            "chain from msg_9 is longer than the walk limit of 3"
        );
    }
}
