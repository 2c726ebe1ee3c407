//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` and `#[serde(default)]`
//! so a settings file only needs the fields it overrides.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root directory for arbor data (`~/.arbor`).
pub fn arbor_home() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".arbor")
}

/// Root settings type.
///
/// # JSON Format
///
/// ```json
/// {
///   "storage": { "backend": "sqlite", "databasePath": "/var/lib/arbor/arbor.db" },
///   "context": { "defaultLimit": 50 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ArborSettings {
    /// Settings schema version.
    pub version: String,
    /// Where and how messages, state and mappings are persisted.
    pub storage: StorageSettings,
    /// Context reconstruction limits.
    pub context: ContextSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for ArborSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            storage: StorageSettings::default(),
            context: ContextSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl ArborSettings {
    /// Correct values that would make the store unusable.
    ///
    /// Called automatically during loading. Zero limits are replaced with
    /// their defaults and a warning is logged.
    pub fn validate(&mut self) {
        fn non_zero(val: &mut usize, default: usize, name: &str) {
            if *val == 0 {
                tracing::warn!("{name} must be positive, using {default}");
                *val = default;
            }
        }

        let defaults = ContextSettings::default();
        non_zero(
            &mut self.context.default_limit,
            defaults.default_limit,
            "context.defaultLimit",
        );
        non_zero(&mut self.context.max_walk, defaults.max_walk, "context.maxWalk");

        if self.storage.pool_size == 0 {
            tracing::warn!("storage.poolSize must be positive, using 1");
            self.storage.pool_size = 1;
        }
    }
}

/// Which persistence backend holds the message log.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackendKind {
    /// One append-only JSON-lines file plus one state file per session.
    #[default]
    Jsonl,
    /// One `SQLite` database shared by all sessions.
    Sqlite,
}

impl std::str::FromStr for StorageBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "jsonl" => Ok(Self::Jsonl),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown storage backend '{other}'")),
        }
    }
}

/// Storage settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StorageSettings {
    /// Backend selection.
    pub backend: StorageBackendKind,
    /// Directory holding `<session>.jsonl` and `<session>.state.json` files.
    pub session_dir: PathBuf,
    /// `SQLite` database file (sqlite backend).
    pub database_path: PathBuf,
    /// Cross-session external-id mapping file (jsonl backend).
    /// Defaults to `<sessionDir>/message-mappings.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mappings_path: Option<PathBuf>,
    /// Connection pool size (sqlite backend).
    pub pool_size: u32,
    /// Busy timeout in milliseconds (sqlite backend).
    pub busy_timeout_ms: u32,
}

impl Default for StorageSettings {
    fn default() -> Self {
        let home = arbor_home();
        Self {
            backend: StorageBackendKind::Jsonl,
            session_dir: home.join("sessions"),
            database_path: home.join("database").join("arbor.db"),
            mappings_path: None,
            pool_size: 4,
            busy_timeout_ms: 30_000,
        }
    }
}

impl StorageSettings {
    /// The mapping file path with the default applied.
    pub fn resolved_mappings_path(&self) -> PathBuf {
        self.mappings_path
            .clone()
            .unwrap_or_else(|| self.session_dir.join("message-mappings.json"))
    }
}

/// Context reconstruction settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextSettings {
    /// Messages returned by a context load when the caller gives no limit.
    pub default_limit: usize,
    /// Upper bound on any ancestor walk; guards against corrupted parent links.
    pub max_walk: usize,
}

impl Default for ContextSettings {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_walk: 10_000,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Minimum level (`trace`, `debug`, `info`, `warn`, `error`).
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ArborSettings::default();
        assert_eq!(s.storage.backend, StorageBackendKind::Jsonl);
        assert_eq!(s.context.default_limit, 100);
        assert_eq!(s.context.max_walk, 10_000);
        assert_eq!(s.logging.level, "warn");
        assert!(s.storage.session_dir.ends_with(".arbor/sessions"));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let s: ArborSettings =
            serde_json::from_str(r#"{"storage": {"backend": "sqlite"}}"#).unwrap();
        assert_eq!(s.storage.backend, StorageBackendKind::Sqlite);
        assert_eq!(s.storage.pool_size, 4);
        assert_eq!(s.context, ContextSettings::default());
    }

    #[test]
    fn mappings_path_defaults_under_session_dir() {
        let storage = StorageSettings {
            session_dir: PathBuf::from("/data/sessions"),
            ..StorageSettings::default()
        };
        assert_eq!(
            storage.resolved_mappings_path(),
            PathBuf::from("/data/sessions/message-mappings.json")
        );
    }

    #[test]
    fn validate_replaces_zero_limits() {
        let mut s = ArborSettings::default();
        s.context.default_limit = 0;
        s.context.max_walk = 0;
        s.storage.pool_size = 0;
        s.validate();
        assert_eq!(s.context.default_limit, 100);
        assert_eq!(s.context.max_walk, 10_000);
        assert_eq!(s.storage.pool_size, 1);
    }

    #[test]
    fn backend_from_str() {
        assert_eq!("SQLite".parse::<StorageBackendKind>(), Ok(StorageBackendKind::Sqlite));
        assert!("redis".parse::<StorageBackendKind>().is_err());
    }
}
