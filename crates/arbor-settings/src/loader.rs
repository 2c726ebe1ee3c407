//! Settings loading: defaults, deep-merged user file, then env overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::{ArborSettings, StorageBackendKind, arbor_home};

/// Path of the user settings file (`~/.arbor/settings.json`).
pub fn settings_path() -> PathBuf {
    arbor_home().join("settings.json")
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key. Any other overlay value (including arrays)
/// replaces the base value. `null` in the overlay is ignored so a file can
/// leave a field unset without clobbering the default.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (base, Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Load settings from the default path with environment overrides applied.
pub fn load_settings() -> Result<ArborSettings> {
    let settings = load_settings_from_path(&settings_path())?;
    apply_env_overrides(settings, |var| std::env::var(var).ok())
}

/// Load settings from an explicit file path.
///
/// A missing file yields the defaults. A file that exists but does not
/// parse is an error. Environment overrides are not applied here.
pub fn load_settings_from_path(path: &Path) -> Result<ArborSettings> {
    let defaults = serde_json::to_value(ArborSettings::default())?;

    let merged = match std::fs::read_to_string(path) {
        Ok(raw) => {
            let user: Value = serde_json::from_str(&raw)?;
            debug!(path = %path.display(), "loaded user settings");
            deep_merge(defaults, user)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no settings file, using defaults");
            defaults
        }
        Err(source) => {
            return Err(SettingsError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let mut settings: ArborSettings = serde_json::from_value(merged)?;
    settings.validate();
    Ok(settings)
}

/// Apply `ARBOR_*` overrides using `lookup` to read variables.
///
/// | Variable | Field |
/// |---|---|
/// | `ARBOR_BACKEND` | `storage.backend` |
/// | `ARBOR_SESSION_DIR` | `storage.sessionDir` |
/// | `ARBOR_DATABASE_PATH` | `storage.databasePath` |
/// | `ARBOR_MAPPINGS_PATH` | `storage.mappingsPath` |
/// | `ARBOR_CONTEXT_LIMIT` | `context.defaultLimit` |
/// | `ARBOR_LOG_LEVEL` | `logging.level` |
///
/// Empty values are ignored.
pub fn apply_env_overrides(
    mut settings: ArborSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<ArborSettings> {
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("ARBOR_BACKEND") {
        settings.storage.backend = v
            .parse::<StorageBackendKind>()
            .map_err(|_| SettingsError::InvalidEnv {
                var: "ARBOR_BACKEND",
                value: v.clone(),
            })?;
    }
    if let Some(v) = get("ARBOR_SESSION_DIR") {
        settings.storage.session_dir = PathBuf::from(v);
    }
    if let Some(v) = get("ARBOR_DATABASE_PATH") {
        settings.storage.database_path = PathBuf::from(v);
    }
    if let Some(v) = get("ARBOR_MAPPINGS_PATH") {
        settings.storage.mappings_path = Some(PathBuf::from(v));
    }
    if let Some(v) = get("ARBOR_CONTEXT_LIMIT") {
        settings.context.default_limit =
            v.trim()
                .parse::<usize>()
                .map_err(|_| SettingsError::InvalidEnv {
                    var: "ARBOR_CONTEXT_LIMIT",
                    value: v.clone(),
                })?;
    }
    if let Some(v) = get("ARBOR_LOG_LEVEL") {
        settings.logging.level = v;
    }

    settings.validate();
    Ok(settings)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
