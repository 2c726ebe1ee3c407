//! # arbor-settings
//!
//! Configuration for the arbor history store, loaded from three layers
//! (in priority order):
//!
//! 1. **Compiled defaults**: [`ArborSettings::default()`]
//! 2. **User file**: `~/.arbor/settings.json` (deep-merged over defaults)
//! 3. **Environment variables**: `ARBOR_*` overrides (highest priority)
//!
//! There is no process-wide settings cache. Callers load an
//! [`ArborSettings`] once and pass it (or the section they need) to the
//! components they construct.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    apply_env_overrides, deep_merge, load_settings, load_settings_from_path, settings_path,
};
pub use types::*;
