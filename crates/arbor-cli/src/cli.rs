//! Argument definitions and settings resolution.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use arbor_settings::{ArborSettings, StorageBackendKind};
use arbor_store::Role;
use clap::{Parser, Subcommand};

/// Inspect and edit branching conversation histories.
#[derive(Parser, Debug)]
#[command(name = "arbor", about = "Branching conversation history store", version)]
pub struct Cli {
    /// Session to operate on.
    #[arg(long, short, global = true, default_value = "default")]
    pub session: String,

    /// Settings file (defaults to `~/.arbor/settings.json`).
    #[arg(long, global = true)]
    pub settings: Option<PathBuf>,

    /// Storage backend (overrides settings).
    #[arg(long, global = true)]
    pub backend: Option<StorageBackendKind>,

    /// Directory for session files and the database (overrides settings).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands. Every one prints a JSON document on stdout.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Append a message under the current branch.
    Log {
        /// Author role: user, assistant or system.
        #[arg(long, default_value = "user")]
        role: Role,
        /// Message text.
        content: String,
        /// Explicit parent id (defaults to the active leaf).
        #[arg(long)]
        parent: Option<String>,
        /// External id to attach.
        #[arg(long)]
        external: Option<String>,
    },
    /// Start a new branch at a message.
    Fork {
        /// Message to branch from.
        parent: String,
        /// Branch name (generated when absent).
        #[arg(long)]
        name: Option<String>,
    },
    /// Make a message the active leaf.
    Switch {
        /// Message id.
        leaf: String,
    },
    /// List branches, numbered from 1.
    Branches,
    /// Switch to a branch by number.
    Checkout {
        /// Branch number as shown by `branches`.
        number: usize,
    },
    /// Copy a branch onto the active leaf.
    Merge {
        /// Branch number as shown by `branches`.
        number: usize,
    },
    /// Delete a branch by number.
    DeleteBranch {
        /// Branch number as shown by `branches`.
        number: usize,
        /// Actually delete; without this only a confirmation request is printed.
        #[arg(long)]
        confirm: bool,
    },
    /// Print the active context, root first.
    Context {
        /// Maximum number of messages (defaults to `context.defaultLimit`).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Print the whole message tree.
    Tree,
    /// Print the session state record.
    State,
    /// Log a message and map its external id.
    Record {
        /// Author role: user, assistant or system.
        #[arg(long, default_value = "user")]
        role: Role,
        /// External id assigned by the chat surface.
        #[arg(long)]
        external: String,
        /// Message text.
        content: String,
    },
    /// Fork from the message a chat reply points at.
    ReplyFork {
        /// External id of the replied-to message.
        external: String,
        /// Branch name (generated when absent).
        #[arg(long)]
        name: Option<String>,
    },
    /// List sessions with stored messages.
    Sessions,
}

impl Cli {
    /// Load settings and apply the command-line overrides.
    pub fn resolve_settings(&self) -> Result<ArborSettings> {
        let path = self
            .settings
            .clone()
            .unwrap_or_else(arbor_settings::settings_path);
        let settings = arbor_settings::load_settings_from_path(&path)
            .with_context(|| format!("Failed to load settings from {}", path.display()))?;
        let settings = arbor_settings::apply_env_overrides(settings, |var| std::env::var(var).ok())
            .context("Invalid ARBOR_* environment override")?;
        Ok(self.apply_overrides(settings))
    }

    /// Apply `--backend` and `--data-dir` over `settings`.
    pub fn apply_overrides(&self, mut settings: ArborSettings) -> ArborSettings {
        if let Some(backend) = self.backend {
            settings.storage.backend = backend;
        }
        if let Some(dir) = &self.data_dir {
            place_under(&mut settings, dir);
        }
        settings
    }
}

fn place_under(settings: &mut ArborSettings, dir: &Path) {
    settings.storage.session_dir = dir.to_path_buf();
    settings.storage.database_path = dir.join("arbor.db");
    settings.storage.mappings_path = None;
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
