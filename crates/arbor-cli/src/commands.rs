//! Command execution against an opened backend.

use anyhow::{Context, Result};
use arbor_core::{ExternalId, MessageId, SessionId};
use arbor_settings::ContextSettings;
use arbor_store::{LogOptions, Router, StorageBackend};
use serde_json::{Value, json};

use crate::cli::Command;

/// Run `command` on `session_id` and return its JSON result.
pub fn run(
    command: Command,
    backend: &StorageBackend,
    session_id: &SessionId,
    context: &ContextSettings,
) -> Result<Value> {
    let open = || -> Result<Router> {
        backend
            .open_router(session_id, context)
            .with_context(|| format!("Failed to open session {session_id}"))
    };

    let value = match command {
        Command::Sessions => {
            serde_json::to_value(backend.list_sessions().context("Failed to list sessions")?)?
        }
        Command::Log {
            role,
            content,
            parent,
            external,
        } => {
            let mut options = LogOptions::default();
            if let Some(parent) = parent {
                options = options.parent(MessageId::from(parent));
            }
            if let Some(external) = external {
                options = options.external(ExternalId::from(external));
            }
            let message = open()?.session_mut().log_message(role, content, options)?;
            serde_json::to_value(message)?
        }
        Command::Fork { parent, name } => {
            let branch = open()?
                .session_mut()
                .fork_branch(&MessageId::from(parent), name.as_deref())?;
            json!({ "branchId": branch })
        }
        Command::Switch { leaf } => {
            let mut router = open()?;
            router.session_mut().switch_branch(&MessageId::from(leaf))?;
            serde_json::to_value(router.session().state())?
        }
        Command::Branches => serde_json::to_value(open()?.list()?)?,
        Command::Checkout { number } => serde_json::to_value(open()?.checkout(number)?)?,
        Command::Merge { number } => serde_json::to_value(open()?.merge(number)?)?,
        Command::DeleteBranch { number, confirm } => {
            serde_json::to_value(open()?.delete(number, confirm)?)?
        }
        Command::Context { limit } => serde_json::to_value(open()?.session().load_context(limit)?)?,
        Command::Tree => serde_json::to_value(open()?.session().export_tree()?)?,
        Command::State => serde_json::to_value(open()?.session().state())?,
        Command::Record {
            role,
            external,
            content,
        } => serde_json::to_value(open()?.record(role, content, ExternalId::from(external))?)?,
        Command::ReplyFork { external, name } => serde_json::to_value(
            open()?.fork_from_reply(&ExternalId::from(external), name.as_deref())?,
        )?,
    };
    Ok(value)
}
