//! `arbor` binary entry point.

#![deny(unsafe_code)]

use anyhow::{Context, Result};
use arbor_cli::{Cli, run};
use arbor_core::SessionId;
use arbor_store::StorageBackend;
use clap::Parser;

fn main() -> Result<()> {
    let args = Cli::parse();
    let settings = args.resolve_settings()?;

    if settings.logging.json {
        arbor_core::logging::init_json_subscriber(&settings.logging.level);
    } else {
        arbor_core::logging::init_subscriber(&settings.logging.level);
    }

    let backend =
        StorageBackend::from_settings(&settings.storage).context("Failed to open storage")?;
    tracing::debug!(backend = ?backend.kind(), session = %args.session, "storage ready");

    let session_id = SessionId::from(args.session.as_str());
    let output = run(args.command, &backend, &session_id, &settings.context)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
