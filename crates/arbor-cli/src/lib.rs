//! # arbor-cli
//!
//! The `arbor` binary: every branch operation of `arbor-store` as a
//! subcommand that prints JSON on stdout. Logs go to stderr.

#![deny(unsafe_code)]

pub mod cli;
pub mod commands;

pub use cli::{Cli, Command};
pub use commands::run;
