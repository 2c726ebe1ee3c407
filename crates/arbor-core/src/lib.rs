//! # arbor-core
//!
//! Foundation types shared by the arbor crates:
//!
//! - **Branded IDs**: `MessageId`, `SessionId`, `BranchId`, `ExternalId` as newtypes
//! - **Logging**: `tracing` subscriber initialization for binaries and tests

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;

pub use ids::{BranchId, ExternalId, MessageId, SessionId};
