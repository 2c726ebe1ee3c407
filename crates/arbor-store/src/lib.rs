//! # arbor-store
//!
//! Versioned, branching conversation history.
//!
//! Messages form a tree through `parent_id` links, so one conversation can
//! fork into alternative continuations, switch between them, merge one into
//! another, or prune a branch, while a single linear context can always be
//! rebuilt for model consumption.
//!
//! ## Architecture
//!
//! - **Storage** ([`store`], [`jsonl`], [`sqlite`]): append-only message log,
//!   per-session pointer state and the shared external id table, behind
//!   traits with a JSON-lines and a `SQLite` implementation.
//! - **Queries** ([`index`]): context chains, branch summaries and tree
//!   export, recomputed from a full scan.
//! - **Operations** ([`session`]): log, fork, switch, merge and delete.
//! - **Chat surfaces** ([`mapping`], [`router`]): external id mapping and
//!   reply-to-fork / numbered command handling.
//! - **Wiring** ([`factory`]): open a backend from
//!   [`arbor_settings::StorageSettings`].
//!
//! One writer per session; callers serialize operations. All operations are
//! synchronous.

#![deny(unsafe_code)]

pub mod errors;
pub mod factory;
pub mod index;
pub mod jsonl;
pub mod mapping;
pub mod router;
pub mod session;
pub mod sqlite;
pub mod state;
pub mod store;
pub mod types;

pub use errors::{ErrorKind, Result, StoreError};
pub use factory::StorageBackend;
pub use index::MessageIndex;
pub use mapping::ExternalIdMap;
pub use router::{BranchEntry, CheckoutOutcome, DeleteOutcome, ForkOutcome, MergeOutcome, Router};
pub use session::{BranchSession, LogOptions};
pub use state::SessionStateHandle;
pub use store::{MappingStore, MessageStore, StateStore};
pub use types::{BranchInfo, ExternalMapping, Message, Role, SessionState, TreeNode};
