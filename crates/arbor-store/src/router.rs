//! Chat-surface command flows on top of [`BranchSession`].
//!
//! A chat adapter records each turn with the platform's message id, lets a
//! user reply to an old message to fork from it, and drives numbered
//! `checkout` / `merge` / `delete` commands. Numbers are 1-based positions
//! in [`BranchSession::branches`] order at the time of the call.
//!
//! Every method returns a structured outcome; rendering text for a chat
//! surface is the adapter's job.

use arbor_core::{BranchId, ExternalId, MessageId};
use serde::Serialize;
use tracing::{debug, warn};

use crate::errors::{Result, StoreError};
use crate::mapping::ExternalIdMap;
use crate::session::{BranchSession, LogOptions};
use crate::types::{BranchInfo, Message, Role};

/// Result of [`Router::fork_from_reply`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkOutcome {
    /// Tag of the new branch.
    pub branch_id: BranchId,
    /// Message the branch forks from.
    pub parent: Message,
}

/// One row of [`Router::list`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BranchEntry {
    /// 1-based number used by the numbered commands.
    pub number: usize,
    /// Branch summary.
    pub branch: BranchInfo,
    /// Whether the branch's leaf is the active leaf.
    pub current: bool,
}

/// Result of [`Router::checkout`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutOutcome {
    /// Number that was requested.
    pub number: usize,
    /// Branch now active.
    pub branch: BranchInfo,
}

/// Result of [`Router::merge`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeOutcome {
    /// Branch merged from.
    pub branch: BranchInfo,
    /// Source messages that were copied, root-to-leaf.
    pub merged: Vec<Message>,
}

/// Result of [`Router::delete`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum DeleteOutcome {
    /// Nothing was deleted; the caller must repeat with `confirm = true`.
    ConfirmationRequired {
        /// Branch that would be deleted.
        branch: BranchInfo,
    },
    /// The branch's messages were removed.
    Deleted {
        /// Branch as it was before deletion.
        branch: BranchInfo,
        /// Messages removed.
        removed: usize,
    },
}

/// Reply and command handling for one session.
pub struct Router {
    session: BranchSession,
    mappings: ExternalIdMap,
}

impl Router {
    /// Route commands for `session`, resolving replies through `mappings`.
    ///
    /// Both must belong to the same session.
    pub fn new(session: BranchSession, mappings: ExternalIdMap) -> Result<Self> {
        if session.session_id() != mappings.session_id() {
            return Err(StoreError::InvalidSessionId(format!(
                "mapping table for {} used with session {}",
                mappings.session_id(),
                session.session_id()
            )));
        }
        Ok(Self { session, mappings })
    }

    /// The underlying session.
    pub fn session(&self) -> &BranchSession {
        &self.session
    }

    /// Mutable access to the underlying session.
    pub fn session_mut(&mut self) -> &mut BranchSession {
        &mut self.session
    }

    /// Take back the session and mapping table.
    pub fn into_parts(self) -> (BranchSession, ExternalIdMap) {
        (self.session, self.mappings)
    }

    /// Log a turn that arrived with (or was sent as) platform message
    /// `external_id`, and remember the mapping.
    pub fn record(
        &mut self,
        role: Role,
        content: impl Into<String>,
        external_id: ExternalId,
    ) -> Result<Message> {
        let message = self.session.log_message(
            role,
            content,
            LogOptions::default().external(external_id.clone()),
        )?;
        self.mappings.insert(external_id, message.id.clone())?;
        Ok(message)
    }

    /// Map a platform id to an already stored message.
    pub fn map_message(&mut self, external_id: ExternalId, internal_id: MessageId) -> Result<()> {
        if self.session.find_message(&internal_id)?.is_none() {
            return Err(StoreError::not_found("map_message", internal_id.into_inner()));
        }
        self.mappings.insert(external_id, internal_id)
    }

    /// The stored message a platform id refers to.
    ///
    /// Looks in the mapping table first, then at the ids messages were
    /// logged with. A mapping whose target no longer exists (its branch was
    /// deleted) is dropped.
    pub fn resolve(&mut self, external_id: &ExternalId) -> Result<Message> {
        if let Some(internal) = self.mappings.get(external_id).cloned() {
            if let Some(message) = self.session.find_message(&internal)? {
                return Ok(message);
            }
            warn!(
                external_id = %external_id,
                internal_id = %internal,
                "mapping points at a deleted message, dropping it"
            );
            let _ = self.mappings.remove(external_id)?;
        }
        self.session
            .find_by_external_id(external_id)?
            .ok_or_else(|| StoreError::ExternalIdNotFound {
                id: external_id.to_string(),
            })
    }

    /// Fork a new branch from the message the user replied to.
    pub fn fork_from_reply(
        &mut self,
        reply_to: &ExternalId,
        name: Option<&str>,
    ) -> Result<ForkOutcome> {
        let parent = self.resolve(reply_to)?;
        let branch_id = self.session.fork_branch(&parent.id, name)?;
        debug!(reply_to = %reply_to, branch = %branch_id, "forked from reply");
        Ok(ForkOutcome { branch_id, parent })
    }

    /// Numbered branch list.
    pub fn list(&self) -> Result<Vec<BranchEntry>> {
        let active = self.session.state().active_leaf_id.as_ref();
        Ok(self
            .session
            .branches()?
            .into_iter()
            .enumerate()
            .map(|(i, branch)| BranchEntry {
                number: i + 1,
                current: active == Some(&branch.leaf_id),
                branch,
            })
            .collect())
    }

    /// Switch to branch `number`.
    pub fn checkout(&mut self, number: usize) -> Result<CheckoutOutcome> {
        let branch = self.session.branch_by_number(number)?;
        self.session.switch_branch(&branch.leaf_id)?;
        Ok(CheckoutOutcome { number, branch })
    }

    /// Merge branch `number` into the current branch.
    pub fn merge(&mut self, number: usize) -> Result<MergeOutcome> {
        let branch = self.session.branch_by_number(number)?;
        let merged = self.session.merge_branch(&branch.leaf_id)?;
        Ok(MergeOutcome { branch, merged })
    }

    /// Delete branch `number`. Without `confirm` nothing is removed.
    pub fn delete(&mut self, number: usize, confirm: bool) -> Result<DeleteOutcome> {
        let branch = self.session.branch_by_number(number)?;
        if !confirm {
            return Ok(DeleteOutcome::ConfirmationRequired { branch });
        }
        let removed = self.session.delete_branch(branch.id.as_str())?;
        Ok(DeleteOutcome::Deleted { branch, removed })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
