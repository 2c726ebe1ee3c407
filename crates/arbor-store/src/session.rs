//! Branch operations for one session.
//!
//! [`BranchSession`] combines a [`MessageStore`] with the session's
//! [`SessionStateHandle`]. Every mutating operation writes the log first,
//! then persists the new state, and only then adopts it in memory. A
//! failure at any step returns the error with the in-memory state
//! unchanged.
//!
//! ```text
//!   Uninitialized ──open──▶ Empty ──log_message──▶ Active
//!                             ▲                    │ fork / switch / merge
//!                             └──delete last branch┘
//! ```

use std::collections::HashSet;

use arbor_core::ids::MAIN_BRANCH;
use arbor_core::{BranchId, ExternalId, MessageId, SessionId};
use arbor_settings::ContextSettings;
use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::errors::{Result, StoreError};
use crate::index::MessageIndex;
use crate::state::SessionStateHandle;
use crate::store::{MessageStore, StateStore, validate_session_id};
use crate::types::{BranchInfo, Message, Role, SessionState, TreeNode};

/// Optional inputs to [`BranchSession::log_message`].
#[derive(Clone, Debug, Default)]
pub struct LogOptions {
    /// Attach to this message instead of the active leaf. Must exist.
    pub parent_id: Option<MessageId>,
    /// Chat-surface id; must be unique within the session.
    pub external_id: Option<ExternalId>,
}

impl LogOptions {
    /// Options with an explicit parent.
    #[must_use]
    pub fn parent(mut self, parent_id: MessageId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    /// Options with an external id.
    #[must_use]
    pub fn external(mut self, external_id: ExternalId) -> Self {
        self.external_id = Some(external_id);
        self
    }
}

/// An open conversation: its message log and pointer state.
pub struct BranchSession {
    session_id: SessionId,
    messages: Box<dyn MessageStore>,
    state: SessionStateHandle,
    context: ContextSettings,
    last_timestamp: Option<DateTime<Utc>>,
}

impl BranchSession {
    /// Open a session over the given stores.
    ///
    /// The persisted state is reconciled against the log: an active leaf
    /// that no longer exists falls back to the main branch's leaf (or
    /// nothing), `total_messages` is recounted from the log, and a missing
    /// state record over a non-empty log adopts the last appended message.
    /// A reconciled state is saved immediately.
    pub fn open(
        session_id: SessionId,
        messages: Box<dyn MessageStore>,
        state_store: Box<dyn StateStore>,
        context: ContextSettings,
    ) -> Result<Self> {
        validate_session_id(&session_id)?;
        let state = SessionStateHandle::load(state_store)?;
        let mut session = Self {
            session_id,
            messages,
            state,
            context,
            last_timestamp: None,
        };

        let index = session.index()?;
        session.last_timestamp = index.messages().iter().map(|m| m.timestamp).max();
        session.reconcile(&index)?;
        debug!(
            session_id = %session.session_id,
            messages = index.len(),
            active_leaf = session.state().active_leaf_id.as_deref().unwrap_or("-"),
            "opened session"
        );
        Ok(session)
    }

    fn reconcile(&mut self, index: &MessageIndex) -> Result<()> {
        let current = self.state.get().clone();

        if !self.state.was_persisted() {
            let Some(last) = index.messages().last() else {
                return Ok(());
            };
            warn!(
                session_id = %self.session_id,
                adopted = %last.id,
                "state record missing for non-empty log, adopting last message"
            );
            let mut next = current;
            next.active_leaf_id = Some(last.id.clone());
            next.current_branch_id = last.branch_id.clone();
            next.total_messages = index.len() as u64;
            return self.state.commit(next);
        }

        let mut next = current.clone();
        let dangling = current
            .active_leaf_id
            .as_ref()
            .is_some_and(|leaf| !index.contains(leaf));
        if dangling {
            warn!(
                session_id = %self.session_id,
                active_leaf = current.active_leaf_id.as_deref().unwrap_or("-"),
                "active leaf missing from log, falling back"
            );
            Self::fall_back(&mut next, index);
        }

        let logged = index.len() as u64;
        if next.total_messages != logged {
            warn!(
                session_id = %self.session_id,
                recorded = next.total_messages,
                logged,
                "message count out of step with log, recounting"
            );
            next.total_messages = logged;
        }

        if next == current {
            return Ok(());
        }
        self.state.commit(next)
    }

    /// Point `state` at the main branch's leaf, or at nothing.
    fn fall_back(state: &mut SessionState, index: &MessageIndex) {
        let main_leaf = index
            .branches()
            .into_iter()
            .find(|b| b.id.is_main())
            .map(|b| b.leaf_id);
        state.active_leaf_id = main_leaf;
        state.current_branch_id = None;
    }

    fn index(&self) -> Result<MessageIndex> {
        Ok(MessageIndex::build(
            self.messages.scan_all()?,
            self.context.max_walk,
        ))
    }

    fn next_timestamp(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let ts = self.last_timestamp.map_or(now, |last| last.max(now));
        self.last_timestamp = Some(ts);
        ts
    }

    fn require(&self, operation: &'static str, id: &MessageId) -> Result<Message> {
        self.messages
            .find(id)?
            .ok_or_else(|| StoreError::not_found(operation, id.as_str()))
    }

    /// Session this handle operates on.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current pointer state.
    pub fn state(&self) -> &SessionState {
        self.state.get()
    }

    /// Tag new messages are written under (`main` when untagged).
    pub fn current_branch(&self) -> BranchId {
        self.state()
            .current_branch_id
            .clone()
            .unwrap_or_else(BranchId::main)
    }

    /// Append a message under the current branch and make it the active leaf.
    pub fn log_message(
        &mut self,
        role: Role,
        content: impl Into<String>,
        options: LogOptions,
    ) -> Result<Message> {
        let parent_id = match options.parent_id {
            Some(parent) => Some(self.require("log_message", &parent)?.id),
            None => self.state().active_leaf_id.clone(),
        };
        if let Some(external_id) = &options.external_id {
            if let Some(existing) = self.messages.find_by_external_id(external_id)? {
                return Err(StoreError::DuplicateExternalId {
                    external_id: external_id.to_string(),
                    existing: existing.id.into_inner(),
                });
            }
        }

        let timestamp = self.next_timestamp();
        let message = Message::new(parent_id, role, content, timestamp)
            .with_branch(self.state().current_branch_id.clone())
            .with_external_id(options.external_id);
        self.messages.append(&message)?;

        let mut next = self.state().clone();
        next.active_leaf_id = Some(message.id.clone());
        next.total_messages += 1;
        self.state.commit(next)?;

        debug!(
            session_id = %self.session_id,
            id = %message.id,
            branch = message.effective_branch(),
            role = %message.role,
            "logged message"
        );
        Ok(message)
    }

    /// Start a new branch at `parent_id`. Writes no message.
    ///
    /// A blank or absent `name` generates a `branch_<8 hex>` tag.
    pub fn fork_branch(&mut self, parent_id: &MessageId, name: Option<&str>) -> Result<BranchId> {
        let parent = self.require("fork_branch", parent_id)?;
        let branch_id = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => BranchId::from(name),
            None => BranchId::generate(),
        };

        let mut next = self.state().clone();
        next.active_leaf_id = Some(parent.id.clone());
        next.current_branch_id = Some(branch_id.clone());
        self.state.commit(next)?;

        info!(
            session_id = %self.session_id,
            branch = %branch_id,
            from = %parent.id,
            "forked branch"
        );
        Ok(branch_id)
    }

    /// Make `leaf_id` the active leaf and adopt its branch tag.
    pub fn switch_branch(&mut self, leaf_id: &MessageId) -> Result<()> {
        let leaf = self.require("switch_branch", leaf_id)?;

        let mut next = self.state().clone();
        next.active_leaf_id = Some(leaf.id.clone());
        next.current_branch_id = leaf.branch_id.clone();
        self.state.commit(next)?;

        info!(
            session_id = %self.session_id,
            branch = leaf.effective_branch(),
            leaf = %leaf.id,
            "switched branch"
        );
        Ok(())
    }

    /// Branch summaries in first-seen order.
    pub fn branches(&self) -> Result<Vec<BranchInfo>> {
        Ok(self.index()?.branches())
    }

    /// The `number`-th branch (1-based) of [`Self::branches`].
    pub fn branch_by_number(&self, number: usize) -> Result<BranchInfo> {
        let branches = self.branches()?;
        let count = branches.len();
        number
            .checked_sub(1)
            .and_then(|i| branches.into_iter().nth(i))
            .ok_or(StoreError::InvalidBranchIndex {
                index: number,
                count,
            })
    }

    /// Copy the part of `source_leaf_id`'s chain that is not already in the
    /// active context onto the active leaf, under the current branch.
    ///
    /// Returns the source messages that were copied, root-to-leaf. The
    /// source branch is left intact. Copies get new ids and timestamps and
    /// no external id. All copies land in one write.
    pub fn merge_branch(&mut self, source_leaf_id: &MessageId) -> Result<Vec<Message>> {
        let index = self.index()?;
        if !index.contains(source_leaf_id) {
            return Err(StoreError::not_found("merge_branch", source_leaf_id.as_str()));
        }

        let active_chain: HashSet<MessageId> =
            index.chain_ids(self.state().active_leaf_id.as_ref())?;
        let segment = index.segment_until(source_leaf_id, &active_chain)?;
        if segment.is_empty() {
            debug!(
                session_id = %self.session_id,
                source = %source_leaf_id,
                "source already in active context, nothing to merge"
            );
            return Ok(segment);
        }

        let branch_id = self.state().current_branch_id.clone();
        let mut parent = self.state().active_leaf_id.clone();
        let mut copies = Vec::with_capacity(segment.len());
        for original in &segment {
            let timestamp = self.next_timestamp();
            let copy = Message::new(parent.take(), original.role, original.content.clone(), timestamp)
                .with_branch(branch_id.clone());
            parent = Some(copy.id.clone());
            copies.push(copy);
        }
        self.messages.append_all(&copies)?;

        let mut next = self.state().clone();
        next.active_leaf_id = parent;
        next.total_messages += copies.len() as u64;
        self.state.commit(next)?;

        info!(
            session_id = %self.session_id,
            source = %source_leaf_id,
            into = %self.current_branch(),
            count = copies.len(),
            "merged branch"
        );
        Ok(segment)
    }

    /// Remove every message whose effective tag is `branch_id`.
    ///
    /// Returns how many were removed; 0 leaves storage untouched. When the
    /// current branch or the active leaf goes away, the session falls back
    /// to the main branch's leaf, or to no active leaf if main is gone too.
    pub fn delete_branch(&mut self, branch_id: &str) -> Result<usize> {
        let all = self.messages.scan_all()?;
        let (removed, kept): (Vec<Message>, Vec<Message>) =
            all.into_iter().partition(|m| m.is_on_branch(branch_id));
        if removed.is_empty() {
            debug!(session_id = %self.session_id, branch = branch_id, "no messages on branch");
            return Ok(0);
        }

        self.messages.rewrite(&kept)?;

        let removed_ids: HashSet<&MessageId> = removed.iter().map(|m| &m.id).collect();
        let mut next = self.state().clone();
        next.total_messages = next.total_messages.saturating_sub(removed.len() as u64);
        let current = next.current_branch_id.as_deref().unwrap_or(MAIN_BRANCH);
        let leaf_removed = next
            .active_leaf_id
            .as_ref()
            .is_some_and(|leaf| removed_ids.contains(leaf));
        if current == branch_id || leaf_removed {
            let index = MessageIndex::build(kept, self.context.max_walk);
            Self::fall_back(&mut next, &index);
        }
        self.state.commit(next)?;

        info!(
            session_id = %self.session_id,
            branch = branch_id,
            removed = removed.len(),
            "deleted branch"
        );
        Ok(removed.len())
    }

    /// Linear context ending at the active leaf, root-to-leaf.
    ///
    /// `None` uses the configured default limit. Empty when there is no
    /// active leaf.
    pub fn load_context(&self, limit: Option<usize>) -> Result<Vec<Message>> {
        let Some(leaf) = self.state().active_leaf_id.clone() else {
            return Ok(Vec::new());
        };
        let limit = limit.unwrap_or(self.context.default_limit);
        self.index()?.context(&leaf, limit)
    }

    /// The whole conversation forest under a synthetic root.
    pub fn export_tree(&self) -> Result<TreeNode> {
        Ok(self.index()?.export_tree())
    }

    /// Root-to-`id` chain.
    pub fn ancestors(&self, id: &MessageId) -> Result<Vec<Message>> {
        self.index()?.ancestors(id)
    }

    /// Direct children of `id` in append order.
    pub fn children(&self, id: &MessageId) -> Result<Vec<Message>> {
        let index = self.index()?;
        if !index.contains(id) {
            return Err(StoreError::not_found("children", id.as_str()));
        }
        Ok(index.children(id).into_iter().cloned().collect())
    }

    /// Message by id.
    pub fn find_message(&self, id: &MessageId) -> Result<Option<Message>> {
        self.messages.find(id)
    }

    /// Message by the external id it was logged with.
    pub fn find_by_external_id(&self, external_id: &ExternalId) -> Result<Option<Message>> {
        self.messages.find_by_external_id(external_id)
    }

    /// Every message in append order.
    pub fn messages(&self) -> Result<Vec<Message>> {
        self.messages.scan_all()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
