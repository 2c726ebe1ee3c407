//! Derived views over one full scan of a session's log.
//!
//! [`MessageIndex`] is rebuilt from [`MessageStore::scan_all`] for every
//! query; nothing here is persisted. Physical append order is the
//! tie-breaker everywhere: branch order, leaf choice and child order.
//!
//! Parent links come from disk and are not trusted. Every walk carries a
//! visited set, so a cycle surfaces as [`StoreError::CorruptTree`] (walks)
//! or as omitted nodes with a warning (export) instead of looping forever.
//!
//! [`MessageStore::scan_all`]: crate::store::MessageStore::scan_all

use std::collections::{HashMap, HashSet};

use arbor_core::{BranchId, MessageId};
use tracing::warn;

use crate::errors::{Result, StoreError};
use crate::types::{BranchInfo, Message, TreeNode};

/// What a walk does on reaching its length limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Cap {
    /// Keep the newest messages walked so far.
    Truncate,
    /// The chain is needed whole; hitting the limit is an error.
    Whole,
}

/// Lookup tables over a message list in append order.
#[derive(Debug)]
pub struct MessageIndex {
    messages: Vec<Message>,
    by_id: HashMap<MessageId, usize>,
    children: HashMap<MessageId, Vec<usize>>,
    max_walk: usize,
}

impl MessageIndex {
    /// Index `messages` (append order). Walks never visit more than
    /// `max_walk` messages.
    pub fn build(messages: Vec<Message>, max_walk: usize) -> Self {
        let mut by_id = HashMap::with_capacity(messages.len());
        let mut children: HashMap<MessageId, Vec<usize>> = HashMap::new();
        for (idx, message) in messages.iter().enumerate() {
            let _ = by_id.insert(message.id.clone(), idx);
            if let Some(parent) = &message.parent_id {
                children.entry(parent.clone()).or_default().push(idx);
            }
        }
        Self {
            messages,
            by_id,
            children,
            max_walk: max_walk.max(1),
        }
    }

    /// All messages in append order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Consume the index, returning the messages in append order.
    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    /// Number of messages.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Message by id.
    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.by_id.get(id).map(|&idx| &self.messages[idx])
    }

    /// Whether a message with `id` exists.
    pub fn contains(&self, id: &MessageId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Direct children of `id` in append order.
    pub fn children(&self, id: &MessageId) -> Vec<&Message> {
        self.child_indices(id)
            .iter()
            .map(|&idx| &self.messages[idx])
            .collect()
    }

    fn child_indices(&self, id: &MessageId) -> &[usize] {
        self.children.get(id).map_or(&[], Vec::as_slice)
    }

    /// Messages with no children at all, in append order.
    pub fn leaves(&self) -> Vec<&Message> {
        self.messages
            .iter()
            .filter(|m| self.child_indices(&m.id).is_empty())
            .collect()
    }

    /// Walk from `start` toward the root, leaf-first, stopping at a null or
    /// missing parent or before the first message in `stop`. A missing
    /// `start` yields an empty walk.
    ///
    /// `limit` is capped at `max_walk`. Reaching it ends the walk under
    /// [`Cap::Truncate`] and fails with [`StoreError::WalkLimit`] under
    /// [`Cap::Whole`] when the chain goes on.
    fn walk(
        &self,
        start: &MessageId,
        limit: usize,
        cap: Cap,
        stop: Option<&HashSet<MessageId>>,
    ) -> Result<Vec<&Message>> {
        let limit = limit.min(self.max_walk);
        let mut out = Vec::new();
        let mut seen: HashSet<&MessageId> = HashSet::new();
        let mut cursor = self.get(start);

        while let Some(message) = cursor {
            if stop.is_some_and(|s| s.contains(&message.id)) {
                break;
            }
            if out.len() >= limit {
                match cap {
                    Cap::Truncate => break,
                    Cap::Whole => {
                        return Err(StoreError::WalkLimit {
                            start: start.to_string(),
                            max_walk: self.max_walk,
                        });
                    }
                }
            }
            if !seen.insert(&message.id) {
                return Err(StoreError::CorruptTree(format!(
                    "parent chain of {start} loops at {}",
                    message.id
                )));
            }
            out.push(message);
            cursor = message.parent_id.as_ref().and_then(|p| self.get(p));
        }
        Ok(out)
    }

    /// Linear context ending at `leaf`: up to `limit` messages, root-to-leaf,
    /// the newest kept when truncated.
    pub fn context(&self, leaf: &MessageId, limit: usize) -> Result<Vec<Message>> {
        let chain = self.walk(leaf, limit, Cap::Truncate, None)?;
        Ok(chain.into_iter().rev().cloned().collect())
    }

    /// Full ancestor chain of `id`, root-to-`id` inclusive.
    ///
    /// A chain longer than `max_walk` is [`StoreError::WalkLimit`].
    pub fn ancestors(&self, id: &MessageId) -> Result<Vec<Message>> {
        if !self.contains(id) {
            return Err(StoreError::not_found("ancestors", id.as_str()));
        }
        let chain = self.walk(id, self.max_walk, Cap::Whole, None)?;
        Ok(chain.into_iter().rev().cloned().collect())
    }

    /// Ids on the chain ending at `leaf` (empty when `leaf` is `None`).
    pub fn chain_ids(&self, leaf: Option<&MessageId>) -> Result<HashSet<MessageId>> {
        let Some(leaf) = leaf else {
            return Ok(HashSet::new());
        };
        Ok(self
            .walk(leaf, self.max_walk, Cap::Whole, None)?
            .into_iter()
            .map(|m| m.id.clone())
            .collect())
    }

    /// Messages from `source` back to (not including) the first message in
    /// `stop`, root-to-leaf. The walk runs to the root when no stop message
    /// is met. A segment longer than `max_walk` is [`StoreError::WalkLimit`].
    pub fn segment_until(
        &self,
        source: &MessageId,
        stop: &HashSet<MessageId>,
    ) -> Result<Vec<Message>> {
        let segment = self.walk(source, self.max_walk, Cap::Whole, Some(stop))?;
        Ok(segment.into_iter().rev().cloned().collect())
    }

    /// Branch summaries grouped by effective tag, in first-seen order.
    ///
    /// A branch's leaf is the most recently appended message of the tag that
    /// has no child of the same tag, so a fork point shared with another
    /// branch still counts as the leaf of its own branch until its own
    /// branch continues.
    pub fn branches(&self) -> Vec<BranchInfo> {
        let mut order: Vec<&str> = Vec::new();
        let mut groups: HashMap<&str, Vec<usize>> = HashMap::new();
        for (idx, message) in self.messages.iter().enumerate() {
            let tag = message.effective_branch();
            groups
                .entry(tag)
                .or_insert_with(|| {
                    order.push(tag);
                    Vec::new()
                })
                .push(idx);
        }

        order
            .into_iter()
            .filter_map(|tag| {
                let members = groups.get(tag)?;
                let leaf_idx = members
                    .iter()
                    .rev()
                    .copied()
                    .find(|&idx| !self.has_child_on(idx, tag))
                    // only reachable when same-tag links form a cycle
                    .or_else(|| members.last().copied())?;
                let leaf = &self.messages[leaf_idx];
                Some(BranchInfo {
                    id: BranchId::from(tag),
                    leaf_id: leaf.id.clone(),
                    message_count: members.len(),
                    last_active: leaf.timestamp,
                })
            })
            .collect()
    }

    fn has_child_on(&self, idx: usize, tag: &str) -> bool {
        self.child_indices(&self.messages[idx].id)
            .iter()
            .any(|&c| self.messages[c].is_on_branch(tag))
    }

    /// The whole forest under a synthetic root.
    ///
    /// Roots and orphans (parent missing) hang from the synthetic root in
    /// append order. Messages reachable only through a parent cycle are
    /// left out and logged.
    pub fn export_tree(&self) -> TreeNode {
        let mut visited = vec![false; self.messages.len()];
        let mut top = Vec::new();

        for (idx, message) in self.messages.iter().enumerate() {
            let attached = message
                .parent_id
                .as_ref()
                .is_some_and(|p| self.contains(p));
            if !attached && !visited[idx] {
                top.push(self.build_subtree(idx, &mut visited));
            }
        }

        let omitted: Vec<&str> = self
            .messages
            .iter()
            .zip(&visited)
            .filter(|(_, seen)| !**seen)
            .map(|(m, _)| m.id.as_str())
            .collect();
        if !omitted.is_empty() {
            warn!(
                count = omitted.len(),
                first = omitted[0],
                "messages unreachable from any root (parent cycle), omitted from export"
            );
        }

        TreeNode::root(top)
    }

    /// Iterative post-order build so deep chains cannot overflow the stack.
    fn build_subtree(&self, root: usize, visited: &mut [bool]) -> TreeNode {
        struct Frame {
            idx: usize,
            next: usize,
            children: Vec<TreeNode>,
        }

        visited[root] = true;
        let mut frames = vec![Frame {
            idx: root,
            next: 0,
            children: Vec::new(),
        }];

        loop {
            let Some(top) = frames.last_mut() else {
                // unreachable: the loop returns when the root frame pops
                return TreeNode::root(Vec::new());
            };
            let kids = self.child_indices(&self.messages[top.idx].id);
            if let Some(&child) = kids.get(top.next) {
                top.next += 1;
                if !visited[child] {
                    visited[child] = true;
                    frames.push(Frame {
                        idx: child,
                        next: 0,
                        children: Vec::new(),
                    });
                }
                continue;
            }

            let Some(done) = frames.pop() else {
                return TreeNode::root(Vec::new());
            };
            let node = TreeNode::from_message(&self.messages[done.idx], done.children);
            match frames.last_mut() {
                Some(parent) => parent.children.push(node),
                None => return node,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
