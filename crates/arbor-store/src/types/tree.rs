//! Exported tree node.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::{Message, Role};

/// Id of the synthetic node every exported tree hangs from.
pub const TREE_ROOT_ID: &str = "root";

/// A node of the exported hierarchy.
///
/// The synthetic root carries only `id` and `children`. Message nodes carry
/// the message fields; `branchId` is the effective tag.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Message id, or [`TREE_ROOT_ID`].
    pub id: String,
    /// Author.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Text payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Creation time.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    /// Effective branch tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<String>,
    /// Child nodes in physical append order.
    #[serde(default)]
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    /// The synthetic root.
    pub fn root(children: Vec<TreeNode>) -> Self {
        Self {
            id: TREE_ROOT_ID.to_string(),
            role: None,
            content: None,
            timestamp: None,
            branch_id: None,
            children,
        }
    }

    /// A node for `message`.
    pub fn from_message(message: &Message, children: Vec<TreeNode>) -> Self {
        Self {
            id: message.id.to_string(),
            role: Some(message.role),
            content: Some(message.content.clone()),
            timestamp: Some(message.timestamp),
            branch_id: Some(message.effective_branch().to_string()),
            children,
        }
    }

    /// Total nodes below this one.
    pub fn descendant_count(&self) -> usize {
        let mut count = 0;
        let mut stack: Vec<&TreeNode> = self.children.iter().collect();
        while let Some(node) = stack.pop() {
            count += 1;
            stack.extend(node.children.iter());
        }
        count
    }

    /// Depth-first search for a node by id.
    pub fn find(&self, id: &str) -> Option<&TreeNode> {
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            if node.id == id {
                return Some(node);
            }
            stack.extend(node.children.iter());
        }
        None
    }
}
