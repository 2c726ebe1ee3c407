//! Stored message type.

use std::fmt;
use std::str::FromStr;

use arbor_core::ids::MAIN_BRANCH;
use arbor_core::{BranchId, ExternalId, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Author of a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Human turn.
    User,
    /// Model turn.
    Assistant,
    /// System prompt or injected instruction.
    System,
}

impl Role {
    /// Wire form (`user`, `assistant`, `system`).
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "system" => Ok(Self::System),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// One node of the conversation tree. Immutable once written.
///
/// Serialized as one camelCase JSON object per JSONL line. `parentId` is
/// always written (as `null` for roots); `branchId` and `externalId` are
/// omitted when absent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique id, never reused.
    pub id: MessageId,
    /// Preceding message on its branch, `None` for a root.
    #[serde(default)]
    pub parent_id: Option<MessageId>,
    /// Author.
    pub role: Role,
    /// Text payload.
    pub content: String,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Branch tag the message was written under; `None` means `main`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch_id: Option<BranchId>,
    /// Id assigned by an external chat surface.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<ExternalId>,
}

impl Message {
    /// Build a message with a fresh id.
    pub fn new(
        parent_id: Option<MessageId>,
        role: Role,
        content: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            parent_id,
            role,
            content: content.into(),
            timestamp,
            branch_id: None,
            external_id: None,
        }
    }

    /// Set the branch tag.
    #[must_use]
    pub fn with_branch(mut self, branch_id: Option<BranchId>) -> Self {
        self.branch_id = branch_id;
        self
    }

    /// Set the external id.
    #[must_use]
    pub fn with_external_id(mut self, external_id: Option<ExternalId>) -> Self {
        self.external_id = external_id;
        self
    }

    /// Tag this message counts toward: its `branch_id`, or `main`.
    pub fn effective_branch(&self) -> &str {
        self.branch_id.as_deref().unwrap_or(MAIN_BRANCH)
    }

    /// Whether the effective tag equals `tag`.
    pub fn is_on_branch(&self, tag: &str) -> bool {
        self.effective_branch() == tag
    }

    /// Whether this message has no parent.
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Message {
        Message::new(None, Role::User, "hello", Utc::now())
    }

    #[test]
    fn untagged_message_is_main() {
        let m = sample();
        assert_eq!(m.effective_branch(), "main");
        assert!(m.is_on_branch("main"));
        assert!(m.is_root());
    }

    #[test]
    fn tagged_message() {
        let m = sample().with_branch(Some(BranchId::from("alt")));
        assert_eq!(m.effective_branch(), "alt");
        assert!(!m.is_on_branch("main"));
    }

    #[test]
    fn json_shape() {
        let m = sample();
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["role"], "user");
        assert!(v["parentId"].is_null());
        assert!(v.get("branchId").is_none());
        assert!(v.get("externalId").is_none());
    }

    #[test]
    fn parses_line_without_optional_fields() {
        let line = r#"{"id":"m1","role":"assistant","content":"hi","timestamp":"2026-01-02T03:04:05.678Z"}"#;
        let m: Message = serde_json::from_str(line).unwrap();
        assert_eq!(m.id.as_str(), "m1");
        assert_eq!(m.parent_id, None);
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.branch_id, None);
    }

    #[test]
    fn role_round_trips_through_str() {
        for role in [Role::User, Role::Assistant, Role::System] {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("tool".parse::<Role>().is_err());
    }
}
