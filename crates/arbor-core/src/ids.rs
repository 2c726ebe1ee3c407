//! Branded ID newtypes for type safety.
//!
//! Every identifier in the history store is a distinct newtype wrapper
//! around `String`, so a branch tag can never be passed where a message id
//! is expected.
//!
//! Message ids are UUID v7 (time-ordered) with a `msg_` prefix. Branch tags
//! are either caller-chosen names or `branch_` plus eight random hex digits.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Tag of the implicit branch that untagged messages belong to.
pub const MAIN_BRANCH: &str = "main";

macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Create from an existing string value.
            #[must_use]
            pub fn from_string(s: String) -> Self {
                Self(s)
            }

            /// Return the inner string as a slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume self and return the inner `String`.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::ops::Deref for $name {
            type Target = str;
            fn deref(&self) -> &str {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_owned())
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

branded_id! {
    /// Unique identifier for a stored message. Never reused.
    MessageId
}

branded_id! {
    /// Identifier scoping one conversation's storage.
    SessionId
}

branded_id! {
    /// Tag naming the branch a message was written under.
    BranchId
}

branded_id! {
    /// Opaque message id assigned by an external chat surface.
    ExternalId
}

impl MessageId {
    /// Create a new message id (`msg_` + UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(format!("msg_{}", Uuid::now_v7()))
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionId {
    /// Create a new random session id (UUID v7).
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl BranchId {
    /// The implicit `main` branch.
    #[must_use]
    pub fn main() -> Self {
        Self(MAIN_BRANCH.to_owned())
    }

    /// Generate a fresh tag with a random 32-bit suffix, e.g. `branch_1f0c93ab`.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("branch_{:08x}", rand::random::<u32>()))
    }

    /// Whether this is the implicit `main` branch.
    #[must_use]
    pub fn is_main(&self) -> bool {
        self.0 == MAIN_BRANCH
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
