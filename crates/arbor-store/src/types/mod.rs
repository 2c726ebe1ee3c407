//! Core data types: messages, session state, and the derived branch and
//! tree views.

pub mod branch;
pub mod mapping;
pub mod message;
pub mod state;
pub mod tree;

pub use branch::BranchInfo;
pub use mapping::ExternalMapping;
pub use message::{Message, Role};
pub use state::SessionState;
pub use tree::{TREE_ROOT_ID, TreeNode};
