//! Loaded session state plus the store it persists to.

use chrono::Utc;
use tracing::debug;

use crate::errors::Result;
use crate::store::StateStore;
use crate::types::SessionState;

/// Current [`SessionState`] of an open session.
///
/// Changes go through [`SessionStateHandle::commit`], which persists the new
/// record before adopting it, so a failed save leaves the in-memory state
/// as it was.
pub struct SessionStateHandle {
    store: Box<dyn StateStore>,
    state: SessionState,
    persisted: bool,
}

impl SessionStateHandle {
    /// Read the persisted record, or start from the zero state.
    pub fn load(store: Box<dyn StateStore>) -> Result<Self> {
        let (state, persisted) = match store.load()? {
            Some(state) => (state, true),
            None => (SessionState::new(Utc::now()), false),
        };
        Ok(Self {
            store,
            state,
            persisted,
        })
    }

    /// Current state.
    pub fn get(&self) -> &SessionState {
        &self.state
    }

    /// Whether the state came from storage rather than being freshly created.
    pub fn was_persisted(&self) -> bool {
        self.persisted
    }

    /// Persist `next` with a fresh `updated_at`, then make it current.
    pub fn commit(&mut self, mut next: SessionState) -> Result<()> {
        next.updated_at = Utc::now().max(next.created_at);
        self.store.save(&next)?;
        debug!(
            active_leaf = next.active_leaf_id.as_deref().unwrap_or("-"),
            branch = next.current_branch_id.as_deref().unwrap_or("main"),
            total = next.total_messages,
            "saved session state"
        );
        self.state = next;
        self.persisted = true;
        Ok(())
    }

    /// Re-save the current state.
    pub fn save(&mut self) -> Result<()> {
        self.commit(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;
    use crate::store::MockStateStore;
    use arbor_core::MessageId;

    #[test]
    fn missing_record_starts_empty() {
        let mut store = MockStateStore::new();
        store.expect_load().returning(|| Ok(None));
        let handle = SessionStateHandle::load(Box::new(store)).unwrap();
        assert!(handle.get().is_empty());
        assert!(!handle.was_persisted());
    }

    #[test]
    fn failed_save_keeps_previous_state() {
        let mut store = MockStateStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_save().returning(|_| {
            Err(StoreError::io(
                "save_state",
                "/x",
                std::io::Error::other("read-only"),
            ))
        });
        let mut handle = SessionStateHandle::load(Box::new(store)).unwrap();

        let mut next = handle.get().clone();
        next.active_leaf_id = Some(MessageId::from("m1"));
        assert!(handle.commit(next).is_err());
        assert!(handle.get().is_empty());
    }

    #[test]
    fn commit_bumps_updated_at() {
        let mut store = MockStateStore::new();
        store.expect_load().returning(|| Ok(None));
        store.expect_save().times(1).returning(|_| Ok(()));
        let mut handle = SessionStateHandle::load(Box::new(store)).unwrap();
        let before = handle.get().updated_at;
        handle.save().unwrap();
        assert!(handle.get().updated_at >= before);
        assert!(handle.was_persisted());
    }
}
