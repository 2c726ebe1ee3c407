//! In-memory cache of chat-surface ids for one session.

use std::collections::HashMap;

use arbor_core::{ExternalId, MessageId, SessionId};
use chrono::Utc;
use tracing::debug;

use crate::errors::Result;
use crate::store::MappingStore;
use crate::types::ExternalMapping;

/// External id → internal id table for one session.
///
/// Loaded from the backing [`MappingStore`] on construction (only this
/// session's rows) and written through on every change. Owned by the
/// caller; there is no process-wide instance.
pub struct ExternalIdMap {
    session_id: SessionId,
    store: Box<dyn MappingStore>,
    entries: HashMap<ExternalId, MessageId>,
}

impl ExternalIdMap {
    /// Load this session's mappings from `store`.
    pub fn load(session_id: SessionId, store: Box<dyn MappingStore>) -> Result<Self> {
        let entries: HashMap<ExternalId, MessageId> = store
            .load_all()?
            .into_iter()
            .filter(|m| m.session_id == session_id)
            .map(|m| (m.external_id, m.internal_id))
            .collect();
        debug!(session_id = %session_id, count = entries.len(), "loaded external id mappings");
        Ok(Self {
            session_id,
            store,
            entries,
        })
    }

    /// Map `external_id` to `internal_id`, overwriting any previous target.
    pub fn insert(&mut self, external_id: ExternalId, internal_id: MessageId) -> Result<()> {
        self.store.upsert(&ExternalMapping {
            external_id: external_id.clone(),
            internal_id: internal_id.clone(),
            session_id: self.session_id.clone(),
            timestamp: Utc::now(),
        })?;
        let _ = self.entries.insert(external_id, internal_id);
        Ok(())
    }

    /// Internal id for `external_id`, if mapped.
    pub fn get(&self, external_id: &ExternalId) -> Option<&MessageId> {
        self.entries.get(external_id)
    }

    /// Forget `external_id`. Returns the id it pointed to.
    pub fn remove(&mut self, external_id: &ExternalId) -> Result<Option<MessageId>> {
        if !self.entries.contains_key(external_id) {
            return Ok(None);
        }
        self.store.remove(&self.session_id, external_id)?;
        Ok(self.entries.remove(external_id))
    }

    /// Number of mappings for this session.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the session has no mappings.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Session this map belongs to.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }
}
