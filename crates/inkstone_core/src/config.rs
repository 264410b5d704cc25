//! Configuration collaborator contract.
//!
//! # Responsibility
//! - Recall the last open notebook/note across restarts.
//!
//! The storage format belongs to the embedding application; this core only
//! reads and writes the typed record.

use crate::model::entity::EntityId;
use serde::{Deserialize, Serialize};

/// Selection persisted across restarts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastState {
    pub notebook_id: EntityId,
    pub note_id: EntityId,
}

/// Small persisted key-value record used by the controller.
pub trait ConfigStore {
    fn last_state(&self) -> Option<LastState>;
    fn set_last_state(&mut self, state: LastState);
}

/// Non-persisting implementation for tests and ephemeral embedders.
#[derive(Debug, Default)]
pub struct MemoryConfig {
    last_state: Option<LastState>,
}

impl MemoryConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConfigStore for MemoryConfig {
    fn last_state(&self) -> Option<LastState> {
        self.last_state
    }

    fn set_last_state(&mut self, state: LastState) {
        self.last_state = Some(state);
    }
}
