//! State-change notifications emitted by the manager.

use serde::{Deserialize, Serialize};

use super::state::OfflineState;

/// Emitted on every state transition of a pool entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChange {
    /// Identifier of the affected content
    pub identifier: String,

    /// The state the content transitioned into
    pub state: OfflineState,
}

impl StateChange {
    /// Create a new state-change notification
    pub fn new(identifier: impl Into<String>, state: OfflineState) -> Self {
        Self {
            identifier: identifier.into(),
            state,
        }
    }
}
