//! Domain types for the anivault preservation engine.
//!
//! This module contains the core data structures:
//! - State: the per-item preservation state machine's states
//! - Location: on-disk resource locations relative to storage roots
//! - Record: the durable serialization of one content item
//! - Events: state-change notifications

pub mod error;
pub mod events;
pub mod location;
pub mod record;
pub mod state;

// Re-export commonly used types
pub use error::PreserveError;
pub use events::StateChange;
pub use location::{ResourceLocation, RootKind, StorageRoots};
pub use record::ContentRecord;
pub use state::OfflineState;
