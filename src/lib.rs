//! anivault - Offline-content persistence engine
//!
//! Tracks, downloads, and durably preserves episode media across
//! process restarts, reconciling three sources of truth: the in-memory
//! content pool, a persistent property store, and the file system /
//! download session.
//!
//! # Architecture
//!
//! - Every restart-surviving state transition is written through to the
//!   property store before control returns
//! - The pool is restored from persisted records at startup; preserved
//!   records are validated against the file system and downgraded to
//!   ready when their resource is gone
//! - Download-session events are bridged into state transitions, with
//!   stale events rejected by task-handle comparison
//!
//! # Modules
//!
//! - `manager`: Pool orchestration and session-event bridging
//! - `content`: Content kinds, the per-item state machine, the registry
//! - `store`: Persistent property store (JSON file / in-memory)
//! - `session`: Download-session boundary and the HTTP adapter
//! - `domain`: Data structures (state, locations, records, events)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Preserve an episode
//! anivault preserve https://example.com/ep42.mp4 --source demo --episode 42
//!
//! # Inspect tracked contents
//! anivault list
//! anivault status demo-ep-42
//!
//! # Cancel an in-flight transfer
//! anivault cancel demo-ep-42
//! ```

pub mod cli;
pub mod config;
pub mod content;
pub mod domain;
pub mod manager;
pub mod session;
pub mod store;

// Re-export main types at crate root for convenience
pub use content::{ContentKind, ContentRegistry, EpisodeContent, EpisodeProperties, OfflineContent};
pub use domain::{
    ContentRecord, OfflineState, PreserveError, ResourceLocation, RootKind, StateChange,
    StorageRoots,
};
pub use manager::{OfflineContentManager, UNKNOWN_SIZE_PROGRESS};
pub use session::{DownloadRequest, DownloadSession, HttpDownloadSession, SessionEvent, TaskId};
pub use store::{JsonFileStore, MemoryStore, PropertyStore, StoreError};
