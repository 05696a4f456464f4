//! Download-session boundary.
//!
//! The session is the external collaborator performing actual network
//! transfer. It hands out opaque task handles and delivers lifecycle
//! events asynchronously on a channel; the manager pumps those events
//! into state transitions. Retry/backoff policy belongs to the session,
//! not to this crate's manager.

pub mod http;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use http::HttpDownloadSession;

/// Opaque handle identifying one in-flight transfer
///
/// Handles are compared to detect stale events: a completion callback
/// whose handle no longer matches the item's current handle is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    /// Allocate a fresh task handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the session is asked to transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    /// Resolved playable resource URL
    pub url: String,

    /// Human-readable name, used for logging only
    pub display_name: String,
}

impl DownloadRequest {
    /// Create a new download request
    pub fn new(url: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            display_name: display_name.into(),
        }
    }
}

/// Lifecycle events delivered by the session, keyed by task handle
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Bytes arrived; `total_bytes` is absent when the transfer size is unknown
    Progress {
        task: TaskId,
        bytes_written: u64,
        total_bytes: Option<u64>,
    },

    /// The transfer finished and the payload sits at a temporary location
    Finished {
        task: TaskId,
        temp_path: PathBuf,
        suggested_filename: Option<String>,
    },

    /// The transfer failed
    Failed { task: TaskId, cause: String },
}

impl SessionEvent {
    /// The task handle this event belongs to
    pub fn task(&self) -> TaskId {
        match self {
            Self::Progress { task, .. }
            | Self::Finished { task, .. }
            | Self::Failed { task, .. } => *task,
        }
    }
}

/// External service performing network transfers
#[async_trait]
pub trait DownloadSession: Send + Sync {
    /// Begin a transfer; events for the returned handle arrive on the
    /// session's event channel
    async fn start(&self, request: DownloadRequest) -> TaskId;

    /// Abort an in-flight transfer. No-op for unknown handles.
    async fn abort(&self, task: TaskId);
}
