//! Offline content items and their state machine.
//!
//! `ContentKind` is the capability a concrete content type implements;
//! `OfflineContent` wraps one kind with the preservation state machine.
//! Transitions here are pure — the manager owns the surrounding I/O
//! (session calls, file moves, persistence, notifications) and applies
//! each transition plus its store write as one unit under the entry
//! lock.

pub mod episode;
pub mod registry;

use crate::domain::{ContentRecord, OfflineState, ResourceLocation};
use crate::session::{DownloadRequest, TaskId};

pub use episode::{EpisodeContent, EpisodeProperties, EPISODE_TYPE_TAG};
pub use registry::ContentRegistry;

/// Capability set a concrete content kind provides
pub trait ContentKind: Send + Sync {
    /// Registry type tag
    fn type_tag(&self) -> &'static str;

    /// Stable identifier, derived deterministically from content fields
    fn identifier(&self) -> String;

    /// Suggested name for the preserved file, before sanitizing
    fn display_name(&self) -> String;

    /// What the download session should transfer
    fn request(&self) -> DownloadRequest;

    /// Serializable content-type-specific payload
    fn properties(&self) -> serde_json::Value;
}

/// One preservable unit: a content kind plus its live preservation state
pub struct OfflineContent {
    kind: Box<dyn ContentKind>,
    identifier: String,
    state: OfflineState,
    location: Option<ResourceLocation>,
    /// Handle of the in-flight transfer; never persisted
    task: Option<TaskId>,
}

impl OfflineContent {
    /// Create a fresh item in the ready state
    pub fn new(kind: Box<dyn ContentKind>) -> Self {
        let identifier = kind.identifier();
        Self {
            kind,
            identifier,
            state: OfflineState::Ready,
            location: None,
            task: None,
        }
    }

    /// Reconstruct an item from a persisted snapshot
    pub fn restored(
        kind: Box<dyn ContentKind>,
        state: OfflineState,
        location: Option<ResourceLocation>,
    ) -> Self {
        let identifier = kind.identifier();
        Self {
            kind,
            identifier,
            state,
            location,
            task: None,
        }
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn type_tag(&self) -> &'static str {
        self.kind.type_tag()
    }

    pub fn state(&self) -> &OfflineState {
        &self.state
    }

    pub fn location(&self) -> Option<&ResourceLocation> {
        self.location.as_ref()
    }

    pub fn task(&self) -> Option<TaskId> {
        self.task
    }

    pub fn display_name(&self) -> String {
        self.kind.display_name()
    }

    pub fn request(&self) -> DownloadRequest {
        self.kind.request()
    }

    /// Begin a fresh preservation attempt.
    ///
    /// Re-entrant from ready and error; a no-op while a task is in
    /// flight (at-most-one-in-flight). Returns whether the attempt
    /// was started.
    pub fn begin(&mut self, task: TaskId) -> bool {
        if self.task.is_some() {
            return false;
        }

        self.task = Some(task);
        self.location = None;
        self.state = OfflineState::PreservationInitiated;
        true
    }

    /// Apply a progress update. Stale handles are rejected.
    pub fn progress(&mut self, task: TaskId, fraction: f32) -> bool {
        if self.task != Some(task) || !self.state.is_in_flight() {
            return false;
        }

        self.state = OfflineState::Preserving {
            progress: fraction.clamp(0.0, 1.0),
        };
        true
    }

    /// Complete preservation with a verified on-disk location.
    /// Stale handles are rejected.
    pub fn finish(&mut self, task: TaskId, location: ResourceLocation) -> bool {
        if self.task != Some(task) {
            return false;
        }

        self.task = None;
        self.location = Some(location);
        self.state = OfflineState::Preserved;
        true
    }

    /// Capture a failure cause. With `Some(task)` stale handles are
    /// rejected; `None` bypasses the handle check for failures raised
    /// outside the session (e.g. verification).
    pub fn fail(&mut self, task: Option<TaskId>, cause: impl Into<String>) -> bool {
        if let Some(task) = task {
            if self.task != Some(task) {
                return false;
            }
        }

        self.task = None;
        self.location = None;
        self.state = OfflineState::error(cause);
        true
    }

    /// Reset to ready, invalidating the task handle first so that a
    /// late-arriving completion event fails the handle comparison.
    /// Returns the handle that must still be aborted, if any.
    pub fn cancel(&mut self) -> Option<TaskId> {
        let task = self.task.take();
        self.location = None;
        self.state = OfflineState::Ready;
        task
    }

    /// Drop a dangling resource and reset to ready (restore-time
    /// downgrade for unreachable preserved records)
    pub fn downgrade(&mut self) {
        self.location = None;
        self.state = OfflineState::Ready;
    }

    /// Build the persisted record for the current state
    pub fn to_record(&self) -> ContentRecord {
        let record = ContentRecord::new(
            self.kind.type_tag(),
            self.state.clone(),
            self.kind.properties(),
        );

        match (&self.state, &self.location) {
            (OfflineState::Preserved, Some(location)) => record.with_location(location),
            _ => record,
        }
    }
}
