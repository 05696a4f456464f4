//! Preservation state for one offline content item.
//!
//! The serialized form is the snapshot stored in content records:
//! `{kind, progress?, message?}`.

use serde::{Deserialize, Serialize};

/// State of one offline content item
///
/// Exactly one state holds at any time; transitions are applied by
/// `OfflineContent` and nowhere else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OfflineState {
    /// No resource on disk and no transfer in flight
    Ready,

    /// A transfer has been requested but no progress has arrived yet
    #[serde(rename = "initiated")]
    PreservationInitiated,

    /// Transfer in flight with fractional progress (0.0–1.0)
    Preserving { progress: f32 },

    /// Resource fully written and verified on disk
    Preserved,

    /// The last attempt failed
    Error { message: String },
}

impl OfflineState {
    /// Create an error state from any displayable cause
    pub fn error(cause: impl Into<String>) -> Self {
        Self::Error {
            message: cause.into(),
        }
    }

    /// Check whether a transfer is nominally in flight
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::PreservationInitiated | Self::Preserving { .. })
    }

    /// Get the current progress fraction, if preserving
    pub fn progress(&self) -> Option<f32> {
        match self {
            Self::Preserving { progress } => Some(*progress),
            _ => None,
        }
    }

    /// Get the captured failure cause, if in error
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Error { message } => Some(message),
            _ => None,
        }
    }
}

impl Default for OfflineState {
    fn default() -> Self {
        Self::Ready
    }
}

impl std::fmt::Display for OfflineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::PreservationInitiated => write!(f, "initiated"),
            Self::Preserving { progress } => write!(f, "preserving ({:.0}%)", progress * 100.0),
            Self::Preserved => write!(f, "preserved"),
            Self::Error { message } => write!(f, "error: {}", message),
        }
    }
}
