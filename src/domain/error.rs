//! Failure taxonomy for the preservation engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors captured into an item's error state
///
/// None of these propagate to callers of `preserve()`/`cancel()`, which
/// are fire-and-forget; they surface through the item's state and the
/// persisted record.
#[derive(Debug, Error)]
pub enum PreserveError {
    /// Verification failed after the session reported success
    #[error("downloaded resource is unreachable at {0}")]
    ResourceUnreachable(PathBuf),

    /// The final location could not be computed
    #[error("resource identifier could not be computed")]
    ResourceIdentifierMissing,

    /// The download session reported a failure
    #[error("transfer failed: {0}")]
    TransferFailed(String),

    /// Restoration found a type tag with no registered factory
    #[error("unregistered content type: {0}")]
    UnregisteredType(String),

    /// Restoration found properties the registered factory rejected
    #[error("malformed properties for content type: {0}")]
    MalformedProperties(String),
}
