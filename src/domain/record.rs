//! Persisted record for one offline content item.
//!
//! Wire format:
//! `{ "type", "state", "properties", "path"?, "relative"?, "updated_at" }`.
//! The `path`/`relative` pair is present exactly when the state snapshot
//! is `preserved`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::location::{ResourceLocation, RootKind};
use super::state::OfflineState;

/// The durable serialization of one offline content item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    /// Registry type tag
    #[serde(rename = "type")]
    pub type_tag: String,

    /// State snapshot at the time of the last write
    pub state: OfflineState,

    /// Content-type-specific payload, opaque to the manager
    pub properties: serde_json::Value,

    /// Relative path of the on-disk resource, present only when preserved
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Root the relative path resolves against
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relative: Option<RootKind>,

    /// When this record was last written
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl ContentRecord {
    /// Create a record without an on-disk resource
    pub fn new(
        type_tag: impl Into<String>,
        state: OfflineState,
        properties: serde_json::Value,
    ) -> Self {
        Self {
            type_tag: type_tag.into(),
            state,
            properties,
            path: None,
            relative: None,
            updated_at: Utc::now(),
        }
    }

    /// Attach a resource location
    pub fn with_location(mut self, location: &ResourceLocation) -> Self {
        self.path = Some(location.relative_path.clone());
        self.relative = Some(location.root);
        self
    }

    /// Reassemble the resource location, if both fields are present
    pub fn location(&self) -> Option<ResourceLocation> {
        match (&self.path, self.relative) {
            (Some(path), Some(root)) => Some(ResourceLocation::new(path.clone(), root)),
            _ => None,
        }
    }

    /// Check the `path present ⇔ preserved` invariant
    pub fn is_consistent(&self) -> bool {
        let preserved = matches!(self.state, OfflineState::Preserved);
        let located = self.path.is_some() && self.relative.is_some();
        preserved == located
    }
}
