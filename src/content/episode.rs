//! Episode content: the built-in preservable content kind.

use serde::{Deserialize, Serialize};

use crate::session::DownloadRequest;

use super::ContentKind;

/// Registry tag for episode content
pub const EPISODE_TYPE_TAG: &str = "episode";

/// Current schema version of `EpisodeProperties`
pub const EPISODE_SCHEMA_VERSION: u32 = 1;

/// Serializable payload of one episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeProperties {
    /// Schema version for forward-compatible migrations
    pub version: u32,

    /// Source site the episode was resolved from
    pub source: String,

    /// Episode number within the source
    pub episode: u32,

    /// Display title
    pub title: String,

    /// Resolved playable resource URL
    pub url: String,
}

/// One downloadable episode tracked for permanent on-device storage
#[derive(Debug, Clone)]
pub struct EpisodeContent {
    props: EpisodeProperties,
}

impl EpisodeContent {
    /// Create episode content from resolved fields
    pub fn new(
        source: impl Into<String>,
        episode: u32,
        title: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            props: EpisodeProperties {
                version: EPISODE_SCHEMA_VERSION,
                source: source.into(),
                episode,
                title: title.into(),
                url: url.into(),
            },
        }
    }

    /// Reconstruct from serialized properties.
    ///
    /// Returns `None` when the payload does not parse or carries an
    /// unknown schema version — callers drop the record, they do not
    /// fail.
    pub fn from_properties(properties: &serde_json::Value) -> Option<Self> {
        let props: EpisodeProperties = serde_json::from_value(properties.clone()).ok()?;
        if props.version != EPISODE_SCHEMA_VERSION {
            return None;
        }
        Some(Self { props })
    }

    pub fn properties_ref(&self) -> &EpisodeProperties {
        &self.props
    }
}

impl ContentKind for EpisodeContent {
    fn type_tag(&self) -> &'static str {
        EPISODE_TYPE_TAG
    }

    fn identifier(&self) -> String {
        format!("{}-ep-{}", self.props.source, self.props.episode)
    }

    fn display_name(&self) -> String {
        if self.props.title.is_empty() {
            format!("{} ep{}", self.props.source, self.props.episode)
        } else {
            format!("{} - ep{}", self.props.title, self.props.episode)
        }
    }

    fn request(&self) -> DownloadRequest {
        DownloadRequest::new(&self.props.url, self.display_name())
    }

    fn properties(&self) -> serde_json::Value {
        serde_json::to_value(&self.props).unwrap_or(serde_json::Value::Null)
    }
}
