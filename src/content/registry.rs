//! Content type registry: type tag → reconstruction factory.
//!
//! The registry lets the manager restore open-ended content kinds
//! without knowing concrete types. Unknown tags and malformed
//! properties fail closed: `reconstruct` returns `None` and the caller
//! drops the record.

use std::collections::HashMap;

use super::episode::{EpisodeContent, EPISODE_TYPE_TAG};
use super::ContentKind;

type Factory = Box<dyn Fn(&serde_json::Value) -> Option<Box<dyn ContentKind>> + Send + Sync>;

/// Maps stored type tags to factories reconstructing typed content
pub struct ContentRegistry {
    factories: HashMap<String, Factory>,
}

impl ContentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Create a registry with the built-in content kinds registered
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(EPISODE_TYPE_TAG, |properties| {
            EpisodeContent::from_properties(properties)
                .map(|episode| Box::new(episode) as Box<dyn ContentKind>)
        });
        registry
    }

    /// Register a factory for a type tag
    pub fn register<F>(&mut self, type_tag: impl Into<String>, factory: F)
    where
        F: Fn(&serde_json::Value) -> Option<Box<dyn ContentKind>> + Send + Sync + 'static,
    {
        self.factories.insert(type_tag.into(), Box::new(factory));
    }

    /// Reconstruct a content kind from its serialized properties
    pub fn reconstruct(
        &self,
        type_tag: &str,
        properties: &serde_json::Value,
    ) -> Option<Box<dyn ContentKind>> {
        self.factories.get(type_tag)?(properties)
    }

    /// Check whether a type tag has a registered factory
    pub fn is_registered(&self, type_tag: &str) -> bool {
        self.factories.contains_key(type_tag)
    }
}

impl Default for ContentRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode_properties() -> serde_json::Value {
        serde_json::json!({
            "version": 1,
            "source": "demo",
            "episode": 7,
            "title": "Pilot",
            "url": "https://example.com/ep7.mp4",
        })
    }

    #[test]
    fn test_reconstruct_registered_kind() {
        let registry = ContentRegistry::with_defaults();
        let kind = registry
            .reconstruct(EPISODE_TYPE_TAG, &episode_properties())
            .unwrap();

        assert_eq!(kind.type_tag(), EPISODE_TYPE_TAG);
        assert_eq!(kind.identifier(), "demo-ep-7");
    }

    #[test]
    fn test_unknown_tag_fails_closed() {
        let registry = ContentRegistry::with_defaults();
        assert!(registry.reconstruct("movie", &episode_properties()).is_none());
        assert!(!registry.is_registered("movie"));
    }

    #[test]
    fn test_malformed_properties_fail_closed() {
        let registry = ContentRegistry::with_defaults();
        assert!(registry
            .reconstruct(EPISODE_TYPE_TAG, &serde_json::json!({"bogus": true}))
            .is_none());
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = ContentRegistry::new();
        assert!(!registry.is_registered(EPISODE_TYPE_TAG));

        registry.register("episode", |properties| {
            EpisodeContent::from_properties(properties)
                .map(|episode| Box::new(episode) as Box<dyn ContentKind>)
        });

        assert!(registry.is_registered("episode"));
    }
}
