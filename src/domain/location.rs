//! On-disk resource locations and the storage roots they resolve against.
//!
//! A location stores only a root kind plus a relative path so that the
//! absolute roots can move across OS upgrades or reinstalls without
//! invalidating persisted records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;

/// Which storage root a relative path resolves against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RootKind {
    /// Home-like scratch root used by managed-session downloads.
    /// Less stable across reinstalls; always re-validated at restore.
    Home,

    /// App-owned persistent content root used for plain file downloads
    Persist,
}

impl std::fmt::Display for RootKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Home => write!(f, "home"),
            Self::Persist => write!(f, "persist"),
        }
    }
}

/// Where a fully-written resource lives on disk
///
/// Only set once the resource exists; absence means "no on-disk
/// resource yet".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocation {
    /// Path relative to the storage root
    pub relative_path: String,

    /// Root the relative path resolves against
    pub root: RootKind,
}

impl ResourceLocation {
    /// Create a new resource location
    pub fn new(relative_path: impl Into<String>, root: RootKind) -> Self {
        Self {
            relative_path: relative_path.into(),
            root,
        }
    }

    /// Resolve to an absolute path under the given roots
    pub fn resolve(&self, roots: &StorageRoots) -> PathBuf {
        roots.root(self.root).join(&self.relative_path)
    }
}

/// The two storage roots the engine writes under
#[derive(Debug, Clone)]
pub struct StorageRoots {
    /// Home-like scratch root
    pub home: PathBuf,

    /// App-owned persistent content root
    pub persist: PathBuf,
}

impl StorageRoots {
    /// Create storage roots from explicit directories
    pub fn new(home: impl Into<PathBuf>, persist: impl Into<PathBuf>) -> Self {
        Self {
            home: home.into(),
            persist: persist.into(),
        }
    }

    /// Get the directory for a root kind
    pub fn root(&self, kind: RootKind) -> &Path {
        match kind {
            RootKind::Home => &self.home,
            RootKind::Persist => &self.persist,
        }
    }

    /// Ensure the directory for a root kind exists, creating it on demand
    pub async fn ensure(&self, kind: RootKind) -> std::io::Result<&Path> {
        let dir = self.root(kind);
        fs::create_dir_all(dir).await?;
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_kind_wire_format() {
        assert_eq!(serde_json::to_value(RootKind::Home).unwrap(), "home");
        assert_eq!(serde_json::to_value(RootKind::Persist).unwrap(), "persist");
    }

    #[test]
    fn test_resolve_against_roots() {
        let roots = StorageRoots::new("/data/home", "/data/contents");

        let home = ResourceLocation::new("a/b.mp4", RootKind::Home);
        assert_eq!(home.resolve(&roots), PathBuf::from("/data/home/a/b.mp4"));

        let persist = ResourceLocation::new("ep.mp4", RootKind::Persist);
        assert_eq!(persist.resolve(&roots), PathBuf::from("/data/contents/ep.mp4"));
    }

    #[tokio::test]
    async fn test_ensure_creates_missing_root() {
        let temp = tempfile::TempDir::new().unwrap();
        let roots = StorageRoots::new(
            temp.path().join("home"),
            temp.path().join("contents"),
        );

        assert!(!roots.persist.exists());
        roots.ensure(RootKind::Persist).await.unwrap();
        assert!(roots.persist.exists());
    }
}
