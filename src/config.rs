//! Configuration for anivault paths.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (ANIVAULT_HOME, ANIVAULT_LIBRARY)
//! 2. Config file (.anivault/config.yaml)
//! 3. Defaults (~/.anivault)
//!
//! Config file discovery:
//! - Searches current directory and parents for .anivault/config.yaml
//! - Paths in config file are relative to the config file's parent directory
//!
//! The manager never reads this module: it takes explicit
//! `StorageRoots` and collaborators, so tests run against fresh
//! instances with in-memory stores. Only the CLI resolves the global
//! configuration.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::domain::StorageRoots;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Engine state directory (relative to config file)
    pub home: Option<String>,
    /// Preserved content library directory (relative to config file)
    pub library: Option<String>,
    /// Staging directory for in-flight transfers (relative to config file)
    pub staging: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to anivault home (engine state, scratch root)
    pub home: PathBuf,
    /// Absolute path to the preserved content library (persistent root)
    pub library: PathBuf,
    /// Absolute path to the transfer staging directory
    pub staging: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Path of the property store file ($ANIVAULT_HOME/contents.json)
    pub fn store_path(&self) -> PathBuf {
        self.home.join("contents.json")
    }

    /// Storage roots the manager resolves resource locations against
    pub fn storage_roots(&self) -> StorageRoots {
        StorageRoots::new(&self.home, &self.library)
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".anivault").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".anivault");

    // Check for config file
    let config_file = find_config_file();

    let (home, library, staging) = if let Some(ref config_path) = config_file {
        // Config file found - use it as base
        let config = load_config_file(config_path)?;

        // Base directory is the parent of .anivault/ (i.e., grandparent of config.yaml)
        let base_dir = config_path
            .parent() // .anivault/
            .and_then(|p| p.parent()) // project root
            .unwrap_or(Path::new("."));

        // Resolve home path
        let home = if let Ok(env_home) = std::env::var("ANIVAULT_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            // home is relative to .anivault/ directory
            let anivault_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(anivault_dir, home_path)
        } else {
            default_home.clone()
        };

        // Resolve library path
        let library = if let Ok(env_lib) = std::env::var("ANIVAULT_LIBRARY") {
            PathBuf::from(env_lib)
        } else if let Some(ref lib_path) = config.paths.library {
            resolve_path(base_dir, lib_path)
        } else {
            home.join("library")
        };

        // Resolve staging path
        let staging = if let Some(ref staging_path) = config.paths.staging {
            resolve_path(base_dir, staging_path)
        } else {
            home.join("staging")
        };

        (home, library, staging)
    } else {
        // No config file - use env vars or defaults
        let home = std::env::var("ANIVAULT_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_home.clone());

        let library = std::env::var("ANIVAULT_LIBRARY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| home.join("library"));

        let staging = home.join("staging");

        (home, library, staging)
    };

    Ok(ResolvedConfig {
        home,
        library,
        staging,
        config_file,
    })
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| {
        load_config().map_err(|e| e.to_string())
    });

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
