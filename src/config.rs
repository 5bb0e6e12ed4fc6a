//! Configuration for content storage paths and package import.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (H5P_CONTENT_HOME, H5P_CONTENT_STORAGE)
//! 2. Config file (.h5p-content/config.yaml)
//! 3. Defaults (~/.h5p-content)
//!
//! Config file discovery:
//! - Searches current directory and parents for .h5p-content/config.yaml
//! - `paths.home` is relative to the .h5p-content/ directory
//! - `paths.storage` is relative to the directory containing .h5p-content/

pub mod paths;

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use glob::Pattern;
use serde::Deserialize;

/// Directory name searched for when discovering the config file
pub const CONFIG_DIR: &str = ".h5p-content";

const ENV_HOME: &str = "H5P_CONTENT_HOME";
const ENV_STORAGE: &str = "H5P_CONTENT_STORAGE";

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub import: ImportSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to .h5p-content/)
    pub home: Option<String>,
    /// Content storage root (relative to the project root)
    pub storage: Option<String>,
}

/// Settings applied when importing packages.
///
/// Passed by value into the content manager; never mutated after load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ImportSettings {
    /// Upper bound on concurrent file copies (unbounded when unset or 0)
    #[serde(default)]
    pub max_concurrent_copies: Option<usize>,

    /// Glob patterns, matched against paths relative to `content/`, for
    /// files that are left out of an import
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
}

impl ImportSettings {
    /// Check if a package file matches any ignore pattern
    pub fn is_ignored(&self, relative_path: &str) -> bool {
        for pattern_str in &self.ignore_patterns {
            if let Ok(pattern) = Pattern::new(pattern_str) {
                if pattern.matches(relative_path) {
                    return true;
                }
            }
        }
        false
    }

    /// Number of copies allowed in flight for a package of `file_count` files
    pub fn copy_limit(&self, file_count: usize) -> usize {
        match self.max_concurrent_copies {
            Some(limit) if limit > 0 => limit,
            _ => file_count.max(1),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// State directory
    pub home: PathBuf,
    /// Content storage root
    pub storage: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    /// Import settings
    pub import: ImportSettings,
}

/// Find config file by searching `start` and its parents
fn find_config_file(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();

    loop {
        let config_path = current.join(CONFIG_DIR).join("config.yaml");
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

/// Combine config file, environment overrides and defaults
fn resolve(
    config_file: Option<PathBuf>,
    env_home: Option<String>,
    env_storage: Option<String>,
    default_home: PathBuf,
) -> Result<ResolvedConfig> {
    let (home, storage, import) = if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // .h5p-content/ and the project root that contains it
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let base_dir = config_dir.parent().unwrap_or(Path::new("."));

        let home = match (env_home, config.paths.home.as_deref()) {
            (Some(env), _) => PathBuf::from(env),
            (None, Some(home_path)) => resolve_path(config_dir, home_path),
            (None, None) => default_home,
        };

        let storage = match (env_storage, config.paths.storage.as_deref()) {
            (Some(env), _) => PathBuf::from(env),
            (None, Some(storage_path)) => resolve_path(base_dir, storage_path),
            (None, None) => home.join(paths::CONTENT_DIR),
        };

        (home, storage, config.import)
    } else {
        let home = env_home.map(PathBuf::from).unwrap_or(default_home);
        let storage = env_storage
            .map(PathBuf::from)
            .unwrap_or_else(|| home.join(paths::CONTENT_DIR));

        (home, storage, ImportSettings::default())
    };

    Ok(ResolvedConfig {
        home,
        storage,
        config_file,
        import,
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(CONFIG_DIR);

    let config_file = std::env::current_dir()
        .ok()
        .and_then(|cwd| find_config_file(&cwd));

    resolve(
        config_file,
        std::env::var(ENV_HOME).ok(),
        std::env::var(ENV_STORAGE).ok(),
        default_home,
    )
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration, bypassing the cache
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
