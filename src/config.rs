//! Configuration module for the news ranking engine.
//!
//! This module provides a layered configuration system that supports:
//! - Default values
//! - TOML configuration file
//! - Environment variable overrides
//! - CLI argument overrides
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `NR_` and use double underscores
//! to separate nested levels:
//! - `NR_SEMANTIC__MODEL=MultilingualE5Small` sets `semantic.model`
//! - `NR_RESULT_CACHE__TTL_SECS=60` sets `result_cache.ttl_secs`
//! - `NR_LOGGING__LEVEL=debug` sets `logging.level`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::types::{DEFAULT_CHUNK_SIZE, DEFAULT_NUM};

/// Directory holding the workspace configuration and default cache.
pub const CONFIG_DIR: &str = ".newsrank";

/// Settings file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Workspace root directory (where .newsrank is located)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workspace_root: Option<PathBuf>,

    /// Global debug mode
    #[serde(default = "default_false")]
    pub debug: bool,

    /// Embedding model and vector cache settings
    #[serde(default)]
    pub semantic: SemanticConfig,

    /// Request defaults
    #[serde(default)]
    pub search: SearchConfig,

    /// Response cache settings
    #[serde(default)]
    pub result_cache: ResultCacheConfig,

    /// Log output settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SemanticConfig {
    /// Enable semantic search
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Model to use for embeddings
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Where downloaded model files are kept
    #[serde(default = "default_model_cache_dir")]
    pub model_cache_dir: PathBuf,

    /// Show a progress bar while the model downloads
    #[serde(default = "default_false")]
    pub show_download_progress: bool,

    /// Keep article vectors on disk between runs
    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    /// Directory of the persisted vector cache
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    /// Results returned when a request does not say
    #[serde(default = "default_num")]
    pub default_num: usize,

    /// Similarity floor applied when a request does not say
    #[serde(default)]
    pub default_min_similarity: f32,

    /// Encoding batch size when a request does not say
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ResultCacheConfig {
    /// Reuse complete responses for repeated requests
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Lifetime of a cached response in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Minimum seconds between sweeps of expired entries
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default level for this crate's logs; `RUST_LOG` takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_false() -> bool {
    false
}
fn default_embedding_model() -> String {
    "ParaphraseMLMiniLML12V2".to_string()
}
fn default_model_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .map(|dir| dir.join("newsrank").join("models"))
        .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join("models"))
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("vectors")
}
fn default_num() -> usize {
    DEFAULT_NUM
}
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_ttl_secs() -> u64 {
    300
}
fn default_cleanup_interval_secs() -> u64 {
    60
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            workspace_root: None,
            debug: false,
            semantic: SemanticConfig::default(),
            search: SearchConfig::default(),
            result_cache: ResultCacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SemanticConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            model: default_embedding_model(),
            model_cache_dir: default_model_cache_dir(),
            show_download_progress: false,
            cache_enabled: true,
            cache_dir: default_cache_dir(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_num: default_num(),
            default_min_similarity: 0.0,
            default_chunk_size: default_chunk_size(),
        }
    }
}

impl Default for ResultCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// `NR_` environment variables, `__` separating nested levels.
fn env_provider() -> Env {
    Env::prefixed("NR_").map(|key| {
        key.as_str()
            .to_lowercase()
            .replace("__", ".") // Double underscore becomes dot
            .into()
    })
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        // Try to find the workspace root by looking for .newsrank directory
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));

        Self::load_from(config_path).map(|mut settings| {
            // If workspace_root is not set in config, detect it
            if settings.workspace_root.is_none() {
                settings.workspace_root = Self::workspace_root();
            }
            settings
        })
    }

    /// Load configuration from a specific file
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Settings::default()))
            // Layer in config file if it exists
            .merge(Toml::file(path.as_ref()))
            // Layer in environment variables with NR_ prefix
            .merge(env_provider())
            .extract()
            .map(|mut settings: Settings| {
                // A file inside `.newsrank/` anchors relative paths to its workspace
                if settings.workspace_root.is_none() {
                    settings.workspace_root = Self::workspace_of(path.as_ref());
                }
                settings
            })
            .map_err(Box::new)
    }

    fn workspace_of(config_path: &Path) -> Option<PathBuf> {
        let dir = config_path.parent()?;
        if dir.file_name()? != std::ffi::OsStr::new(CONFIG_DIR) || !dir.is_dir() {
            return None;
        }
        let root = dir.parent()?;
        if root.as_os_str().is_empty() {
            std::env::current_dir().ok()
        } else {
            std::path::absolute(root).ok()
        }
    }

    /// Find the workspace config by looking for .newsrank directory
    /// Searches from current directory up to root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Get the workspace root directory (where .newsrank is located)
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;

        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Resolve a configured directory against the workspace root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.workspace_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Absolute (when a workspace is known) vector cache directory.
    pub fn cache_dir(&self) -> PathBuf {
        self.resolve_path(&self.semantic.cache_dir)
    }

    /// Absolute (when a workspace is known) model download directory.
    pub fn model_cache_dir(&self) -> PathBuf {
        self.resolve_path(&self.semantic.model_cache_dir)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Create a default settings file with helpful comments in the current directory
    pub fn init_config_file(force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let current_dir = std::env::current_dir()?;
        Self::init_config_file_in(&current_dir, force)
    }

    /// Create a default settings file with helpful comments under `root`
    pub fn init_config_file_in(
        root: &Path,
        force: bool,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = root.join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }

        // Create parent directory if needed
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = format!(
            r#"# newsrank configuration file

# Version of the configuration schema
version = 1

# Global debug mode
debug = false

[semantic]
# Enable semantic ranking (the embedding model loads once per process)
enabled = true

# Embedding model, one of: ParaphraseMLMiniLML12V2, ParaphraseMLMpnetBaseV2,
# MultilingualE5Small, MultilingualE5Base, AllMiniLML6V2, AllMiniLML12V2
model = "{model}"

# Where model files are downloaded (first run only)
model_cache_dir = '{model_dir}'

# Show a progress bar while the model downloads
show_download_progress = false

# Keep article vectors on disk so articles are embedded only once
cache_enabled = true

# Vector cache directory (relative to the workspace root)
cache_dir = ".newsrank/vectors"

[search]
# Values used when a request leaves them out
default_num = {num}
default_min_similarity = 0.0
default_chunk_size = {chunk}

[result_cache]
# Reuse complete responses for identical requests over the same articles
enabled = true

# Seconds a cached response stays fresh
ttl_secs = 300

# Minimum seconds between sweeps of expired responses
cleanup_interval_secs = 60

[logging]
# Log level for newsrank (RUST_LOG overrides this)
level = "info"
"#,
            model = default_embedding_model(),
            model_dir = default_model_cache_dir().display(),
            num = DEFAULT_NUM,
            chunk = DEFAULT_CHUNK_SIZE,
        );

        std::fs::write(&config_path, template)?;

        Ok(config_path)
    }
}
