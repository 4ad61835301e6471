//! cellheap configuration system
//!
//! User-level configuration for the demonstration driver. The allocator
//! itself never reads configuration; these settings only pick the heap a
//! script starts with and how chatty the CLI is.
//!
//! # Configuration hierarchy
//!
//! ```text
//! Priority (high -> low):
//! 1. CLI arguments
//! 2. Script `init` commands
//! 3. User-level (~/.config/cellheap/config.toml)
//! 4. Default values
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use cellheap::util::config::{load_user_config, UserConfig};
//!
//! let config = load_user_config().unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// User-level configuration for cellheap
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct UserConfig {
    /// Heap defaults for scripts that do not `init` their own
    #[serde(default)]
    pub heap: HeapSection,
    /// Logging settings
    #[serde(default)]
    pub log: LogSection,
}

/// Heap defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeapSection {
    /// Cells in a fresh heap
    #[serde(default = "default_capacity")]
    pub capacity: usize,
    /// Track live handles and reject double frees
    #[serde(default)]
    pub validate_handles: bool,
}

fn default_capacity() -> usize {
    64
}

impl Default for HeapSection {
    fn default() -> Self {
        Self {
            capacity: 64,
            validate_handles: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogSection {
    /// Default the CLI to debug-level output
    #[serde(default)]
    pub verbose: bool,
}

/// Get the user config directory
pub fn get_config_dir() -> Option<PathBuf> {
    // Try XDG config directory on Unix
    if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg_config).join("cellheap"));
    }

    // Fallback to ~/.config/cellheap
    if let Ok(home) = std::env::var("HOME") {
        return Some(PathBuf::from(home).join(".config").join("cellheap"));
    }

    // On Windows, try %APPDATA%
    if let Ok(appdata) = std::env::var("APPDATA") {
        return Some(PathBuf::from(appdata).join("cellheap"));
    }

    None
}

/// Get the user config file path (~/.config/cellheap/config.toml)
pub fn get_config_path() -> Option<PathBuf> {
    get_config_dir().map(|dir| dir.join("config.toml"))
}

/// Check if user config exists
pub fn config_exists() -> bool {
    get_config_path().map(|p| p.exists()).unwrap_or(false)
}

/// Load user-level configuration
/// Returns default config if file doesn't exist
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    let path = match get_config_path() {
        Some(p) => p,
        None => return Ok(UserConfig::default()),
    };

    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = fs::read_to_string(&path).map_err(ConfigError::IoError)?;

    toml::from_str(&content).map_err(ConfigError::ParseError)
}

/// Load user-level config, creating default if not exists
pub fn load_or_create_user_config() -> Result<UserConfig, ConfigError> {
    let path = match get_config_path() {
        Some(p) => p,
        None => return Ok(UserConfig::default()),
    };

    if !path.exists() {
        let config = UserConfig::default();
        save_user_config(&config)?;
        return Ok(config);
    }

    load_user_config()
}

/// Save user-level configuration
pub fn save_user_config(config: &UserConfig) -> Result<(), ConfigError> {
    let dir = get_config_dir().ok_or(ConfigError::NoConfigDir)?;
    let path = dir.join("config.toml");

    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(ConfigError::IoError)?;
    }

    let content = toml::to_string_pretty(config).map_err(ConfigError::SerializeError)?;
    fs::write(&path, content).map_err(ConfigError::IoError)?;

    Ok(())
}

/// Configuration errors
#[derive(Debug)]
pub enum ConfigError {
    IoError(std::io::Error),
    ParseError(toml::de::Error),
    SerializeError(toml::ser::Error),
    NoConfigDir,
}

impl std::fmt::Display for ConfigError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {}", e),
            ConfigError::ParseError(e) => write!(f, "Config parse error: {}", e),
            ConfigError::SerializeError(e) => write!(f, "Config serialize error: {}", e),
            ConfigError::NoConfigDir => write!(f, "Cannot determine config directory"),
        }
    }
}

impl std::error::Error for ConfigError {}
