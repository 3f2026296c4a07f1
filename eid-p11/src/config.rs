//! Viewer configuration
//!
//! A small JSON file. Missing or unreadable files fall back to defaults so a
//! broken config never keeps the viewer from reading a card.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors writing the configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(target_os = "macos")]
const DEFAULT_MODULE: &str = "libbeidpkcs11.dylib";
#[cfg(windows)]
const DEFAULT_MODULE: &str = "beidpkcs11.dll";
#[cfg(not(any(target_os = "macos", windows)))]
const DEFAULT_MODULE: &str = "libbeidpkcs11.so.0";

/// Viewer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Only consider slots with a card in them
    pub want_token: bool,
    /// Read certificates after the identity data
    pub read_certificates: bool,
    /// env_logger filter for the command-line reader
    pub log_filter: String,
    /// PKCS#11 library the command-line reader loads
    pub module_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            want_token: true,
            read_certificates: true,
            log_filter: "info".to_string(),
            module_path: PathBuf::from(DEFAULT_MODULE),
        }
    }
}

impl Config {
    const DEFAULT_CONFIG_FILE: &'static str = "config.json";

    /// Get the default configuration directory
    pub fn default_dir() -> PathBuf {
        if let Ok(path) = std::env::var("EID_P11_CONFIG_DIR") {
            return PathBuf::from(path);
        }
        if let Some(dir) = dirs::config_dir() {
            return dir.join("eid-p11");
        }
        PathBuf::from("/etc/eid-p11")
    }

    /// Path of the config file inside `dir`
    pub fn file_in(dir: &Path) -> PathBuf {
        dir.join(Self::DEFAULT_CONFIG_FILE)
    }

    /// Load the configuration from `path`, or from the default location
    pub fn load(path: Option<&Path>) -> Self {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| Self::file_in(&Self::default_dir()));

        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Self::default();
        }

        match fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config {:?}: {}", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Write the configuration as pretty JSON, creating the directory
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved config to {:?}", path);
        Ok(())
    }
}
