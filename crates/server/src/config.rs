//! Configuration for the BarrelKV server.
//!
//! Settings come from a TOML file; every field has a default so a missing
//! file yields a working local configuration:
//!
//! ```toml
//! dir = "data"
//! address = "127.0.0.1:6767"
//! read_only = false
//! debug = false
//! auto_sync = true
//! ```
//!
//! The file path is taken from `BARRELKV_CONFIG`, falling back to
//! `barrelkv.toml` in the working directory.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "BARRELKV_CONFIG";

/// Default config file path.
pub const DEFAULT_CONFIG_PATH: &str = "barrelkv.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Database directory.
    pub dir: PathBuf,

    /// Listen address for the TCP server.
    pub address: String,

    /// Open the store read-only.
    pub read_only: bool,

    /// Verbose logging.
    pub debug: bool,

    /// fsync after every write.
    pub auto_sync: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data"),
            address: "127.0.0.1:6767".to_string(),
            read_only: false,
            debug: false,
            auto_sync: true,
        }
    }
}

impl Config {
    /// Loads the config from `BARRELKV_CONFIG` (or `barrelkv.toml`),
    /// falling back to defaults when the file does not exist.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(&path)
    }

    /// Loads the config from an explicit path; a missing file yields the
    /// defaults, an unparsable one is an error.
    pub fn load_from(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config at {}", path))?;
            let config: Config = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config at {}", path))?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Translates the server config into engine options.
    pub fn to_options(&self) -> engine::Options {
        engine::Options::new(&self.dir)
            .read_only(self.read_only)
            .debug(self.debug)
            .auto_sync(self.auto_sync)
    }
}
