//! Settings read from `config.toml` in the user's configuration directory.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_HOST: &str = "www.youtube.com";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 6.1; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/97.0.4692.98 Safari/537.36";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Host serving the watch pages.
    pub host: String,
    /// Browser user agent sent with every request.
    pub user_agent: String,
    /// Where downloads are written.
    pub output_dir: PathBuf,
    /// Timeout around the page fetch. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            output_dir: PathBuf::from("./output"),
            timeout_secs: None,
        }
    }
}

impl Config {
    /// The default location, `<config dir>/tubedl/config.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("tubedl").join("config.toml"))
    }

    /// Parses a configuration document. Missing keys take their defaults.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        if config.host.trim().is_empty() || config.host.contains('/') {
            return Err(Error::Config(format!("invalid host '{}'", config.host)));
        }
        Ok(config)
    }

    /// Reads the configuration at `path`. A missing or empty file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() || fs::metadata(path)?.len() == 0 {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Reads the configuration from the default location, falling back to the defaults if it is
    /// missing or malformed.
    pub fn load_or_default() -> Self {
        let Some(path) = Self::default_path() else {
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                log::error!("Malformed config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}
