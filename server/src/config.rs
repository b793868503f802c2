//! Configuration loading (`periscope.toml`).
//!
//! A missing config file is not an error - defaults apply. The path can be
//! overridden with the `PERISCOPE_CONFIG` environment variable.
//!
//! ```toml
//! [server]
//! port = 3846
//! bind = "127.0.0.1"
//! keep_alive_secs = 30
//!
//! [host]
//! poll_interval_secs = 2
//! ```

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

const CONFIG_ENV: &str = "PERISCOPE_CONFIG";
const CONFIG_FILE: &str = "periscope.toml";

const fn default_port() -> u16 {
    3846
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

const fn default_keep_alive() -> u64 {
    30
}

const fn default_poll_interval() -> u64 {
    2
}

#[derive(Debug, Default, Deserialize)]
pub struct PeriscopeConfig {
    pub server: Option<ServerSection>,
    pub host: Option<HostSection>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Listen port for the HTTP shell.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Bind address. Loopback by default - the server trusts its callers.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Interval between keep-alive comments on an idle channel.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            keep_alive_secs: default_keep_alive(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HostSection {
    /// How often the snapshot-file host re-reads its export.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

impl PeriscopeConfig {
    /// Load from the default location; a missing file yields defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(CONFIG_FILE));
        if !path.exists() {
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    /// Load from an explicit path; here a missing file is an error.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Server section with defaults filled in.
    #[must_use]
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// Host section with defaults filled in.
    #[must_use]
    pub fn host(&self) -> HostSection {
        self.host.clone().unwrap_or_default()
    }
}
