//! Configuration for sshline.
//!
//! Settings are read from `~/.sshline/config.toml`; a missing file means
//! defaults. Command-line flags override anything set here.
//!
//! # Configuration File
//!
//! ```toml
//! # Prefilled login form values (optional)
//! host = "192.168.1.100"
//! port = "22"
//! user = "admin"
//!
//! # TERM requested for the remote pty
//! term = "xterm-256color"
//!
//! # Line-mode history and full-screen buffer bounds
//! scrollback_lines = 10000
//! raw_buffer_bytes = 1048576
//!
//! # Dial/handshake timeout
//! connect_timeout_secs = 10
//!
//! # trace, debug, info, warn, error
//! log_level = "info"
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::classifier::DEFAULT_RAW_LIMIT;
use crate::core::orchestrator::Limits;
use crate::core::scrollback::DEFAULT_MAX_LINES;
use crate::core::ssh::SshOptions;

const CONFIG_DIR: &str = ".sshline";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Default host for the login form
    pub host: Option<String>,
    /// Default port for the login form
    pub port: Option<String>,
    /// Default user for the login form
    pub user: Option<String>,
    /// TERM value for the remote pty
    pub term: String,
    /// Line-mode scrollback capacity
    pub scrollback_lines: usize,
    /// Full-screen output buffer bound
    pub raw_buffer_bytes: usize,
    /// Dial and handshake timeout in seconds
    pub connect_timeout_secs: u64,
    /// Log filter level
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: None,
            port: None,
            user: None,
            term: "xterm-256color".to_string(),
            scrollback_lines: DEFAULT_MAX_LINES,
            raw_buffer_bytes: DEFAULT_RAW_LIMIT,
            connect_timeout_secs: 10,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `~/.sshline/config.toml`
    pub fn load() -> Result<Self, ConfigError> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Load configuration from an explicit path
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

    fn config_path() -> Option<PathBuf> {
        data_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn limits(&self) -> Limits {
        Limits {
            scrollback_lines: self.scrollback_lines,
            raw_buffer_bytes: self.raw_buffer_bytes,
        }
    }

    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            term: self.term.clone(),
            timeout: Duration::from_secs(self.connect_timeout_secs.max(1)),
        }
    }
}

/// `~/.sshline`, holding the config file and the log
pub fn data_dir() -> Option<PathBuf> {
    home_dir().map(|home| home.join(CONFIG_DIR))
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("USERPROFILE")
        .or_else(|| std::env::var_os("HOME"))
        .map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str("host = \"example.org\"\nscrollback_lines = 500\n").unwrap();
        assert_eq!(config.host.as_deref(), Some("example.org"));
        assert_eq!(config.scrollback_lines, 500);
        assert_eq!(config.term, "xterm-256color");
        assert_eq!(config.raw_buffer_bytes, DEFAULT_RAW_LIMIT);
    }

    #[test]
    fn test_empty_file_is_default() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_from_reports_parse_errors() {
        let path = std::env::temp_dir().join(format!("sshline-config-{}.toml", std::process::id()));
        fs::write(&path, "scrollback_lines = \"many\"").unwrap();
        let result = Config::load_from(&path);
        let _ = fs::remove_file(&path);

        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let result = Config::load_from(Path::new("/nonexistent/sshline/config.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_ssh_options_timeout_floor() {
        let config = Config {
            connect_timeout_secs: 0,
            ..Config::default()
        };
        assert_eq!(config.ssh_options().timeout, Duration::from_secs(1));
    }
}
