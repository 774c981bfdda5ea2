//! Server configuration.
//!
//! The engine itself only consumes [`ServerConfig`] values; reading them from
//! a YAML file or the environment happens here, for the binary.
//!
//! ```yaml
//! server:
//!   listen_address: 0.0.0.0
//!   listen_port: 4221
//!   max_concurrent_connections: 512
//!   idle_timeout: 30      # seconds, fractions allowed
//!   read_timeout: 10
//!   max_header_bytes: 8192
//! static_files: /srv/files
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::http::connection::ConnectionConfig;
use crate::http::parser::ParseLimits;

/// Environment variable overriding the listen address, as `host:port`.
pub const LISTEN_ENV: &str = "WICKET_LISTEN";

/// Smallest accepted `max_header_bytes`; room for a minimal request-line.
const MIN_HEADER_BYTES: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Values the protocol engine reads once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host or IP to bind (default `127.0.0.1`)
    pub listen_address: String,
    /// TCP port to bind; 0 picks a free port (default 4221)
    pub listen_port: u16,
    /// Connections served at once; accepting pauses at the bound (default 512)
    pub max_concurrent_connections: usize,
    /// Keep-alive wait for the next request (default 30s)
    #[serde(with = "seconds")]
    pub idle_timeout: Duration,
    /// Bound on each read once a request has started (default 10s)
    #[serde(with = "seconds")]
    pub read_timeout: Duration,
    /// Longest request-line or header line (default 8 KiB)
    pub max_header_bytes: usize,
    /// Header fields per request (default 100)
    pub max_headers: usize,
    /// Largest accepted request body (default 8 MiB)
    pub max_body_bytes: usize,
    /// Time in-flight connections get to finish after shutdown (default 10s)
    #[serde(with = "seconds")]
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let limits = ParseLimits::default();
        Self {
            listen_address: "127.0.0.1".to_string(),
            listen_port: 4221,
            max_concurrent_connections: 512,
            idle_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            max_header_bytes: limits.max_line_bytes,
            max_headers: limits.max_headers,
            max_body_bytes: limits.max_body_bytes,
            shutdown_grace: Duration::from_secs(10),
        }
    }
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen_address.trim().is_empty() {
            return Err(ConfigError::Invalid("listen_address is empty".into()));
        }
        if self.max_concurrent_connections == 0 {
            return Err(ConfigError::Invalid(
                "max_concurrent_connections must be at least 1".into(),
            ));
        }
        if self.idle_timeout.is_zero() || self.read_timeout.is_zero() {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        if self.max_header_bytes < MIN_HEADER_BYTES {
            return Err(ConfigError::Invalid(format!(
                "max_header_bytes must be at least {MIN_HEADER_BYTES}"
            )));
        }
        if self.max_headers == 0 {
            return Err(ConfigError::Invalid("max_headers must be at least 1".into()));
        }
        Ok(())
    }

    /// `host:port` as written in the configuration, for logging.
    pub fn listen_addr(&self) -> String {
        if self.listen_address.contains(':') {
            format!("[{}]:{}", self.listen_address, self.listen_port)
        } else {
            format!("{}:{}", self.listen_address, self.listen_port)
        }
    }

    pub fn parse_limits(&self) -> ParseLimits {
        ParseLimits {
            max_line_bytes: self.max_header_bytes,
            max_headers: self.max_headers,
            max_body_bytes: self.max_body_bytes,
        }
    }

    pub fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            idle_timeout: self.idle_timeout,
            read_timeout: self.read_timeout,
            limits: self.parse_limits(),
        }
    }

    /// Applies a `host:port` override; an IPv6 host may be bracketed.
    pub fn set_listen(&mut self, listen: &str) -> Result<(), ConfigError> {
        let (host, port) = listen
            .rsplit_once(':')
            .ok_or_else(|| ConfigError::Invalid(format!("listen address {listen:?} has no port")))?;
        let port = port
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("invalid port in {listen:?}")))?;
        self.listen_address = host.trim_start_matches('[').trim_end_matches(']').to_string();
        self.listen_port = port;
        Ok(())
    }
}

/// The binary's configuration document.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    /// Directory served under `/files/`
    pub static_files: Option<PathBuf>,
}

impl Config {
    pub fn from_yaml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_yaml::from_str(source)?;
        config.server.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&source)
    }

    /// Loads the optional file, then applies environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Like [`Config::load`], with an explicit environment lookup.
    pub fn load_with<F>(path: Option<&Path>, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        if let Some(listen) = env(LISTEN_ENV) {
            config.server.set_listen(&listen)?;
        }
        config.server.validate()?;
        Ok(config)
    }
}

/// Durations as (fractional) seconds.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
