//! Server configuration.
//!
//! Everything has a default, so an empty file (or no file) is a valid
//! configuration: `127.0.0.1:8000`, one thread per connection, no read
//! timeout.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("can't read config file")]
    Io(#[from] std::io::Error),
    #[error("can't parse config file")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub address: String,
    pub port: u16,

    /// Server name, version and tagline for the `Server` header.
    pub name: String,
    pub version: String,
    pub etc: String,

    /// Size of the worker pool; unset means a thread per connection.
    pub workers: Option<usize>,
    pub read_timeout_secs: Option<u64>,

    /// Default `tracing` filter when `RUST_LOG` is not set.
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            address: "127.0.0.1".to_string(),
            port: 8000,
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            etc: "now in Glorious Extra Color".to_string(),
            workers: None,
            read_timeout_secs: None,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn load(path: &Path) -> Result<ServerConfig, ConfigError> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.address.trim().is_empty() {
            return Err(ConfigError::Invalid("address must not be empty".to_string()));
        }
        if self.workers == Some(0) {
            return Err(ConfigError::Invalid("workers must be at least 1".to_string()));
        }
        if self.read_timeout_secs == Some(0) {
            return Err(ConfigError::Invalid(
                "read_timeout_secs must be at least 1; leave it unset for no timeout".to_string(),
            ));
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.address, self.port)
    }

    pub fn server_info(&self) -> String {
        format!("{} v{} ({})", self.name, self.version, self.etc)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn empty_file_gives_defaults() {
        let file = write_config("");
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config, ServerConfig::default());
        assert_eq!(config.bind_address(), "127.0.0.1:8000");
        assert_eq!(config.read_timeout(), None);
    }

    #[test]
    fn loads_overrides() {
        let file = write_config(
            r#"
            port = 9090
            name = "Yard"
            version = "2.0"
            etc = "test build"
            workers = 4
            read_timeout_secs = 5
            "#,
        );
        let config = ServerConfig::load(file.path()).unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.workers, Some(4));
        assert_eq!(config.read_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.server_info(), "Yard v2.0 (test build)");
    }

    #[test]
    fn zero_workers_is_invalid() {
        let file = write_config("workers = 0");
        assert!(matches!(ServerConfig::load(file.path()), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("prot = 80");
        assert!(matches!(ServerConfig::load(file.path()), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ServerConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
