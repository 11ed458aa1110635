//! Configuration module for the scheduler backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Which storage backend serves the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Sqlite,
    Memory,
}

impl StorageKind {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Some(StorageKind::Sqlite),
            "memory" => Some(StorageKind::Memory),
            _ => None,
        }
    }
}

/// Error raised when an environment variable holds an unusable value.
#[derive(Debug)]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value for {}: {:?}", self.var, self.value)
    }
}

impl std::error::Error for ConfigError {}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Pre-shared key for API authentication (required in production)
    pub api_psk: Option<String>,
    /// Path to SQLite database file
    pub db_path: PathBuf,
    /// Path to Tantivy volunteer index directory
    pub index_path: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Storage backend
    pub storage: StorageKind,
    /// Whether two events must share a location to collide
    pub match_location: bool,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let api_psk = env::var("SCHEDULER_API_PSK").ok().filter(|k| !k.is_empty());

        let db_path = env::var("SCHEDULER_DB_PATH")
            .unwrap_or_else(|_| "./data/scheduler.sqlite".to_string())
            .into();

        let index_path = env::var("SCHEDULER_INDEX_PATH")
            .unwrap_or_else(|_| "./data/index".to_string())
            .into();

        let raw_addr =
            env::var("SCHEDULER_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1:8080".to_string());
        let bind_addr = raw_addr.parse().map_err(|_| ConfigError {
            var: "SCHEDULER_BIND_ADDR",
            value: raw_addr.clone(),
        })?;

        let log_level = env::var("SCHEDULER_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let raw_storage = env::var("SCHEDULER_STORAGE").unwrap_or_else(|_| "sqlite".to_string());
        let storage = StorageKind::from_str(&raw_storage).ok_or_else(|| ConfigError {
            var: "SCHEDULER_STORAGE",
            value: raw_storage.clone(),
        })?;

        let match_location = match env::var("SCHEDULER_MATCH_LOCATION") {
            Ok(raw) => parse_flag(&raw).ok_or(ConfigError {
                var: "SCHEDULER_MATCH_LOCATION",
                value: raw,
            })?,
            Err(_) => false,
        };

        Ok(Self {
            api_psk,
            db_path,
            index_path,
            bind_addr,
            log_level,
            storage,
            match_location,
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        env::remove_var("SCHEDULER_API_PSK");
        env::remove_var("SCHEDULER_DB_PATH");
        env::remove_var("SCHEDULER_INDEX_PATH");
        env::remove_var("SCHEDULER_BIND_ADDR");
        env::remove_var("SCHEDULER_LOG_LEVEL");
        env::remove_var("SCHEDULER_STORAGE");
        env::remove_var("SCHEDULER_MATCH_LOCATION");

        let config = Config::from_env().unwrap();

        assert!(config.api_psk.is_none());
        assert_eq!(config.db_path, PathBuf::from("./data/scheduler.sqlite"));
        assert_eq!(config.index_path, PathBuf::from("./data/index"));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.storage, StorageKind::Sqlite);
        assert!(!config.match_location);
    }

    #[test]
    fn test_storage_kind_parsing() {
        assert_eq!(StorageKind::from_str("memory"), Some(StorageKind::Memory));
        assert_eq!(StorageKind::from_str(" SQLite "), Some(StorageKind::Sqlite));
        assert_eq!(StorageKind::from_str("postgres"), None);
    }

    #[test]
    fn test_flag_parsing() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
