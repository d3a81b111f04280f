//! Runtime configuration for the indexing tool.
//!
//! # Responsibility
//! - Deserialize `AppConfig` from a JSON file or fall back to built-in
//!   defaults.
//! - Resolve named search-engine connections.
//!
//! # Invariants
//! - A loaded configuration always has `populate_batch_size > 0`.
//! - `log_dir`, when present, is absolute.

use crate::lifecycle::DEFAULT_BATCH_SIZE;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "CRMSEARCH_CONFIG";
pub const DEFAULT_CONNECTION: &str = "default";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config `{path}`: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config `{path}`: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("unknown connection `{0}`")]
    UnknownConnection(String),
}

/// A search-engine connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Path of the engine's SQLite file.
    pub engine: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Path of the relational SQLite database.
    pub database: PathBuf,
    pub connections: BTreeMap<String, ConnectionConfig>,
    pub log_level: Option<String>,
    pub log_dir: Option<PathBuf>,
    pub populate_batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let mut connections = BTreeMap::new();
        connections.insert(
            DEFAULT_CONNECTION.to_string(),
            ConnectionConfig {
                engine: PathBuf::from("crmsearch-engine.sqlite3"),
            },
        );
        Self {
            database: PathBuf::from("crmsearch.sqlite3"),
            connections,
            log_level: None,
            log_dir: None,
            populate_batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

impl AppConfig {
    /// Loads `explicit`, else the file named by `CRMSEARCH_CONFIG`, else the
    /// defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::from_file(Path::new(&path)),
            _ => Ok(Self::default()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.populate_batch_size == 0 {
            return Err(ConfigError::Invalid(
                "populate_batch_size must be greater than zero".to_string(),
            ));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn connection(&self, name: &str) -> Result<&ConnectionConfig, ConfigError> {
        self.connections
            .get(name)
            .ok_or_else(|| ConfigError::UnknownConnection(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError, DEFAULT_CONNECTION};
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn write_config(dir: &Path, body: &str) -> PathBuf {
        let path = dir.join("crmsearch.json");
        let mut file = std::fs::File::create(&path).expect("create config");
        file.write_all(body.as_bytes()).expect("write config");
        path
    }

    #[test]
    fn defaults_have_a_default_connection() {
        let config = AppConfig::default();
        assert_eq!(config.populate_batch_size, 500);
        assert!(config.connection(DEFAULT_CONNECTION).is_ok());
        assert!(matches!(
            config.connection("replica"),
            Err(ConfigError::UnknownConnection(name)) if name == "replica"
        ));
    }

    #[test]
    fn partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_config(
            dir.path(),
            r#"{"database": "/srv/crm.sqlite3", "connections": {"archive": {"engine": "/srv/archive.sqlite3"}}}"#,
        );

        let config = AppConfig::from_file(&path).expect("load config");
        assert_eq!(config.database, PathBuf::from("/srv/crm.sqlite3"));
        assert_eq!(config.populate_batch_size, 500);
        assert!(config.connection("archive").is_ok());
        assert!(config.connection(DEFAULT_CONNECTION).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zero_batch = write_config(dir.path(), r#"{"populate_batch_size": 0}"#);
        assert!(matches!(
            AppConfig::from_file(&zero_batch),
            Err(ConfigError::Invalid(_))
        ));

        let relative_logs = write_config(dir.path(), r#"{"log_dir": "logs"}"#);
        assert!(matches!(
            AppConfig::from_file(&relative_logs),
            Err(ConfigError::Invalid(_))
        ));

        let unknown_key = write_config(dir.path(), r#"{"batch": 10}"#);
        assert!(matches!(
            AppConfig::from_file(&unknown_key),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_path_wins_and_missing_file_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let missing = dir.path().join("absent.json");
        assert!(matches!(
            AppConfig::load(Some(&missing)),
            Err(ConfigError::Read { .. })
        ));
    }
}
