//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use crate::storage::types::{Algorithm, StoreOptions, DEFAULT_KEY_PREFIX, DEFAULT_THRESHOLD};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Compressed store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_threshold")]
    pub threshold: usize,

    #[serde(default)]
    pub algorithm: Algorithm,

    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,

    /// JSON file backing the CLI's store
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Optional byte quota for the backing file
    #[serde(default)]
    pub quota: Option<usize>,
}

fn default_threshold() -> usize {
    DEFAULT_THRESHOLD
}

fn default_key_prefix() -> String {
    DEFAULT_KEY_PREFIX.to_string()
}

fn default_store_path() -> String {
    dirs::data_local_dir()
        .map(|p| p.join("nanostore").join("store.json").to_string_lossy().to_string())
        .unwrap_or_else(|| "./nanostore.json".to_string())
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            algorithm: Algorithm::default(),
            key_prefix: default_key_prefix(),
            path: default_store_path(),
            quota: None,
        }
    }
}

impl StoreConfig {
    /// Options for constructing a `CompressedStore`
    pub fn options(&self) -> StoreOptions {
        StoreOptions::new()
            .threshold(self.threshold)
            .algorithm(self.algorithm)
            .key_prefix(self.key_prefix.clone())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Self::parse(&content).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Config::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("nanostore").join("config.toml")),
            Some(PathBuf::from("./nanostore.toml")),
        ];

        for path_opt in config_paths.iter().flatten() {
            if path_opt.exists() {
                match Self::load_with_env(path_opt) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path_opt);
                        return Ok(config);
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path_opt, e);
                    }
                }
            }
        }

        tracing::debug!("Using default config with environment overrides");
        Self::from_env()
    }

    /// Apply environment variable overrides to an existing config
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|name| std::env::var(name).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(threshold) = lookup("NANOSTORE_THRESHOLD") {
            self.store.threshold = threshold.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "NANOSTORE_THRESHOLD".to_string(),
                error: format!("expected a non-negative integer, got '{}'", threshold),
            })?;
        }
        if let Some(algorithm) = lookup("NANOSTORE_ALGORITHM") {
            self.store.algorithm = algorithm.parse().map_err(|error| ConfigError::InvalidValue {
                key: "NANOSTORE_ALGORITHM".to_string(),
                error,
            })?;
        }
        if let Some(prefix) = lookup("NANOSTORE_KEY_PREFIX") {
            self.store.key_prefix = prefix;
        }
        if let Some(path) = lookup("NANOSTORE_PATH") {
            self.store.path = path;
        }

        if let Some(level) = lookup("NANOSTORE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(format) = lookup("NANOSTORE_LOG_FORMAT") {
            self.logging.format = format;
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {key}: {error}")]
    InvalidValue { key: String, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Nanostore Configuration
#
# Environment variables override these settings:
# - NANOSTORE_THRESHOLD
# - NANOSTORE_ALGORITHM
# - NANOSTORE_KEY_PREFIX
# - NANOSTORE_PATH
# - NANOSTORE_LOG_LEVEL
# - NANOSTORE_LOG_FORMAT

[store]
# Values whose JSON is smaller than this (bytes) are stored uncompressed
threshold = 500

# Compression algorithm: gzip or deflate
algorithm = "gzip"

# Prefix for every key this store manages
key_prefix = "ns:"

# JSON file holding the key-value data
path = "~/.local/share/nanostore/store.json"

# Optional byte quota (keys + values)
# quota = 5242880

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.threshold, 500);
        assert_eq!(config.store.algorithm, Algorithm::Gzip);
        assert_eq!(config.store.key_prefix, "ns:");
        assert_eq!(config.store.quota, None);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_generated_config_parses() {
        let config = Config::parse(&generate_default_config()).unwrap();
        assert_eq!(config.store.threshold, 500);
        assert_eq!(config.store.algorithm, Algorithm::Gzip);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store]\nalgorithm = \"deflate\"\nquota = 1024\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.store.algorithm, Algorithm::Deflate);
        assert_eq!(config.store.quota, Some(1024));
        assert_eq!(config.store.threshold, 500);
        assert_eq!(config.store.key_prefix, "ns:");

        let options = config.store.options().resolve();
        assert_eq!(options.algorithm, Algorithm::Deflate);
    }

    #[test]
    fn test_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[store]\nalgorithm = \"brotli\"\n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { ref path, .. } if path.ends_with("config.toml")));

        let missing = Config::load(&dir.path().join("missing.toml")).unwrap_err();
        assert!(matches!(missing, ConfigError::Io { .. }));
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("NANOSTORE_THRESHOLD", "1024"),
            ("NANOSTORE_ALGORITHM", "DEFLATE"),
            ("NANOSTORE_KEY_PREFIX", "cache:"),
            ("NANOSTORE_LOG_FORMAT", "json"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config
            .apply_overrides(|name| vars.get(name).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store.threshold, 1024);
        assert_eq!(config.store.algorithm, Algorithm::Deflate);
        assert_eq!(config.store.key_prefix, "cache:");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_invalid_override() {
        let mut config = Config::default();
        let err = config
            .apply_overrides(|name| (name == "NANOSTORE_THRESHOLD").then(|| "-1".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "NANOSTORE_THRESHOLD"));
    }
}
