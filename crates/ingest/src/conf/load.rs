//! Load: config loading from file and environment variables.

use std::fs;
use std::path::Path;

use thiserror::Error;

use super::model::ParserConfig;

pub const CONFIG_FILE_ENV: &str = "INGEST_CONFIG_FILE";
pub const DEFAULT_CONFIG_FILE: &str = "/etc/ingest/parser.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {source}")]
    Toml {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl ParserConfig {
    /// Load configuration.
    /// Priority: Environment Variables > Config File > Defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var(CONFIG_FILE_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

        let mut config = if Path::new(&config_path).exists() {
            tracing::info!("Loading configuration from: {}", config_path);
            Self::from_file(&config_path)?
        } else {
            tracing::info!("Config file not found at {}, using defaults", config_path);
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file. Missing keys take their defaults.
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Toml {
            path: path.to_string(),
            source,
        })
    }

    /// Override fields from `INGEST_*` environment variables.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Override fields from `lookup`. Values that do not parse are ignored
    /// with a warning.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_parsed(&lookup, "INGEST_BUFFER_SIZE", &mut self.buffer_size);
        override_parsed(&lookup, "INGEST_BATCH_SIZE", &mut self.batch_size);
        override_parsed(&lookup, "INGEST_WORKER_COUNT", &mut self.worker_count);
        override_parsed(&lookup, "INGEST_MAX_LINE_LENGTH", &mut self.max_line_length);
        override_bool(&lookup, "INGEST_STRICT_MODE", &mut self.strict_mode);
        override_bool(&lookup, "INGEST_ENABLE_GEO", &mut self.enable_geo);
        override_bool(&lookup, "INGEST_ENABLE_UA", &mut self.enable_ua);
        if let Some(layout) = lookup("INGEST_TIME_LAYOUT") {
            self.time_layout = layout;
        }
    }

    /// Check that configuration values are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_line_length == 0 {
            return Err(ConfigError::Invalid("max_line_length must be > 0".to_string()));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid("batch_size must be > 0".to_string()));
        }
        if self.buffer_size == 0 {
            return Err(ConfigError::Invalid("buffer_size must be > 0".to_string()));
        }
        if self.detection_sample_size == 0 {
            return Err(ConfigError::Invalid("detection_sample_size must be > 0".to_string()));
        }
        if !(self.detection_threshold > 0.0 && self.detection_threshold <= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "detection_threshold must be in (0, 1], got {}",
                self.detection_threshold
            )));
        }
        if self.time_layout.trim().is_empty() {
            return Err(ConfigError::Invalid("time_layout must not be empty".to_string()));
        }
        Ok(())
    }
}

fn override_parsed<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => tracing::warn!("Ignoring {}={:?}: not a valid number", key, raw),
        }
    }
}

fn override_bool<F>(lookup: &F, key: &str, slot: &mut bool)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => *slot = true,
            "0" | "false" | "no" | "off" => *slot = false,
            _ => tracing::warn!("Ignoring {}={:?}: not a boolean", key, raw),
        }
    }
}
