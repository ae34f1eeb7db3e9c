use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use thiserror::Error;

use crate::core::delivery_mode::DeliveryMode;
use crate::core::message::{SendOptions, DEFAULT_PRIORITY, MAX_PRIORITY};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreConfig {
    /// Queues declared when a factory is built from this config.
    pub queues: Vec<String>,
    pub dead_letter_queue: Option<String>,
    /// 0 means unlimited.
    pub max_delivery_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerConfig {
    pub default_priority: u8,
    pub default_time_to_live_ms: u64,
    pub persistent: bool,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            default_priority: DEFAULT_PRIORITY,
            default_time_to_live_ms: 0,
            persistent: true,
        }
    }
}

impl ProducerConfig {
    pub fn send_options(&self) -> SendOptions {
        SendOptions {
            priority: self.default_priority,
            delivery_mode: if self.persistent {
                DeliveryMode::Persistent
            } else {
                DeliveryMode::NonPersistent
            },
            time_to_live_ms: self.default_time_to_live_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Config {
    pub store: StoreConfig,
    pub producer: ProducerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileConfig {
    #[serde(default)]
    store: FileStoreConfig,
    #[serde(default)]
    producer: FileProducerConfig,
    #[serde(default)]
    logging: FileLoggingConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileStoreConfig {
    queues: Option<Vec<String>>,
    dead_letter_queue: Option<String>,
    max_delivery_attempts: Option<u32>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileProducerConfig {
    default_priority: Option<u8>,
    default_time_to_live_ms: Option<u64>,
    persistent: Option<bool>,
}

#[derive(Debug, Deserialize, Clone, Default)]
struct FileLoggingConfig {
    filter: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("config parse error: {0}")]
    Parse(String),
}

fn parse_env<T>(key: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| ConfigError::Parse(format!("{key}: {e}")))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::Parse(format!("{key}: not a boolean: {other}"))),
    }
}

impl Config {
    fn load_file<P: AsRef<Path>>(path: P) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path)?;
        let cfg: FileConfig = toml::from_str(&raw)?;
        Ok(cfg)
    }

    /// Parses TOML text, applying defaults but no environment overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let file_cfg: FileConfig = toml::from_str(raw)?;
        Self::resolve(file_cfg, |_| None)
    }

    /// Load configuration from an optional file path and environment variables.
    ///
    /// Precedence: file values provide defaults, environment variables override.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let env_path = env::var("BLIPQ_CONFIG").ok();
        let effective_path = path.map(|s| s.to_string()).or(env_path);

        let file_cfg = if let Some(p) = effective_path {
            Self::load_file(p)?
        } else {
            FileConfig::default()
        };

        Self::resolve(file_cfg, |key| env::var(key).ok())
    }

    fn resolve(
        file_cfg: FileConfig,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        // File defaults.
        let mut queues = file_cfg.store.queues.unwrap_or_default();
        let mut dead_letter_queue = file_cfg.store.dead_letter_queue;
        let mut max_delivery_attempts = file_cfg.store.max_delivery_attempts.unwrap_or(0);
        let mut default_priority = file_cfg.producer.default_priority.unwrap_or(DEFAULT_PRIORITY);
        let mut default_time_to_live_ms = file_cfg.producer.default_time_to_live_ms.unwrap_or(0);
        let mut persistent = file_cfg.producer.persistent.unwrap_or(true);
        let mut filter = file_cfg
            .logging
            .filter
            .unwrap_or_else(|| "info".to_string());

        // Env overrides.
        if let Some(v) = var("BLIPQ_QUEUES") {
            queues = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        if let Some(v) = var("BLIPQ_DEAD_LETTER_QUEUE") {
            let v = v.trim();
            dead_letter_queue = (!v.is_empty()).then(|| v.to_string());
        }

        if let Some(v) = var("BLIPQ_MAX_DELIVERY_ATTEMPTS") {
            max_delivery_attempts = parse_env("BLIPQ_MAX_DELIVERY_ATTEMPTS", &v)?;
        }

        if let Some(v) = var("BLIPQ_DEFAULT_PRIORITY") {
            default_priority = parse_env("BLIPQ_DEFAULT_PRIORITY", &v)?;
        }

        if let Some(v) = var("BLIPQ_DEFAULT_TTL_MS") {
            default_time_to_live_ms = parse_env("BLIPQ_DEFAULT_TTL_MS", &v)?;
        }

        if let Some(v) = var("BLIPQ_PERSISTENT") {
            persistent = parse_bool("BLIPQ_PERSISTENT", &v)?;
        }

        if let Some(v) = var("BLIPQ_LOG") {
            filter = v;
        }

        if default_priority > MAX_PRIORITY {
            return Err(ConfigError::Parse(format!(
                "producer.default_priority: {default_priority} is outside 0..={MAX_PRIORITY}"
            )));
        }

        Ok(Config {
            store: StoreConfig {
                queues,
                dead_letter_queue,
                max_delivery_attempts,
            },
            producer: ProducerConfig {
                default_priority,
                default_time_to_live_ms,
                persistent,
            },
            logging: LoggingConfig { filter },
        })
    }
}

/// Reads `path` as TOML. Environment variables are not consulted.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, anyhow::Error> {
    let file_cfg = Config::load_file(path)?;
    let config = Config::resolve(file_cfg, |_| None)?;
    Ok(config)
}
