//! # Service Configuration
//!
//! [`AppConfig`] is built from environment variables over built-in
//! defaults, optionally seeded from a YAML file named by
//! `INTENTFORGE_CONFIG`. Environment values win over file values.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `HOST` | `0.0.0.0` |
//! | `PORT` | `8080` |
//! | `ENVIRONMENT` | `development` |
//! | `LOG_LEVEL` | `info` |
//! | `LOG_FORMAT` | `text` (`json` for structured output) |
//! | `CORS_ORIGINS` | empty, comma-separated |
//! | `DEFAULT_CURRENCY` | `INR` |
//! | `AUDIT_CAPACITY` | `10000` |
//! | `HISTORY_CAPACITY` | `10000` |
//! | `CLAWBACK_CAPACITY` | `10000` |
//! | `LATENCY_BUDGET_MS` | `100` |

use std::path::{Path, PathBuf};
use std::str::FromStr;

use intentforge_ledger::{
    LedgerConfig, DEFAULT_AUDIT_CAPACITY, DEFAULT_CLAWBACK_CAPACITY, DEFAULT_CURRENCY,
    DEFAULT_HISTORY_CAPACITY,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming an optional YAML config file.
pub const CONFIG_FILE_VAR: &str = "INTENTFORGE_CONFIG";

/// Configuration failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// File named by `INTENTFORGE_CONFIG`.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid YAML for [`FileConfig`].
    #[error("failed to parse config file {path}: {source}")]
    Yaml {
        /// File named by `INTENTFORGE_CONFIG`.
        path: PathBuf,
        /// Underlying parse error.
        #[source]
        source: serde_yaml::Error,
    },

    /// A value could not be parsed into its field's type.
    #[error("invalid value {value:?} for {field}: {reason}")]
    ParseField {
        /// Variable or key name.
        field: String,
        /// The raw value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected \"text\" or \"json\", got {other:?}")),
        }
    }
}

/// Optional file-level configuration. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub environment: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub cors_origins: Option<Vec<String>>,
    pub default_currency: Option<String>,
    pub audit_capacity: Option<usize>,
    pub history_capacity: Option<usize>,
    pub clawback_capacity: Option<usize>,
    pub latency_budget_ms: Option<f64>,
}

impl FileConfig {
    /// Read and parse a YAML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Interface to bind.
    pub host: String,
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Deployment environment label.
    pub environment: String,
    /// Fallback tracing filter when `RUST_LOG` is unset.
    pub log_level: String,
    /// Log output format.
    pub log_format: LogFormat,
    /// Allowed CORS origins. Empty disables the CORS layer.
    pub cors_origins: Vec<String>,
    /// Currency of wallets created without one.
    pub default_currency: String,
    /// Audit records retained in memory.
    pub audit_capacity: usize,
    /// Transactions retained in memory.
    pub history_capacity: usize,
    /// Clawback records retained in memory.
    pub clawback_capacity: usize,
    /// Validations slower than this log a warning.
    pub latency_budget_ms: f64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            environment: "development".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            cors_origins: Vec::new(),
            default_currency: DEFAULT_CURRENCY.to_string(),
            audit_capacity: DEFAULT_AUDIT_CAPACITY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            clawback_capacity: DEFAULT_CLAWBACK_CAPACITY,
            latency_budget_ms: 100.0,
        }
    }
}

impl AppConfig {
    /// Load from the process environment, reading `INTENTFORGE_CONFIG` first
    /// when set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let file = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) if !path.trim().is_empty() => Some(FileConfig::load(Path::new(path.trim()))?),
            _ => None,
        };
        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Layer `lookup` over `file` over the defaults.
    pub fn resolve(
        file: Option<FileConfig>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(file) = file {
            config.apply_file(file);
        }

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = parse_var(&lookup, "PORT")? {
            config.port = port;
        }
        if let Some(environment) = lookup("ENVIRONMENT") {
            config.environment = environment;
        }
        if let Some(level) = lookup("LOG_LEVEL") {
            config.log_level = level;
        }
        if let Some(format) = parse_var(&lookup, "LOG_FORMAT")? {
            config.log_format = format;
        }
        if let Some(origins) = lookup("CORS_ORIGINS") {
            config.cors_origins = split_origins(&origins);
        }
        if let Some(currency) = lookup("DEFAULT_CURRENCY") {
            config.default_currency = currency;
        }
        if let Some(capacity) = parse_var(&lookup, "AUDIT_CAPACITY")? {
            config.audit_capacity = capacity;
        }
        if let Some(capacity) = parse_var(&lookup, "HISTORY_CAPACITY")? {
            config.history_capacity = capacity;
        }
        if let Some(capacity) = parse_var(&lookup, "CLAWBACK_CAPACITY")? {
            config.clawback_capacity = capacity;
        }
        if let Some(budget) = parse_var(&lookup, "LATENCY_BUDGET_MS")? {
            config.latency_budget_ms = budget;
        }

        config.check()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: FileConfig) {
        let FileConfig {
            host,
            port,
            environment,
            log_level,
            log_format,
            cors_origins,
            default_currency,
            audit_capacity,
            history_capacity,
            clawback_capacity,
            latency_budget_ms,
        } = file;
        self.host = host.unwrap_or_else(|| self.host.clone());
        self.port = port.unwrap_or(self.port);
        self.environment = environment.unwrap_or_else(|| self.environment.clone());
        self.log_level = log_level.unwrap_or_else(|| self.log_level.clone());
        self.log_format = log_format.unwrap_or(self.log_format);
        self.cors_origins = cors_origins.unwrap_or_else(|| self.cors_origins.clone());
        self.default_currency = default_currency.unwrap_or_else(|| self.default_currency.clone());
        self.audit_capacity = audit_capacity.unwrap_or(self.audit_capacity);
        self.history_capacity = history_capacity.unwrap_or(self.history_capacity);
        self.clawback_capacity = clawback_capacity.unwrap_or(self.clawback_capacity);
        self.latency_budget_ms = latency_budget_ms.unwrap_or(self.latency_budget_ms);
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.default_currency.trim().is_empty() {
            return Err(ConfigError::ParseField {
                field: "DEFAULT_CURRENCY".to_string(),
                value: self.default_currency.clone(),
                reason: "must not be empty".to_string(),
            });
        }
        for (field, capacity) in [
            ("AUDIT_CAPACITY", self.audit_capacity),
            ("HISTORY_CAPACITY", self.history_capacity),
            ("CLAWBACK_CAPACITY", self.clawback_capacity),
        ] {
            if capacity == 0 {
                return Err(ConfigError::ParseField {
                    field: field.to_string(),
                    value: "0".to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        if !self.latency_budget_ms.is_finite() || self.latency_budget_ms <= 0.0 {
            return Err(ConfigError::ParseField {
                field: "LATENCY_BUDGET_MS".to_string(),
                value: self.latency_budget_ms.to_string(),
                reason: "must be a positive number".to_string(),
            });
        }
        Ok(())
    }

    /// `host:port` for the listener.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Ledger construction parameters.
    pub fn ledger_config(&self) -> LedgerConfig {
        LedgerConfig {
            default_currency: self.default_currency.clone(),
            audit_capacity: self.audit_capacity,
            history_capacity: self.history_capacity,
            clawback_capacity: self.clawback_capacity,
            latency_budget_ms: self.latency_budget_ms,
        }
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::ParseField {
                field: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
