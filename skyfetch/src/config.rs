//! Client configuration.
//!
//! [`ClientConfig`] is a plain struct with defaults and `with_*` builders.
//! It can be loaded from and saved to an INI file:
//!
//! ```ini
//! [cache]
//! directory = ~/.cache/skyfetch
//! persistent = true
//! memory_size = 268435456
//! sweep_interval_secs = 60
//! body_hash = sha256
//!
//! [retry]
//! max_retries = 2
//! delay_ms = 3000
//!
//! [http]
//! timeout_secs = 30
//! user_agent = skyfetch/0.1.0
//! ```
//!
//! Missing sections and keys keep their defaults; unknown keys are ignored.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;
use thiserror::Error;

use crate::cache::providers::DEFAULT_MEMORY_CACHE_BYTES;
use crate::cache::{BodyHasher, DEFAULT_SWEEP_INTERVAL_SECS};
use crate::http::DEFAULT_TIMEOUT_SECS;
use crate::retry::RetryPolicy;

/// Name of the application directory under the platform config/cache dirs.
pub const APP_DIR_NAME: &str = "skyfetch";

/// Default user agent sent with every request.
pub const DEFAULT_USER_AGENT: &str = concat!("skyfetch/", env!("CARGO_PKG_VERSION"));

/// Errors loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid value for {section}.{key}: '{value}' ({reason})")]
    InvalidValue {
        section: &'static str,
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Path of the user's config file (`<config dir>/skyfetch/config.ini`).
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join("config.ini")
}

/// Default persistent cache directory (`<cache dir>/skyfetch`).
pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join(APP_DIR_NAME)
}

/// Settings for a [`Client`](crate::Client).
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    /// Directory of the persistent cache.
    pub cache_dir: PathBuf,
    /// Whether to probe and use the persistent cache.
    pub persistent_cache: bool,
    /// Size bound of the ephemeral cache, in bytes.
    pub memory_cache_bytes: u64,
    /// Interval between expiry sweeps.
    pub sweep_interval: Duration,
    /// Default retry policy; per-call retry counts override it.
    pub retry: RetryPolicy,
    /// Transport timeout for a single attempt.
    pub http_timeout: Duration,
    pub user_agent: String,
    /// Hash used for POST cache keys.
    pub body_hasher: BodyHasher,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            persistent_cache: true,
            memory_cache_bytes: DEFAULT_MEMORY_CACHE_BYTES,
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
            retry: RetryPolicy::default(),
            http_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            body_hasher: BodyHasher::default(),
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = dir.into();
        self
    }

    pub fn with_persistent_cache(mut self, enabled: bool) -> Self {
        self.persistent_cache = enabled;
        self
    }

    pub fn with_memory_cache_bytes(mut self, bytes: u64) -> Self {
        self.memory_cache_bytes = bytes;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_body_hasher(mut self, hasher: BodyHasher) -> Self {
        self.body_hasher = hasher;
        self
    }

    /// Loads the user's config file, or defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads settings from an INI file on top of the defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_file(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    /// Parses settings from INI text on top of the defaults.
    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read {
            path: PathBuf::from("<string>"),
            message: e.to_string(),
        })?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(cache) = ini.section(Some("cache")) {
            if let Some(dir) = cache.get("directory") {
                config.cache_dir = expand_tilde(dir.trim());
            }
            if let Some(v) = cache.get("persistent") {
                config.persistent_cache = parse_bool("cache", "persistent", v)?;
            }
            if let Some(v) = cache.get("memory_size") {
                config.memory_cache_bytes = parse_value("cache", "memory_size", v)?;
            }
            if let Some(v) = cache.get("sweep_interval_secs") {
                let secs: u64 = parse_value("cache", "sweep_interval_secs", v)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        section: "cache",
                        key: "sweep_interval_secs",
                        value: v.to_string(),
                        reason: "must be at least 1".to_string(),
                    });
                }
                config.sweep_interval = Duration::from_secs(secs);
            }
            if let Some(v) = cache.get("body_hash") {
                config.body_hasher = parse_value("cache", "body_hash", v)?;
            }
        }

        if let Some(retry) = ini.section(Some("retry")) {
            if let Some(v) = retry.get("max_retries") {
                config.retry.max_retries = parse_value("retry", "max_retries", v)?;
            }
            if let Some(v) = retry.get("delay_ms") {
                config.retry.delay = Duration::from_millis(parse_value("retry", "delay_ms", v)?);
            }
        }

        if let Some(http) = ini.section(Some("http")) {
            if let Some(v) = http.get("timeout_secs") {
                config.http_timeout = Duration::from_secs(parse_value("http", "timeout_secs", v)?);
            }
            if let Some(v) = http.get("user_agent") {
                config.user_agent = v.trim().to_string();
            }
        }

        Ok(config)
    }

    /// Renders these settings as an INI document.
    pub fn to_ini(&self) -> Ini {
        let mut ini = Ini::new();
        ini.with_section(Some("cache"))
            .set("directory", self.cache_dir.display().to_string())
            .set("persistent", self.persistent_cache.to_string())
            .set("memory_size", self.memory_cache_bytes.to_string())
            .set("sweep_interval_secs", self.sweep_interval.as_secs().to_string())
            .set("body_hash", self.body_hasher.as_str());
        ini.with_section(Some("retry"))
            .set("max_retries", self.retry.max_retries.to_string())
            .set("delay_ms", (self.retry.delay.as_millis() as u64).to_string());
        ini.with_section(Some("http"))
            .set("timeout_secs", self.http_timeout.as_secs().to_string())
            .set("user_agent", self.user_agent.as_str());
        ini
    }

    /// Writes these settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        self.to_ini().write_to_file(path).map_err(write_error)
    }
}

fn parse_value<T>(section: &'static str, key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        section,
        key,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(section: &'static str, key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            section,
            key,
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
