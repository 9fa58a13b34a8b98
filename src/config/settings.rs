/// Listener configuration structures

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::core::constants::{
    DEFAULT_LIQUIDITY_INDEX, DEFAULT_REQUIRED_ACCOUNT_COUNT, DEFAULT_TOKEN_INDEX,
    DEFAULT_WSS_ENDPOINT, PUMP_LIQUIDITY_MIGRATOR,
};

pub const CONFIG_PATH_ENV: &str = "POOLWATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/poolwatch.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse TOML {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid streaming endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("program_address must not be empty")]
    MissingProgramAddress,

    #[error("reconnect_delay_ms must be greater than zero")]
    ZeroReconnectDelay,

    #[error("layout.{field} = {index} is not covered by required_account_count = {required}")]
    IndexOutsideLayout {
        field: &'static str,
        index: usize,
        required: usize,
    },
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    pub wss_endpoint: String,
    /// Program whose logs are subscribed to
    pub program_address: String,
    /// Empty admits every token
    pub token_watchlist: Vec<String>,
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub commitment: Option<String>,
    pub layout: AccountLayout,
    pub logging: LoggingConfig,
}

/// Fixed account-key offsets of the initialize instruction.
///
/// A transaction must carry more than `required_account_count` keys before
/// either index is read.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct AccountLayout {
    pub required_account_count: usize,
    pub token_index: usize,
    pub liquidity_index: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Enables the daily JSON log file when set
    pub log_dir: Option<String>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            wss_endpoint: DEFAULT_WSS_ENDPOINT.to_string(),
            program_address: PUMP_LIQUIDITY_MIGRATOR.to_string(),
            token_watchlist: Vec::new(),
            max_reconnect_attempts: 5,
            reconnect_delay_ms: 5000,
            connect_timeout_ms: 30000,
            heartbeat_interval_ms: 30000,
            commitment: None,
            layout: AccountLayout::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for AccountLayout {
    fn default() -> Self {
        Self {
            required_account_count: DEFAULT_REQUIRED_ACCOUNT_COUNT,
            token_index: DEFAULT_TOKEN_INDEX,
            liquidity_index: DEFAULT_LIQUIDITY_INDEX,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_dir: None,
        }
    }
}

impl ListenerConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolves the config file from `POOLWATCH_CONFIG`, falls back to the
    /// default path, then applies environment overrides and validates.
    ///
    /// A missing default file means built-in defaults; a missing file named
    /// explicitly through the environment is an error.
    pub fn load() -> Result<(Self, Option<PathBuf>), ConfigError> {
        let (mut config, source) = match env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                let path = PathBuf::from(path);
                (Self::load_from_file(&path)?, Some(path))
            }
            Err(_) => {
                let path = PathBuf::from(DEFAULT_CONFIG_PATH);
                if path.exists() {
                    (Self::load_from_file(&path)?, Some(path))
                } else {
                    (Self::default(), None)
                }
            }
        };

        config.apply_env_overrides_from(|key| env::var(key).ok());
        config.normalize();
        config.validate()?;
        Ok((config, source))
    }

    pub fn apply_env_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = lookup("POOLWATCH_WSS_ENDPOINT") {
            self.wss_endpoint = endpoint;
        }
        if let Some(program) = lookup("POOLWATCH_PROGRAM_ADDRESS") {
            self.program_address = program;
        }
        if let Some(watchlist) = lookup("POOLWATCH_WATCHLIST") {
            self.token_watchlist = watchlist.split(',').map(str::to_string).collect();
        }
        if let Some(attempts) = lookup("POOLWATCH_MAX_RECONNECT_ATTEMPTS")
            .and_then(|value| value.trim().parse::<u32>().ok())
        {
            self.max_reconnect_attempts = attempts;
        }
        if let Some(delay_ms) = lookup("POOLWATCH_RECONNECT_DELAY_MS")
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            self.reconnect_delay_ms = delay_ms;
        }
        if let Some(level) = lookup("POOLWATCH_LOG_LEVEL") {
            self.logging.level = level;
        }
    }

    /// Trims addresses and drops blank watchlist entries
    pub fn normalize(&mut self) {
        self.wss_endpoint = self.wss_endpoint.trim().to_string();
        self.program_address = self.program_address.trim().to_string();
        self.token_watchlist = self
            .token_watchlist
            .iter()
            .map(|token| token.trim())
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .collect();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.endpoint_url()?;

        if self.program_address.trim().is_empty() {
            return Err(ConfigError::MissingProgramAddress);
        }
        if self.reconnect_delay_ms == 0 {
            return Err(ConfigError::ZeroReconnectDelay);
        }

        let required = self.layout.required_account_count;
        for (field, index) in [
            ("token_index", self.layout.token_index),
            ("liquidity_index", self.layout.liquidity_index),
        ] {
            if index > required {
                return Err(ConfigError::IndexOutsideLayout {
                    field,
                    index,
                    required,
                });
            }
        }

        Ok(())
    }

    pub fn endpoint_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.wss_endpoint).map_err(|e| ConfigError::InvalidEndpoint {
            url: self.wss_endpoint.clone(),
            reason: e.to_string(),
        })?;

        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(ConfigError::InvalidEndpoint {
                url: self.wss_endpoint.clone(),
                reason: format!("unsupported scheme {:?}", other),
            }),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms)
    }
}
