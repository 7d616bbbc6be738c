use crate::exec::DEFAULT_OUTPUT_LIMIT;
use crate::gateway::DEFAULT_MAX_IN_FLIGHT;
use crate::security::DEFAULT_ALLOWED_EXECUTABLES;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Config directory not found")]
    DirectoryNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GatewayConfig {
    /// Sender recorded on commands parsed from inbound messages
    pub origin_address: String,
    /// Receives result notifications; falls back to `origin_address`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify_address: Option<String>,
    #[serde(default = "default_project_root")]
    pub project_root: PathBuf,
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    #[serde(default = "default_output_limit_bytes")]
    pub output_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SecurityConfig {
    /// Executables accepted as the first word of a custom command
    #[serde(default = "default_allowed_commands")]
    pub allowed_commands: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AuthConfig {
    pub authorized_addresses: Vec<String>,
    #[serde(default = "default_token_ttl_hours")]
    pub token_ttl_hours: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Audit history file; defaults to `history.log` beside the config
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,
}

fn default_project_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_command_timeout_ms() -> u64 {
    30_000
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_output_limit_bytes() -> usize {
    DEFAULT_OUTPUT_LIMIT
}

fn default_allowed_commands() -> Vec<String> {
    DEFAULT_ALLOWED_EXECUTABLES.iter().map(|s| s.to_string()).collect()
}

fn default_token_ttl_hours() -> u64 {
    24
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            allowed_commands: default_allowed_commands(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            audit_log: None,
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf, ConfigError> {
        let home = std::env::var("HOME")
            .map_err(|_| ConfigError::DirectoryNotFound)?;
        Ok(PathBuf::from(home).join(".config").join("cmdrelay"))
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from the default path
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path()?)
    }

    /// Load and validate configuration from `path`
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::ReadError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("Config file not found: {}", path.display()),
            )));
        }

        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;

        config.validate()?;

        Ok(config)
    }

    /// Save configuration to the default path
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(Self::config_path()?)
    }

    /// Validate, then write to `path` with owner-only permissions
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        self.validate()?;

        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }

        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        // Addresses are sensitive: 600
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(path, perms)?;
        }

        Ok(())
    }

    /// Configuration for a single operator address
    pub fn default_config(origin_address: impl Into<String>) -> Self {
        let origin_address = origin_address.into();
        Config {
            gateway: GatewayConfig {
                origin_address: origin_address.clone(),
                notify_address: None,
                project_root: default_project_root(),
                command_timeout_ms: default_command_timeout_ms(),
                max_in_flight: default_max_in_flight(),
                output_limit_bytes: default_output_limit_bytes(),
            },
            security: SecurityConfig::default(),
            auth: AuthConfig {
                authorized_addresses: vec![origin_address],
                token_ttl_hours: default_token_ttl_hours(),
            },
            logging: LoggingConfig::default(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.gateway.origin_address.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "origin_address must not be empty".to_string(),
            ));
        }

        if self.gateway.command_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "command_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.gateway.max_in_flight == 0 {
            return Err(ConfigError::InvalidValue(
                "max_in_flight must be greater than 0".to_string(),
            ));
        }

        if self.gateway.output_limit_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "output_limit_bytes must be greater than 0".to_string(),
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidValue(format!(
                "Unknown log level: {}. Expected one of {}",
                self.logging.level,
                LOG_LEVELS.join(", ")
            )));
        }

        if self
            .auth
            .authorized_addresses
            .iter()
            .all(|a| a.trim().is_empty())
        {
            return Err(ConfigError::InvalidValue(
                "authorized_addresses must list at least one address".to_string(),
            ));
        }

        Ok(())
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.gateway.command_timeout_ms)
    }

    pub fn notify_address(&self) -> &str {
        self.gateway
            .notify_address
            .as_deref()
            .unwrap_or(&self.gateway.origin_address)
    }

    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.auth.token_ttl_hours as i64)
    }

    /// Audit history path, defaulting to `history.log` in the config directory
    pub fn audit_log_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.logging.audit_log {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::config_dir()?.join("history.log")),
        }
    }
}
