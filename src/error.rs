use std::io;
use std::time::Duration;
use thiserror::Error;

// Import module-level errors for AppError
use crate::config::settings::ConfigError;
use crate::gateway::GatewayError;
use crate::messaging::MessagingError;
use crate::security::validator::ValidationError;

/// Errors that can occur while executing a single command
#[derive(Debug, Error)]
pub enum CommandError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Command execution timeout after {}ms", .0.as_millis())]
    Timeout(Duration),

    #[error("Failed to execute '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: io::Error,
    },

    #[error("Command failed: {command} (exit code {code}): {stderr}")]
    ExitStatus {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("Output of '{command}' exceeded {limit} bytes")]
    OutputLimitExceeded { command: String, limit: usize },

    #[error("Failed to get status: {0}")]
    Status(Box<CommandError>),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl CommandError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, CommandError::Timeout(_))
    }
}

/// Top-level application error that wraps all module-specific errors
///
/// All module errors convert to AppError via the `From` trait, so the binary
/// can use `?` across config loading, gateway startup and messaging.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Command error: {0}")]
    Command(#[from] CommandError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Messaging error: {0}")]
    Messaging(#[from] MessagingError),

    #[error("Security validation error: {0}")]
    Security(#[from] ValidationError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for command execution
pub type CommandOutcome<T> = std::result::Result<T, CommandError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
