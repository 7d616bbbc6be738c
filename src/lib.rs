pub mod audit;
pub mod auth;
pub mod command;
pub mod config;
pub mod error;
pub mod exec;
pub mod gateway;
pub mod logging;
pub mod messaging;
pub mod processor;
pub mod security;

// Re-export commonly used types for convenience
pub use command::{Command, CommandParser, CommandResult, CommandStatus, CommandType};
pub use error::{AppError, AppResult, CommandError};
pub use gateway::{Gateway, GatewayError, GatewayOptions, GatewayResult, ToolIo};
pub use processor::{CommandProcessor, ProcessorSettings};
