use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Errors raised when a command is driven through an illegal status change
#[derive(Debug, Error, PartialEq)]
pub enum TransitionError {
    #[error("Command {id} cannot start from status {from}")]
    NotPending { id: String, from: CommandStatus },

    #[error("Command {id} cannot settle from status {from}")]
    NotRunning { id: String, from: CommandStatus },

    #[error("Status {0} is not terminal")]
    NotTerminal(CommandStatus),
}

/// Error returned when a textual command type has no mapping
#[derive(Debug, Error, PartialEq)]
#[error("Unknown command type: {0}")]
pub struct UnknownCommandType(pub String);

/// Kind of work a command performs; decides the dispatch path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandType {
    Git,
    Npm,
    Build,
    Test,
    Status,
    Assistant,
    Custom,
}

impl CommandType {
    /// Wire name used in messages and tool arguments
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandType::Git => "git",
            CommandType::Npm => "npm",
            CommandType::Build => "build",
            CommandType::Test => "test",
            CommandType::Status => "status",
            CommandType::Assistant => "claude",
            CommandType::Custom => "custom",
        }
    }

    /// Every type, in the order tool schemas list them
    pub fn all() -> [CommandType; 7] {
        [
            CommandType::Git,
            CommandType::Npm,
            CommandType::Build,
            CommandType::Test,
            CommandType::Status,
            CommandType::Assistant,
            CommandType::Custom,
        ]
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandType {
    type Err = UnknownCommandType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "git" => Ok(CommandType::Git),
            "npm" => Ok(CommandType::Npm),
            "build" => Ok(CommandType::Build),
            "test" => Ok(CommandType::Test),
            "status" => Ok(CommandType::Status),
            "claude" | "assistant" => Ok(CommandType::Assistant),
            "custom" => Ok(CommandType::Custom),
            _ => Err(UnknownCommandType(s.to_string())),
        }
    }
}

/// Lifecycle of a command: Pending -> Running -> one terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Timeout,
}

impl CommandStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CommandStatus::Completed | CommandStatus::Failed | CommandStatus::Timeout
        )
    }
}

impl fmt::Display for CommandStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandStatus::Pending => "pending",
            CommandStatus::Running => "running",
            CommandStatus::Completed => "completed",
            CommandStatus::Failed => "failed",
            CommandStatus::Timeout => "timeout",
        };
        f.write_str(name)
    }
}

/// Outcome of one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandResult {
    pub success: bool,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall-clock milliseconds from dispatch to settle
    pub duration_ms: u64,
    pub exit_code: i32,
}

impl CommandResult {
    pub fn success(output: String, duration_ms: u64) -> Self {
        Self {
            success: true,
            output,
            error: None,
            duration_ms,
            exit_code: 0,
        }
    }

    pub fn failure(error: String, duration_ms: u64) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error),
            duration_ms,
            exit_code: 1,
        }
    }
}

/// A unit of requested work
///
/// Status and result are only reachable through [`Command::begin`] and
/// [`Command::settle`], so a result exists exactly when the status is terminal
/// and status never moves backwards.
#[derive(Debug, Clone, Serialize)]
pub struct Command {
    id: String,
    #[serde(rename = "type")]
    command_type: CommandType,
    payload: String,
    timestamp: DateTime<Utc>,
    sender: String,
    status: CommandStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<CommandResult>,
}

impl Command {
    /// Create a pending command with an id of the form `<prefix>_<uuid>`
    pub fn new(
        prefix: &str,
        command_type: CommandType,
        payload: impl Into<String>,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            id: format!("{}_{}", prefix, Uuid::new_v4().simple()),
            command_type,
            payload: payload.into(),
            timestamp: Utc::now(),
            sender: sender.into(),
            status: CommandStatus::Pending,
            result: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn status(&self) -> CommandStatus {
        self.status
    }

    pub fn result(&self) -> Option<&CommandResult> {
        self.result.as_ref()
    }

    /// Move from Pending to Running
    pub fn begin(&mut self) -> Result<(), TransitionError> {
        if self.status != CommandStatus::Pending {
            return Err(TransitionError::NotPending {
                id: self.id.clone(),
                from: self.status,
            });
        }
        self.status = CommandStatus::Running;
        Ok(())
    }

    /// Move from Running to a terminal status and attach the result
    pub fn settle(
        &mut self,
        status: CommandStatus,
        result: CommandResult,
    ) -> Result<(), TransitionError> {
        if !status.is_terminal() {
            return Err(TransitionError::NotTerminal(status));
        }
        if self.status != CommandStatus::Running {
            return Err(TransitionError::NotRunning {
                id: self.id.clone(),
                from: self.status,
            });
        }
        self.status = status;
        self.result = Some(result);
        Ok(())
    }
}
