pub mod notify;

use crate::audit::AuditLogger;
use crate::command::{Command, CommandResult, CommandStatus, CommandType};
use crate::error::{CommandError, CommandOutcome};
use crate::exec::ProcessRunner;
use crate::messaging::Messenger;
use crate::security::Allowlist;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{error, info, warn};

pub use notify::format_result;

/// Default execution bound for one command
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Where and how long commands run, and who hears about them
#[derive(Debug, Clone)]
pub struct ProcessorSettings {
    pub project_root: PathBuf,
    pub timeout: Duration,
    /// Address that receives result notifications
    pub notify_address: String,
}

impl ProcessorSettings {
    pub fn new(project_root: impl Into<PathBuf>, notify_address: impl Into<String>) -> Self {
        Self {
            project_root: project_root.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
            notify_address: notify_address.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

type DeadlineMap = Mutex<HashMap<String, Instant>>;

/// Removes a command's deadline entry however execution ends
struct DeadlineGuard<'a> {
    deadlines: &'a DeadlineMap,
    id: String,
}

impl<'a> DeadlineGuard<'a> {
    fn register(deadlines: &'a DeadlineMap, id: &str, deadline: Instant) -> Self {
        deadlines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id.to_string(), deadline);
        Self {
            deadlines,
            id: id.to_string(),
        }
    }
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        self.deadlines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&self.id);
    }
}

/// Executes commands against the allowlisted handlers
///
/// `process` may be called concurrently; each call is independent and keyed
/// by its command id.
pub struct CommandProcessor {
    runner: Arc<dyn ProcessRunner>,
    messenger: Arc<dyn Messenger>,
    allowlist: Allowlist,
    settings: ProcessorSettings,
    deadlines: DeadlineMap,
    audit: Option<Arc<AuditLogger>>,
}

impl CommandProcessor {
    pub fn new(
        runner: Arc<dyn ProcessRunner>,
        messenger: Arc<dyn Messenger>,
        allowlist: Allowlist,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            runner,
            messenger,
            allowlist,
            settings,
            deadlines: Mutex::new(HashMap::new()),
            audit: None,
        }
    }

    /// Record every settled command to `audit`
    pub fn with_audit_logger(mut self, audit: Arc<AuditLogger>) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn settings(&self) -> &ProcessorSettings {
        &self.settings
    }

    pub fn allowlist(&self) -> &Allowlist {
        &self.allowlist
    }

    /// Number of commands currently holding a deadline
    pub fn in_flight(&self) -> usize {
        self.deadlines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Whether a deadline is registered for `id`
    pub fn is_tracking(&self, id: &str) -> bool {
        self.deadlines
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains_key(id)
    }

    /// Run a command to a terminal status and deliver its result
    ///
    /// Never fails: every error becomes a failed result. A command that is
    /// not pending is refused and left untouched.
    pub async fn process(&self, command: &mut Command) -> CommandResult {
        info!(
            id = command.id(),
            command_type = %command.command_type(),
            payload = %notify::excerpt(command.payload(), 100),
            "Processing command"
        );

        let dispatched = Instant::now();

        if let Err(e) = command.begin() {
            warn!(id = command.id(), error = %e, "Command already processed");
            return CommandResult::failure(e.to_string(), 0);
        }

        let outcome = {
            let _deadline = DeadlineGuard::register(
                &self.deadlines,
                command.id(),
                dispatched + self.settings.timeout,
            );

            match tokio::time::timeout(
                self.settings.timeout,
                self.execute(command.command_type(), command.payload()),
            )
            .await
            {
                Ok(outcome) => outcome,
                Err(_) => Err(CommandError::Timeout(self.settings.timeout)),
            }
        };

        let duration_ms = dispatched.elapsed().as_millis() as u64;

        let (status, result) = match outcome {
            Ok(output) => {
                info!(id = command.id(), duration_ms, "Command completed");
                (CommandStatus::Completed, CommandResult::success(output, duration_ms))
            }
            Err(e) => {
                let status = if e.is_timeout() {
                    CommandStatus::Timeout
                } else {
                    CommandStatus::Failed
                };
                error!(id = command.id(), error = %e, duration_ms, "Command failed");
                (status, CommandResult::failure(e.to_string(), duration_ms))
            }
        };

        if let Err(e) = command.settle(status, result.clone()) {
            error!(id = command.id(), error = %e, "Could not settle command");
        }

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.log_command(command) {
                warn!(id = command.id(), error = %e, "Failed to write audit log");
            }
        }

        self.deliver(command).await;

        result
    }

    /// Dispatch by type; allowlists are checked before anything is spawned
    async fn execute(&self, command_type: CommandType, payload: &str) -> CommandOutcome<String> {
        match command_type {
            CommandType::Git => {
                self.reject_unless(self.allowlist.check_git(payload), command_type)?;
                self.run_text(&format!("git {}", payload)).await
            }
            CommandType::Npm => {
                self.reject_unless(self.allowlist.check_npm(payload), command_type)?;
                self.run_text(&format!("npm {}", payload)).await
            }
            CommandType::Build => self.run_text("npm run build").await,
            CommandType::Test => self.run_text("npm test").await,
            CommandType::Status => self.project_status().await,
            CommandType::Assistant => Ok(self.acknowledge_assistant(payload)),
            CommandType::Custom => {
                self.reject_unless(self.allowlist.check_custom(payload), command_type)?;
                self.run_text(payload).await
            }
        }
    }

    fn reject_unless(
        &self,
        check: Result<(), crate::security::ValidationError>,
        command_type: CommandType,
    ) -> CommandOutcome<()> {
        check.map_err(|e| {
            warn!(command_type = %command_type, reason = %e, "Command rejected before spawn");
            CommandError::from(e)
        })
    }

    async fn run_text(&self, command_line: &str) -> CommandOutcome<String> {
        let output = self
            .runner
            .run(command_line, &self.settings.project_root)
            .await?;
        Ok(output.text().to_string())
    }

    /// Gather git state and tool versions into one report
    async fn project_status(&self) -> CommandOutcome<String> {
        let root = &self.settings.project_root;

        let (changes, branch, npm, node) = tokio::try_join!(
            self.runner.run("git status --porcelain", root),
            self.runner.run("git branch --show-current", root),
            self.runner.run("npm --version", root),
            self.runner.run("node --version", root),
        )
        .map_err(|e| CommandError::Status(Box::new(e)))?;

        let changes = changes.stdout.trim();
        let changes = if changes.is_empty() { "No changes" } else { changes };

        Ok(format!(
            "🏠 Project Status\n📁 Directory: {}\n🌿 Branch: {}\n📝 Changes: {}\n📦 npm: {}\n🟢 Node: {}",
            root.display(),
            branch.stdout.trim(),
            changes,
            npm.stdout.trim(),
            node.stdout.trim(),
        ))
    }

    fn acknowledge_assistant(&self, payload: &str) -> String {
        info!(payload, "Assistant request received");
        format!(
            "Assistant request received: \"{}\"\nThis would be forwarded to an external assistant for processing.",
            payload
        )
    }

    /// Best-effort notification; failures are only logged
    async fn deliver(&self, command: &Command) {
        let Some(message) = format_result(command) else {
            return;
        };

        if let Err(e) = self
            .messenger
            .send_message(&self.settings.notify_address, &message)
            .await
        {
            error!(id = command.id(), error = %e, "Failed to send command result");
        }
    }
}
