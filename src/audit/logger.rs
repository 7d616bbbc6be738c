use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use chrono::Utc;
use crate::command::Command;

const MAX_LOG_SIZE: u64 = 10 * 1024 * 1024; // 10MB

/// Append-only history of executed commands and rejected messages
#[derive(Debug)]
pub struct AuditLogger {
    log_path: PathBuf,
}

impl AuditLogger {
    /// Create a new AuditLogger with the default log path
    pub fn new() -> std::io::Result<Self> {
        Self::with_path(Self::default_log_path()?)
    }

    /// Create an AuditLogger with a custom log path
    pub fn with_path<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let log_path = path.as_ref().to_path_buf();

        // Ensure directory exists
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }

        Ok(Self { log_path })
    }

    /// Get the default log path: ~/.config/cmdrelay/history.log
    fn default_log_path() -> std::io::Result<PathBuf> {
        let home = std::env::var("HOME")
            .map_err(|_| std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "HOME environment variable not set"
            ))?;

        Ok(PathBuf::from(home)
            .join(".config")
            .join("cmdrelay")
            .join("history.log"))
    }

    /// Log a settled command
    pub fn log_command(&self, command: &Command) -> std::io::Result<()> {
        let (duration_ms, exit_code) = command
            .result()
            .map(|r| (r.duration_ms, r.exit_code))
            .unwrap_or((0, -1));

        let log_entry = format!(
            "[{}] [{}] [{}] [{}] [{}] [exit:{}] [{}ms] {}\n",
            Utc::now().to_rfc3339(),
            command.id(),
            command.sender(),
            command.command_type(),
            command.status(),
            exit_code,
            duration_ms,
            single_line(command.payload()),
        );

        self.append(&log_entry)
    }

    /// Log an inbound message that was refused before parsing
    ///
    /// Only the sender and the reason are recorded; message bodies may carry
    /// tokens.
    pub fn log_rejection(&self, sender: &str, reason: &str) -> std::io::Result<()> {
        let log_entry = format!(
            "[{}] [{}] [REJECTED] reason=\"{}\"\n",
            Utc::now().to_rfc3339(),
            sender,
            single_line(reason),
        );

        self.append(&log_entry)
    }

    fn append(&self, entry: &str) -> std::io::Result<()> {
        // Check and rotate log if needed
        self.rotate_if_needed()?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;

        file.write_all(entry.as_bytes())?;
        file.flush()?;

        Ok(())
    }

    /// Rotate log file if it exceeds MAX_LOG_SIZE
    fn rotate_if_needed(&self) -> std::io::Result<()> {
        if !self.log_path.exists() {
            return Ok(());
        }

        let metadata = fs::metadata(&self.log_path)?;
        if metadata.len() > MAX_LOG_SIZE {
            // Rotate: history.log -> history.log.1
            let backup_path = self.log_path.with_extension("log.1");
            fs::rename(&self.log_path, backup_path)?;
        }

        Ok(())
    }

    /// Get the path to the log file
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }
}

fn single_line(text: &str) -> String {
    text.replace(['\n', '\r'], " ")
}
