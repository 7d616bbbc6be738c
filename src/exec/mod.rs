pub mod shell;

use crate::error::CommandOutcome;
use async_trait::async_trait;
use std::path::Path;

pub use shell::{DEFAULT_OUTPUT_LIMIT, ShellRunner};

/// Captured output of a successful process run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ProcessOutput {
    /// stdout, or stderr when stdout is empty
    pub fn text(&self) -> &str {
        if self.stdout.is_empty() {
            &self.stderr
        } else {
            &self.stdout
        }
    }
}

/// Spawns command lines on behalf of the processor
///
/// A non-zero exit is an error. Dropping the returned future must stop the
/// underlying process.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command_line: &str, cwd: &Path) -> CommandOutcome<ProcessOutput>;
}
