use std::collections::HashSet;
use thiserror::Error;
use crate::security::{
    ALLOWED_GIT_SUBCOMMANDS, ALLOWED_NPM_SUBCOMMANDS, DEFAULT_ALLOWED_EXECUTABLES,
    SHELL_OPERATORS,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Git command '{0}' is not allowed")]
    DisallowedGitSubcommand(String),

    #[error("NPM command '{0}' is not allowed")]
    DisallowedNpmSubcommand(String),

    #[error("Command '{0}' is not in allowed commands list")]
    DisallowedExecutable(String),

    #[error("Command contains suspicious operators: {0:?}")]
    SuspiciousOperators(String),

    #[error("Empty command")]
    EmptyCommand,
}

/// Read-only allowlists checked before any process is spawned
#[derive(Debug, Clone)]
pub struct Allowlist {
    git_subcommands: HashSet<String>,
    npm_subcommands: HashSet<String>,
    executables: HashSet<String>,
}

impl Allowlist {
    /// Build an allowlist with the fixed git/npm sets and the given executables
    pub fn new<I, S>(executables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            git_subcommands: ALLOWED_GIT_SUBCOMMANDS.iter().map(|s| s.to_string()).collect(),
            npm_subcommands: ALLOWED_NPM_SUBCOMMANDS.iter().map(|s| s.to_string()).collect(),
            executables: executables
                .into_iter()
                .map(Into::into)
                .filter(|name: &String| !name.trim().is_empty())
                .collect(),
        }
    }

    /// Validate a payload destined for `git <payload>`
    pub fn check_git(&self, payload: &str) -> Result<(), ValidationError> {
        let subcommand = first_token(payload)?;
        if !self.git_subcommands.contains(subcommand) {
            return Err(ValidationError::DisallowedGitSubcommand(subcommand.to_string()));
        }
        check_for_injection(payload)
    }

    /// Validate a payload destined for `npm <payload>`
    pub fn check_npm(&self, payload: &str) -> Result<(), ValidationError> {
        let subcommand = first_token(payload)?;
        if !self.npm_subcommands.contains(subcommand) {
            return Err(ValidationError::DisallowedNpmSubcommand(subcommand.to_string()));
        }
        check_for_injection(payload)
    }

    /// Validate a payload run verbatim as a shell command
    pub fn check_custom(&self, payload: &str) -> Result<(), ValidationError> {
        let executable = first_token(payload)?;
        if !self.executables.contains(executable) {
            return Err(ValidationError::DisallowedExecutable(executable.to_string()));
        }
        check_for_injection(payload)
    }

    pub fn is_executable_allowed(&self, name: &str) -> bool {
        self.executables.contains(name)
    }

    /// Allowed custom executables, sorted
    pub fn executables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.executables.iter().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for Allowlist {
    fn default() -> Self {
        Self::new(DEFAULT_ALLOWED_EXECUTABLES.iter().copied())
    }
}

fn first_token(payload: &str) -> Result<&str, ValidationError> {
    payload
        .split_whitespace()
        .next()
        .ok_or(ValidationError::EmptyCommand)
}

/// Reject shell chaining, redirection and substitution
fn check_for_injection(payload: &str) -> Result<(), ValidationError> {
    for op in SHELL_OPERATORS {
        if payload.contains(op) {
            return Err(ValidationError::SuspiciousOperators(op.to_string()));
        }
    }
    Ok(())
}
