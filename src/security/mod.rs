pub mod validator;

pub use validator::{Allowlist, ValidationError};

/// Git subcommands a remote sender may run
///
/// Adding a new subcommand requires careful security review.
pub const ALLOWED_GIT_SUBCOMMANDS: &[&str] = &[
    // Read operations
    "status",
    "diff",
    "log",
    "branch",
    // Write operations
    "commit",
    // Remote operations
    "pull",
    "push",
];

/// npm subcommands a remote sender may run
pub const ALLOWED_NPM_SUBCOMMANDS: &[&str] = &[
    "install",
    "test",
    "build",
    "start",
    "run",
    "ls",
    "outdated",
];

/// Executables permitted for custom commands when the config names none
///
/// `git` and `npm` are deliberately absent: they have their own gated paths
/// and listing them here would bypass the subcommand allowlists.
pub const DEFAULT_ALLOWED_EXECUTABLES: &[&str] = &["node", "test", "build", "claude"];

/// Shell control sequences never accepted in a payload that reaches a shell
pub const SHELL_OPERATORS: &[&str] = &[";", "|", "&", ">", "<", "$", "`", "\n", "\r"];
