//! Top-level error type and exit codes
//!
//! Every command either completes or fails with exactly one of these; the
//! binary maps them to distinct exit codes for scripting.

use crate::editor::EditError;
use crate::shell::ShellError;
use crate::store::StoreError;

/// Store missing, malformed or inaccessible
pub const EXIT_CODE_CONFIG_UNREADABLE: i32 = 2;

/// Store could not be written
pub const EXIT_CODE_CONFIG_WRITE_FAILED: i32 = 3;

/// `clear` target is not set on this directory
pub const EXIT_CODE_VARIABLE_NOT_SET: i32 = 4;

/// Already inside an envshell
pub const EXIT_CODE_ALREADY_IN_SHELL: i32 = 5;

/// Bad variable name, unreadable stdin or working directory
pub const EXIT_CODE_INVALID_INPUT: i32 = 6;

/// Shell could not be started or waited on
pub const EXIT_CODE_SHELL_FAILED: i32 = 7;

#[derive(Debug, thiserror::Error)]
pub enum EnvshellError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Edit(#[from] EditError),

    #[error(transparent)]
    Shell(#[from] ShellError),

    #[error("Cannot determine current directory: {0}")]
    CurrentDir(#[source] std::io::Error),

    #[error("Error serializing output: {0}")]
    Output(#[from] serde_json::Error),
}

impl EnvshellError {
    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            EnvshellError::Store(e) | EnvshellError::Edit(EditError::Store(e)) => match e {
                StoreError::NoConfigDir(_) | StoreError::Unreadable { .. } => {
                    EXIT_CODE_CONFIG_UNREADABLE
                }
                StoreError::WriteFailed { .. } => EXIT_CODE_CONFIG_WRITE_FAILED,
            },
            EnvshellError::Edit(EditError::NotSet { .. }) => EXIT_CODE_VARIABLE_NOT_SET,
            EnvshellError::Edit(_) | EnvshellError::CurrentDir(_) | EnvshellError::Output(_) => {
                EXIT_CODE_INVALID_INPUT
            }
            EnvshellError::Shell(ShellError::AlreadyInShell) => EXIT_CODE_ALREADY_IN_SHELL,
            EnvshellError::Shell(_) => EXIT_CODE_SHELL_FAILED,
        }
    }
}
