//! Interactive shell launch
//!
//! The shell inherits the controlling terminal, so keystrokes, output and
//! window resizes flow between the user and the shell directly; envshell
//! never switches the terminal mode and has nothing to restore on exit.
//!
//! The child gets `ENVSHELL=true` so that a nested `envshell` can refuse to
//! start a second layer.

use std::ffi::OsString;
use std::io::{self, Write};
use std::process::{Command, ExitStatus};

use tracing::{debug, warn};

use crate::store::VariableSet;

/// Marker variable exported into the shell
pub const ENVSHELL_MARKER: &str = "ENVSHELL";

/// Marker value meaning "already inside an envshell"
pub const ENVSHELL_MARKER_VALUE: &str = "true";

const ENTER_BANNER: &str = "Entered Envshell, activating environment variables...";
const LEAVE_BANNER: &str = "Leaving Envshell, deactivating environment variables...";

/// Errors from launching the shell
#[derive(Debug, thiserror::Error)]
pub enum ShellError {
    #[error("You are already in an envshell...")]
    AlreadyInShell,

    #[error("Failed to start shell '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("Failed to wait for shell: {0}")]
    Wait(#[source] io::Error),
}

/// Fail when `marker` (the current value of `ENVSHELL`) says we are nested
pub fn check_not_nested(marker: Option<&str>) -> Result<(), ShellError> {
    match marker {
        Some(ENVSHELL_MARKER_VALUE) => Err(ShellError::AlreadyInShell),
        _ => Ok(()),
    }
}

/// Shell program: explicit override, then `$SHELL`, then the platform default
pub fn shell_program(override_program: Option<&str>) -> OsString {
    if let Some(program) = override_program.filter(|p| !p.is_empty()) {
        return OsString::from(program);
    }
    default_shell()
}

#[cfg(not(windows))]
fn default_shell() -> OsString {
    std::env::var_os("SHELL")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| OsString::from("/bin/sh"))
}

#[cfg(windows)]
fn default_shell() -> OsString {
    std::env::var_os("COMSPEC")
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| OsString::from("cmd.exe"))
}

/// A prepared shell launch
#[derive(Debug, Clone)]
pub struct ShellLaunch {
    program: OsString,
    vars: VariableSet,
}

impl ShellLaunch {
    pub fn new(program: OsString, vars: VariableSet) -> Self {
        Self { program, vars }
    }

    pub fn program(&self) -> &OsString {
        &self.program
    }

    /// Build the child command: inherited environment plus the merged
    /// variables plus the nesting marker
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.envs(&self.vars);
        command.env(ENVSHELL_MARKER, ENVSHELL_MARKER_VALUE);
        command
    }

    /// Run the shell to completion and return its exit status.
    ///
    /// The nesting guard is the caller's job (`check_not_nested`), so that
    /// nothing is printed before a refusal.
    pub fn run(&self) -> Result<ExitStatus, ShellError> {
        // The shell handles its own Ctrl-C; envshell just keeps waiting
        if let Err(e) = ctrlc::set_handler(|| {}) {
            warn!(error = %e, "could not install interrupt handler");
        }

        print_banner(ENTER_BANNER);
        debug!(
            program = %self.program.to_string_lossy(),
            variables = self.vars.len(),
            "starting shell"
        );

        let mut child = self.command().spawn().map_err(|source| ShellError::Spawn {
            program: self.program.to_string_lossy().into_owned(),
            source,
        })?;
        let status = child.wait().map_err(ShellError::Wait)?;

        debug!(%status, "shell exited");
        print_banner(LEAVE_BANNER);
        Ok(status)
    }
}

fn print_banner(message: &str) {
    let rule = "*".repeat(message.len() + 4);
    let mut stdout = io::stdout().lock();
    // Banner output is best effort; a closed stdout must not stop the shell
    let _ = writeln!(stdout, "\n{rule}\n* {message} *\n{rule}\n");
    let _ = stdout.flush();
}
