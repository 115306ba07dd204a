//! Command execution and management
//!
//! Thin wrapper over `std::process::Command` that reports failures as
//! [`HalError`]s carrying the program name.

use crate::error::{HalError, HalResult};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::{Command as StdCommand, ExitStatus, Stdio};

/// Command builder and executor
pub struct Command {
    inner: StdCommand,
    program: String,
}

impl Command {
    /// Create a new command with the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_string_lossy().into_owned(),
            inner: StdCommand::new(program),
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.inner.arg(arg);
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.args(args);
        self
    }

    /// Set environment variable for the command
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.inner.env(key, val);
        self
    }

    /// Execute the command with inherited stdio and wait for completion
    pub fn status(&mut self) -> HalResult<ExitStatus> {
        self.inner
            .status()
            .map_err(|e| HalError::io_error("status", Some(&self.program), e))
    }

    /// Execute the command and capture output
    pub fn output(&mut self) -> HalResult<CommandResult> {
        let output = self
            .inner
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HalError::io_error("output", Some(&self.program), e))?;
        Ok(CommandResult::new(
            output.status.code().unwrap_or(-1),
            output.stdout,
            output.stderr,
        ))
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandResult {
    /// Create a new command result
    pub fn new(exit_code: i32, stdout: Vec<u8>, stderr: Vec<u8>) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
        }
    }

    /// Check if the command was successful
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Get stdout as string, replacing invalid UTF-8
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    /// Get stderr as string, replacing invalid UTF-8
    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Execute a command with arguments and capture its output
pub fn execute<P, I, S>(program: P, args: I) -> HalResult<CommandResult>
where
    P: AsRef<OsStr>,
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    Command::new(program).args(args).output()
}

/// Resolve a program name against `PATH`.
///
/// Names containing a path separator are checked as-is.
pub fn resolve_program<S: AsRef<OsStr>>(program: S) -> Option<PathBuf> {
    let program = Path::new(program.as_ref());
    if program.components().count() > 1 {
        return is_executable(program).then(|| program.to_path_buf());
    }

    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate))
}

/// Check if a command exists in PATH
pub fn command_exists<S: AsRef<OsStr>>(command: S) -> bool {
    resolve_program(command).is_some()
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
