//! Checks run once before the first session
//!
//! Every failure here is fatal and ends the process with status 1. The
//! remaining startup condition, a missing current context, is detected by
//! the supervisor when it prepares the first session.

use std::path::PathBuf;

use kcsh_hal::{HostShell, ShellFamily};

use crate::config::Settings;
use crate::error::{ShellError, ShellResult, StartupErrorKind};

/// Set in the environment of every command the shell runs
pub const SESSION_ENV: &str = "KCSH_SESSION";

/// Oldest bash able to host a session
pub const MIN_BASH_MAJOR: u32 = 4;

/// What the checks established
#[derive(Debug, Clone)]
pub struct Preflight {
    pub kubectl: PathBuf,
    pub host_shell: HostShell,
}

/// Run all checks. `session_marker` is the inherited value of [`SESSION_ENV`].
pub fn preflight(settings: &Settings, session_marker: Option<&str>) -> ShellResult<Preflight> {
    check_not_nested(session_marker)?;
    let kubectl = check_tool(&settings.kubectl)?;
    let host_shell = check_host_shell(settings.host_shell())?;
    crate::kcsh_log_debug!(
        kubectl = %kubectl.display(),
        shell = %host_shell.path.display(),
        "preflight passed"
    );
    Ok(Preflight { kubectl, host_shell })
}

pub fn check_not_nested(session_marker: Option<&str>) -> ShellResult<()> {
    match session_marker {
        Some(marker) if !marker.is_empty() => Err(ShellError::startup(
            StartupErrorKind::AlreadyRunning,
            "kcsh is already running in this terminal",
        )),
        _ => Ok(()),
    }
}

pub fn check_tool(program: &str) -> ShellResult<PathBuf> {
    kcsh_hal::resolve_program(program).ok_or_else(|| {
        ShellError::startup(
            StartupErrorKind::MissingTool,
            format!("{program} is not installed or not on PATH"),
        )
        .with_context("program", program)
    })
}

pub fn check_host_shell(program: &str) -> ShellResult<HostShell> {
    let shell = HostShell::resolve(program).map_err(|e| {
        ShellError::startup(StartupErrorKind::MissingTool, e.to_string())
            .with_context("program", program)
    })?;
    if shell.family == ShellFamily::Bash {
        let major = shell.bash_major_version().map_err(|e| {
            ShellError::startup(StartupErrorKind::UnsupportedHost, e.to_string())
        })?;
        check_bash_version(major)?;
    }
    Ok(shell)
}

fn check_bash_version(major: Option<u32>) -> ShellResult<()> {
    match major {
        Some(major) if major < MIN_BASH_MAJOR => Err(ShellError::startup(
            StartupErrorKind::UnsupportedHost,
            format!("bash {major} is too old, bash {MIN_BASH_MAJOR} or newer is required"),
        )),
        _ => Ok(()),
    }
}
