//! Host shell detection
//!
//! kcsh hands every line it does not understand to a host shell. This
//! module finds that shell and reports the facts startup checks need.

use crate::command::{execute, resolve_program};
use crate::error::{HalError, HalResult};
use std::path::{Path, PathBuf};

/// Fallback when neither configuration nor `$SHELL` name a shell
pub const DEFAULT_SHELL: &str = "/bin/sh";

/// Shell families kcsh knows how to check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellFamily {
    Bash,
    Zsh,
    Posix,
    Other,
}

/// A resolved host shell
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostShell {
    pub path: PathBuf,
    pub family: ShellFamily,
}

impl HostShell {
    /// Resolve `program` (a name or a path) into a host shell
    pub fn resolve(program: &str) -> HalResult<Self> {
        let path = resolve_program(program).ok_or_else(|| {
            HalError::io_error(
                "resolve",
                Some(program),
                std::io::Error::new(std::io::ErrorKind::NotFound, "shell not found"),
            )
        })?;
        let family = family_of(&path);
        Ok(Self { path, family })
    }

    /// Major version of a bash host shell, `None` for other families
    pub fn bash_major_version(&self) -> HalResult<Option<u32>> {
        if self.family != ShellFamily::Bash {
            return Ok(None);
        }
        let result = execute(&self.path, ["-c", "echo \"${BASH_VERSINFO[0]}\""])?;
        if !result.success() {
            return Err(HalError::process_error(
                "version",
                &self.path.display().to_string(),
                Some(result.exit_code),
                result.stderr_lossy().trim(),
            ));
        }
        let text = result.stdout_lossy();
        text.trim()
            .parse::<u32>()
            .map(Some)
            .map_err(|_| HalError::invalid(&format!("unparseable bash version '{}'", text.trim())))
    }
}

/// Classify a shell by its executable name
pub fn family_of(path: &Path) -> ShellFamily {
    match path.file_name().and_then(|n| n.to_str()) {
        Some("bash") => ShellFamily::Bash,
        Some("zsh") => ShellFamily::Zsh,
        Some("sh") | Some("dash") | Some("ash") => ShellFamily::Posix,
        _ => ShellFamily::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_shells() {
        assert_eq!(family_of(Path::new("/usr/local/bin/bash")), ShellFamily::Bash);
        assert_eq!(family_of(Path::new("/bin/zsh")), ShellFamily::Zsh);
        assert_eq!(family_of(Path::new("/bin/sh")), ShellFamily::Posix);
        assert_eq!(family_of(Path::new("/usr/bin/fish")), ShellFamily::Other);
    }

    #[cfg(unix)]
    #[test]
    fn posix_shell_has_no_bash_version() {
        let shell = HostShell::resolve(DEFAULT_SHELL).unwrap();
        if shell.family != ShellFamily::Bash {
            assert_eq!(shell.bash_major_version().unwrap(), None);
        }
    }

    #[test]
    fn unknown_shell_fails_to_resolve() {
        assert!(HostShell::resolve("kcsh-no-such-shell").is_err());
    }
}
