//! `cd` builtin command - change directory
//!
//! Passthrough lines run in a child shell, so a `cd` there would be lost.
//! This one changes kcsh's own working directory, which every later child
//! inherits, and keeps `PWD`/`OLDPWD` current.

use std::env;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, Context as _};
use kcsh_core::error::{ShellError, UserInputErrorKind};

use crate::common::{BuiltinContext, BuiltinResult, Flow};
use crate::Builtin;

pub struct CdCommand;

impl Builtin for CdCommand {
    fn name(&self) -> &'static str {
        "cd"
    }

    fn synopsis(&self) -> &'static str {
        "Change the current working directory"
    }

    fn usage(&self) -> &'static str {
        "cd [-L|-P] [DIR | -]"
    }

    fn execute(&self, ctx: &mut BuiltinContext<'_>, args: &[String]) -> BuiltinResult {
        let mut follow_symlinks = true;
        let mut target: Option<&str> = None;

        for arg in args {
            match arg.as_str() {
                "-L" => follow_symlinks = true,
                "-P" => follow_symlinks = false,
                "-" => target = Some("-"),
                opt if opt.starts_with('-') => {
                    return Err(ShellError::user_input(
                        UserInputErrorKind::UnknownSubcommand,
                        format!("invalid option: {opt}"),
                    )
                    .into());
                }
                dir if target.is_none() => target = Some(dir),
                _ => {
                    return Err(ShellError::user_input(
                        UserInputErrorKind::TooManyArguments,
                        "too many arguments",
                    )
                    .into());
                }
            }
        }

        let destination = match target {
            None => env::var("HOME").map_err(|_| anyhow!("HOME not set"))?,
            Some("-") => {
                let previous = env::var("OLDPWD").map_err(|_| anyhow!("OLDPWD not set"))?;
                // bash prints the directory it returns to
                writeln!(ctx.out, "{previous}")?;
                previous
            }
            Some(dir) => resolve_with_cdpath(dir)?,
        };

        let current = env::current_dir().context("cannot determine the current directory")?;
        let path = PathBuf::from(&destination);
        let resolved = if follow_symlinks {
            path.canonicalize().with_context(|| destination.clone())?
        } else {
            resolve_lexically(&current, &path)
        };

        env::set_current_dir(&resolved).with_context(|| destination.clone())?;
        env::set_var("OLDPWD", &current);
        env::set_var("PWD", &resolved);
        kcsh_core::kcsh_log_debug!(cwd = %resolved.display(), "changed directory");
        Ok(Flow::Continue(0))
    }
}

/// Relative names that do not exist here are looked up along `CDPATH`
fn resolve_with_cdpath(target: &str) -> anyhow::Result<String> {
    let path = Path::new(target);
    if path.is_absolute() || target.starts_with("./") || target.starts_with("../") || path.exists() {
        return Ok(target.to_string());
    }
    if let Some(cdpath) = env::var_os("CDPATH") {
        for dir in env::split_paths(&cdpath) {
            let candidate = dir.join(target);
            if candidate.is_dir() {
                return Ok(candidate.to_string_lossy().into_owned());
            }
        }
    }
    Ok(target.to_string())
}

/// Resolve `..` against the textual path instead of the physical one
fn resolve_lexically(base: &Path, path: &Path) -> PathBuf {
    let mut result = if path.is_absolute() {
        PathBuf::new()
    } else {
        base.to_path_buf()
    };
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                result.pop();
            }
            other => result.push(other.as_os_str()),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexical_resolution_does_not_touch_the_filesystem() {
        let base = Path::new("/srv/app/current");
        assert_eq!(resolve_lexically(base, Path::new("../logs")), PathBuf::from("/srv/app/logs"));
        assert_eq!(resolve_lexically(base, Path::new("./x/.")), PathBuf::from("/srv/app/current/x"));
        assert_eq!(resolve_lexically(base, Path::new("/etc/../tmp")), PathBuf::from("/tmp"));
    }

    #[test]
    fn absolute_targets_skip_cdpath() {
        assert_eq!(resolve_with_cdpath("/definitely/not/here").unwrap(), "/definitely/not/here");
    }
}
