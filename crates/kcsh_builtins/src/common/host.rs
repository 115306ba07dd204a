//! Running lines in the host shell

use std::path::Path;

use kcsh_core::startup::SESSION_ENV;
use kcsh_hal::Command;

/// Run `script` with `<shell> -c`, inheriting the terminal.
///
/// Returns the exit status; a child killed by a signal reports 128 + signal.
pub fn run_in_host(shell: &Path, script: &str) -> anyhow::Result<i32> {
    let status = Command::new(shell)
        .arg("-c")
        .arg(script)
        .env(SESSION_ENV, "1")
        .status()?;
    Ok(exit_code(status))
}

#[cfg(unix)]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn exit_status_is_reported() {
        let sh = Path::new("/bin/sh");
        assert_eq!(run_in_host(sh, "exit 3").unwrap(), 3);
        assert_eq!(run_in_host(sh, "test \"$KCSH_SESSION\" = 1").unwrap(), 0);
    }

    #[test]
    fn signalled_child_maps_to_128_plus_signal() {
        let sh = Path::new("/bin/sh");
        assert_eq!(run_in_host(sh, "kill -TERM $$").unwrap(), 128 + 15);
    }
}
