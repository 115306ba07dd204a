//! End-to-end runs of the `kcsh` binary against a scripted `kubectl`

#![cfg(unix)]

use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

const FAKE_KUBECTL: &str = r#"#!/bin/sh
state="$(dirname "$0")/current"
case "$1 $2" in
"config current-context")
    if [ -s "$state" ]; then cat "$state"; else echo "error: current-context is not set" >&2; exit 1; fi ;;
"config view")
    printf 'apiVersion: v1\ncontexts:\n- context:\n    cluster: c1\n  name: prod\n- context:\n    cluster: c2\n  name: staging\ncurrent-context: %s\nkind: Config\n' "$(cat "$state")" ;;
"config use-context")
    case "$3" in
    prod|staging) echo "$3" > "$state"; echo "Switched to context \"$3\"." ;;
    *) echo "error: no context exists with the name: \"$3\"" >&2; exit 1 ;;
    esac ;;
*) exit 1 ;;
esac
"#;

struct Sandbox {
    dir: tempfile::TempDir,
}

impl Sandbox {
    fn new(current: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let kubectl = dir.path().join("kubectl");
        std::fs::write(&kubectl, FAKE_KUBECTL).unwrap();
        std::fs::set_permissions(&kubectl, std::fs::Permissions::from_mode(0o755)).unwrap();
        std::fs::write(dir.path().join("current"), current).unwrap();
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn command(&self, args: &[&str]) -> Command {
        let root: &Path = self.dir.path();
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_kcsh"));
        cmd.args(args)
            .env_remove("KCSH_SESSION")
            .env_remove("KCSH_LOG")
            .env("KCSH_KUBECTL", self.path("kubectl"))
            .env("SHELL", "/bin/sh")
            .env("HOME", root)
            .env("XDG_CONFIG_HOME", root.join("config"))
            .env("XDG_DATA_HOME", root.join("data"))
            .env("KUBECONFIG", self.path("current"))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }

    fn run(&self, args: &[&str], input: &str) -> Output {
        let mut child = self.command(args).spawn().unwrap();
        child
            .stdin
            .take()
            .unwrap()
            .write_all(input.as_bytes())
            .unwrap();
        child.wait_with_output().unwrap()
    }
}

fn text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[test]
fn help_flag_exits_zero() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox.run(&["-h"], "");
    assert!(output.status.success());
    assert!(text(&output.stdout).contains("--no-watch"));
}

#[test]
fn unknown_flag_fails() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox.run(&["--frobnicate"], "");
    assert!(!output.status.success());
}

#[test]
fn nested_start_is_refused() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox
        .command(&["-i"])
        .env("KCSH_SESSION", "1")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("already running"));
}

#[test]
fn missing_client_is_fatal() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox
        .command(&["-i"])
        .env("KCSH_KUBECTL", sandbox.path("no-such-kubectl"))
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(text(&output.stderr).contains("not installed"));
}

#[test]
fn unset_current_context_is_fatal() {
    let sandbox = Sandbox::new("");
    let output = sandbox.run(&["-i"], "exit 0\n");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn piped_session_switches_and_exits_with_status() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox.run(&["-i"], "context stag\ncontext\necho from-host\nexit 3\n");

    assert_eq!(output.status.code(), Some(3));
    let stdout = text(&output.stdout);
    assert!(stdout.contains("Switched to context \"staging\"."));
    assert!(stdout.lines().any(|l| l == "staging"));
    assert!(stdout.contains("from-host"));
    let current = std::fs::read_to_string(sandbox.path("current")).unwrap();
    assert_eq!(current.trim(), "staging");
}

#[test]
fn end_of_input_exits_with_the_last_status() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox.run(&["-i"], "context nope\n");
    assert_eq!(output.status.code(), Some(1));
    let current = std::fs::read_to_string(sandbox.path("current")).unwrap();
    assert_eq!(current.trim(), "prod");
}

#[test]
fn host_commands_see_the_session_marker() {
    let sandbox = Sandbox::new("prod");
    let output = sandbox.run(&["-i"], "echo \"marker=$KCSH_SESSION\"\n");
    assert!(output.status.success());
    assert!(text(&output.stdout).contains("marker=1"));
}
