use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kcsh_core::error::{ClientErrorKind, ShellError, ShellResult};
use kcsh_core::{
    FsChangeSource, KubeClient, RunOutcome, SessionContext, SessionOutcome, SessionReport,
    SessionRunner, SessionSupervisor, Settings,
};
use tokio_util::sync::CancellationToken;

/// Client whose whole configuration is the `current-context:` line of a file.
/// Like kubectl it leaves the file alone when nothing changes.
struct FileClient {
    path: PathBuf,
}

impl FileClient {
    fn create(path: &Path, current: &str) -> Arc<Self> {
        write_current(path, current);
        Arc::new(Self {
            path: path.to_path_buf(),
        })
    }
}

fn write_current(path: &Path, current: &str) {
    std::fs::write(path, format!("current-context: {current}\n")).unwrap();
}

impl KubeClient for FileClient {
    fn current_context(&self) -> ShellResult<String> {
        let text = std::fs::read_to_string(&self.path)?;
        text.lines()
            .find_map(|l| l.strip_prefix("current-context: "))
            .map(str::to_string)
            .ok_or_else(|| ShellError::client(ClientErrorKind::NoActiveContext, "unset"))
    }

    fn enumerate(&self) -> ShellResult<String> {
        Ok(std::fs::read_to_string(&self.path)?)
    }

    fn use_context(&self, name: &str) -> ShellResult<()> {
        if self.current_context().ok().as_deref() != Some(name) {
            write_current(&self.path, name);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Seen {
    generation: u64,
    active: Option<String>,
    watcher_active: bool,
    notices: Vec<String>,
    cancelled: bool,
}

type Script = Box<dyn FnMut(&SessionContext, &CancellationToken) -> SessionOutcome + Send>;

/// Runs one scripted step per session and records what each session saw
struct ScriptedRunner {
    steps: Vec<Script>,
    seen: Arc<Mutex<Vec<Seen>>>,
}

impl SessionRunner for ScriptedRunner {
    fn run_session(
        &mut self,
        mut ctx: SessionContext,
        cancel: CancellationToken,
    ) -> ShellResult<SessionReport> {
        let notices = ctx.notices.drain();
        let outcome = if self.steps.is_empty() {
            SessionOutcome::Exited(0)
        } else {
            let mut step = self.steps.remove(0);
            step(&ctx, &cancel)
        };
        self.seen.lock().unwrap().push(Seen {
            generation: ctx.generation,
            active: ctx.active_context.clone(),
            watcher_active: ctx.watcher_active,
            notices,
            cancelled: outcome == SessionOutcome::Cancelled,
        });
        Ok(SessionReport {
            outcome,
            prompt_enabled: ctx.prompt_enabled,
        })
    }
}

fn wait_for_cancel(cancel: &CancellationToken, limit: Duration) -> SessionOutcome {
    let start = Instant::now();
    while start.elapsed() < limit {
        if cancel.is_cancelled() {
            return SessionOutcome::Cancelled;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    SessionOutcome::Exited(0)
}

fn settings() -> Settings {
    Settings {
        watch_debounce_ms: 20,
        shutdown_grace_ms: 1000,
        ..Settings::default()
    }
}

fn supervisor(
    client: Arc<FileClient>,
    steps: Vec<Script>,
    watch: Vec<PathBuf>,
) -> (SessionSupervisor, Arc<Mutex<Vec<Seen>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let runner = ScriptedRunner {
        steps,
        seen: seen.clone(),
    };
    let settings = settings();
    let source = Arc::new(FsChangeSource::new(watch, settings.debounce()));
    let supervisor =
        SessionSupervisor::new(client, Box::new(runner), settings).with_change_source(source);
    (supervisor, seen)
}

#[tokio::test(flavor = "multi_thread")]
async fn external_edit_restarts_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let client = FileClient::create(&config, "prod");

    let editor_path = config.clone();
    let steps: Vec<Script> = vec![Box::new(move |_, cancel| {
        std::thread::sleep(Duration::from_millis(100));
        write_current(&editor_path, "staging");
        wait_for_cancel(cancel, Duration::from_secs(5))
    })];
    let (mut supervisor, seen) = supervisor(client, steps, vec![config]);

    assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Exited(0));
    assert_eq!(supervisor.restarts(), 1);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].cancelled);
    assert_eq!(seen[0].active.as_deref(), Some("prod"));
    assert_eq!(seen[1].generation, 1);
    assert_eq!(seen[1].active.as_deref(), Some("staging"));
    assert!(seen[1].watcher_active);
    assert!(seen[1].notices.iter().any(|n| n.contains("changed externally")));
}

#[tokio::test(flavor = "multi_thread")]
async fn own_switch_does_not_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let client = FileClient::create(&config, "prod");

    let steps: Vec<Script> = vec![Box::new(|ctx, cancel| {
        assert_eq!(ctx.switch.switch_to("staging").unwrap(), "staging");
        match wait_for_cancel(cancel, Duration::from_millis(500)) {
            SessionOutcome::Cancelled => SessionOutcome::Cancelled,
            SessionOutcome::Exited(_) => SessionOutcome::Exited(7),
        }
    })];
    let (mut supervisor, seen) = supervisor(client, steps, vec![config]);

    assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Exited(7));
    assert_eq!(supervisor.restarts(), 0);
    assert!(!supervisor.flag().is_pending());
    assert_eq!(seen.lock().unwrap().len(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn reselecting_the_active_context_keeps_edits_visible() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let client = FileClient::create(&config, "prod");

    let editor_path = config.clone();
    let steps: Vec<Script> = vec![Box::new(move |ctx, cancel| {
        assert_eq!(ctx.switch.switch_to("prod").unwrap(), "prod");
        std::thread::sleep(Duration::from_millis(100));
        write_current(&editor_path, "staging");
        match wait_for_cancel(cancel, Duration::from_secs(2)) {
            SessionOutcome::Cancelled => SessionOutcome::Cancelled,
            SessionOutcome::Exited(_) => SessionOutcome::Exited(9),
        }
    })];
    let (mut supervisor, seen) = supervisor(client, steps, vec![config]);

    assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Exited(0));
    assert_eq!(supervisor.restarts(), 1);
    let seen = seen.lock().unwrap();
    assert!(seen[0].cancelled);
    assert_eq!(seen[1].active.as_deref(), Some("staging"));
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_request_cancels_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let client = FileClient::create(&config, "prod");

    let steps: Vec<Script> = vec![Box::new(|_, cancel| {
        wait_for_cancel(cancel, Duration::from_secs(5))
    })];
    let (mut supervisor, seen) = supervisor(client, steps, vec![config]);

    let token = supervisor.shutdown_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Shutdown);
    assert_eq!(supervisor.restarts(), 0);
    assert!(seen.lock().unwrap()[0].cancelled);
}

#[tokio::test(flavor = "multi_thread")]
async fn unwatchable_config_degrades_with_a_notice() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let client = FileClient::create(&config, "prod");
    let missing = dir.path().join("absent").join("config");

    let (mut supervisor, seen) = supervisor(client, Vec::new(), vec![missing]);

    assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Exited(0));
    let seen = seen.lock().unwrap();
    assert!(!seen[0].watcher_active);
    assert!(seen[0].notices.iter().any(|n| n.contains("will not be detected")));
}

#[tokio::test(flavor = "multi_thread")]
async fn unwatched_sessions_ignore_edits() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("config");
    let client = FileClient::create(&config, "prod");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let editor_path = config.clone();
    let runner = ScriptedRunner {
        steps: vec![Box::new(move |_, cancel| {
            write_current(&editor_path, "staging");
            match wait_for_cancel(cancel, Duration::from_millis(300)) {
                SessionOutcome::Cancelled => SessionOutcome::Cancelled,
                SessionOutcome::Exited(_) => SessionOutcome::Exited(4),
            }
        })],
        seen: seen.clone(),
    };
    let mut supervisor = SessionSupervisor::new(client, Box::new(runner), settings());

    assert_eq!(supervisor.run().await.unwrap(), RunOutcome::Exited(4));
    assert!(!seen.lock().unwrap()[0].watcher_active);
}
