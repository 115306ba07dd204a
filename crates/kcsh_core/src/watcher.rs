//! Configuration change detection
//!
//! The watcher observes the client's configuration files while a session
//! runs. Every change is classified once: a change caused by our own switch
//! consumes the [`SelfChangeFlag`] and is dropped, anything else asks the
//! supervisor for a restart. After a restart has been requested, further
//! changes are suppressed; the supervisor tears the watcher down with the
//! session and arms a fresh one for the next session.
//!
//! Classification is a pure state machine ([`WatchClassifier`]) so that it
//! can be tested without touching the filesystem; [`FsChangeSource`] feeds it
//! from real file events.

use std::path::PathBuf;
use std::time::Duration;

use kcsh_hal::{FileEvent, FileWatch};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::{ShellError, ShellResult, WatcherErrorKind};
use crate::switch::SelfChangeFlag;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherState {
    Idle,
    Watching,
    SignalingRestart,
}

/// What a single observed change amounts to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Our own write; the pending flag was consumed
    SelfCaused,
    /// External edit; a restart must be requested
    Restart,
    /// A restart is already pending
    Suppressed,
    /// Not watching
    Ignored,
}

#[derive(Debug)]
pub struct WatchClassifier {
    state: WatcherState,
    flag: SelfChangeFlag,
}

impl WatchClassifier {
    pub fn new(flag: SelfChangeFlag) -> Self {
        Self {
            state: WatcherState::Idle,
            flag,
        }
    }

    pub fn state(&self) -> WatcherState {
        self.state
    }

    pub fn arm(&mut self) {
        self.state = WatcherState::Watching;
    }

    pub fn disarm(&mut self) {
        self.state = WatcherState::Idle;
    }

    pub fn observe(&mut self) -> Verdict {
        match self.state {
            WatcherState::Idle => Verdict::Ignored,
            WatcherState::SignalingRestart => Verdict::Suppressed,
            WatcherState::Watching => {
                if self.flag.take() {
                    Verdict::SelfCaused
                } else {
                    self.state = WatcherState::SignalingRestart;
                    Verdict::Restart
                }
            }
        }
    }

    /// The supervisor has taken the pending restart
    pub fn acknowledge(&mut self) {
        if self.state == WatcherState::SignalingRestart {
            self.state = WatcherState::Watching;
        }
    }
}

/// Messages from a watcher to the supervisor
#[derive(Debug, Clone)]
pub enum WatchSignal {
    /// An external change was seen; `path` is the first file that changed
    Restart { path: PathBuf },
    /// Change detection stopped working and will not be re-armed
    Degraded(ShellError),
}

/// Supervisor's end of a running watcher
pub struct WatcherHandle {
    signals: mpsc::UnboundedReceiver<WatchSignal>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl WatcherHandle {
    /// Assemble a handle around a task that reports on `signals` and stops
    /// when `cancel` fires
    pub fn new(
        signals: mpsc::UnboundedReceiver<WatchSignal>,
        cancel: CancellationToken,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            signals,
            cancel,
            task: Some(task),
        }
    }

    /// Next signal, or `None` once the watcher task has ended
    pub async fn next_signal(&mut self) -> Option<WatchSignal> {
        self.signals.recv().await
    }

    /// Stop the watcher, waiting at most `grace` for its task
    pub async fn shutdown(mut self, grace: Duration) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if tokio::time::timeout(grace, task).await.is_err() {
                crate::kcsh_log_warn!("watcher did not stop within {:?}", grace);
            }
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Something that can start watching for configuration changes
pub trait ChangeSource: Send + Sync {
    /// Start a watcher bound to `flag`. Must be called inside a tokio runtime.
    fn arm(&self, flag: SelfChangeFlag) -> ShellResult<WatcherHandle>;
}

/// Watches configuration files on disk
#[derive(Debug, Clone)]
pub struct FsChangeSource {
    paths: Vec<PathBuf>,
    debounce: Duration,
}

impl FsChangeSource {
    pub fn new(paths: Vec<PathBuf>, debounce: Duration) -> Self {
        Self { paths, debounce }
    }
}

impl ChangeSource for FsChangeSource {
    fn arm(&self, flag: SelfChangeFlag) -> ShellResult<WatcherHandle> {
        if self.paths.is_empty() {
            return Err(ShellError::watcher(
                WatcherErrorKind::Unavailable,
                "no configuration files to watch",
            ));
        }

        let (raw_tx, raw_rx) = mpsc::unbounded_channel();
        let watch = kcsh_hal::watch_files(&self.paths, move |event| {
            let _ = raw_tx.send(event);
        })
        .map_err(|e| ShellError::watcher(WatcherErrorKind::Unavailable, e.to_string()))?;
        crate::kcsh_log_debug!(dirs = ?watch.dirs(), "watching configuration");

        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(watch_loop(
            watch,
            raw_rx,
            signal_tx,
            WatchClassifier::new(flag),
            self.debounce,
            cancel.clone(),
        ));
        Ok(WatcherHandle::new(signal_rx, cancel, task))
    }
}

enum Burst {
    Quiet,
    Failed(ShellError),
    Cancelled,
}

/// Wait until no event has arrived for `window`, absorbing the burst
async fn settle(
    events: &mut mpsc::UnboundedReceiver<FileEvent>,
    window: Duration,
    cancel: &CancellationToken,
) -> Burst {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return Burst::Cancelled,
            next = tokio::time::timeout(window, events.recv()) => match next {
                Err(_) => return Burst::Quiet,
                Ok(Some(FileEvent::Changed(_))) => continue,
                Ok(Some(FileEvent::Failed(err))) => return Burst::Failed(err.into()),
                Ok(None) => return Burst::Failed(stream_closed()),
            },
        }
    }
}

fn stream_closed() -> ShellError {
    ShellError::watcher(WatcherErrorKind::Failed, "file event stream closed")
}

async fn watch_loop(
    watch: FileWatch,
    mut events: mpsc::UnboundedReceiver<FileEvent>,
    signals: mpsc::UnboundedSender<WatchSignal>,
    mut classifier: WatchClassifier,
    debounce: Duration,
    cancel: CancellationToken,
) {
    classifier.arm();

    let failure = loop {
        let path = tokio::select! {
            biased;
            _ = cancel.cancelled() => break None,
            event = events.recv() => match event {
                Some(FileEvent::Changed(path)) => path,
                Some(FileEvent::Failed(err)) => break Some(ShellError::from(err)),
                None => break Some(stream_closed()),
            },
        };

        // one switch can touch the file several times
        match settle(&mut events, debounce, &cancel).await {
            Burst::Quiet => {}
            Burst::Cancelled => break None,
            Burst::Failed(err) => break Some(err),
        }

        match classifier.observe() {
            Verdict::SelfCaused => {
                crate::kcsh_log_debug!(path = %path.display(), "own change observed");
            }
            Verdict::Restart => {
                crate::kcsh_log_info!(path = %path.display(), "external configuration change");
                if signals.send(WatchSignal::Restart { path }).is_err() {
                    break None;
                }
            }
            Verdict::Suppressed | Verdict::Ignored => {
                crate::kcsh_log_debug!(path = %path.display(), "change ignored, restart pending");
            }
        }
    };

    classifier.disarm();
    drop(watch);
    if let Some(err) = failure {
        crate::kcsh_log_warn!(error = %err, "configuration watcher degraded");
        let _ = signals.send(WatchSignal::Degraded(err));
    }
}
