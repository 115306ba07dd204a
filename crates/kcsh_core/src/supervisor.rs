//! Session supervision
//!
//! The supervisor owns the loop `Init -> Running -> (Restarting -> Init)*
//! -> Terminated`. Each iteration reads the active context, arms a watcher,
//! starts the session on a blocking thread and waits for whichever comes
//! first: the session ending, a restart request from the watcher, or a
//! process-wide shutdown request.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::client::KubeClient;
use crate::config::Settings;
use crate::context::{NoticeSender, Notices, SessionContext, SessionOutcome, SessionReport, SessionRunner};
use crate::error::{ShellError, ShellResult};
use crate::switch::{ContextSwitch, SelfChangeFlag};
use crate::watcher::{ChangeSource, WatchSignal, WatcherHandle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Init,
    Running,
    Restarting,
    Terminated,
}

/// How supervision ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The operator exited the shell with this status
    Exited(i32),
    /// A shutdown was requested through [`SessionSupervisor::shutdown_token`]
    Shutdown,
}

type SessionTask = JoinHandle<(Box<dyn SessionRunner>, ShellResult<SessionReport>)>;

enum Wake {
    Finished(Result<(Box<dyn SessionRunner>, ShellResult<SessionReport>), tokio::task::JoinError>),
    Restart(PathBuf),
    Shutdown,
}

pub struct SessionSupervisor {
    client: Arc<dyn KubeClient>,
    runner: Option<Box<dyn SessionRunner>>,
    source: Option<Arc<dyn ChangeSource>>,
    settings: Arc<Settings>,
    flag: SelfChangeFlag,
    shutdown: CancellationToken,
    state: SupervisorState,
    restarts: u64,
}

impl SessionSupervisor {
    pub fn new(client: Arc<dyn KubeClient>, runner: Box<dyn SessionRunner>, settings: Settings) -> Self {
        Self {
            client,
            runner: Some(runner),
            source: None,
            settings: Arc::new(settings),
            flag: SelfChangeFlag::new(),
            shutdown: CancellationToken::new(),
            state: SupervisorState::Init,
            restarts: 0,
        }
    }

    /// Enable change detection. Without a source sessions run unwatched.
    pub fn with_change_source(mut self, source: Arc<dyn ChangeSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Cancelling this token tears down the session and ends [`run`](Self::run)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    pub fn restarts(&self) -> u64 {
        self.restarts
    }

    pub fn flag(&self) -> &SelfChangeFlag {
        &self.flag
    }

    /// Supervise sessions until the operator exits or shutdown is requested.
    ///
    /// Failing to read the active context before the first session is a
    /// startup error; after a restart the session starts without one.
    pub async fn run(&mut self) -> ShellResult<RunOutcome> {
        let switch = Arc::new(ContextSwitch::new(self.client.clone(), self.flag.clone()));
        let mut prompt_enabled = self.settings.prompt_enabled;
        let mut watch_available = self.source.is_some();
        let mut carried: Vec<String> = Vec::new();

        let result = loop {
            self.state = SupervisorState::Init;
            let (notice_tx, notices) = Notices::channel();
            for notice in carried.drain(..) {
                let _ = notice_tx.send(notice);
            }

            let active_context = match self.read_active().await {
                Ok(active) => Some(active),
                Err(err) if self.restarts == 0 => break Err(err.into_startup()),
                Err(err) => {
                    crate::kcsh_log_warn!(error = %err, "no active context after restart");
                    let _ = notice_tx.send(format!("kcsh: {err}"));
                    None
                }
            };

            let mut watcher = None;
            if watch_available {
                watcher = self.arm_watcher(&notice_tx);
                watch_available = watcher.is_some();
            }

            let ctx = SessionContext {
                active_context,
                prompt_enabled,
                watcher_active: watcher.is_some(),
                switch: switch.clone(),
                notices,
                settings: self.settings.clone(),
                generation: self.restarts,
            };

            let Some(mut runner) = self.runner.take() else {
                break Err(ShellError::internal("session runner was lost"));
            };
            let cancel = CancellationToken::new();
            let session_cancel = cancel.clone();
            let mut session: SessionTask = tokio::task::spawn_blocking(move || {
                let report = runner.run_session(ctx, session_cancel);
                (runner, report)
            });
            self.state = SupervisorState::Running;
            crate::kcsh_log_debug!(generation = self.restarts, "session started");

            let wake = loop {
                tokio::select! {
                    joined = &mut session => break Wake::Finished(joined),
                    _ = self.shutdown.cancelled() => break Wake::Shutdown,
                    signal = next_signal(&mut watcher) => match signal {
                        Some(WatchSignal::Restart { path }) => break Wake::Restart(path),
                        Some(WatchSignal::Degraded(err)) => {
                            let _ = notice_tx.send(degraded_notice(&err));
                            watch_available = false;
                            if let Some(handle) = watcher.take() {
                                handle.shutdown(self.settings.shutdown_grace()).await;
                            }
                        }
                        None => {
                            watch_available = false;
                            watcher = None;
                        }
                    },
                }
            };

            match wake {
                Wake::Finished(joined) => {
                    self.stop_watcher(watcher).await;
                    let report = match self.reclaim(joined) {
                        Ok(report) => report,
                        Err(err) => break Err(err),
                    };
                    match report.outcome {
                        SessionOutcome::Exited(status) => break Ok(RunOutcome::Exited(status)),
                        SessionOutcome::Cancelled => {
                            // nobody asked for this; start over
                            prompt_enabled = report.prompt_enabled;
                        }
                    }
                }
                Wake::Restart(path) => {
                    self.state = SupervisorState::Restarting;
                    crate::kcsh_log_info!(
                        path = %path.display(),
                        "configuration changed externally, restarting session"
                    );
                    cancel.cancel();
                    // a foreground command keeps the session busy until it finishes
                    let joined = tokio::select! {
                        joined = &mut session => Some(joined),
                        _ = self.shutdown.cancelled() => None,
                    };
                    self.stop_watcher(watcher).await;
                    let Some(joined) = joined else {
                        break Ok(RunOutcome::Shutdown);
                    };
                    match self.reclaim(joined) {
                        Ok(report) => prompt_enabled = report.prompt_enabled,
                        Err(err) => break Err(err),
                    }
                    self.restarts += 1;
                    carried.push("kcsh: configuration changed externally, session restarted".to_string());
                }
                Wake::Shutdown => {
                    cancel.cancel();
                    let grace = self.settings.shutdown_grace();
                    match tokio::time::timeout(grace, &mut session).await {
                        Ok(joined) => {
                            let _ = self.reclaim(joined);
                        }
                        Err(_) => {
                            crate::kcsh_log_warn!("session did not stop within {:?}", grace);
                        }
                    }
                    self.stop_watcher(watcher).await;
                    break Ok(RunOutcome::Shutdown);
                }
            }
        };

        self.state = SupervisorState::Terminated;
        result
    }

    async fn read_active(&self) -> ShellResult<String> {
        let client = self.client.clone();
        tokio::task::spawn_blocking(move || client.current_context())
            .await
            .map_err(|e| ShellError::internal(format!("context read failed: {e}")))?
    }

    fn arm_watcher(&self, notices: &NoticeSender) -> Option<WatcherHandle> {
        let source = self.source.as_ref()?;
        match source.arm(self.flag.clone()) {
            Ok(handle) => Some(handle),
            Err(err) => {
                crate::kcsh_log_warn!(error = %err, "change detection unavailable");
                let _ = notices.send(degraded_notice(&err));
                None
            }
        }
    }

    async fn stop_watcher(&self, watcher: Option<WatcherHandle>) {
        if let Some(handle) = watcher {
            handle.shutdown(self.settings.shutdown_grace()).await;
        }
    }

    fn reclaim(
        &mut self,
        joined: Result<(Box<dyn SessionRunner>, ShellResult<SessionReport>), tokio::task::JoinError>,
    ) -> ShellResult<SessionReport> {
        let (runner, report) =
            joined.map_err(|e| ShellError::internal(format!("session thread failed: {e}")))?;
        self.runner = Some(runner);
        report
    }
}

async fn next_signal(watcher: &mut Option<WatcherHandle>) -> Option<WatchSignal> {
    match watcher {
        Some(handle) => handle.next_signal().await,
        None => std::future::pending().await,
    }
}

fn degraded_notice(err: &ShellError) -> String {
    format!("kcsh: external context changes will not be detected ({err})")
}
