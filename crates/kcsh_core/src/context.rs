//! Per-session state handed from the supervisor to the interactive session

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::Settings;
use crate::error::ShellResult;
use crate::switch::ContextSwitch;

/// Snapshot a session starts from.
///
/// The active context is read once, before the session begins. It is only
/// refreshed by a switch made from inside the session or by a restart.
#[derive(Debug)]
pub struct SessionContext {
    /// `None` when the client reports no current context after a restart
    pub active_context: Option<String>,
    pub prompt_enabled: bool,
    /// False when change detection was disabled or has degraded
    pub watcher_active: bool,
    pub switch: Arc<ContextSwitch>,
    pub notices: Notices,
    pub settings: Arc<Settings>,
    /// Number of restarts before this session
    pub generation: u64,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The operator left the shell with this status
    Exited(i32),
    /// The session stopped because its cancellation token fired
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    /// Prompt visibility at the end of the session, carried into the next one
    pub prompt_enabled: bool,
}

/// One interactive session.
///
/// Runs on a blocking thread. Implementations must poll `cancel` while
/// waiting for input and return [`SessionOutcome::Cancelled`] promptly once
/// it fires.
pub trait SessionRunner: Send + 'static {
    fn run_session(
        &mut self,
        ctx: SessionContext,
        cancel: CancellationToken,
    ) -> ShellResult<SessionReport>;
}

/// One-line messages for the operator, printed by the session above the prompt
#[derive(Debug)]
pub struct Notices {
    rx: mpsc::UnboundedReceiver<String>,
}

pub type NoticeSender = mpsc::UnboundedSender<String>;

impl Notices {
    pub fn channel() -> (NoticeSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (tx, Self { rx })
    }

    /// Everything queued so far, without blocking
    pub fn drain(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(notice) = self.rx.try_recv() {
            out.push(notice);
        }
        out
    }
}
