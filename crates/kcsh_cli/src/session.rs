//! The interactive session the supervisor restarts
//!
//! Reads lines, runs builtins itself and hands everything else to the host
//! shell. Input, history and the last exit status outlive a restart; the
//! prompt state is rebuilt from the supervisor's fresh snapshot.

use std::io;
use std::path::PathBuf;

use kcsh_builtins::{dispatch, get_builtin_registry, run_in_host, BuiltinContext, Dispatch, Flow};
use kcsh_core::{SessionContext, SessionOutcome, SessionReport, SessionRunner, ShellResult};
use kcsh_ui::{LineSource, Prompt, PromptEnv, PromptRenderer, PromptState, ReadOutcome};
use tokio_util::sync::CancellationToken;

/// Status of a line interrupted with Ctrl-C, as in bash
const INTERRUPTED_STATUS: i32 = 130;
/// Status when the host shell itself could not be started
const SPAWN_FAILED_STATUS: i32 = 127;

pub struct InteractiveSession {
    input: Box<dyn LineSource>,
    renderer: PromptRenderer,
    host_shell: PathBuf,
    show_prompt: bool,
    last_status: i32,
}

impl InteractiveSession {
    /// `show_prompt` is false for piped input, where nobody reads the prompt
    pub fn new(
        input: Box<dyn LineSource>,
        renderer: PromptRenderer,
        host_shell: PathBuf,
        show_prompt: bool,
    ) -> Self {
        Self {
            input,
            renderer,
            host_shell,
            show_prompt,
            last_status: 0,
        }
    }

    pub fn last_status(&self) -> i32 {
        self.last_status
    }

    fn prompt(&self, state: &PromptState) -> Prompt {
        if self.show_prompt {
            self.renderer.prompt(state, &PromptEnv::current())
        } else {
            Prompt::plain("")
        }
    }

    /// Returns the status to exit with when the line ends the session
    fn run_line(
        &mut self,
        line: &str,
        state: &mut PromptState,
        ctx: &mut SessionContext,
        cancel: &CancellationToken,
    ) -> Option<i32> {
        let (mut out, mut err) = (io::stdout(), io::stderr());
        let mut builtin_ctx = BuiltinContext {
            switch: ctx.switch.as_ref(),
            prompt: state,
            input: self.input.as_mut(),
            notices: &mut ctx.notices,
            cancel,
            out: &mut out,
            err: &mut err,
            host_shell: &self.host_shell,
            last_status: self.last_status,
        };

        match dispatch(get_builtin_registry(), line, &mut builtin_ctx) {
            Dispatch::Done(Flow::Continue(status)) => self.last_status = status,
            Dispatch::Done(Flow::Exit(status)) => {
                self.last_status = status;
                return Some(status);
            }
            Dispatch::NotBuiltin => {
                self.last_status = match run_in_host(&self.host_shell, line) {
                    Ok(status) => status,
                    Err(e) => {
                        kcsh_core::kcsh_log_warn!(error = %e, "host shell failed to start");
                        eprintln!("kcsh: {}: {e:#}", self.host_shell.display());
                        SPAWN_FAILED_STATUS
                    }
                };
            }
        }
        None
    }
}

impl SessionRunner for InteractiveSession {
    fn run_session(
        &mut self,
        mut ctx: SessionContext,
        cancel: CancellationToken,
    ) -> ShellResult<SessionReport> {
        let mut state = PromptState::new(
            ctx.prompt_enabled,
            ctx.active_context.clone().unwrap_or_default(),
        );
        kcsh_core::kcsh_log_debug!(
            generation = ctx.generation,
            context = state.active_context(),
            watched = ctx.watcher_active,
            "session ready"
        );

        let outcome = loop {
            let prompt = self.prompt(&state);
            let line = match self.input.read_line(&prompt, &mut ctx.notices, &cancel)? {
                ReadOutcome::Line(line) => line,
                ReadOutcome::Interrupted => {
                    self.last_status = INTERRUPTED_STATUS;
                    continue;
                }
                ReadOutcome::Eof => break SessionOutcome::Exited(self.last_status),
                ReadOutcome::Cancelled => break SessionOutcome::Cancelled,
            };

            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if let Some(status) = self.run_line(line, &mut state, &mut ctx, &cancel) {
                break SessionOutcome::Exited(status);
            }
        };

        Ok(SessionReport {
            outcome,
            prompt_enabled: state.is_enabled(),
        })
    }
}
