pub mod host;

use std::io::Write;
use std::path::Path;

use kcsh_core::{ContextSwitch, Notices};
use kcsh_ui::{LineSource, PromptState};
use tokio_util::sync::CancellationToken;

/// Result type for built-in commands
pub type BuiltinResult = anyhow::Result<Flow>;

/// What the session does after a builtin ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading; the value is the command's exit status
    Continue(i32),
    /// End the session with this status
    Exit(i32),
}

impl Flow {
    pub fn status(self) -> i32 {
        match self {
            Flow::Continue(status) | Flow::Exit(status) => status,
        }
    }
}

/// Session state a builtin may read or change
pub struct BuiltinContext<'a> {
    pub switch: &'a ContextSwitch,
    pub prompt: &'a mut PromptState,
    /// Used by interactive builtins that ask a follow-up question
    pub input: &'a mut dyn LineSource,
    pub notices: &'a mut Notices,
    pub cancel: &'a CancellationToken,
    pub out: &'a mut dyn Write,
    pub err: &'a mut dyn Write,
    pub host_shell: &'a Path,
    pub last_status: i32,
}
