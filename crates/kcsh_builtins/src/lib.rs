//! Built-in commands of a kcsh session.
//!
//! A session line whose first word names a builtin is handled here; every
//! other line goes to the host shell through [`common::host::run_in_host`].

use std::io::Write;

use kcsh_core::error::{ErrorKind, ShellError};

pub mod common;
pub mod registry;

pub mod cd;
pub mod context;
pub mod exit;
pub mod help;
pub mod prompt;

pub use common::host::run_in_host;
pub use common::{BuiltinContext, BuiltinResult, Flow};
pub use registry::{get_builtin_registry, BuiltinRegistry};

/// A command kcsh runs itself instead of passing it to the host shell
pub trait Builtin: Send + Sync {
    fn name(&self) -> &'static str;

    /// One line for `help`
    fn synopsis(&self) -> &'static str;

    fn usage(&self) -> &'static str;

    /// Run with the words after the command name
    fn execute(&self, ctx: &mut BuiltinContext<'_>, args: &[String]) -> BuiltinResult;
}

/// Result of offering a line to the builtins
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    NotBuiltin,
    Done(Flow),
}

/// Run `line` if it starts with a builtin name.
///
/// Errors never leave this function: they are printed as `name: message`
/// and the command's status is 1.
pub fn dispatch(registry: &BuiltinRegistry, line: &str, ctx: &mut BuiltinContext<'_>) -> Dispatch {
    let mut words = line.split_whitespace();
    let Some(builtin) = words.next().and_then(|name| registry.get(name)) else {
        return Dispatch::NotBuiltin;
    };
    let args: Vec<String> = words.map(str::to_string).collect();

    match builtin.execute(ctx, &args) {
        Ok(flow) => Dispatch::Done(flow),
        Err(err) => {
            report(builtin.name(), &err);
            // a closed stderr leaves nothing else to report to
            let _ = writeln!(ctx.err, "{}: {err:#}", builtin.name());
            Dispatch::Done(Flow::Continue(1))
        }
    }
}

fn report(name: &str, err: &anyhow::Error) {
    match err.downcast_ref::<ShellError>() {
        Some(ShellError {
            kind: ErrorKind::UserInput(kind),
            ..
        }) => {
            kcsh_core::kcsh_log_debug!(builtin = name, ?kind, "rejected input");
        }
        _ => {
            kcsh_core::kcsh_log_warn!(builtin = name, error = %format!("{err:#}"), "builtin failed");
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Arc;

    use kcsh_core::testutils::InMemoryClient;
    use kcsh_core::{ContextSwitch, NoticeSender, Notices, SelfChangeFlag};
    use kcsh_ui::{PromptState, ScriptedLines};
    use tokio_util::sync::CancellationToken;

    use super::*;

    /// One builtin invocation's worth of session state, with captured output
    pub struct Harness {
        pub client: Arc<InMemoryClient>,
        pub switch: ContextSwitch,
        pub prompt: PromptState,
        pub input: ScriptedLines,
        pub cancel: CancellationToken,
        pub last_status: i32,
        notices: Notices,
        _notice_tx: NoticeSender,
        out: Vec<u8>,
        err: Vec<u8>,
    }

    impl Harness {
        pub fn new(contexts: &[(&str, &str)], current: &str) -> Self {
            let client = Arc::new(InMemoryClient::with_contexts(contexts, current));
            let switch = ContextSwitch::new(client.clone(), SelfChangeFlag::new());
            let (notice_tx, notices) = Notices::channel();
            Self {
                client,
                switch,
                prompt: PromptState::new(true, current),
                input: ScriptedLines::default(),
                cancel: CancellationToken::new(),
                last_status: 0,
                notices,
                _notice_tx: notice_tx,
                out: Vec::new(),
                err: Vec::new(),
            }
        }

        /// Lines answered to interactive questions, in order
        pub fn with_input(mut self, lines: &[&str]) -> Self {
            self.input = ScriptedLines::new(lines.iter().copied());
            self
        }

        fn context(&mut self) -> BuiltinContext<'_> {
            BuiltinContext {
                switch: &self.switch,
                prompt: &mut self.prompt,
                input: &mut self.input,
                notices: &mut self.notices,
                cancel: &self.cancel,
                out: &mut self.out,
                err: &mut self.err,
                host_shell: Path::new("/bin/sh"),
                last_status: self.last_status,
            }
        }

        pub fn run(&mut self, builtin: &dyn Builtin, args: &[&str]) -> BuiltinResult {
            let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
            builtin.execute(&mut self.context(), &args)
        }

        pub fn dispatch(&mut self, line: &str) -> Dispatch {
            let registry = get_builtin_registry();
            dispatch(registry, line, &mut self.context())
        }

        pub fn stdout(&self) -> String {
            String::from_utf8_lossy(&self.out).into_owned()
        }

        pub fn stderr(&self) -> String {
            String::from_utf8_lossy(&self.err).into_owned()
        }
    }
}
