//! Access to the external cluster client
//!
//! The client owns the configuration file; kcsh only asks it questions
//! and requests one mutation. [`KubeClient`] is the seam the rest of the
//! crate talks to so tests can substitute an in-memory implementation.

use kcsh_hal::{Command, CommandResult};

use crate::catalog::ContextCatalog;
use crate::error::{ClientErrorKind, ShellError, ShellResult};

/// Queries and the single mutation kcsh needs from the client
pub trait KubeClient: Send + Sync {
    /// Name of the active context
    fn current_context(&self) -> ShellResult<String>;

    /// Raw configuration dump for [`ContextCatalog::parse`]
    fn enumerate(&self) -> ShellResult<String>;

    /// Make `name` the active context
    fn use_context(&self, name: &str) -> ShellResult<()>;

    /// Fresh catalog snapshot
    fn catalog(&self) -> ShellResult<ContextCatalog> {
        ContextCatalog::parse(&self.enumerate()?)
    }
}

/// [`KubeClient`] backed by the `kubectl` command line tool
#[derive(Debug, Clone)]
pub struct KubectlClient {
    program: String,
}

impl KubectlClient {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&str]) -> ShellResult<CommandResult> {
        crate::kcsh_log_debug!(program = %self.program, ?args, "invoking client");
        let result = Command::new(&self.program).args(args).output()?;
        crate::kcsh_log_debug!(exit_code = result.exit_code, "client finished");
        Ok(result)
    }

    fn failure(&self, kind: ClientErrorKind, result: &CommandResult) -> ShellError {
        let stderr = result.stderr_lossy();
        let detail = stderr.trim().trim_start_matches("error: ");
        ShellError::client(kind, detail.to_string())
            .with_context("exit code", result.exit_code.to_string())
    }
}

impl KubeClient for KubectlClient {
    fn current_context(&self) -> ShellResult<String> {
        let result = self.run(&["config", "current-context"])?;
        if !result.success() {
            let kind = if result.stderr_lossy().contains("current-context is not set") {
                ClientErrorKind::NoActiveContext
            } else {
                ClientErrorKind::CommandFailed
            };
            return Err(self.failure(kind, &result));
        }

        let name = result.stdout_lossy().trim().to_string();
        if name.is_empty() {
            return Err(ShellError::client(
                ClientErrorKind::NoActiveContext,
                "no current context is configured",
            ));
        }
        Ok(name)
    }

    fn enumerate(&self) -> ShellResult<String> {
        let result = self.run(&["config", "view"])?;
        if !result.success() {
            return Err(self.failure(ClientErrorKind::CommandFailed, &result));
        }
        Ok(result.stdout_lossy())
    }

    fn use_context(&self, name: &str) -> ShellResult<()> {
        let result = self.run(&["config", "use-context", name])?;
        if result.success() {
            return Ok(());
        }
        let kind = if result.stderr_lossy().contains("no context exists") {
            ClientErrorKind::UnknownContext
        } else {
            ClientErrorKind::CommandFailed
        };
        Err(self.failure(kind, &result).with_context("context", name))
    }
}
