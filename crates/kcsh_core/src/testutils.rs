//! Test doubles shared by this crate's tests and downstream test suites.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use crate::client::KubeClient;
use crate::error::{ClientErrorKind, ShellError, ShellResult};

type Hook = Arc<dyn Fn() + Send + Sync>;

#[derive(Default)]
struct State {
    contexts: Vec<(String, String)>,
    current: Option<String>,
    switches: Vec<String>,
}

/// [`KubeClient`] keeping its configuration in memory.
///
/// With a backing file every mutation that changes something also rewrites
/// that file, which is what the real client does and what the watcher
/// reacts to. Selecting the context that is already active writes nothing.
#[derive(Default)]
pub struct InMemoryClient {
    state: Mutex<State>,
    hook: Mutex<Option<Hook>>,
    backing_file: Option<PathBuf>,
}

impl InMemoryClient {
    pub fn with_contexts(contexts: &[(&str, &str)], current: &str) -> Self {
        let state = State {
            contexts: contexts
                .iter()
                .map(|(n, c)| (n.to_string(), c.to_string()))
                .collect(),
            current: (!current.is_empty()).then(|| current.to_string()),
            switches: Vec::new(),
        };
        Self {
            state: Mutex::new(state),
            ..Self::default()
        }
    }

    /// Mirror the configuration into `path` on every mutation
    pub fn backed_by(mut self, path: impl Into<PathBuf>) -> Self {
        self.backing_file = Some(path.into());
        self.persist();
        self
    }

    /// Run `hook` right after each successful mutation
    pub fn on_use_context(&self, hook: impl Fn() + Send + Sync + 'static) {
        *self.hook.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::new(hook));
    }

    /// Simulate another process changing the active context
    pub fn set_current_externally(&self, name: &str) {
        self.lock().current = Some(name.to_string());
        self.persist();
    }

    /// Names passed to successful `use_context` calls, in order
    pub fn switches(&self) -> Vec<String> {
        self.lock().switches.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dump(&self) -> String {
        let state = self.lock();
        let mut out = String::from("apiVersion: v1\ncontexts:\n");
        for (name, cluster) in &state.contexts {
            out.push_str(&format!("- context:\n    cluster: {cluster}\n  name: {name}\n"));
        }
        if let Some(current) = &state.current {
            out.push_str(&format!("current-context: {current}\n"));
        }
        out.push_str("kind: Config\n");
        out
    }

    fn persist(&self) {
        if let Some(path) = &self.backing_file {
            let _ = std::fs::write(path, self.dump());
        }
    }
}

impl KubeClient for InMemoryClient {
    fn current_context(&self) -> ShellResult<String> {
        self.lock().current.clone().ok_or_else(|| {
            ShellError::client(ClientErrorKind::NoActiveContext, "current-context is not set")
        })
    }

    fn enumerate(&self) -> ShellResult<String> {
        Ok(self.dump())
    }

    fn use_context(&self, name: &str) -> ShellResult<()> {
        let changed = {
            let mut state = self.lock();
            if !state.contexts.iter().any(|(n, _)| n == name) {
                return Err(ShellError::client(
                    ClientErrorKind::UnknownContext,
                    format!("no context exists with the name: \"{name}\""),
                ));
            }
            let changed = state.current.as_deref() != Some(name);
            state.current = Some(name.to_string());
            state.switches.push(name.to_string());
            changed
        };
        if changed {
            self.persist();
        }

        let hook = self.hook.lock().unwrap_or_else(PoisonError::into_inner).clone();
        if let Some(hook) = hook {
            hook();
        }
        Ok(())
    }
}
