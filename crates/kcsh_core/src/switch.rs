//! Context switching
//!
//! A switch writes the client's configuration file, which the watcher is
//! observing. [`SelfChangeFlag`] is how the watcher tells that write apart
//! from an edit made by somebody else: it is raised before the client is
//! asked to mutate anything and consumed by the first change the watcher
//! sees afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::client::KubeClient;
use crate::error::{ClientErrorKind, ShellError, ShellResult};

/// The `self-change-pending` flag shared by the switch and the watcher
#[derive(Debug, Clone, Default)]
pub struct SelfChangeFlag(Arc<AtomicBool>);

impl SelfChangeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce an imminent write of our own
    pub fn mark(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Test and clear in one step; true if a self-change was pending
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Applies context changes through the client
pub struct ContextSwitch {
    client: Arc<dyn KubeClient>,
    flag: SelfChangeFlag,
    serial: Mutex<()>,
}

impl ContextSwitch {
    pub fn new(client: Arc<dyn KubeClient>, flag: SelfChangeFlag) -> Self {
        Self {
            client,
            flag,
            serial: Mutex::new(()),
        }
    }

    pub fn client(&self) -> &Arc<dyn KubeClient> {
        &self.client
    }

    pub fn flag(&self) -> &SelfChangeFlag {
        &self.flag
    }

    /// Switch to `name` and return the confirmed active context.
    ///
    /// Existence of `name` is left to the client. Only one switch runs at a
    /// time, since the flag tracks a single outstanding write. Switching to
    /// the context that is already active is answered without touching the
    /// client: it would write nothing, and a raised flag with no write
    /// behind it would swallow the next external edit.
    pub fn switch_to(&self, name: &str) -> ShellResult<String> {
        let _serial = self.serial.lock().unwrap_or_else(PoisonError::into_inner);

        if let Ok(active) = self.client.current_context() {
            if active == name {
                crate::kcsh_log_debug!(context = name, "context already active");
                return Ok(active);
            }
        }

        self.flag.mark();
        if let Err(err) = self.client.use_context(name) {
            // nothing was written, so no event will consume the flag
            self.flag.clear();
            crate::kcsh_log_warn!(context = name, error = %err, "context switch rejected");
            return Err(err);
        }

        let active = self.client.current_context()?;
        if active != name {
            crate::kcsh_log_warn!(requested = name, actual = %active, "switch overtaken by external edit");
            return Err(ShellError::client(
                ClientErrorKind::SwitchNotConfirmed,
                format!("switched to '{name}' but the active context is now '{active}'"),
            )
            .with_context("actual", active));
        }

        crate::kcsh_log_info!(context = name, "switched context");
        Ok(active)
    }

    /// Re-read the active context from the client
    pub fn refresh(&self) -> ShellResult<String> {
        self.client.current_context()
    }
}

impl std::fmt::Debug for ContextSwitch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextSwitch")
            .field("self_change_pending", &self.flag.is_pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutils::InMemoryClient;

    fn switch_with(client: Arc<InMemoryClient>) -> (ContextSwitch, SelfChangeFlag) {
        let flag = SelfChangeFlag::new();
        (ContextSwitch::new(client, flag.clone()), flag)
    }

    #[test]
    fn flag_take_clears_exactly_once() {
        let flag = SelfChangeFlag::new();
        assert!(!flag.take());
        flag.mark();
        assert!(flag.is_pending());
        assert!(flag.take());
        assert!(!flag.take());
    }

    #[test]
    fn flag_is_raised_before_the_mutation() {
        let client = Arc::new(InMemoryClient::with_contexts(&[("prod", "c1"), ("staging", "c2")], "prod"));
        let (switch, flag) = switch_with(client.clone());
        let observed = flag.clone();
        client.on_use_context(move || assert!(observed.is_pending()));

        assert_eq!(switch.switch_to("staging").unwrap(), "staging");
        assert!(flag.is_pending());
        assert_eq!(client.current_context().unwrap(), "staging");
    }

    #[test]
    fn switching_to_the_active_context_raises_nothing() {
        let client = Arc::new(InMemoryClient::with_contexts(&[("prod", "c1"), ("staging", "c2")], "prod"));
        let (switch, flag) = switch_with(client.clone());

        assert_eq!(switch.switch_to("prod").unwrap(), "prod");
        assert!(!flag.is_pending());
        assert!(client.switches().is_empty());
    }

    #[test]
    fn unreadable_current_context_still_switches() {
        let client = Arc::new(InMemoryClient::with_contexts(&[("prod", "c1")], ""));
        let (switch, flag) = switch_with(client.clone());

        assert_eq!(switch.switch_to("prod").unwrap(), "prod");
        assert!(flag.is_pending());
        assert_eq!(client.switches(), ["prod"]);
    }

    #[test]
    fn rejected_switch_clears_flag_and_keeps_state() {
        let client = Arc::new(InMemoryClient::with_contexts(&[("prod", "c1")], "prod"));
        let (switch, flag) = switch_with(client.clone());
        let err = switch.switch_to("nope").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Client(ClientErrorKind::UnknownContext));
        assert!(!flag.is_pending());
        assert_eq!(client.current_context().unwrap(), "prod");
    }

    #[test]
    fn switch_is_revalidated_against_the_client() {
        let client = Arc::new(InMemoryClient::with_contexts(&[("prod", "c1"), ("staging", "c2")], "prod"));
        let (switch, _flag) = switch_with(client.clone());
        let racer = client.clone();
        client.on_use_context(move || racer.set_current_externally("prod"));

        let err = switch.switch_to("staging").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Client(ClientErrorKind::SwitchNotConfirmed));
        assert_eq!(err.context.get("actual").map(String::as_str), Some("prod"));
    }
}
