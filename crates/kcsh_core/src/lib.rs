//! kcsh Core Library
//!
//! Everything kcsh knows about contexts and sessions that does not touch
//! the terminal: the context catalog and the client that produces it,
//! context switching with self-change tracking, configuration watching,
//! and the supervisor that restarts sessions on external edits.

pub use catalog::{Context, ContextCatalog, LookupError};
pub use client::{KubeClient, KubectlClient};
pub use config::Settings;
pub use context::{
    NoticeSender, Notices, SessionContext, SessionOutcome, SessionReport, SessionRunner,
};
pub use error::{ErrorKind, ShellError, ShellResult};
pub use supervisor::{RunOutcome, SessionSupervisor, SupervisorState};
pub use switch::{ContextSwitch, SelfChangeFlag};
pub use watcher::{ChangeSource, FsChangeSource, WatchClassifier, WatchSignal, WatcherHandle};

pub mod catalog;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod startup;
pub mod supervisor;
pub mod switch;
pub mod watcher;

#[cfg(any(test, feature = "testutils"))]
pub mod testutils;

#[doc(hidden)]
pub use tracing as __tracing;

// Logging facade macros; minimal builds strip the call sites entirely
#[cfg(feature = "minimal-logging")]
#[macro_export]
macro_rules! kcsh_log_debug { ($($tt:tt)*) => { /* stripped in minimal build */ }; }
#[cfg(not(feature = "minimal-logging"))]
#[macro_export]
macro_rules! kcsh_log_debug { ($($tt:tt)*) => { $crate::__tracing::debug!($($tt)*); }; }

#[cfg(feature = "minimal-logging")]
#[macro_export]
macro_rules! kcsh_log_info { ($($tt:tt)*) => { /* stripped */ }; }
#[cfg(not(feature = "minimal-logging"))]
#[macro_export]
macro_rules! kcsh_log_info { ($($tt:tt)*) => { $crate::__tracing::info!($($tt)*); }; }

#[cfg(feature = "minimal-logging")]
#[macro_export]
macro_rules! kcsh_log_warn { ($($tt:tt)*) => { /* stripped */ }; }
#[cfg(not(feature = "minimal-logging"))]
#[macro_export]
macro_rules! kcsh_log_warn { ($($tt:tt)*) => { $crate::__tracing::warn!($($tt)*); }; }

#[cfg(feature = "minimal-logging")]
#[macro_export]
macro_rules! kcsh_log_error { ($($tt:tt)*) => { /* stripped */ }; }
#[cfg(not(feature = "minimal-logging"))]
#[macro_export]
macro_rules! kcsh_log_error { ($($tt:tt)*) => { $crate::__tracing::error!($($tt)*); }; }
