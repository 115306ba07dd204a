//! kcsh Hardware Abstraction Layer (HAL)
//!
//! This crate isolates everything kcsh does against the operating system:
//! running external programs, subscribing to filesystem change events and
//! locating the host shell.

pub mod command;
pub mod error;
pub mod fs_watch;
pub mod platform;

pub use command::{command_exists, execute, resolve_program, Command, CommandResult};
pub use error::{HalError, HalResult};
pub use fs_watch::{watch_files, FileEvent, FileWatch};
pub use platform::{HostShell, ShellFamily, DEFAULT_SHELL};
