//! Error handling for the kcsh HAL
//!
//! This module provides structured error types for all HAL operations,
//! enabling proper error propagation and handling throughout the shell.

use std::fmt;
use std::io;
use std::result;

/// Result type for HAL operations
pub type HalResult<T> = result::Result<T, HalError>;

/// Error types for HAL operations
#[derive(Debug, Clone)]
pub enum HalError {
    /// I/O operation failed
    Io(IoError),
    /// Process operation failed
    Process(ProcessError),
    /// The change-notification facility failed
    Watch(WatchError),
    /// Invalid operation or state
    Invalid(String),
    /// Operation not supported on this platform
    Unsupported(String),
}

#[derive(Debug, Clone)]
pub struct IoError {
    pub operation: String,
    pub path: Option<String>,
    pub kind: io::ErrorKind,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct ProcessError {
    pub operation: String,
    pub program: String,
    pub exit_code: Option<i32>,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct WatchError {
    pub operation: String,
    pub paths: Vec<String>,
    pub message: String,
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HalError::Io(err) => match &err.path {
                Some(path) => write!(f, "I/O error in {} ({}): {}", err.operation, path, err.message),
                None => write!(f, "I/O error in {}: {}", err.operation, err.message),
            },
            HalError::Process(err) => match err.exit_code {
                Some(code) => write!(
                    f,
                    "Process error in {} ({} exited with {}): {}",
                    err.operation, err.program, code, err.message
                ),
                None => write!(
                    f,
                    "Process error in {} ({}): {}",
                    err.operation, err.program, err.message
                ),
            },
            HalError::Watch(err) => {
                write!(f, "Watch error in {}: {}", err.operation, err.message)
            }
            HalError::Invalid(msg) => write!(f, "Invalid operation: {msg}"),
            HalError::Unsupported(msg) => write!(f, "Unsupported operation: {msg}"),
        }
    }
}

impl std::error::Error for HalError {}

impl From<io::Error> for HalError {
    fn from(err: io::Error) -> Self {
        HalError::Io(IoError {
            operation: "unknown".to_string(),
            path: None,
            kind: err.kind(),
            message: err.to_string(),
        })
    }
}

impl From<notify::Error> for HalError {
    fn from(err: notify::Error) -> Self {
        HalError::Watch(WatchError {
            operation: "notify".to_string(),
            paths: err.paths.iter().map(|p| p.display().to_string()).collect(),
            message: err.to_string(),
        })
    }
}

// Helper functions for creating specific error types
impl HalError {
    pub fn io_error(operation: &str, path: Option<&str>, err: io::Error) -> Self {
        HalError::Io(IoError {
            operation: operation.to_string(),
            path: path.map(|s| s.to_string()),
            kind: err.kind(),
            message: err.to_string(),
        })
    }

    pub fn process_error(operation: &str, program: &str, exit_code: Option<i32>, message: &str) -> Self {
        HalError::Process(ProcessError {
            operation: operation.to_string(),
            program: program.to_string(),
            exit_code,
            message: message.to_string(),
        })
    }

    pub fn watch_error(operation: &str, paths: &[String], message: &str) -> Self {
        HalError::Watch(WatchError {
            operation: operation.to_string(),
            paths: paths.to_vec(),
            message: message.to_string(),
        })
    }

    pub fn unsupported(message: &str) -> Self {
        HalError::Unsupported(message.to_string())
    }

    pub fn invalid(message: &str) -> Self {
        HalError::Invalid(message.to_string())
    }

    /// True when the error means the program could not be found at all
    pub fn is_not_found(&self) -> bool {
        matches!(self, HalError::Io(err) if err.kind == io::ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_error_display_includes_exit_code() {
        let err = HalError::process_error("output", "kubectl", Some(1), "boom");
        assert_eq!(
            err.to_string(),
            "Process error in output (kubectl exited with 1): boom"
        );
    }

    #[test]
    fn io_not_found_is_detected() {
        let err = HalError::io_error(
            "spawn",
            Some("kubectl"),
            io::Error::new(io::ErrorKind::NotFound, "missing"),
        );
        assert!(err.is_not_found());
        assert!(!HalError::invalid("x").is_not_found());
    }
}
