//! Error handling for kcsh
//!
//! Errors are grouped by how the shell must react to them: startup
//! failures end the process, user input errors are reported inline and the
//! session continues, watcher errors degrade change detection only.

use std::collections::BTreeMap;
use std::fmt;

use kcsh_hal::HalError;

/// Result type for all kcsh operations
pub type ShellResult<T> = Result<T, ShellError>;

/// Main error type for all kcsh operations
#[derive(Debug, Clone)]
pub struct ShellError {
    pub kind: ErrorKind,
    pub message: String,
    pub context: BTreeMap<String, String>,
}

/// Categories of errors that can occur in kcsh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failures before any interactive session exists
    Startup(StartupErrorKind),
    /// Bad input typed at the prompt
    UserInput(UserInputErrorKind),
    /// The external client refused or failed a request
    Client(ClientErrorKind),
    /// Change detection is unavailable or broke
    Watcher(WatcherErrorKind),
    /// Settings could not be loaded
    Config(ConfigErrorKind),
    Io,
    Internal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupErrorKind {
    MissingTool,
    NoActiveContext,
    AlreadyRunning,
    UnsupportedHost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserInputErrorKind {
    OutOfRange,
    NotAnInteger,
    UnknownSubcommand,
    TooManyArguments,
    NoMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientErrorKind {
    UnknownContext,
    NoActiveContext,
    CommandFailed,
    SwitchNotConfirmed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatcherErrorKind {
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigErrorKind {
    Unreadable,
    InvalidFormat,
    InvalidValue,
}

impl ShellError {
    /// Create a new shell error
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn startup(kind: StartupErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Startup(kind), message)
    }

    pub fn user_input(kind: UserInputErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserInput(kind), message)
    }

    pub fn client(kind: ClientErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Client(kind), message)
    }

    pub fn watcher(kind: WatcherErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Watcher(kind), message)
    }

    pub fn config(kind: ConfigErrorKind, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config(kind), message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Add context information to the error
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Startup errors end the process; everything else is contained.
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Startup(_) | ErrorKind::Client(ClientErrorKind::NoActiveContext)
        )
    }

    /// Process exit code for a fatal error
    pub fn exit_code(&self) -> i32 {
        1
    }

    /// Promote an error raised before the first session into a startup error
    pub fn into_startup(self) -> Self {
        let kind = match self.kind {
            ErrorKind::Startup(kind) => kind,
            ErrorKind::Io => StartupErrorKind::MissingTool,
            _ => StartupErrorKind::NoActiveContext,
        };
        Self {
            kind: ErrorKind::Startup(kind),
            ..self
        }
    }
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if !self.context.is_empty() {
            write!(f, " (")?;
            let mut first = true;
            for (key, value) in self.context.iter() {
                if !first {
                    write!(f, ", ")?;
                }
                write!(f, "{key}: {value}")?;
                first = false;
            }
            write!(f, ")")?;
        }

        Ok(())
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Startup(kind) => write!(f, "Startup error: {kind:?}"),
            ErrorKind::UserInput(kind) => write!(f, "Input error: {kind:?}"),
            ErrorKind::Client(kind) => write!(f, "Client error: {kind:?}"),
            ErrorKind::Watcher(kind) => write!(f, "Watcher error: {kind:?}"),
            ErrorKind::Config(kind) => write!(f, "Configuration error: {kind:?}"),
            ErrorKind::Io => write!(f, "I/O error"),
            ErrorKind::Internal => write!(f, "Internal error"),
        }
    }
}

impl std::error::Error for ShellError {}

impl From<std::io::Error> for ShellError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, format!("I/O error: {err}"))
    }
}

impl From<HalError> for ShellError {
    fn from(err: HalError) -> Self {
        match &err {
            HalError::Io(_) => Self::new(ErrorKind::Io, err.to_string()),
            HalError::Process(_) => {
                Self::new(ErrorKind::Client(ClientErrorKind::CommandFailed), err.to_string())
            }
            HalError::Watch(_) => {
                Self::new(ErrorKind::Watcher(WatcherErrorKind::Failed), err.to_string())
            }
            HalError::Unsupported(_) => {
                Self::new(ErrorKind::Watcher(WatcherErrorKind::Unavailable), err.to_string())
            }
            HalError::Invalid(_) => Self::new(ErrorKind::Internal, err.to_string()),
        }
    }
}

impl From<toml::de::Error> for ShellError {
    fn from(err: toml::de::Error) -> Self {
        Self::config(ConfigErrorKind::InvalidFormat, format!("invalid settings file: {err}"))
    }
}

impl From<serde_yaml::Error> for ShellError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::client(
            ClientErrorKind::CommandFailed,
            format!("unreadable configuration dump: {err}"),
        )
    }
}
