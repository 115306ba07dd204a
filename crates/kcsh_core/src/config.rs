//! Settings for kcsh
//!
//! Sources in increasing precedence: built-in defaults, the TOML file at
//! `<config dir>/kcsh/config.toml`, environment variables, command-line
//! flags. Flags are applied by the binary on top of what [`Settings::load`]
//! returns.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigErrorKind, ShellError, ShellResult};

pub const DEFAULT_KUBECTL: &str = "kubectl";
pub const DEFAULT_DEBOUNCE_MS: u64 = 150;
pub const DEFAULT_SHUTDOWN_GRACE_MS: u64 = 2000;
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\\u@\\h:\\W\\$ ";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Client program used for every context query and switch
    pub kubectl: String,
    /// Host shell running non-builtin lines; `$SHELL` when unset
    pub shell: Option<String>,
    pub prompt_enabled: bool,
    /// Base prompt; understands `\u`, `\h`, `\w`, `\W` and `\$`
    pub prompt_template: String,
    pub watch_enabled: bool,
    pub watch_debounce_ms: u64,
    pub shutdown_grace_ms: u64,
    pub log_level: Option<String>,
    pub log_file: Option<PathBuf>,
    /// Files to watch; derived from `KUBECONFIG` when empty
    pub watch_paths: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            kubectl: DEFAULT_KUBECTL.to_string(),
            shell: None,
            prompt_enabled: true,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            watch_enabled: true,
            watch_debounce_ms: DEFAULT_DEBOUNCE_MS,
            shutdown_grace_ms: DEFAULT_SHUTDOWN_GRACE_MS,
            log_level: None,
            log_file: None,
            watch_paths: Vec::new(),
        }
    }
}

impl Settings {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kcsh").join("config.toml"))
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> ShellResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            ShellError::config(
                ConfigErrorKind::Unreadable,
                format!("failed to read {}: {e}", path.display()),
            )
        })?;
        let settings: Self = toml::from_str(&content)
            .map_err(|e| ShellError::from(e).with_context("file", path.display().to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load the default file if present, then apply the process environment.
    ///
    /// A broken file is not fatal: defaults are used and the error is handed
    /// back so the caller can warn about it.
    pub fn load() -> (Self, Option<ShellError>) {
        let (mut settings, problem) = match Self::default_path() {
            Some(path) if path.exists() => match Self::load_from_file(&path) {
                Ok(settings) => (settings, None),
                Err(err) => (Self::default(), Some(err)),
            },
            _ => (Self::default(), None),
        };
        settings.apply_env(|key| std::env::var(key).ok());
        (settings, problem)
    }

    /// Apply `KCSH_KUBECTL`, `KCSH_LOG`, `SHELL` and `KUBECONFIG`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(kubectl) = lookup("KCSH_KUBECTL").filter(|v| !v.is_empty()) {
            self.kubectl = kubectl;
        }
        if let Some(level) = lookup("KCSH_LOG").filter(|v| !v.is_empty()) {
            self.log_level = Some(level);
        }
        if self.shell.is_none() {
            self.shell = lookup("SHELL").filter(|v| !v.is_empty());
        }
        if self.watch_paths.is_empty() {
            let home = lookup("HOME").map(PathBuf::from).or_else(dirs::home_dir);
            self.watch_paths = kubeconfig_paths(lookup("KUBECONFIG").as_deref(), home.as_deref());
        }
    }

    pub fn validate(&self) -> ShellResult<()> {
        if self.kubectl.trim().is_empty() {
            return Err(ShellError::config(
                ConfigErrorKind::InvalidValue,
                "kubectl must not be empty",
            ));
        }
        if self.shutdown_grace_ms == 0 {
            return Err(ShellError::config(
                ConfigErrorKind::InvalidValue,
                "shutdown_grace_ms must be positive",
            ));
        }
        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.watch_debounce_ms)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.shutdown_grace_ms)
    }

    pub fn host_shell(&self) -> &str {
        self.shell.as_deref().unwrap_or(kcsh_hal::DEFAULT_SHELL)
    }
}

/// Files named by `KUBECONFIG`, or `~/.kube/config` when it is unset or empty
pub fn kubeconfig_paths(kubeconfig: Option<&str>, home: Option<&Path>) -> Vec<PathBuf> {
    let listed: Vec<PathBuf> = kubeconfig
        .map(|value| {
            std::env::split_paths(value)
                .filter(|p| !p.as_os_str().is_empty())
                .collect()
        })
        .unwrap_or_default();
    if !listed.is_empty() {
        return listed;
    }
    home.map(|home| vec![home.join(".kube").join("config")])
        .unwrap_or_default()
}
