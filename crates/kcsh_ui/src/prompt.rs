//! Prompt display for kcsh
//!
//! The prompt is the operator's base prompt, optionally prefixed with the
//! active context in parentheses. [`render`] is the pure core; the rest of
//! this module expands the base template and adds color for terminals.

use std::path::PathBuf;

use nu_ansi_term::{Color, Style};
use unicode_width::UnicodeWidthStr;

/// Whether the context prefix is shown, and for which context
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptState {
    enabled: bool,
    active_context: String,
}

impl PromptState {
    pub fn new(enabled: bool, active_context: impl Into<String>) -> Self {
        Self {
            enabled,
            active_context: active_context.into(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn active_context(&self) -> &str {
        &self.active_context
    }

    pub fn toggle(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn set_active_context(&mut self, name: impl Into<String>) {
        self.active_context = name.into();
    }
}

/// `"(<context>) " + base` when enabled, `base` otherwise
pub fn render(state: &PromptState, base: &str) -> String {
    if state.enabled {
        format!("({}) {base}", state.active_context)
    } else {
        base.to_string()
    }
}

/// A prompt ready for the line editor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    width: usize,
}

impl Prompt {
    pub fn plain(text: impl Into<String>) -> Self {
        let text = text.into();
        let width = UnicodeWidthStr::width(text.as_str());
        Self { text, width }
    }

    /// `styled` is what gets printed, `plain` the same text without escapes
    pub fn styled(styled: String, plain: &str) -> Self {
        Self {
            text: styled,
            width: UnicodeWidthStr::width(plain),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Columns the prompt occupies on screen
    pub fn width(&self) -> usize {
        self.width
    }
}

/// Facts the base prompt template can refer to
#[derive(Debug, Clone)]
pub struct PromptEnv {
    pub user: String,
    pub host: String,
    pub cwd: PathBuf,
    pub home: Option<PathBuf>,
}

impl PromptEnv {
    pub fn current() -> Self {
        let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
        Self {
            user: whoami::username(),
            host,
            cwd: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            home: dirs::home_dir(),
        }
    }

    fn is_root(&self) -> bool {
        self.user == "root"
    }

    fn tilde_cwd(&self) -> String {
        if let Some(home) = &self.home {
            if let Ok(rest) = self.cwd.strip_prefix(home) {
                if rest.as_os_str().is_empty() {
                    return "~".to_string();
                }
                return format!("~/{}", rest.display());
            }
        }
        self.cwd.display().to_string()
    }

    fn cwd_name(&self) -> String {
        if self.home.as_deref() == Some(self.cwd.as_path()) {
            return "~".to_string();
        }
        self.cwd
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.cwd.display().to_string())
    }
}

/// Expand `\u`, `\h`, `\w`, `\W`, `\$` and `\\`; other escapes stay literal
pub fn expand_template(template: &str, env: &PromptEnv) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut chars = template.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('u') => out.push_str(&env.user),
            Some('h') => out.push_str(env.host.split('.').next().unwrap_or(&env.host)),
            Some('w') => out.push_str(&env.tilde_cwd()),
            Some('W') => out.push_str(&env.cwd_name()),
            Some('$') => out.push(if env.is_root() { '#' } else { '$' }),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Builds the editor prompt from state and template
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    template: String,
    color: bool,
}

impl PromptRenderer {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
            color: false,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    pub fn base(&self, env: &PromptEnv) -> String {
        expand_template(&self.template, env)
    }

    pub fn prompt(&self, state: &PromptState, env: &PromptEnv) -> Prompt {
        let base = self.base(env);
        let plain = render(state, &base);
        if !self.color || !state.is_enabled() {
            return Prompt::plain(plain);
        }
        let context = Style::new().bold().fg(Color::Cyan).paint(state.active_context());
        Prompt::styled(format!("({context}) {base}"), &plain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> PromptEnv {
        PromptEnv {
            user: "op".to_string(),
            host: "bastion.example.com".to_string(),
            cwd: PathBuf::from("/home/op/deploy"),
            home: Some(PathBuf::from("/home/op")),
        }
    }

    #[test]
    fn render_prefixes_only_when_enabled() {
        assert_eq!(render(&PromptState::new(false, "x"), "$ "), "$ ");
        assert_eq!(render(&PromptState::new(true, "x"), "$ "), "(x) $ ");
    }

    #[test]
    fn toggling_twice_restores_the_state() {
        let mut state = PromptState::new(true, "prod");
        assert!(!state.toggle());
        assert!(state.toggle());
        assert!(state.is_enabled());
    }

    #[test]
    fn template_expansion() {
        let env = env();
        assert_eq!(expand_template("\\u@\\h:\\W\\$ ", &env), "op@bastion:deploy$ ");
        assert_eq!(expand_template("\\w> ", &env), "~/deploy> ");
        assert_eq!(expand_template("\\x\\\\", &env), "\\x\\");

        let root = PromptEnv {
            user: "root".to_string(),
            cwd: PathBuf::from("/home/op"),
            ..env
        };
        assert_eq!(expand_template("\\W\\$", &root), "~#");
    }

    #[test]
    fn colored_prompt_keeps_plain_width() {
        let renderer = PromptRenderer::new("\\$ ").with_color(true);
        let prompt = renderer.prompt(&PromptState::new(true, "prod"), &env());
        assert!(prompt.text().contains("prod"));
        assert_ne!(prompt.text(), "(prod) $ ");
        assert_eq!(prompt.width(), "(prod) $ ".len());

        let off = renderer.prompt(&PromptState::new(false, "prod"), &env());
        assert_eq!(off.text(), "$ ");
    }
}
