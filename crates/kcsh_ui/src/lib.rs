//! kcsh UI Library
//!
//! Terminal-facing pieces of a kcsh session: the context-aware prompt and
//! the cancellable line input the session reads from.

pub use line_editor::{LineSource, PipedLines, ReadOutcome, ScriptedLines, TerminalLineEditor};
pub use prompt::{render, Prompt, PromptEnv, PromptRenderer, PromptState};

pub mod line_editor;
pub mod prompt;

/// True when stdout is a terminal and `NO_COLOR` is unset
pub fn color_enabled() -> bool {
    use is_terminal::IsTerminal;
    std::env::var_os("NO_COLOR").is_none() && std::io::stdout().is_terminal()
}

/// True when stdin is a terminal, i.e. the interactive editor can be used
pub fn interactive_input() -> bool {
    use is_terminal::IsTerminal;
    std::io::stdin().is_terminal()
}
