//! Line input for kcsh sessions
//!
//! A session must give up its prompt as soon as the supervisor asks, which a
//! blocking readline cannot do. Every [`LineSource`] therefore waits in
//! short slices and checks the session's cancellation token in between.
//!
//! [`TerminalLineEditor`] is a small emacs-style editor on top of crossterm's
//! raw mode. [`PipedLines`] serves non-interactive stdin and
//! [`ScriptedLines`] serves tests.

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};
use std::sync::mpsc;
use std::time::Duration;

use crossterm::cursor::{MoveTo, MoveToColumn};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::style::Print;
use crossterm::terminal::{self, Clear, ClearType};
use crossterm::queue;
use kcsh_core::Notices;
use tokio_util::sync::CancellationToken;
use unicode_width::UnicodeWidthChar;

use crate::prompt::Prompt;

const POLL_INTERVAL: Duration = Duration::from_millis(50);
const DEFAULT_HISTORY: usize = 1000;

/// Result of one read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// Ctrl-C; the partial line was discarded
    Interrupted,
    /// End of input
    Eof,
    /// The session's cancellation token fired
    Cancelled,
}

pub trait LineSource: Send {
    /// Show `prompt` and read one line, printing queued notices as they arrive
    fn read_line(
        &mut self,
        prompt: &Prompt,
        notices: &mut Notices,
        cancel: &CancellationToken,
    ) -> io::Result<ReadOutcome>;
}

/// Text being edited and the cursor position in it
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LineBuffer {
    chars: Vec<char>,
    cursor: usize,
}

impl LineBuffer {
    pub fn text(&self) -> String {
        self.chars.iter().collect()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn set(&mut self, text: &str) {
        self.chars = text.chars().collect();
        self.cursor = self.chars.len();
    }

    pub fn insert(&mut self, ch: char) {
        self.chars.insert(self.cursor, ch);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.chars.remove(self.cursor);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.chars.len() {
            self.chars.remove(self.cursor);
        }
    }

    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.chars.len());
    }

    pub fn home(&mut self) {
        self.cursor = 0;
    }

    pub fn end(&mut self) {
        self.cursor = self.chars.len();
    }

    pub fn kill_to_start(&mut self) {
        self.chars.drain(..self.cursor);
        self.cursor = 0;
    }

    pub fn kill_to_end(&mut self) {
        self.chars.truncate(self.cursor);
    }

    /// Ctrl-W: remove the word before the cursor and the blanks after it
    pub fn delete_word_back(&mut self) {
        let mut start = self.cursor;
        while start > 0 && self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        while start > 0 && !self.chars[start - 1].is_whitespace() {
            start -= 1;
        }
        self.chars.drain(start..self.cursor);
        self.cursor = start;
    }

    /// Display columns between the start of the line and the cursor
    pub fn width_before_cursor(&self) -> usize {
        self.chars[..self.cursor]
            .iter()
            .map(|c| c.width().unwrap_or(0))
            .sum()
    }
}

/// In-memory history with Up/Down navigation
#[derive(Debug, Clone)]
pub struct History {
    entries: Vec<String>,
    max: usize,
    position: Option<usize>,
    stash: String,
}

impl Default for History {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_HISTORY)
    }
}

impl History {
    pub fn with_capacity(max: usize) -> Self {
        Self {
            entries: Vec::new(),
            max: max.max(1),
            position: None,
            stash: String::new(),
        }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Record a submitted line; blank lines and repeats are skipped
    pub fn push(&mut self, line: &str) {
        self.position = None;
        if line.trim().is_empty() || self.entries.last().map(String::as_str) == Some(line) {
            return;
        }
        if self.entries.len() == self.max {
            self.entries.remove(0);
        }
        self.entries.push(line.to_string());
    }

    pub fn reset(&mut self) {
        self.position = None;
        self.stash.clear();
    }

    /// Older entry; `current` is kept so Down can return to it
    pub fn older(&mut self, current: &str) -> Option<&str> {
        let next = match self.position {
            None if self.entries.is_empty() => return None,
            None => {
                self.stash = current.to_string();
                self.entries.len() - 1
            }
            Some(0) => 0,
            Some(pos) => pos - 1,
        };
        self.position = Some(next);
        Some(&self.entries[next])
    }

    /// Newer entry, or the stashed line once past the newest
    pub fn newer(&mut self) -> Option<&str> {
        let pos = self.position?;
        if pos + 1 < self.entries.len() {
            self.position = Some(pos + 1);
            Some(&self.entries[pos + 1])
        } else {
            self.position = None;
            Some(&self.stash)
        }
    }
}

/// What a key press asks the editor to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Redraw,
    Submit,
    Interrupt,
    Eof,
    ClearScreen,
    Ignore,
}

/// Apply one key press to the buffer
pub fn apply_key(key: KeyEvent, buffer: &mut LineBuffer, history: &mut History) -> KeyAction {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Char('c') if ctrl => KeyAction::Interrupt,
        KeyCode::Char('d') if ctrl => {
            if buffer.is_empty() {
                return KeyAction::Eof;
            }
            buffer.delete();
            KeyAction::Redraw
        }
        KeyCode::Char('l') if ctrl => KeyAction::ClearScreen,
        KeyCode::Char('a') if ctrl => {
            buffer.home();
            KeyAction::Redraw
        }
        KeyCode::Char('e') if ctrl => {
            buffer.end();
            KeyAction::Redraw
        }
        KeyCode::Char('b') if ctrl => {
            buffer.left();
            KeyAction::Redraw
        }
        KeyCode::Char('f') if ctrl => {
            buffer.right();
            KeyAction::Redraw
        }
        KeyCode::Char('u') if ctrl => {
            buffer.kill_to_start();
            KeyAction::Redraw
        }
        KeyCode::Char('k') if ctrl => {
            buffer.kill_to_end();
            KeyAction::Redraw
        }
        KeyCode::Char('w') if ctrl => {
            buffer.delete_word_back();
            KeyAction::Redraw
        }
        KeyCode::Char('p') if ctrl => recall_previous(buffer, history),
        KeyCode::Char('n') if ctrl => recall_next(buffer, history),
        KeyCode::Char(_) if ctrl || key.modifiers.contains(KeyModifiers::ALT) => KeyAction::Ignore,
        KeyCode::Char(ch) => {
            buffer.insert(ch);
            KeyAction::Redraw
        }
        KeyCode::Backspace => {
            buffer.backspace();
            KeyAction::Redraw
        }
        KeyCode::Delete => {
            buffer.delete();
            KeyAction::Redraw
        }
        KeyCode::Left => {
            buffer.left();
            KeyAction::Redraw
        }
        KeyCode::Right => {
            buffer.right();
            KeyAction::Redraw
        }
        KeyCode::Home => {
            buffer.home();
            KeyAction::Redraw
        }
        KeyCode::End => {
            buffer.end();
            KeyAction::Redraw
        }
        KeyCode::Up => recall_previous(buffer, history),
        KeyCode::Down => recall_next(buffer, history),
        _ => KeyAction::Ignore,
    }
}

fn recall_previous(buffer: &mut LineBuffer, history: &mut History) -> KeyAction {
    let current = buffer.text();
    match history.older(&current) {
        Some(entry) => {
            buffer.set(entry);
            KeyAction::Redraw
        }
        None => KeyAction::Ignore,
    }
}

fn recall_next(buffer: &mut LineBuffer, history: &mut History) -> KeyAction {
    match history.newer() {
        Some(entry) => {
            buffer.set(entry);
            KeyAction::Redraw
        }
        None => KeyAction::Ignore,
    }
}

/// Leaves raw mode when dropped, including on early returns
struct RawMode;

impl RawMode {
    fn enable() -> io::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

/// Interactive editor for a terminal on stdin/stdout
#[derive(Debug, Default)]
pub struct TerminalLineEditor {
    history: History,
}

impl TerminalLineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    fn redraw(out: &mut impl Write, prompt: &Prompt, buffer: &LineBuffer) -> io::Result<()> {
        let column = prompt.width() + buffer.width_before_cursor();
        queue!(
            out,
            MoveToColumn(0),
            Print(prompt.text()),
            Print(buffer.text()),
            Clear(ClearType::UntilNewLine),
            MoveToColumn(u16::try_from(column).unwrap_or(u16::MAX))
        )?;
        out.flush()
    }

    fn print_notices(out: &mut impl Write, pending: Vec<String>) -> io::Result<()> {
        queue!(out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        for notice in pending {
            queue!(out, Print(notice), Print("\r\n"))?;
        }
        Ok(())
    }

    fn finish(out: &mut impl Write, tail: &str) -> io::Result<()> {
        queue!(out, Print(tail))?;
        out.flush()
    }
}

impl LineSource for TerminalLineEditor {
    fn read_line(
        &mut self,
        prompt: &Prompt,
        notices: &mut Notices,
        cancel: &CancellationToken,
    ) -> io::Result<ReadOutcome> {
        let mut out = io::stdout();
        let _raw = RawMode::enable()?;
        let mut buffer = LineBuffer::default();
        self.history.reset();

        let pending = notices.drain();
        if !pending.is_empty() {
            Self::print_notices(&mut out, pending)?;
        }
        Self::redraw(&mut out, prompt, &buffer)?;

        loop {
            if cancel.is_cancelled() {
                Self::finish(&mut out, "\r\n")?;
                return Ok(ReadOutcome::Cancelled);
            }

            let pending = notices.drain();
            if !pending.is_empty() {
                Self::print_notices(&mut out, pending)?;
                Self::redraw(&mut out, prompt, &buffer)?;
            }

            if !event::poll(POLL_INTERVAL)? {
                continue;
            }
            let key = match event::read()? {
                Event::Key(key) if key.kind != KeyEventKind::Release => key,
                Event::Resize(..) => {
                    Self::redraw(&mut out, prompt, &buffer)?;
                    continue;
                }
                _ => continue,
            };

            match apply_key(key, &mut buffer, &mut self.history) {
                KeyAction::Redraw => Self::redraw(&mut out, prompt, &buffer)?,
                KeyAction::Ignore => {}
                KeyAction::ClearScreen => {
                    queue!(out, Clear(ClearType::All), MoveTo(0, 0))?;
                    Self::redraw(&mut out, prompt, &buffer)?;
                }
                KeyAction::Interrupt => {
                    Self::finish(&mut out, "^C\r\n")?;
                    return Ok(ReadOutcome::Interrupted);
                }
                KeyAction::Eof => {
                    Self::finish(&mut out, "\r\n")?;
                    return Ok(ReadOutcome::Eof);
                }
                KeyAction::Submit => {
                    Self::finish(&mut out, "\r\n")?;
                    let line = buffer.text();
                    self.history.push(&line);
                    return Ok(ReadOutcome::Line(line));
                }
            }
        }
    }
}

/// Lines from a non-interactive reader, normally piped stdin.
///
/// A background thread does the blocking reads; the session waits on a
/// channel in short slices so that it stays cancellable.
pub struct PipedLines {
    rx: mpsc::Receiver<io::Result<String>>,
}

impl PipedLines {
    pub fn stdin() -> Self {
        Self::from_reader(io::BufReader::new(io::stdin()))
    }

    pub fn from_reader<R: BufRead + Send + 'static>(reader: R) -> Self {
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            for line in reader.lines() {
                let failed = line.is_err();
                if tx.send(line).is_err() || failed {
                    break;
                }
            }
        });
        Self { rx }
    }
}

impl LineSource for PipedLines {
    fn read_line(
        &mut self,
        _prompt: &Prompt,
        notices: &mut Notices,
        cancel: &CancellationToken,
    ) -> io::Result<ReadOutcome> {
        loop {
            for notice in notices.drain() {
                eprintln!("{notice}");
            }
            if cancel.is_cancelled() {
                return Ok(ReadOutcome::Cancelled);
            }
            match self.rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(line)) => return Ok(ReadOutcome::Line(line)),
                Ok(Err(err)) => return Err(err),
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => return Ok(ReadOutcome::Eof),
            }
        }
    }
}

/// Canned input for tests; records every prompt and notice it was shown
#[derive(Debug, Default)]
pub struct ScriptedLines {
    script: VecDeque<ReadOutcome>,
    prompts: Vec<String>,
    notices: Vec<String>,
}

impl ScriptedLines {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            script: lines.into_iter().map(|l| ReadOutcome::Line(l.into())).collect(),
            ..Self::default()
        }
    }

    /// Queue an arbitrary outcome after the lines already scripted
    pub fn then(mut self, outcome: ReadOutcome) -> Self {
        self.script.push_back(outcome);
        self
    }

    pub fn prompts(&self) -> &[String] {
        &self.prompts
    }

    pub fn notices(&self) -> &[String] {
        &self.notices
    }
}

impl LineSource for ScriptedLines {
    fn read_line(
        &mut self,
        prompt: &Prompt,
        notices: &mut Notices,
        cancel: &CancellationToken,
    ) -> io::Result<ReadOutcome> {
        self.notices.extend(notices.drain());
        self.prompts.push(prompt.text().to_string());
        if cancel.is_cancelled() {
            return Ok(ReadOutcome::Cancelled);
        }
        Ok(self.script.pop_front().unwrap_or(ReadOutcome::Eof))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn ctrl(ch: char) -> KeyEvent {
        KeyEvent::new(KeyCode::Char(ch), KeyModifiers::CONTROL)
    }

    fn type_text(text: &str, buffer: &mut LineBuffer, history: &mut History) {
        for ch in text.chars() {
            apply_key(key(KeyCode::Char(ch)), buffer, history);
        }
    }

    #[test]
    fn editing_in_the_middle_of_a_line() {
        let (mut buffer, mut history) = (LineBuffer::default(), History::default());
        type_text("contxt", &mut buffer, &mut history);
        for _ in 0..2 {
            apply_key(key(KeyCode::Left), &mut buffer, &mut history);
        }
        apply_key(key(KeyCode::Char('e')), &mut buffer, &mut history);
        assert_eq!(buffer.text(), "context");
        assert_eq!(buffer.cursor(), 5);

        apply_key(ctrl('a'), &mut buffer, &mut history);
        apply_key(key(KeyCode::Delete), &mut buffer, &mut history);
        assert_eq!(buffer.text(), "ontext");
    }

    #[test]
    fn kill_commands() {
        let (mut buffer, mut history) = (LineBuffer::default(), History::default());
        type_text("context select  ", &mut buffer, &mut history);
        apply_key(ctrl('w'), &mut buffer, &mut history);
        assert_eq!(buffer.text(), "context ");

        apply_key(ctrl('a'), &mut buffer, &mut history);
        apply_key(ctrl('k'), &mut buffer, &mut history);
        assert!(buffer.is_empty());

        type_text("prompt off", &mut buffer, &mut history);
        apply_key(ctrl('u'), &mut buffer, &mut history);
        assert!(buffer.is_empty());
    }

    #[test]
    fn ctrl_d_is_eof_only_on_an_empty_line() {
        let (mut buffer, mut history) = (LineBuffer::default(), History::default());
        assert_eq!(apply_key(ctrl('d'), &mut buffer, &mut history), KeyAction::Eof);
        type_text("ab", &mut buffer, &mut history);
        apply_key(key(KeyCode::Home), &mut buffer, &mut history);
        assert_eq!(apply_key(ctrl('d'), &mut buffer, &mut history), KeyAction::Redraw);
        assert_eq!(buffer.text(), "b");
        assert_eq!(apply_key(ctrl('c'), &mut buffer, &mut history), KeyAction::Interrupt);
    }

    #[test]
    fn history_navigation_restores_the_draft() {
        let (mut buffer, mut history) = (LineBuffer::default(), History::default());
        history.push("context list");
        history.push("prompt off");
        history.push("prompt off");
        history.push("   ");
        assert_eq!(history.entries().len(), 2);

        type_text("draft", &mut buffer, &mut history);
        apply_key(key(KeyCode::Up), &mut buffer, &mut history);
        assert_eq!(buffer.text(), "prompt off");
        apply_key(key(KeyCode::Up), &mut buffer, &mut history);
        apply_key(key(KeyCode::Up), &mut buffer, &mut history);
        assert_eq!(buffer.text(), "context list");
        apply_key(key(KeyCode::Down), &mut buffer, &mut history);
        apply_key(key(KeyCode::Down), &mut buffer, &mut history);
        assert_eq!(buffer.text(), "draft");
        assert_eq!(apply_key(key(KeyCode::Down), &mut buffer, &mut history), KeyAction::Ignore);
    }

    #[test]
    fn history_is_capped() {
        let mut history = History::with_capacity(2);
        for line in ["a", "b", "c"] {
            history.push(line);
        }
        assert_eq!(history.entries(), ["b", "c"]);
    }

    #[test]
    fn wide_characters_count_double() {
        let mut buffer = LineBuffer::default();
        buffer.set("本番");
        assert_eq!(buffer.width_before_cursor(), 4);
    }

    #[test]
    fn piped_lines_end_with_eof() {
        let (_tx, mut notices) = Notices::channel();
        let cancel = CancellationToken::new();
        let prompt = Prompt::plain("$ ");
        let mut source = PipedLines::from_reader(io::Cursor::new("context\nprompt off\n"));

        let mut read = || source.read_line(&prompt, &mut notices, &cancel).unwrap();
        assert_eq!(read(), ReadOutcome::Line("context".to_string()));
        assert_eq!(read(), ReadOutcome::Line("prompt off".to_string()));
        assert_eq!(read(), ReadOutcome::Eof);
    }

    #[test]
    fn cancelled_read_returns_promptly() {
        let (_tx, mut notices) = Notices::channel();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut source = PipedLines::from_reader(io::Cursor::new("context\n"));
        let outcome = source
            .read_line(&Prompt::plain(""), &mut notices, &cancel)
            .unwrap();
        assert_eq!(outcome, ReadOutcome::Cancelled);
    }

    #[test]
    fn scripted_lines_record_prompts_and_notices() {
        let (tx, mut notices) = Notices::channel();
        tx.send("kcsh: restarted".to_string()).unwrap();
        let cancel = CancellationToken::new();
        let mut source = ScriptedLines::new(["context"]).then(ReadOutcome::Interrupted);

        let prompt = Prompt::plain("(prod) $ ");
        assert_eq!(
            source.read_line(&prompt, &mut notices, &cancel).unwrap(),
            ReadOutcome::Line("context".to_string())
        );
        assert_eq!(
            source.read_line(&prompt, &mut notices, &cancel).unwrap(),
            ReadOutcome::Interrupted
        );
        assert_eq!(source.read_line(&prompt, &mut notices, &cancel).unwrap(), ReadOutcome::Eof);
        assert_eq!(source.prompts().len(), 3);
        assert_eq!(source.notices(), ["kcsh: restarted"]);
    }
}
