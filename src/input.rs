//! Where command lines come from.

use crate::error::ShellError;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
#[cfg(test)]
use std::collections::VecDeque;

/// Result of asking for one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    Line(String),
    /// The user pressed the interrupt key while editing.
    Interrupted,
    /// No more input will ever arrive.
    Eof,
}

/// A source of command lines.
pub trait LineReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError>;
}

/// Interactive line editor backed by `rustyline`.
///
/// When standard input is not a terminal `rustyline` falls back to plain reads,
/// so the same reader serves piped scripts.
pub struct EditorReader {
    editor: DefaultEditor,
    history: bool,
}

impl EditorReader {
    pub fn new(history: bool) -> Result<Self, ShellError> {
        Ok(Self {
            editor: DefaultEditor::new()?,
            history,
        })
    }
}

impl LineReader for EditorReader {
    fn read_line(&mut self, prompt: &str) -> Result<ReadOutcome, ShellError> {
        match self.editor.readline(prompt) {
            Ok(line) => {
                if self.history && !line.trim().is_empty() {
                    self.editor.add_history_entry(line.as_str())?;
                }
                Ok(ReadOutcome::Line(line))
            }
            Err(ReadlineError::Interrupted) => Ok(ReadOutcome::Interrupted),
            Err(ReadlineError::Eof) => Ok(ReadOutcome::Eof),
            Err(err) => Err(err.into()),
        }
    }
}

/// Replays a fixed list of lines, then reports end of input.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ScriptReader {
    lines: VecDeque<String>,
    prompts: usize,
}

#[cfg(test)]
impl ScriptReader {
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
            prompts: 0,
        }
    }

    /// How many prompts have been shown so far.
    pub fn prompts(&self) -> usize {
        self.prompts
    }
}

#[cfg(test)]
impl LineReader for ScriptReader {
    fn read_line(&mut self, _prompt: &str) -> Result<ReadOutcome, ShellError> {
        self.prompts += 1;
        Ok(match self.lines.pop_front() {
            Some(line) => ReadOutcome::Line(line),
            None => ReadOutcome::Eof,
        })
    }
}
