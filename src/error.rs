use crate::parser::ParsingError;
use rustyline::error::ReadlineError;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Every failure the shell knows how to name.
///
/// Only [`ShellError::EndOfInput`], [`ShellError::Readline`] and
/// [`ShellError::SignalSetup`] end the interpreter. Everything else is reported
/// and the loop reads the next line. [`ShellError::UnknownProgram`] is only ever
/// reported by a forked child whose exec failed.
#[derive(Debug, Error)]
pub enum ShellError {
    #[error("end of input")]
    EndOfInput,

    #[error("{}: {source}", .path.display())]
    DirectoryChangeFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: cannot open for writing: {source}", .path.display())]
    RedirectionOpenFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to redirect standard output: {0}")]
    Redirect(#[source] nix::Error),

    #[error("{name}: command not found")]
    UnknownProgram { name: String },

    #[error("no such job: {0}")]
    InvalidJobId(String),

    #[error(transparent)]
    Parse(#[from] ParsingError),

    #[error("argument contains a nul byte: {0:?}")]
    InvalidArgument(String),

    #[error("fork failed: {0}")]
    Fork(#[source] nix::Error),

    #[error("wait failed: {0}")]
    Wait(#[source] nix::Error),

    #[error("failed to install signal handlers: {0}")]
    SignalSetup(#[source] nix::Error),

    #[error("line editor: {0}")]
    Readline(#[from] ReadlineError),
}
