//! A small interactive shell with background jobs and output redirection.
//!
//! The crate is organised around an [`Interpreter`] that reads one line at a time,
//! turns it into a [`parser::Command`] and either runs one of the built-ins
//! (`cd`, `jobs`, `fg`, `exit`) in-process or forks and execs an external program.
//! Background programs are tracked in a [`jobs::JobTable`] that lives as long as
//! the interpreter, and a single `> file` redirection may be attached to any
//! external command.
//!
//! The binary installs the handlers from [`signals`] before the first fork so that
//! Ctrl-C never terminates the shell itself.

mod builtin;
pub mod command;
pub mod config;
pub mod error;
mod external;
pub mod input;
mod interpreter;
pub mod jobs;
pub mod lexer;
pub mod logging;
pub mod parser;
pub mod process;
pub mod redirect;
pub mod signals;
pub mod state;

pub use config::ShellConfig;
pub use error::ShellError;
/// Just a convenient re-export of the interactive command runner.
///
/// See [`Interpreter`] for the high-level API.
pub use interpreter::Interpreter;
