use crate::error::ShellError;
use crate::jobs::{JobTable, RetentionPolicy};
use crate::redirect::OutputRedirect;
use std::env as stdenv;
use std::path::PathBuf;

/// Mutable interpreter state threaded through every loop iteration.
///
/// The state contains:
/// - `current_dir`: the working directory shown in the prompt and changed by `cd`.
/// - `should_exit`: set by `exit`; the loop stops before reading another line.
/// - `jobs`: the background job registry, created once for the shell's lifetime.
/// - a pending output redirection, restored at the start of the next iteration.
#[derive(Debug)]
pub struct ShellState {
    pub current_dir: PathBuf,
    pub should_exit: bool,
    pub jobs: JobTable,
    pending_redirect: Option<OutputRedirect>,
}

impl ShellState {
    /// Starts in the process's working directory with an empty job table.
    pub fn new(retention: RetentionPolicy) -> Self {
        let current_dir = stdenv::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self {
            current_dir,
            should_exit: false,
            jobs: JobTable::new(retention),
            pending_redirect: None,
        }
    }

    /// Get the value of an environment variable of the shell process.
    pub fn get_var(&self, key: &str) -> Option<String> {
        stdenv::var(key).ok()
    }

    /// Keeps a redirection alive until the next [`restore_output`](Self::restore_output).
    ///
    /// Any redirection still pending is restored first.
    pub fn hold_redirect(&mut self, redirect: OutputRedirect) -> Result<(), ShellError> {
        self.restore_output()?;
        self.pending_redirect = Some(redirect);
        Ok(())
    }

    /// Puts standard output back if a redirection is pending. A no-op otherwise.
    pub fn restore_output(&mut self) -> Result<(), ShellError> {
        match self.pending_redirect.take() {
            Some(redirect) => redirect.restore(),
            None => Ok(()),
        }
    }
}

impl Default for ShellState {
    fn default() -> Self {
        Self::new(RetentionPolicy::default())
    }
}
