use crate::parser::Command;
use crate::state::ShellState;
use anyhow::Result;
use std::io::Write;

/// Conventional process exit code type used by this crate.
///
/// A value of 0 indicates success; any non-zero value indicates failure.
/// Signals are folded in the POSIX way, as 128 plus the signal number.
pub type ExitCode = i32;

/// Object-safe trait for any command that can be executed by the shell.
///
/// This is implemented by built-ins via a blanket impl and by external commands.
pub trait ExecutableCommand {
    /// Executes the command.
    ///
    /// `stdout` is where built-ins write their output. External programs ignore it
    /// and inherit the shell's descriptor 1, redirected or not.
    fn execute(self: Box<Self>, stdout: &mut dyn Write, state: &mut ShellState)
    -> Result<ExitCode>;
}

/// Factory that tries to create a command from a parsed line.
///
/// Returns `None` when the factory doesn't recognize the command name.
pub trait CommandFactory {
    /// Attempt to create a command instance for the parsed command line.
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>>;
}
