//! Process-wide handlers for SIGINT and SIGTSTP.
//!
//! Handlers survive `fork` but are reset by a successful `exec`, so a handler can
//! run in exactly two kinds of process: the shell itself, or a child caught in the
//! window between `fork` and `exec`. [`ProcessRole::current`] tells the two apart
//! and [`transition`] decides what each of them does with each signal.

use crate::error::ShellError;
use nix::libc;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd::{Pid, getpid};
use std::sync::atomic::{AtomicI32, Ordering};

// Written once by `record_shell_identity`, read-only afterwards.
static SHELL_PID: AtomicI32 = AtomicI32::new(0);

/// Which process a signal handler is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessRole {
    /// The interactive shell.
    Shell,
    /// A forked child that has not yet replaced itself with `exec`.
    ForkedPreExec,
}

impl ProcessRole {
    /// Compares the calling process to the recorded shell pid.
    ///
    /// Before the identity is recorded every process counts as the shell.
    pub fn current() -> Self {
        Self::of(getpid())
    }

    fn of(pid: Pid) -> Self {
        match SHELL_PID.load(Ordering::Acquire) {
            0 => ProcessRole::Shell,
            shell if shell == pid.as_raw() => ProcessRole::Shell,
            _ => ProcessRole::ForkedPreExec,
        }
    }
}

/// What a handler does in response to a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// Print a newline on stderr and return to whatever was interrupted.
    ///
    /// Stdout may still point at a redirect target while a foreground command
    /// runs, so the echo never goes there.
    EchoNewline,
    /// Terminate the current process with a success status.
    ExitChild,
    /// Do nothing.
    Ignore,
}

/// The handler's transition table.
pub fn transition(role: ProcessRole, signal: Signal) -> SignalAction {
    match (role, signal) {
        (ProcessRole::Shell, Signal::SIGINT) => SignalAction::EchoNewline,
        (ProcessRole::Shell, Signal::SIGTSTP) => SignalAction::EchoNewline,
        (ProcessRole::ForkedPreExec, Signal::SIGINT) => SignalAction::ExitChild,
        (ProcessRole::ForkedPreExec, _) => SignalAction::Ignore,
        (ProcessRole::Shell, _) => SignalAction::Ignore,
    }
}

/// Records the calling process as the shell. Only the first call has an effect.
pub fn record_shell_identity() -> Pid {
    let me = getpid();
    let _ = SHELL_PID.compare_exchange(0, me.as_raw(), Ordering::AcqRel, Ordering::Acquire);
    Pid::from_raw(SHELL_PID.load(Ordering::Acquire))
}

// Only async-signal-safe calls in here: getpid, write and _exit.
extern "C" fn on_signal(raw: libc::c_int) {
    let Ok(signal) = Signal::try_from(raw) else {
        return;
    };
    match transition(ProcessRole::current(), signal) {
        SignalAction::ExitChild => unsafe { libc::_exit(libc::EXIT_SUCCESS) },
        SignalAction::EchoNewline => {
            let newline = b"\n";
            unsafe {
                libc::write(libc::STDERR_FILENO, newline.as_ptr().cast(), newline.len());
            }
        }
        SignalAction::Ignore => {}
    }
}

/// Records the shell identity and installs the SIGINT and SIGTSTP handlers.
///
/// Must run once at startup, before the first child is forked. Interrupted
/// system calls are restarted so a Ctrl-C does not abort a pending read or wait.
pub fn install() -> Result<(), ShellError> {
    record_shell_identity();
    let action = SigAction::new(
        SigHandler::Handler(on_signal),
        SaFlags::SA_RESTART,
        SigSet::empty(),
    );
    for signal in [Signal::SIGINT, Signal::SIGTSTP] {
        unsafe { sigaction(signal, &action) }.map_err(ShellError::SignalSetup)?;
    }
    log::debug!("signal handlers installed for shell pid {}", getpid());
    Ok(())
}
