//! Thin wrappers over `waitpid` for the two ways the shell observes children:
//! a non-blocking poll used for background jobs and a blocking wait used for
//! foreground commands and `fg`.

use crate::command::ExitCode;
use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::Pid;

/// What a `waitpid` call told us about one child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildStatus {
    /// Still running, no state change to report.
    Alive,
    /// Stopped by the given signal (usually SIGTSTP).
    Stopped(Signal),
    /// Resumed after a stop.
    Continued,
    /// Exited normally with the given code.
    Exited(i32),
    /// Terminated by the given signal.
    Killed(Signal),
    /// The child is no longer ours to wait for (already reaped elsewhere).
    Gone,
}

impl ChildStatus {
    /// True once the process can no longer run again.
    pub fn is_finished(self) -> bool {
        matches!(
            self,
            ChildStatus::Exited(_) | ChildStatus::Killed(_) | ChildStatus::Gone
        )
    }

    /// Shell-style exit status: the exit code, or 128 + signal number.
    pub fn exit_code(self) -> ExitCode {
        match self {
            ChildStatus::Exited(code) => code,
            ChildStatus::Killed(sig) | ChildStatus::Stopped(sig) => 128 + sig as i32,
            ChildStatus::Alive | ChildStatus::Continued => 0,
            ChildStatus::Gone => 127,
        }
    }

    fn from_wait_status(status: WaitStatus) -> Option<Self> {
        match status {
            WaitStatus::Exited(_, code) => Some(ChildStatus::Exited(code)),
            WaitStatus::Signaled(_, sig, _) => Some(ChildStatus::Killed(sig)),
            WaitStatus::Stopped(_, sig) => Some(ChildStatus::Stopped(sig)),
            WaitStatus::Continued(_) => Some(ChildStatus::Continued),
            WaitStatus::StillAlive => Some(ChildStatus::Alive),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

/// Checks on a child without blocking. Reaps it if it has finished.
pub fn poll(pid: Pid) -> nix::Result<ChildStatus> {
    let flags = WaitPidFlag::WNOHANG | WaitPidFlag::WUNTRACED | WaitPidFlag::WCONTINUED;
    loop {
        match waitpid(pid, Some(flags)) {
            Ok(status) => {
                if let Some(status) = ChildStatus::from_wait_status(status) {
                    return Ok(status);
                }
            }
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(ChildStatus::Gone),
            Err(e) => return Err(e),
        }
    }
}

/// Blocks until the child exits, is killed or stops.
///
/// Interrupted waits are retried, so a Ctrl-C aimed at the child never leaves
/// the shell waiting on nothing.
pub fn wait_for(pid: Pid) -> nix::Result<ChildStatus> {
    loop {
        match waitpid(pid, Some(WaitPidFlag::WUNTRACED)) {
            Ok(status) => match ChildStatus::from_wait_status(status) {
                Some(ChildStatus::Alive | ChildStatus::Continued) | None => continue,
                Some(status) => return Ok(status),
            },
            Err(Errno::EINTR) => continue,
            Err(Errno::ECHILD) => return Ok(ChildStatus::Gone),
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::kill;
    use std::process::Command;
    use std::thread;
    use std::time::{Duration, Instant};

    fn spawn(program: &str, args: &[&str]) -> Pid {
        let child = Command::new(program).args(args).spawn().expect("spawn");
        Pid::from_raw(child.id() as i32)
    }

    #[test]
    fn test_wait_for_reports_exit_code() {
        let pid = spawn("sh", &["-c", "exit 3"]);
        assert_eq!(wait_for(pid).unwrap(), ChildStatus::Exited(3));
    }

    #[test]
    fn test_wait_for_reaped_child_is_gone() {
        let pid = spawn("true", &[]);
        assert_eq!(wait_for(pid).unwrap(), ChildStatus::Exited(0));
        assert_eq!(wait_for(pid).unwrap(), ChildStatus::Gone);
    }

    #[test]
    fn test_poll_sees_running_then_finished() {
        let pid = spawn("sleep", &["0.3"]);
        assert_eq!(poll(pid).unwrap(), ChildStatus::Alive);

        let deadline = Instant::now() + Duration::from_secs(5);
        let status = loop {
            let status = poll(pid).unwrap();
            if status.is_finished() || Instant::now() > deadline {
                break status;
            }
            thread::sleep(Duration::from_millis(20));
        };
        assert_eq!(status, ChildStatus::Exited(0));
    }

    #[test]
    fn test_wait_for_returns_on_stop() {
        let pid = spawn("sleep", &["5"]);
        kill(pid, Signal::SIGSTOP).unwrap();
        assert_eq!(wait_for(pid).unwrap(), ChildStatus::Stopped(Signal::SIGSTOP));

        kill(pid, Signal::SIGKILL).unwrap();
        assert_eq!(wait_for(pid).unwrap(), ChildStatus::Killed(Signal::SIGKILL));
    }

    #[test]
    fn test_exit_code_mapping() {
        assert_eq!(ChildStatus::Exited(2).exit_code(), 2);
        assert_eq!(ChildStatus::Killed(Signal::SIGINT).exit_code(), 130);
        assert_eq!(ChildStatus::Stopped(Signal::SIGTSTP).exit_code(), 148);
    }
}
