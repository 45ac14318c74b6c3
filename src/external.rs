use crate::command::{ExecutableCommand, ExitCode};
use crate::error::ShellError;
use crate::parser::{Command, RedirectSpec};
use crate::process::{self, ChildStatus};
use crate::redirect::OutputRedirect;
use crate::state::ShellState;
use anyhow::Result;
use log::{debug, info, warn};
use nix::errno::Errno;
use nix::libc;
use nix::unistd::{ForkResult, Pid, fork};
use std::ffi::{CString, c_char};
use std::io::{self, Write};
use std::ptr;

/// Command that is not a builtin: forked and replaced with the named program.
///
/// The interpreter falls back to this for every line no built-in claims.
pub struct ExternalCommand {
    argv: Vec<String>,
    background: bool,
    redirect: Option<RedirectSpec>,
}

impl ExternalCommand {
    pub fn new(command: &Command) -> Self {
        Self {
            argv: command.argv.clone(),
            background: command.background,
            redirect: command.redirect.clone(),
        }
    }

    fn name(&self) -> &str {
        &self.argv[0]
    }
}

impl ExecutableCommand for ExternalCommand {
    fn execute(
        self: Box<Self>,
        _stdout: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        // Everything that allocates happens before fork.
        let image = ExecImage::new(&self.argv)?;

        if let Some(spec) = &self.redirect {
            let redirect = OutputRedirect::apply(libc::STDOUT_FILENO, spec)?;
            state.hold_redirect(redirect)?;
        }

        let reservation = self
            .background
            .then(|| state.jobs.reserve(self.name()));

        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        // SAFETY: the child only calls execvp, writes an error and _exits.
        let forked = unsafe { fork() }.map_err(|e| {
            if let Some(reservation) = &reservation {
                warn!("job [{}] abandoned: fork failed", reservation.id());
            }
            ShellError::Fork(e)
        })?;
        match forked {
            ForkResult::Child => image.exec(),
            ForkResult::Parent { child } => match reservation {
                Some(reservation) => {
                    let id = state.jobs.insert(reservation.attach(child));
                    eprintln!("[{}] {}", id, child);
                    Ok(0)
                }
                None => wait_foreground(self.name(), child),
            },
        }
    }
}

/// Everything the child needs after fork, prepared while allocation is still safe.
struct ExecImage {
    // Owns the strings `argv_ptrs` points into.
    _argv: Vec<CString>,
    // NULL-terminated, as execvp expects.
    argv_ptrs: Vec<*const c_char>,
    not_found: Vec<u8>,
    error_prefix: Vec<u8>,
}

impl ExecImage {
    fn new(argv: &[String]) -> Result<Self, ShellError> {
        let argv = to_c_strings(argv)?;
        let argv_ptrs = argv
            .iter()
            .map(|arg| arg.as_ptr())
            .chain(std::iter::once(ptr::null()))
            .collect();
        let name = argv[0].to_string_lossy().into_owned();
        let error_prefix = format!("{}: ", name).into_bytes();
        let not_found = format!("{}\n", ShellError::UnknownProgram { name }).into_bytes();
        Ok(Self {
            _argv: argv,
            argv_ptrs,
            not_found,
            error_prefix,
        })
    }

    /// Replaces the child with the program, searching PATH. Never returns.
    ///
    /// Nothing here allocates: the pointer array and both messages already exist.
    fn exec(&self) -> ! {
        // SAFETY: every pointer refers to a live CString owned by `self`, and the
        // array ends with NULL.
        unsafe { libc::execvp(self.argv_ptrs[0], self.argv_ptrs.as_ptr()) };
        match Errno::last() {
            Errno::ENOENT => write_raw(&self.not_found),
            other => {
                write_raw(&self.error_prefix);
                write_raw(other.desc().as_bytes());
                write_raw(b"\n");
            }
        }
        // _exit skips atexit handlers and stdio buffers that belong to the shell.
        unsafe { libc::_exit(127) }
    }
}

fn to_c_strings(argv: &[String]) -> Result<Vec<CString>, ShellError> {
    argv.iter()
        .map(|arg| {
            CString::new(arg.as_str()).map_err(|_| ShellError::InvalidArgument(arg.clone()))
        })
        .collect()
}

// Unbuffered, lock-free write to stderr for use between fork and exec.
fn write_raw(bytes: &[u8]) {
    unsafe {
        libc::write(libc::STDERR_FILENO, bytes.as_ptr().cast(), bytes.len());
    }
}

fn wait_foreground(name: &str, child: Pid) -> Result<ExitCode> {
    let status = process::wait_for(child).map_err(ShellError::Wait)?;
    match status {
        ChildStatus::Stopped(sig) => {
            info!("{} (pid {}) stopped by {}", name, child, sig);
            eprintln!("\n[stopped]\t{}\t{}", name, child);
        }
        _ => debug!("{} (pid {}) finished: {:?}", name, child, status),
    }
    Ok(status.exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_line;
    use crate::process::ChildStatus;
    use std::time::{Duration, Instant};

    fn run(line: &str, state: &mut ShellState) -> ExitCode {
        let command = parse_line(line, 20).unwrap().unwrap();
        let cmd: Box<dyn ExecutableCommand> = Box::new(ExternalCommand::new(&command));
        cmd.execute(&mut Vec::new(), state).unwrap()
    }

    #[test]
    fn test_foreground_returns_exit_code() {
        let mut state = ShellState::default();
        assert_eq!(run("true", &mut state), 0);
        assert_eq!(run("false", &mut state), 1);
        assert!(state.jobs.is_empty());
    }

    #[test]
    fn test_unknown_program_only_fails_the_child() {
        let mut state = ShellState::default();
        assert_eq!(run("definitely-not-a-real-program-1234", &mut state), 127);
        assert!(!state.should_exit);
    }

    #[test]
    fn test_foreground_blocks_until_child_exits() {
        let mut state = ShellState::default();
        let started = Instant::now();
        assert_eq!(run("sleep 0.3", &mut state), 0);
        assert!(started.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_stopped_foreground_command_returns_without_a_job() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("stop.sh");
        let pid_file = dir.path().join("pid");
        std::fs::write(
            &script,
            format!("echo $$ > {}\nkill -STOP $$\n", pid_file.display()),
        )
        .unwrap();

        let mut state = ShellState::default();
        let code = run(&format!("sh {}", script.display()), &mut state);

        assert_eq!(code, 128 + nix::sys::signal::Signal::SIGSTOP as i32);
        assert!(state.jobs.is_empty());

        let pid: i32 = std::fs::read_to_string(&pid_file)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        let pid = Pid::from_raw(pid);
        let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGKILL);
        let _ = process::wait_for(pid);
    }

    #[test]
    fn test_exec_image_is_null_terminated() {
        let image = ExecImage::new(&["echo".to_string(), "hi".to_string()]).unwrap();
        assert_eq!(image.argv_ptrs.len(), 3);
        assert!(image.argv_ptrs[2].is_null());
        assert_eq!(image.not_found, b"echo: command not found\n");
    }

    #[test]
    fn test_background_records_jobs_in_order() {
        let mut state = ShellState::default();
        let started = Instant::now();
        for _ in 0..3 {
            assert_eq!(run("sleep 5 &", &mut state), 0);
        }
        assert!(started.elapsed() < Duration::from_secs(3));

        let ids: Vec<_> = state.jobs.iter().map(|job| job.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        for job in state.jobs.iter() {
            assert_eq!(job.name, "sleep");
            let _ = nix::sys::signal::kill(job.pid, nix::sys::signal::Signal::SIGKILL);
            assert_eq!(
                process::wait_for(job.pid).unwrap(),
                ChildStatus::Killed(nix::sys::signal::Signal::SIGKILL)
            );
        }
    }

    #[test]
    fn test_nul_byte_is_rejected_before_fork() {
        let err = to_c_strings(&["echo".to_string(), "a\0b".to_string()]).unwrap_err();
        assert!(matches!(err, ShellError::InvalidArgument(_)));
    }
}
