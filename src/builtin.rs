use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::error::ShellError;
use crate::interpreter::Factory;
use crate::jobs::{JobId, JobState};
use crate::parser::Command;
use crate::process;
use crate::state::ShellState;
use anyhow::Result;
use argh::{EarlyExit, FromArgs};
use log::{debug, warn};
use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use regex::Regex;
use std::env;
use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::LazyLock;

/// Built-in commands known to the shell at compile time.
///
/// Builtins are parsed using the [`argh`] crate (`FromArgs`) and executed directly
/// in the shell process without forking. They never honour output redirection.
pub(crate) trait BuiltinCommand: Sized + FromArgs {
    /// Canonical name of the command, e.g. "fg" or "cd".
    fn name() -> &'static str;

    /// Executes the command, writing any output to `stdout`.
    ///
    /// Return value should follow shell conventions: 0 for success, non-zero for error.
    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode>;
}

impl<T: BuiltinCommand> ExecutableCommand for T {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        state: &mut ShellState,
    ) -> Result<ExitCode> {
        match T::execute(*self, stdout, state) {
            Ok(x) => Ok(x),
            Err(e) => {
                eprintln!("{}: {:#}", T::name(), e);
                Ok(1)
            }
        }
    }
}

struct InvalidArgs {
    output: String,
    is_error: bool,
}

impl ExecutableCommand for InvalidArgs {
    fn execute(
        self: Box<Self>,
        stdout: &mut dyn Write,
        _state: &mut ShellState,
    ) -> Result<ExitCode> {
        if self.is_error {
            eprintln!("{}", self.output.trim_end());
        } else {
            writeln!(stdout, "{}", self.output.trim_end())?;
        }
        Ok(if self.is_error { 1 } else { 0 })
    }
}

impl<T: BuiltinCommand + 'static> CommandFactory for Factory<T> {
    fn try_create(&self, command: &Command) -> Option<Box<dyn ExecutableCommand>> {
        let name = command.name();
        if name != T::name() {
            return None;
        }
        if let Some(redirect) = &command.redirect {
            warn!(
                "{}: built-ins ignore output redirection to {}",
                name,
                redirect.path.display()
            );
        }
        if command.background {
            warn!("{}: built-ins always run in the foreground", name);
        }
        let args: Vec<&str> = command.args().iter().map(String::as_str).collect();
        Some(match T::from_args(&[name], &args) {
            Ok(cmd) => Box::new(cmd),
            Err(EarlyExit { output, status }) => Box::new(InvalidArgs {
                output,
                is_error: status.is_err(),
            }),
        })
    }
}

#[derive(FromArgs)]
/// Change the current working directory.
/// If no target is provided, changes to the directory specified by the HOME environment variable.
pub struct Cd {
    #[argh(positional)]
    /// directory to switch to; absolute or relative to the current directory. Defaults to $HOME when omitted.
    pub target: Option<String>,
}

impl BuiltinCommand for Cd {
    fn name() -> &'static str {
        "cd"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        let target = match &self.target {
            Some(t) if !t.is_empty() => PathBuf::from(t),
            _ => match state.get_var("HOME") {
                Some(home) => PathBuf::from(home),
                None => return Err(anyhow::anyhow!("no target and HOME not set")),
            },
        };

        let new_dir = if target.is_absolute() {
            target
        } else {
            state.current_dir.join(target)
        };

        let failed = |source| ShellError::DirectoryChangeFailed {
            path: new_dir.clone(),
            source,
        };
        let canonical = fs::canonicalize(&new_dir).map_err(failed)?;
        env::set_current_dir(&canonical).map_err(failed)?;

        debug!("cd: now in {}", canonical.display());
        state.current_dir = canonical;
        Ok(0)
    }
}

#[derive(FromArgs)]
/// List background jobs that are still running or stopped.
/// Jobs that have finished are dropped from the list.
pub struct Jobs {}

impl BuiltinCommand for Jobs {
    fn name() -> &'static str {
        "jobs"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        let jobs = state.jobs.list();
        writeln!(stdout, "ID\tName\tPID\tState")?;
        for job in jobs {
            writeln!(
                stdout,
                "[{}]\t{}\t{}\t{}",
                job.id, job.name, job.pid, job.state
            )?;
        }
        Ok(0)
    }
}

static JOB_SPEC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^%?([0-9]+)$").expect("valid job spec pattern"));

/// Parses `3` or `%3` into a job id.
fn parse_job_spec(spec: &str) -> Option<JobId> {
    let caps = JOB_SPEC.captures(spec)?;
    caps[1].parse().ok()
}

#[derive(FromArgs)]
/// Bring a background job to the foreground and wait until it exits or stops.
pub struct Fg {
    #[argh(positional)]
    /// job id as printed by `jobs`, optionally prefixed with %
    pub job: Option<String>,
}

impl BuiltinCommand for Fg {
    fn name() -> &'static str {
        "fg"
    }

    fn execute(self, stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        let spec = self
            .job
            .ok_or_else(|| anyhow::anyhow!("usage: fg <job id>"))?;
        let unknown = || ShellError::InvalidJobId(spec.clone());

        let id = parse_job_spec(&spec).ok_or_else(unknown)?;
        if !state.jobs.is_assigned(id) {
            return Err(unknown().into());
        }
        let job = state.jobs.get(id).cloned().ok_or_else(unknown)?;

        if job.state == JobState::Done {
            state.jobs.finish(id);
            writeln!(stdout, "[{}]\tDone\t{}", job.id, job.name)?;
            return Ok(0);
        }

        writeln!(stdout, "{}", job.name)?;
        stdout.flush()?;

        match kill(job.pid, Signal::SIGCONT) {
            Ok(()) | Err(Errno::ESRCH) => {}
            Err(e) => warn!("fg: cannot resume pid {}: {}", job.pid, e),
        }

        let status = process::wait_for(job.pid).map_err(ShellError::Wait)?;
        debug!("fg: job [{}] returned {:?}", id, status);
        if status.is_finished() {
            state.jobs.finish(id);
        } else {
            state.jobs.set_state(id, JobState::Stopped);
            eprintln!("\n[{}]\tStopped\t{}", id, job.name);
        }
        Ok(status.exit_code())
    }
}

#[derive(FromArgs)]
/// Exit the shell. Background jobs are left running.
pub struct Exit {
    #[argh(positional, greedy)]
    /// ignored; the shell always exits with status 0
    pub _args: Vec<String>,
}

impl BuiltinCommand for Exit {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(self, _stdout: &mut dyn Write, state: &mut ShellState) -> Result<ExitCode> {
        if !state.jobs.is_empty() {
            debug!("exit: leaving {} background job(s) behind", state.jobs.len());
        }
        state.should_exit = true;
        Ok(0)
    }
}
