use crate::command::{CommandFactory, ExecutableCommand, ExitCode};
use crate::config::ShellConfig;
use crate::error::ShellError;
use crate::external::ExternalCommand;
use crate::input::{LineReader, ReadOutcome};
use crate::parser;
use crate::state::ShellState;
use log::{debug, warn};
use std::io::Write;

/// Factory allows creating instances of ExecutableCommand.
///
/// Only supports commands defined in this crate, i.e. BuiltinCommand.
pub(crate) struct Factory<T> {
    _phantom: std::marker::PhantomData<T>,
}

impl<T> Default for Factory<T> {
    fn default() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// The interactive shell.
///
/// The interpreter owns a [`ShellState`] for its whole lifetime and a list of
/// [`CommandFactory`] objects that are queried, in order, to turn a parsed line
/// into something executable. A line no factory claims is launched as an
/// external program. See [`Default`] for the factories included out of the box.
///
/// Example
/// ```
/// use jobsh::Interpreter;
/// let mut sh = Interpreter::default();
/// assert_eq!(sh.run_line("true").unwrap(), 0);
/// assert_eq!(sh.run_line("   ").unwrap(), 0);
/// ```
pub struct Interpreter {
    config: ShellConfig,
    state: ShellState,
    commands: Vec<Box<dyn CommandFactory>>,
}

impl Interpreter {
    /// Create a new interpreter with a custom set of command factories.
    ///
    /// External programs are always available as the fallback.
    pub fn new(config: ShellConfig, commands: Vec<Box<dyn CommandFactory>>) -> Self {
        Self {
            state: ShellState::new(config.retention()),
            config,
            commands,
        }
    }

    /// Create an interpreter with the default commands and the given configuration.
    pub fn with_config(config: ShellConfig) -> Self {
        Self::new(config, default_factories())
    }

    pub fn state(&self) -> &ShellState {
        &self.state
    }

    /// Text shown before each line: the configured label and the working directory.
    pub fn prompt(&self) -> String {
        format!(
            "{} >> {}: ",
            self.config.prompt,
            self.state.current_dir.display()
        )
    }

    /// Parse and run one input line, with built-ins writing to standard output.
    pub fn run_line(&mut self, line: &str) -> anyhow::Result<ExitCode> {
        self.run_line_with_output(line, &mut std::io::stdout())
    }

    /// Parse and run one input line.
    ///
    /// A blank line is a no-op that succeeds. Built-ins write to `stdout`;
    /// external programs always inherit the process's descriptor 1.
    pub fn run_line_with_output(
        &mut self,
        line: &str,
        stdout: &mut dyn Write,
    ) -> anyhow::Result<ExitCode> {
        let Some(command) = parser::parse_line(line, self.config.max_args)
            .map_err(ShellError::from)?
        else {
            return Ok(0);
        };
        debug!("parsed {:?}", command);

        let cmd: Box<dyn ExecutableCommand> = match self
            .commands
            .iter()
            .find_map(|factory| factory.try_create(&command))
        {
            Some(builtin) => builtin,
            None => Box::new(ExternalCommand::new(&command)),
        };
        cmd.execute(stdout, &mut self.state)
    }

    /// Read-eval loop.
    ///
    /// Returns `Ok(())` after `exit` and [`ShellError::EndOfInput`] when the reader
    /// runs dry. Errors from individual lines are printed and the loop goes on.
    pub fn repl(&mut self, reader: &mut dyn LineReader) -> Result<(), ShellError> {
        while !self.state.should_exit {
            self.begin_iteration();

            match reader.read_line(&self.prompt())? {
                ReadOutcome::Line(line) => match self.run_line(&line) {
                    Ok(code) => debug!("status {}", code),
                    Err(e) => eprintln!("jobsh: {:#}", e),
                },
                ReadOutcome::Interrupted => println!(),
                ReadOutcome::Eof => {
                    self.begin_iteration();
                    return Err(ShellError::EndOfInput);
                }
            }
        }
        self.begin_iteration();
        Ok(())
    }

    // Runs unconditionally before every read: the previous line's redirection ends
    // here, and finished background jobs get reaped.
    fn begin_iteration(&mut self) {
        if let Err(e) = self.state.restore_output() {
            warn!("{}", e);
        }
        self.state.jobs.refresh();
    }
}

fn default_factories() -> Vec<Box<dyn CommandFactory>> {
    use crate::builtin::*;
    vec![
        Box::new(Factory::<Cd>::default()),
        Box::new(Factory::<Jobs>::default()),
        Box::new(Factory::<Fg>::default()),
        Box::new(Factory::<Exit>::default()),
    ]
}

impl Default for Interpreter {
    /// Create an interpreter with the default set of commands:
    /// - built-ins: `cd`, `jobs`, `fg`, `exit`
    /// - external programs for everything else
    fn default() -> Self {
        Self::with_config(ShellConfig::default())
    }
}
