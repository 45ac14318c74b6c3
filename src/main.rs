use jobsh::input::EditorReader;
use jobsh::{Interpreter, ShellConfig, ShellError, logging, signals};
use log::debug;
use std::process::ExitCode;

fn main() -> ExitCode {
    let config: ShellConfig = argh::from_env();
    logging::init(config.verbose);
    debug!("starting with {:?}", config);

    if let Err(e) = signals::install() {
        eprintln!("jobsh: {}", e);
        return ExitCode::FAILURE;
    }

    let mut reader = match EditorReader::new(!config.no_history) {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("jobsh: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut sh = Interpreter::with_config(config);
    match sh.repl(&mut reader) {
        Ok(()) => ExitCode::SUCCESS,
        Err(ShellError::EndOfInput) => {
            debug!("end of input");
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("jobsh: {}", e);
            ExitCode::FAILURE
        }
    }
}
