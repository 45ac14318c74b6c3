use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

/// Level used when `--verbose` is not given.
pub const DEFAULT_LEVEL: LevelFilter = LevelFilter::Warn;

pub fn level_for(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        DEFAULT_LEVEL
    }
}

/// Sends `log` records to standard error.
///
/// Best-effort: if a logger is already installed the call is a no-op.
pub fn init(verbose: bool) {
    let _ = TermLogger::init(
        level_for(verbose),
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    );
}
