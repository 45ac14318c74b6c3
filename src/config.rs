use crate::jobs::RetentionPolicy;
use argh::FromArgs;

/// Default bound on the number of words (program name included) in one command.
pub const DEFAULT_MAX_ARGS: usize = 20;

/// Default label shown in front of the working directory in the prompt.
pub const DEFAULT_PROMPT: &str = "jobsh";

fn default_prompt() -> String {
    DEFAULT_PROMPT.to_string()
}

#[derive(FromArgs, Debug, Clone, PartialEq, Eq)]
/// A small interactive shell with background jobs and output redirection.
pub struct ShellConfig {
    #[argh(option, default = "DEFAULT_MAX_ARGS")]
    /// maximum number of words accepted in one command, program name included
    pub max_args: usize,

    #[argh(switch)]
    /// keep finished jobs in the job table instead of dropping them once observed
    pub retain_finished_jobs: bool,

    #[argh(option, default = "default_prompt()")]
    /// label printed in front of the working directory in the prompt
    pub prompt: String,

    #[argh(switch)]
    /// do not record entered lines in the line editor history
    pub no_history: bool,

    #[argh(switch, short = 'v')]
    /// log debug information to standard error
    pub verbose: bool,
}

impl ShellConfig {
    pub fn retention(&self) -> RetentionPolicy {
        if self.retain_finished_jobs {
            RetentionPolicy::RetainForever
        } else {
            RetentionPolicy::RemoveOnObservedExit
        }
    }
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            max_args: DEFAULT_MAX_ARGS,
            retain_finished_jobs: false,
            prompt: default_prompt(),
            no_history: false,
            verbose: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> ShellConfig {
        ShellConfig::from_args(&["jobsh"], args).expect("valid arguments")
    }

    #[test]
    fn test_defaults_match_default_impl() {
        assert_eq!(parse(&[]), ShellConfig::default());
    }

    #[test]
    fn test_options() {
        let config = parse(&[
            "--max-args",
            "5",
            "--retain-finished-jobs",
            "--prompt",
            "SHELL",
            "-v",
        ]);
        assert_eq!(config.max_args, 5);
        assert_eq!(config.retention(), RetentionPolicy::RetainForever);
        assert_eq!(config.prompt, "SHELL");
        assert!(config.verbose);
        assert!(!config.no_history);
    }

    #[test]
    fn test_invalid_max_args_is_rejected() {
        assert!(ShellConfig::from_args(&["jobsh"], &["--max-args", "many"]).is_err());
    }
}
