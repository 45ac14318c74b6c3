use crate::lexer::{self, REDIRECT_OPERATOR, TokenizedLine};
use std::path::PathBuf;
use thiserror::Error;

/// Output redirection attached to a single command.
///
/// The target is always opened write-only, created when missing and truncated
/// when present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectSpec {
    /// File that receives the command's standard output.
    pub path: PathBuf,
}

/// A fully parsed command line, ready to be dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Program name followed by its arguments. Never empty.
    pub argv: Vec<String>,
    /// Run without waiting and record the process in the job table.
    pub background: bool,
    /// Optional `> path` redirection.
    pub redirect: Option<RedirectSpec>,
}

impl Command {
    /// The program (or built-in) name, i.e. `argv[0]`.
    pub fn name(&self) -> &str {
        &self.argv[0]
    }

    /// Arguments after the program name.
    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }
}

/// Errors that can occur while turning tokens into a [`Command`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParsingError {
    /// `>` was the last token on the line.
    #[error("syntax error: expected a file name after `>`")]
    MissingRedirectTarget,
    /// More than one `>` appeared; only a single redirection is supported.
    #[error("syntax error: only one output redirection is supported")]
    MultipleRedirections,
    /// The line held a redirection but no program to run.
    #[error("syntax error: missing command before `>`")]
    MissingCommand,
    /// The command has more arguments than the configured limit.
    #[error("too many arguments (limit is {limit})")]
    TooManyArguments { limit: usize },
}

/// Parses one raw input line.
///
/// Returns `Ok(None)` when the line has no tokens at all; such a line is a no-op
/// for the interpreter, not an error.
pub fn parse_line(line: &str, max_args: usize) -> Result<Option<Command>, ParsingError> {
    construct_command(lexer::split_into_tokens(line), max_args)
}

/// Builds a [`Command`] from lexer output.
///
/// The redirect operator and the token following it are removed from `argv`.
pub fn construct_command(
    line: TokenizedLine,
    max_args: usize,
) -> Result<Option<Command>, ParsingError> {
    if line.is_empty() {
        return Ok(None);
    }

    let TokenizedLine {
        mut tokens,
        background,
        redirect_at,
    } = line;

    let redirect = match redirect_at {
        Some(at) => {
            if at + 1 >= tokens.len() {
                return Err(ParsingError::MissingRedirectTarget);
            }
            let target = tokens.remove(at + 1);
            tokens.remove(at);
            if target == REDIRECT_OPERATOR {
                return Err(ParsingError::MultipleRedirections);
            }
            Some(RedirectSpec {
                path: PathBuf::from(target),
            })
        }
        None => None,
    };

    if tokens.iter().any(|t| t == REDIRECT_OPERATOR) {
        return Err(ParsingError::MultipleRedirections);
    }

    if tokens.is_empty() {
        return Err(ParsingError::MissingCommand);
    }

    if tokens.len() > max_args {
        return Err(ParsingError::TooManyArguments { limit: max_args });
    }

    Ok(Some(Command {
        argv: tokens,
        background,
        redirect,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 20;

    fn parse(line: &str) -> Command {
        parse_line(line, LIMIT)
            .expect("parse failed")
            .expect("expected a command")
    }

    #[test]
    fn test_simple_command() {
        let cmd = parse("ls -la /tmp");
        assert_eq!(cmd.name(), "ls");
        assert_eq!(cmd.args(), ["-la", "/tmp"]);
        assert!(!cmd.background);
        assert_eq!(cmd.redirect, None);
    }

    #[test]
    fn test_empty_line_is_noop() {
        assert_eq!(parse_line("", LIMIT), Ok(None));
        assert_eq!(parse_line("  \t\n", LIMIT), Ok(None));
        assert_eq!(parse_line("&", LIMIT), Ok(None));
    }

    #[test]
    fn test_redirect_excluded_from_argv() {
        let cmd = parse("prog a b > out.txt");
        assert_eq!(cmd.argv, vec!["prog", "a", "b"]);
        assert_eq!(
            cmd.redirect,
            Some(RedirectSpec {
                path: PathBuf::from("out.txt")
            })
        );
    }

    #[test]
    fn test_redirect_in_middle_of_line() {
        let cmd = parse("prog > out.txt a b");
        assert_eq!(cmd.argv, vec!["prog", "a", "b"]);
        assert_eq!(cmd.redirect.unwrap().path, PathBuf::from("out.txt"));
    }

    #[test]
    fn test_background_with_redirect() {
        let cmd = parse("sleep 1 > log.txt &");
        assert!(cmd.background);
        assert_eq!(cmd.argv, vec!["sleep", "1"]);
        assert_eq!(cmd.redirect.unwrap().path, PathBuf::from("log.txt"));
    }

    #[test]
    fn test_missing_redirect_target() {
        assert_eq!(
            parse_line("echo hi >", LIMIT),
            Err(ParsingError::MissingRedirectTarget)
        );
    }

    #[test]
    fn test_multiple_redirections_rejected() {
        assert_eq!(
            parse_line("echo hi > a > b", LIMIT),
            Err(ParsingError::MultipleRedirections)
        );
        assert_eq!(
            parse_line("echo hi > >", LIMIT),
            Err(ParsingError::MultipleRedirections)
        );
    }

    #[test]
    fn test_redirect_without_command() {
        assert_eq!(
            parse_line("> out.txt", LIMIT),
            Err(ParsingError::MissingCommand)
        );
    }

    #[test]
    fn test_argument_limit() {
        assert!(parse_line("a b c", 3).unwrap().is_some());
        assert_eq!(
            parse_line("a b c d", 3),
            Err(ParsingError::TooManyArguments { limit: 3 })
        );
        // The redirect pair does not count against the limit.
        assert!(parse_line("a b c > out", 3).unwrap().is_some());
    }
}
