//! Lexical analysis of one command line.
//!
//! The shell language is deliberately tiny: words are runs of non-blank characters,
//! `&` anywhere marks the line as a background job and `>` introduces an output
//! redirection target. There is no quoting and no expansion.

/// Token that introduces an output redirection.
pub const REDIRECT_OPERATOR: &str = ">";

/// Character that requests background execution.
pub const BACKGROUND_MARKER: char = '&';

/// Result of splitting one line into tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenizedLine {
    /// Tokens in input order, with every `&` already removed.
    pub tokens: Vec<String>,
    /// True when the raw line contained at least one `&`.
    pub background: bool,
    /// Argument index (not character offset) of the first `>` token, if any.
    pub redirect_at: Option<usize>,
}

impl TokenizedLine {
    /// Returns true when the line held nothing but separators.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LexingState {
    Start,
    ReadingWord,
    // A control character cut the current word short; drop the rest of the run.
    SkippingRest,
}

struct LexingFSM<'a> {
    input: std::str::Chars<'a>,
    state: LexingState,
    buffer: String,
    out: TokenizedLine,
}

impl<'a> LexingFSM<'a> {
    fn new(line: &'a str) -> Self {
        LexingFSM {
            input: line.chars(),
            state: LexingState::Start,
            buffer: String::new(),
            out: TokenizedLine::default(),
        }
    }

    fn make_tokens(mut self) -> TokenizedLine {
        while let Some(ch) = self.input.next() {
            if ch == BACKGROUND_MARKER {
                self.out.background = true;
                self.end_word();
                continue;
            }

            if is_separator(ch) {
                self.end_word();
                continue;
            }

            match self.state {
                LexingState::Start | LexingState::ReadingWord if is_control(ch) => {
                    self.state = LexingState::SkippingRest;
                }
                LexingState::Start | LexingState::ReadingWord => {
                    self.buffer.push(ch);
                    self.state = LexingState::ReadingWord;
                }
                LexingState::SkippingRest => {}
            }
        }

        self.end_word();
        self.out
    }

    fn end_word(&mut self) {
        if !self.buffer.is_empty() {
            let word = std::mem::take(&mut self.buffer);
            if word == REDIRECT_OPERATOR && self.out.redirect_at.is_none() {
                self.out.redirect_at = Some(self.out.tokens.len());
            }
            self.out.tokens.push(word);
        }
        self.state = LexingState::Start;
    }
}

fn is_separator(ch: char) -> bool {
    matches!(ch, ' ' | '\t' | '\n')
}

fn is_control(ch: char) -> bool {
    (ch as u32) <= 32
}

/// Splits a raw input line into tokens.
///
/// Never fails: an empty or blank line yields an empty [`TokenizedLine`].
pub fn split_into_tokens(line: &str) -> TokenizedLine {
    LexingFSM::new(line).make_tokens()
}
