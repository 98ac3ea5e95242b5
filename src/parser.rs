//! The entry parser.
//!
//! Steps over the token stream produced by the tokenizer and accumulates
//! one [`Entry`] per [`parse_entry`](EntryParser::parse_entry) call. The
//! grammar is context-sensitive: after a literal we only know whether it
//! was a value or an attribute key once we have seen the following token,
//! so the decision is made retroactively from one token of history instead
//! of a peek.
//!
//! The parser does not recurse into nested entries. For
//!
//! ```text
//! entry1 {
//!     entry2;
//! }
//! ```
//!
//! it stops at the `{` and sets `has_children`; the nested-block handler
//! re-enters [`parse_entry`](EntryParser::parse_entry) in a loop until the
//! matching `}`. That keeps
//! the machinery flat instead of building a syntax tree nobody queries.

use thiserror::Error;
use tracing::trace;

use crate::entry::Entry;
use crate::tokenizer::{Token, Tokenizer};

/// How much input context is shown before the failure position in a syntax
/// error snippet.
const SNIPPET_BYTES: usize = 80;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("configuration syntax error:\n{snippet}\n^^^^^^^^")]
    Syntax { snippet: String },

    #[error("maximum number of {what} per entry reached ({max})")]
    Capacity { what: &'static str, max: usize },

    #[error("invalid identifier: '{ident}'")]
    InvalidIdentifier { ident: String },
}

/// Token-level parser state over one configuration buffer.
///
/// Call [`parse_entry`](Self::parse_entry) in a loop; `Ok(None)` signals a
/// clean EOF. The state is shared with the nested-block handler, which
/// continues from the same position.
pub struct EntryParser<'a> {
    tokenizer: Tokenizer<'a>,
    cur: Option<Token<'a>>,
    prev: Option<Token<'a>>,
    primed: bool,
}

impl<'a> EntryParser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            tokenizer: Tokenizer::new(input),
            cur: None,
            prev: None,
            primed: false,
        }
    }

    /// Currently held token.
    pub(crate) fn cur(&self) -> Option<Token<'a>> {
        self.cur
    }

    /// Rotate the token history and read the next token.
    pub(crate) fn advance(&mut self) {
        self.prev = self.cur;
        self.cur = self.tokenizer.next_token();
        trace!(prev = ?self.prev, cur = ?self.cur, "parser move");
    }

    /// Consume tokens until one complete entry has been built.
    ///
    /// Leaves the position just past the terminating `;`, or at the `{`
    /// with `has_children` set so the nested-block handler can take over.
    /// Returns `Ok(None)` on EOF at an entry boundary.
    #[tracing::instrument(level = "debug", skip(self))]
    pub fn parse_entry(&mut self) -> Result<Option<Entry>, ParseError> {
        // The very first call primes the first token.
        if !self.primed {
            self.advance();
            self.primed = true;
        }

        let name = match self.cur {
            None => return Ok(None),
            Some(Token::Literal(lit)) => lit,
            Some(_) => return Err(self.syntax_error()),
        };

        let mut entry = Entry::default();
        entry.set_name(name)?;
        self.advance();

        loop {
            match self.cur {
                // A literal is either a value or an attribute key; the
                // next token settles it.
                Some(Token::Literal(lit)) => {
                    self.advance();
                    if self.cur == Some(Token::Equal) {
                        self.advance();
                        let val = match self.cur {
                            Some(Token::Literal(val)) => val,
                            // EOF or a syntax token right after '=' is a
                            // malformed entry, not a separate error kind.
                            _ => return Err(self.syntax_error()),
                        };
                        entry.add_attr(lit, val)?;
                        self.advance();
                    } else {
                        // Not an '=': the previous literal was a plain
                        // value and the held token is re-examined.
                        entry.add_val(lit)?;
                    }
                }
                Some(Token::Semicolon) => {
                    // Eat the ';' so the next call starts at the first
                    // token of the following directive.
                    self.advance();
                    return Ok(Some(entry));
                }
                Some(Token::OpenBrace) => {
                    // Leave the '{' for the nested-block handler.
                    entry.has_children = true;
                    return Ok(Some(entry));
                }
                _ => return Err(self.syntax_error()),
            }
        }
    }

    pub(crate) fn syntax_error(&self) -> ParseError {
        ParseError::Syntax {
            snippet: self.context_snippet(),
        }
    }

    /// Input context before the current position, for error messages.
    pub(crate) fn context_snippet(&self) -> String {
        let input = self.tokenizer.input();
        let pos = self.tokenizer.pos();
        let mut start = pos.saturating_sub(SNIPPET_BYTES);
        while !input.is_char_boundary(start) {
            start += 1;
        }
        input[start..pos].to_string()
    }
}
