use nom::{branch::alt, character::complete::char, combinator::map, IResult};
use strum_macros::Display;
use tracing::trace;

use super::literal::{bare_literal, quoted_literal};

/// One classified lexeme.
///
/// Syntax tokens carry no value; their lexemes are always single control
/// characters. Literals carry a borrowed payload slice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Token<'a> {
    #[strum(serialize = "{{")]
    OpenBrace,
    #[strum(serialize = "}}")]
    CloseBrace,
    #[strum(serialize = "=")]
    Equal,
    #[strum(serialize = ";")]
    Semicolon,
    #[strum(serialize = "literal")]
    Literal(&'a str),
}

/// Resumable tokenizer over one input buffer.
///
/// Produces exactly one token per [`next_token`](Self::next_token) call and
/// shifts the current position accordingly. Returns `None` on EOF and on
/// input the machine cannot classify (an unclosed quoted literal); the
/// parser distinguishes the two by where it happens.
#[derive(Debug, Clone)]
pub struct Tokenizer<'a> {
    input: &'a str,
    rest: &'a str,
}

impl<'a> Tokenizer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, rest: input }
    }

    /// Byte offset of the current position in the input buffer.
    pub fn pos(&self) -> usize {
        self.input.len() - self.rest.len()
    }

    pub(crate) fn input(&self) -> &'a str {
        self.input
    }

    pub fn next_token(&mut self) -> Option<Token<'a>> {
        self.rest = skip_ignored(self.rest);
        if self.rest.is_empty() {
            return None;
        }
        match token(self.rest) {
            Ok((rest, tok)) => {
                trace!(pos = self.pos(), %tok, "token");
                self.rest = rest;
                Some(tok)
            }
            // Unclosed quoted literal: leave the position at the opening
            // quote so error snippets point at it.
            Err(_) => None,
        }
    }
}

fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        map(char('{'), |_| Token::OpenBrace),
        map(char('}'), |_| Token::CloseBrace),
        map(char('='), |_| Token::Equal),
        map(char(';'), |_| Token::Semicolon),
        map(quoted_literal, Token::Literal),
        map(bare_literal, Token::Literal),
    ))(input)
}

/// Eat whitespace and `#`-to-newline comments. A line break cannot be
/// escaped within a comment.
fn skip_ignored(mut rest: &str) -> &str {
    loop {
        let trimmed = rest.trim_start();
        match trimmed.strip_prefix('#') {
            Some(comment) => match comment.find('\n') {
                Some(nl) => rest = &comment[nl + 1..],
                None => return "",
            },
            None => return trimmed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_tokens(input: &str) -> Vec<Token<'_>> {
        let mut tz = Tokenizer::new(input);
        let mut out = Vec::new();
        while let Some(t) = tz.next_token() {
            out.push(t);
        }
        out
    }

    #[test]
    fn test_syntax_tokens() {
        assert_eq!(
            all_tokens("{ } = ;"),
            vec![
                Token::OpenBrace,
                Token::CloseBrace,
                Token::Equal,
                Token::Semicolon
            ]
        );
    }

    #[test]
    fn test_entry_with_values_and_attr() {
        assert_eq!(
            all_tokens("entry2 1 2 3 foo=bar;"),
            vec![
                Token::Literal("entry2"),
                Token::Literal("1"),
                Token::Literal("2"),
                Token::Literal("3"),
                Token::Literal("foo"),
                Token::Equal,
                Token::Literal("bar"),
                Token::Semicolon,
            ]
        );
    }

    #[test]
    fn test_comments_and_whitespace_are_silent() {
        let input = "# leading comment\n  cache \t on; # trailing\n";
        assert_eq!(
            all_tokens(input),
            vec![
                Token::Literal("cache"),
                Token::Literal("on"),
                Token::Semicolon
            ]
        );
    }

    #[test]
    fn test_comment_at_eof_without_newline() {
        assert_eq!(all_tokens("x; # no newline"), vec![
            Token::Literal("x"),
            Token::Semicolon
        ]);
    }

    #[test]
    fn test_literals_are_input_slices() {
        let input = "listen 8001;";
        let mut tz = Tokenizer::new(input);
        let Some(Token::Literal(name)) = tz.next_token() else {
            panic!("expected a literal");
        };
        let name_pos = name.as_ptr() as usize - input.as_ptr() as usize;
        assert_eq!(name_pos, 0);
        assert_eq!(name, "listen");
    }

    #[test]
    fn test_eof_is_sticky() {
        let mut tz = Tokenizer::new("only ;");
        assert_eq!(tz.next_token(), Some(Token::Literal("only")));
        assert_eq!(tz.next_token(), Some(Token::Semicolon));
        assert_eq!(tz.next_token(), None);
        assert_eq!(tz.next_token(), None);
    }

    #[test]
    fn test_unclosed_quote_stops_at_opening_quote() {
        let input = "name \"abc";
        let mut tz = Tokenizer::new(input);
        assert_eq!(tz.next_token(), Some(Token::Literal("name")));
        assert_eq!(tz.next_token(), None);
        assert_eq!(tz.pos(), input.find('"').unwrap());
    }

    #[test]
    fn test_position_advances_per_token() {
        let mut tz = Tokenizer::new("a b");
        tz.next_token();
        assert_eq!(tz.pos(), 1);
        tz.next_token();
        assert_eq!(tz.pos(), 3);
    }
}
