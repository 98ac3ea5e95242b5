//! Literal scanning.
//!
//! Two literal forms exist: bare words and double-quoted strings. A
//! backslash escapes the character after it in both forms and is retained
//! in the emitted payload; consumers see the raw bytes. The only backslash
//! that is dropped is one that opens a bare literal, where it merely marks
//! the next character as non-special.

use nom::error::{Error, ErrorKind};
use nom::IResult;

fn is_special(c: char) -> bool {
    matches!(c, '"' | '#' | '{' | '}' | '=' | ';')
}

/// A bare literal extends until the next unescaped whitespace, EOF or
/// special character.
pub(crate) fn bare_literal(input: &str) -> IResult<&str, &str> {
    let body = input.strip_prefix('\\').unwrap_or(input);
    let opened_by_escape = body.len() < input.len();

    let mut prev = if opened_by_escape { Some('\\') } else { None };
    let mut end = body.len();
    for (i, c) in body.char_indices() {
        if prev != Some('\\') && (c.is_whitespace() || is_special(c)) {
            end = i;
            break;
        }
        prev = Some(c);
    }

    if end == 0 {
        return Err(nom::Err::Error(Error::new(input, ErrorKind::TakeWhile1)));
    }
    Ok((&body[end..], &body[..end]))
}

/// A quoted literal accumulates everything up to the next unescaped double
/// quote, line breaks included. The surrounding quotes are not part of the
/// payload. EOF before the closing quote is an error.
pub(crate) fn quoted_literal(input: &str) -> IResult<&str, &str> {
    let body = match input.strip_prefix('"') {
        Some(body) => body,
        None => return Err(nom::Err::Error(Error::new(input, ErrorKind::Char))),
    };

    let mut prev = '"';
    for (i, c) in body.char_indices() {
        if c == '"' && prev != '\\' {
            return Ok((&body[i + 1..], &body[..i]));
        }
        prev = c;
    }

    Err(nom::Err::Error(Error::new(input, ErrorKind::Char)))
}
