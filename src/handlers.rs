//! Stock spec handlers.
//!
//! Most directives carry exactly one value:
//!
//! ```text
//! cache on;
//! listen_backlog 1024;
//! server_id edge01;
//! ```
//!
//! The constructors here build [`Handler`]s for the common shapes: boolean
//! and integer values, bounded strings, enum-like identifier mappings, and
//! the nested-block handler that recurses into `{ ... }` sections with its
//! own child spec set. Destinations are shared cells so that the module
//! keeps reading its own storage after the specs are handed to the
//! coordinator.

use std::cell::{Cell, RefCell};
use std::ops::RangeInclusive;
use std::rc::Rc;

use tracing::debug;

use crate::entry::{is_identifier, Entry};
use crate::error::ConfigError;
use crate::parser::EntryParser;
use crate::spec::{find_spec, finish_handling, start_handling, Handler, Spec};
use crate::tokenizer::Token;

const TRUE_WORDS: [&str; 6] = ["1", "y", "on", "yes", "true", "enable"];
const FALSE_WORDS: [&str; 6] = ["0", "n", "off", "no", "false", "disable"];

fn bad_value(entry: &Entry, reason: impl Into<String>) -> ConfigError {
    ConfigError::BadValue {
        directive: entry.name.clone(),
        reason: reason.into(),
    }
}

/// Check that an entry matches the usual single-value pattern: exactly one
/// value, no attributes, no children. Returns the value.
pub fn check_single_val(entry: &Entry) -> Result<&str, ConfigError> {
    if entry.vals.is_empty() {
        Err(bad_value(entry, "no value specified"))
    } else if entry.vals.len() > 1 {
        Err(bad_value(entry, "more than one value specified"))
    } else if !entry.attrs.is_empty() {
        Err(bad_value(entry, "unexpected attributes"))
    } else if entry.has_children {
        Err(bad_value(entry, "unexpected children entries"))
    } else {
        Ok(&entry.vals[0])
    }
}

/// Boolean directive: `1 y on yes true enable` / `0 n off no false
/// disable`, case-insensitive.
pub fn set_bool(dest: Rc<Cell<bool>>) -> Handler {
    Box::new(move |entry, _| {
        let val = check_single_val(entry)?;
        let is_true = TRUE_WORDS.iter().any(|w| val.eq_ignore_ascii_case(w));
        let is_false = FALSE_WORDS.iter().any(|w| val.eq_ignore_ascii_case(w));
        if !is_true && !is_false {
            return Err(bad_value(entry, format!("invalid boolean value: '{val}'")));
        }
        dest.set(is_true);
        Ok(())
    })
}

/// Constraints for [`set_int`].
#[derive(Debug, Clone, Default)]
pub struct IntBounds {
    pub range: Option<RangeInclusive<i32>>,
    pub multiple_of: Option<i32>,
}

/// Detect the integer base and strip a `0x`/`0b` prefix.
///
/// Leading zeros deliberately do NOT select the octal base: an operator
/// writing `010` gets 10, not 8. `0b` is supported for masks and bit
/// strings.
fn detect_base(s: &str) -> Option<(u32, &str)> {
    let bytes = s.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'0' && bytes[1].is_ascii_alphabetic() {
        return match bytes[1].to_ascii_lowercase() {
            b'x' => Some((16, &s[2..])),
            b'b' => Some((2, &s[2..])),
            _ => None,
        };
    }
    Some((10, s))
}

/// Integer directive with optional range and multiple-of constraints.
pub fn set_int(dest: Rc<Cell<i32>>, bounds: IntBounds) -> Handler {
    Box::new(move |entry, _| {
        let val = check_single_val(entry)?;
        let (base, digits) = detect_base(val)
            .ok_or_else(|| bad_value(entry, format!("can't parse integer: '{val}'")))?;
        let parsed = i32::from_str_radix(digits, base)
            .map_err(|_| bad_value(entry, format!("can't parse integer: '{val}'")))?;

        if let Some(m) = bounds.multiple_of {
            if parsed % m != 0 {
                return Err(bad_value(
                    entry,
                    format!("the value {parsed} is not a multiple of {m}"),
                ));
            }
        }
        if let Some(range) = &bounds.range {
            if !range.contains(&parsed) {
                return Err(ConfigError::OutOfRange {
                    directive: entry.name.clone(),
                    value: parsed,
                    min: *range.start(),
                    max: *range.end(),
                });
            }
        }

        dest.set(parsed);
        Ok(())
    })
}

/// Constraints for [`set_str`].
#[derive(Debug, Clone, Default)]
pub struct StrBounds {
    /// Strings longer than this overflow the destination and are rejected.
    pub max_len: Option<usize>,
    pub len_range: Option<RangeInclusive<usize>>,
}

/// String directive copied into a shared destination.
pub fn set_str(dest: Rc<RefCell<String>>, bounds: StrBounds) -> Handler {
    Box::new(move |entry, _| {
        let val = check_single_val(entry)?;
        if let Some(max) = bounds.max_len {
            if val.len() > max {
                return Err(bad_value(entry, format!("the string is too long: '{val}'")));
            }
        }
        if let Some(range) = &bounds.len_range {
            if !range.contains(&val.len()) {
                return Err(bad_value(
                    entry,
                    format!(
                        "the string length ({}) is out of valid range ({}, {}): '{val}'",
                        val.len(),
                        range.start(),
                        range.end()
                    ),
                ));
            }
        }
        *dest.borrow_mut() = val.to_string();
        Ok(())
    })
}

/// Map an identifier to its integer value, case-insensitively.
///
/// Exposed for hand-written handlers that accept enum-like keywords in
/// attribute values or among several positional values.
pub fn map_enum(mappings: &[(&str, i32)], name: &str) -> Option<i32> {
    if !is_identifier(name) {
        return None;
    }
    mappings
        .iter()
        .find(|(candidate, _)| name.eq_ignore_ascii_case(candidate))
        .map(|(_, value)| *value)
}

/// Enum directive: a single identifier value mapped through a fixed
/// (name, value) table.
pub fn set_enum(dest: Rc<Cell<i32>>, mappings: &[(&str, i32)]) -> Handler {
    for (name, _) in mappings {
        assert!(
            is_identifier(name),
            "enum mapping name is not a valid identifier: '{name}'"
        );
    }
    let mappings: Vec<(String, i32)> = mappings
        .iter()
        .map(|(n, v)| (n.to_string(), *v))
        .collect();
    Box::new(move |entry, _| {
        let val = check_single_val(entry)?;
        if !is_identifier(val) {
            return Err(bad_value(entry, format!("unknown keyword: '{val}'")));
        }
        let mapped = mappings
            .iter()
            .find(|(name, _)| val.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
            .ok_or_else(|| bad_value(entry, format!("unknown keyword: '{val}'")))?;
        dest.set(mapped);
        Ok(())
    })
}

/// Nested-block handler: recurse into `{ ... }` with a child spec set.
///
/// The outer parser stops right at the `{`. This handler shares that
/// parser state, eats the brace, dispatches children against its own spec
/// set until the matching `}`, then settles the child specs the same way
/// the top level does.
pub fn parse_children(mut specs: Vec<Spec>) -> Handler {
    Box::new(move |entry: &Entry, parser: &mut EntryParser<'_>| {
        if !entry.vals.is_empty() || !entry.attrs.is_empty() {
            return Err(bad_value(entry, "the entry must have no values or attributes"));
        }
        if !entry.has_children {
            return Err(bad_value(entry, "the entry has no nested children entries"));
        }
        debug!(section = %entry.name, "entering nested block");

        start_handling(&mut specs);

        debug_assert_eq!(parser.cur(), Some(Token::OpenBrace));
        parser.advance();

        while parser.cur() != Some(Token::CloseBrace) {
            let Some(child) = parser.parse_entry()? else {
                // EOF before the closing brace.
                return Err(parser.syntax_error().into());
            };
            let spec = find_spec(&mut specs, &child.name).ok_or_else(|| {
                ConfigError::UnknownDirective {
                    name: child.name.clone(),
                }
            })?;
            spec.handle_entry(&child, parser)?;
        }
        parser.advance();

        finish_handling(&mut specs)
    })
}
