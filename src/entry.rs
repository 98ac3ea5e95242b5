//! Parsed configuration directives.
//!
//! An [`Entry`] is the hand-off record between the parser and the schema
//! handlers: one directive name, its positional values, its key=value
//! attributes and a flag telling whether a `{ ... }` block follows. It is
//! built incrementally by the parser, passed to exactly one handler and
//! dropped before the next directive is read. Handlers must copy whatever
//! they want to keep.

use nom::{
    bytes::complete::{take_while, take_while1},
    combinator::recognize,
    sequence::pair,
    IResult,
};

use crate::parser::ParseError;

/// Maximum number of positional values in one entry.
pub const MAX_VALS: usize = 16;
/// Maximum number of key=value attributes in one entry.
pub const MAX_ATTRS: usize = 16;

/// One parsed directive.
///
/// The strings are owned copies of the input slices, so an `Entry` stays
/// valid after the configuration buffer is gone, but it never outlives the
/// dispatch call that received it.
#[derive(Debug, Default, Clone)]
pub struct Entry {
    pub name: String,
    pub vals: Vec<String>,
    pub attrs: Vec<(String, String)>,
    pub has_children: bool,
}

impl Entry {
    /// First positional value, if any.
    pub fn first_val(&self) -> Option<&str> {
        self.vals.first().map(String::as_str)
    }

    /// First attribute value stored under `key`.
    ///
    /// Duplicate keys are accepted at parse time; lookup returns the first
    /// occurrence in file order.
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn set_name(&mut self, name: &str) -> Result<(), ParseError> {
        debug_assert!(self.name.is_empty());
        if !is_identifier(name) {
            return Err(ParseError::InvalidIdentifier {
                ident: name.to_string(),
            });
        }
        self.name = name.to_string();
        Ok(())
    }

    pub(crate) fn add_val(&mut self, val: &str) -> Result<(), ParseError> {
        if self.vals.len() == MAX_VALS {
            return Err(ParseError::Capacity {
                what: "values",
                max: MAX_VALS,
            });
        }
        self.vals.push(val.to_string());
        Ok(())
    }

    pub(crate) fn add_attr(&mut self, key: &str, val: &str) -> Result<(), ParseError> {
        if self.attrs.len() == MAX_ATTRS {
            return Err(ParseError::Capacity {
                what: "attributes",
                max: MAX_ATTRS,
            });
        }
        // Empty attribute values are allowed, empty keys are not.
        if !is_identifier(key) {
            return Err(ParseError::InvalidIdentifier {
                ident: key.to_string(),
            });
        }
        self.attrs.push((key.to_string(), val.to_string()));
        Ok(())
    }
}

fn identifier(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_alphabetic()),
        take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
    ))(input)
}

/// Names of entries and attribute keys must start with a letter and consist
/// only of alphanumeric and underscore characters, much like C identifiers.
pub(crate) fn is_identifier(s: &str) -> bool {
    matches!(identifier(s), Ok(("", _)))
}
