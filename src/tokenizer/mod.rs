//! Lexical analysis of the configuration language.
//!
//! The tokenizer steps over characters in the input buffer and classifies
//! them into [`Token`]s, one per [`Tokenizer::next_token`] call. Whitespace
//! and `#`-to-newline comments are eaten silently and never surface as
//! tokens. Literal payloads are borrowed slices of the input buffer, so the
//! buffer must outlive the tokens.
//!
//! * [`token`]: token kinds and the resumable tokenizer itself
//! * [`literal`]: bare and quoted literal scanning, including the escape
//!   rules

pub mod literal;
pub mod token;

pub use token::{Token, Tokenizer};
