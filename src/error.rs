use thiserror::Error;

use crate::module::Phase;
use crate::parser::ParseError;

/// Crate-level error type.
///
/// Parser-level failures are wrapped via [`ParseError`]; everything the
/// dispatcher and the module coordinator can report lives here.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("don't know how to handle directive: '{name}'")]
    UnknownDirective { name: String },

    #[error("duplicate directive: '{name}', only one such entry is allowed")]
    Duplicate { name: String },

    #[error("the required directive is not found: '{name}'")]
    MissingRequired { name: String },

    #[error("the value of '{directive}' is out of range [{min}, {max}]: {value}")]
    OutOfRange {
        directive: String,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("invalid value for '{directive}': {reason}")]
    BadValue { directive: String, reason: String },

    #[error("module '{module}' failed in the {phase} phase: {source}")]
    Lifecycle {
        module: String,
        phase: Phase,
        source: Box<ConfigError>,
    },

    #[error("can't register module '{module}': the framework is running")]
    AlreadyRunning { module: String },

    #[error("invalid state command: '{value}'")]
    InvalidCommand { value: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;
