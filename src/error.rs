//! Error kinds shared by every dialect and by the value model.
//!
//! Mirrors spec.md §7. Kept as a single flat enum (rather than the teacher's
//! per-exception-class hierarchy, which models Python's class tree and has no
//! counterpart here) since every kind in §7 is a leaf with no subtyping.

use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("parse error at {line}:{column}: {snippet}")]
    ParseError {
        line: usize,
        column: usize,
        snippet: String,
    },

    #[error("'{0}' is undefined")]
    MissingVariable(String),

    #[error("missing attribute '{0}'")]
    MissingAttribute(String),

    #[error("unknown filter '{0}'")]
    MissingFilter(String),

    #[error("unknown tag '{0}'")]
    MissingTag(String),

    #[error("unknown library '{0}'")]
    MissingLibrary(String),

    #[error("bad argument: expected {expected}, got {got}")]
    BadArgument { expected: String, got: String },

    #[error("missing required argument")]
    MissingArgument,

    #[error("superfluous argument")]
    SuperfluousArgument,

    #[error("unsupported operation '{0}' for this value")]
    BadMethod(String),

    #[error("cannot convert {from} to {to}")]
    ConversionError { from: String, to: String },

    #[error("index out of range")]
    BadIndex,

    #[error("invalid range")]
    BadRange,

    #[error("value does not support capability '{0}'")]
    UnsupportedCapability(String),

    #[error("circular extends detected at '{0}'")]
    CircularExtends(String),

    #[error(transparent)]
    IoError(#[from] std::io::Error),

    #[error("rendering was cancelled")]
    Cancelled,
}

impl Error {
    pub fn parse(line: usize, column: usize, snippet: impl Into<String>) -> Self {
        Error::ParseError {
            line,
            column,
            snippet: snippet.into(),
        }
    }

    pub fn missing_variable(name: impl Into<String>) -> Self {
        Error::MissingVariable(name.into())
    }

    pub fn missing_attribute(key: impl Into<String>) -> Self {
        Error::MissingAttribute(key.into())
    }

    pub fn missing_filter(name: impl Into<String>) -> Self {
        Error::MissingFilter(name.into())
    }

    pub fn missing_tag(name: impl Into<String>) -> Self {
        Error::MissingTag(name.into())
    }

    pub fn bad_argument(expected: impl fmt::Display, got: impl fmt::Display) -> Self {
        Error::BadArgument {
            expected: expected.to_string(),
            got: got.to_string(),
        }
    }

    pub fn conversion(from: impl Into<String>, to: impl Into<String>) -> Self {
        Error::ConversionError {
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn unsupported(capability: impl Into<String>) -> Self {
        Error::UnsupportedCapability(capability.into())
    }

    pub fn bad_method(name: impl Into<String>) -> Self {
        Error::BadMethod(name.into())
    }

    /// True for the two kinds §4.3 requires the evaluator to swallow into `default_value`.
    pub fn is_missing(&self) -> bool {
        matches!(self, Error::MissingVariable(_) | Error::MissingAttribute(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_errors_are_recognized() {
        assert!(Error::missing_variable("x").is_missing());
        assert!(Error::missing_attribute("y").is_missing());
        assert!(!Error::MissingArgument.is_missing());
    }

    #[test]
    fn parse_error_formats_with_location() {
        let err = Error::parse(3, 7, "{% bad %}");
        assert_eq!(err.to_string(), "parse error at 3:7: {% bad %}");
    }
}
