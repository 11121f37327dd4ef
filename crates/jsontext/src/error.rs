//! Error taxonomy for the encoder and decoder.
//!
//! Mirrors the split the teacher parser crate uses for its own
//! `ParserError`/`SyntaxError`: a small, `Copy`-friendly syntax-error enum
//! carrying a byte offset, plus a top-level error that adds I/O and
//! duplicate-name cases. `thiserror` supplies `Display`/`Error` impls so
//! callers can match on the taxonomy instead of parsing messages.

use std::fmt;

use thiserror::Error;

use crate::state::Kind;

/// Where in the grammar an invalid byte or character was encountered.
///
/// Used only by [`SyntaxError::InvalidCharacter`]; each variant corresponds
/// to one of the contexts enumerated in the format's grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorContext {
    AtStartOfValue,
    AtStartOfString,
    AfterObjectName,
    AfterObjectValue,
    AfterArrayValue,
    WithinLiteral(&'static str),
    WithinString,
    WithinNumber,
    AtStartOfToken,
    BeforeNextToken,
    AfterTopLevelValue,
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AtStartOfValue => write!(f, "at start of value"),
            Self::AtStartOfString => write!(f, "at start of string (expecting '\"')"),
            Self::AfterObjectName => write!(f, "after object name (expecting ':')"),
            Self::AfterObjectValue => write!(f, "after object value (expecting ',' or '}}')"),
            Self::AfterArrayValue => write!(f, "after array value (expecting ',' or ']')"),
            Self::WithinLiteral(name) => write!(f, "within literal {name}"),
            Self::WithinString => write!(f, "within string (expecting non-control character)"),
            Self::WithinNumber => write!(f, "within number (expecting digit)"),
            Self::AtStartOfToken => write!(f, "at start of token"),
            Self::BeforeNextToken => write!(f, "before next token"),
            Self::AfterTopLevelValue => write!(f, "after top-level value"),
        }
    }
}

/// A JSON grammar violation, positioned by absolute byte offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("invalid character {found:?} {context} at offset {offset}")]
    InvalidCharacter {
        offset: u64,
        context: ErrorContext,
        found: Option<u8>,
    },

    #[error("missing ':' after object name at offset {offset}")]
    MissingColon { offset: u64 },

    #[error("missing ',' between values at offset {offset}")]
    MissingComma { offset: u64 },

    #[error("missing object member name at offset {offset}")]
    MissingName { offset: u64 },

    #[error("mismatched close delimiter {close:?} for open scope {open:?} at offset {offset}")]
    MismatchedDelim {
        offset: u64,
        open: Kind,
        close: Kind,
    },

    #[error("exceeded maximum nesting depth at offset {offset}")]
    MaxDepth { offset: u64 },

    #[error("duplicate names cannot be tracked across this namespace at offset {offset}")]
    InvalidNamespace { offset: u64 },

    #[error("invalid UTF-8 at offset {offset}")]
    InvalidUtf8 { offset: u64 },

    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEof { offset: u64 },
}

impl SyntaxError {
    /// Absolute byte offset at which the violation was detected.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::InvalidCharacter { offset, .. }
            | Self::MissingColon { offset }
            | Self::MissingComma { offset }
            | Self::MissingName { offset }
            | Self::MismatchedDelim { offset, .. }
            | Self::MaxDepth { offset }
            | Self::InvalidNamespace { offset }
            | Self::InvalidUtf8 { offset }
            | Self::UnexpectedEof { offset } => *offset,
        }
    }
}

/// A member name that collides with one already present in the innermost
/// object scope.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("duplicate object name {name:?} at offset {offset}")]
pub struct DuplicateNameError {
    pub name: String,
    pub offset: u64,
}

/// An I/O failure surfaced by the caller-supplied source or sink.
///
/// Unlike [`SyntaxError`], this does not implement `PartialEq`/`Clone`: it
/// wraps [`std::io::Error`], which does neither.
#[derive(Debug, Error)]
#[error("I/O error at offset {offset}: {source}")]
pub struct IoError {
    pub offset: u64,
    #[source]
    pub source: std::io::Error,
}

/// Top-level error returned by [`crate::Encoder`] and [`crate::Decoder`]
/// operations.
#[derive(Debug, Error)]
pub enum JsonTextError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    DuplicateName(#[from] DuplicateNameError),

    #[error(transparent)]
    Io(#[from] IoError),
}

impl JsonTextError {
    /// Absolute byte offset the error was detected at, when known.
    #[must_use]
    pub fn offset(&self) -> u64 {
        match self {
            Self::Syntax(e) => e.offset(),
            Self::DuplicateName(e) => e.offset,
            Self::Io(e) => e.offset,
        }
    }
}
