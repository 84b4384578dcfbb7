//! Error types for the codec crate.

use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while decoding or encoding a document.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The text is not valid document syntax.
    #[error("line {line}: {message}")]
    Syntax {
        /// 1-based line number where the problem was detected.
        line: usize,
        /// Description of the syntax error.
        message: String,
    },

    /// A mapping declares the same key twice.
    #[error("line {line}: duplicate key '{key}'")]
    DuplicateKey {
        /// 1-based line number of the second occurrence.
        line: usize,
        /// The repeated key.
        key: String,
    },

    /// Tabs are not allowed in indentation.
    #[error("line {line}: tab character used for indentation")]
    TabIndentation {
        /// 1-based line number.
        line: usize,
    },

    /// The document nests deeper than the decoder allows.
    #[error("line {line}: nesting deeper than {max} levels")]
    NestingTooDeep {
        /// 1-based line number.
        line: usize,
        /// Maximum supported depth.
        max: usize,
    },

    /// The document uses a construct outside the supported subset.
    #[error("line {line}: unsupported construct: {construct}")]
    Unsupported {
        /// 1-based line number.
        line: usize,
        /// The construct that was found (anchor, tag, flow collection, ...).
        construct: &'static str,
    },
}

impl CodecError {
    /// Create a syntax error.
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Create a duplicate key error.
    pub fn duplicate_key(line: usize, key: impl Into<String>) -> Self {
        Self::DuplicateKey {
            line,
            key: key.into(),
        }
    }

    /// Returns the line number the error refers to.
    pub fn line(&self) -> usize {
        match self {
            CodecError::Syntax { line, .. }
            | CodecError::DuplicateKey { line, .. }
            | CodecError::TabIndentation { line }
            | CodecError::NestingTooDeep { line, .. }
            | CodecError::Unsupported { line, .. } => *line,
        }
    }
}
