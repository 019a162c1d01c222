//! Error types for LON parsing.

use thiserror::Error;

/// Result type for LON parsing operations.
pub type Result<T> = std::result::Result<T, ParseError>;

/// Parse context carrying filename for error reporting.
#[derive(Clone, Debug, Default)]
pub struct ParseContext {
    pub filename: Option<String>,
}

impl ParseContext {
    /// Create a new parse context.
    pub fn new(filename: Option<&str>) -> Self {
        Self {
            filename: filename.map(String::from),
        }
    }

    /// Format a location suffix for error messages. Line and column are
    /// one-based.
    pub fn loc_suffix(&self, line: usize, col: usize) -> String {
        match &self.filename {
            Some(name) => format!(" at {}:{} of <{}>", line, col, name),
            None => format!(" at {}:{}", line, col),
        }
    }
}

/// Error type for LON parsing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// No grammar rule matched; carries the deepest expectation reached.
    #[error("Expected {expected}{location} (offset {offset})")]
    Expected {
        expected: String,
        offset: usize,
        location: String,
    },

    /// Structurally matched input that is semantically invalid, such as a
    /// zero-length bare token. Aborts the parse without backtracking.
    #[error("Invalid input: {expected}{location} (offset {offset})")]
    Invalid {
        expected: String,
        offset: usize,
        location: String,
    },

    /// The document parsed but input remained.
    #[error("Unexpected extra content{location} (offset {offset})")]
    TrailingContent { offset: usize, location: String },
}

impl ParseError {
    /// Byte offset at which the error was detected.
    pub fn offset(&self) -> usize {
        match self {
            ParseError::Expected { offset, .. }
            | ParseError::Invalid { offset, .. }
            | ParseError::TrailingContent { offset, .. } => *offset,
        }
    }
}
