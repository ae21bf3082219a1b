//! Error Types
//!
//! Three kinds of failure exist and they never mix:
//!
//! - [`RazorError`] - a structural problem in the template (unterminated
//!   block, duplicate directive, ...). Collected as data; the parse always
//!   completes with a best-effort tree.
//! - [`ReaderError`] - a caller violated the lookahead contract.
//! - [`ParseError`] / [`SourceError`] - fatal conditions (the input stream
//!   failed, a limit was exceeded, the parse was cancelled).
//!
//! A rejected partial reparse is not an error at all; see
//! [`PartialParseResult`](super::edit_policy::PartialParseResult).
//!
//! # Example Output
//!
//! ```text
//! Error at line 1, column 6: The code block is missing a closing "}" character.
//! <p>@{ var x = 1;
//!      ^
//! ```

use super::source_location::{get_line_at_offset, SourceLocation};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A structural error found while parsing a template
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RazorError {
    /// Human readable message
    pub message: String,
    /// Where the error starts
    pub location: SourceLocation,
    /// Length of the offending text in bytes (may be zero)
    pub length: usize,
}

impl RazorError {
    /// Create a new error at a location
    pub fn new(message: impl Into<String>, location: SourceLocation, length: usize) -> Self {
        Self {
            message: message.into(),
            location,
            length,
        }
    }

    /// Create a zero-length error at a location
    pub fn at(message: impl Into<String>, location: SourceLocation) -> Self {
        Self::new(message, location, 0)
    }

    /// Format with the offending source line and a caret
    pub fn format_with_source(&self, source: &str) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Error at line {}, column {}: {}\n",
            self.location.line + 1,
            self.location.column + 1,
            self.message
        ));

        output.push_str(get_line_at_offset(source, self.location.absolute_offset));
        output.push('\n');

        for _ in 0..self.location.column {
            output.push(' ');
        }
        output.push('^');
        for _ in 1..self.length.max(1).min(80) {
            output.push('~');
        }
        output.push('\n');

        output
    }
}

impl fmt::Display for RazorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Error at line {}, column {}: {}",
            self.location.line + 1,
            self.location.column + 1,
            self.message
        )
    }
}

impl std::error::Error for RazorError {}

/// Failure of the underlying character source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The byte stream returned an I/O error
    Io(String),
    /// The byte stream is not valid UTF-8
    InvalidUtf8 {
        /// Byte offset of the first invalid sequence
        offset: usize,
    },
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "I/O error: {}", e),
            SourceError::InvalidUtf8 { offset } => {
                write!(f, "Invalid UTF-8 at byte offset {}", offset)
            }
        }
    }
}

impl std::error::Error for SourceError {}

impl From<std::io::Error> for SourceError {
    fn from(e: std::io::Error) -> Self {
        SourceError::Io(e.to_string())
    }
}

/// Misuse of the lookahead reader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderError {
    /// The operation requires an open lookahead scope
    InvalidState(&'static str),
}

impl fmt::Display for ReaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReaderError::InvalidState(msg) => write!(f, "Invalid reader state: {}", msg),
        }
    }
}

impl std::error::Error for ReaderError {}

/// Fatal error for a parse or code generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The character source failed
    Source(SourceError),

    /// Input exceeds maximum allowed size
    InputTooLarge {
        /// Size of the input in bytes (as far as it was read)
        input_size: usize,
        /// Maximum allowed size
        max_size: usize,
    },

    /// Block nesting limit exceeded
    RecursionLimitExceeded {
        /// Current nesting depth
        depth: usize,
        /// Maximum allowed depth
        max_depth: usize,
    },

    /// The cancellation token was triggered
    Cancelled,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Source(e) => write!(f, "Source error: {}", e),
            ParseError::InputTooLarge {
                input_size,
                max_size,
            } => write!(
                f,
                "Input too large: {} bytes (maximum: {} bytes)",
                input_size, max_size
            ),
            ParseError::RecursionLimitExceeded { depth, max_depth } => write!(
                f,
                "Block nesting depth exceeded: {} (maximum: {})",
                depth, max_depth
            ),
            ParseError::Cancelled => write!(f, "Parse cancelled"),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Source(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SourceError> for ParseError {
    fn from(e: SourceError) -> Self {
        ParseError::Source(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_razor_error_display_is_one_based() {
        let error = RazorError::at("Unexpected token", SourceLocation::new(15, 1, 4));
        assert_eq!(
            error.to_string(),
            "Error at line 2, column 5: Unexpected token"
        );
    }

    #[test]
    fn test_format_with_source() {
        let source = "hello world\nthis is a test\nmore text";
        let error = RazorError::new("Unexpected token", SourceLocation::new(17, 1, 5), 2);

        let formatted = error.format_with_source(source);
        assert!(formatted.contains("line 2, column 6"));
        assert!(formatted.contains("this is a test"));
        assert!(formatted.contains("     ^~"));
    }

    #[test]
    fn test_parse_error_source_chain() {
        use std::error::Error;

        let error = ParseError::from(SourceError::InvalidUtf8 { offset: 3 });
        assert!(error.source().is_some());
        assert_eq!(
            error.to_string(),
            "Source error: Invalid UTF-8 at byte offset 3"
        );
        assert!(ParseError::Cancelled.source().is_none());
    }
}
