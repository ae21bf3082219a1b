//! Source Location Utilities
//!
//! This module provides the immutable [`SourceLocation`] value used by every
//! span, error and code mapping, plus [`SourceLocationTracker`], which advances
//! a location one character at a time.
//!
//! # Line Breaks
//!
//! `\r\n`, `\r` and `\n` each count as a single line break. A `\r` that is
//! immediately followed by `\n` only advances the column; the `\n` then breaks
//! the line. This keeps the tracker correct when it only sees one character at
//! a time together with the next one.
//!
//! ```text
//! "f\r\nb"
//!  f   -> (1, 0, 1)
//!  \r  -> (2, 0, 2)
//!  \n  -> (3, 1, 0)
//!  b   -> (4, 1, 1)
//! ```

use memchr::memchr2;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A position in a source document
///
/// All components are zero based. `absolute_offset` counts UTF-8 bytes from the
/// start of the document, `column` counts characters from the start of the line.
/// Locations are ordered by `absolute_offset` only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Byte offset from start of input
    pub absolute_offset: usize,
    /// Line index (0-based)
    pub line: usize,
    /// Column index (0-based, in characters)
    pub column: usize,
}

impl SourceLocation {
    /// The start of a document
    pub const ZERO: SourceLocation = SourceLocation {
        absolute_offset: 0,
        line: 0,
        column: 0,
    };

    /// Create a new source location
    #[inline]
    pub fn new(absolute_offset: usize, line: usize, column: usize) -> Self {
        Self {
            absolute_offset,
            line,
            column,
        }
    }

    /// Calculate the location of a byte offset within `input`
    ///
    /// The offset is clamped to the input length and moved back to the
    /// nearest character boundary.
    pub fn from_offset(input: &str, offset: usize) -> Self {
        let mut offset = offset.min(input.len());
        while !input.is_char_boundary(offset) {
            offset -= 1;
        }
        SourceLocationTracker::calculate_new_location(SourceLocation::ZERO, &input[..offset])
    }

    /// Return a copy shifted by another location, as if `self` were relative to `origin`
    ///
    /// Used to translate buffer-relative locations into document locations
    /// when buffers are concatenated; `origin` must start a line or `self`
    /// must be on its first line.
    pub fn offset_by(&self, origin: SourceLocation) -> Self {
        Self {
            absolute_offset: origin.absolute_offset + self.absolute_offset,
            line: origin.line + self.line,
            column: if self.line == 0 {
                origin.column + self.column
            } else {
                self.column
            },
        }
    }
}

impl PartialOrd for SourceLocation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SourceLocation {
    fn cmp(&self, other: &Self) -> Ordering {
        self.absolute_offset.cmp(&other.absolute_offset)
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{},{})",
            self.absolute_offset, self.line, self.column
        )
    }
}

/// Advances [`SourceLocation`] values character by character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocationTracker {
    location: SourceLocation,
}

impl SourceLocationTracker {
    /// Create a tracker starting at `location`
    #[inline]
    pub fn new(location: SourceLocation) -> Self {
        Self { location }
    }

    /// The current location
    #[inline]
    pub fn location(&self) -> SourceLocation {
        self.location
    }

    /// Advance past `ch`, given the character that follows it (if any)
    pub fn update_location(&mut self, ch: char, next: Option<char>) {
        self.location.absolute_offset += ch.len_utf8();
        if is_line_break(ch, next) {
            self.location.line += 1;
            self.location.column = 0;
        } else {
            self.location.column += 1;
        }
    }

    /// Advance past every character of `text`
    pub fn advance_str(&mut self, text: &str) {
        if memchr2(b'\r', b'\n', text.as_bytes()).is_none() {
            self.location.absolute_offset += text.len();
            self.location.column += text.chars().count();
            return;
        }

        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            let next = chars.peek().copied();
            self.update_location(ch, next);
        }
    }

    /// Compute the location reached after reading `text` from `start`
    pub fn calculate_new_location(start: SourceLocation, text: &str) -> SourceLocation {
        let mut tracker = SourceLocationTracker::new(start);
        tracker.advance_str(text);
        tracker.location
    }
}

/// Whether `ch` ends a line, given the character after it
///
/// A `\r` immediately followed by `\n` is not a break on its own.
#[inline]
pub fn is_line_break(ch: char, next: Option<char>) -> bool {
    match ch {
        '\n' | '\u{2028}' | '\u{2029}' => true,
        '\r' => next != Some('\n'),
        _ => false,
    }
}

/// Get the line content at a given byte offset
pub fn get_line_at_offset(input: &str, offset: usize) -> &str {
    let mut offset = offset.min(input.len());
    while !input.is_char_boundary(offset) {
        offset -= 1;
    }

    let line_start = input[..offset]
        .rfind(['\n', '\r'])
        .map(|pos| pos + 1)
        .unwrap_or(0);
    let line_end = input[offset..]
        .find(['\n', '\r'])
        .map(|pos| offset + pos)
        .unwrap_or(input.len());

    &input[line_start..line_end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_location_zero() {
        let loc = SourceLocation::ZERO;
        assert_eq!(loc.absolute_offset, 0);
        assert_eq!(loc.line, 0);
        assert_eq!(loc.column, 0);
        assert_eq!(loc, SourceLocation::default());
    }

    #[test]
    fn test_crlf_counts_as_one_line_break() {
        let input = "f\r\nb";
        let mut tracker = SourceLocationTracker::default();
        let chars: Vec<char> = input.chars().collect();

        tracker.update_location(chars[0], Some(chars[1]));
        tracker.update_location(chars[1], Some(chars[2]));
        assert_eq!(tracker.location(), SourceLocation::new(2, 0, 2));

        tracker.update_location(chars[2], Some(chars[3]));
        assert_eq!(tracker.location(), SourceLocation::new(3, 1, 0));
    }

    #[test]
    fn test_lone_carriage_return_breaks_line() {
        let loc = SourceLocationTracker::calculate_new_location(SourceLocation::ZERO, "a\rb");
        assert_eq!(loc, SourceLocation::new(3, 1, 1));
    }

    #[test]
    fn test_advance_str_without_line_breaks() {
        let start = SourceLocation::new(10, 2, 4);
        let loc = SourceLocationTracker::calculate_new_location(start, "héllo");
        assert_eq!(loc.absolute_offset, 16);
        assert_eq!(loc.line, 2);
        assert_eq!(loc.column, 9);
    }

    #[test]
    fn test_from_offset_multiline() {
        let input = "line1\nline2\r\nline3";
        assert_eq!(SourceLocation::from_offset(input, 0), SourceLocation::new(0, 0, 0));
        assert_eq!(SourceLocation::from_offset(input, 6), SourceLocation::new(6, 1, 0));
        assert_eq!(SourceLocation::from_offset(input, 13), SourceLocation::new(13, 2, 0));
        assert_eq!(SourceLocation::from_offset(input, 100).absolute_offset, input.len());
    }

    #[test]
    fn test_ordering_uses_absolute_offset() {
        let a = SourceLocation::new(3, 5, 0);
        let b = SourceLocation::new(4, 0, 9);
        assert!(a < b);
    }

    #[test]
    fn test_offset_by() {
        let origin = SourceLocation::new(100, 10, 0);
        assert_eq!(
            SourceLocation::new(5, 0, 5).offset_by(origin),
            SourceLocation::new(105, 10, 5)
        );
        assert_eq!(
            SourceLocation::new(20, 2, 3).offset_by(origin),
            SourceLocation::new(120, 12, 3)
        );
    }

    #[test]
    fn test_get_line_at_offset() {
        let input = "line1\nline2\nline3";
        assert_eq!(get_line_at_offset(input, 0), "line1");
        assert_eq!(get_line_at_offset(input, 6), "line2");
        assert_eq!(get_line_at_offset(input, 10), "line2");
        assert_eq!(get_line_at_offset(input, 12), "line3");
    }

    #[test]
    fn test_display() {
        assert_eq!(SourceLocation::new(10, 3, 5).to_string(), "(10:3,5)");
    }
}
