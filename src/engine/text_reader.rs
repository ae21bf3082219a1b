//! Buffering Lookahead Text Reader
//!
//! [`LookaheadTextReader`] reads characters from a [`TextSource`] one at a
//! time while tracking the current [`SourceLocation`]. Opening a lookahead
//! scope starts buffering every character read; dropping the scope rewinds the
//! reader to where the scope was opened, replaying from the buffer rather than
//! the physical source.
//!
//! # Architecture
//!
//! ```text
//! source:  a b c d e f g
//!              ▲
//!              └── pulled lazily, one char at a time
//!
//! buffer:  [b c d]           (filled while a scope is open)
//!           ▲     ▲
//!           │     └── position (reads past here pull from the source)
//!           └── checkpoint of the outer scope
//! ```
//!
//! # Usage
//!
//! ```rust
//! use razorblade::engine::text_reader::LookaheadTextReader;
//!
//! let mut reader = LookaheadTextReader::from_str("abcdefg");
//! assert_eq!(reader.read(), Some('a'));
//! {
//!     let mut lookahead = reader.begin_lookahead();
//!     assert_eq!(lookahead.read(), Some('b'));
//!     assert_eq!(lookahead.read(), Some('c'));
//! }
//! assert_eq!(reader.peek(), Some('b'));
//! ```
//!
//! Scopes nest, and because a [`Lookahead`] guard mutably borrows the reader,
//! the borrow checker enforces that they close in LIFO order.

use super::error::{ReaderError, SourceError};
use super::source_location::{SourceLocation, SourceLocationTracker};
use std::collections::VecDeque;
use std::io::Read;
use std::ops::{Deref, DerefMut};

/// Default chunk size for [`ReadSource`]
pub const DEFAULT_CHUNK_SIZE: usize = 8 * 1024;

// ============================================================================
// Character Sources
// ============================================================================

/// Minimal character-stream interface consumed by the reader
pub trait TextSource {
    /// Produce the next character, `Ok(None)` at end of input
    fn next_char(&mut self) -> Result<Option<char>, SourceError>;
}

impl<T: TextSource + ?Sized> TextSource for &mut T {
    fn next_char(&mut self) -> Result<Option<char>, SourceError> {
        (**self).next_char()
    }
}

impl<T: TextSource + ?Sized> TextSource for Box<T> {
    fn next_char(&mut self) -> Result<Option<char>, SourceError> {
        (**self).next_char()
    }
}

/// In-memory source over a string slice
#[derive(Debug, Clone)]
pub struct StrSource<'a> {
    chars: std::str::Chars<'a>,
}

impl<'a> StrSource<'a> {
    /// Create a source over `input`
    #[inline]
    pub fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars(),
        }
    }
}

impl TextSource for StrSource<'_> {
    #[inline]
    fn next_char(&mut self) -> Result<Option<char>, SourceError> {
        Ok(self.chars.next())
    }
}

/// Owned in-memory source
#[derive(Debug, Clone)]
pub struct StringSource {
    text: String,
    position: usize,
}

impl StringSource {
    /// Create a source that owns `text`
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: 0,
        }
    }
}

impl TextSource for StringSource {
    fn next_char(&mut self) -> Result<Option<char>, SourceError> {
        let ch = self.text[self.position..].chars().next();
        if let Some(c) = ch {
            self.position += c.len_utf8();
        }
        Ok(ch)
    }
}

/// Source decoding UTF-8 from any byte stream in fixed-size chunks
///
/// Multi-byte sequences split across chunk boundaries are carried over to the
/// next read.
pub struct ReadSource<R: Read> {
    reader: R,
    chunk_size: usize,
    pending: Vec<u8>,
    decoded: VecDeque<char>,
    bytes_consumed: usize,
    eof: bool,
    failed: Option<SourceError>,
}

impl<R: Read> ReadSource<R> {
    /// Create a source with the default chunk size
    pub fn new(reader: R) -> Self {
        Self::with_chunk_size(reader, DEFAULT_CHUNK_SIZE)
    }

    /// Create a source reading `chunk_size` bytes at a time
    pub fn with_chunk_size(reader: R, chunk_size: usize) -> Self {
        Self {
            reader,
            chunk_size: chunk_size.max(4),
            pending: Vec::new(),
            decoded: VecDeque::new(),
            bytes_consumed: 0,
            eof: false,
            failed: None,
        }
    }

    /// Decode more characters
    ///
    /// Text before an invalid sequence is decoded first; the error is
    /// reported once those characters have been consumed.
    fn fill(&mut self) -> Result<(), SourceError> {
        if let Some(error) = &self.failed {
            return Err(error.clone());
        }
        let mut chunk = vec![0u8; self.chunk_size];
        while self.decoded.is_empty() && !self.eof {
            let read = loop {
                match self.reader.read(&mut chunk) {
                    Ok(n) => break n,
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e.into()),
                }
            };

            if read == 0 {
                self.eof = true;
                if !self.pending.is_empty() {
                    return Err(SourceError::InvalidUtf8 {
                        offset: self.bytes_consumed,
                    });
                }
                break;
            }

            self.pending.extend_from_slice(&chunk[..read]);
            let valid_up_to = match std::str::from_utf8(&self.pending) {
                Ok(text) => text.len(),
                Err(e) => {
                    if e.error_len().is_some() {
                        self.failed = Some(SourceError::InvalidUtf8 {
                            offset: self.bytes_consumed + e.valid_up_to(),
                        });
                    }
                    e.valid_up_to()
                }
            };

            let text = std::str::from_utf8(&self.pending[..valid_up_to]).map_err(|e| {
                SourceError::InvalidUtf8 {
                    offset: self.bytes_consumed + e.valid_up_to(),
                }
            })?;
            self.decoded.extend(text.chars());
            self.pending.drain(..valid_up_to);
            self.bytes_consumed += valid_up_to;

            if let Some(error) = &self.failed {
                if self.decoded.is_empty() {
                    return Err(error.clone());
                }
                break;
            }
        }
        Ok(())
    }
}

impl<R: Read> TextSource for ReadSource<R> {
    fn next_char(&mut self) -> Result<Option<char>, SourceError> {
        if self.decoded.is_empty() {
            self.fill()?;
        }
        Ok(self.decoded.pop_front())
    }
}

// ============================================================================
// Lookahead Reader
// ============================================================================

#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    position: usize,
    location: SourceLocation,
    committed: bool,
}

/// Character reader with nested, rewindable lookahead scopes
pub struct LookaheadTextReader<S: TextSource> {
    source: S,
    /// One character of lookahead into the physical source
    source_peek: Option<Option<char>>,
    buffer: Vec<char>,
    position: usize,
    checkpoints: Vec<Checkpoint>,
    tracker: SourceLocationTracker,
    error: Option<SourceError>,
}

impl<'a> LookaheadTextReader<StrSource<'a>> {
    /// Create a reader over a string slice
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(input: &'a str) -> Self {
        Self::new(StrSource::new(input))
    }
}

impl<S: TextSource> LookaheadTextReader<S> {
    /// Create a reader over `source`
    pub fn new(source: S) -> Self {
        Self {
            source,
            source_peek: None,
            buffer: Vec::new(),
            position: 0,
            checkpoints: Vec::new(),
            tracker: SourceLocationTracker::default(),
            error: None,
        }
    }

    /// Location of the next character to be read
    #[inline]
    pub fn current_location(&self) -> SourceLocation {
        self.tracker.location()
    }

    /// Number of currently open lookahead scopes
    #[inline]
    pub fn lookahead_depth(&self) -> usize {
        self.checkpoints.len()
    }

    /// Number of characters held in the lookahead buffer
    #[inline]
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// The first source failure, if any
    ///
    /// After a failure the reader behaves as if the input ended.
    #[inline]
    pub fn error(&self) -> Option<&SourceError> {
        self.error.as_ref()
    }

    /// Take the source failure, leaving `None`
    #[inline]
    pub fn take_error(&mut self) -> Option<SourceError> {
        self.error.take()
    }

    fn peek_source(&mut self) -> Option<char> {
        if let Some(peeked) = self.source_peek {
            return peeked;
        }
        let next = if self.error.is_some() {
            None
        } else {
            match self.source.next_char() {
                Ok(ch) => ch,
                Err(e) => {
                    self.error = Some(e);
                    None
                }
            }
        };
        self.source_peek = Some(next);
        next
    }

    /// Look at the next character without consuming it
    pub fn peek(&mut self) -> Option<char> {
        if self.position < self.buffer.len() {
            Some(self.buffer[self.position])
        } else {
            self.peek_source()
        }
    }

    /// Consume the next character
    pub fn read(&mut self) -> Option<char> {
        let ch = if self.position < self.buffer.len() {
            let ch = self.buffer[self.position];
            self.position += 1;
            ch
        } else {
            let ch = self.peek_source()?;
            self.source_peek = None;
            if !self.checkpoints.is_empty() {
                self.buffer.push(ch);
                self.position += 1;
            }
            ch
        };

        self.release_buffer_if_drained();
        let next = self.peek();
        self.tracker.update_location(ch, next);
        Some(ch)
    }

    /// Read characters into `buf`, returning how many were read
    pub fn read_into(&mut self, buf: &mut [char]) -> usize {
        let mut count = 0;
        for slot in buf.iter_mut() {
            match self.read() {
                Some(ch) => {
                    *slot = ch;
                    count += 1;
                }
                None => break,
            }
        }
        count
    }

    /// Read up to the next line break, consuming but not returning it
    ///
    /// Returns `None` at end of input.
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let first = self.read()?;
        let mut ch = first;
        loop {
            match ch {
                '\n' => break,
                '\r' => {
                    if self.peek() == Some('\n') {
                        self.read();
                    }
                    break;
                }
                c => line.push(c),
            }
            match self.read() {
                Some(next) => ch = next,
                None => break,
            }
        }
        Some(line)
    }

    /// Read everything that remains
    pub fn read_to_end(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.read() {
            text.push(ch);
        }
        text
    }

    /// Read while `predicate` holds
    pub fn read_while<F: FnMut(char) -> bool>(&mut self, mut predicate: F) -> String {
        let mut text = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            text.push(ch);
            self.read();
        }
        text
    }

    /// Open a lookahead scope
    ///
    /// Everything read through the returned guard is rewound when the guard
    /// is dropped, unless [`Lookahead::cancel_backtrack`] was called.
    pub fn begin_lookahead(&mut self) -> Lookahead<'_, S> {
        self.checkpoints.push(Checkpoint {
            position: self.position,
            location: self.tracker.location(),
            committed: false,
        });
        let depth = self.checkpoints.len();
        Lookahead {
            reader: self,
            depth,
        }
    }

    /// Commit the innermost open lookahead scope
    ///
    /// Fails with [`ReaderError::InvalidState`] when no scope is open.
    pub fn cancel_backtrack(&mut self) -> Result<(), ReaderError> {
        match self.checkpoints.last_mut() {
            Some(checkpoint) => {
                checkpoint.committed = true;
                Ok(())
            }
            None => Err(ReaderError::InvalidState(
                "cancel_backtrack called outside of a lookahead scope",
            )),
        }
    }

    fn end_lookahead(&mut self, depth: usize) {
        debug_assert_eq!(
            self.checkpoints.len(),
            depth,
            "lookahead scopes must be closed in LIFO order"
        );
        if let Some(checkpoint) = self.checkpoints.pop() {
            if !checkpoint.committed {
                self.position = checkpoint.position;
                self.tracker = SourceLocationTracker::new(checkpoint.location);
            }
        }
        self.release_buffer_if_drained();
    }

    #[inline]
    fn release_buffer_if_drained(&mut self) {
        if self.checkpoints.is_empty() && self.position >= self.buffer.len() {
            self.buffer.clear();
            self.position = 0;
        }
    }
}

/// An open lookahead scope
///
/// Dereferences to the reader, so reads go through the guard. Dropping it
/// rewinds the reader unless [`cancel_backtrack`](Self::cancel_backtrack) was
/// called first.
pub struct Lookahead<'r, S: TextSource> {
    reader: &'r mut LookaheadTextReader<S>,
    depth: usize,
}

impl<S: TextSource> Lookahead<'_, S> {
    /// Keep everything read in this scope
    ///
    /// Only this scope is committed; enclosing scopes may still rewind.
    pub fn cancel_backtrack(&mut self) {
        self.reader.checkpoints[self.depth - 1].committed = true;
    }
}

impl<S: TextSource> Deref for Lookahead<'_, S> {
    type Target = LookaheadTextReader<S>;

    fn deref(&self) -> &Self::Target {
        self.reader
    }
}

impl<S: TextSource> DerefMut for Lookahead<'_, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.reader
    }
}

impl<S: TextSource> Drop for Lookahead<'_, S> {
    fn drop(&mut self) {
        self.reader.end_lookahead(self.depth);
    }
}
