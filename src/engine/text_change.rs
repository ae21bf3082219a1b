//! Text Buffers and Changes
//!
//! A [`TextChange`] describes a single edit between two snapshots of a
//! document. Both snapshots are kept as [`TextBuffer`] values, so the old and
//! new text of the change can be sliced lazily.
//!
//! # Example
//!
//! ```text
//! old: "foo @bar baz"        new: "foo @bar. baz"
//!               ^ position 8        ^ position 8
//! old_length = 0, new_length = 1   => insertion of "."
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`TextBuffer`] snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BufferId(u64);

impl BufferId {
    fn next() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw id value
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for BufferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Immutable snapshot of a document's text
///
/// Cloning is cheap; clones share both text and id.
#[derive(Clone)]
pub struct TextBuffer {
    id: BufferId,
    text: Arc<str>,
}

impl TextBuffer {
    /// Create a snapshot with a fresh id
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self {
            id: BufferId::next(),
            text: text.into(),
        }
    }

    /// The snapshot id
    #[inline]
    pub fn id(&self) -> BufferId {
        self.id
    }

    /// The snapshot text
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Shared handle to the text
    #[inline]
    pub fn shared_text(&self) -> Arc<str> {
        Arc::clone(&self.text)
    }
}

impl Deref for TextBuffer {
    type Target = str;

    fn deref(&self) -> &str {
        &self.text
    }
}

impl fmt::Debug for TextBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextBuffer")
            .field("id", &self.id)
            .field("len", &self.text.len())
            .finish()
    }
}

impl PartialEq for TextBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TextBuffer {}

impl From<&str> for TextBuffer {
    fn from(text: &str) -> Self {
        TextBuffer::new(text)
    }
}

impl From<String> for TextBuffer {
    fn from(text: String) -> Self {
        TextBuffer::new(text)
    }
}

/// A single edit between two buffer snapshots
///
/// Positions and lengths are byte offsets into the respective buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChange {
    /// Where the change starts in the old buffer
    pub old_position: usize,
    /// Bytes removed from the old buffer
    pub old_length: usize,
    /// Where the change starts in the new buffer
    pub new_position: usize,
    /// Bytes inserted into the new buffer
    pub new_length: usize,
    old_buffer: TextBuffer,
    new_buffer: TextBuffer,
}

impl TextChange {
    /// Describe a change between two snapshots
    pub fn new(
        old_position: usize,
        old_length: usize,
        old_buffer: TextBuffer,
        new_position: usize,
        new_length: usize,
        new_buffer: TextBuffer,
    ) -> Self {
        Self {
            old_position,
            old_length,
            new_position,
            new_length,
            old_buffer,
            new_buffer,
        }
    }

    /// Build a change by replacing `old_length` bytes at `position` in `old_text` with `inserted`
    ///
    /// Both buffers are created here; the new one holds the edited text.
    pub fn edit(
        old_text: impl Into<TextBuffer>,
        position: usize,
        old_length: usize,
        inserted: &str,
    ) -> Self {
        let old_buffer = old_text.into();
        let text = old_buffer.text();
        let position = position.min(text.len());
        let end = (position + old_length).min(text.len());
        let mut new_text = String::with_capacity(text.len() - (end - position) + inserted.len());
        new_text.push_str(text.get(..position).unwrap_or(""));
        new_text.push_str(inserted);
        new_text.push_str(text.get(end..).unwrap_or(""));

        Self::new(
            position,
            end - position,
            old_buffer,
            position,
            inserted.len(),
            TextBuffer::new(new_text),
        )
    }

    /// Apply another edit on top of this change's new buffer
    pub fn then(&self, position: usize, old_length: usize, inserted: &str) -> TextChange {
        TextChange::edit(self.new_buffer.clone(), position, old_length, inserted)
    }

    /// The buffer before the change
    #[inline]
    pub fn old_buffer(&self) -> &TextBuffer {
        &self.old_buffer
    }

    /// The buffer after the change
    #[inline]
    pub fn new_buffer(&self) -> &TextBuffer {
        &self.new_buffer
    }

    /// Id of the buffer before the change
    #[inline]
    pub fn old_buffer_id(&self) -> BufferId {
        self.old_buffer.id()
    }

    /// Id of the buffer after the change
    #[inline]
    pub fn new_buffer_id(&self) -> BufferId {
        self.new_buffer.id()
    }

    /// Nothing was removed
    #[inline]
    pub fn is_insert(&self) -> bool {
        self.old_length == 0 && self.new_length > 0
    }

    /// Nothing was inserted
    #[inline]
    pub fn is_delete(&self) -> bool {
        self.old_length > 0 && self.new_length == 0
    }

    /// Text was both removed and inserted
    #[inline]
    pub fn is_replace(&self) -> bool {
        self.old_length > 0 && self.new_length > 0
    }

    /// End of the change in the old buffer
    #[inline]
    pub fn old_end(&self) -> usize {
        self.old_position + self.old_length
    }

    /// End of the change in the new buffer
    #[inline]
    pub fn new_end(&self) -> usize {
        self.new_position + self.new_length
    }

    /// Change in document length
    #[inline]
    pub fn delta(&self) -> isize {
        self.new_length as isize - self.old_length as isize
    }

    /// Text removed by the change
    pub fn old_text(&self) -> &str {
        self.old_buffer
            .get(self.old_position..self.old_end())
            .unwrap_or("")
    }

    /// Text inserted by the change
    pub fn new_text(&self) -> &str {
        self.new_buffer
            .get(self.new_position..self.new_end())
            .unwrap_or("")
    }

    /// Trim the prefix shared by the old and new text
    ///
    /// Editors often report completing `foo` to `foobar` as replacing `foo`
    /// with `foobar`; normalized, that becomes inserting `bar`.
    pub fn normalize(&self) -> TextChange {
        let old_text = self.old_text();
        let new_text = self.new_text();
        let common = old_text
            .char_indices()
            .zip(new_text.chars())
            .take_while(|((_, a), b)| a == b)
            .last()
            .map(|((i, c), _)| i + c.len_utf8())
            .unwrap_or(0);

        if common == 0 {
            return self.clone();
        }

        TextChange {
            old_position: self.old_position + common,
            old_length: self.old_length - common,
            new_position: self.new_position + common,
            new_length: self.new_length - common,
            old_buffer: self.old_buffer.clone(),
            new_buffer: self.new_buffer.clone(),
        }
    }

    /// Apply the change to `content`, which starts at byte `content_start` of the old buffer
    ///
    /// Returns `None` when the change does not lie within `content`.
    pub fn apply_to(&self, content: &str, content_start: usize) -> Option<String> {
        let relative = self.old_position.checked_sub(content_start)?;
        let relative_end = relative + self.old_length;
        let prefix = content.get(..relative)?;
        let suffix = content.get(relative_end..)?;

        let mut result = String::with_capacity(prefix.len() + self.new_length + suffix.len());
        result.push_str(prefix);
        result.push_str(self.new_text());
        result.push_str(suffix);
        Some(result)
    }
}

impl fmt::Display for TextChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}:{}) \"{}\" -> ({}:{}) \"{}\"",
            self.old_position,
            self.old_length,
            self.old_text().escape_debug(),
            self.new_position,
            self.new_length,
            self.new_text().escape_debug()
        )
    }
}
