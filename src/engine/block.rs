//! Syntax Tree Blocks
//!
//! A [`Block`] groups child spans and blocks that belong to one construct.
//! Blocks carry no text of their own; their extent is that of their first and
//! last descendant spans.
//!
//! ```text
//! "foo @user.name baz"
//!
//! Markup Block
//! ├── Markup Span "foo "
//! ├── Expression Block
//! │   ├── Transition Span "@"
//! │   └── Code Span "user.name"
//! └── Markup Span " baz"
//! ```
//!
//! Neighbour navigation goes through a [`SpanIndex`] built from the tree on
//! demand. Spans never point at each other.

use super::source_location::{SourceLocation, SourceLocationTracker};
use super::span::Span;
use serde::{Deserialize, Serialize};

/// Construct a block represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// Code statements (`@{ }`, `@if`, ...)
    Statement,
    /// Expression whose value is written out
    Expression,
    /// Directive (`@model`, `@using`, ...)
    Directive,
    /// Markup (the document root, tags inside code)
    Markup,
    /// Template comment
    Comment,
    /// Named section
    Section,
    /// Inline template (`@<p>...</p>`)
    Template,
    /// Class member block
    Functions,
    /// Helper definition
    Helper,
}

/// A child of a block
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyntaxNode {
    /// A leaf
    Span(Span),
    /// A nested block
    Block(Block),
}

impl SyntaxNode {
    /// The span, if this is one
    pub fn as_span(&self) -> Option<&Span> {
        match self {
            SyntaxNode::Span(span) => Some(span),
            SyntaxNode::Block(_) => None,
        }
    }

    /// The block, if this is one
    pub fn as_block(&self) -> Option<&Block> {
        match self {
            SyntaxNode::Span(_) => None,
            SyntaxNode::Block(block) => Some(block),
        }
    }
}

impl From<Span> for SyntaxNode {
    fn from(span: Span) -> Self {
        SyntaxNode::Span(span)
    }
}

impl From<Block> for SyntaxNode {
    fn from(block: Block) -> Self {
        SyntaxNode::Block(block)
    }
}

/// A composite node of the syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Block {
    /// Construct tag
    pub block_type: BlockType,
    /// Ordered children
    pub children: Vec<SyntaxNode>,
}

impl Block {
    /// Create an empty block
    pub fn new(block_type: BlockType) -> Self {
        Self {
            block_type,
            children: Vec::new(),
        }
    }

    /// Create a block from children
    pub fn with_children(block_type: BlockType, children: Vec<SyntaxNode>) -> Self {
        Self {
            block_type,
            children,
        }
    }

    /// Append a child
    pub fn push(&mut self, node: impl Into<SyntaxNode>) {
        self.children.push(node.into());
    }

    /// Depth-first iterator over descendant spans
    pub fn spans(&self) -> Spans<'_> {
        Spans {
            stack: vec![self.children.iter()],
        }
    }

    /// Visit every descendant span mutably, in document order
    pub fn for_each_span_mut<F: FnMut(&mut Span)>(&mut self, f: &mut F) {
        for child in &mut self.children {
            match child {
                SyntaxNode::Span(span) => f(span),
                SyntaxNode::Block(block) => block.for_each_span_mut(f),
            }
        }
    }

    /// First descendant span
    pub fn first_span(&self) -> Option<&Span> {
        self.spans().next()
    }

    /// Concatenated text of every descendant span
    pub fn content(&self) -> String {
        let mut text = String::with_capacity(self.length());
        for span in self.spans() {
            text.push_str(&span.content);
        }
        text
    }

    /// Location of the first descendant span
    pub fn start(&self) -> SourceLocation {
        self.first_span()
            .map(|span| span.start)
            .unwrap_or(SourceLocation::ZERO)
    }

    /// Total length in bytes
    pub fn length(&self) -> usize {
        self.spans().map(Span::length).sum()
    }

    /// Whether the block contains no spans
    pub fn is_empty(&self) -> bool {
        self.first_span().is_none()
    }

    /// Recompute the start of every span from `start` and the span contents
    ///
    /// A `\r\n` split across two spans is still one line break.
    pub fn relocate(&mut self, start: SourceLocation) {
        let text = self.content();
        let mut tracker = SourceLocationTracker::new(start);
        let mut offset = 0;
        self.for_each_span_mut(&mut |span| {
            span.start = tracker.location();
            let mut chars = text[offset..offset + span.content.len()].char_indices().peekable();
            while let Some((i, ch)) = chars.next() {
                let next = text[offset + i + ch.len_utf8()..].chars().next();
                tracker.update_location(ch, next);
            }
            offset += span.content.len();
        });
    }

    /// Span at a child-index path
    pub fn span_at_path(&self, path: &[usize]) -> Option<&Span> {
        let (last, parents) = path.split_last()?;
        let mut block = self;
        for &index in parents {
            block = block.children.get(index)?.as_block()?;
        }
        block.children.get(*last)?.as_span()
    }

    /// Mutable span at a child-index path
    pub fn span_at_path_mut(&mut self, path: &[usize]) -> Option<&mut Span> {
        let (last, parents) = path.split_last()?;
        let mut block = self;
        for &index in parents {
            block = match block.children.get_mut(index)? {
                SyntaxNode::Block(inner) => inner,
                SyntaxNode::Span(_) => return None,
            };
        }
        match block.children.get_mut(*last)? {
            SyntaxNode::Span(span) => Some(span),
            SyntaxNode::Block(_) => None,
        }
    }

    /// Count descendant blocks of a type, including this one
    pub fn count_blocks(&self, block_type: BlockType) -> usize {
        let own = usize::from(self.block_type == block_type);
        own + self
            .children
            .iter()
            .filter_map(SyntaxNode::as_block)
            .map(|block| block.count_blocks(block_type))
            .sum::<usize>()
    }
}

/// Depth-first span iterator returned by [`Block::spans`]
pub struct Spans<'a> {
    stack: Vec<std::slice::Iter<'a, SyntaxNode>>,
}

impl<'a> Iterator for Spans<'a> {
    type Item = &'a Span;

    fn next(&mut self) -> Option<&'a Span> {
        loop {
            let iter = self.stack.last_mut()?;
            match iter.next() {
                Some(SyntaxNode::Span(span)) => return Some(span),
                Some(SyntaxNode::Block(block)) => self.stack.push(block.children.iter()),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

// ============================================================================
// Span Index
// ============================================================================

/// Flattened position of one span
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanEntry {
    /// Child indices from the root to the span
    pub path: Vec<usize>,
    /// Byte offset of the span
    pub start: usize,
    /// Length of the span in bytes
    pub length: usize,
}

impl SpanEntry {
    /// Byte offset just past the span
    #[inline]
    pub fn end(&self) -> usize {
        self.start + self.length
    }
}

/// Document-order list of every span with its path
///
/// Stands in for previous/next links. Rebuild it whenever the tree changes
/// shape; in-place content edits only require shifting later offsets.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpanIndex {
    entries: Vec<SpanEntry>,
}

impl SpanIndex {
    /// Index every span of `root`
    pub fn build(root: &Block) -> Self {
        let mut entries = Vec::new();
        let mut path = Vec::new();
        Self::collect(root, &mut path, &mut entries);
        Self { entries }
    }

    fn collect(block: &Block, path: &mut Vec<usize>, entries: &mut Vec<SpanEntry>) {
        for (index, child) in block.children.iter().enumerate() {
            path.push(index);
            match child {
                SyntaxNode::Span(span) => entries.push(SpanEntry {
                    path: path.clone(),
                    start: span.start.absolute_offset,
                    length: span.length(),
                }),
                SyntaxNode::Block(inner) => Self::collect(inner, path, entries),
            }
            path.pop();
        }
    }

    /// Number of spans
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no spans
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at a document-order index
    #[inline]
    pub fn entry(&self, index: usize) -> Option<&SpanEntry> {
        self.entries.get(index)
    }

    /// All entries in document order
    #[inline]
    pub fn entries(&self) -> &[SpanEntry] {
        &self.entries
    }

    /// Span at a document-order index
    pub fn span<'a>(&self, root: &'a Block, index: usize) -> Option<&'a Span> {
        root.span_at_path(&self.entries.get(index)?.path)
    }

    /// Span before `index`
    pub fn previous<'a>(&self, root: &'a Block, index: usize) -> Option<&'a Span> {
        self.span(root, index.checked_sub(1)?)
    }

    /// Span after `index`
    pub fn next<'a>(&self, root: &'a Block, index: usize) -> Option<&'a Span> {
        self.span(root, index + 1)
    }

    /// Index of the first span containing byte `offset`
    pub fn locate(&self, offset: usize) -> Option<usize> {
        let index = self.entries.partition_point(|entry| entry.end() <= offset);
        self.entries
            .get(index)
            .filter(|entry| entry.start <= offset)
            .map(|_| index)
    }

    /// Shift the offsets after `index` after the span at `index` changed length
    pub fn adjust_after(&mut self, index: usize, delta: isize) {
        if let Some(entry) = self.entries.get_mut(index) {
            entry.length = (entry.length as isize + delta).max(0) as usize;
        }
        for entry in self.entries.iter_mut().skip(index + 1) {
            entry.start = (entry.start as isize + delta).max(0) as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::span::SpanKind;

    fn sample() -> Block {
        let mut expression = Block::new(BlockType::Expression);
        expression.push(Span::new(SpanKind::Transition, "@", SourceLocation::new(4, 0, 4)));
        expression.push(Span::new(SpanKind::Code, "user.name", SourceLocation::new(5, 0, 5)));

        let mut root = Block::new(BlockType::Markup);
        root.push(Span::markup("foo ", SourceLocation::ZERO));
        root.push(expression);
        root.push(Span::markup(" baz", SourceLocation::new(14, 0, 14)));
        root
    }

    #[test]
    fn test_spans_in_document_order() {
        let root = sample();
        let contents: Vec<&str> = root.spans().map(|s| s.content.as_str()).collect();
        assert_eq!(contents, vec!["foo ", "@", "user.name", " baz"]);
        assert_eq!(root.content(), "foo @user.name baz");
        assert_eq!(root.length(), 18);
    }

    #[test]
    fn test_span_index_navigation() {
        let root = sample();
        let index = SpanIndex::build(&root);
        assert_eq!(index.len(), 4);
        assert_eq!(index.entry(2).map(|e| e.path.clone()), Some(vec![1, 1]));
        assert_eq!(index.previous(&root, 2).map(|s| s.content.as_str()), Some("@"));
        assert_eq!(index.next(&root, 2).map(|s| s.content.as_str()), Some(" baz"));
        assert!(index.previous(&root, 0).is_none());
        assert_eq!(index.locate(6), Some(2));
        assert_eq!(index.locate(18), None);
    }

    #[test]
    fn test_relocate_after_content_change() {
        let mut root = sample();
        if let Some(span) = root.span_at_path_mut(&[1, 1]) {
            span.content = "user.\r\nname".to_string();
        }
        root.relocate(SourceLocation::ZERO);
        let last = root.spans().last().map(|s| s.start);
        assert_eq!(last, Some(SourceLocation::new(16, 1, 4)));
    }

    #[test]
    fn test_relocate_crlf_split_across_spans() {
        let mut root = Block::new(BlockType::Markup);
        root.push(Span::markup("a\r", SourceLocation::ZERO));
        root.push(Span::markup("\nb", SourceLocation::ZERO));
        root.push(Span::markup("c", SourceLocation::ZERO));
        root.relocate(SourceLocation::ZERO);
        let starts: Vec<SourceLocation> = root.spans().map(|s| s.start).collect();
        assert_eq!(starts[1], SourceLocation::new(2, 0, 2));
        assert_eq!(starts[2], SourceLocation::new(4, 1, 1));
    }

    #[test]
    fn test_count_blocks() {
        let root = sample();
        assert_eq!(root.count_blocks(BlockType::Expression), 1);
        assert_eq!(root.count_blocks(BlockType::Markup), 1);
    }
}
