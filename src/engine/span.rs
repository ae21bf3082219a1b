//! Syntax Tree Leaves
//!
//! A [`Span`] is one contiguous, typed run of source text. Every character of
//! a parsed document belongs to exactly one span, so concatenating the spans
//! of a tree in order reproduces the input.
//!
//! Besides its [`SpanKind`], each span carries two dispatch tags filled in by
//! the parser:
//!
//! - [`EditPolicy`] decides whether an edit inside the span can be absorbed
//!   without a full reparse
//! - [`SpanGenerator`] decides what code the span contributes

use super::edit_policy::EditPolicy;
use super::source_location::{SourceLocation, SourceLocationTracker};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a span contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpanKind {
    /// Literal markup
    Markup,
    /// The transition character, or a `<text>` wrapper tag
    Transition,
    /// Syntax that frames code without being code (`{`, `}`, keywords of directives)
    MetaCode,
    /// Body of a template comment
    Comment,
    /// Target language code
    Code,
}

/// How much trailing input a span may absorb during partial reparsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AcceptedCharacters {
    /// Any character
    Any,
    /// Anything but whitespace
    NonWhitespace,
    /// Nothing; edits at the end belong to the next span
    None,
}

/// Code contributed by a span
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SpanGenerator {
    /// Contributes nothing
    #[default]
    None,
    /// Written out verbatim as literal output
    Literal,
    /// Inserted as statement code
    Statement,
    /// Evaluated and written as output
    Expression,
    /// Model type declaration value
    ModelType,
    /// Base type declaration value
    BaseType,
    /// Layout page value
    Layout,
    /// Namespace import value
    Import,
    /// Section name
    SectionName,
    /// Helper signature
    HelperHeader,
    /// Class member code
    TypeMember,
}

/// A leaf of the syntax tree
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    /// Kind tag
    pub kind: SpanKind,
    /// Raw source text
    pub content: String,
    /// Location of the first character
    pub start: SourceLocation,
    /// Trailing input policy
    pub accepted_characters: AcceptedCharacters,
    /// Excluded from visible output
    pub hidden: bool,
    /// Partial reparse policy
    pub edit_policy: EditPolicy,
    /// Code generation role
    pub generator: SpanGenerator,
}

impl Span {
    /// Create a visible span that accepts any trailing input and generates nothing
    pub fn new(kind: SpanKind, content: impl Into<String>, start: SourceLocation) -> Self {
        Self {
            kind,
            content: content.into(),
            start,
            accepted_characters: AcceptedCharacters::Any,
            hidden: false,
            edit_policy: EditPolicy::Fixed,
            generator: SpanGenerator::None,
        }
    }

    /// Literal markup span
    pub fn markup(content: impl Into<String>, start: SourceLocation) -> Self {
        Self::new(SpanKind::Markup, content, start)
            .with_edit_policy(EditPolicy::Markup)
            .with_generator(SpanGenerator::Literal)
    }

    /// Set the accepted characters
    pub fn with_accepted(mut self, accepted: AcceptedCharacters) -> Self {
        self.accepted_characters = accepted;
        self
    }

    /// Set the edit policy
    pub fn with_edit_policy(mut self, policy: EditPolicy) -> Self {
        self.edit_policy = policy;
        self
    }

    /// Set the generator
    pub fn with_generator(mut self, generator: SpanGenerator) -> Self {
        self.generator = generator;
        self
    }

    /// Mark the span hidden
    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    /// Length in bytes
    #[inline]
    pub fn length(&self) -> usize {
        self.content.len()
    }

    /// Whether the span holds no text
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Byte offset just past the span
    #[inline]
    pub fn end_offset(&self) -> usize {
        self.start.absolute_offset + self.content.len()
    }

    /// Location just past the span
    pub fn end_location(&self) -> SourceLocation {
        SourceLocationTracker::calculate_new_location(self.start, &self.content)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} Span at {}", self.kind, self.start)?;
        if self.hidden {
            write!(f, " (hidden)")?;
        }
        write!(f, " \"{}\"", self.content.escape_debug())
    }
}
