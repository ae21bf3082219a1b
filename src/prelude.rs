//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from
//! razorblade. Importing this module with a wildcard import brings the core
//! types into scope:
//!
//! ```
//! use razorblade::prelude::*;
//!
//! let results = RazorParser::c_like().parse_str("Hi @name").unwrap();
//! assert!(results.success);
//! ```
//!
//! # Re-exported Items
//!
//! ## Parsing
//! - [`RazorParser`] - Parser for one dialect
//! - [`ParserConfig`] - Parse limits
//! - [`ParserResults`] - Tree plus structural errors
//! - [`Dialect`] - Keyword table and lexical rules
//!
//! ## Syntax Tree
//! - [`Block`], [`Span`], [`SyntaxNode`] - Tree nodes
//! - [`BlockType`], [`SpanKind`] - Node kinds
//!
//! ## Editing
//! - [`TextBuffer`], [`TextChange`] - Snapshots and edits
//! - [`PartialParser`], [`PartialParseResult`] - In-place reparsing
//! - [`EditorParser`] - Partial reparsing with a background fallback
//!
//! ## Code Generation
//! - [`TemplateEngine`] - Parse and generate in one call
//! - [`HostConfig`] - Generated class settings
//! - [`GeneratorResults`], [`LineMapping`] - Output and source map
//! - [`ParserVisitor`] - Tree traversal trait

// ============================================================================
// Parsing
// ============================================================================

pub use crate::engine::dialect::Dialect;
pub use crate::engine::parser::{ParserConfig, ParserResults, RazorParser};
pub use crate::engine::source_location::SourceLocation;
pub use crate::engine::text_reader::TextSource;

// ============================================================================
// Syntax Tree
// ============================================================================

pub use crate::engine::block::{Block, BlockType, SyntaxNode};
pub use crate::engine::span::{Span, SpanKind};

// ============================================================================
// Editing
// ============================================================================

pub use crate::engine::edit_policy::PartialParseResult;
pub use crate::engine::editor::EditorParser;
pub use crate::engine::partial::PartialParser;
pub use crate::engine::text_change::{TextBuffer, TextChange};

// ============================================================================
// Code Generation
// ============================================================================

pub use crate::engine::codegen::{GeneratorResults, LineMapping};
pub use crate::engine::host::HostConfig;
pub use crate::engine::template_engine::TemplateEngine;
pub use crate::engine::visitor::ParserVisitor;

// ============================================================================
// Errors
// ============================================================================

pub use crate::engine::error::{ParseError, RazorError};
