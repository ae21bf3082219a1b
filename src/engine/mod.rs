//! Template engine core
//!
//! # Module Organization
//!
//! ## Reading
//! - [`source_location`] - Line/column/offset tracking
//! - [`text_reader`] - Buffering reader with nested lookahead
//! - [`text_change`] - Buffer snapshots and edits
//!
//! ## Syntax Tree
//! - [`span`] - Typed leaves
//! - [`block`] - Composite nodes and the span index
//!
//! ## Parsing
//! - [`dialect`] - Keyword tables and lexical rules
//! - [`parser`] - Parser entry point and limits
//!
//! ## Incremental Reparsing
//! - [`edit_policy`] - Per-span edit acceptance
//! - [`partial`] - Synchronous partial reparse
//! - [`background`] - Full reparses on a worker thread
//! - [`editor`] - Editor integration
//!
//! ## Code Generation
//! - [`visitor`] - Tree traversal
//! - [`code_writer`] - Target language spelling
//! - [`codegen`] - Generated code and mappings
//! - [`host`] - Class and runtime naming
//! - [`template_engine`] - Parse and generate in one call
//! - [`parallel`] - Batch generation
//!
//! ## Tooling
//! - [`error`] - Error types
//! - [`debug`] - Tree printing
//! - [`regex_cache`] - Compiled dialect patterns

pub mod background;
pub mod block;
pub mod code_writer;
pub mod codegen;
pub(crate) mod context;
pub mod debug;
pub mod dialect;
pub mod edit_policy;
pub mod editor;
pub mod error;
pub mod host;
pub mod parallel;
pub mod parser;
pub mod partial;
pub mod regex_cache;
pub mod source_location;
pub mod span;
pub mod template_engine;
pub mod text_change;
pub mod text_reader;
pub mod visitor;

mod code_parser;
mod markup_parser;

pub use background::{BackgroundParser, DocumentParseComplete};
pub use block::{Block, BlockType, SpanEntry, SpanIndex, SyntaxNode};
pub use code_writer::{BasicWriter, CSharpWriter, CodeWriter};
pub use codegen::{CodeGenerator, GeneratorResults, LineMapping};
pub use context::{CancellationToken, ParserMode};
pub use debug::TreePrinter;
pub use dialect::{
    Dialect, DialectError, DirectiveKind, DirectiveRule, KeywordBehavior, KeywordTable,
    StatementBoundary, StatementRule, SyntaxRules, TargetLanguage,
};
pub use edit_policy::{EditPolicy, PartialParseResult};
pub use editor::{EditorParser, TreeSnapshot};
pub use error::{ParseError, RazorError, ReaderError, SourceError};
pub use host::{GeneratedCodeContext, HostConfig};
pub use parallel::{generate_batch, parse_batch, ParallelConfig};
pub use parser::{ParserConfig, ParserResults, RazorParser};
pub use partial::PartialParser;
pub use source_location::{SourceLocation, SourceLocationTracker};
pub use span::{AcceptedCharacters, Span, SpanGenerator, SpanKind};
pub use template_engine::TemplateEngine;
pub use text_change::{BufferId, TextBuffer, TextChange};
pub use text_reader::{LookaheadTextReader, ReadSource, StrSource, StringSource, TextSource};
