//! Razorblade - Incremental Razor-Style Template Parser
//!
//! Parses templates that mix markup with code introduced by a transition
//! character (`@`), keeps the syntax tree current while the document is
//! edited, and generates target-language source with a map back to the
//! template. It provides:
//! - A buffering text reader with arbitrarily nested lookahead
//! - A lossless tree of typed spans and blocks
//! - Markup/code parsing driven by pluggable keyword tables (dialects)
//! - Non-aborting structural error reporting
//! - Partial reparsing of single edits with a background fallback
//! - Code generation with design-time source mappings
//!
//! ## Quick Start
//!
//! ```rust
//! use razorblade::RazorParser;
//!
//! let results = RazorParser::c_like().parse_str("foo @user.name baz").unwrap();
//! assert!(results.success);
//! assert_eq!(results.document.content(), "foo @user.name baz");
//! ```
//!
//! ## Incremental Editing
//!
//! ```rust
//! use razorblade::{PartialParseResult, PartialParser, RazorParser, TextBuffer, TextChange};
//!
//! let parser = RazorParser::c_like();
//! let buffer = TextBuffer::new("foo @bar baz");
//! let tree = parser.parse_str(buffer.text()).unwrap().document;
//! let mut partial = PartialParser::new(parser.shared_dialect(), tree);
//!
//! let change = TextChange::edit(buffer, 8, 0, "s");
//! assert_eq!(partial.apply_change(&change), PartialParseResult::ACCEPTED);
//! assert_eq!(partial.tree().content(), "foo @bars baz");
//! ```
//!
//! ## Code Generation
//!
//! ```rust
//! use razorblade::{HostConfig, RazorParser, TemplateEngine};
//!
//! let engine = TemplateEngine::new(
//!     RazorParser::c_like(),
//!     HostConfig::new().with_design_time(true),
//! );
//! let results = engine.generate_code("<p>@Model.Title</p>").unwrap();
//! assert_eq!(results.mappings.len(), 1);
//! ```
//!
//! ## Feature Flags
//!
//! - `logging` - Enable debug logging using the `log` crate
//! - `parallel` - Generate batches of templates on rayon's thread pool

#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all)]
#![allow(clippy::new_without_default)]
#![allow(clippy::module_inception)]

/// Logging macros - no-op when logging feature is disabled
#[cfg(not(feature = "logging"))]
macro_rules! log_debug {
    ($($arg:tt)*) => {{
        if false {
            let _ = format_args!($($arg)*);
        }
    }};
}

/// Logging macros - use log crate when logging feature is enabled
#[cfg(feature = "logging")]
macro_rules! log_debug {
    ($($arg:tt)*) => { log::debug!($($arg)*) };
}

#[cfg(not(feature = "logging"))]
macro_rules! log_trace {
    ($($arg:tt)*) => {{
        if false {
            let _ = format_args!($($arg)*);
        }
    }};
}

#[cfg(feature = "logging")]
macro_rules! log_trace {
    ($($arg:tt)*) => { log::trace!($($arg)*) };
}

// Prelude module for convenient imports
pub mod prelude;

pub mod engine;

/// Re-export commonly used types for convenience
pub use engine::{
    // Incremental reparsing
    background::{BackgroundParser, DocumentParseComplete},
    // Syntax tree
    block::{Block, BlockType, SpanIndex, SyntaxNode},
    // Code generation
    codegen::{CodeGenerator, GeneratorResults, LineMapping},
    context::CancellationToken,
    // Debug tools
    debug::TreePrinter,
    // Dialects
    dialect::{Dialect, DirectiveKind, DirectiveRule, KeywordBehavior, KeywordTable, TargetLanguage},
    edit_policy::{EditPolicy, PartialParseResult},
    editor::{EditorParser, TreeSnapshot},
    // Errors
    error::{ParseError, RazorError, ReaderError, SourceError},
    host::{GeneratedCodeContext, HostConfig},
    parallel::{generate_batch, ParallelConfig},
    // Parsing
    parser::{ParserConfig, ParserResults, RazorParser},
    partial::PartialParser,
    source_location::{SourceLocation, SourceLocationTracker},
    span::{AcceptedCharacters, Span, SpanGenerator, SpanKind},
    template_engine::TemplateEngine,
    text_change::{TextBuffer, TextChange},
    text_reader::{LookaheadTextReader, ReadSource, StrSource, StringSource, TextSource},
    visitor::{walk, ParserVisitor},
};
