//! Template Parser
//!
//! Entry point of the parser core. [`RazorParser`] owns a dialect and a set
//! of limits and runs the markup/code parser pair over any [`TextSource`]:
//!
//! ```text
//! source ──► LookaheadTextReader ──► MarkupParser ⇄ CodeParser ──► Block tree
//!                                                          └──────► errors
//! ```
//!
//! Structural errors are data in [`ParserResults`]. Only fatal conditions
//! (limits, cancellation, failing sources) produce a [`ParseError`].

use super::block::Block;
use super::context::{CancellationToken, ParserContext};
use super::dialect::Dialect;
use super::error::{ParseError, RazorError};
use super::markup_parser::MarkupParser;
use super::text_reader::{ReadSource, StrSource, TextSource, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::sync::Arc;

/// Default maximum input size: 100 MB
pub const DEFAULT_MAX_INPUT_SIZE: usize = 100 * 1024 * 1024;

/// Default maximum nesting depth of blocks
pub const DEFAULT_MAX_BLOCK_DEPTH: usize = 256;

/// Limits applied to a parse
///
/// # Example
///
/// ```
/// use razorblade::ParserConfig;
///
/// let config = ParserConfig::new()
///     .with_max_input_size(1024 * 1024)
///     .with_max_block_depth(64);
/// assert_eq!(config.max_block_depth, 64);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserConfig {
    /// Maximum allowed input size in bytes
    pub max_input_size: usize,

    /// Maximum allowed block nesting depth
    pub max_block_depth: usize,

    /// Bytes pulled per read from an `io::Read` source
    pub chunk_size: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            max_input_size: DEFAULT_MAX_INPUT_SIZE,
            max_block_depth: DEFAULT_MAX_BLOCK_DEPTH,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ParserConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum input size
    pub fn with_max_input_size(mut self, size: usize) -> Self {
        self.max_input_size = size;
        self
    }

    /// Set the maximum block nesting depth
    pub fn with_max_block_depth(mut self, depth: usize) -> Self {
        self.max_block_depth = depth;
        self
    }

    /// Set the read chunk size for `io::Read` sources
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(4);
        self
    }
}

/// Outcome of a completed parse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserResults {
    /// Root markup block of the document
    pub document: Block,
    /// Structural errors, in document order of discovery
    pub errors: Vec<RazorError>,
    /// Whether no structural errors were found
    pub success: bool,
}

impl ParserResults {
    /// Bundle a tree with its errors
    pub fn new(document: Block, errors: Vec<RazorError>) -> Self {
        Self {
            success: errors.is_empty(),
            document,
            errors,
        }
    }

    /// Serialize the tree and errors to JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parser for one template dialect
///
/// Cheap to clone; the dialect is shared.
#[derive(Debug, Clone)]
pub struct RazorParser {
    dialect: Arc<Dialect>,
    config: ParserConfig,
}

impl Default for RazorParser {
    fn default() -> Self {
        Self::c_like()
    }
}

impl RazorParser {
    /// Create a parser for `dialect` with default limits
    pub fn new(dialect: Dialect) -> Self {
        Self::with_shared_dialect(Arc::new(dialect))
    }

    /// Create a parser sharing an existing dialect
    pub fn with_shared_dialect(dialect: Arc<Dialect>) -> Self {
        Self {
            dialect,
            config: ParserConfig::default(),
        }
    }

    /// Parser for the brace-delimited dialect
    pub fn c_like() -> Self {
        Self::new(Dialect::c_like())
    }

    /// Parser for the line-oriented dialect
    pub fn basic_like() -> Self {
        Self::new(Dialect::basic_like())
    }

    /// Replace the limits
    pub fn with_config(mut self, config: ParserConfig) -> Self {
        self.config = config;
        self
    }

    /// The dialect being parsed
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// The shared dialect handle
    pub fn shared_dialect(&self) -> Arc<Dialect> {
        Arc::clone(&self.dialect)
    }

    /// The limits in effect
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Parse a whole document from `source`
    pub fn parse<S: TextSource>(&self, source: S) -> Result<ParserResults, ParseError> {
        self.parse_with_cancellation(source, CancellationToken::new())
    }

    /// Parse an in-memory document
    pub fn parse_str(&self, input: &str) -> Result<ParserResults, ParseError> {
        if input.len() > self.config.max_input_size {
            return Err(ParseError::InputTooLarge {
                input_size: input.len(),
                max_size: self.config.max_input_size,
            });
        }
        self.parse(StrSource::new(input))
    }

    /// Parse a document read from a byte stream
    pub fn parse_reader<R: Read>(&self, reader: R) -> Result<ParserResults, ParseError> {
        self.parse(ReadSource::with_chunk_size(reader, self.config.chunk_size))
    }

    /// Parse, stopping with [`ParseError::Cancelled`] once `cancellation` fires
    pub fn parse_with_cancellation<S: TextSource>(
        &self,
        source: S,
        cancellation: CancellationToken,
    ) -> Result<ParserResults, ParseError> {
        log_debug!("Parsing with the {} dialect", self.dialect.name);

        let mut context = ParserContext::new(source, &self.dialect, &self.config, cancellation);
        MarkupParser::parse_document(&mut context);
        let (document, errors) = context.finish()?;

        log_debug!(
            "Parsed {} bytes with {} structural errors",
            document.length(),
            errors.len()
        );
        Ok(ParserResults::new(document, errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::block::BlockType;
    use crate::engine::span::SpanKind;

    #[test]
    fn test_tree_text_equals_input() {
        let input = "<ul>\r\n@foreach (var i in items) {\n  <li>@i.Name</li>\n}\r\n</ul>@* c *@";
        let results = RazorParser::c_like().parse_str(input).unwrap();
        assert!(results.success, "{:?}", results.errors);
        assert_eq!(results.document.content(), input);
        assert_eq!(results.document.block_type, BlockType::Markup);
    }

    #[test]
    fn test_span_starts_are_contiguous() {
        let input = "a\n@if (x) {\n<b>@y</b>\n}\nz";
        let results = RazorParser::c_like().parse_str(input).unwrap();
        let mut expected = 0;
        for span in results.document.spans() {
            assert_eq!(span.start.absolute_offset, expected);
            assert_eq!(
                span.start,
                crate::engine::source_location::SourceLocation::from_offset(input, expected)
            );
            expected += span.length();
        }
        assert_eq!(expected, input.len());
    }

    #[test]
    fn test_reader_and_str_sources_agree() {
        let input = "héllo @wörld.ñame ü ok";
        let parser = RazorParser::c_like().with_config(ParserConfig::new().with_chunk_size(4));
        let from_str = parser.parse_str(input).unwrap();
        let from_reader = parser.parse_reader(input.as_bytes()).unwrap();
        assert_eq!(from_str, from_reader);
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let bytes: &[u8] = &[b'a', 0xff, b'b'];
        let result = RazorParser::c_like().parse_reader(bytes);
        assert!(matches!(result, Err(ParseError::Source(_))));
    }

    #[test]
    fn test_input_too_large() {
        let parser = RazorParser::c_like().with_config(ParserConfig::new().with_max_input_size(4));
        assert!(matches!(
            parser.parse_str("hello"),
            Err(ParseError::InputTooLarge { input_size: 5, max_size: 4 })
        ));
    }

    #[test]
    fn test_block_depth_limit() {
        let parser = RazorParser::c_like().with_config(ParserConfig::new().with_max_block_depth(3));
        let input = "@{ <p>@{ <p>@{ <p>@x</p> }</p> }</p> }";
        assert!(matches!(
            parser.parse_str(input),
            Err(ParseError::RecursionLimitExceeded { max_depth: 3, .. })
        ));
    }

    #[test]
    fn test_pre_cancelled_parse() {
        let token = CancellationToken::new();
        token.cancel();
        let result = RazorParser::c_like().parse_with_cancellation(StrSource::new("a @b c"), token);
        assert!(matches!(result, Err(ParseError::Cancelled)));
    }

    #[test]
    fn test_results_to_json() {
        let results = RazorParser::c_like().parse_str("x @y").unwrap();
        let json = results.to_json().unwrap();
        assert!(json.contains("\"success\":true"));
        let back: ParserResults = serde_json::from_str(&json).unwrap();
        assert_eq!(back, results);
        assert_eq!(back.document.spans().nth(1).map(|s| s.kind), Some(SpanKind::Transition));
    }
}
