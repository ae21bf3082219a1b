//! Shared Parser State
//!
//! [`ParserContext`] is handed back and forth between the markup and code
//! parsers. It owns the reader, the stack of open blocks and the text of the
//! span currently being accumulated. Parsers `accept` characters into the
//! pending span and `output_span` once a lexical unit is complete, so every
//! character of the input lands in exactly one span.
//!
//! Lookahead is only used to make decisions: the `peek_*` and `next_is`
//! helpers always rewind.
//!
//! # Fatal conditions
//!
//! Exceeding a limit, a cancelled token or a failing source mark the context
//! as stopped. A stopped context reports end of input, so both parsers unwind
//! naturally and [`ParserContext::finish`] returns the fatal error.

use super::block::{Block, BlockType, SyntaxNode};
use super::dialect::{Dialect, DirectiveKind, DirectiveRule};
use super::edit_policy::EditPolicy;
use super::error::{ParseError, RazorError};
use super::parser::ParserConfig;
use super::source_location::SourceLocation;
use super::span::{AcceptedCharacters, Span, SpanGenerator, SpanKind};
use super::text_reader::{LookaheadTextReader, TextSource};
use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation flag shared between threads
///
/// Parsers poll it at span boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create an untriggered token
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation was requested
    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Which parser is currently active
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserMode {
    /// The markup parser
    Markup,
    /// The code parser
    Code,
}

/// State shared by the markup and code parsers
pub struct ParserContext<'d, S: TextSource> {
    reader: LookaheadTextReader<S>,
    dialect: &'d Dialect,
    mode: ParserMode,
    blocks: Vec<Block>,
    content: String,
    span_start: SourceLocation,
    errors: Vec<RazorError>,
    directives: HashMap<DirectiveKind, (String, SourceLocation)>,
    cancellation: CancellationToken,
    max_input_size: usize,
    max_block_depth: usize,
    fatal: Option<ParseError>,
    in_section: bool,
}

impl<'d, S: TextSource> ParserContext<'d, S> {
    /// Create a context with an open document block
    pub fn new(
        source: S,
        dialect: &'d Dialect,
        config: &ParserConfig,
        cancellation: CancellationToken,
    ) -> Self {
        Self {
            reader: LookaheadTextReader::new(source),
            dialect,
            mode: ParserMode::Markup,
            blocks: vec![Block::new(BlockType::Markup)],
            content: String::new(),
            span_start: SourceLocation::ZERO,
            errors: Vec::new(),
            directives: HashMap::new(),
            cancellation,
            max_input_size: config.max_input_size,
            max_block_depth: config.max_block_depth,
            fatal: None,
            in_section: false,
        }
    }

    /// The dialect being parsed
    #[inline]
    pub fn dialect(&self) -> &'d Dialect {
        self.dialect
    }

    /// The transition character of the dialect
    #[inline]
    pub fn transition(&self) -> char {
        self.dialect.transition
    }

    /// The active parser
    #[inline]
    pub fn mode(&self) -> ParserMode {
        self.mode
    }

    /// Switch the active parser, returning the previous one
    pub fn switch_mode(&mut self, mode: ParserMode) -> ParserMode {
        std::mem::replace(&mut self.mode, mode)
    }

    /// Location of the next character
    #[inline]
    pub fn current_location(&self) -> SourceLocation {
        self.reader.current_location()
    }

    /// Whether parsing has stopped for a fatal reason
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.fatal.is_some()
    }

    /// Whether a section body is being parsed
    #[inline]
    pub fn in_section(&self) -> bool {
        self.in_section
    }

    /// Set the section flag, returning the previous value
    pub fn set_in_section(&mut self, value: bool) -> bool {
        std::mem::replace(&mut self.in_section, value)
    }

    fn stop(&mut self, error: ParseError) {
        if self.fatal.is_none() {
            log_debug!("Parse stopped: {}", error);
            self.fatal = Some(error);
        }
    }

    // ========================================================================
    // Lookahead
    // ========================================================================

    /// The next character
    #[inline]
    pub fn peek(&mut self) -> Option<char> {
        if self.fatal.is_some() {
            return None;
        }
        self.reader.peek()
    }

    /// The character `n` positions ahead
    pub fn peek_at(&mut self, n: usize) -> Option<char> {
        if self.fatal.is_some() {
            return None;
        }
        let mut lookahead = self.reader.begin_lookahead();
        for _ in 0..n {
            lookahead.read()?;
        }
        lookahead.peek()
    }

    /// Whether the input continues with `literal`
    pub fn next_is(&mut self, literal: &str) -> bool {
        if self.fatal.is_some() {
            return false;
        }
        let mut lookahead = self.reader.begin_lookahead();
        literal.chars().all(|expected| lookahead.read() == Some(expected))
    }

    /// The identifier starting `skip` characters ahead
    pub fn peek_identifier(&mut self, skip: usize) -> String {
        if self.fatal.is_some() {
            return String::new();
        }
        let mut lookahead = self.reader.begin_lookahead();
        for _ in 0..skip {
            if lookahead.read().is_none() {
                return String::new();
            }
        }
        lookahead.read_while(|ch| ch.is_alphanumeric() || ch == '_')
    }

    /// The rest of the current line, without its line break
    pub fn peek_line(&mut self) -> String {
        if self.fatal.is_some() {
            return String::new();
        }
        let mut lookahead = self.reader.begin_lookahead();
        lookahead.read_while(|ch| ch != '\n' && ch != '\r')
    }

    /// Characters of whitespace followed by a word, and the word
    ///
    /// Used to look for continuation keywords such as `else`.
    pub fn peek_word_after_whitespace(&mut self) -> (usize, String) {
        if self.fatal.is_some() {
            return (0, String::new());
        }
        let mut lookahead = self.reader.begin_lookahead();
        let whitespace = lookahead.read_while(char::is_whitespace).chars().count();
        let word = lookahead.read_while(|ch| ch.is_alphanumeric() || ch == '_');
        (whitespace, word)
    }

    /// First non-whitespace character after inline whitespace
    pub fn peek_after_inline_whitespace(&mut self, skip: usize) -> Option<char> {
        if self.fatal.is_some() {
            return None;
        }
        let mut lookahead = self.reader.begin_lookahead();
        for _ in 0..skip {
            lookahead.read()?;
        }
        lookahead.read_while(|ch| ch == ' ' || ch == '\t');
        lookahead.peek()
    }

    /// Length of inline whitespace plus a line break, if that is what follows
    pub fn peek_blank_line_end(&mut self) -> Option<usize> {
        if self.fatal.is_some() {
            return None;
        }
        let mut lookahead = self.reader.begin_lookahead();
        let mut count = lookahead.read_while(|ch| ch == ' ' || ch == '\t').chars().count();
        match lookahead.read() {
            Some('\n') => Some(count + 1),
            Some('\r') => {
                count += 1;
                if lookahead.peek() == Some('\n') {
                    count += 1;
                }
                Some(count)
            }
            _ => None,
        }
    }

    // ========================================================================
    // Accepting
    // ========================================================================

    /// Move the next character into the pending span
    pub fn accept(&mut self) -> Option<char> {
        if self.fatal.is_some() {
            return None;
        }
        if self.content.is_empty() {
            self.span_start = self.reader.current_location();
        }
        let ch = self.reader.read()?;
        self.content.push(ch);

        let offset = self.reader.current_location().absolute_offset;
        if offset > self.max_input_size {
            self.stop(ParseError::InputTooLarge {
                input_size: offset,
                max_size: self.max_input_size,
            });
        }
        Some(ch)
    }

    /// Accept `count` characters
    pub fn accept_n(&mut self, count: usize) {
        for _ in 0..count {
            if self.accept().is_none() {
                break;
            }
        }
    }

    /// Accept the characters of `literal` if the input continues with it
    pub fn try_accept(&mut self, literal: &str) -> bool {
        if self.next_is(literal) {
            self.accept_n(literal.chars().count());
            true
        } else {
            false
        }
    }

    /// Accept while `predicate` holds, returning the accepted text
    pub fn accept_while<F: FnMut(char) -> bool>(&mut self, mut predicate: F) -> String {
        let mut accepted = String::new();
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.accept();
            accepted.push(ch);
        }
        accepted
    }

    /// Accept spaces and tabs
    pub fn accept_inline_whitespace(&mut self) -> String {
        self.accept_while(|ch| ch == ' ' || ch == '\t')
    }

    /// Accept up to, not including, the next line break
    pub fn accept_until_line_end(&mut self) -> String {
        self.accept_while(|ch| ch != '\n' && ch != '\r')
    }

    /// Accept up to and including the next line break
    pub fn accept_line(&mut self) {
        self.accept_until_line_end();
        if self.accept() == Some('\r') && self.peek() == Some('\n') {
            self.accept();
        }
    }

    /// Last character of the pending span
    #[inline]
    pub fn last_accepted(&self) -> Option<char> {
        self.content.chars().last()
    }

    /// Whether the pending span has text
    #[inline]
    pub fn has_pending(&self) -> bool {
        !self.content.is_empty()
    }

    // ========================================================================
    // Output
    // ========================================================================

    fn push_span(&mut self, span: Span) {
        if let Some(block) = self.blocks.last_mut() {
            block.children.push(SyntaxNode::Span(span));
        }
        if self.cancellation.is_cancelled() {
            self.stop(ParseError::Cancelled);
        }
    }

    fn take_span(
        &mut self,
        kind: SpanKind,
        accepted: AcceptedCharacters,
        policy: EditPolicy,
        generator: SpanGenerator,
    ) -> Span {
        let start = if self.content.is_empty() {
            self.reader.current_location()
        } else {
            self.span_start
        };
        Span {
            kind,
            content: std::mem::take(&mut self.content),
            start,
            accepted_characters: accepted,
            hidden: false,
            edit_policy: policy,
            generator,
        }
    }

    /// Emit the pending text as a span, if there is any
    pub fn output_span(
        &mut self,
        kind: SpanKind,
        accepted: AcceptedCharacters,
        policy: EditPolicy,
        generator: SpanGenerator,
    ) {
        if self.content.is_empty() {
            return;
        }
        let span = self.take_span(kind, accepted, policy, generator);
        self.push_span(span);
    }

    /// Emit the pending text as a span, even when empty
    pub fn output_span_always(
        &mut self,
        kind: SpanKind,
        accepted: AcceptedCharacters,
        policy: EditPolicy,
        generator: SpanGenerator,
    ) {
        let span = self.take_span(kind, accepted, policy, generator);
        self.push_span(span);
    }

    /// Emit the pending text as a hidden span
    pub fn output_hidden(&mut self, kind: SpanKind) {
        if self.content.is_empty() {
            return;
        }
        let mut span = self.take_span(
            kind,
            AcceptedCharacters::None,
            EditPolicy::Fixed,
            SpanGenerator::None,
        );
        span.hidden = true;
        self.push_span(span);
    }

    /// Emit pending markup
    pub fn output_markup(&mut self) {
        self.output_span(
            SpanKind::Markup,
            AcceptedCharacters::Any,
            EditPolicy::Markup,
            SpanGenerator::Literal,
        );
    }

    /// Emit pending code with a default code policy
    pub fn output_code(&mut self, generator: SpanGenerator) {
        self.output_span(
            SpanKind::Code,
            AcceptedCharacters::Any,
            EditPolicy::Code {
                auto_complete: None,
            },
            generator,
        );
    }

    /// Emit pending framing syntax
    pub fn output_meta(&mut self, accepted: AcceptedCharacters) {
        self.output_span(
            SpanKind::MetaCode,
            accepted,
            EditPolicy::Fixed,
            SpanGenerator::None,
        );
    }

    /// Accept the transition character and emit it as its own span
    pub fn accept_transition(&mut self) {
        self.accept();
        self.output_span(
            SpanKind::Transition,
            AcceptedCharacters::None,
            EditPolicy::Fixed,
            SpanGenerator::None,
        );
    }

    // ========================================================================
    // Blocks
    // ========================================================================

    /// Open a child block
    pub fn start_block(&mut self, block_type: BlockType) {
        debug_assert!(self.content.is_empty(), "pending text must be output first");
        if self.blocks.len() > self.max_block_depth {
            self.stop(ParseError::RecursionLimitExceeded {
                depth: self.blocks.len(),
                max_depth: self.max_block_depth,
            });
        }
        self.blocks.push(Block::new(block_type));
    }

    /// Close the innermost block and attach it to its parent
    pub fn end_block(&mut self) {
        debug_assert!(self.content.is_empty(), "pending text must be output first");
        if self.blocks.len() <= 1 {
            return;
        }
        if let Some(block) = self.blocks.pop() {
            if let Some(parent) = self.blocks.last_mut() {
                parent.children.push(SyntaxNode::Block(block));
            }
        }
    }

    // ========================================================================
    // Errors
    // ========================================================================

    /// Record a structural error
    pub fn on_error(&mut self, message: impl Into<String>, location: SourceLocation, length: usize) {
        let error = RazorError::new(message, location, length);
        log_trace!("Structural error: {}", error);
        self.errors.push(error);
    }

    /// Record a directive occurrence and report duplicates and conflicts
    pub fn register_directive(
        &mut self,
        keyword: &str,
        rule: &DirectiveRule,
        location: SourceLocation,
    ) {
        if rule.unique {
            if let Some((_, first)) = self.directives.get(&rule.kind) {
                let first = *first;
                self.on_error(
                    format!(
                        "Only one \"{}\" statement is allowed in a file; the first one is at line {}, column {}.",
                        keyword,
                        first.line + 1,
                        first.column + 1
                    ),
                    location,
                    keyword.len(),
                );
                return;
            }
        }

        let conflict = rule
            .excludes
            .iter()
            .find_map(|kind| self.directives.get(kind).cloned());
        if let Some((other, at)) = conflict {
            self.on_error(
                format!(
                    "The \"{}\" keyword cannot be used together with the \"{}\" keyword at line {}, column {}.",
                    keyword,
                    other,
                    at.line + 1,
                    at.column + 1
                ),
                location,
                keyword.len(),
            );
        }

        self.directives
            .entry(rule.kind)
            .or_insert_with(|| (keyword.to_string(), location));
    }

    /// Close every open block and return the tree and errors
    pub fn finish(mut self) -> Result<(Block, Vec<RazorError>), ParseError> {
        if let Some(error) = self.fatal.take() {
            return Err(error);
        }
        if let Some(error) = self.reader.take_error() {
            return Err(ParseError::Source(error));
        }
        if self.has_pending() {
            let generator = match self.mode {
                ParserMode::Markup => SpanGenerator::Literal,
                ParserMode::Code => SpanGenerator::Statement,
            };
            let kind = match self.mode {
                ParserMode::Markup => SpanKind::Markup,
                ParserMode::Code => SpanKind::Code,
            };
            let span = self.take_span(kind, AcceptedCharacters::Any, EditPolicy::Fixed, generator);
            if let Some(block) = self.blocks.last_mut() {
                block.children.push(SyntaxNode::Span(span));
            }
        }
        while self.blocks.len() > 1 {
            self.end_block();
        }
        let root = self.blocks.pop().unwrap_or_else(|| Block::new(BlockType::Markup));
        Ok((root, self.errors))
    }
}
