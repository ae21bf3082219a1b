//! Code Parser
//!
//! Parses everything that follows a transition character. Dispatch is on
//! the character after the transition:
//!
//! ```text
//! @{ ... }        statement block
//! @( ... )        explicit expression
//! @keyword ...    statement, code block or directive from the keyword table
//! @name.member    implicit expression
//! ```
//!
//! Brace dialects delimit bodies with balanced `{}`; line dialects end
//! them at a terminator line matched by a pattern from the keyword table.
//! Markup met at the start of a statement is handed to the
//! [`MarkupParser`](super::markup_parser::MarkupParser).
//!
//! Structural problems never abort: an error is recorded and the text is
//! still accepted, so the tree always covers the whole input.

use super::block::BlockType;
use super::context::{ParserContext, ParserMode};
use super::dialect::{DirectiveKind, DirectiveRule, KeywordBehavior, StatementRule};
use super::edit_policy::{is_identifier_part, is_identifier_start, EditPolicy};
use super::markup_parser::{MarkupEnd, MarkupParser};
use super::regex_cache;
use super::source_location::SourceLocation;
use super::span::{AcceptedCharacters, SpanGenerator, SpanKind};
use super::text_reader::TextSource;

/// The code half of the parser pair
pub(crate) struct CodeParser;

/// Location of the character after the transition at the current position
fn after_transition<S: TextSource>(ctx: &ParserContext<'_, S>) -> SourceLocation {
    let at = ctx.current_location();
    SourceLocation::new(
        at.absolute_offset + ctx.transition().len_utf8(),
        at.line,
        at.column + 1,
    )
}

impl CodeParser {
    /// Parse the construct starting at a transition character
    pub fn parse_transition<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let previous = ctx.switch_mode(ParserMode::Code);
        let dialect = ctx.dialect();

        match ctx.peek_at(1) {
            Some('{') if !dialect.uses_lines() => Self::parse_statement_block(ctx),
            Some('(') => Self::parse_explicit_expression(ctx),
            Some(ch) if is_identifier_start(ch) => {
                let word = ctx.peek_identifier(1);
                match dialect.keyword(&word) {
                    Some(behavior) => Self::parse_keyword(ctx, &word, behavior),
                    None => Self::parse_implicit_expression(ctx),
                }
            }
            next => Self::parse_invalid_transition(ctx, next),
        }

        ctx.switch_mode(previous);
    }

    fn parse_keyword<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        behavior: &KeywordBehavior,
    ) {
        log_trace!("Keyword {:?} at {}", keyword, ctx.current_location());
        match behavior {
            KeywordBehavior::Statement(rule) => Self::parse_statement(ctx, keyword, rule),
            KeywordBehavior::CodeBlock { end } => Self::parse_code_block(ctx, keyword, end),
            KeywordBehavior::Directive(rule) => Self::parse_directive(ctx, keyword, rule),
            KeywordBehavior::Reserved => Self::parse_reserved(ctx, keyword),
        }
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn output_implicit<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let accept_trailing_dot = ctx.dialect().accept_trailing_dot;
        ctx.output_span_always(
            SpanKind::Code,
            AcceptedCharacters::NonWhitespace,
            EditPolicy::ImplicitExpression {
                accept_trailing_dot,
            },
            SpanGenerator::Expression,
        );
    }

    fn parse_invalid_transition<S: TextSource>(ctx: &mut ParserContext<'_, S>, next: Option<char>) {
        let transition = ctx.transition();
        let location = after_transition(ctx);
        let message = match next {
            Some(ch) if !ch.is_whitespace() => format!(
                "\"{}\" is not valid at the start of a code block. Only identifiers, keywords, comments, \"(\" and \"{{\" are valid.",
                ch
            ),
            _ => format!(
                "A space, line break or end of file was encountered after the \"{}\" character. Only valid identifiers, keywords, comments, \"(\" and \"{{\" are valid at the start of a code block.",
                transition
            ),
        };

        ctx.start_block(BlockType::Expression);
        ctx.accept_transition();
        ctx.on_error(message, location, 1);
        Self::output_implicit(ctx);
        ctx.end_block();
    }

    fn parse_implicit_expression<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        ctx.start_block(BlockType::Expression);
        ctx.accept_transition();

        let accept_trailing_dot = ctx.dialect().accept_trailing_dot;
        ctx.accept_while(is_identifier_part);
        loop {
            match ctx.peek() {
                Some(open @ ('(' | '[')) => {
                    let location = ctx.current_location();
                    let close = if open == '(' { ')' } else { ']' };
                    if !Self::accept_balanced(ctx, open, close) {
                        ctx.on_error(
                            format!(
                                "An opening \"{}\" is missing the corresponding closing \"{}\".",
                                open, close
                            ),
                            location,
                            1,
                        );
                        break;
                    }
                }
                Some('.') => match ctx.peek_at(1) {
                    Some(ch) if is_identifier_start(ch) => {
                        ctx.accept();
                        ctx.accept_while(is_identifier_part);
                    }
                    _ => {
                        if accept_trailing_dot {
                            ctx.accept();
                        }
                        break;
                    }
                },
                _ => break,
            }
        }

        Self::output_implicit(ctx);
        ctx.end_block();
    }

    fn parse_explicit_expression<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let open = after_transition(ctx);
        ctx.start_block(BlockType::Expression);
        ctx.accept_transition();
        ctx.accept();
        ctx.output_meta(AcceptedCharacters::None);

        let terminated = Self::accept_until_close(ctx, '(', ')');
        ctx.output_span_always(
            SpanKind::Code,
            AcceptedCharacters::Any,
            EditPolicy::Code {
                auto_complete: None,
            },
            SpanGenerator::Expression,
        );
        if terminated {
            ctx.accept();
            ctx.output_meta(AcceptedCharacters::None);
        } else {
            ctx.on_error(
                "The explicit expression block is missing a closing \")\" character. Make sure you have a matching \")\" character for all the \"(\" characters within this block.",
                open,
                1,
            );
        }
        ctx.end_block();
    }

    // ========================================================================
    // Lexical helpers
    // ========================================================================

    /// Accept one lexical unit of code: a comment, a string or a character
    fn accept_token<S: TextSource>(ctx: &mut ParserContext<'_, S>, ch: char) {
        let syntax = &ctx.dialect().syntax;

        if let Some(comment) = syntax.line_comment.as_deref() {
            if comment.starts_with(ch) && ctx.next_is(comment) {
                ctx.accept_until_line_end();
                return;
            }
        }
        if let Some((open, close)) = syntax.block_comment.as_ref() {
            if open.starts_with(ch) && ctx.next_is(open) {
                ctx.accept_n(open.chars().count());
                while ctx.peek().is_some() && !ctx.next_is(close) {
                    ctx.accept();
                }
                ctx.try_accept(close);
                return;
            }
        }
        if syntax.string_delimiters.contains(&ch) {
            Self::accept_string(ctx, ch, syntax.escape);
            return;
        }
        ctx.accept();
    }

    /// Accept a string literal; unterminated strings stop at the line end
    fn accept_string<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        quote: char,
        escape: Option<char>,
    ) {
        ctx.accept();
        while let Some(ch) = ctx.peek() {
            if ch == '\n' || ch == '\r' {
                return;
            }
            if Some(ch) == escape {
                ctx.accept();
                ctx.accept();
                continue;
            }
            ctx.accept();
            if ch == quote {
                if escape.is_none() && ctx.peek() == Some(quote) {
                    ctx.accept();
                    continue;
                }
                return;
            }
        }
    }

    /// Accept a verbatim string (`@"..."`), where `""` escapes a quote
    fn accept_verbatim_string<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        ctx.accept();
        ctx.accept();
        while let Some(ch) = ctx.accept() {
            if ch == '"' {
                if ctx.peek() == Some('"') {
                    ctx.accept();
                } else {
                    return;
                }
            }
        }
    }

    /// Accept up to, not including, the `close` matching an already read `open`
    fn accept_until_close<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        open: char,
        close: char,
    ) -> bool {
        let mut depth = 0usize;
        while let Some(ch) = ctx.peek() {
            if ch == open {
                depth += 1;
                ctx.accept();
            } else if ch == close {
                if depth == 0 {
                    return true;
                }
                depth -= 1;
                ctx.accept();
            } else {
                Self::accept_token(ctx, ch);
            }
        }
        false
    }

    /// Accept a balanced `open ... close` group
    fn accept_balanced<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        open: char,
        close: char,
    ) -> bool {
        ctx.accept();
        if Self::accept_until_close(ctx, open, close) {
            ctx.accept();
            true
        } else {
            false
        }
    }

    /// Whether a `<` starts a markup block
    fn starts_markup<S: TextSource>(ctx: &mut ParserContext<'_, S>) -> bool {
        matches!(ctx.peek_at(1), Some(ch) if ch.is_alphabetic() || ch == '!' || ch == '/')
    }

    /// Accept a line terminator matched by `pattern` at the current position
    fn accept_terminator<S: TextSource>(ctx: &mut ParserContext<'_, S>, pattern: &str) {
        let line = ctx.peek_line();
        if let Some(length) = regex_cache::match_prefix_len(pattern, &line) {
            ctx.accept_n(line[..length].chars().count());
        }
    }

    /// Handle a transition character met inside code
    fn parse_code_transition<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        generator: SpanGenerator,
        allow_markup: bool,
    ) {
        let dialect = ctx.dialect();
        match ctx.peek_at(1) {
            Some('*') => {
                ctx.output_code(generator);
                MarkupParser::parse_comment(ctx);
            }
            Some(':') if allow_markup => {
                ctx.output_code(generator);
                MarkupParser::parse_single_line(ctx);
            }
            Some('<') if allow_markup => {
                ctx.output_code(generator);
                MarkupParser::parse_template(ctx);
            }
            Some('"') if !dialect.uses_lines() => Self::accept_verbatim_string(ctx),
            Some(ch) if is_identifier_start(ch) => {
                let word = ctx.peek_identifier(1);
                if dialect.is_keyword(&word) {
                    let location = after_transition(ctx);
                    ctx.on_error(
                        format!(
                            "Unexpected \"{word}\" keyword after \"{t}\" character. Once inside the body of a code block you do not need to prefix constructs like \"{word}\" with \"{t}\".",
                            word = word,
                            t = ctx.transition()
                        ),
                        location,
                        word.len(),
                    );
                }
                ctx.accept();
            }
            _ => {
                ctx.accept();
            }
        }
    }

    // ========================================================================
    // Code bodies
    // ========================================================================

    /// Parse a brace-delimited body, stopping before the unbalanced `}`
    ///
    /// Returns whether the `}` was found. The trailing code is left pending.
    fn parse_code_body<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        generator: SpanGenerator,
        allow_markup: bool,
    ) -> bool {
        let transition = ctx.transition();
        let mut depth = 0usize;
        let mut statement_start = true;

        while let Some(ch) = ctx.peek() {
            match ch {
                '{' | ';' => {
                    if ch == '{' {
                        depth += 1;
                    }
                    ctx.accept();
                    statement_start = true;
                }
                '}' => {
                    if depth == 0 {
                        return true;
                    }
                    depth -= 1;
                    ctx.accept();
                    statement_start = true;
                }
                c if c.is_whitespace() => {
                    ctx.accept();
                }
                '<' if allow_markup && statement_start && Self::starts_markup(ctx) => {
                    ctx.output_code(generator);
                    MarkupParser::parse_markup_block(ctx, false);
                    statement_start = true;
                }
                c if c == transition => {
                    Self::parse_code_transition(ctx, generator, allow_markup);
                    statement_start = true;
                }
                c => {
                    Self::accept_token(ctx, c);
                    statement_start = false;
                }
            }
        }
        false
    }

    /// Parse a line-oriented body, stopping before the terminator line
    ///
    /// Nested constructs matching `nest` must be closed by their own
    /// terminator first. Returns whether the terminator was found; its
    /// indentation is accepted, the terminator itself is left unread.
    fn parse_code_body_lines<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        end: &str,
        nest: Option<&str>,
        generator: SpanGenerator,
        allow_markup: bool,
    ) -> bool {
        let transition = ctx.transition();
        let mut nesting = 0usize;

        while ctx.peek().is_some() {
            let line = ctx.peek_line();
            let content = line.trim_start();
            if regex_cache::is_match(end, content) {
                if nesting == 0 {
                    ctx.accept_inline_whitespace();
                    return true;
                }
                nesting -= 1;
            } else if nest.is_some_and(|pattern| regex_cache::is_match(pattern, content)) {
                nesting += 1;
            }

            ctx.accept_inline_whitespace();
            if allow_markup && ctx.peek() == Some('<') && Self::starts_markup(ctx) {
                ctx.output_code(generator);
                MarkupParser::parse_markup_block(ctx, true);
                continue;
            }

            while let Some(ch) = ctx.peek() {
                if ch == '\n' || ch == '\r' {
                    break;
                }
                if ch == transition {
                    Self::parse_code_transition(ctx, generator, allow_markup);
                } else {
                    Self::accept_token(ctx, ch);
                }
            }
            if ctx.peek().is_some() {
                ctx.accept_line();
            }
        }
        false
    }

    /// Emit the code before a closing `}` and the brace itself, or report it missing
    fn close_braces<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        terminated: bool,
        generator: SpanGenerator,
        open: SourceLocation,
        block_name: &str,
    ) {
        if terminated {
            ctx.output_span_always(
                SpanKind::Code,
                AcceptedCharacters::Any,
                EditPolicy::Code {
                    auto_complete: None,
                },
                generator,
            );
            ctx.accept();
            ctx.output_meta(AcceptedCharacters::None);
        } else {
            Self::output_unterminated(ctx, generator, "}");
            ctx.on_error(
                format!(
                    "The {} block is missing a closing \"}}\" character. Make sure you have a matching \"}}\" character for all the \"{{\" characters within this block.",
                    block_name
                ),
                open,
                1,
            );
        }
    }

    fn output_unterminated<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        generator: SpanGenerator,
        closing: &str,
    ) {
        ctx.output_span_always(
            SpanKind::Code,
            AcceptedCharacters::Any,
            EditPolicy::Code {
                auto_complete: Some(closing.to_string()),
            },
            generator,
        );
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn parse_statement_block<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let open = after_transition(ctx);
        ctx.start_block(BlockType::Statement);
        ctx.accept_transition();
        ctx.accept();
        ctx.output_meta(AcceptedCharacters::None);

        let terminated = Self::parse_code_body(ctx, SpanGenerator::Statement, true);
        Self::close_braces(ctx, terminated, SpanGenerator::Statement, open, "code");
        ctx.end_block();
    }

    fn parse_statement<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &StatementRule,
    ) {
        ctx.start_block(BlockType::Statement);
        ctx.accept_transition();
        if ctx.dialect().uses_lines() {
            Self::parse_line_statement(ctx, keyword, rule);
        } else {
            Self::parse_brace_statement(ctx, keyword, rule);
        }
        ctx.end_block();
    }

    /// `keyword (header) { body }` followed by any continuation clauses
    fn parse_brace_statement<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &StatementRule,
    ) {
        let mut clause = keyword.to_string();
        loop {
            ctx.accept_n(clause.chars().count());
            ctx.accept_while(char::is_whitespace);

            if ctx.peek() == Some('(') {
                let location = ctx.current_location();
                if !Self::accept_balanced(ctx, '(', ')') {
                    ctx.on_error(
                        format!(
                            "The condition of the \"{}\" statement is missing a closing \")\" character.",
                            clause
                        ),
                        location,
                        1,
                    );
                    ctx.output_code(SpanGenerator::Statement);
                    return;
                }
                ctx.accept_while(char::is_whitespace);
            }

            match ctx.peek() {
                Some('{') => {
                    let open = ctx.current_location();
                    ctx.accept();
                    if !Self::parse_code_body(ctx, SpanGenerator::Statement, true) {
                        Self::output_unterminated(ctx, SpanGenerator::Statement, "}");
                        ctx.on_error(
                            format!(
                                "The \"{}\" block is missing a closing \"}}\" character.",
                                clause
                            ),
                            open,
                            1,
                        );
                        return;
                    }
                    ctx.accept();
                }
                Some(';') => {
                    ctx.accept();
                }
                Some(_) => {
                    ctx.accept_while(|ch| ch != ';' && ch != '\n' && ch != '\r');
                    ctx.try_accept(";");
                }
                None => {}
            }

            let (whitespace, word) = ctx.peek_word_after_whitespace();
            if !rule.continuations.iter().any(|c| c == &word) {
                break;
            }
            ctx.accept_n(whitespace);
            clause = word;

            if clause == "else" {
                ctx.accept_n(clause.chars().count());
                let (whitespace, next) = ctx.peek_word_after_whitespace();
                if next == keyword {
                    ctx.accept_n(whitespace);
                    clause = next;
                } else {
                    clause.clear();
                }
            }
        }

        ctx.output_code(SpanGenerator::Statement);
    }

    /// Header line, body lines and a terminator line
    fn parse_line_statement<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &StatementRule,
    ) {
        let location = ctx.current_location();
        ctx.accept_line();

        let end = match rule.end.as_deref() {
            Some(end) => end,
            None => {
                ctx.output_code(SpanGenerator::Statement);
                return;
            }
        };

        if Self::parse_code_body_lines(
            ctx,
            end,
            rule.nest.as_deref(),
            SpanGenerator::Statement,
            true,
        ) {
            Self::accept_terminator(ctx, end);
            ctx.output_code(SpanGenerator::Statement);
        } else {
            ctx.output_code(SpanGenerator::Statement);
            ctx.on_error(
                format!(
                    "The \"{}\" block was not terminated. All \"{}\" statements must be terminated with a matching end statement.",
                    keyword, keyword
                ),
                location,
                keyword.len(),
            );
        }
    }

    /// `@Code ... End Code`
    fn parse_code_block<S: TextSource>(ctx: &mut ParserContext<'_, S>, keyword: &str, end: &str) {
        let location = after_transition(ctx);
        ctx.start_block(BlockType::Statement);
        ctx.accept_transition();
        ctx.accept_n(keyword.chars().count());
        ctx.output_meta(AcceptedCharacters::None);

        if Self::parse_code_body_lines(ctx, end, None, SpanGenerator::Statement, true) {
            ctx.output_span_always(
                SpanKind::Code,
                AcceptedCharacters::Any,
                EditPolicy::Code {
                    auto_complete: None,
                },
                SpanGenerator::Statement,
            );
            Self::accept_terminator(ctx, end);
            ctx.output_meta(AcceptedCharacters::None);
        } else {
            Self::output_unterminated(ctx, SpanGenerator::Statement, &format!("End {}", keyword));
            ctx.on_error(
                format!(
                    "The \"{}\" block was not terminated. All \"{}\" blocks must be terminated with a matching \"End {}\".",
                    keyword, keyword, keyword
                ),
                location,
                keyword.len(),
            );
        }
        ctx.end_block();
    }

    // ========================================================================
    // Directives
    // ========================================================================

    fn parse_directive<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &DirectiveRule,
    ) {
        match rule.kind {
            DirectiveKind::Import
                if !ctx.dialect().uses_lines()
                    && ctx.peek_after_inline_whitespace(keyword.chars().count() + 1)
                        == Some('(') =>
            {
                let using = StatementRule {
                    continuations: Vec::new(),
                    end: None,
                    nest: None,
                };
                Self::parse_statement(ctx, keyword, &using);
            }
            DirectiveKind::Section => Self::parse_section(ctx, keyword, rule),
            DirectiveKind::Helper => Self::parse_helper(ctx, keyword, rule),
            DirectiveKind::Functions => Self::parse_functions(ctx, keyword, rule),
            _ => Self::parse_simple_directive(ctx, keyword, rule),
        }
    }

    /// `@keyword value` up to the end of the line
    fn parse_simple_directive<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &DirectiveRule,
    ) {
        let location = after_transition(ctx);
        ctx.start_block(BlockType::Directive);
        ctx.accept_transition();
        ctx.accept_n(keyword.chars().count());
        ctx.accept_inline_whitespace();
        ctx.output_meta(AcceptedCharacters::None);
        ctx.register_directive(keyword, rule, location);

        let value = ctx.accept_until_line_end();
        if value.trim().is_empty() {
            ctx.on_error(
                format!(
                    "The \"{}\" keyword must be followed by a value on the same line.",
                    keyword
                ),
                location,
                keyword.len(),
            );
        }

        let generator = match rule.kind {
            DirectiveKind::ModelType => SpanGenerator::ModelType,
            DirectiveKind::BaseType => SpanGenerator::BaseType,
            DirectiveKind::Layout => SpanGenerator::Layout,
            DirectiveKind::Import => SpanGenerator::Import,
            _ => SpanGenerator::None,
        };
        ctx.output_span_always(
            SpanKind::Code,
            AcceptedCharacters::Any,
            EditPolicy::Directive,
            generator,
        );
        ctx.end_block();
    }

    fn parse_section<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &DirectiveRule,
    ) {
        let location = after_transition(ctx);
        if ctx.in_section() {
            ctx.on_error(
                format!(
                    "Section blocks (\"{}{} Name ...\") cannot be nested. Only one level of section blocks is allowed.",
                    ctx.transition(),
                    keyword
                ),
                location,
                keyword.len(),
            );
        }

        ctx.start_block(BlockType::Section);
        ctx.accept_transition();
        ctx.accept_n(keyword.chars().count());
        ctx.accept_inline_whitespace();
        ctx.output_meta(AcceptedCharacters::None);

        let name_location = ctx.current_location();
        let name = ctx.accept_while(is_identifier_part);
        ctx.output_span_always(
            SpanKind::Code,
            AcceptedCharacters::Any,
            EditPolicy::Fixed,
            SpanGenerator::SectionName,
        );
        if name.is_empty() {
            ctx.on_error(
                format!("The \"{}\" keyword must be followed by a name.", keyword),
                name_location,
                1,
            );
        }

        let previous = ctx.set_in_section(true);
        match rule.end.as_deref() {
            Some(end) => {
                ctx.accept_line();
                ctx.output_meta(AcceptedCharacters::Any);
                if MarkupParser::parse_section_body(ctx, MarkupEnd::Line(end)) {
                    Self::accept_terminator(ctx, end);
                    ctx.output_meta(AcceptedCharacters::None);
                } else {
                    ctx.on_error(
                        format!("The \"{}\" block was not terminated.", keyword),
                        location,
                        keyword.len(),
                    );
                }
            }
            None => {
                ctx.accept_while(char::is_whitespace);
                if ctx.peek() == Some('{') {
                    let open = ctx.current_location();
                    ctx.accept();
                    ctx.output_meta(AcceptedCharacters::Any);
                    if MarkupParser::parse_section_body(ctx, MarkupEnd::Brace) {
                        ctx.accept();
                        ctx.output_meta(AcceptedCharacters::None);
                    } else {
                        ctx.on_error(
                            format!(
                                "The \"{}\" block is missing a closing \"}}\" character.",
                                name
                            ),
                            open,
                            1,
                        );
                    }
                } else {
                    ctx.output_meta(AcceptedCharacters::Any);
                    ctx.on_error(
                        format!("Expected a \"{{\" following the \"{}\" name.", keyword),
                        ctx.current_location(),
                        1,
                    );
                }
            }
        }
        ctx.set_in_section(previous);
        ctx.end_block();
    }

    fn parse_helper<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &DirectiveRule,
    ) {
        let location = after_transition(ctx);
        ctx.start_block(BlockType::Helper);
        ctx.accept_transition();
        ctx.accept_n(keyword.chars().count());
        ctx.accept_inline_whitespace();
        ctx.output_meta(AcceptedCharacters::None);

        let header_end = if rule.end.is_some() { None } else { Some('{') };
        while let Some(ch) = ctx.peek() {
            if ch == '\n' || ch == '\r' || Some(ch) == header_end {
                break;
            }
            if ch == '(' {
                Self::accept_balanced(ctx, '(', ')');
            } else {
                ctx.accept();
            }
        }
        let header = ctx.last_accepted().is_some();
        ctx.output_span_always(
            SpanKind::Code,
            AcceptedCharacters::Any,
            EditPolicy::Fixed,
            SpanGenerator::HelperHeader,
        );
        if !header {
            ctx.on_error(
                format!("The \"{}\" keyword must be followed by a signature.", keyword),
                location,
                keyword.len(),
            );
        }

        match rule.end.as_deref() {
            Some(end) => {
                if Self::parse_code_body_lines(ctx, end, None, SpanGenerator::Statement, true) {
                    ctx.output_span_always(
                        SpanKind::Code,
                        AcceptedCharacters::Any,
                        EditPolicy::Code {
                            auto_complete: None,
                        },
                        SpanGenerator::Statement,
                    );
                    Self::accept_terminator(ctx, end);
                    ctx.output_meta(AcceptedCharacters::None);
                } else {
                    Self::output_unterminated(
                        ctx,
                        SpanGenerator::Statement,
                        &format!("End {}", keyword),
                    );
                    ctx.on_error(
                        format!("The \"{}\" block was not terminated.", keyword),
                        location,
                        keyword.len(),
                    );
                }
            }
            None => {
                if ctx.peek() == Some('{') {
                    let open = ctx.current_location();
                    ctx.accept();
                    ctx.output_meta(AcceptedCharacters::None);
                    let terminated = Self::parse_code_body(ctx, SpanGenerator::Statement, true);
                    Self::close_braces(ctx, terminated, SpanGenerator::Statement, open, "helper");
                } else {
                    ctx.on_error(
                        format!("Expected a \"{{\" after the \"{}\" signature.", keyword),
                        ctx.current_location(),
                        1,
                    );
                }
            }
        }
        ctx.end_block();
    }

    fn parse_functions<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        keyword: &str,
        rule: &DirectiveRule,
    ) {
        let location = after_transition(ctx);
        ctx.start_block(BlockType::Functions);
        ctx.accept_transition();
        ctx.accept_n(keyword.chars().count());

        match rule.end.as_deref() {
            Some(end) => {
                ctx.output_meta(AcceptedCharacters::None);
                if Self::parse_code_body_lines(ctx, end, None, SpanGenerator::TypeMember, false) {
                    ctx.output_span_always(
                        SpanKind::Code,
                        AcceptedCharacters::Any,
                        EditPolicy::Code {
                            auto_complete: None,
                        },
                        SpanGenerator::TypeMember,
                    );
                    Self::accept_terminator(ctx, end);
                    ctx.output_meta(AcceptedCharacters::None);
                } else {
                    Self::output_unterminated(
                        ctx,
                        SpanGenerator::TypeMember,
                        &format!("End {}", keyword),
                    );
                    ctx.on_error(
                        format!("The \"{}\" block was not terminated.", keyword),
                        location,
                        keyword.len(),
                    );
                }
            }
            None => {
                ctx.accept_while(char::is_whitespace);
                if ctx.peek() == Some('{') {
                    let open = ctx.current_location();
                    ctx.accept();
                    ctx.output_meta(AcceptedCharacters::None);
                    let terminated = Self::parse_code_body(ctx, SpanGenerator::TypeMember, false);
                    Self::close_braces(ctx, terminated, SpanGenerator::TypeMember, open, "functions");
                } else {
                    ctx.output_meta(AcceptedCharacters::None);
                    ctx.on_error(
                        format!("Expected a \"{{\" after the \"{}\" keyword.", keyword),
                        ctx.current_location(),
                        1,
                    );
                }
            }
        }
        ctx.end_block();
    }

    fn parse_reserved<S: TextSource>(ctx: &mut ParserContext<'_, S>, keyword: &str) {
        let location = after_transition(ctx);
        ctx.start_block(BlockType::Directive);
        ctx.accept_transition();
        ctx.accept_n(keyword.chars().count());
        ctx.output_meta(AcceptedCharacters::None);
        ctx.on_error(
            format!(
                "\"{}\" is a reserved word and cannot be used after the \"{}\" character.",
                keyword,
                ctx.transition()
            ),
            location,
            keyword.len(),
        );
        ctx.end_block();
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::block::{Block, BlockType};
    use crate::engine::dialect::Dialect;
    use crate::engine::edit_policy::EditPolicy;
    use crate::engine::parser::RazorParser;
    use crate::engine::span::{SpanGenerator, SpanKind};

    fn parse(input: &str) -> crate::engine::parser::ParserResults {
        RazorParser::c_like().parse_str(input).unwrap()
    }

    fn parts(block: &Block) -> Vec<(SpanKind, String)> {
        block.spans().map(|s| (s.kind, s.content.clone())).collect()
    }

    fn child(block: &Block, index: usize) -> Block {
        block.children[index].as_block().cloned().unwrap()
    }

    #[test]
    fn test_implicit_expression() {
        let results = parse("foo @user.name baz");
        assert!(results.success);
        let expression = child(&results.document, 1);
        assert_eq!(expression.block_type, BlockType::Expression);
        assert_eq!(
            parts(&expression),
            vec![
                (SpanKind::Transition, "@".to_string()),
                (SpanKind::Code, "user.name".to_string())
            ]
        );
    }

    #[test]
    fn test_implicit_expression_with_calls_and_indexers() {
        let results = parse("@items[0].Format(\"a)\", x).Length!");
        let expression = child(&results.document, 0);
        assert_eq!(
            expression.spans().nth(1).unwrap().content,
            "items[0].Format(\"a)\", x).Length"
        );
    }

    #[test]
    fn test_trailing_dot_follows_dialect() {
        let results = parse("@foo.");
        assert_eq!(results.document.content(), "@foo.");
        assert_eq!(child(&results.document, 0).content(), "@foo");

        let basic = RazorParser::new(Dialect::basic_like()).parse_str("@foo.").unwrap();
        assert_eq!(child(&basic.document, 0).content(), "@foo.");
    }

    #[test]
    fn test_statement_block() {
        let results = parse("@{ var x = 1; }");
        assert!(results.success);
        assert_eq!(
            parts(&child(&results.document, 0)),
            vec![
                (SpanKind::Transition, "@".to_string()),
                (SpanKind::MetaCode, "{".to_string()),
                (SpanKind::Code, " var x = 1; ".to_string()),
                (SpanKind::MetaCode, "}".to_string()),
            ]
        );
    }

    #[test]
    fn test_unterminated_block_offers_auto_complete() {
        let results = parse("@{ var x = 1;");
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.errors[0].location.absolute_offset, 1);
        let last = results.document.spans().last().unwrap().clone();
        assert_eq!(
            last.edit_policy,
            EditPolicy::Code {
                auto_complete: Some("}".to_string())
            }
        );
    }

    #[test]
    fn test_explicit_expression() {
        let results = parse("<b>@(a + (b))</b>");
        assert!(results.success);
        assert_eq!(
            parts(&child(&results.document, 1)),
            vec![
                (SpanKind::Transition, "@".to_string()),
                (SpanKind::MetaCode, "(".to_string()),
                (SpanKind::Code, "a + (b)".to_string()),
                (SpanKind::MetaCode, ")".to_string()),
            ]
        );
    }

    #[test]
    fn test_if_else_with_markup() {
        let input = "@if (a) { <p>@b</p> } else if (c) { <i>x</i> } else { y(); }\nafter";
        let results = parse(input);
        assert!(results.success, "{:?}", results.errors);
        assert_eq!(results.document.content(), input);
        let statement = child(&results.document, 0);
        assert_eq!(statement.block_type, BlockType::Statement);
        assert_eq!(statement.count_blocks(BlockType::Markup), 2);
        assert_eq!(statement.count_blocks(BlockType::Expression), 1);
        assert!(statement.content().ends_with("y(); }"));
    }

    #[test]
    fn test_do_while_takes_condition() {
        let results = parse("@do { i++; } while (i < 3);\n");
        assert!(results.success);
        assert_eq!(
            child(&results.document, 0).content(),
            "@do { i++; } while (i < 3);"
        );
    }

    #[test]
    fn test_model_directive() {
        let results = parse("@model Foo.Bar\n<p/>");
        assert!(results.success);
        let directive = child(&results.document, 0);
        assert_eq!(directive.block_type, BlockType::Directive);
        let value = directive.spans().last().unwrap();
        assert_eq!(value.content, "Foo.Bar");
        assert_eq!(value.generator, SpanGenerator::ModelType);
    }

    #[test]
    fn test_duplicate_model_reports_once_at_second_keyword() {
        let results = parse("@model A\n@model B\n");
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.errors[0].location.absolute_offset, 10);
        assert_eq!(results.errors[0].location.line, 1);
    }

    #[test]
    fn test_model_and_inherits_conflict_in_either_order() {
        for input in ["@model A\n@inherits B\n", "@inherits B\n@model A\n"] {
            let results = parse(input);
            assert_eq!(results.errors.len(), 1, "{}", input);
            assert_eq!(results.errors[0].location.line, 1);
            assert_eq!(results.errors[0].location.column, 1);
        }
    }

    #[test]
    fn test_using_statement_versus_import() {
        let results = parse("@using System.Text\n@using (var x = y) { }");
        assert!(results.success);
        assert_eq!(child(&results.document, 0).block_type, BlockType::Directive);
        assert_eq!(child(&results.document, 2).block_type, BlockType::Statement);
    }

    #[test]
    fn test_section_and_nesting_error() {
        let results = parse("@section Head { <title>t</title> }");
        assert!(results.success);
        let section = child(&results.document, 0);
        assert_eq!(section.block_type, BlockType::Section);
        let name = section.spans().find(|s| s.generator == SpanGenerator::SectionName);
        assert_eq!(name.map(|s| s.content.as_str()), Some("Head"));

        let nested = parse("@section A { @section B { } }");
        assert_eq!(nested.errors.len(), 1);
        assert!(nested.errors[0].message.contains("cannot be nested"));
    }

    #[test]
    fn test_reserved_word() {
        let results = parse("@class");
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.errors[0].location.absolute_offset, 1);
    }

    #[test]
    fn test_invalid_transition() {
        let results = parse("a @ b");
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.document.content(), "a @ b");
    }

    #[test]
    fn test_keyword_after_transition_inside_code() {
        let results = parse("@{ @if (x) { } }");
        assert_eq!(results.errors.len(), 1);
        assert!(results.errors[0].message.contains("\"if\""));
    }

    #[test]
    fn test_basic_code_block_and_statement() {
        let input = "@Code\n  Dim x = 1\nEnd Code\n@If x Then\n  If y Then\n  End If\n  <p>x</p>\nEnd If\n";
        let results = RazorParser::new(Dialect::basic_like()).parse_str(input).unwrap();
        assert!(results.success, "{:?}", results.errors);
        assert_eq!(results.document.content(), input);

        let code = child(&results.document, 0);
        let first = code.spans().nth(1).unwrap();
        assert_eq!((first.kind, first.content.as_str()), (SpanKind::MetaCode, "Code"));
        assert_eq!(code.spans().last().unwrap().content, "End Code");

        let statement = child(&results.document, 2);
        assert_eq!(statement.block_type, BlockType::Statement);
        assert_eq!(statement.count_blocks(BlockType::Markup), 1);
        assert!(statement.content().ends_with("End If"));
    }

    #[test]
    fn test_basic_keywords_ignore_case() {
        let results = RazorParser::new(Dialect::basic_like())
            .parse_str("@modeltype Foo\n")
            .unwrap();
        let directive = child(&results.document, 0);
        assert_eq!(directive.block_type, BlockType::Directive);
    }
}
