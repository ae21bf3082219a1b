//! Markup Parser
//!
//! Scans literal markup and hands control to the
//! [`CodeParser`](super::code_parser::CodeParser) at every transition
//! character. Inside code it parses tag-balanced markup blocks:
//!
//! ```text
//! @if (x) { <p>Hello <b>@name</b></p> }
//!           └──────── markup block ──┘
//! ```
//!
//! Recognized forms:
//!
//! - `@@` escapes the transition (hidden `@` span followed by a literal `@`)
//! - `user@example.com` stays markup
//! - `@* ... *@` template comments
//! - `<text>...</text>` wrapper tags, emitted as transition spans
//! - `@:` single-line markup inside code
//! - `@<tag>...</tag>` inline templates inside code

use super::block::BlockType;
use super::code_parser::CodeParser;
use super::context::{ParserContext, ParserMode};
use super::edit_policy::EditPolicy;
use super::regex_cache;
use super::source_location::SourceLocation;
use super::span::{AcceptedCharacters, SpanGenerator, SpanKind};
use super::text_reader::TextSource;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Where a run of markup text stops
#[derive(Debug, Clone, Copy)]
pub(crate) enum MarkupEnd<'p> {
    /// End of input
    Eof,
    /// An unbalanced `}`
    Brace,
    /// A line matching the pattern
    Line(&'p str),
    /// The end of the current line, line break included
    LineBreak,
}

/// The markup half of the parser pair
pub(crate) struct MarkupParser;

impl MarkupParser {
    /// Parse a whole document into the root block
    pub fn parse_document<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let previous = ctx.switch_mode(ParserMode::Markup);
        Self::parse_text(ctx, MarkupEnd::Eof);
        ctx.switch_mode(previous);
    }

    /// Parse markup text until `end`, emitting the pending text
    ///
    /// Returns whether `end` was found. For [`MarkupEnd::Brace`] and
    /// [`MarkupEnd::Line`] the terminator is left unread.
    pub fn parse_text<S: TextSource>(ctx: &mut ParserContext<'_, S>, end: MarkupEnd<'_>) -> bool {
        let transition = ctx.transition();
        let mut brace_depth = 0usize;
        let mut at_line_start = true;

        loop {
            let ch = match ctx.peek() {
                Some(ch) => ch,
                None => {
                    ctx.output_markup();
                    return matches!(end, MarkupEnd::Eof);
                }
            };

            match end {
                MarkupEnd::Brace if ch == '{' => brace_depth += 1,
                MarkupEnd::Brace if ch == '}' => {
                    if brace_depth == 0 {
                        ctx.output_markup();
                        return true;
                    }
                    brace_depth -= 1;
                }
                MarkupEnd::Line(pattern) if at_line_start => {
                    let line = ctx.peek_line();
                    if regex_cache::is_match(pattern, line.trim_start()) {
                        let indent = line.len() - line.trim_start().len();
                        ctx.accept_n(line[..indent].chars().count());
                        ctx.output_markup();
                        return true;
                    }
                }
                MarkupEnd::LineBreak if ch == '\n' || ch == '\r' => {
                    ctx.accept_line();
                    ctx.output_markup();
                    return true;
                }
                _ => {}
            }

            if ch == transition {
                Self::handle_transition(ctx);
                at_line_start = false;
                continue;
            }

            ctx.accept();
            at_line_start = ch == '\n' || ch == '\r';
        }
    }

    /// Handle a transition character met in markup
    fn handle_transition<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let transition = ctx.transition();
        let next = ctx.peek_at(1);

        if next == Some(transition) {
            ctx.output_markup();
            ctx.accept();
            ctx.output_hidden(SpanKind::Markup);
            ctx.accept();
            return;
        }

        let previous_is_word = ctx.last_accepted().is_some_and(char::is_alphanumeric);
        if previous_is_word && next.is_some_and(char::is_alphanumeric) {
            ctx.accept();
            return;
        }

        ctx.output_markup();
        if next == Some('*') {
            Self::parse_comment(ctx);
        } else {
            CodeParser::parse_transition(ctx);
        }
    }

    /// Parse a template comment starting at the transition
    pub fn parse_comment<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let transition = ctx.transition();
        let start = ctx.current_location();
        let close = format!("*{}", transition);

        ctx.start_block(BlockType::Comment);
        ctx.accept_transition();
        ctx.accept();
        ctx.output_meta(AcceptedCharacters::None);

        let mut terminated = false;
        while ctx.peek().is_some() {
            if ctx.next_is(&close) {
                terminated = true;
                break;
            }
            ctx.accept();
        }

        ctx.output_span_always(
            SpanKind::Comment,
            AcceptedCharacters::Any,
            EditPolicy::Comment,
            SpanGenerator::None,
        );
        if terminated {
            ctx.accept();
            ctx.output_meta(AcceptedCharacters::None);
            ctx.accept_transition();
        } else {
            ctx.on_error(
                format!(
                    "End of file was reached before the end of the block comment. All comments started with \"{t}*\" must be terminated with a matching \"*{t}\".",
                    t = transition
                ),
                start,
                2,
            );
        }
        ctx.end_block();
    }

    /// Parse a tag-balanced markup block inside code
    ///
    /// With `rest_of_line`, markup continues to the end of the line after the
    /// outer tag closes; otherwise only a blank remainder of the line is taken.
    pub fn parse_markup_block<S: TextSource>(ctx: &mut ParserContext<'_, S>, rest_of_line: bool) {
        let previous = ctx.switch_mode(ParserMode::Markup);
        ctx.start_block(BlockType::Markup);

        if ctx.next_is("<text>") {
            ctx.accept_n(6);
            ctx.output_span(
                SpanKind::Transition,
                AcceptedCharacters::None,
                EditPolicy::Fixed,
                SpanGenerator::None,
            );
            Self::parse_tags(ctx, true);
        } else {
            Self::parse_tags(ctx, false);
        }

        if rest_of_line {
            Self::parse_text(ctx, MarkupEnd::LineBreak);
        } else if let Some(count) = ctx.peek_blank_line_end() {
            ctx.accept_n(count);
        }
        ctx.output_markup();
        ctx.end_block();
        ctx.switch_mode(previous);
    }

    /// Parse `@:` single-line markup inside code
    pub fn parse_single_line<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let previous = ctx.switch_mode(ParserMode::Markup);
        ctx.start_block(BlockType::Markup);
        ctx.accept_transition();
        ctx.accept();
        ctx.output_meta(AcceptedCharacters::Any);
        Self::parse_text(ctx, MarkupEnd::LineBreak);
        ctx.end_block();
        ctx.switch_mode(previous);
    }

    /// Parse an `@<tag>` inline template inside code
    pub fn parse_template<S: TextSource>(ctx: &mut ParserContext<'_, S>) {
        let previous = ctx.switch_mode(ParserMode::Markup);
        ctx.start_block(BlockType::Template);
        ctx.start_block(BlockType::Markup);
        ctx.accept_transition();
        Self::parse_tags(ctx, false);
        ctx.output_markup();
        ctx.end_block();
        ctx.end_block();
        ctx.switch_mode(previous);
    }

    /// Parse the markup body of a section, returning whether `end` was found
    pub fn parse_section_body<S: TextSource>(
        ctx: &mut ParserContext<'_, S>,
        end: MarkupEnd<'_>,
    ) -> bool {
        let previous = ctx.switch_mode(ParserMode::Markup);
        ctx.start_block(BlockType::Markup);
        let terminated = Self::parse_text(ctx, end);
        ctx.end_block();
        ctx.switch_mode(previous);
        terminated
    }

    /// Peek at a tag: whether it closes, and its name
    fn peek_tag<S: TextSource>(ctx: &mut ParserContext<'_, S>) -> (bool, String) {
        let closing = ctx.peek_at(1) == Some('/');
        let skip = if closing { 2 } else { 1 };
        let name = ctx.peek_identifier(skip);
        (closing, name)
    }

    /// Consume tags until every tag opened here is closed
    fn parse_tags<S: TextSource>(ctx: &mut ParserContext<'_, S>, text_tag: bool) {
        let transition = ctx.transition();
        let mut open: Vec<(String, SourceLocation)> = Vec::new();
        if text_tag {
            open.push(("text".to_string(), ctx.current_location()));
        }

        loop {
            let ch = match ctx.peek() {
                Some(ch) => ch,
                None => {
                    if let Some((name, location)) = open.first() {
                        let message = format!(
                            "The \"{}\" element was not closed. All elements must be either self-closing or have a matching end tag.",
                            name
                        );
                        let length = name.len() + 1;
                        let location = *location;
                        ctx.on_error(message, location, length);
                    }
                    return;
                }
            };

            if ch == transition {
                Self::handle_transition(ctx);
            } else if ch == '<' {
                let (closing, name) = Self::peek_tag(ctx);
                if text_tag && closing && open.len() == 1 && name == "text" {
                    ctx.output_markup();
                    ctx.accept_while(|c| c != '>');
                    ctx.accept();
                    ctx.output_span(
                        SpanKind::Transition,
                        AcceptedCharacters::None,
                        EditPolicy::Fixed,
                        SpanGenerator::None,
                    );
                    return;
                }
                Self::parse_tag(ctx, &mut open);
            } else {
                ctx.accept();
            }

            if open.is_empty() {
                return;
            }
        }
    }

    /// Consume one tag, updating the stack of open elements
    fn parse_tag<S: TextSource>(ctx: &mut ParserContext<'_, S>, open: &mut Vec<(String, SourceLocation)>) {
        let transition = ctx.transition();
        let location = ctx.current_location();
        ctx.accept();

        if ctx.peek() == Some('!') {
            let close = if ctx.next_is("!--") { "-->" } else { ">" };
            while ctx.peek().is_some() && !ctx.next_is(close) {
                ctx.accept();
            }
            ctx.try_accept(close);
            return;
        }

        let closing = ctx.peek() == Some('/');
        if closing {
            ctx.accept();
        }
        let name = ctx.accept_while(|c| c.is_alphanumeric() || c == '-' || c == ':' || c == '_');
        if name.is_empty() {
            return;
        }

        let mut self_closing = false;
        loop {
            match ctx.peek() {
                None => break,
                Some('>') => {
                    ctx.accept();
                    break;
                }
                Some('/') if ctx.peek_at(1) == Some('>') => {
                    ctx.accept_n(2);
                    self_closing = true;
                    break;
                }
                Some(quote @ ('"' | '\'')) => {
                    ctx.accept();
                    while let Some(c) = ctx.peek() {
                        if c == quote {
                            ctx.accept();
                            break;
                        }
                        if c == transition {
                            Self::handle_transition(ctx);
                        } else {
                            ctx.accept();
                        }
                    }
                }
                Some(c) if c == transition => Self::handle_transition(ctx),
                Some(_) => {
                    ctx.accept();
                }
            }
        }

        if closing {
            if let Some(index) = open.iter().rposition(|(n, _)| n.eq_ignore_ascii_case(&name)) {
                open.truncate(index);
            }
        } else if !self_closing && !VOID_ELEMENTS.contains(&name.to_ascii_lowercase().as_str()) {
            open.push((name, location));
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::block::{BlockType, SyntaxNode};
    use crate::engine::parser::RazorParser;
    use crate::engine::span::SpanKind;

    fn spans(input: &str) -> Vec<(SpanKind, String, bool)> {
        let results = RazorParser::c_like().parse_str(input).unwrap();
        results
            .document
            .spans()
            .map(|s| (s.kind, s.content.clone(), s.hidden))
            .collect()
    }

    #[test]
    fn test_plain_markup_is_one_span() {
        assert_eq!(
            spans("<p>hello</p>"),
            vec![(SpanKind::Markup, "<p>hello</p>".to_string(), false)]
        );
    }

    #[test]
    fn test_escaped_transition() {
        let result = spans("a @@b");
        assert_eq!(result[0], (SpanKind::Markup, "a ".to_string(), false));
        assert_eq!(result[1], (SpanKind::Markup, "@".to_string(), true));
        assert_eq!(result[2], (SpanKind::Markup, "@b".to_string(), false));
    }

    #[test]
    fn test_email_stays_markup() {
        assert_eq!(
            spans("mail user@example.com now"),
            vec![(SpanKind::Markup, "mail user@example.com now".to_string(), false)]
        );
    }

    #[test]
    fn test_template_comment_block() {
        let results = RazorParser::c_like().parse_str("a@* note *@b").unwrap();
        assert!(results.errors.is_empty());
        let comment = results.document.children[1].as_block().cloned().unwrap();
        assert_eq!(comment.block_type, BlockType::Comment);
        let kinds: Vec<SpanKind> = comment.spans().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SpanKind::Transition,
                SpanKind::MetaCode,
                SpanKind::Comment,
                SpanKind::MetaCode,
                SpanKind::Transition
            ]
        );
    }

    #[test]
    fn test_unterminated_comment_reports_error() {
        let results = RazorParser::c_like().parse_str("@* open").unwrap();
        assert_eq!(results.errors.len(), 1);
        assert_eq!(results.document.content(), "@* open");
    }

    #[test]
    fn test_text_tag_is_transition() {
        let results = RazorParser::c_like()
            .parse_str("@{ <text>hi</text> }")
            .unwrap();
        assert!(results.errors.is_empty());
        let statement = results.document.children[0].as_block().cloned().unwrap();
        let markup = statement
            .children
            .iter()
            .find_map(|c| match c {
                SyntaxNode::Block(b) if b.block_type == BlockType::Markup => Some(b.clone()),
                _ => None,
            })
            .unwrap();
        let parts: Vec<(SpanKind, &str)> = markup
            .spans()
            .map(|s| (s.kind, s.content.as_str()))
            .collect();
        assert_eq!(
            parts,
            vec![
                (SpanKind::Transition, "<text>"),
                (SpanKind::Markup, "hi"),
                (SpanKind::Transition, "</text>"),
            ]
        );
    }

    #[test]
    fn test_unclosed_element_in_code() {
        let results = RazorParser::c_like().parse_str("@{ <p>hi }").unwrap();
        assert!(results
            .errors
            .iter()
            .any(|e| e.message.contains("\"p\" element was not closed")));
        assert_eq!(results.document.content(), "@{ <p>hi }");
    }
}
