//! Partial Reparse Policies
//!
//! Each span carries an [`EditPolicy`] chosen by the parser. When the editor
//! reports a change inside a span, the policy decides whether the change can
//! be absorbed by rewriting that span's content alone.
//!
//! # Results
//!
//! ```text
//! ACCEPTED             span updated, tree valid
//! ACCEPTED|PROVISIONAL span updated, but only the next edit on the same span
//!                      may build on it
//! REJECTED             full reparse required
//! REJECTED|AUTO_COMPLETE_BLOCK
//!                      full reparse, and the editor should insert the
//!                      closing text of an unterminated block
//! ```
//!
//! # Ownership
//!
//! A span owns a change when the removed range starts inside the span and ends
//! before the span's end, or exactly at the end when the span accepts trailing
//! characters:
//!
//! ```text
//! span "name" at 5..9, accepted NonWhitespace
//! insert at 9   -> owned (end insertion)
//! insert at 9, accepted None -> not owned
//! ```

use super::dialect::Dialect;
use super::span::{AcceptedCharacters, Span, SpanKind};
use super::text_change::TextChange;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Combinable outcome of a partial reparse attempt
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PartialParseResult(u8);

impl PartialParseResult {
    /// The change was absorbed
    pub const ACCEPTED: Self = Self(1);
    /// A full reparse is required
    pub const REJECTED: Self = Self(2);
    /// Accepted on the assumption that the next edit completes it
    pub const PROVISIONAL: Self = Self(4);
    /// The editor should complete an unterminated block
    pub const AUTO_COMPLETE_BLOCK: Self = Self(8);
    /// The change altered how the surrounding text parses
    pub const SPAN_CONTEXT_CHANGED: Self = Self(16);

    /// Raw bits
    #[inline]
    pub fn bits(self) -> u8 {
        self.0
    }

    /// Whether every flag of `other` is set
    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the change was absorbed
    #[inline]
    pub fn is_accepted(self) -> bool {
        self.contains(Self::ACCEPTED)
    }

    /// Whether a full reparse is required
    #[inline]
    pub fn is_rejected(self) -> bool {
        self.contains(Self::REJECTED)
    }

    /// Whether acceptance is provisional
    #[inline]
    pub fn is_provisional(self) -> bool {
        self.contains(Self::PROVISIONAL)
    }
}

impl BitOr for PartialParseResult {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for PartialParseResult {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for PartialParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(PartialParseResult, &str); 5] = [
            (PartialParseResult::ACCEPTED, "Accepted"),
            (PartialParseResult::REJECTED, "Rejected"),
            (PartialParseResult::PROVISIONAL, "Provisional"),
            (PartialParseResult::AUTO_COMPLETE_BLOCK, "AutoCompleteBlock"),
            (PartialParseResult::SPAN_CONTEXT_CHANGED, "SpanContextChanged"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        if names.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", names.join(" | "))
        }
    }
}

impl fmt::Display for PartialParseResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-span partial reparse policy
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditPolicy {
    /// Literal markup; plain text edits are absorbed
    Markup,
    /// Statement or expression code
    Code {
        /// Closing text of an unterminated block, offered to the editor
        auto_complete: Option<String>,
    },
    /// Implicit expression such as `@user.name`
    ImplicitExpression {
        /// Whether a trailing `.` belongs to the expression
        accept_trailing_dot: bool,
    },
    /// Directive value; same-line edits are absorbed
    Directive,
    /// Comment body
    Comment,
    /// Never absorbs an edit
    Fixed,
}

/// Neighbourhood of the span being edited
#[derive(Debug, Clone, Copy)]
pub struct EditContext<'a> {
    /// The span before the edited one
    pub previous: Option<&'a Span>,
    /// The span after the edited one
    pub next: Option<&'a Span>,
    /// Dialect the tree was parsed with
    pub dialect: &'a Dialect,
}

/// Whether `span` owns `change`
pub fn owns_change(span: &Span, change: &TextChange) -> bool {
    let start = span.start.absolute_offset;
    let end = span.end_offset();
    let old_end = change.old_end();
    change.old_position >= start
        && (old_end < end
            || (old_end == end && span.accepted_characters != AcceptedCharacters::None))
}

impl EditPolicy {
    /// Decide whether `change`, owned by `span`, can be absorbed
    ///
    /// Does not modify the span.
    pub fn can_accept_change(
        &self,
        span: &Span,
        change: &TextChange,
        context: &EditContext<'_>,
    ) -> PartialParseResult {
        match self {
            EditPolicy::Fixed => PartialParseResult::REJECTED,
            EditPolicy::Markup => markup_change(span, change, context),
            EditPolicy::Code { auto_complete } => {
                code_change(span, change, auto_complete.as_deref(), context)
            }
            EditPolicy::ImplicitExpression {
                accept_trailing_dot,
            } => implicit_expression_change(span, change, *accept_trailing_dot, context),
            EditPolicy::Directive => {
                if has_line_break(change.old_text()) || has_line_break(change.new_text()) {
                    PartialParseResult::REJECTED
                } else {
                    PartialParseResult::ACCEPTED
                }
            }
            EditPolicy::Comment => {
                let touches = |text: &str| text.contains(['*', context.dialect.transition]);
                if touches(change.old_text()) || touches(change.new_text()) {
                    PartialParseResult::REJECTED
                } else {
                    PartialParseResult::ACCEPTED
                }
            }
        }
    }

    /// The auto-complete string of an unterminated block, if any
    pub fn auto_complete(&self) -> Option<&str> {
        match self {
            EditPolicy::Code { auto_complete } => auto_complete.as_deref(),
            _ => None,
        }
    }
}

fn has_line_break(text: &str) -> bool {
    text.contains(['\r', '\n', '\u{2028}', '\u{2029}'])
}

fn is_at_end_of_span(span: &Span, change: &TextChange) -> bool {
    change.old_end() == span.end_offset()
}

fn is_at_end_of_first_line(span: &Span, change: &TextChange) -> bool {
    let relative = change.old_position.saturating_sub(span.start.absolute_offset);
    match span.content.find(['\r', '\n']) {
        Some(line_end) => relative == line_end,
        None => false,
    }
}

fn markup_change(span: &Span, change: &TextChange, context: &EditContext<'_>) -> PartialParseResult {
    if span.hidden {
        return PartialParseResult::REJECTED;
    }
    let transition = context.dialect.transition;
    let structural = |text: &str| text.contains([transition, '<', '>']);
    if structural(change.old_text()) || structural(change.new_text()) {
        return PartialParseResult::REJECTED;
    }

    let updated = match change.apply_to(&span.content, span.start.absolute_offset) {
        Some(text) if !text.is_empty() => text,
        _ => return PartialParseResult::REJECTED,
    };
    let at_start = change.old_position == span.start.absolute_offset;

    // text typed straight after "@@" or a template's "@" would become code
    if at_start
        && context
            .previous
            .is_some_and(|previous| previous.hidden || previous.kind == SpanKind::Transition)
    {
        return PartialParseResult::REJECTED;
    }

    // "@bar baz" must not turn into "@barbaz", nor "@v. x" into "@v.x"
    let near_start = change.old_position < span.start.absolute_offset + 2;
    if near_start
        && context.previous.is_some_and(|previous| {
            matches!(previous.edit_policy, EditPolicy::ImplicitExpression { .. })
        })
        && updated
            .chars()
            .next()
            .is_some_and(|ch| is_identifier_part(ch) || matches!(ch, '.' | '(' | '['))
    {
        return PartialParseResult::REJECTED;
    }

    // the neighbours of an e-mail "@" decide whether it stays markup
    let relative_start = change.old_position.saturating_sub(span.start.absolute_offset);
    let relative_end = change.old_end().saturating_sub(span.start.absolute_offset);
    let touches_transition = span.content.match_indices(transition).any(|(index, _)| {
        relative_start <= index + transition.len_utf8() && relative_end + 1 >= index
    });
    if touches_transition {
        return PartialParseResult::REJECTED;
    }

    // "foo @bar" must not turn into the e-mail address "foox@bar"
    if is_at_end_of_span(span, change)
        && context.next.map(|next| next.kind) == Some(SpanKind::Transition)
        && updated.chars().last().is_some_and(char::is_alphanumeric)
    {
        return PartialParseResult::REJECTED;
    }

    PartialParseResult::ACCEPTED
}

fn code_change(
    span: &Span,
    change: &TextChange,
    auto_complete: Option<&str>,
    context: &EditContext<'_>,
) -> PartialParseResult {
    if auto_complete.is_some()
        && change.is_insert()
        && has_line_break(change.new_text())
        && (is_at_end_of_span(span, change) || is_at_end_of_first_line(span, change))
    {
        return PartialParseResult::REJECTED | PartialParseResult::AUTO_COMPLETE_BLOCK;
    }

    let syntax = &context.dialect.syntax;
    let structural = |text: &str| {
        text.chars().any(|ch| {
            matches!(ch, '{' | '}' | '(' | ')' | '<' | '>' | '/')
                || ch == context.dialect.transition
                || syntax.string_delimiters.contains(&ch)
        }) || has_line_break(text)
    };
    if structural(change.old_text()) || structural(change.new_text()) {
        return PartialParseResult::REJECTED;
    }
    if let Some(comment) = syntax.line_comment.as_deref() {
        if change.new_text().contains(comment) {
            return PartialParseResult::REJECTED;
        }
    }

    // the keyword of a statement must not change
    if context.previous.map(|p| p.kind) == Some(SpanKind::Transition) {
        let keyword_len: usize = span
            .content
            .chars()
            .take_while(|&ch| is_identifier_part(ch))
            .map(char::len_utf8)
            .sum();
        if change.old_position - span.start.absolute_offset <= keyword_len {
            return PartialParseResult::REJECTED;
        }
    }

    PartialParseResult::ACCEPTED
}

// ============================================================================
// Implicit Expressions
// ============================================================================

/// Whether `ch` may start an identifier
#[inline]
pub fn is_identifier_start(ch: char) -> bool {
    ch.is_alphabetic() || ch == '_'
}

/// Whether `ch` may continue an identifier
#[inline]
pub fn is_identifier_part(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

fn is_identifier(text: &str, require_start: bool) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if require_start && !is_identifier_start(first) => false,
        Some(first) if !is_identifier_part(first) => false,
        Some(_) => chars.all(is_identifier_part),
        None => false,
    }
}

fn ends_with_dot(text: &str) -> bool {
    match text.strip_suffix('.') {
        Some(rest) => rest.chars().all(is_identifier_part),
        None => false,
    }
}

fn provisional_dot(accept_trailing_dot: bool) -> PartialParseResult {
    if accept_trailing_dot {
        PartialParseResult::ACCEPTED
    } else {
        PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL
    }
}

fn implicit_expression_change(
    span: &Span,
    change: &TextChange,
    accept_trailing_dot: bool,
    context: &EditContext<'_>,
) -> PartialParseResult {
    if span.accepted_characters == AcceptedCharacters::Any {
        return PartialParseResult::REJECTED;
    }

    let start = span.start.absolute_offset;
    let relative = change.old_position - start;

    // intellisense commit after a trailing dot: "foo." + "bar"
    if !is_at_end_of_span(span, change)
        && span.content.ends_with('.')
        && change.new_length > 0
        && is_identifier(change.new_text(), false)
        && (change.old_length == 0 || is_identifier(change.old_text(), false))
    {
        return try_accept(span, change, provisional_dot(accept_trailing_dot), context);
    }

    if change.is_replace() {
        if is_identifier_replacement(span, change) {
            return try_accept(span, change, PartialParseResult::ACCEPTED, context);
        }
        if is_at_end_of_span(span, change) || remaining_is_whitespace(span, change) {
            if ends_with_dot(change.new_text()) {
                return provisional_dot(accept_trailing_dot);
            }
            if is_identifier(change.new_text(), false) {
                return try_accept(span, change, PartialParseResult::ACCEPTED, context);
            }
        }
        return PartialParseResult::REJECTED;
    }

    let previous = match span.content.get(..relative).and_then(|text| text.chars().last()) {
        Some(ch) => ch,
        None => return PartialParseResult::REJECTED,
    };

    if change.is_insert() {
        if previous == '.' {
            if is_identifier(change.new_text(), false) || change.new_text() == "." {
                return try_accept(span, change, PartialParseResult::ACCEPTED, context);
            }
            return PartialParseResult::REJECTED;
        }
        if is_identifier_part(previous) || previous == ')' || previous == ']' {
            if is_identifier(change.new_text(), false) {
                return try_accept(span, change, PartialParseResult::ACCEPTED, context);
            }
            if ends_with_dot(change.new_text()) {
                return provisional_dot(accept_trailing_dot);
            }
        }
        return PartialParseResult::REJECTED;
    }

    if change.is_delete() {
        if previous == '.' {
            return try_accept(
                span,
                change,
                PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL,
                context,
            );
        }
        if is_identifier_part(previous) {
            let removed_ok = change
                .old_text()
                .chars()
                .all(|ch| is_identifier_part(ch) || ch == '.');
            if removed_ok {
                return try_accept(span, change, PartialParseResult::ACCEPTED, context);
            }
        }
    }

    PartialParseResult::REJECTED
}

fn is_identifier_replacement(span: &Span, change: &TextChange) -> bool {
    if !is_identifier(change.new_text(), false) || !is_identifier(change.old_text(), false) {
        return false;
    }
    let relative = change.old_position - span.start.absolute_offset;
    span.content
        .get(..relative)
        .and_then(|text| text.chars().last())
        .is_some_and(|ch| is_identifier_part(ch) || ch == '.')
}

fn remaining_is_whitespace(span: &Span, change: &TextChange) -> bool {
    let relative_end = change.old_end() - span.start.absolute_offset;
    span.content
        .get(relative_end..)
        .is_some_and(|rest| rest.chars().all(char::is_whitespace))
}

fn try_accept(
    span: &Span,
    change: &TextChange,
    result: PartialParseResult,
    context: &EditContext<'_>,
) -> PartialParseResult {
    let updated = match change.apply_to(&span.content, span.start.absolute_offset) {
        Some(text) => text,
        None => return PartialParseResult::REJECTED,
    };
    let first_word: String = updated.chars().take_while(|&ch| is_identifier_part(ch)).collect();
    if context.dialect.is_keyword(&first_word) {
        return PartialParseResult::REJECTED | PartialParseResult::SPAN_CONTEXT_CHANGED;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::source_location::SourceLocation;
    use crate::engine::span::SpanGenerator;
    use crate::engine::text_change::TextBuffer;

    fn expression(content: &str, start: usize) -> Span {
        Span::new(SpanKind::Code, content, SourceLocation::new(start, 0, start))
            .with_accepted(AcceptedCharacters::NonWhitespace)
            .with_edit_policy(EditPolicy::ImplicitExpression {
                accept_trailing_dot: false,
            })
            .with_generator(SpanGenerator::Expression)
    }

    fn check(span: &Span, change: &TextChange) -> PartialParseResult {
        let dialect = Dialect::c_like();
        let context = EditContext {
            previous: None,
            next: None,
            dialect: &dialect,
        };
        span.edit_policy.can_accept_change(span, change, &context)
    }

    #[test]
    fn test_flags_combine() {
        let result = PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL;
        assert!(result.is_accepted());
        assert!(result.is_provisional());
        assert!(!result.is_rejected());
        assert_eq!(format!("{:?}", result), "Accepted | Provisional");
    }

    #[test]
    fn test_owns_change_at_end_depends_on_accepted_characters() {
        let span = expression("foo", 1);
        let change = TextChange::edit("@foo", 4, 0, ".");
        assert!(owns_change(&span, &change));
        let fixed = span.clone().with_accepted(AcceptedCharacters::None);
        assert!(!owns_change(&fixed, &change));
    }

    #[test]
    fn test_trailing_dot_is_provisional() {
        let span = expression("foo", 1);
        let change = TextChange::edit("@foo bar", 4, 0, ".");
        assert_eq!(
            check(&span, &change),
            PartialParseResult::ACCEPTED | PartialParseResult::PROVISIONAL
        );
    }

    #[test]
    fn test_identifier_after_dot_is_accepted() {
        let span = expression("foo.", 1);
        let change = TextChange::edit("@foo. bar", 5, 0, "b");
        assert_eq!(check(&span, &change), PartialParseResult::ACCEPTED);
    }

    #[test]
    fn test_keyword_start_changes_context() {
        let span = expression("i", 1);
        let change = TextChange::edit("@i", 2, 0, "f");
        assert_eq!(
            check(&span, &change),
            PartialParseResult::REJECTED | PartialParseResult::SPAN_CONTEXT_CHANGED
        );
    }

    #[test]
    fn test_space_in_expression_is_rejected() {
        let span = expression("foo", 1);
        let change = TextChange::edit("@foo", 4, 0, " ");
        assert!(check(&span, &change).is_rejected());
    }

    #[test]
    fn test_markup_rejects_tags_and_transitions() {
        let span = Span::markup("hello ", SourceLocation::ZERO);
        assert!(check(&span, &TextChange::edit("hello ", 2, 0, "x")).is_accepted());
        assert!(check(&span, &TextChange::edit("hello ", 2, 0, "<")).is_rejected());
        assert!(check(&span, &TextChange::edit("hello ", 2, 0, "@")).is_rejected());
    }

    #[test]
    fn test_auto_complete_on_newline() {
        let span = Span::new(SpanKind::Code, " var x = 1;", SourceLocation::new(2, 0, 2))
            .with_edit_policy(EditPolicy::Code {
                auto_complete: Some("}".to_string()),
            });
        let change = TextChange::edit("@{ var x = 1;", 13, 0, "\n");
        assert_eq!(
            check(&span, &change),
            PartialParseResult::REJECTED | PartialParseResult::AUTO_COMPLETE_BLOCK
        );
    }

    #[test]
    fn test_statement_keyword_is_fixed() {
        let dialect = Dialect::c_like();
        let transition = Span::new(SpanKind::Transition, "@", SourceLocation::ZERO);
        let code = Span::new(SpanKind::Code, "if (a) {", SourceLocation::new(1, 0, 1))
            .with_edit_policy(EditPolicy::Code {
                auto_complete: None,
            });
        let context = EditContext {
            previous: Some(&transition),
            next: None,
            dialect: &dialect,
        };
        let accept = |position| {
            let change = TextChange::edit("@if (a) {", position, 0, "x");
            code.edit_policy.can_accept_change(&code, &change, &context)
        };
        assert!(accept(2).is_rejected());
        assert!(accept(3).is_rejected());
        assert!(accept(5).is_accepted());
    }

    #[test]
    fn test_markup_after_escape_rejects_leading_text() {
        let dialect = Dialect::c_like();
        let mut escape = Span::markup("@", SourceLocation::ZERO);
        escape.hidden = true;
        let markup = Span::markup("@ab", SourceLocation::new(1, 0, 1));
        let context = EditContext {
            previous: Some(&escape),
            next: None,
            dialect: &dialect,
        };
        let at_start = TextChange::edit("@@ab", 1, 0, "x");
        assert!(markup
            .edit_policy
            .can_accept_change(&markup, &at_start, &context)
            .is_rejected());
        let inside = TextChange::edit("@@ab", 3, 0, "x");
        assert!(markup
            .edit_policy
            .can_accept_change(&markup, &inside, &context)
            .is_accepted());
    }

    #[test]
    fn test_markup_after_expression_keeps_its_boundary() {
        let dialect = Dialect::c_like();
        let code = expression("bar", 5);
        let markup = Span::markup(" baz", SourceLocation::new(8, 0, 8));
        let context = EditContext {
            previous: Some(&code),
            next: None,
            dialect: &dialect,
        };
        let accept =
            |change: TextChange| markup.edit_policy.can_accept_change(&markup, &change, &context);

        assert!(accept(TextChange::edit("foo @bar baz", 8, 1, "")).is_rejected());
        assert!(accept(TextChange::edit("foo @bar baz", 8, 1, "y")).is_rejected());
        assert!(accept(TextChange::edit("foo @bar baz", 8, 0, ".")).is_rejected());
        assert!(accept(TextChange::edit("foo @bar baz", 8, 0, "!")).is_accepted());
        assert!(accept(TextChange::edit("foo @bar baz", 10, 0, "x")).is_accepted());

        let dotted = Span::markup(". x", SourceLocation::new(2, 0, 2));
        let context = EditContext {
            previous: Some(&code),
            next: None,
            dialect: &dialect,
        };
        let change = TextChange::edit("@v. x", 3, 1, "");
        assert!(dotted
            .edit_policy
            .can_accept_change(&dotted, &change, &context)
            .is_rejected());
    }

    #[test]
    fn test_markup_edit_next_to_email_at_is_rejected() {
        let email = Span::markup("x a@b c", SourceLocation::ZERO);
        assert!(check(&email, &TextChange::edit("x a@b c", 2, 1, "")).is_rejected());
        assert!(check(&email, &TextChange::edit("x a@b c", 3, 0, " ")).is_rejected());
        assert!(check(&email, &TextChange::edit("x a@b c", 4, 1, "")).is_rejected());
        assert!(check(&email, &TextChange::edit("x a@b c", 0, 1, "y")).is_accepted());
        assert!(check(&email, &TextChange::edit("x a@b c", 7, 0, "d")).is_accepted());
    }

    #[test]
    fn test_multibyte_expression_edit_does_not_split_chars() {
        let span = expression("wörld", 1);
        let old = TextBuffer::new("@wörld x");
        let inside = TextChange::new(3, 0, old.clone(), 3, 1, TextBuffer::new("@wöxrld x"));
        assert!(check(&span, &inside).is_rejected());

        let after = TextChange::edit(old, 4, 0, "x");
        assert!(check(&span, &after).is_accepted());
    }

    #[test]
    fn test_fixed_rejects() {
        let span = Span::new(SpanKind::Transition, "@", SourceLocation::ZERO);
        assert!(check(&span, &TextChange::edit("@", 0, 1, "")).is_rejected());
    }
}
