//! Property-based tests using proptest
//!
//! These tests use property-based testing to verify reader, parser and
//! partial reparse behavior across a wide range of inputs.

use proptest::prelude::*;
use razorblade::{
    LookaheadTextReader, PartialParseResult, PartialParser, RazorParser, SourceLocation,
    SourceLocationTracker, TextBuffer, TextChange,
};

/// Templates built from markup, tags, expressions and blocks
///
/// Code names start with `v` so no piece spells a keyword.
fn template() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[a-z ]{1,8}",
        "[a-z]{1,5}".prop_map(|name| format!("<{0}>x</{0}>", name)),
        "v[a-z]{0,5}(\\.[a-z]{1,4})?".prop_map(|code| format!("@{}", code)),
        "v[a-z]{0,5}".prop_map(|code| format!("@({} + 1)", code)),
        "v[a-z]{0,5}".prop_map(|code| format!("@{{ var {} = 1; }}", code)),
        Just("\n".to_string()),
        Just("@@".to_string()),
    ];
    prop::collection::vec(piece, 0..12).prop_map(|pieces| pieces.concat())
}

// =============================================================================
// Reader
// =============================================================================

proptest! {
    /// Dropping a lookahead scope restores the position
    #[test]
    fn test_lookahead_rewinds(text in "[a-z\n\r ]{0,40}", skip in 0usize..10, ahead in 0usize..20) {
        let mut reader = LookaheadTextReader::from_str(&text);
        for _ in 0..skip {
            reader.read();
        }
        let before = reader.current_location();
        let peeked = reader.peek();
        {
            let mut lookahead = reader.begin_lookahead();
            for _ in 0..ahead {
                lookahead.read();
            }
        }
        prop_assert_eq!(reader.current_location(), before);
        prop_assert_eq!(reader.peek(), peeked);
    }

    /// Reading everything yields the input
    #[test]
    fn test_read_to_end_is_identity(text in "\\PC{0,40}") {
        let mut reader = LookaheadTextReader::from_str(&text);
        prop_assert_eq!(reader.read_to_end(), text);
    }

    /// Incremental tracking agrees with scanning from the start
    #[test]
    fn test_tracker_matches_from_offset(text in "[ab\r\n]{0,30}") {
        let mut tracker = SourceLocationTracker::default();
        tracker.advance_str(&text);
        prop_assert_eq!(tracker.location(), SourceLocation::from_offset(&text, text.len()));
    }
}

// =============================================================================
// Parser
// =============================================================================

proptest! {
    /// The tree's text is exactly the input
    #[test]
    fn test_parse_is_lossless(input in template()) {
        let results = RazorParser::c_like().parse_str(&input).unwrap();
        prop_assert_eq!(results.document.content(), input);
    }

    /// Span locations agree with their offsets
    #[test]
    fn test_span_locations_are_consistent(input in template()) {
        let results = RazorParser::c_like().parse_str(&input).unwrap();
        let mut expected = 0;
        for span in results.document.spans() {
            prop_assert_eq!(span.start.absolute_offset, expected);
            prop_assert_eq!(span.start, SourceLocation::from_offset(&input, expected));
            expected += span.content.len();
        }
        prop_assert_eq!(expected, input.len());
    }

    /// Parsing the same input twice gives the same tree
    #[test]
    fn test_parse_is_deterministic(input in template()) {
        let parser = RazorParser::c_like();
        let first = parser.parse_str(&input).unwrap();
        let second = parser.parse_str(&input).unwrap();
        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Partial Reparse
// =============================================================================

proptest! {
    /// An edit that changes nothing is always accepted and leaves the tree alone
    #[test]
    fn test_zero_edit_accepted(input in template(), position in 0usize..200) {
        let parser = RazorParser::c_like();
        let tree = parser.parse_str(&input).unwrap().document;
        let mut partial = PartialParser::new(parser.shared_dialect(), tree.clone());

        let position = position.min(input.len());
        prop_assume!(input.is_char_boundary(position));
        let change = TextChange::edit(TextBuffer::new(input.as_str()), position, 0, "");
        prop_assert_eq!(partial.apply_change(&change), PartialParseResult::ACCEPTED);
        prop_assert_eq!(partial.tree(), &tree);
    }

    /// Accepted edits produce the tree a full parse would
    ///
    /// Covers insertions, deletions and replacements of up to two characters,
    /// including whitespace and dots. Provisional results are skipped since
    /// they knowingly disagree with a full parse until the next edit.
    #[test]
    fn test_accepted_edit_matches_full_parse(
        input in template(),
        position in 0usize..200,
        removed in 0usize..3,
        text in "[a-z .\n]{0,2}",
    ) {
        let parser = RazorParser::c_like();
        let tree = parser.parse_str(&input).unwrap().document;
        let mut partial = PartialParser::new(parser.shared_dialect(), tree);

        let position = position.min(input.len());
        let removed = removed.min(input.len() - position);
        prop_assume!(input.is_char_boundary(position));
        prop_assume!(input.is_char_boundary(position + removed));

        let change = TextChange::edit(TextBuffer::new(input.as_str()), position, removed, text.as_str());
        let result = partial.apply_change(&change);
        if result.is_accepted() && !result.is_provisional() {
            let updated = change.new_buffer().text().to_string();
            let full = parser.parse_str(&updated).unwrap().document;
            prop_assert_eq!(partial.tree().content(), updated);
            prop_assert_eq!(partial.tree(), &full);
        }
    }
}
