//! Integration tests for the template parser
//!
//! These tests cover:
//! - Tree shape and locations for whole documents
//! - Directive uniqueness and conflicts
//! - Error recovery without aborting
//! - Both built-in dialects and custom keyword tables

use razorblade::{
    Block, BlockType, Dialect, DirectiveKind, DirectiveRule, KeywordBehavior, KeywordTable,
    ParserResults, RazorParser, SourceLocation, SpanKind, SyntaxNode, TreePrinter,
};

fn parse(input: &str) -> ParserResults {
    RazorParser::c_like().parse_str(input).unwrap()
}

fn child_block(block: &Block, index: usize) -> &Block {
    block
        .children
        .iter()
        .filter_map(SyntaxNode::as_block)
        .nth(index)
        .unwrap()
}

// ============================================================================
// Whole Documents
// ============================================================================

#[test]
fn test_implicit_expression_document() {
    let results = parse("foo @user.name baz");
    assert!(results.success);

    let spans: Vec<_> = results
        .document
        .spans()
        .map(|span| (span.kind, span.content.as_str(), span.start.absolute_offset))
        .collect();
    assert_eq!(
        spans,
        vec![
            (SpanKind::Markup, "foo ", 0),
            (SpanKind::Transition, "@", 4),
            (SpanKind::Code, "user.name", 5),
            (SpanKind::Markup, " baz", 14),
        ]
    );
    assert_eq!(child_block(&results.document, 0).block_type, BlockType::Expression);
}

#[test]
fn test_nested_markup_and_code_is_lossless() {
    let input = "<ul>\n@foreach (var item in Model.Items) {\n    <li class=\"@item.Css\">@item.Name</li>\n    @: plain @item.Id\n}\n</ul>\n@section Footer {\n<p>@DateTime.Now.Year</p>\n}\n";
    let results = parse(input);
    assert!(results.success, "{:?}", results.errors);
    assert_eq!(results.document.content(), input);
    assert_eq!(results.document.count_blocks(BlockType::Section), 1);
    assert!(results.document.count_blocks(BlockType::Expression) >= 4);
}

#[test]
fn test_locations_match_offsets() {
    let input = "line one\r\n@if (a) {\r\n  <b>@b</b>\r\n}\r\nlast";
    let results = parse(input);
    for span in results.document.spans() {
        assert_eq!(
            span.start,
            SourceLocation::from_offset(input, span.start.absolute_offset)
        );
    }
}

// ============================================================================
// Directives
// ============================================================================

#[test]
fn test_single_directive_rule() {
    let results = parse("@model A\n@model B\n");
    assert_eq!(results.errors.len(), 1);
    let error = &results.errors[0];
    assert_eq!(error.location.absolute_offset, 10);
    assert_eq!(error.location.line, 1);
    assert_eq!(error.length, "model".len());
    assert_eq!(results.document.count_blocks(BlockType::Directive), 2);
}

#[test]
fn test_directive_error_after_multibyte_transition() {
    let mut dialect = Dialect::c_like();
    dialect.transition = '§';
    let parser = RazorParser::new(dialect.validate().unwrap());
    let results = parser.parse_str("§model A\n§model B\n").unwrap();

    assert_eq!(results.errors.len(), 1);
    let error = &results.errors[0];
    assert_eq!(error.location.absolute_offset, 12);
    assert_eq!(error.location.line, 1);
    assert_eq!(error.location.column, 1);
    assert_eq!(results.document.count_blocks(BlockType::Directive), 2);
}

#[test]
fn test_conflicting_directive_rule_both_orders() {
    let results = parse("@model A\n@inherits B\n");
    assert_eq!(results.errors.len(), 1);
    assert_eq!(results.errors[0].location.absolute_offset, 10);

    let results = parse("@inherits B\n@model A\n");
    assert_eq!(results.errors.len(), 1);
    assert_eq!(results.errors[0].location.absolute_offset, 13);
}

#[test]
fn test_repeatable_directive_has_no_error() {
    let results = parse("@using A\n@using B\n");
    assert!(results.success);
    assert_eq!(results.document.count_blocks(BlockType::Directive), 2);
}

// ============================================================================
// Error Recovery
// ============================================================================

#[test]
fn test_errors_do_not_abort() {
    let input = "@model A\n@model B\n<p>@{ var x = 1;\n<div>@x";
    let results = parse(input);
    assert!(!results.success);
    assert!(results.errors.len() >= 2);
    assert_eq!(results.document.content(), input);
}

#[test]
fn test_error_formatting_points_at_source() {
    let input = "@model A\n@model B";
    let results = parse(input);
    let formatted = results.errors[0].format_with_source(input);
    assert!(formatted.starts_with("Error at line 2, column 2:"));
    assert!(formatted.contains("@model B\n ^~~~~\n"));
}

// ============================================================================
// Dialects
// ============================================================================

#[test]
fn test_basic_dialect_statement_and_code_block() {
    let input = "@If x Then\n  <p>@y</p>\nEnd If\n@Code\n  Dim z = 1\nEnd Code\n@ModelType Foo\n";
    let results = RazorParser::basic_like().parse_str(input).unwrap();
    assert!(results.success, "{:?}", results.errors);
    assert_eq!(results.document.content(), input);
    assert_eq!(results.document.count_blocks(BlockType::Statement), 2);
    assert_eq!(results.document.count_blocks(BlockType::Directive), 1);
}

#[test]
fn test_custom_keyword_table() {
    let mut dialect = Dialect::c_like();
    dialect.keywords = KeywordTable::new(true).with(
        "model",
        KeywordBehavior::Directive(DirectiveRule::new(DirectiveKind::ModelType).unique()),
    );
    let parser = RazorParser::new(dialect);

    let results = parser.parse_str("@if (x) @model T").unwrap();
    assert!(results.success);
    assert_eq!(results.document.count_blocks(BlockType::Statement), 0);
    assert_eq!(child_block(&results.document, 0).block_type, BlockType::Expression);
    assert_eq!(child_block(&results.document, 1).block_type, BlockType::Directive);
}

#[test]
fn test_custom_transition_character() {
    let mut dialect = Dialect::c_like();
    dialect.transition = '~';
    let dialect = dialect.validate().unwrap();
    let results = RazorParser::new(dialect).parse_str("a@b.c ~name d").unwrap();
    let code: Vec<_> = results
        .document
        .spans()
        .filter(|span| span.kind == SpanKind::Code)
        .map(|span| span.content.clone())
        .collect();
    assert_eq!(code, vec!["name".to_string()]);
}

// ============================================================================
// Export
// ============================================================================

#[test]
fn test_results_json_and_tree_dump() {
    let results = parse("@model A\n@model B");
    let json = results.to_json().unwrap();
    assert!(json.contains("\"success\":false"));
    assert!(json.contains("\"errors\":[{"));

    let dump = TreePrinter::new().print(&results.document);
    assert!(dump.starts_with("Markup Block\n"));
    assert!(dump.contains("Directive Block"));
}
