//! Tree Printing
//!
//! Human-readable dumps of syntax trees for debugging and test failures.
//!
//! ```text
//! Markup Block
//!   Markup Span [0..4] "foo "
//!   Expression Block
//!     Transition Span [4..5] "@"
//!     Code Span [5..14] "user.name"
//!   Markup Span [14..18] " baz"
//! ```

use super::block::{Block, SyntaxNode};
use super::span::Span;

/// Syntax tree pretty printer
pub struct TreePrinter {
    indent: String,
    max_depth: Option<usize>,
    show_policies: bool,
}

impl TreePrinter {
    /// Create a new tree printer
    pub fn new() -> Self {
        Self {
            indent: "  ".to_string(),
            max_depth: None,
            show_policies: false,
        }
    }

    /// Set the indentation string
    pub fn indent(mut self, indent: &str) -> Self {
        self.indent = indent.to_string();
        self
    }

    /// Set the maximum depth to print
    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Also print each span's edit policy and generator
    pub fn show_policies(mut self, show: bool) -> Self {
        self.show_policies = show;
        self
    }

    /// Print a tree
    pub fn print(&self, block: &Block) -> String {
        let mut output = String::new();
        self.print_block(block, 0, &mut output);
        output
    }

    fn print_block(&self, block: &Block, depth: usize, output: &mut String) {
        let indent = self.indent.repeat(depth);
        if self.max_depth.is_some_and(|max| depth > max) {
            output.push_str(&format!("{}...\n", indent));
            return;
        }

        output.push_str(&format!("{}{:?} Block\n", indent, block.block_type));
        for child in &block.children {
            match child {
                SyntaxNode::Span(span) => self.print_span(span, depth + 1, output),
                SyntaxNode::Block(inner) => self.print_block(inner, depth + 1, output),
            }
        }
    }

    fn print_span(&self, span: &Span, depth: usize, output: &mut String) {
        let indent = self.indent.repeat(depth);
        output.push_str(&format!(
            "{}{:?} Span [{}..{}] {:?}",
            indent,
            span.kind,
            span.start.absolute_offset,
            span.end_offset(),
            span.content
        ));
        if span.hidden {
            output.push_str(" hidden");
        }
        if self.show_policies {
            output.push_str(&format!(" {:?} {:?}", span.edit_policy, span.generator));
        }
        output.push('\n');
    }
}

impl Default for TreePrinter {
    fn default() -> Self {
        Self::new()
    }
}
