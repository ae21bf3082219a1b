//! Tree Traversal
//!
//! [`ParserVisitor`] receives the events of a document-order walk over a
//! tree. Every method has an empty default, so consumers implement only
//! what they need.

use super::block::{Block, SyntaxNode};
use super::error::RazorError;
use super::parser::ParserResults;
use super::span::Span;

/// Receiver of tree traversal events
pub trait ParserVisitor {
    fn visit_start_block(&mut self, _block: &Block) {}
    fn visit_span(&mut self, _span: &Span) {}
    fn visit_end_block(&mut self, _block: &Block) {}
    fn visit_error(&mut self, _error: &RazorError) {}
    /// Called once after the whole tree has been visited
    fn on_complete(&mut self) {}
}

/// Visit `block` and its descendants in document order
pub fn walk<V: ParserVisitor + ?Sized>(visitor: &mut V, block: &Block) {
    visitor.visit_start_block(block);
    for child in &block.children {
        match child {
            SyntaxNode::Span(span) => visitor.visit_span(span),
            SyntaxNode::Block(inner) => walk(visitor, inner),
        }
    }
    visitor.visit_end_block(block);
}

/// Visit the tree and errors of `results`, then signal completion
pub fn visit_results<V: ParserVisitor + ?Sized>(visitor: &mut V, results: &ParserResults) {
    walk(visitor, &results.document);
    for error in &results.errors {
        visitor.visit_error(error);
    }
    visitor.on_complete();
}
