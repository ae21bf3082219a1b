//! Partial Reparse
//!
//! Decides whether a single text edit can be absorbed by the current tree
//! without running the parser again:
//!
//! ```text
//!   TextChange ──► normalize ──► owner span (SpanIndex)
//!                                   │
//!                 provisional window check (same owner as last edit?)
//!                                   │
//!                   EditPolicy::can_accept_change(span, change, neighbours)
//!                                   │
//!           ACCEPTED / PROVISIONAL ─┴─ REJECTED (+ AUTO_COMPLETE_BLOCK)
//!                  │
//!      span content replaced in place, later spans relocated
//! ```
//!
//! The tree lives behind an `Arc`. Accepted edits go through
//! `Arc::make_mut`, so snapshots handed out earlier never change.

use super::block::{Block, SpanIndex};
use super::dialect::Dialect;
use super::edit_policy::{owns_change, EditContext, PartialParseResult};
use super::source_location::SourceLocation;
use super::text_change::TextChange;
use std::sync::Arc;

/// Synchronous partial reparse state for one document
#[derive(Debug, Clone)]
pub struct PartialParser {
    dialect: Arc<Dialect>,
    tree: Arc<Block>,
    index: SpanIndex,
    last_result: Option<PartialParseResult>,
    provisional_owner: Option<Vec<usize>>,
    last_auto_complete: Option<String>,
}

impl PartialParser {
    /// Track `tree`, parsed with `dialect`
    pub fn new(dialect: Arc<Dialect>, tree: impl Into<Arc<Block>>) -> Self {
        let tree = tree.into();
        let index = SpanIndex::build(&tree);
        Self {
            dialect,
            tree,
            index,
            last_result: None,
            provisional_owner: None,
            last_auto_complete: None,
        }
    }

    /// The current tree
    #[inline]
    pub fn tree(&self) -> &Block {
        &self.tree
    }

    /// A shared handle to the current tree
    #[inline]
    pub fn shared_tree(&self) -> Arc<Block> {
        Arc::clone(&self.tree)
    }

    /// The dialect the tree was parsed with
    #[inline]
    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    /// Result of the last evaluated change
    #[inline]
    pub fn last_result(&self) -> Option<PartialParseResult> {
        self.last_result
    }

    /// Whether the last change was accepted provisionally
    pub fn last_result_provisional(&self) -> bool {
        self.last_result.is_some_and(PartialParseResult::is_provisional)
    }

    /// Closing text offered by the last change that requested block completion
    pub fn last_auto_complete(&self) -> Option<&str> {
        self.last_auto_complete.as_deref()
    }

    /// Replace the tree after a full reparse
    ///
    /// Clears the provisional window.
    pub fn replace_tree(&mut self, tree: impl Into<Arc<Block>>) {
        self.tree = tree.into();
        self.index = SpanIndex::build(&self.tree);
        self.last_result = None;
        self.provisional_owner = None;
        self.last_auto_complete = None;
    }

    /// Document-order index of the span owning `change`
    fn find_owner(&self, change: &TextChange) -> Option<usize> {
        let offset = change.old_position;
        let entries = self.index.entries();
        let first = entries.partition_point(|entry| entry.end() < offset);

        (first..entries.len())
            .take_while(|&i| entries[i].start <= offset)
            .find(|&i| {
                self.index
                    .span(&self.tree, i)
                    .is_some_and(|span| owns_change(span, change))
            })
    }

    /// Evaluate `change` and apply it to the tree when it is accepted
    ///
    /// A rejected change leaves the tree untouched; the caller is expected
    /// to run a full parse of the new buffer.
    pub fn apply_change(&mut self, change: &TextChange) -> PartialParseResult {
        if change.old_length == 0 && change.new_length == 0 {
            return PartialParseResult::ACCEPTED;
        }

        let change = change.normalize();
        let owner = self.find_owner(&change);
        let result = match owner {
            Some(index) => self.evaluate(index, &change),
            None => PartialParseResult::REJECTED,
        };

        log_debug!("Partial parse of {} -> {:?}", change, result);

        self.last_result = Some(result);
        self.provisional_owner = match (owner, result.is_provisional()) {
            (Some(index), true) => self.index.entry(index).map(|entry| entry.path.clone()),
            _ => None,
        };
        result
    }

    fn evaluate(&mut self, index: usize, change: &TextChange) -> PartialParseResult {
        let path = match self.index.entry(index) {
            Some(entry) => entry.path.clone(),
            None => return PartialParseResult::REJECTED,
        };

        if let Some(owner) = self.provisional_owner.as_ref() {
            if owner != &path {
                log_trace!("Provisional window closed by an edit to another span");
                return PartialParseResult::REJECTED;
            }
        }

        let (result, updated) = {
            let span = match self.index.span(&self.tree, index) {
                Some(span) => span,
                None => return PartialParseResult::REJECTED,
            };
            let context = EditContext {
                previous: self.index.previous(&self.tree, index),
                next: self.index.next(&self.tree, index),
                dialect: self.dialect.as_ref(),
            };
            let result = span.edit_policy.can_accept_change(span, change, &context);

            if result.contains(PartialParseResult::AUTO_COMPLETE_BLOCK) {
                self.last_auto_complete = span.edit_policy.auto_complete().map(str::to_string);
            }

            let updated = if result.is_accepted() {
                change.apply_to(&span.content, span.start.absolute_offset)
            } else {
                None
            };
            (result, updated)
        };

        if !result.is_accepted() {
            return result;
        }
        let content = match updated {
            Some(content) => content,
            None => return PartialParseResult::REJECTED,
        };

        let tree = Arc::make_mut(&mut self.tree);
        if let Some(span) = tree.span_at_path_mut(&path) {
            span.content = content;
        }
        tree.relocate(SourceLocation::ZERO);
        self.index.adjust_after(index, change.delta());
        result
    }
}
