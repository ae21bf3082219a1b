//! Editor Integration
//!
//! [`EditorParser`] is what a text editor talks to. Every keystroke goes
//! through [`EditorParser::check_for_structure_changes`]:
//!
//! - edits a span can absorb are applied to the tree immediately
//! - anything else is queued for a full reparse on the background worker,
//!   and further edits are queued too until that parse has been integrated
//!
//! Readers that only need "the latest tree" hold a [`TreeSnapshot`], which
//! never blocks on parsing.

use super::background::{BackgroundParser, DocumentParseComplete};
use super::block::Block;
use super::edit_policy::PartialParseResult;
use super::error::ParseError;
use super::parser::RazorParser;
use super::partial::PartialParser;
use super::text_change::{TextBuffer, TextChange};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

/// Non-blocking handle to the most recent tree of a document
#[derive(Debug, Clone)]
pub struct TreeSnapshot {
    slot: Arc<RwLock<Arc<Block>>>,
}

impl TreeSnapshot {
    fn new(tree: Arc<Block>) -> Self {
        Self {
            slot: Arc::new(RwLock::new(tree)),
        }
    }

    /// The most recent tree
    pub fn current(&self) -> Arc<Block> {
        match self.slot.read() {
            Ok(tree) => Arc::clone(&tree),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    fn publish(&self, tree: Arc<Block>) {
        match self.slot.write() {
            Ok(mut slot) => *slot = tree,
            Err(poisoned) => *poisoned.into_inner() = tree,
        }
    }
}

/// Incremental parser for one open document
pub struct EditorParser {
    parser: RazorParser,
    partial: PartialParser,
    background: BackgroundParser,
    snapshot: TreeSnapshot,
    buffer: TextBuffer,
    awaiting: Option<u64>,
    stale: bool,
}

impl EditorParser {
    /// Parse `text` synchronously and start tracking it
    pub fn new(parser: RazorParser, text: impl Into<TextBuffer>) -> Result<Self, ParseError> {
        let buffer = text.into();
        let results = parser.parse_str(buffer.text())?;
        let tree = Arc::new(results.document);

        Ok(Self {
            partial: PartialParser::new(parser.shared_dialect(), Arc::clone(&tree)),
            background: BackgroundParser::new(parser.clone()),
            snapshot: TreeSnapshot::new(tree),
            parser,
            buffer,
            awaiting: None,
            stale: false,
        })
    }

    /// The parser used for full reparses
    pub fn parser(&self) -> &RazorParser {
        &self.parser
    }

    /// The current text of the document
    pub fn buffer(&self) -> &TextBuffer {
        &self.buffer
    }

    /// The current tree
    pub fn current_tree(&self) -> Arc<Block> {
        self.snapshot.current()
    }

    /// A handle other threads can read the current tree from
    pub fn snapshot(&self) -> TreeSnapshot {
        self.snapshot.clone()
    }

    /// Whether a full reparse has been queued and not yet integrated
    pub fn is_reparse_pending(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Whether the current tree no longer matches the buffer
    ///
    /// Set when a background reparse fails. Every edit is reparsed in full
    /// until one succeeds.
    pub fn is_tree_stale(&self) -> bool {
        self.stale
    }

    /// Whether the last edit was accepted provisionally
    pub fn last_result_provisional(&self) -> bool {
        self.partial.last_result_provisional()
    }

    /// Closing text for the block the last edit left unterminated
    pub fn last_auto_complete(&self) -> Option<&str> {
        self.partial.last_auto_complete()
    }

    /// Decide how `change` affects the tree
    ///
    /// Accepted edits update the tree and the snapshot before returning. A
    /// rejected edit queues a background reparse of the new buffer.
    pub fn check_for_structure_changes(&mut self, change: &TextChange) -> PartialParseResult {
        if change.old_buffer_id() != self.buffer.id() {
            log_debug!(
                "Change is based on buffer {} but the document is at {}",
                change.old_buffer_id(),
                self.buffer.id()
            );
        }
        self.buffer = change.new_buffer().clone();

        if self.awaiting.is_some() || self.stale {
            self.queue_reparse();
            return PartialParseResult::REJECTED;
        }

        let result = self.partial.apply_change(change);
        if result.is_accepted() {
            self.snapshot.publish(self.partial.shared_tree());
        } else {
            self.queue_reparse();
        }
        result
    }

    fn queue_reparse(&mut self) {
        let generation = self.background.queue_change(self.buffer.clone());
        self.awaiting = Some(generation);
    }

    fn integrate(&mut self, complete: &DocumentParseComplete) -> bool {
        if self.awaiting != Some(complete.generation) || complete.buffer.id() != self.buffer.id() {
            return false;
        }
        self.awaiting = None;
        match complete.document() {
            Some(document) => {
                let tree = Arc::new(document.clone());
                self.partial.replace_tree(Arc::clone(&tree));
                self.snapshot.publish(tree);
                self.stale = false;
            }
            None => {
                log_debug!(
                    "Keeping the previous tree after failed reparse #{}",
                    complete.generation
                );
                self.stale = true;
            }
        }
        true
    }

    /// Integrate a finished background parse, if one is ready
    ///
    /// Completions for buffers that have since been edited are skipped. A
    /// failed parse ends the wait but leaves the current tree in place.
    pub fn poll(&mut self) -> Option<Arc<DocumentParseComplete>> {
        while let Some(complete) = self.background.try_recv() {
            if self.integrate(&complete) {
                return Some(complete);
            }
        }
        None
    }

    /// Wait up to `timeout` for the pending reparse to be integrated
    pub fn wait_for_reparse(&mut self, timeout: Duration) -> Option<Arc<DocumentParseComplete>> {
        let deadline = Instant::now() + timeout;
        while self.awaiting.is_some() {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            let complete = self.background.recv_timeout(remaining)?;
            if self.integrate(&complete) {
                return Some(complete);
            }
        }
        None
    }
}
