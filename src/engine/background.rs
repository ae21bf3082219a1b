//! Background Reparse Worker
//!
//! One worker thread per document runs full parses off the editing thread:
//!
//! ```text
//!  queue_change(buffer) ──► mpsc ──► worker: coalesce to the newest buffer
//!        │                                 │
//!        └── cancels the previous token    ├─► parse (polls its token)
//!                                          │
//!                     latest snapshot ◄────┴─► completion channel
//! ```
//!
//! Only the newest queued buffer is ever parsed. Queuing a buffer cancels
//! the parse in flight, which stops at its next span boundary. A parse that
//! fails for any other reason still sends a completion carrying the error;
//! the latest snapshot keeps the last tree that parsed. Readers of
//! [`BackgroundParser::latest`] hold the lock only long enough to clone an
//! `Arc`, so they never wait for a parse.

use super::block::{Block, SyntaxNode};
use super::context::CancellationToken;
use super::error::ParseError;
use super::parser::{ParserResults, RazorParser};
use super::text_change::TextBuffer;
use super::text_reader::StrSource;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Seeds for buffer fingerprints; fixed so fingerprints are comparable across runs
const FINGERPRINT_SEEDS: (u64, u64, u64, u64) = (
    0x243f_6a88_85a3_08d3,
    0x1319_8a2e_0370_7344,
    0xa409_3822_299f_31d0,
    0x082e_fa98_ec4e_6c89,
);

/// Hash of a buffer's text
pub fn fingerprint(text: &str) -> u64 {
    let (a, b, c, d) = FINGERPRINT_SEEDS;
    ahash::RandomState::with_seeds(a, b, c, d).hash_one(text)
}

/// Whether two trees differ in shape, ignoring span text and locations
pub fn trees_differ(left: &Block, right: &Block) -> bool {
    if left.block_type != right.block_type || left.children.len() != right.children.len() {
        return true;
    }
    left.children
        .iter()
        .zip(&right.children)
        .any(|pair| match pair {
            (SyntaxNode::Span(a), SyntaxNode::Span(b)) => {
                a.kind != b.kind || a.hidden != b.hidden || a.generator != b.generator
            }
            (SyntaxNode::Block(a), SyntaxNode::Block(b)) => trees_differ(a, b),
            _ => true,
        })
}

/// A finished background parse
#[derive(Debug, Clone)]
pub struct DocumentParseComplete {
    /// Sequence number returned by [`BackgroundParser::queue_change`]
    pub generation: u64,
    /// The text that was parsed
    pub buffer: TextBuffer,
    /// Tree and structural errors, or the fatal error that stopped the parse
    pub results: Result<ParserResults, ParseError>,
    /// Whether the tree's shape differs from the previous completed parse
    pub tree_structure_changed: bool,
}

impl DocumentParseComplete {
    /// The parsed tree, unless the parse failed
    pub fn document(&self) -> Option<&Block> {
        self.results.as_ref().ok().map(|results| &results.document)
    }

    /// Whether the parse produced a tree
    #[inline]
    pub fn is_success(&self) -> bool {
        self.results.is_ok()
    }
}

enum WorkItem {
    Parse {
        buffer: TextBuffer,
        generation: u64,
        cancellation: CancellationToken,
    },
    Shutdown,
}

#[derive(Default)]
struct Shared {
    latest: RwLock<Option<Arc<DocumentParseComplete>>>,
    in_flight: Mutex<Option<CancellationToken>>,
}

/// Full-document parser running on its own thread
pub struct BackgroundParser {
    sender: Sender<WorkItem>,
    completions: Receiver<Arc<DocumentParseComplete>>,
    shared: Arc<Shared>,
    generation: u64,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundParser {
    /// Start a worker parsing with `parser`
    pub fn new(parser: RazorParser) -> Self {
        let (sender, receiver) = mpsc::channel();
        let (completed, completions) = mpsc::channel();
        let shared = Arc::new(Shared::default());

        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new()
            .name("razorblade-parser".to_string())
            .spawn(move || run_worker(parser, receiver, completed, worker_shared))
            .ok();
        if worker.is_none() {
            log_debug!("Background parser thread could not be started");
        }

        Self {
            sender,
            completions,
            shared,
            generation: 0,
            worker,
        }
    }

    /// Queue a full parse of `buffer`, cancelling the parse in flight
    ///
    /// Returns the generation the completion will carry.
    pub fn queue_change(&mut self, buffer: TextBuffer) -> u64 {
        self.generation += 1;
        let cancellation = CancellationToken::new();
        if let Ok(mut in_flight) = self.shared.in_flight.lock() {
            if let Some(previous) = in_flight.replace(cancellation.clone()) {
                previous.cancel();
            }
        }

        log_trace!("Queued background parse #{}", self.generation);
        let item = WorkItem::Parse {
            buffer,
            generation: self.generation,
            cancellation,
        };
        if self.sender.send(item).is_err() {
            log_debug!("Background parser is no longer running");
        }
        self.generation
    }

    /// Generation of the most recently queued change
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Cancel the parse in flight, if any
    pub fn cancel(&self) {
        if let Ok(in_flight) = self.shared.in_flight.lock() {
            if let Some(token) = in_flight.as_ref() {
                token.cancel();
            }
        }
    }

    /// The last parse that produced a tree, without waiting
    pub fn latest(&self) -> Option<Arc<DocumentParseComplete>> {
        self.shared
            .latest
            .read()
            .ok()
            .and_then(|slot| slot.as_ref().map(Arc::clone))
    }

    /// Next completion, if one is ready
    pub fn try_recv(&self) -> Option<Arc<DocumentParseComplete>> {
        self.completions.try_recv().ok()
    }

    /// Wait up to `timeout` for the next completion
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Arc<DocumentParseComplete>> {
        match self.completions.recv_timeout(timeout) {
            Ok(complete) => Some(complete),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Whether the worker thread is alive
    pub fn is_running(&self) -> bool {
        self.worker
            .as_ref()
            .is_some_and(|worker| !worker.is_finished())
    }
}

impl Drop for BackgroundParser {
    fn drop(&mut self) {
        self.cancel();
        let _ = self.sender.send(WorkItem::Shutdown);
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

fn run_worker(
    parser: RazorParser,
    receiver: Receiver<WorkItem>,
    completed: Sender<Arc<DocumentParseComplete>>,
    shared: Arc<Shared>,
) {
    log_debug!("Background parser started");
    let mut previous: Option<(u64, Arc<DocumentParseComplete>)> = None;

    while let Ok(mut item) = receiver.recv() {
        let mut shutdown = matches!(item, WorkItem::Shutdown);
        while !shutdown {
            match receiver.try_recv() {
                Ok(WorkItem::Shutdown) => shutdown = true,
                Ok(next) => item = next,
                Err(_) => break,
            }
        }
        if shutdown {
            break;
        }

        let WorkItem::Parse {
            buffer,
            generation,
            cancellation,
        } = item
        else {
            break;
        };
        if cancellation.is_cancelled() {
            continue;
        }

        let hash = fingerprint(buffer.text());
        let reused = previous
            .as_ref()
            .filter(|(last, complete)| *last == hash && complete.buffer.text() == buffer.text())
            .map(|(_, complete)| complete.results.clone());

        let results = match reused {
            Some(results) => results,
            None => {
                let source = StrSource::new(buffer.text());
                match parser.parse_with_cancellation(source, cancellation) {
                    Ok(results) => Ok(results),
                    Err(ParseError::Cancelled) => {
                        log_trace!("Background parse #{} cancelled", generation);
                        continue;
                    }
                    Err(error) => {
                        log_debug!("Background parse #{} failed: {}", generation, error);
                        Err(error)
                    }
                }
            }
        };

        let tree_structure_changed = match (&previous, &results) {
            (Some((_, last)), Ok(results)) => last
                .document()
                .map_or(true, |document| trees_differ(document, &results.document)),
            (None, Ok(_)) => true,
            (_, Err(_)) => false,
        };
        let complete = Arc::new(DocumentParseComplete {
            generation,
            buffer,
            results,
            tree_structure_changed,
        });

        if complete.is_success() {
            if let Ok(mut slot) = shared.latest.write() {
                *slot = Some(Arc::clone(&complete));
            }
            log_debug!(
                "Background parse #{} complete (structure changed: {})",
                generation,
                tree_structure_changed
            );
        }
        let _ = completed.send(Arc::clone(&complete));
        if complete.is_success() {
            previous = Some((hash, complete));
        }
    }

    log_debug!("Background parser stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::parser::ParserConfig;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_completion_carries_generation_and_tree() {
        let mut background = BackgroundParser::new(RazorParser::c_like());
        let generation = background.queue_change(TextBuffer::new("a @b c"));
        let complete = background.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(complete.generation, generation);
        assert_eq!(complete.document().unwrap().content(), "a @b c");
        assert!(complete.tree_structure_changed);
        assert_eq!(
            background.latest().map(|latest| latest.generation),
            Some(generation)
        );
    }

    #[test]
    fn test_latest_change_always_completes() {
        let mut background = BackgroundParser::new(RazorParser::c_like());
        for text in ["@a", "@ab", "@abc"] {
            background.queue_change(TextBuffer::new(text));
        }

        let mut last = None;
        while let Some(complete) = background.recv_timeout(TIMEOUT) {
            let done = complete.generation == 3;
            last = Some(complete);
            if done {
                break;
            }
        }
        let last = last.unwrap();
        assert_eq!(last.generation, 3);
        assert_eq!(last.document().unwrap().content(), "@abc");
    }

    #[test]
    fn test_same_shape_is_not_a_structure_change() {
        let mut background = BackgroundParser::new(RazorParser::c_like());
        background.queue_change(TextBuffer::new("x @a y"));
        background.recv_timeout(TIMEOUT).unwrap();
        background.queue_change(TextBuffer::new("xx @abc y"));
        let second = background.recv_timeout(TIMEOUT).unwrap();
        assert!(!second.tree_structure_changed);
        background.queue_change(TextBuffer::new("xx @if (a) { } y"));
        let third = background.recv_timeout(TIMEOUT).unwrap();
        assert!(third.tree_structure_changed);
    }

    #[test]
    fn test_failed_parse_still_completes() {
        let config = ParserConfig::default().with_max_input_size(4);
        let mut background = BackgroundParser::new(RazorParser::c_like().with_config(config));
        background.queue_change(TextBuffer::new("@a"));
        background.recv_timeout(TIMEOUT).unwrap();

        let generation = background.queue_change(TextBuffer::new("@abcdefgh"));
        let failed = background.recv_timeout(TIMEOUT).unwrap();
        assert_eq!(failed.generation, generation);
        assert!(matches!(
            failed.results,
            Err(ParseError::InputTooLarge { max_size: 4, .. })
        ));
        assert!(failed.document().is_none());
        assert!(!failed.tree_structure_changed);
        assert_eq!(
            background.latest().unwrap().document().unwrap().content(),
            "@a"
        );
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(fingerprint("abc"), fingerprint("abc"));
        assert_ne!(fingerprint("abc"), fingerprint("abd"));
    }

    #[test]
    fn test_drop_stops_worker() {
        let mut background = BackgroundParser::new(RazorParser::c_like());
        background.queue_change(TextBuffer::new("@x"));
        drop(background);
    }
}
