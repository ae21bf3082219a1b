//! Thread-local cache of compiled dialect patterns
//!
//! Dialects store their block terminators as pattern strings so they stay
//! plain data. The parser matches them line by line, which would recompile
//! each pattern on every line without this cache.

use hashbrown::HashMap;
use regex::Regex;
use std::cell::RefCell;

thread_local! {
    static PATTERNS: RefCell<HashMap<String, Option<Regex>>> = RefCell::new(HashMap::new());
}

/// Get or compile a pattern, `None` when it is invalid
///
/// Invalid patterns are cached too, so they fail fast on later lookups.
pub fn get_or_compile(pattern: &str) -> Option<Regex> {
    PATTERNS.with(|cache| {
        if let Some(entry) = cache.borrow().get(pattern) {
            return entry.clone();
        }

        let compiled = Regex::new(pattern).ok();
        cache
            .borrow_mut()
            .insert(pattern.to_string(), compiled.clone());
        compiled
    })
}

/// Whether `pattern` compiles
pub fn is_valid(pattern: &str) -> bool {
    get_or_compile(pattern).is_some()
}

/// Whether `pattern` matches somewhere in `text`; invalid patterns never match
pub fn is_match(pattern: &str, text: &str) -> bool {
    get_or_compile(pattern).is_some_and(|regex| regex.is_match(text))
}

/// Length of the match of `pattern` at the start of `text`
pub fn match_prefix_len(pattern: &str, text: &str) -> Option<usize> {
    let regex = get_or_compile(pattern)?;
    regex.find(text).filter(|m| m.start() == 0).map(|m| m.end())
}

/// Drop every cached pattern of the current thread
pub fn clear_cache() {
    PATTERNS.with(|cache| cache.borrow_mut().clear());
}

/// Number of cached patterns on the current thread
pub fn cache_size() -> usize {
    PATTERNS.with(|cache| cache.borrow().len())
}
