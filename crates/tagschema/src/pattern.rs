//! Compiled pattern cache
//!
//! Patterns are compiled once per source string and shared afterwards. The
//! cache is safe for concurrent use without caller-side locking, never evicts,
//! and does not remember compile failures.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};
use tracing::trace;

/// Process-wide default cache
static GLOBAL: OnceLock<Arc<PatternCache>> = OnceLock::new();

/// Memoizes compiled regular expressions by source string
#[derive(Debug, Default)]
pub struct PatternCache {
    patterns: RwLock<HashMap<String, Arc<Regex>>>,
}

impl PatternCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The shared cache used when no cache is injected
    pub fn global() -> Arc<PatternCache> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(PatternCache::new())))
    }

    /// Returns the compiled form of `pattern`, compiling it on first use
    ///
    /// Compilation happens under the write lock after a second lookup, so a
    /// pattern is compiled at most once and every caller receives the same
    /// `Arc`.
    pub fn compile(&self, pattern: &str) -> Result<Arc<Regex>, regex::Error> {
        if let Some(found) = self.lookup(pattern) {
            return Ok(found);
        }

        let mut patterns = self
            .patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(found) = patterns.get(pattern) {
            return Ok(Arc::clone(found));
        }
        let compiled = Arc::new(Regex::new(pattern)?);
        trace!(pattern, "compiled pattern");
        patterns.insert(pattern.to_string(), Arc::clone(&compiled));
        Ok(compiled)
    }

    /// Cached compiled form, without compiling
    pub fn lookup(&self, pattern: &str) -> Option<Arc<Regex>> {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pattern)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.patterns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
