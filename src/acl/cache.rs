//! Per-node cache of match results
//!
//! Some predicates are expensive to evaluate (credential checks, external
//! helpers). Their node keeps a short list of results keyed by the subject
//! the checklist was evaluated for, so one decision never evaluates the same
//! subject twice. Entries are never evicted on their own: the cache is
//! cleared as a whole, and it is dropped together with its node when the
//! configuration is replaced.

use super::node::MatchResult;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default bound on cached subjects per node
pub const DEFAULT_MAX_ENTRIES: usize = 1024;

/// A cached result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Subject the result was computed for
    pub subject: String,
    pub result: MatchResult,
}

/// Counters exposed for logging and tests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

/// Bounded list of (subject, result) pairs
#[derive(Debug)]
pub struct MatchCache {
    entries: Mutex<Vec<CacheEntry>>,
    max_entries: usize,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MatchCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            max_entries,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cached result for `subject`
    pub fn lookup(&self, subject: &str) -> Option<MatchResult> {
        let found = self
            .entries
            .lock()
            .iter()
            .find(|entry| entry.subject == subject)
            .map(|entry| entry.result);

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        found
    }

    /// Store `result` for `subject`, replacing an earlier result
    ///
    /// Returns `false` when the cache is full and the subject is new.
    pub fn insert(&self, subject: &str, result: MatchResult) -> bool {
        let mut entries = self.entries.lock();

        if let Some(entry) = entries.iter_mut().find(|e| e.subject == subject) {
            entry.result = result;
            return true;
        }
        if entries.len() >= self.max_entries {
            return false;
        }
        entries.push(CacheEntry {
            subject: subject.to_string(),
            result,
        });
        true
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries: self.len(),
        }
    }
}

impl Default for MatchCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}
