//! Exact-match deduplication of raw header sets across all sources of a run.

use std::collections::{hash_map::Entry, HashMap};

use tracing::debug;

use crate::{identity::IdentityKey, report::RunReporter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Admitted,
    Duplicate { first_seen_in: String },
}

/// First writer wins: the first header set observed for a key is kept, every later one is
/// dropped. Sources are iterated in a fixed order, so "first" is deterministic.
#[derive(Debug, Default)]
pub struct CorpusDeduplicator {
    // key -> origin of the surviving entry
    seen: HashMap<IdentityKey, String>,
}

impl CorpusDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a key as already present, e.g. from a resumed intermediate store.
    /// Returns false when the key was already known.
    pub fn seed(&mut self, key: IdentityKey, origin: &str) -> bool {
        match self.seen.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(origin.to_string());
                true
            }
        }
    }

    pub fn admit(
        &mut self,
        key: IdentityKey,
        origin: &str,
        reporter: &mut RunReporter,
    ) -> Admission {
        match self.seen.entry(key) {
            Entry::Occupied(existing) => {
                reporter.duplicate();
                debug!(
                    key = %existing.key(),
                    origin,
                    first_seen_in = %existing.get(),
                    "duplicate header set dropped"
                );
                Admission::Duplicate {
                    first_seen_in: existing.get().clone(),
                }
            }
            Entry::Vacant(slot) => {
                slot.insert(origin.to_string());
                Admission::Admitted
            }
        }
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.seen.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
