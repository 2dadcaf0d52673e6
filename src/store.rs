use core::hash::BuildHasherDefault;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use seahash::SeaHasher;
use tracing::debug;

use crate::error::{PeekError, Result};
use crate::fact;
use crate::glob::Pattern;

pub type KeyHasher = BuildHasherDefault<SeaHasher>;

// ------------- Slot -------------
// Position of a fact in the ordered sequence. Keys that compare equal under
// the hierarchical order (such as `host:02` and `host:2`) are still distinct
// identities, so the insertion sequence number breaks the tie.
#[derive(Debug, Clone)]
struct Slot {
    key: Arc<str>,
    sequence: u64,
}
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        fact::compare(&self.key, &other.key).then(self.sequence.cmp(&other.sequence))
    }
}
impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Slot {}

// ------------- FactStore -------------
/// Ordered, key-unique collection of facts.
///
/// Iteration always yields facts in hierarchical key order, never in
/// insertion order. At most one fact is kept per key; adding a fact whose key
/// is already present is refused rather than overwriting.
#[derive(Default)]
pub struct FactStore {
    kept: BTreeMap<Slot, String>,
    lookup: HashMap<Arc<str>, Slot, KeyHasher>,
    sequence: u64,
}

impl FactStore {
    pub fn new() -> Self {
        Self::default()
    }
    /// Adds a fact, returning whether it was accepted.
    ///
    /// Fails with `InvalidFact` on a grammar violation. A fact whose key is
    /// already present is not accepted and leaves the store untouched.
    pub fn add(&mut self, raw: &str) -> Result<bool> {
        fact::validate(raw)?;
        let key = fact::key(raw);
        if self.lookup.contains_key(key) {
            return Ok(false);
        }
        self.sequence += 1;
        let slot = Slot {
            key: Arc::from(key),
            sequence: self.sequence,
        };
        self.lookup.insert(Arc::clone(&slot.key), slot.clone());
        self.kept.insert(slot, raw.to_owned());
        Ok(true)
    }
    /// Removes the fact sharing `raw`'s key, if there is one.
    pub fn delete(&mut self, raw: &str) -> bool {
        match self.lookup.remove(fact::key(raw)) {
            Some(slot) => {
                self.kept.remove(&slot);
                true
            }
            None => false,
        }
    }
    pub fn exists(&self, raw: &str) -> bool {
        self.lookup.contains_key(fact::key(raw))
    }
    /// The stored fact sharing `raw`'s key.
    pub fn get(&self, raw: &str) -> Option<&str> {
        self.lookup
            .get(fact::key(raw))
            .and_then(|slot| self.kept.get(slot))
            .map(String::as_str)
    }
    /// Removes every fact whose full text matches the extended glob `pattern`.
    pub fn clear_matching(&mut self, pattern: &str) -> usize {
        let pattern = Pattern::new(pattern);
        let doomed: Vec<Slot> = self
            .kept
            .iter()
            .filter(|(_, raw)| pattern.matches(raw))
            .map(|(slot, _)| slot.clone())
            .collect();
        for slot in &doomed {
            self.kept.remove(slot);
            self.lookup.remove(&slot.key);
        }
        debug!(pattern = %pattern, removed = doomed.len(), "cleared facts");
        doomed.len()
    }
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.kept.values().map(String::as_str)
    }
    pub fn len(&self) -> usize {
        self.kept.len()
    }
    pub fn is_empty(&self) -> bool {
        self.kept.is_empty()
    }
    /// Verifies that the key index and the ordered sequence describe the same facts.
    pub fn check_consistency(&self) -> Result<()> {
        if self.kept.len() != self.lookup.len() {
            return Err(PeekError::Invariant(format!(
                "{} facts but {} indexed keys",
                self.kept.len(),
                self.lookup.len()
            )));
        }
        for (slot, raw) in &self.kept {
            if fact::key(raw) != &*slot.key || self.lookup.get(&slot.key) != Some(slot) {
                return Err(PeekError::Invariant(format!("fact {raw:?} is not indexed")));
            }
        }
        Ok(())
    }
}

impl fmt::Debug for FactStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl fmt::Display for FactStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for raw in self.iter() {
            writeln!(f, "{raw}")?;
        }
        Ok(())
    }
}
