//! Searchable tool catalog.
//!
//! Thread-safe, keyed by `tool_id:method`. Search ranks entries by weighted
//! field matches (description counts double) with prefix, stem and bounded
//! fuzzy term matching, then scales by query-token coverage.

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::RwLock;
use tracing::debug;

use super::{
    text::{tokenize, within_edit_distance},
    types::{IndexEntry, ToolDescriptor, ToolKey},
};
use crate::core::config::DEFAULT_FUZZINESS;

const DESCRIPTION_WEIGHT: f64 = 2.0;
const METHOD_WEIGHT: f64 = 1.0;
const PARAMETER_WEIGHT: f64 = 1.0;

const EXACT_QUALITY: f64 = 1.0;
const PREFIX_QUALITY: f64 = 0.5;
const STEM_QUALITY: f64 = 0.4;
const FUZZY_QUALITY: f64 = 0.33;

const MIN_PREFIX_LEN: usize = 2;
const MIN_STEM_LEN: usize = 3;
const MIN_FUZZY_LEN: usize = 4;

/// A ranked search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub descriptor: ToolDescriptor,
    pub score: f64,
}

#[derive(Debug, Clone)]
struct Stored {
    seq: u64,
    descriptor: ToolDescriptor,
    entry: IndexEntry,
}

#[derive(Debug, Default)]
struct IndexInner {
    entries: BTreeMap<ToolKey, Stored>,
    next_seq: u64,
}

impl IndexInner {
    fn upsert(&mut self, descriptor: ToolDescriptor) -> bool {
        let entry = IndexEntry::from_descriptor(&descriptor);
        let key = entry.key.clone();
        match self.entries.get_mut(&key) {
            Some(existing) => {
                existing.descriptor = descriptor;
                existing.entry = entry;
                false
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.entries.insert(
                    key,
                    Stored {
                        seq,
                        descriptor,
                        entry,
                    },
                );
                true
            }
        }
    }
}

pub struct CatalogIndex {
    inner: RwLock<IndexInner>,
    fuzziness: f64,
}

impl CatalogIndex {
    pub fn new() -> Self {
        Self::with_fuzziness(DEFAULT_FUZZINESS)
    }

    /// `fuzziness` is the edit-distance budget as a fraction of token length.
    pub fn with_fuzziness(fuzziness: f64) -> Self {
        Self {
            inner: RwLock::new(IndexInner::default()),
            fuzziness: fuzziness.clamp(0.0, 0.99),
        }
    }

    /// Insert or replace a descriptor. Returns `true` when the key was new.
    ///
    /// A replaced entry keeps its original position in the tie-break order.
    pub fn upsert(&self, descriptor: ToolDescriptor) -> bool {
        self.inner.write().upsert(descriptor)
    }

    pub fn remove(&self, key: &ToolKey) -> Option<ToolDescriptor> {
        self.inner
            .write()
            .entries
            .remove(key)
            .map(|stored| stored.descriptor)
    }

    /// Remove every entry belonging to `tool_id`. Returns how many were removed.
    pub fn remove_tool_id(&self, tool_id: &str) -> usize {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|key, _| key.tool_id != tool_id);
        before - inner.entries.len()
    }

    /// Replace the full tool set of `tool_id` in one step.
    ///
    /// Entries not present in `descriptors` are removed; surviving keys keep
    /// their sequence numbers. Descriptors for other tool ids are ignored.
    pub fn replace_tool_id(&self, tool_id: &str, descriptors: Vec<ToolDescriptor>) -> usize {
        let keep: HashSet<ToolKey> = descriptors
            .iter()
            .filter(|d| d.tool_id == tool_id)
            .map(ToolDescriptor::key)
            .collect();

        let mut inner = self.inner.write();
        inner
            .entries
            .retain(|key, _| key.tool_id != tool_id || keep.contains(key));
        for descriptor in descriptors {
            if descriptor.tool_id == tool_id {
                inner.upsert(descriptor);
            }
        }
        keep.len()
    }

    pub fn get(&self, key: &ToolKey) -> Option<ToolDescriptor> {
        self.inner
            .read()
            .entries
            .get(key)
            .map(|stored| stored.descriptor.clone())
    }

    pub fn contains(&self, key: &ToolKey) -> bool {
        self.inner.read().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    /// All descriptors in insertion order.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let inner = self.inner.read();
        let mut stored: Vec<&Stored> = inner.entries.values().collect();
        stored.sort_by_key(|s| s.seq);
        stored.into_iter().map(|s| s.descriptor.clone()).collect()
    }

    /// Number of entries per tool id.
    pub fn tool_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for key in self.inner.read().entries.keys() {
            *counts.entry(key.tool_id.clone()).or_insert(0) += 1;
        }
        counts
    }

    pub fn clear(&self) {
        self.inner.write().entries.clear();
    }

    /// Rank entries against `query` and return at most `limit` hits.
    ///
    /// Tokens combine with OR semantics: any entry matching at least one
    /// token is a candidate.
    pub fn search(&self, query: &str, limit: usize) -> Vec<SearchHit> {
        if limit == 0 {
            return Vec::new();
        }

        let mut seen = HashSet::new();
        let tokens: Vec<String> = tokenize(query)
            .into_iter()
            .filter(|t| seen.insert(t.clone()))
            .collect();
        if tokens.is_empty() {
            return Vec::new();
        }

        let inner = self.inner.read();
        let mut scored: Vec<(f64, u64, &ToolDescriptor)> = inner
            .entries
            .values()
            .filter_map(|stored| {
                let score = self.score_entry(&stored.entry, &tokens);
                (score > 0.0).then_some((score, stored.seq, &stored.descriptor))
            })
            .collect();

        scored.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));

        debug!(
            query = %query,
            candidates = scored.len(),
            limit,
            "Catalog search"
        );

        scored
            .into_iter()
            .take(limit)
            .map(|(score, _, descriptor)| SearchHit {
                descriptor: descriptor.clone(),
                score,
            })
            .collect()
    }

    fn score_entry(&self, entry: &IndexEntry, tokens: &[String]) -> f64 {
        let fields = [
            (DESCRIPTION_WEIGHT, &entry.description_terms),
            (METHOD_WEIGHT, &entry.method_terms),
            (PARAMETER_WEIGHT, &entry.parameter_terms),
        ];

        let mut total = 0.0;
        let mut matched = 0usize;
        for token in tokens {
            let token_score: f64 = fields
                .iter()
                .map(|(weight, terms)| weight * self.best_quality(token, terms))
                .sum();
            if token_score > 0.0 {
                matched += 1;
                total += token_score;
            }
        }

        if matched == 0 {
            return 0.0;
        }
        total * (matched as f64 / tokens.len() as f64)
    }

    fn best_quality(&self, token: &str, terms: &[String]) -> f64 {
        terms
            .iter()
            .map(|term| self.match_quality(token, term))
            .fold(0.0, f64::max)
    }

    fn match_quality(&self, token: &str, term: &str) -> f64 {
        if token == term {
            return EXACT_QUALITY;
        }
        let token_len = token.chars().count();
        if token_len >= MIN_PREFIX_LEN && term.starts_with(token) {
            return PREFIX_QUALITY;
        }
        if term.chars().count() >= MIN_STEM_LEN && token.starts_with(term) {
            return STEM_QUALITY;
        }
        if token_len >= MIN_FUZZY_LEN {
            let max_edits = (token_len as f64 * self.fuzziness).floor() as usize;
            if max_edits > 0 && within_edit_distance(token, term, max_edits) {
                return FUZZY_QUALITY;
            }
        }
        0.0
    }
}

impl Default for CatalogIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CatalogIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: HashMap<String, usize> = self.tool_counts().into_iter().collect();
        f.debug_struct("CatalogIndex")
            .field("entries", &self.len())
            .field("tool_counts", &counts)
            .field("fuzziness", &self.fuzziness)
            .finish()
    }
}
