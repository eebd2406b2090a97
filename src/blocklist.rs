//! Blocklist parsing and domain matching.
//!
//! A form's blocklist is persisted as one newline-separated text blob.
//! Parsing trims each line and drops blank ones; surviving entries are
//! lower-cased.  Matching scans entries in configured order and stops at
//! the first hit, so when several entries would match the surfaced domain
//! is deterministic: the one listed first.

use ahash::AHasher;
use aho_corasick::{AhoCorasick, AhoCorasickBuilder};
use dashmap::DashMap;
use memchr::memmem;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// How blocklist entries are matched against the submitted email.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchPolicy {
    /// Unanchored substring containment: `example.com` also matches
    /// `notexample.com.evil.org`.  Deliberately loose; tightening belongs in
    /// [`MatchPolicy::DomainBoundary`], not here.
    #[default]
    Substring,
    /// Containment that only counts when the characters around the matched
    /// span are absent or are neither ASCII alphanumerics nor `-`.
    DomainBoundary,
}

/// Ordered list of domain substrings disallowed in submitted emails,
/// configured per form.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlocklistConfig {
    entries: Vec<String>,
}

impl BlocklistConfig {
    /// Parse the raw multi-line blob stored for a form.
    ///
    /// Lines are trimmed and blank lines dropped; an empty entry is a
    /// substring of every email and would block everything.  Entries are
    /// lower-cased to pair with the lower-cased submission value.  Order
    /// and duplicates are preserved.
    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in configured order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// First entry occurring in `email` under `policy`, in list order.
    ///
    /// List order decides the winner even when a later entry occurs earlier
    /// in the email text.
    pub fn first_match(&self, email: &str, policy: MatchPolicy) -> Option<&str> {
        if self.entries.is_empty() || email.is_empty() {
            return None;
        }
        // All-miss fast path.  A prefilter hit falls through to the ordered
        // scan so the surfaced entry still follows list order, and under the
        // boundary policy a hit may turn out not to count at all.
        if !prefilter_for(&self.entries).is_match(email) {
            return None;
        }
        self.entries
            .iter()
            .find(|entry| match policy {
                MatchPolicy::Substring => {
                    memmem::find(email.as_bytes(), entry.as_bytes()).is_some()
                }
                MatchPolicy::DomainBoundary => bounded_occurrence(email, entry),
            })
            .map(String::as_str)
    }
}

/// Boundary-aware containment check for a single entry.  An occurrence only
/// counts when the characters immediately before and after the matched span
/// are absent or are neither ASCII alphanumerics nor `-`, so `evil.com`
/// matches inside `to:evil.com` but not inside `evil.commerce`.
fn bounded_occurrence(text: &str, entry: &str) -> bool {
    let mut search_start = 0;
    while let Some(rel) = text[search_start..].find(entry) {
        let abs_start = search_start + rel;
        let abs_end = abs_start + entry.len();

        let before_ok = text[..abs_start]
            .chars()
            .next_back()
            .map(|c| !c.is_ascii_alphanumeric() && c != '-')
            .unwrap_or(true);
        let after_ok = text[abs_end..]
            .chars()
            .next()
            .map(|c| !c.is_ascii_alphanumeric() && c != '-')
            .unwrap_or(true);

        if before_ok && after_ok {
            return true;
        }
        search_start = abs_end;
    }
    false
}

/// Memoised Aho-Corasick prefilters keyed by a hash of the entry list.  The
/// same blocklist is scanned for every submission to its form, so compiled
/// automata are shared across calls.
static PREFILTER_CACHE: Lazy<DashMap<u64, Arc<AhoCorasick>>> = Lazy::new(DashMap::new);

fn prefilter_for(entries: &[String]) -> Arc<AhoCorasick> {
    let mut hasher = AHasher::default();
    for entry in entries {
        entry.hash(&mut hasher);
    }
    let key = hasher.finish();
    if let Some(existing) = PREFILTER_CACHE.get(&key) {
        return existing.clone();
    }
    // Entries are plain literals; compilation only fails on absurd sizes.
    let ac = AhoCorasickBuilder::new().build(entries).unwrap();
    let arc = Arc::new(ac);
    PREFILTER_CACHE.insert(key, arc.clone());
    arc
}
