//! Search, filter, and rank engine over the search index.
//!
//! The engine is a pure function of its inputs. A query runs in three
//! stages:
//!
//! 1. **Fuzzy match**: skipped entirely when the search text is blank.
//!    Otherwise every entry is scored against `name`, `short_desc`, and each
//!    tag; entries whose best score exceeds the threshold are dropped.
//! 2. **Filter**: conjunctive predicates over verified only, looking for
//!    contributors, and a tag set the entry must contain in full.
//! 3. **Sort**: the directory's own entry ([`SELF_SLUG`]) is pinned first,
//!    the rest sort by name, stars, or recency.
//!
//! # Match Scores
//!
//! Scores run from `0.0` (perfect) to `1.0` (nothing in common). A
//! case-insensitive substring hit scores `0.0`. Otherwise the score is
//! `1 - normalized_levenshtein` against the whole field and against every
//! run of consecutive words as long as the query, keeping the best.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::str::FromStr;

use crate::models::{SearchIndexEntry, SELF_SLUG};

/// Default relevance threshold, tolerant of a typo or two in short queries.
pub const DEFAULT_FUZZY_THRESHOLD: f64 = 0.3;

/// Tuning parameters for the fuzzy pass.
#[derive(Debug, Clone, Copy)]
pub struct SearchParams {
    /// Maximum accepted match score in `[0.0, 1.0]`.
    pub fuzzy_threshold: f64,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
        }
    }
}

/// Conjunctive filter predicates. The default admits every entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilters {
    #[serde(default)]
    pub verified_only: bool,
    #[serde(default)]
    pub looking_for_contributors: bool,
    /// Every tag listed here must be present on the entry.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SearchFilters {
    pub fn matches(&self, entry: &SearchIndexEntry) -> bool {
        if self.verified_only && !entry.verified {
            return false;
        }
        if self.looking_for_contributors && !entry.looking_for_contributors {
            return false;
        }
        self.tags.iter().all(|wanted| {
            let wanted = wanted.to_lowercase();
            entry.tags.iter().any(|t| *t == wanted)
        })
    }
}

/// Result ordering applied after filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortMode {
    /// Name ascending.
    #[default]
    Name,
    /// Star count descending.
    Stars,
    /// Most recently added first.
    Recent,
}

impl FromStr for SortMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "name" => Ok(SortMode::Name),
            "stars" => Ok(SortMode::Stars),
            "recent" => Ok(SortMode::Recent),
            other => bail!("Unknown sort mode: {}. Use name, stars, or recent.", other),
        }
    }
}

/// Run a query over the full set of index entries.
///
/// Returns the surviving entries in display order. The input slice is left
/// untouched.
pub fn query(
    entries: &[SearchIndexEntry],
    search_text: &str,
    filters: &SearchFilters,
    sort: SortMode,
    params: &SearchParams,
) -> Vec<SearchIndexEntry> {
    let text = search_text.trim();

    let mut results: Vec<SearchIndexEntry> = entries
        .iter()
        .filter(|e| text.is_empty() || entry_score(text, e) <= params.fuzzy_threshold)
        .filter(|e| filters.matches(e))
        .cloned()
        .collect();

    results.sort_by(|a, b| compare_entries(a, b, sort));
    results
}

/// Pins the self entry ahead of everything else.
///
/// Returns `None` when neither or both entries are the self entry, leaving
/// the decision to the sort mode's comparator.
pub fn pinned_first(a: &SearchIndexEntry, b: &SearchIndexEntry) -> Option<Ordering> {
    match (a.slug == SELF_SLUG, b.slug == SELF_SLUG) {
        (true, false) => Some(Ordering::Less),
        (false, true) => Some(Ordering::Greater),
        _ => None,
    }
}

/// Total order used for query results.
pub fn compare_entries(a: &SearchIndexEntry, b: &SearchIndexEntry, sort: SortMode) -> Ordering {
    if let Some(order) = pinned_first(a, b) {
        return order;
    }
    match sort {
        SortMode::Name => compare_names(&a.name, &b.name),
        SortMode::Stars => b.stars.cmp(&a.stars),
        SortMode::Recent => b.added_at.cmp(&a.added_at),
    }
}

/// Case-insensitive name order with the raw name as tiebreak.
pub fn compare_names(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Best match score of `text` across the searchable fields of `entry`.
pub fn entry_score(text: &str, entry: &SearchIndexEntry) -> f64 {
    let fields = std::iter::once(entry.name.as_str())
        .chain(std::iter::once(entry.short_desc.as_str()))
        .chain(entry.tags.iter().map(String::as_str));

    fields
        .map(|field| match_score(text, field))
        .fold(1.0, f64::min)
}

/// Score a query against one field value: `0.0` is a perfect match.
pub fn match_score(query: &str, field: &str) -> f64 {
    let query = normalize(query);
    let field = field.to_lowercase();
    if query.is_empty() || field.is_empty() {
        return 1.0;
    }
    if field.contains(&query) {
        return 0.0;
    }

    let mut best = 1.0 - strsim::normalized_levenshtein(&query, &field);

    let width = query.split(' ').count();
    let words: Vec<&str> = field
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    if words.len() >= width {
        for window in words.windows(width) {
            let candidate = window.join(" ");
            best = best.min(1.0 - strsim::normalized_levenshtein(&query, &candidate));
        }
    }
    best
}

fn normalize(text: &str) -> String {
    text.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Sorted, de-duplicated tag vocabulary across all entries.
pub fn available_tags(entries: &[SearchIndexEntry]) -> Vec<String> {
    entries
        .iter()
        .flat_map(|e| e.tags.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
