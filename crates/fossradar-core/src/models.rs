//! Core data models shared by the record store, search engine, and
//! enrichment pipeline.
//!
//! [`ProjectRecord`] is the canonical entity loaded from catalog files.
//! [`SearchIndexEntry`] is its reduced projection used by the search engine
//! and written to the search index artifact. [`EnrichmentCache`] holds the
//! non-canonical metadata produced by each enrichment run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Slug of the directory's own meta-entry, always pinned first in results.
pub const SELF_SLUG: &str = "fossradar";

/// One catalog entry describing a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectRecord {
    pub slug: String,
    pub name: String,
    pub short_desc: String,
    /// URL of the repository on the hosting service.
    pub repo: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    /// Set by enrichment when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_lang: Option<String>,
    /// SPDX identifier.
    pub license: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub stars: u64,
    #[serde(default)]
    pub good_first_issues: u64,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub looking_for_contributors: bool,
    pub location_city: String,
    pub location_indian_state: String,
    pub added_at: DateTime<Utc>,
}

impl ProjectRecord {
    /// Whether the record carries `tag`. Tags are stored lowercase.
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Reduced projection of a [`ProjectRecord`] for interactive search.
///
/// Excludes license, website, and repository URL. Regenerated wholesale from
/// the record store; never mutated on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchIndexEntry {
    pub slug: String,
    pub name: String,
    pub short_desc: String,
    pub tags: Vec<String>,
    pub stars: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_lang: Option<String>,
    pub verified: bool,
    pub added_at: DateTime<Utc>,
    pub looking_for_contributors: bool,
    pub location_city: String,
    pub location_indian_state: String,
}

impl From<&ProjectRecord> for SearchIndexEntry {
    fn from(record: &ProjectRecord) -> Self {
        Self {
            slug: record.slug.clone(),
            name: record.name.clone(),
            short_desc: record.short_desc.clone(),
            tags: record.tags.clone(),
            stars: record.stars,
            primary_lang: record.primary_lang.clone(),
            verified: record.verified,
            added_at: record.added_at,
            looking_for_contributors: record.looking_for_contributors,
            location_city: record.location_city.clone(),
            location_indian_state: record.location_indian_state.clone(),
        }
    }
}

/// A repository contributor as shown on a project page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contributor {
    pub login: String,
    pub avatar_url: String,
    pub html_url: String,
    pub contributions: u64,
}

/// Detected installation method, e.g. `{"type": "cargo", "command": "cargo install ripgrep"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    #[serde(rename = "type")]
    pub kind: InstallKind,
    pub command: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallKind {
    Npm,
    Pip,
    Cargo,
    Go,
    Git,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Documentation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,
}

impl Documentation {
    pub fn is_empty(&self) -> bool {
        self.docs_url.is_none() && self.changelog_url.is_none()
    }
}

/// Extended repository statistics captured during enrichment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepoStats {
    pub forks: u64,
    pub watchers: u64,
    pub subscribers: u64,
    pub open_issues: u64,
    /// Repository size in kilobytes, as reported by the host.
    pub size_kb: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pushed_at: Option<DateTime<Utc>>,
    pub default_branch: String,
    pub archived: bool,
    pub has_issues: bool,
    pub has_wiki: bool,
    pub has_pages: bool,
    pub has_discussions: bool,
    /// Bytes of code per language.
    #[serde(default)]
    pub languages: BTreeMap<String, u64>,
}

/// Per-record derived metadata, fully overwritten on each enrichment run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentCache {
    pub slug: String,
    pub contributors: Vec<Contributor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installation: Option<Installation>,
    #[serde(default)]
    pub documentation: Documentation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats: Option<RepoStats>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use chrono::TimeZone;

    /// Build a record with the fields the engines look at; everything else
    /// gets a plausible default.
    pub fn record(slug: &str, tags: &[&str], stars: u64, state: &str) -> ProjectRecord {
        ProjectRecord {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            short_desc: format!("{} project", slug),
            repo: format!("https://github.com/example/{}", slug),
            website: None,
            primary_lang: None,
            license: "MIT".to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            stars,
            good_first_issues: 0,
            verified: false,
            looking_for_contributors: false,
            location_city: format!("{}-city", slug),
            location_indian_state: state.to_string(),
            added_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}
