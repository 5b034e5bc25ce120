//! Record store: loads and validates the catalog directory.
//!
//! Each project lives in `<records_dir>/<slug>.toml`. Loading walks the
//! directory, parses every file, and applies the schema rules. A file that
//! fails is excluded with a logged reason; the rest of the catalog still
//! loads. The store is rebuilt from scratch on every load, never patched.

use anyhow::{bail, Context};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use fossradar_core::index::build_search_index;
use fossradar_core::models::{ProjectRecord, SearchIndexEntry};
use fossradar_core::search::compare_names;
use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{CatalogError, Result};
use crate::github::RepoRef;

/// On-disk shape of a record before validation.
#[derive(Debug, Deserialize)]
struct RawRecord {
    slug: String,
    name: String,
    short_desc: String,
    repo: String,
    website: Option<String>,
    primary_lang: Option<String>,
    license: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    stars: u64,
    #[serde(default)]
    good_first_issues: u64,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    looking_for_contributors: bool,
    location_city: String,
    location_indian_state: String,
    added_at: toml::Value,
}

/// The validated catalog, in name order.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: Vec<ProjectRecord>,
    paths: HashMap<String, PathBuf>,
    rejected: Vec<CatalogError>,
}

impl RecordStore {
    /// Load every `*.toml` record directly under `dir`.
    ///
    /// Fails only when the directory itself cannot be read. Individual bad
    /// records end up in [`rejected`](RecordStore::rejected).
    pub fn load_all(dir: &Path) -> anyhow::Result<Self> {
        if !dir.is_dir() {
            bail!("Records directory does not exist: {}", dir.display());
        }

        let matcher = toml_matcher()?;
        let mut files = Vec::new();
        for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
            let entry = entry.with_context(|| {
                format!("Failed to read records directory: {}", dir.display())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if matcher.is_match(entry.file_name()) {
                files.push(entry.into_path());
            }
        }
        files.sort();

        let mut store = RecordStore::default();
        let mut seen = HashSet::new();

        for path in files {
            match parse_record_file(&path) {
                Ok(record) => {
                    if !seen.insert(record.slug.clone()) {
                        let err = CatalogError::validation(
                            &path,
                            format!("duplicate slug '{}'", record.slug),
                        );
                        warn!(path = %path.display(), "skipping record: {}", err);
                        store.rejected.push(err);
                        continue;
                    }
                    debug!(slug = %record.slug, "loaded record");
                    store.paths.insert(record.slug.clone(), path);
                    store.records.push(record);
                }
                Err(err) => {
                    warn!(path = %path.display(), "skipping record: {}", err);
                    store.rejected.push(err);
                }
            }
        }

        store.sort();
        Ok(store)
    }

    /// Build a store from already-validated records with no backing files.
    pub fn from_records(records: Vec<ProjectRecord>) -> Self {
        let mut store = RecordStore {
            records,
            ..Default::default()
        };
        store.sort();
        store
    }

    fn sort(&mut self) {
        self.records
            .sort_by(|a, b| compare_names(&a.name, &b.name).then_with(|| a.slug.cmp(&b.slug)));
    }

    pub fn records(&self) -> &[ProjectRecord] {
        &self.records
    }

    /// Records paired with their storage paths, in name order.
    pub fn entries(&self) -> impl Iterator<Item = (&ProjectRecord, Option<&Path>)> + '_ {
        self.records.iter().map(|r| (r, self.path_of(&r.slug)))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get_by_slug(&self, slug: &str) -> Result<&ProjectRecord> {
        self.records
            .iter()
            .find(|r| r.slug == slug)
            .ok_or_else(|| CatalogError::NotFound(slug.to_string()))
    }

    /// Storage path of a loaded record.
    pub fn path_of(&self, slug: &str) -> Option<&Path> {
        self.paths.get(slug).map(PathBuf::as_path)
    }

    /// Records excluded during the last load.
    pub fn rejected(&self) -> &[CatalogError] {
        &self.rejected
    }

    pub fn search_index(&self) -> Vec<SearchIndexEntry> {
        build_search_index(&self.records)
    }
}

fn toml_matcher() -> anyhow::Result<GlobMatcher> {
    Ok(Glob::new("*.toml")?.compile_matcher())
}

/// Parse and validate one record file.
pub fn parse_record_file(path: &Path) -> Result<ProjectRecord> {
    let content = std::fs::read_to_string(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    parse_record(&content, &stem).map_err(|reason| CatalogError::validation(path, reason))
}

/// Parse record text and check it against the schema rules.
///
/// `expected_slug` is the storage key (file stem) the slug must equal.
pub fn parse_record(
    content: &str,
    expected_slug: &str,
) -> std::result::Result<ProjectRecord, String> {
    let raw: RawRecord = toml::from_str(content).map_err(|e| e.message().to_string())?;

    validate_slug(&raw.slug)?;
    if raw.slug != expected_slug {
        return Err(format!(
            "slug '{}' does not match file name '{}'",
            raw.slug, expected_slug
        ));
    }

    for (field, value) in [
        ("name", &raw.name),
        ("short_desc", &raw.short_desc),
        ("license", &raw.license),
        ("location_city", &raw.location_city),
        ("location_indian_state", &raw.location_indian_state),
    ] {
        if value.trim().is_empty() {
            return Err(format!("{} must not be empty", field));
        }
    }

    if RepoRef::parse(&raw.repo).is_none() {
        return Err(format!("repo '{}' is not a GitHub repository URL", raw.repo));
    }

    if let Some(ref site) = raw.website {
        if !(site.starts_with("https://") || site.starts_with("http://")) {
            return Err(format!("website '{}' is not an http(s) URL", site));
        }
    }

    let mut seen = HashSet::new();
    for tag in &raw.tags {
        if tag.trim().is_empty() {
            return Err("tags must not contain empty strings".to_string());
        }
        if *tag != tag.to_lowercase() {
            return Err(format!("tag '{}' must be lowercase", tag));
        }
        if !seen.insert(tag.as_str()) {
            return Err(format!("duplicate tag '{}'", tag));
        }
    }

    let added_at = parse_added_at(&raw.added_at)?;

    let primary_lang = raw.primary_lang.filter(|l| !l.trim().is_empty());

    Ok(ProjectRecord {
        slug: raw.slug,
        name: raw.name,
        short_desc: raw.short_desc,
        repo: raw.repo,
        website: raw.website,
        primary_lang,
        license: raw.license,
        tags: raw.tags,
        stars: raw.stars,
        good_first_issues: raw.good_first_issues,
        verified: raw.verified,
        looking_for_contributors: raw.looking_for_contributors,
        location_city: raw.location_city,
        location_indian_state: raw.location_indian_state,
        added_at,
    })
}

fn validate_slug(slug: &str) -> std::result::Result<(), String> {
    if slug.is_empty() {
        return Err("slug must not be empty".to_string());
    }
    if !slug
        .bytes()
        .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
    {
        return Err(format!(
            "slug '{}' may only contain lowercase letters, digits, and '-'",
            slug
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(format!("slug '{}' must not start or end with '-'", slug));
    }
    Ok(())
}

/// Accepts TOML datetimes and dates, or strings in RFC 3339 / `YYYY-MM-DD`.
fn parse_added_at(value: &toml::Value) -> std::result::Result<DateTime<Utc>, String> {
    let text = match value {
        toml::Value::Datetime(dt) => dt.to_string(),
        toml::Value::String(s) => s.clone(),
        other => return Err(format!("added_at must be a date, got {}", other.type_str())),
    };
    parse_timestamp(&text).ok_or_else(|| format!("added_at '{}' is not a valid date", text))
}

fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;

    fn record_toml(slug: &str, name: &str) -> String {
        format!(
            r#"slug = "{slug}"
name = "{name}"
short_desc = "A project called {name}"
repo = "https://github.com/example/{slug}"
license = "MIT"
tags = ["cli", "rust"]
stars = 10
good_first_issues = 0
verified = false
looking_for_contributors = true
location_city = "Chennai"
location_indian_state = "Tamil Nadu"
added_at = "2024-05-01"
"#
        )
    }

    #[test]
    fn test_parse_valid_record() {
        let rec = parse_record(&record_toml("alpha", "Alpha"), "alpha").unwrap();
        assert_eq!(rec.slug, "alpha");
        assert_eq!(rec.tags, vec!["cli", "rust"]);
        assert!(rec.looking_for_contributors);
        assert_eq!(rec.added_at, Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        assert_eq!(rec.primary_lang, None);
    }

    #[test]
    fn test_native_toml_datetime_accepted() {
        let text = record_toml("alpha", "Alpha")
            .replace("added_at = \"2024-05-01\"", "added_at = 2024-05-01T10:30:00Z");
        let rec = parse_record(&text, "alpha").unwrap();
        assert_eq!(rec.added_at, Utc.with_ymd_and_hms(2024, 5, 1, 10, 30, 0).unwrap());

        let text = record_toml("alpha", "Alpha")
            .replace("added_at = \"2024-05-01\"", "added_at = 2024-05-01");
        assert!(parse_record(&text, "alpha").is_ok());
    }

    #[test]
    fn test_slug_must_match_file_stem() {
        let err = parse_record(&record_toml("alpha", "Alpha"), "beta").unwrap_err();
        assert!(err.contains("does not match"));
    }

    #[test]
    fn test_rejects_schema_violations() {
        let base = record_toml("alpha", "Alpha");
        let cases = [
            base.replace("stars = 10", "stars = -3"),
            base.replace("tags = [\"cli\", \"rust\"]", "tags = [\"CLI\"]"),
            base.replace("tags = [\"cli\", \"rust\"]", "tags = [\"cli\", \"cli\"]"),
            base.replace("https://github.com/example/alpha", "ftp://example.org/alpha"),
            base.replace("name = \"Alpha\"", "name = \"  \""),
            base.replace("added_at = \"2024-05-01\"", "added_at = \"yesterday\""),
            base.replace("license = \"MIT\"\n", ""),
        ];
        for text in cases {
            assert!(parse_record(&text, "alpha").is_err(), "accepted:\n{}", text);
        }
    }

    #[test]
    fn test_slug_charset() {
        assert!(validate_slug("good-slug-2").is_ok());
        assert!(validate_slug("Bad").is_err());
        assert!(validate_slug("-edge").is_err());
        assert!(validate_slug("under_score").is_err());
        assert!(validate_slug("").is_err());
    }

    #[test]
    fn test_load_isolates_bad_records() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("alpha.toml"), record_toml("alpha", "Alpha")).unwrap();
        fs::write(tmp.path().join("beta.toml"), record_toml("beta", "Beta")).unwrap();
        fs::write(tmp.path().join("broken.toml"), "slug = \"broken\"\nname = ").unwrap();
        fs::write(tmp.path().join("notes.md"), "not a record").unwrap();

        let store = RecordStore::load_all(tmp.path()).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.rejected().len(), 1);
        assert!(matches!(store.rejected()[0], CatalogError::Validation { .. }));
        assert_eq!(store.get_by_slug("alpha").unwrap().name, "Alpha");
        assert_eq!(
            store.path_of("beta").unwrap(),
            tmp.path().join("beta.toml").as_path()
        );
        assert!(store.entries().all(|(_, path)| path.is_some()));
    }

    #[test]
    fn test_records_in_name_order() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("zeta.toml"), record_toml("zeta", "aardvark")).unwrap();
        fs::write(tmp.path().join("alpha.toml"), record_toml("alpha", "Zulu")).unwrap();
        let store = RecordStore::load_all(tmp.path()).unwrap();
        let slugs: Vec<&str> = store.records().iter().map(|r| r.slug.as_str()).collect();
        assert_eq!(slugs, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_get_by_slug_not_found() {
        let store = RecordStore::from_records(Vec::new());
        assert!(matches!(
            store.get_by_slug("ghost"),
            Err(CatalogError::NotFound(ref s)) if s == "ghost"
        ));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(RecordStore::load_all(&tmp.path().join("missing")).is_err());
    }
}
