//! Enrichment pipeline.
//!
//! Walks the catalog one record at a time, pulls metadata from a
//! [`MetadataSource`], writes the enrichment-owned fields back into the
//! record file, and overwrites the record's cache artifact. Records are
//! processed sequentially with a fixed pause between them.
//!
//! Failure is contained per record and per step: a failed repository
//! lookup skips the record, any other failed call falls back to a neutral
//! value (0, `false`, empty list, `git clone`).

use anyhow::Context;
use chrono::Utc;
use fossradar_core::models::{
    Contributor, Documentation, EnrichmentCache, InstallKind, Installation, ProjectRecord,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::EnrichConfig;
use crate::error::Result;
use crate::github::{ContentEntry, ContributorEntry, EntryKind, MetadataSource, RepoRef};
use crate::record_file::{apply_update, RecordUpdate};
use crate::store::RecordStore;

const PYTHON_MARKERS: &[&str] = &["setup.py", "pyproject.toml", "requirements.txt"];

/// Outcome of a batch run.
#[derive(Debug, Default)]
pub struct EnrichReport {
    pub enriched: Vec<String>,
    /// Records whose repository metadata could not be fetched.
    pub skipped: Vec<(String, String)>,
    /// Records that were fetched but could not be written.
    pub failed: Vec<(String, String)>,
}

impl EnrichReport {
    pub fn total(&self) -> usize {
        self.enriched.len() + self.skipped.len() + self.failed.len()
    }
}

enum RecordOutcome {
    Enriched,
    Skipped(String),
}

pub struct Enricher {
    source: Box<dyn MetadataSource>,
    config: EnrichConfig,
    cache_dir: PathBuf,
    dry_run: bool,
}

impl Enricher {
    pub fn new(source: Box<dyn MetadataSource>, config: &EnrichConfig, cache_dir: &Path) -> Self {
        Self {
            source,
            config: config.clone(),
            cache_dir: cache_dir.to_path_buf(),
            dry_run: false,
        }
    }

    /// Fetch everything but write nothing.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Enrich every record in the store, or only `only` when given.
    pub async fn enrich_all(
        &self,
        store: &RecordStore,
        only: Option<&str>,
    ) -> Result<EnrichReport> {
        let records: Vec<(&ProjectRecord, Option<&Path>)> = match only {
            Some(slug) => vec![(store.get_by_slug(slug)?, store.path_of(slug))],
            None => store.entries().collect(),
        };

        info!(count = records.len(), dry_run = self.dry_run, "starting enrichment");
        let mut report = EnrichReport::default();

        for (i, (record, path)) in records.into_iter().enumerate() {
            if i > 0 && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }

            match self.enrich_one(record, path).await {
                Ok(RecordOutcome::Enriched) => report.enriched.push(record.slug.clone()),
                Ok(RecordOutcome::Skipped(reason)) => {
                    warn!(slug = %record.slug, "skipping record: {}", reason);
                    report.skipped.push((record.slug.clone(), reason));
                }
                Err(e) => {
                    warn!(slug = %record.slug, "enrichment failed: {:#}", e);
                    report.failed.push((record.slug.clone(), format!("{:#}", e)));
                }
            }
        }

        info!(
            enriched = report.enriched.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "enrichment finished"
        );
        Ok(report)
    }

    async fn enrich_one(
        &self,
        record: &ProjectRecord,
        path: Option<&Path>,
    ) -> anyhow::Result<RecordOutcome> {
        let Some(repo) = RepoRef::parse(&record.repo) else {
            return Ok(RecordOutcome::Skipped(format!(
                "repo '{}' is not a GitHub repository URL",
                record.repo
            )));
        };
        let source = self.source.as_ref();

        let meta = match source.repo_metadata(&repo).await {
            Ok(meta) => meta,
            Err(e) => return Ok(RecordOutcome::Skipped(e.to_string())),
        };

        let good_first_issues = fallback(
            source
                .good_first_issues(&repo, self.config.good_first_issue_page_size)
                .await,
            &record.slug,
            0,
        );

        let topic_ok = fallback(source.topics(&repo).await, &record.slug, Vec::new())
            .iter()
            .any(|t| has_verification_topic(t, &self.config.verification_topic));
        let badge_ok = fallback(source.readme(&repo).await, &record.slug, None)
            .is_some_and(|text| has_verification_badge(&text, &self.config.badge_marker));
        let verified = topic_ok && badge_ok;

        let contributors = usable_contributors(fallback(
            source
                .contributors(&repo, self.config.contributors_limit)
                .await,
            &record.slug,
            Vec::new(),
        ));

        let repo_url = record.repo.trim_end_matches('/');
        let listing = match source.root_entries(&repo).await {
            Ok(entries) => Some(entries),
            Err(e) => {
                warn!(slug = %record.slug, "{}", e);
                None
            }
        };
        let installation = detect_installation(source, &repo, repo_url, listing.as_deref()).await;
        let documentation = listing
            .as_deref()
            .map(|entries| detect_documentation(entries, repo_url, &meta.default_branch))
            .unwrap_or_default();

        let stats = if self.config.extended_stats {
            let mut stats = meta.stats.clone();
            stats.languages = fallback(
                source.languages(&repo).await,
                &record.slug,
                Default::default(),
            );
            Some(stats)
        } else {
            None
        };

        let update = RecordUpdate {
            stars: meta.stars,
            good_first_issues,
            verified,
            primary_lang: if record.primary_lang.is_none() {
                meta.language.clone()
            } else {
                None
            },
        };

        let cache = EnrichmentCache {
            slug: record.slug.clone(),
            contributors,
            installation: Some(installation),
            documentation,
            stats,
            updated_at: Utc::now(),
        };

        info!(
            slug = %record.slug,
            stars = update.stars,
            good_first_issues = update.good_first_issues,
            verified = update.verified,
            "enriched"
        );

        if self.dry_run {
            return Ok(RecordOutcome::Enriched);
        }

        match path {
            Some(path) => write_record(path, &update)?,
            None => anyhow::bail!("record '{}' has no backing file", record.slug),
        }
        write_cache(&self.cache_dir, &cache)?;

        Ok(RecordOutcome::Enriched)
    }
}

/// Log a failed step and substitute its neutral value.
fn fallback<T>(result: Result<T>, slug: &str, default: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            warn!(slug = %slug, "{}", e);
            default
        }
    }
}

fn write_record(path: &Path, update: &RecordUpdate) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read record: {}", path.display()))?;
    let updated = apply_update(&content, update);
    if updated == content {
        debug!(path = %path.display(), "record unchanged");
        return Ok(());
    }
    std::fs::write(path, updated)
        .with_context(|| format!("Failed to write record: {}", path.display()))
}

/// Overwrite `<cache_dir>/<slug>.json`.
pub fn write_cache(cache_dir: &Path, cache: &EnrichmentCache) -> anyhow::Result<()> {
    std::fs::create_dir_all(cache_dir)
        .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
    let path = cache_path(cache_dir, &cache.slug);
    let mut json = serde_json::to_string_pretty(cache)?;
    json.push('\n');
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write cache artifact: {}", path.display()))
}

/// Read a record's cache artifact if one exists.
pub fn read_cache(cache_dir: &Path, slug: &str) -> Option<EnrichmentCache> {
    let path = cache_path(cache_dir, slug);
    let content = std::fs::read_to_string(&path).ok()?;
    match serde_json::from_str(&content) {
        Ok(cache) => Some(cache),
        Err(e) => {
            warn!(path = %path.display(), "ignoring unreadable cache artifact: {}", e);
            None
        }
    }
}

fn cache_path(cache_dir: &Path, slug: &str) -> PathBuf {
    cache_dir.join(format!("{}.json", slug))
}

pub fn has_verification_topic(topic: &str, expected: &str) -> bool {
    topic.eq_ignore_ascii_case(expected)
}

pub fn has_verification_badge(readme: &str, marker: &str) -> bool {
    readme.to_lowercase().contains(&marker.to_lowercase())
}

/// Keep contributors that can be rendered: both avatar and profile link.
pub fn usable_contributors(entries: Vec<ContributorEntry>) -> Vec<Contributor> {
    entries
        .into_iter()
        .filter_map(|c| {
            let avatar_url = c.avatar_url.filter(|u| !u.is_empty())?;
            let html_url = c.html_url.filter(|u| !u.is_empty())?;
            Some(Contributor {
                login: c
                    .login
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| "anonymous".to_string()),
                avatar_url,
                html_url,
                contributions: c.contributions,
            })
        })
        .collect()
}

/// Pick an installation command from the root listing, in priority order
/// npm, pip, cargo, go, git.
pub async fn detect_installation(
    source: &dyn MetadataSource,
    repo: &RepoRef,
    repo_url: &str,
    listing: Option<&[ContentEntry]>,
) -> Installation {
    let git_clone = Installation {
        kind: InstallKind::Git,
        command: format!("git clone {}", repo_url),
    };
    let Some(listing) = listing else {
        return git_clone;
    };
    let has_file = |name: &str| {
        listing
            .iter()
            .any(|e| e.kind == EntryKind::File && e.name == name)
    };

    if has_file("package.json") {
        match source.file_text(repo, "package.json").await {
            Ok(text) => {
                if let Some(name) = package_name(&text) {
                    return Installation {
                        kind: InstallKind::Npm,
                        command: format!("npm install {}", name),
                    };
                }
            }
            Err(e) => debug!(repo = %repo, "package.json unavailable: {}", e),
        }
    }

    if PYTHON_MARKERS.iter().any(|m| has_file(m)) {
        return Installation {
            kind: InstallKind::Pip,
            command: format!("pip install {}", repo.name),
        };
    }

    if has_file("Cargo.toml") {
        return Installation {
            kind: InstallKind::Cargo,
            command: format!("cargo install {}", repo.name),
        };
    }

    if has_file("go.mod") {
        return Installation {
            kind: InstallKind::Go,
            command: format!("go install github.com/{}/{}@latest", repo.owner, repo.name),
        };
    }

    git_clone
}

fn package_name(manifest: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(manifest).ok()?;
    value
        .get("name")?
        .as_str()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
}

pub fn detect_documentation(
    listing: &[ContentEntry],
    repo_url: &str,
    branch: &str,
) -> Documentation {
    let branch = if branch.is_empty() { "main" } else { branch };

    let docs_url = listing
        .iter()
        .find(|e| {
            e.kind == EntryKind::Dir
                && (e.name.eq_ignore_ascii_case("docs")
                    || e.name.eq_ignore_ascii_case("documentation"))
        })
        .map(|e| format!("{}/tree/{}/{}", repo_url, branch, e.name));

    let changelog_url = listing
        .iter()
        .find(|e| e.kind == EntryKind::File && e.name.to_lowercase().starts_with("changelog"))
        .map(|e| format!("{}/blob/{}/{}", repo_url, branch, e.name));

    Documentation {
        docs_url,
        changelog_url,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CatalogError;
    use crate::github::RepoMetadata;
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    /// Serves a fixed listing and package manifest; every other call fails.
    struct ListingSource {
        manifest: Option<String>,
    }

    #[async_trait]
    impl MetadataSource for ListingSource {
        async fn repo_metadata(&self, _: &RepoRef) -> Result<RepoMetadata> {
            Err(CatalogError::fetch("repository", "unused"))
        }
        async fn good_first_issues(&self, _: &RepoRef, _: usize) -> Result<u64> {
            Err(CatalogError::fetch("issues", "unused"))
        }
        async fn topics(&self, _: &RepoRef) -> Result<Vec<String>> {
            Err(CatalogError::fetch("topics", "unused"))
        }
        async fn readme(&self, _: &RepoRef) -> Result<Option<String>> {
            Err(CatalogError::fetch("readme", "unused"))
        }
        async fn contributors(&self, _: &RepoRef, _: usize) -> Result<Vec<ContributorEntry>> {
            Err(CatalogError::fetch("contributors", "unused"))
        }
        async fn root_entries(&self, _: &RepoRef) -> Result<Vec<ContentEntry>> {
            Err(CatalogError::fetch("root listing", "unused"))
        }
        async fn file_text(&self, _: &RepoRef, path: &str) -> Result<String> {
            match (&self.manifest, path) {
                (Some(text), "package.json") => Ok(text.clone()),
                _ => Err(CatalogError::fetch(path, "HTTP 404 Not Found")),
            }
        }
        async fn languages(&self, _: &RepoRef) -> Result<BTreeMap<String, u64>> {
            Ok(BTreeMap::new())
        }
    }

    fn repo() -> RepoRef {
        RepoRef::parse("https://github.com/acme/widget").unwrap()
    }

    const URL: &str = "https://github.com/acme/widget";

    async fn install_for(files: &[&str], manifest: Option<&str>) -> Installation {
        let source = ListingSource {
            manifest: manifest.map(str::to_string),
        };
        let listing: Vec<ContentEntry> = files.iter().map(|f| ContentEntry::file(f)).collect();
        detect_installation(&source, &repo(), URL, Some(&listing)).await
    }

    #[tokio::test]
    async fn test_npm_wins_when_package_has_name() {
        let inst = install_for(
            &["Cargo.toml", "package.json", "setup.py"],
            Some(r#"{"name": "@acme/widget", "version": "1.0.0"}"#),
        )
        .await;
        assert_eq!(inst.kind, InstallKind::Npm);
        assert_eq!(inst.command, "npm install @acme/widget");
    }

    #[tokio::test]
    async fn test_nameless_package_falls_through() {
        let inst = install_for(&["package.json", "Cargo.toml"], Some("{}")).await;
        assert_eq!(inst.kind, InstallKind::Cargo);
        assert_eq!(inst.command, "cargo install widget");

        // Unreadable manifest behaves the same way.
        let inst = install_for(&["package.json", "requirements.txt"], None).await;
        assert_eq!(inst.kind, InstallKind::Pip);
        assert_eq!(inst.command, "pip install widget");
    }

    #[tokio::test]
    async fn test_python_beats_cargo_and_go() {
        let inst = install_for(&["go.mod", "Cargo.toml", "pyproject.toml"], None).await;
        assert_eq!(inst.kind, InstallKind::Pip);
    }

    #[tokio::test]
    async fn test_go_module() {
        let inst = install_for(&["go.mod", "README.md"], None).await;
        assert_eq!(inst.kind, InstallKind::Go);
        assert_eq!(inst.command, "go install github.com/acme/widget@latest");
    }

    #[tokio::test]
    async fn test_git_clone_fallbacks() {
        let inst = install_for(&["README.md"], None).await;
        assert_eq!(inst.kind, InstallKind::Git);
        assert_eq!(inst.command, "git clone https://github.com/acme/widget");

        let source = ListingSource { manifest: None };
        let inst = detect_installation(&source, &repo(), URL, None).await;
        assert_eq!(inst.kind, InstallKind::Git);
    }

    #[tokio::test]
    async fn test_directory_named_like_manifest_ignored() {
        let source = ListingSource { manifest: None };
        let listing = vec![ContentEntry::dir("Cargo.toml")];
        let inst = detect_installation(&source, &repo(), URL, Some(&listing)).await;
        assert_eq!(inst.kind, InstallKind::Git);
    }

    #[test]
    fn test_documentation_links() {
        let listing = vec![
            ContentEntry::dir("Docs"),
            ContentEntry::file("CHANGELOG.md"),
            ContentEntry::file("README.md"),
        ];
        let docs = detect_documentation(&listing, URL, "develop");
        assert_eq!(
            docs.docs_url.as_deref(),
            Some("https://github.com/acme/widget/tree/develop/Docs")
        );
        assert_eq!(
            docs.changelog_url.as_deref(),
            Some("https://github.com/acme/widget/blob/develop/CHANGELOG.md")
        );
    }

    #[test]
    fn test_documentation_needs_right_entry_kind() {
        let listing = vec![ContentEntry::file("docs"), ContentEntry::dir("changelog")];
        assert!(detect_documentation(&listing, URL, "main").is_empty());

        let listing = vec![ContentEntry::dir("documentation")];
        let docs = detect_documentation(&listing, URL, "");
        assert_eq!(
            docs.docs_url.as_deref(),
            Some("https://github.com/acme/widget/tree/main/documentation")
        );
    }

    #[test]
    fn test_verification_signals() {
        assert!(has_verification_topic("FossRadar", "fossradar"));
        assert!(!has_verification_topic("fossradar-in", "fossradar"));

        let marker = "img.shields.io/badge/fossradar.in-Verified";
        assert!(has_verification_badge(
            "[![FOSSRadar](https://IMG.SHIELDS.IO/badge/FOSSRadar.in-verified-green)](https://fossradar.in)",
            marker
        ));
        assert!(!has_verification_badge("no badge here", marker));
    }

    #[test]
    fn test_contributors_without_links_dropped() {
        let entries = vec![
            ContributorEntry {
                login: Some("octo".into()),
                avatar_url: Some("https://avatars/octo".into()),
                html_url: Some("https://github.com/octo".into()),
                contributions: 40,
            },
            ContributorEntry {
                login: Some("ghost".into()),
                avatar_url: None,
                html_url: Some("https://github.com/ghost".into()),
                contributions: 3,
            },
            ContributorEntry {
                login: None,
                avatar_url: Some("https://avatars/anon".into()),
                html_url: Some("https://github.com/anon".into()),
                contributions: 1,
            },
        ];
        let kept = usable_contributors(entries);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].login, "octo");
        assert_eq!(kept[1].login, "anonymous");
    }

    #[test]
    fn test_cache_artifact_overwritten() {
        let tmp = tempfile::TempDir::new().unwrap();
        let dir = tmp.path().join("cache");
        let mut cache = EnrichmentCache {
            slug: "widget".into(),
            contributors: Vec::new(),
            installation: None,
            documentation: Documentation::default(),
            stats: None,
            updated_at: Utc::now(),
        };
        write_cache(&dir, &cache).unwrap();
        cache.installation = Some(Installation {
            kind: InstallKind::Git,
            command: "git clone x".into(),
        });
        write_cache(&dir, &cache).unwrap();

        let back = read_cache(&dir, "widget").unwrap();
        assert_eq!(back, cache);
        assert!(read_cache(&dir, "missing").is_none());
    }
}
