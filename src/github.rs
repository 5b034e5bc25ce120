//! GitHub REST API metadata source.
//!
//! The enrichment pipeline talks to the hosting service only through the
//! [`MetadataSource`] trait, so tests can substitute an in-memory source.
//! [`GitHubClient`] is the production implementation.
//!
//! # Endpoints
//!
//! | Method | Endpoint |
//! |--------|----------|
//! | [`repo_metadata`](MetadataSource::repo_metadata) | `GET /repos/{owner}/{repo}` |
//! | [`good_first_issues`](MetadataSource::good_first_issues) | `GET /repos/{owner}/{repo}/issues?labels=good first issue&state=open` |
//! | [`topics`](MetadataSource::topics) | `GET /repos/{owner}/{repo}/topics` |
//! | [`readme`](MetadataSource::readme) | `GET /repos/{owner}/{repo}/readme` |
//! | [`contributors`](MetadataSource::contributors) | `GET /repos/{owner}/{repo}/contributors` |
//! | [`root_entries`](MetadataSource::root_entries) | `GET /repos/{owner}/{repo}/contents` |
//! | [`file_text`](MetadataSource::file_text) | `GET /repos/{owner}/{repo}/contents/{path}` |
//! | [`languages`](MetadataSource::languages) | `GET /repos/{owner}/{repo}/languages` |
//!
//! Rate-limit responses (403/429) are reported like any other failed call;
//! there is no retry or backoff.

use async_trait::async_trait;
use base64::Engine;
use chrono::{DateTime, Utc};
use fossradar_core::models::RepoStats;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::config::EnrichConfig;
use crate::error::{CatalogError, Result};

/// Owner and name of a GitHub repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// Parse `https://github.com/<owner>/<repo>`, tolerating a trailing
    /// slash or `.git` suffix.
    pub fn parse(url: &str) -> Option<Self> {
        let rest = url
            .strip_prefix("https://")
            .or_else(|| url.strip_prefix("http://"))?;
        let rest = rest
            .strip_prefix("github.com/")
            .or_else(|| rest.strip_prefix("www.github.com/"))?;
        let rest = rest.trim_end_matches('/');
        let rest = rest.strip_suffix(".git").unwrap_or(rest);

        let mut parts = rest.split('/');
        let owner = parts.next().filter(|s| !s.is_empty())?;
        let name = parts.next().filter(|s| !s.is_empty())?;
        if parts.next().is_some() {
            return None;
        }
        Some(RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Repository metadata from the main repository endpoint.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepoMetadata {
    pub stars: u64,
    pub language: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub license: Option<String>,
    pub default_branch: String,
    /// Extended statistics; `languages` is left empty here.
    pub stats: RepoStats,
}

/// A contributor as returned by the host; display fields may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ContributorEntry {
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub contributions: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Dir,
    Other,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentEntry {
    pub name: String,
    pub kind: EntryKind,
}

impl ContentEntry {
    pub fn file(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: EntryKind::Dir,
        }
    }
}

/// Source of external repository metadata.
#[async_trait]
pub trait MetadataSource: Send + Sync {
    async fn repo_metadata(&self, repo: &RepoRef) -> Result<RepoMetadata>;

    /// Length of one page of open issues labelled "good first issue".
    async fn good_first_issues(&self, repo: &RepoRef, per_page: usize) -> Result<u64>;

    async fn topics(&self, repo: &RepoRef) -> Result<Vec<String>>;

    /// Decoded README text, or `None` when the repository has none.
    async fn readme(&self, repo: &RepoRef) -> Result<Option<String>>;

    /// Top contributors by contribution count.
    async fn contributors(&self, repo: &RepoRef, limit: usize) -> Result<Vec<ContributorEntry>>;

    /// Entries of the repository's root directory.
    async fn root_entries(&self, repo: &RepoRef) -> Result<Vec<ContentEntry>>;

    /// Decoded text of a file in the repository.
    async fn file_text(&self, repo: &RepoRef, path: &str) -> Result<String>;

    /// Bytes of code per language.
    async fn languages(&self, repo: &RepoRef) -> Result<BTreeMap<String, u64>>;
}

// ============ Wire types ============

#[derive(Debug, Deserialize)]
struct GhRepo {
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    language: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    license: Option<GhLicense>,
    #[serde(default)]
    default_branch: String,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    watchers_count: u64,
    #[serde(default)]
    subscribers_count: u64,
    #[serde(default)]
    open_issues_count: u64,
    #[serde(default)]
    size: u64,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pushed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    has_issues: bool,
    #[serde(default)]
    has_wiki: bool,
    #[serde(default)]
    has_pages: bool,
    #[serde(default)]
    has_discussions: bool,
}

#[derive(Debug, Deserialize)]
struct GhLicense {
    #[serde(default)]
    spdx_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GhTopics {
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GhFile {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: String,
}

#[derive(Debug, Deserialize)]
struct GhEntry {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

impl From<GhRepo> for RepoMetadata {
    fn from(r: GhRepo) -> Self {
        let default_branch = if r.default_branch.is_empty() {
            "main".to_string()
        } else {
            r.default_branch
        };
        RepoMetadata {
            stars: r.stargazers_count,
            language: r.language.filter(|l| !l.is_empty()),
            description: r.description,
            homepage: r.homepage.filter(|h| !h.is_empty()),
            license: r
                .license
                .and_then(|l| l.spdx_id)
                .filter(|id| id != "NOASSERTION"),
            default_branch: default_branch.clone(),
            stats: RepoStats {
                forks: r.forks_count,
                watchers: r.watchers_count,
                subscribers: r.subscribers_count,
                open_issues: r.open_issues_count,
                size_kb: r.size,
                created_at: r.created_at,
                updated_at: r.updated_at,
                pushed_at: r.pushed_at,
                default_branch,
                archived: r.archived,
                has_issues: r.has_issues,
                has_wiki: r.has_wiki,
                has_pages: r.has_pages,
                has_discussions: r.has_discussions,
                languages: BTreeMap::new(),
            },
        }
    }
}

/// Decode a contents-API file body. GitHub wraps base64 at 60 columns.
fn decode_file(file: GhFile) -> std::result::Result<String, String> {
    if file.encoding != "base64" {
        return Err(format!("unsupported encoding '{}'", file.encoding));
    }
    let compact: String = file.content.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|e| e.to_string())?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

// ============ Client ============

/// Authenticated GitHub REST client.
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitHubClient {
    pub fn new(config: &EnrichConfig, token: &str) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            http,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn url(&self, repo: &RepoRef, suffix: &str) -> String {
        if suffix.is_empty() {
            format!("{}/repos/{}/{}", self.base_url, repo.owner, repo.name)
        } else {
            format!("{}/repos/{}/{}/{}", self.base_url, repo.owner, repo.name, suffix)
        }
    }

    /// An authenticated GET carrying the API media type and version.
    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.http
            .get(url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
    }

    /// GET a JSON resource; `Ok(None)` on 404.
    async fn get_optional<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<Option<T>> {
        let resp = self
            .request(url)
            .query(query)
            .send()
            .await
            .map_err(|e| CatalogError::fetch(what, e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(CatalogError::fetch(what, format!("HTTP {}: {}", status, snippet)));
        }

        resp.json::<T>()
            .await
            .map(Some)
            .map_err(|e| CatalogError::fetch(what, e))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        what: &str,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.get_optional(what, url, query)
            .await?
            .ok_or_else(|| CatalogError::fetch(what, "HTTP 404 Not Found"))
    }
}

#[async_trait]
impl MetadataSource for GitHubClient {
    async fn repo_metadata(&self, repo: &RepoRef) -> Result<RepoMetadata> {
        let raw: GhRepo = self.get("repository", &self.url(repo, ""), &[]).await?;
        Ok(raw.into())
    }

    async fn good_first_issues(&self, repo: &RepoRef, per_page: usize) -> Result<u64> {
        let issues: Vec<serde_json::Value> = self
            .get(
                "good first issues",
                &self.url(repo, "issues"),
                &[
                    ("labels", "good first issue".to_string()),
                    ("state", "open".to_string()),
                    ("per_page", per_page.to_string()),
                ],
            )
            .await?;
        Ok(issues.len() as u64)
    }

    async fn topics(&self, repo: &RepoRef) -> Result<Vec<String>> {
        let topics: GhTopics = self.get("topics", &self.url(repo, "topics"), &[]).await?;
        Ok(topics.names)
    }

    async fn readme(&self, repo: &RepoRef) -> Result<Option<String>> {
        match self
            .get_optional::<GhFile>("readme", &self.url(repo, "readme"), &[])
            .await?
        {
            Some(file) => decode_file(file)
                .map(Some)
                .map_err(|e| CatalogError::fetch("readme", e)),
            None => Ok(None),
        }
    }

    async fn contributors(&self, repo: &RepoRef, limit: usize) -> Result<Vec<ContributorEntry>> {
        // An empty repository answers 204 with no body; treat it as no contributors.
        let url = self.url(repo, "contributors");
        let resp = self
            .request(&url)
            .query(&[("per_page", limit.to_string())])
            .send()
            .await
            .map_err(|e| CatalogError::fetch("contributors", e))?;
        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(CatalogError::fetch("contributors", format!("HTTP {}", status)));
        }
        let mut list: Vec<ContributorEntry> = resp
            .json()
            .await
            .map_err(|e| CatalogError::fetch("contributors", e))?;
        list.truncate(limit);
        Ok(list)
    }

    async fn root_entries(&self, repo: &RepoRef) -> Result<Vec<ContentEntry>> {
        let entries: Vec<GhEntry> = self
            .get("root listing", &self.url(repo, "contents"), &[])
            .await?;
        Ok(entries
            .into_iter()
            .map(|e| ContentEntry {
                kind: match e.kind.as_str() {
                    "file" => EntryKind::File,
                    "dir" => EntryKind::Dir,
                    _ => EntryKind::Other,
                },
                name: e.name,
            })
            .collect())
    }

    async fn file_text(&self, repo: &RepoRef, path: &str) -> Result<String> {
        let what = format!("file {}", path);
        let file: GhFile = self
            .get(&what, &self.url(repo, &format!("contents/{}", path)), &[])
            .await?;
        decode_file(file).map_err(|e| CatalogError::fetch(what, e))
    }

    async fn languages(&self, repo: &RepoRef) -> Result<BTreeMap<String, u64>> {
        self.get("languages", &self.url(repo, "languages"), &[]).await
    }
}
