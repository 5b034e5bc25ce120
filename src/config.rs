//! TOML configuration and environment secrets.
//!
//! ```toml
//! [catalog]
//! records_dir = "data/projects"
//! index_path = "public/index.json"
//! cache_dir = "public/cache"
//!
//! [search]
//! fuzzy_threshold = 0.3
//!
//! [enrich]
//! api_base_url = "https://api.github.com"
//! delay_ms = 1000
//!
//! [webhook]
//! watched_paths = ["data/projects/**", "public/index.json"]
//!
//! [server]
//! bind = "127.0.0.1:7340"
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.
//! Credentials are never read from the file: see [`Secrets`].

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::CatalogError;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub enrich: EnrichConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    /// Directory holding one `<slug>.toml` file per project.
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,
    /// Where the search index artifact is written.
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,
    /// Directory for per-record enrichment cache artifacts.
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            records_dir: default_records_dir(),
            index_path: default_index_path(),
            cache_dir: default_cache_dir(),
        }
    }
}

fn default_records_dir() -> PathBuf {
    PathBuf::from("data/projects")
}
fn default_index_path() -> PathBuf {
    PathBuf::from("public/index.json")
}
fn default_cache_dir() -> PathBuf {
    PathBuf::from("public/cache")
}

#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,
    #[serde(default = "default_similar_limit")]
    pub similar_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: default_fuzzy_threshold(),
            similar_limit: default_similar_limit(),
        }
    }
}

fn default_fuzzy_threshold() -> f64 {
    fossradar_core::search::DEFAULT_FUZZY_THRESHOLD
}
fn default_similar_limit() -> usize {
    fossradar_core::similar::DEFAULT_SIMILAR_LIMIT
}

impl SearchConfig {
    pub fn params(&self) -> fossradar_core::search::SearchParams {
        fossradar_core::search::SearchParams {
            fuzzy_threshold: self.fuzzy_threshold,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnrichConfig {
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Pause between records, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
    #[serde(default = "default_contributors_limit")]
    pub contributors_limit: usize,
    /// Page size of the good-first-issue fetch. The stored count is the
    /// length of that single page, so it never exceeds this value.
    #[serde(default = "default_good_first_issue_page_size")]
    pub good_first_issue_page_size: usize,
    #[serde(default = "default_verification_topic")]
    pub verification_topic: String,
    #[serde(default = "default_badge_marker")]
    pub badge_marker: String,
    /// Also record forks, watchers, language bytes and friends.
    #[serde(default = "default_true")]
    pub extended_stats: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            delay_ms: default_delay_ms(),
            contributors_limit: default_contributors_limit(),
            good_first_issue_page_size: default_good_first_issue_page_size(),
            verification_topic: default_verification_topic(),
            badge_marker: default_badge_marker(),
            extended_stats: true,
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}
fn default_delay_ms() -> u64 {
    1000
}
fn default_contributors_limit() -> usize {
    10
}
fn default_good_first_issue_page_size() -> usize {
    1
}
fn default_verification_topic() -> String {
    "fossradar".to_string()
}
fn default_badge_marker() -> String {
    "img.shields.io/badge/fossradar.in-Verified".to_string()
}
fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    format!("fossradar-enrich/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Globs over repository-relative paths whose change invalidates the
    /// `projects` cache partition.
    #[serde(default = "default_watched_paths")]
    pub watched_paths: Vec<String>,
    /// Overrides the payload's `repository.default_branch` when set.
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            watched_paths: default_watched_paths(),
            default_branch: None,
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_watched_paths() -> Vec<String> {
    vec!["data/projects/**".to_string(), "public/index.json".to_string()]
}
fn default_max_body_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7340".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    if !(0.0..=1.0).contains(&config.search.fuzzy_threshold) {
        anyhow::bail!("search.fuzzy_threshold must be in [0.0, 1.0]");
    }

    if config.enrich.contributors_limit == 0 || config.enrich.contributors_limit > 100 {
        anyhow::bail!("enrich.contributors_limit must be in 1..=100");
    }

    if config.enrich.good_first_issue_page_size == 0
        || config.enrich.good_first_issue_page_size > 100
    {
        anyhow::bail!("enrich.good_first_issue_page_size must be in 1..=100");
    }

    if config.enrich.verification_topic.trim().is_empty() {
        anyhow::bail!("enrich.verification_topic must not be empty");
    }

    if config.enrich.badge_marker.trim().is_empty() {
        anyhow::bail!("enrich.badge_marker must not be empty");
    }

    if config.webhook.watched_paths.is_empty() {
        anyhow::bail!("webhook.watched_paths must list at least one glob");
    }

    Ok(config)
}

/// Environment-sourced credentials, read once and handed to components.
#[derive(Clone, Default)]
pub struct Secrets {
    pub github_token: Option<String>,
    pub webhook_secret: Option<String>,
}

impl Secrets {
    /// Read `GITHUB_TOKEN` and `WEBHOOK_SECRET`. Empty values count as unset.
    pub fn from_env() -> Self {
        Self {
            github_token: non_empty_env("GITHUB_TOKEN"),
            webhook_secret: non_empty_env("WEBHOOK_SECRET"),
        }
    }

    /// The API token, or a configuration error naming the variable.
    pub fn require_github_token(&self) -> std::result::Result<&str, CatalogError> {
        self.github_token.as_deref().ok_or_else(|| {
            CatalogError::Configuration("GITHUB_TOKEN environment variable is required".to_string())
        })
    }
}

impl std::fmt::Debug for Secrets {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Secrets")
            .field("github_token", &self.github_token.as_ref().map(|_| "<redacted>"))
            .field("webhook_secret", &self.webhook_secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> PathBuf {
        let path = dir.path().join("fossradar.toml");
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write(&tmp, "")).unwrap();
        assert_eq!(cfg.catalog.records_dir, PathBuf::from("data/projects"));
        assert_eq!(cfg.enrich.delay_ms, 1000);
        assert_eq!(cfg.enrich.good_first_issue_page_size, 1);
        assert_eq!(cfg.search.similar_limit, 4);
        assert!((cfg.search.fuzzy_threshold - 0.3).abs() < 1e-9);
        assert_eq!(cfg.webhook.watched_paths.len(), 2);
    }

    #[test]
    fn test_overrides_are_read() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_config(&write(
            &tmp,
            r#"
[catalog]
records_dir = "/srv/records"

[enrich]
delay_ms = 0
contributors_limit = 5

[webhook]
default_branch = "trunk"
"#,
        ))
        .unwrap();
        assert_eq!(cfg.catalog.records_dir, PathBuf::from("/srv/records"));
        assert_eq!(cfg.enrich.delay_ms, 0);
        assert_eq!(cfg.enrich.contributors_limit, 5);
        assert_eq!(cfg.webhook.default_branch.as_deref(), Some("trunk"));
    }

    #[test]
    fn test_example_config_matches_defaults() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/fossradar.example.toml");
        let cfg = load_config(&path).unwrap();
        let defaults = Config::default();
        assert_eq!(cfg.catalog.records_dir, defaults.catalog.records_dir);
        assert_eq!(cfg.enrich.badge_marker, defaults.enrich.badge_marker);
        assert_eq!(cfg.webhook.watched_paths, defaults.webhook.watched_paths);
        assert_eq!(cfg.webhook.max_body_bytes, defaults.webhook.max_body_bytes);
        assert_eq!(cfg.server.bind, defaults.server.bind);
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = load_config(&write(&tmp, "[search]\nfuzzy_threshold = 1.5\n")).unwrap_err();
        assert!(err.to_string().contains("fuzzy_threshold"));
    }

    #[test]
    fn test_missing_file_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(load_config(&tmp.path().join("nope.toml")).is_err());
    }

    #[test]
    fn test_missing_token_is_configuration_error() {
        let secrets = Secrets::default();
        assert!(matches!(
            secrets.require_github_token(),
            Err(CatalogError::Configuration(_))
        ));
    }

    #[test]
    fn test_secrets_debug_redacts() {
        let secrets = Secrets {
            github_token: Some("ghp_abc".to_string()),
            webhook_secret: None,
        };
        let shown = format!("{:?}", secrets);
        assert!(!shown.contains("ghp_abc"));
    }
}
