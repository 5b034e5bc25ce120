//! Push-webhook cache invalidation gate.
//!
//! Accepts a push notification, authenticates it with an HMAC-SHA256
//! signature over the raw body, and invalidates the `projects` cache
//! partition when the push landed on the default branch and touched a
//! watched path.
//!
//! Order of checks:
//!
//! 1. signature header present, else [`CatalogError::Authentication`]
//! 2. shared secret configured, else [`CatalogError::Configuration`]
//! 3. `sha256=<hex>` matches the body in constant time, else
//!    [`CatalogError::Authentication`]
//! 4. body parses as JSON, else [`CatalogError::WebhookPayload`]
//!
//! Nothing in the body is looked at before step 3 passes.

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use tracing::{debug, info, warn};

use crate::cache::{Invalidator, PROJECTS_PARTITION};
use crate::config::WebhookConfig;
use crate::error::{CatalogError, Result};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
const SIGNATURE_PREFIX: &str = "sha256=";

#[derive(Debug, Deserialize)]
struct PushPayload {
    #[serde(rename = "ref", default)]
    git_ref: Option<String>,
    #[serde(default)]
    repository: Option<PushRepository>,
    #[serde(default)]
    commits: Vec<PushCommit>,
}

#[derive(Debug, Deserialize)]
struct PushRepository {
    #[serde(default)]
    default_branch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PushCommit {
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    removed: Vec<String>,
}

impl PushCommit {
    fn paths(&self) -> impl Iterator<Item = &str> {
        self.added
            .iter()
            .chain(&self.modified)
            .chain(&self.removed)
            .map(String::as_str)
    }
}

/// What an authenticated delivery led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Invalidated,
    /// Push to some other branch, or not a push at all.
    OtherBranch,
    /// Push to the default branch that touched no watched path.
    NoCatalogChanges,
}

pub struct WebhookGate {
    secret: Option<String>,
    watched: GlobSet,
    default_branch: Option<String>,
}

impl WebhookGate {
    pub fn new(config: &WebhookConfig, secret: Option<String>) -> anyhow::Result<Self> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &config.watched_paths {
            let glob = GlobBuilder::new(pattern)
                .literal_separator(true)
                .build()
                .map_err(|e| {
                    anyhow::anyhow!("Invalid webhook.watched_paths glob '{}': {}", pattern, e)
                })?;
            builder.add(glob);
        }
        Ok(Self {
            secret,
            watched: builder.build()?,
            default_branch: config.default_branch.clone(),
        })
    }

    pub fn handle(
        &self,
        body: &[u8],
        signature: Option<&str>,
        invalidator: &dyn Invalidator,
    ) -> Result<WebhookOutcome> {
        let signature = signature
            .ok_or_else(|| CatalogError::Authentication("missing signature".to_string()))?;
        let secret = self.secret.as_deref().ok_or_else(|| {
            CatalogError::Configuration("WEBHOOK_SECRET is not configured".to_string())
        })?;

        verify_signature(secret, body, signature)?;

        let payload: PushPayload = serde_json::from_slice(body)
            .map_err(|e| CatalogError::WebhookPayload(e.to_string()))?;

        let branch = self
            .default_branch
            .clone()
            .or_else(|| payload.repository.as_ref().and_then(|r| r.default_branch.clone()))
            .unwrap_or_else(|| "main".to_string());
        let expected_ref = format!("refs/heads/{}", branch);

        if payload.git_ref.as_deref() != Some(expected_ref.as_str()) {
            debug!(
                git_ref = ?payload.git_ref,
                expected = %expected_ref,
                "ignoring push to other ref"
            );
            return Ok(WebhookOutcome::OtherBranch);
        }

        let touched = payload
            .commits
            .iter()
            .flat_map(PushCommit::paths)
            .find(|path| self.watched.is_match(path));

        match touched {
            Some(path) => {
                info!(path, "catalog changed upstream");
                invalidator.invalidate(PROJECTS_PARTITION);
                Ok(WebhookOutcome::Invalidated)
            }
            None => {
                debug!(commits = payload.commits.len(), "push touched no catalog paths");
                Ok(WebhookOutcome::NoCatalogChanges)
            }
        }
    }
}

/// Check a `sha256=<hex>` signature over `body` in constant time.
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> Result<()> {
    let rejected = || CatalogError::Authentication("invalid signature".to_string());

    let hex_digest = signature.trim().strip_prefix(SIGNATURE_PREFIX).ok_or_else(rejected)?;
    let expected = hex::decode(hex_digest).map_err(|_| rejected())?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CatalogError::Configuration(e.to_string()))?;
    mac.update(body);
    mac.verify_slice(&expected).map_err(|_| {
        warn!("webhook signature mismatch");
        rejected()
    })
}

/// Compute the `sha256=<hex>` signature header value for `body`.
pub fn sign(secret: &str, body: &[u8]) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CatalogError::Configuration(e.to_string()))?;
    mac.update(body);
    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    const SECRET: &str = "s3cret";

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    impl Invalidator for Recorder {
        fn invalidate(&self, partition: &str) {
            self.calls.lock().unwrap().push(partition.to_string());
        }
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn gate(secret: Option<&str>) -> WebhookGate {
        WebhookGate::new(&WebhookConfig::default(), secret.map(str::to_string)).unwrap()
    }

    fn push(git_ref: &str, modified: &[&str]) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "ref": git_ref,
            "repository": { "default_branch": "main" },
            "commits": [
                { "added": [], "modified": ["README.md"], "removed": [] },
                { "added": [], "modified": modified, "removed": [] }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_valid_push_invalidates_once() {
        let body = push("refs/heads/main", &["data/projects/foo.toml", "public/index.json"]);
        let sig = sign(SECRET, &body).unwrap();
        let rec = Recorder::default();

        let outcome = gate(Some(SECRET)).handle(&body, Some(&sig), &rec).unwrap();
        assert_eq!(outcome, WebhookOutcome::Invalidated);
        assert_eq!(rec.calls(), vec!["projects"]);
    }

    #[test]
    fn test_tampered_body_rejected() {
        let body = push("refs/heads/main", &["data/projects/foo.toml"]);
        let sig = sign(SECRET, &body).unwrap();
        let mut tampered = body.clone();
        let last = tampered.len() - 2;
        tampered[last] ^= 0x01;
        let rec = Recorder::default();

        let err = gate(Some(SECRET)).handle(&tampered, Some(&sig), &rec).unwrap_err();
        assert!(matches!(err, CatalogError::Authentication(_)));
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_missing_signature_checked_before_secret() {
        let body = push("refs/heads/main", &["data/projects/foo.toml"]);
        let rec = Recorder::default();
        let err = gate(None).handle(&body, None, &rec).unwrap_err();
        assert!(matches!(err, CatalogError::Authentication(_)));
    }

    #[test]
    fn test_missing_secret_is_configuration_error() {
        let body = push("refs/heads/main", &["data/projects/foo.toml"]);
        let rec = Recorder::default();
        let err = gate(None).handle(&body, Some("sha256=00"), &rec).unwrap_err();
        assert!(matches!(err, CatalogError::Configuration(_)));
    }

    #[test]
    fn test_malformed_signatures_rejected() {
        let body = b"{}";
        for sig in ["", "sha1=abcd", "sha256=not-hex", "sha256=abcd"] {
            assert!(
                matches!(
                    verify_signature(SECRET, body, sig),
                    Err(CatalogError::Authentication(_))
                ),
                "{}",
                sig
            );
        }
    }

    #[test]
    fn test_other_branch_is_noop() {
        let body = push("refs/heads/feature", &["data/projects/foo.toml"]);
        let sig = sign(SECRET, &body).unwrap();
        let rec = Recorder::default();
        let outcome = gate(Some(SECRET)).handle(&body, Some(&sig), &rec).unwrap();
        assert_eq!(outcome, WebhookOutcome::OtherBranch);
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_unwatched_paths_are_noop() {
        let body = push("refs/heads/main", &["src/app.rs", "data/other.toml"]);
        let sig = sign(SECRET, &body).unwrap();
        let rec = Recorder::default();
        let outcome = gate(Some(SECRET)).handle(&body, Some(&sig), &rec).unwrap();
        assert_eq!(outcome, WebhookOutcome::NoCatalogChanges);
        assert!(rec.calls().is_empty());
    }

    #[test]
    fn test_removed_record_counts_as_change() {
        let body = serde_json::to_vec(&serde_json::json!({
            "ref": "refs/heads/main",
            "repository": { "default_branch": "main" },
            "commits": [{ "removed": ["data/projects/gone.toml"] }]
        }))
        .unwrap();
        let sig = sign(SECRET, &body).unwrap();
        let rec = Recorder::default();
        gate(Some(SECRET)).handle(&body, Some(&sig), &rec).unwrap();
        assert_eq!(rec.calls().len(), 1);
    }

    #[test]
    fn test_configured_branch_overrides_payload() {
        let config = WebhookConfig {
            default_branch: Some("trunk".to_string()),
            ..Default::default()
        };
        let gate = WebhookGate::new(&config, Some(SECRET.to_string())).unwrap();
        let rec = Recorder::default();

        let body = push("refs/heads/main", &["data/projects/foo.toml"]);
        let sig = sign(SECRET, &body).unwrap();
        assert_eq!(
            gate.handle(&body, Some(&sig), &rec).unwrap(),
            WebhookOutcome::OtherBranch
        );

        let body = push("refs/heads/trunk", &["data/projects/foo.toml"]);
        let sig = sign(SECRET, &body).unwrap();
        assert_eq!(
            gate.handle(&body, Some(&sig), &rec).unwrap(),
            WebhookOutcome::Invalidated
        );
    }

    #[test]
    fn test_malformed_json_after_valid_signature() {
        let body = b"{not json";
        let sig = sign(SECRET, body).unwrap();
        let rec = Recorder::default();
        let err = gate(Some(SECRET)).handle(body, Some(&sig), &rec).unwrap_err();
        assert!(matches!(err, CatalogError::WebhookPayload(_)));
    }

    #[test]
    fn test_invalid_glob_rejected() {
        let config = WebhookConfig {
            watched_paths: vec!["data/[".to_string()],
            ..Default::default()
        };
        assert!(WebhookGate::new(&config, None).is_err());
    }
}
