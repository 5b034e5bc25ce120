//! Error taxonomy for the catalog.
//!
//! Validation and fetch errors are contained at the smallest unit (one
//! record, one enrichment step). Authentication and configuration errors
//! surface to the caller immediately.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Error, Debug)]
pub enum CatalogError {
    /// A record file failed to parse or broke a schema invariant.
    #[error("invalid record {path}: {reason}")]
    Validation { path: PathBuf, reason: String },

    /// No record with the requested slug.
    #[error("project not found: {0}")]
    NotFound(String),

    /// A call to the metadata source failed.
    #[error("fetch {what} failed: {reason}")]
    ExternalFetch { what: String, reason: String },

    /// Webhook signature missing or wrong.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A required credential or secret is not configured.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The webhook body passed signature checks but could not be processed.
    #[error("webhook payload rejected: {0}")]
    WebhookPayload(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub(crate) fn validation(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CatalogError::Validation {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn fetch(what: impl Into<String>, reason: impl ToString) -> Self {
        CatalogError::ExternalFetch {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}
