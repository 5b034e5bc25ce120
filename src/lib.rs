//! # FOSSRadar
//!
//! Catalog engine for a directory of open-source projects.
//!
//! Each project is a TOML record in a version-controlled directory. The
//! engine validates and loads the records, builds the search index that
//! clients query, ranks related projects, refreshes repository metadata from
//! GitHub, and serves the catalog over HTTP with a signed push webhook that
//! invalidates the cached catalog when records change upstream.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │ data/projects│──▶│ RecordStore  │──▶│ index.json   │
//! │  <slug>.toml │   │  (validate)  │   │ search/rank  │
//! └──────▲───────┘   └──────┬───────┘   └──────────────┘
//!        │                  │
//!   ┌────┴─────┐      ┌─────▼──────┐      ┌──────────┐
//!   │ Enricher │◀─────│ GitHub API │      │ Webhook  │──▶ invalidate
//!   └──────────┘      └────────────┘      └──────────┘
//! ```
//!
//! The pure engines (search, similarity, index, radar) live in
//! `fossradar-core`; this crate adds file IO, the network and the CLI.
//!
//! ## Quick Start
//!
//! ```bash
//! fossradar validate                 # check every record
//! fossradar index                    # write public/index.json
//! fossradar search "terminal" --sort stars
//! GITHUB_TOKEN=... fossradar enrich  # refresh stars and metadata
//! WEBHOOK_SECRET=... fossradar serve
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration and environment secrets |
//! | [`error`] | Catalog error taxonomy |
//! | [`store`] | Record loading and validation |
//! | [`record_file`] | In-place updates of enrichment-owned fields |
//! | [`github`] | Metadata source trait and GitHub client |
//! | [`enrich`] | Enrichment pipeline |
//! | [`export`] | Search index export |
//! | [`cache`] | Cache partitions and invalidation |
//! | [`webhook`] | Signed push webhook gate |
//! | [`server`] | HTTP read API |

pub mod cache;
pub mod config;
pub mod enrich;
pub mod error;
pub mod export;
pub mod github;
pub mod record_file;
pub mod server;
pub mod store;
pub mod webhook;
