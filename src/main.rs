//! # FOSSRadar CLI (`fossradar`)
//!
//! ## Usage
//!
//! ```bash
//! fossradar --config ./config/fossradar.toml <command>
//! ```
//!
//! Without `--config` every setting takes its default and paths resolve
//! against the current directory.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fossradar validate` | Validate every record; fails if any is rejected |
//! | `fossradar index` | Write the search index |
//! | `fossradar search "<query>"` | Search the catalog |
//! | `fossradar similar <slug>` | Projects related to one record |
//! | `fossradar radar` | Project counts by state and city |
//! | `fossradar enrich` | Refresh repository metadata (needs `GITHUB_TOKEN`) |
//! | `fossradar serve` | Start the HTTP server (webhook needs `WEBHOOK_SECRET`) |

use anyhow::bail;
use clap::{Parser, Subcommand};
use fossradar::config::{self, Config, Secrets};
use fossradar::enrich::Enricher;
use fossradar::export::run_export;
use fossradar::github::GitHubClient;
use fossradar::server;
use fossradar::store::RecordStore;
use fossradar_core::radar::aggregate;
use fossradar_core::search::{query, SearchFilters, SortMode};
use fossradar_core::similar::find_similar;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// FOSSRadar catalog engine.
#[derive(Parser)]
#[command(
    name = "fossradar",
    about = "FOSSRadar catalog engine: validate, index, search, enrich and serve project records",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate every record in the records directory.
    Validate,

    /// Write the search index.
    Index {
        /// Output path; defaults to `[catalog].index_path`.
        #[arg(long)]
        output: Option<PathBuf>,

        /// Print the index to stdout instead of writing a file.
        #[arg(long, conflicts_with = "output")]
        stdout: bool,
    },

    /// Search the catalog.
    Search {
        /// Free-text query; empty matches everything.
        #[arg(default_value = "")]
        query: String,

        /// Require a tag (repeatable; all must match).
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Only verified projects.
        #[arg(long)]
        verified: bool,

        /// Only projects looking for contributors.
        #[arg(long)]
        contributors: bool,

        /// Sort order: name, stars, or recent.
        #[arg(long, default_value = "name")]
        sort: String,
    },

    /// List projects related to a record.
    Similar {
        slug: String,

        /// Maximum results; defaults to `[search].similar_limit`.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Summarize the catalog by state and city.
    Radar,

    /// Refresh repository metadata for every record.
    Enrich {
        /// Only enrich this slug.
        #[arg(long)]
        only: Option<String>,

        /// Fetch metadata but write nothing.
        #[arg(long)]
        dry_run: bool,
    },

    /// Start the HTTP server.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match cli.config {
        Some(ref path) => config::load_config(path)?,
        None => Config::default(),
    };

    match cli.command {
        Commands::Validate => {
            let store = RecordStore::load_all(&cfg.catalog.records_dir)?;
            for err in store.rejected() {
                println!("  invalid: {}", err);
            }
            println!(
                "validate {}: {} valid, {} invalid",
                cfg.catalog.records_dir.display(),
                store.len(),
                store.rejected().len()
            );
            if !store.rejected().is_empty() {
                bail!("{} record(s) failed validation", store.rejected().len());
            }
            println!("ok");
        }
        Commands::Index { output, stdout } => {
            let store = RecordStore::load_all(&cfg.catalog.records_dir)?;
            if stdout {
                run_export(&store, None)?;
            } else {
                let path = output.unwrap_or_else(|| cfg.catalog.index_path.clone());
                run_export(&store, Some(&path))?;
            }
        }
        Commands::Search {
            query: text,
            tags,
            verified,
            contributors,
            sort,
        } => {
            let sort: SortMode = sort.parse()?;
            let store = RecordStore::load_all(&cfg.catalog.records_dir)?;
            let filters = SearchFilters {
                verified_only: verified,
                looking_for_contributors: contributors,
                tags,
            };
            let results = query(
                &store.search_index(),
                &text,
                &filters,
                sort,
                &cfg.search.params(),
            );

            if results.is_empty() {
                println!("No results.");
                return Ok(());
            }
            for (i, entry) in results.iter().enumerate() {
                let mark = if entry.verified { " ✓" } else { "" };
                println!(
                    "{}. {} ({}){}  ★ {}  [{}]",
                    i + 1,
                    entry.name,
                    entry.slug,
                    mark,
                    entry.stars,
                    entry.tags.join(", ")
                );
                println!("    {}", entry.short_desc);
            }
        }
        Commands::Similar { slug, limit } => {
            let store = RecordStore::load_all(&cfg.catalog.records_dir)?;
            let subject = store.get_by_slug(&slug)?;
            let limit = limit.unwrap_or(cfg.search.similar_limit);
            let similar = find_similar(subject, store.records(), limit);

            if similar.is_empty() {
                println!("No similar projects.");
                return Ok(());
            }
            for rec in similar {
                println!("{} ({})  ★ {}", rec.name, rec.slug, rec.stars);
            }
        }
        Commands::Radar => {
            let store = RecordStore::load_all(&cfg.catalog.records_dir)?;
            let summary = aggregate(store.records());
            println!(
                "{} projects across {} states and {} cities ({} verified, {} stars)",
                summary.total_projects,
                summary.total_states,
                summary.total_cities,
                summary.verified_projects,
                summary.total_stars
            );
            for state in &summary.states {
                println!("  {}: {} ({} stars)", state.state, state.count, state.stars);
                for city in &state.cities {
                    println!("    {}: {}", city.city, city.count);
                }
            }
        }
        Commands::Enrich { only, dry_run } => {
            let secrets = Secrets::from_env();
            let token = secrets.require_github_token()?;
            let store = RecordStore::load_all(&cfg.catalog.records_dir)?;
            let client = GitHubClient::new(&cfg.enrich, token)?;
            let enricher = Enricher::new(Box::new(client), &cfg.enrich, &cfg.catalog.cache_dir)
                .dry_run(dry_run);

            let report = enricher.enrich_all(&store, only.as_deref()).await?;

            println!("enrich{}", if dry_run { " (dry-run)" } else { "" });
            println!("  records: {}", report.total());
            println!("  enriched: {}", report.enriched.len());
            println!("  skipped: {}", report.skipped.len());
            for (slug, reason) in &report.skipped {
                println!("    {}: {}", slug, reason);
            }
            println!("  failed: {}", report.failed.len());
            for (slug, reason) in &report.failed {
                println!("    {}: {}", slug, reason);
            }
            println!("ok");
        }
        Commands::Serve => {
            let secrets = Secrets::from_env();
            server::run_server(&cfg, &secrets).await?;
        }
    }

    Ok(())
}
