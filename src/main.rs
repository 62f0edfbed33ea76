//! # News Snapshot
//!
//! A news aggregation pipeline that pulls articles from many RSS/Atom feeds
//! and news APIs at once, normalizes and classifies them, removes duplicates,
//! and publishes a single JSON snapshot for a static site to read.
//!
//! ## Usage
//!
//! ```sh
//! news_snapshot -o public/data/articles.json
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Registry**: Load sources and settings (built-in list or `--config`)
//! 2. **Fetching**: Download every source concurrently with timeouts and retries
//! 3. **Normalizing**: Parse payloads, clean text, pick images, tag location and topic
//! 4. **Merging**: Deduplicate, sort newest first, truncate, compute statistics
//! 5. **Output**: Atomically replace the snapshot JSON file

use clap::Parser;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::error::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod aggregate;
mod classify;
mod cli;
mod config;
mod dedupe;
mod fetch;
mod models;
mod normalize;
mod outputs;
mod parse;
mod registry;
mod utils;

use aggregate::Aggregator;
use cli::Cli;
use fetch::http::HttpFetcher;
use outputs::json;
use utils::ensure_writable_parent;

/// Entries shown per table in the closing summary.
const SUMMARY_TOP: usize = 10;

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    info!("news_snapshot starting up");

    let args = Cli::parse();
    debug!(?args.output, ?args.config, "Parsed CLI arguments");

    // ---- Registry & settings ----
    let (registry, file_settings) = registry::load(args.config.as_deref())?;
    let settings = args.apply_overrides(file_settings);
    info!(
        sources = registry.len(),
        feeds = registry.feeds().count(),
        apis = registry.apis().count(),
        max_articles = settings.max_articles,
        "Loaded source registry"
    );
    if registry.is_empty() {
        warn!("Source registry is empty; the snapshot will have no articles");
    }

    // Early check: fail before fetching anything if the output is unwritable
    if let Err(e) = ensure_writable_parent(&args.output).await {
        error!(
            path = %args.output.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let api_key = args.api_key();
    if api_key.is_none() && registry.apis().next().is_some() {
        info!("No NewsAPI key configured; API sources will be skipped");
    }
    let fetcher = HttpFetcher::new(&settings, api_key)?;

    // ---- Cancellation on Ctrl-C ----
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; finishing with collected results");
            on_signal.cancel();
        }
    });

    // ---- Run ----
    let report = Aggregator::new(fetcher, settings, cancel)
        .run(&registry)
        .await;

    if let Err(e) = json::write_snapshot(&report.snapshot, &args.output).await {
        error!(path = %args.output.display(), error = %e, "Failed to write snapshot");
        return Err(e);
    }

    // ---- Summary ----
    let snapshot = &report.snapshot;
    info!(
        total = snapshot.total_articles,
        fetched = report.fetched,
        sources = snapshot.stats.source_count,
        succeeded = report.succeeded,
        failed = report.failed_sources.len(),
        completed = report.completed,
        registered = registry.len(),
        interrupted = report.interrupted,
        "Snapshot summary"
    );
    if !report.failed_sources.is_empty() {
        debug!(failed = %report.failed_sources.join(", "), "Sources without articles");
    }
    info!("By location: {}", top_counts(&snapshot.stats.by_location));
    info!("By category: {}", top_counts(&snapshot.stats.by_category));

    let elapsed = report.elapsed;
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}

/// `"Toronto=12, World=9, ..."`, largest first, ties by name.
fn top_counts(counts: &BTreeMap<String, usize>) -> String {
    counts
        .iter()
        .sorted_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)))
        .take(SUMMARY_TOP)
        .map(|(k, v)| format!("{k}={v}"))
        .join(", ")
}
