//! Command-line interface definitions.
//!
//! Flags override the `settings:` block of the registry file. All options can
//! also be supplied through environment variables.

use crate::config::Settings;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for one aggregation run.
///
/// # Examples
///
/// ```sh
/// # Built-in registry, snapshot to ./articles.json
/// news_snapshot
///
/// # Custom registry and output, with the NewsAPI source enabled
/// news_snapshot -c sources.yaml -o public/data/articles.json --newsapi-key KEY
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the snapshot JSON file to write
    #[arg(short, long, env = "NEWS_OUTPUT", default_value = "articles.json")]
    pub output: PathBuf,

    /// Optional path to a sources.yaml registry (defaults to the built-in list)
    #[arg(short, long, env = "NEWS_SOURCES")]
    pub config: Option<PathBuf>,

    /// NewsAPI key; API sources are skipped without one
    #[arg(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    pub newsapi_key: Option<String>,

    /// Maximum number of articles in the snapshot
    #[arg(long)]
    pub max_articles: Option<usize>,

    /// Entries taken from the top of each source
    #[arg(long)]
    pub per_source_limit: Option<usize>,

    /// Feed sources fetched at once
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Wall-clock budget for the fetch phase, in seconds
    #[arg(long)]
    pub budget_secs: Option<u64>,

    /// Title prefix length used for deduplication (0 disables it)
    #[arg(long)]
    pub title_prefix: Option<usize>,
}

impl Cli {
    /// Apply flags on top of file settings.
    pub fn apply_overrides(&self, mut settings: Settings) -> Settings {
        if let Some(n) = self.max_articles {
            settings.max_articles = n;
        }
        if let Some(n) = self.per_source_limit {
            settings.per_source_limit = n;
        }
        if let Some(n) = self.concurrency {
            settings.concurrency = n;
        }
        if let Some(secs) = self.budget_secs {
            settings.run_budget_secs = secs;
        }
        if let Some(n) = self.title_prefix {
            settings.title_prefix_len = n;
        }
        settings.sanitized()
    }

    /// The API key, ignoring blank values.
    pub fn api_key(&self) -> Option<String> {
        self.newsapi_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}
