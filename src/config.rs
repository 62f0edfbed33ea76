//! Pipeline settings.
//!
//! Settings live under the `settings:` key of the registry YAML. Every field
//! is optional there; missing keys take the values from [`Settings::default`].
//! Command-line flags are applied on top by [`crate::cli::Cli::apply_overrides`].

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one aggregation run.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Upper bound on articles in the published snapshot.
    pub max_articles: usize,
    /// Entries taken from the top of each source.
    pub per_source_limit: usize,
    /// Feed sources in flight at once.
    pub concurrency: usize,
    /// API sources in flight at once; separate from the feed pool.
    pub api_concurrency: usize,
    pub request_timeout_secs: u64,
    /// Total attempts per source, including the first.
    pub fetch_attempts: usize,
    pub retry_backoff_ms: u64,
    /// Wall-clock budget for the fetch phase of a run.
    pub run_budget_secs: u64,
    pub title_max_chars: usize,
    pub description_max_chars: usize,
    /// Length of the lower-cased title prefix used as a second dedupe key.
    /// `0` disables title matching.
    pub title_prefix_len: usize,
    pub default_location: String,
    pub default_category: String,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_articles: 250,
            per_source_limit: 10,
            concurrency: 20,
            api_concurrency: 2,
            request_timeout_secs: 8,
            fetch_attempts: 2,
            retry_backoff_ms: 500,
            run_budget_secs: 60,
            title_max_chars: 200,
            description_max_chars: 300,
            title_prefix_len: 60,
            default_location: "World".to_string(),
            default_category: "general".to_string(),
            user_agent: concat!("news_snapshot/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Settings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn run_budget(&self) -> Duration {
        Duration::from_secs(self.run_budget_secs)
    }

    /// Clamp values that would stall or disable the pipeline.
    pub fn sanitized(mut self) -> Self {
        self.concurrency = self.concurrency.max(1);
        self.api_concurrency = self.api_concurrency.max(1);
        self.fetch_attempts = self.fetch_attempts.max(1);
        if self.default_location.trim().is_empty() {
            self.default_location = Settings::default().default_location;
        }
        if self.default_category.trim().is_empty() {
            self.default_category = Settings::default().default_category;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let settings: Settings = serde_yaml::from_str("max_articles: 50\n").unwrap();
        assert_eq!(settings.max_articles, 50);
        assert_eq!(settings.per_source_limit, 10);
        assert_eq!(settings.default_category, "general");
    }

    #[test]
    fn test_sanitized_clamps_zero_bounds() {
        let settings = Settings {
            concurrency: 0,
            api_concurrency: 0,
            fetch_attempts: 0,
            default_location: " ".to_string(),
            ..Settings::default()
        }
        .sanitized();
        assert_eq!(settings.concurrency, 1);
        assert_eq!(settings.api_concurrency, 1);
        assert_eq!(settings.fetch_attempts, 1);
        assert_eq!(settings.default_location, "World");
    }

    #[test]
    fn test_durations() {
        let settings = Settings::default();
        assert_eq!(settings.request_timeout(), Duration::from_secs(8));
        assert_eq!(settings.retry_backoff(), Duration::from_millis(500));
        assert_eq!(settings.run_budget(), Duration::from_secs(60));
    }
}
