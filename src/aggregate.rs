//! The aggregation run: fetch every source, merge, dedupe, rank, publish.
//!
//! ## Concurrency
//!
//! Feed sources run in a pool of `settings.concurrency` in-flight tasks; API
//! sources run in their own pool of `settings.api_concurrency`. Both pools
//! feed one stream consumed here, so the working set has a single owner and
//! per-source work (fetch, parse, normalize, classify) needs no locking.
//!
//! ## Budget and cancellation
//!
//! The fetch phase stops when every source has reported, when the run budget
//! elapses, or when the shared [`CancellationToken`] fires (Ctrl-C). Results
//! already collected are kept and published; in-flight sources are dropped.

use crate::classify::classify;
use crate::config::Settings;
use crate::dedupe::{dedupe, fingerprint};
use crate::fetch::retry::RetryFetch;
use crate::fetch::{Fetch, FetchError};
use crate::models::{Article, Snapshot, Source, Stats};
use crate::normalize::{Candidate, normalize};
use crate::parse::parse_payload;
use crate::registry::SourceRegistry;
use crate::utils::truncate_for_log;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Log a progress line every this many finished sources.
const PROGRESS_EVERY: usize = 15;
/// Failure reasons are cut to this many characters in the per-source line.
const REASON_MAX: usize = 40;

/// Outcome of one source's task.
#[derive(Debug)]
pub struct SourceReport {
    pub name: String,
    pub result: Result<Vec<Article>, FetchError>,
}

/// Everything a run produced, including diagnostics for the summary.
#[derive(Debug)]
pub struct RunReport {
    pub snapshot: Snapshot,
    /// Sources that reported before the fetch phase ended.
    pub completed: usize,
    pub succeeded: usize,
    /// Candidates collected before deduplication.
    pub fetched: usize,
    /// Names of sources that reported an error.
    pub failed_sources: Vec<String>,
    /// Whether the budget or a cancellation cut the fetch phase short.
    pub interrupted: bool,
    pub elapsed: Duration,
}

/// Drives one aggregation run.
///
/// The cancellation token is consumed by the run: once the budget elapses it
/// is cancelled, so build a fresh `Aggregator` per run.
pub struct Aggregator<F> {
    fetcher: RetryFetch<F>,
    settings: Settings,
    cancel: CancellationToken,
}

impl<F> Aggregator<F>
where
    F: Fetch,
{
    pub fn new(inner: F, settings: Settings, cancel: CancellationToken) -> Self {
        let fetcher = RetryFetch::from_settings(inner, &settings, cancel.clone());
        Self {
            fetcher,
            settings,
            cancel,
        }
    }

    /// Run every source in `registry` and build the snapshot.
    ///
    /// Never fails: per-source errors become empty contributions and an
    /// empty working set yields an empty snapshot.
    #[instrument(level = "info", skip_all, fields(sources = registry.len()))]
    pub async fn run(&self, registry: &SourceRegistry) -> RunReport {
        let started = Instant::now();
        let total = registry.len();
        info!(
            total,
            concurrency = self.settings.concurrency,
            api_concurrency = self.settings.api_concurrency,
            budget_secs = self.settings.run_budget_secs,
            "Fetching sources"
        );

        let feeds = stream::iter(registry.feeds())
            .map(|source| self.collect_source(source))
            .buffer_unordered(self.settings.concurrency);
        let apis = stream::iter(registry.apis())
            .map(|source| self.collect_source(source))
            .buffer_unordered(self.settings.api_concurrency);
        let mut tasks = stream::select(feeds, apis);

        let deadline = tokio::time::sleep(self.settings.run_budget());
        tokio::pin!(deadline);

        let mut working: Vec<Article> = Vec::new();
        let mut failed_sources = Vec::new();
        let (mut completed, mut succeeded) = (0usize, 0usize);
        let mut interrupted = false;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(completed, total, "Run cancelled; publishing collected results");
                    interrupted = true;
                    break;
                }
                _ = &mut deadline => {
                    warn!(
                        completed,
                        total,
                        budget_secs = self.settings.run_budget_secs,
                        "Run budget exhausted; cancelling in-flight sources"
                    );
                    self.cancel.cancel();
                    interrupted = true;
                    break;
                }
                next = tasks.next() => {
                    let Some(report) = next else { break };
                    completed += 1;
                    match report.result {
                        Ok(mut articles) => {
                            succeeded += 1;
                            working.append(&mut articles);
                        }
                        Err(_) => failed_sources.push(report.name),
                    }
                    if completed % PROGRESS_EVERY == 0 {
                        info!("Progress: {completed}/{total}");
                    }
                }
            }
        }
        drop(tasks);

        let fetched = working.len();
        info!(fetched, "Total fetched");
        let snapshot = build_snapshot(working, &self.settings, Utc::now());

        RunReport {
            snapshot,
            completed,
            succeeded,
            failed_sources,
            fetched,
            interrupted,
            elapsed: started.elapsed(),
        }
    }

    /// One source's task. Errors are logged and folded into the report.
    async fn collect_source(&self, source: &Source) -> SourceReport {
        let result = self.fetch_articles(source).await;
        match &result {
            Ok(articles) => info!(source = %source.name, count = articles.len(), "✓ fetched"),
            Err(FetchError::MissingCredential) => {
                info!(source = %source.name, "Source disabled: no API key")
            }
            Err(e) => warn!(
                source = %source.name,
                reason = %truncate_for_log(&e.to_string(), REASON_MAX),
                "✗ failed"
            ),
        }
        SourceReport {
            name: source.name.clone(),
            result,
        }
    }

    async fn fetch_articles(&self, source: &Source) -> Result<Vec<Article>, FetchError> {
        let payload = self.fetcher.fetch(source).await?;
        let fetched_at = Utc::now();
        let entries = parse_payload(source, &payload)?;
        debug!(source = %source.name, entries = entries.len(), "Parsed payload");

        Ok(normalize(source, entries, &self.settings, fetched_at)
            .into_iter()
            .map(|candidate| to_article(candidate, source, &self.settings, fetched_at))
            .collect())
    }
}

/// Classify and fingerprint a candidate.
pub fn to_article(
    candidate: Candidate,
    source: &Source,
    settings: &Settings,
    fetched_at: DateTime<Utc>,
) -> Article {
    let tags = classify(&candidate.title, &candidate.description, source, settings);
    Article {
        id: fingerprint(&candidate.url),
        title: candidate.title,
        description: candidate.description,
        url: candidate.url,
        source: source.name.clone(),
        image: candidate.image.unwrap_or_default(),
        published: candidate.published,
        location: tags.location,
        category: tags.category,
        fetched_at,
    }
}

/// Dedupe, rank newest-first, truncate and compute statistics.
///
/// The sort is stable, so articles with equal timestamps keep arrival order.
pub fn build_snapshot(working: Vec<Article>, settings: &Settings, now: DateTime<Utc>) -> Snapshot {
    let mut articles = dedupe(working, settings.title_prefix_len);
    info!(unique = articles.len(), "After deduplication");
    if articles.is_empty() {
        warn!("No articles fetched; publishing an empty snapshot");
        return Snapshot::empty(now);
    }

    articles.sort_by(|a, b| b.published.cmp(&a.published));
    articles.truncate(settings.max_articles);

    let stats = compute_stats(&articles);
    let sources = articles
        .iter()
        .map(|a| a.source.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    Snapshot {
        last_updated: now,
        total_articles: articles.len(),
        articles,
        sources,
        stats,
    }
}

/// Frequency tables over the final article set.
pub fn compute_stats(articles: &[Article]) -> Stats {
    let mut stats = Stats::default();
    let mut sources = BTreeSet::new();
    for article in articles {
        *stats.by_location.entry(article.location.clone()).or_default() += 1;
        *stats.by_category.entry(article.category.clone()).or_default() += 1;
        sources.insert(article.source.as_str());
    }
    stats.source_count = sources.len();
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{RawFetchResult, RawPayload};
    use crate::models::SourceKind;
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Behavior {
        Payload(Vec<u8>),
        Fail(FetchError),
        Hang,
    }

    /// Serves scripted payloads by endpoint and counts calls.
    #[derive(Default)]
    struct FakeFetcher {
        behaviors: HashMap<String, Behavior>,
        calls: Mutex<HashMap<String, usize>>,
    }

    impl FakeFetcher {
        fn with(mut self, endpoint: &str, behavior: Behavior) -> Self {
            self.behaviors.insert(endpoint.to_string(), behavior);
            self
        }

        fn calls(&self, endpoint: &str) -> usize {
            self.calls
                .lock()
                .unwrap()
                .get(endpoint)
                .copied()
                .unwrap_or(0)
        }
    }

    impl Fetch for &FakeFetcher {
        async fn fetch(&self, source: &Source) -> RawFetchResult {
            *self
                .calls
                .lock()
                .unwrap()
                .entry(source.endpoint.clone())
                .or_default() += 1;
            match self.behaviors.get(&source.endpoint).cloned() {
                Some(Behavior::Payload(bytes)) => Ok(RawPayload {
                    bytes,
                    content_type: None,
                }),
                Some(Behavior::Fail(e)) => Err(e),
                Some(Behavior::Hang) | None => {
                    tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                    Err(FetchError::Timeout)
                }
            }
        }
    }

    /// Current and peak number of calls inside `fetch`.
    #[derive(Default)]
    struct InFlight {
        now: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlight {
        fn enter(&self) {
            let n = self.now.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(n, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.now.fetch_sub(1, Ordering::SeqCst);
        }

        fn peak(&self) -> usize {
            self.peak.load(Ordering::SeqCst)
        }
    }

    /// Holds every call open briefly and tracks overlap per source kind.
    #[derive(Default)]
    struct PoolFetcher {
        feeds: InFlight,
        apis: InFlight,
        all: InFlight,
    }

    impl Fetch for &PoolFetcher {
        async fn fetch(&self, source: &Source) -> RawFetchResult {
            let pool = match source.kind {
                SourceKind::Feed => &self.feeds,
                SourceKind::Api => &self.apis,
            };
            pool.enter();
            self.all.enter();
            tokio::time::sleep(Duration::from_millis(100)).await;
            self.all.exit();
            pool.exit();
            Err(FetchError::Http { status: 404 })
        }
    }

    /// `(title, link, pubDate)` items as an RSS 2.0 document.
    fn rss(items: &[(&str, &str, &str)]) -> Vec<u8> {
        let mut xml = String::from(
            r#"<?xml version="1.0"?><rss version="2.0"><channel><title>Fixture</title><link>https://feed.test/</link><description>d</description>"#,
        );
        for (title, link, date) in items {
            xml.push_str(&format!(
                "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
            ));
        }
        xml.push_str("</channel></rss>");
        xml.into_bytes()
    }

    fn feed(name: &str, endpoint: &str, category: &str) -> Source {
        Source {
            name: name.to_string(),
            endpoint: endpoint.to_string(),
            category: category.to_string(),
            location: None,
            kind: SourceKind::Feed,
        }
    }

    fn settings() -> Settings {
        Settings {
            run_budget_secs: 30,
            ..Settings::default()
        }
    }

    fn article(url: &str, title: &str, hour: u32) -> Article {
        let ts = Utc.with_ymd_and_hms(2025, 5, 6, hour, 0, 0).unwrap();
        Article {
            id: fingerprint(url),
            title: title.to_string(),
            description: String::new(),
            url: url.to_string(),
            source: "S".to_string(),
            image: String::new(),
            published: ts,
            location: "World".to_string(),
            category: "general".to_string(),
            fetched_at: ts,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_same_url_from_two_sources_yields_one_article() {
        let fetcher = FakeFetcher::default()
            .with(
                "https://a.test/rss",
                Behavior::Payload(rss(&[(
                    "First take on the story",
                    "https://x.test/a",
                    "Tue, 06 May 2025 14:30:00 GMT",
                )])),
            )
            .with(
                "https://b.test/rss",
                Behavior::Payload(rss(&[(
                    "A different headline",
                    "https://x.test/a",
                    "Tue, 06 May 2025 15:30:00 GMT",
                )])),
            );
        let registry = SourceRegistry::new(vec![
            feed("A", "https://a.test/rss", "general"),
            feed("B", "https://b.test/rss", "general"),
        ]);

        let report = Aggregator::new(&fetcher, settings(), CancellationToken::new())
            .run(&registry)
            .await;

        let snapshot = report.snapshot;
        assert_eq!(snapshot.total_articles, 1);
        assert_eq!(snapshot.articles[0].url, "https://x.test/a");
        assert_eq!(snapshot.articles[0].id, fingerprint("https://x.test/a"));
        assert_eq!(report.fetched, 2);
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_source_timing_out_on_every_attempt_contributes_nothing() {
        let fetcher = FakeFetcher::default()
            .with("https://slow.test/rss", Behavior::Fail(FetchError::Timeout))
            .with(
                "https://ok.test/rss",
                Behavior::Payload(rss(&[(
                    "Raptors beat Celtics in Toronto",
                    "https://ok.test/raptors",
                    "Tue, 06 May 2025 14:30:00 GMT",
                )])),
            );
        let registry = SourceRegistry::new(vec![
            feed("Slow", "https://slow.test/rss", "general"),
            feed("Ok", "https://ok.test/rss", "general"),
        ]);

        let report = Aggregator::new(&fetcher, settings(), CancellationToken::new())
            .run(&registry)
            .await;

        assert_eq!(fetcher.calls("https://slow.test/rss"), 2);
        assert_eq!(fetcher.calls("https://ok.test/rss"), 1);
        assert_eq!(report.failed_sources, vec!["Slow".to_string()]);
        assert_eq!(report.succeeded, 1);
        assert!(!report.interrupted);

        let snapshot = report.snapshot;
        assert_eq!(snapshot.total_articles, 1);
        assert_eq!(snapshot.sources, vec!["Ok".to_string()]);
        let raptors = &snapshot.articles[0];
        assert_eq!(raptors.category, "sports");
        assert_eq!(raptors.location, "Toronto");
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_reachable_sources_yields_empty_snapshot() {
        let fetcher = FakeFetcher::default()
            .with("https://a.test/rss", Behavior::Fail(FetchError::Http { status: 404 }))
            .with(
                "https://b.test/rss",
                Behavior::Payload(b"<html>maintenance</html>".to_vec()),
            );
        let registry = SourceRegistry::new(vec![
            feed("A", "https://a.test/rss", "general"),
            feed("B", "https://b.test/rss", "general"),
        ]);

        let report = Aggregator::new(&fetcher, settings(), CancellationToken::new())
            .run(&registry)
            .await;

        assert_eq!(report.snapshot.total_articles, 0);
        assert!(report.snapshot.articles.is_empty());
        assert_eq!(report.failed_sources.len(), 2);
        assert_eq!(fetcher.calls("https://a.test/rss"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_registry() {
        let fetcher = FakeFetcher::default();
        let report = Aggregator::new(&fetcher, settings(), CancellationToken::new())
            .run(&SourceRegistry::default())
            .await;
        assert_eq!(report.snapshot.total_articles, 0);
        assert_eq!(report.completed, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_keeps_completed_results() {
        let fetcher = FakeFetcher::default()
            .with("https://hung.test/rss", Behavior::Hang)
            .with(
                "https://fast.test/rss",
                Behavior::Payload(rss(&[(
                    "Fast story",
                    "https://fast.test/1",
                    "Tue, 06 May 2025 14:30:00 GMT",
                )])),
            );
        let registry = SourceRegistry::new(vec![
            feed("Hung", "https://hung.test/rss", "general"),
            feed("Fast", "https://fast.test/rss", "general"),
        ]);
        let settings = Settings {
            run_budget_secs: 5,
            request_timeout_secs: 600,
            ..Settings::default()
        };
        let cancel = CancellationToken::new();

        let report = Aggregator::new(&fetcher, settings, cancel.clone())
            .run(&registry)
            .await;

        assert!(report.interrupted);
        assert!(cancel.is_cancelled());
        assert_eq!(report.completed, 1);
        assert_eq!(report.snapshot.total_articles, 1);
        assert_eq!(report.snapshot.articles[0].title, "Fast story");
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_cancel_stops_the_run() {
        let fetcher = FakeFetcher::default().with("https://hung.test/rss", Behavior::Hang);
        let registry = SourceRegistry::new(vec![feed("Hung", "https://hung.test/rss", "general")]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let report = Aggregator::new(&fetcher, settings(), cancel).run(&registry).await;
        assert!(report.interrupted);
        assert_eq!(report.snapshot.total_articles, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_api_source_without_payload_support_is_isolated() {
        let mut api = feed("NewsAPI", "https://api.test/top", "canada");
        api.kind = SourceKind::Api;
        let fetcher = FakeFetcher::default()
            .with("https://api.test/top", Behavior::Fail(FetchError::MissingCredential))
            .with(
                "https://a.test/rss",
                Behavior::Payload(rss(&[(
                    "Ottawa council meets",
                    "https://a.test/1",
                    "Tue, 06 May 2025 14:30:00 GMT",
                )])),
            );
        let registry = SourceRegistry::new(vec![api, feed("A", "https://a.test/rss", "local")]);

        let report = Aggregator::new(&fetcher, settings(), CancellationToken::new())
            .run(&registry)
            .await;
        assert_eq!(fetcher.calls("https://api.test/top"), 1);
        assert_eq!(report.snapshot.total_articles, 1);
        assert_eq!(report.snapshot.articles[0].location, "Ottawa");
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_and_api_pools_are_bounded_independently() {
        let mut sources: Vec<Source> = (0..12)
            .map(|i| feed(&format!("Feed {i}"), &format!("https://f{i}.test/rss"), "general"))
            .collect();
        for i in 0..5 {
            let mut api = feed(&format!("Api {i}"), &format!("https://api{i}.test/top"), "general");
            api.kind = SourceKind::Api;
            sources.push(api);
        }
        let registry = SourceRegistry::new(sources);
        let settings = Settings {
            concurrency: 3,
            api_concurrency: 2,
            ..settings()
        };
        let fetcher = PoolFetcher::default();

        let report = Aggregator::new(&fetcher, settings, CancellationToken::new())
            .run(&registry)
            .await;

        assert_eq!(report.completed, 17);
        assert!(!report.interrupted);
        assert_eq!(fetcher.feeds.peak(), 3);
        assert_eq!(fetcher.apis.peak(), 2);
        // API sources do not wait for feed slots
        assert_eq!(fetcher.all.peak(), 5);
    }

    #[test]
    fn test_build_snapshot_sorts_newest_first_and_truncates() {
        let working = vec![
            article("https://x.test/1", "One", 9),
            article("https://x.test/2", "Two", 14),
            article("https://x.test/3", "Three", 11),
            article("https://x.test/4", "Four", 14),
            article("https://x.test/5", "Five", 7),
        ];
        let settings = Settings {
            max_articles: 3,
            ..Settings::default()
        };
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 16, 0, 0).unwrap();
        let snapshot = build_snapshot(working, &settings, now);

        let titles: Vec<&str> = snapshot.articles.iter().map(|a| a.title.as_str()).collect();
        // equal timestamps keep arrival order
        assert_eq!(titles, vec!["Two", "Four", "Three"]);
        assert_eq!(snapshot.total_articles, 3);
        assert_eq!(snapshot.last_updated, now);
        assert!(
            snapshot
                .articles
                .windows(2)
                .all(|w| w[0].published >= w[1].published)
        );
    }

    #[test]
    fn test_stats_cover_truncated_set_only() {
        let mut working = vec![
            article("https://x.test/1", "One", 14),
            article("https://x.test/2", "Two", 13),
            article("https://x.test/3", "Three", 12),
        ];
        working[0].location = "Toronto".into();
        working[0].category = "sports".into();
        working[1].source = "Other".into();
        working[2].location = "Halifax".into();
        let settings = Settings {
            max_articles: 2,
            ..Settings::default()
        };
        let snapshot = build_snapshot(working, &settings, Utc::now());

        assert_eq!(snapshot.stats.by_location.get("Toronto"), Some(&1));
        assert_eq!(snapshot.stats.by_location.get("World"), Some(&1));
        assert_eq!(snapshot.stats.by_location.get("Halifax"), None);
        assert_eq!(snapshot.stats.by_category.get("sports"), Some(&1));
        assert_eq!(snapshot.stats.by_category.get("general"), Some(&1));
        assert_eq!(snapshot.sources, vec!["Other".to_string(), "S".to_string()]);
        assert_eq!(snapshot.stats.source_count, 2);
    }

    #[test]
    fn test_truncation_bound_with_many_candidates() {
        let working = (0..1000)
            .map(|i| article(&format!("https://x.test/{i}"), &format!("Story {i}"), (i % 24) as u32))
            .collect();
        let snapshot = build_snapshot(working, &Settings::default(), Utc::now());
        assert_eq!(snapshot.articles.len(), 250);
        assert_eq!(snapshot.total_articles, 250);
    }

    #[test]
    fn test_build_snapshot_empty() {
        let now = Utc::now();
        let snapshot = build_snapshot(Vec::new(), &Settings::default(), now);
        assert_eq!(snapshot, Snapshot::empty(now));
    }
}
