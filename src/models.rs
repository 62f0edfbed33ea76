//! Data models shared across the pipeline.
//!
//! This module defines the core data structures:
//! - [`Source`]: One configured feed or news API with its declared metadata
//! - [`RawEntry`]: A single entry as parsed out of a fetched payload
//! - [`Article`]: The canonical, normalized and classified article record
//! - [`Snapshot`]: The published document produced by one complete run
//!
//! Output models serialize with camelCase keys, which is the schema the
//! static site reads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// How a source's payload is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// RSS or Atom syndication feed.
    #[default]
    Feed,
    /// JSON news API in the NewsAPI response shape; needs an API key.
    Api,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Feed => write!(f, "feed"),
            SourceKind::Api => write!(f, "api"),
        }
    }
}

/// A configured news source.
///
/// Sources are loaded once per run from the registry and never mutated.
/// The `category` and `location` fields are the *declared* values that the
/// classifier falls back to when an article's own text gives no signal.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Source {
    /// Display name, copied onto every article from this source.
    pub name: String,
    /// Endpoint URL; also the source's identity.
    pub endpoint: String,
    /// Declared topic tag.
    pub category: String,
    /// Declared location tag, if the source is regional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub kind: SourceKind,
}

/// An enclosure attached to a feed entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Enclosure {
    pub href: String,
    /// Declared MIME type, e.g. `image/jpeg`.
    pub mime: Option<String>,
}

/// One entry extracted from a feed document or API payload.
///
/// Every field is optional at this stage; the normalizer decides what is
/// required.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawEntry {
    pub link: Option<String>,
    pub title: Option<String>,
    /// Summary or description text, possibly HTML.
    pub summary: Option<String>,
    /// Full body HTML (`content:encoded`, Atom content, API content).
    pub content: Option<String>,
    pub published: Option<DateTime<Utc>>,
    pub media_content: Vec<String>,
    pub media_thumbnail: Vec<String>,
    pub enclosures: Vec<Enclosure>,
}

/// A canonical article as published in the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    /// Fingerprint derived from `url`.
    pub id: String,
    pub title: String,
    pub description: String,
    pub url: String,
    /// Display name of the source that produced the article.
    pub source: String,
    /// Absolute image URL, or empty when none was found.
    pub image: String,
    pub published: DateTime<Utc>,
    pub location: String,
    pub category: String,
    pub fetched_at: DateTime<Utc>,
}

/// Frequency tables over the final article set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub by_location: BTreeMap<String, usize>,
    pub by_category: BTreeMap<String, usize>,
    pub source_count: usize,
}

/// The document written at the end of a run.
///
/// A snapshot fully replaces the previous one; nothing is merged across runs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub last_updated: DateTime<Utc>,
    pub total_articles: usize,
    /// Newest `published` first.
    pub articles: Vec<Article>,
    /// Distinct source names present in `articles`, sorted.
    pub sources: Vec<String>,
    pub stats: Stats,
}

impl Snapshot {
    /// A valid snapshot with no articles.
    pub fn empty(last_updated: DateTime<Utc>) -> Self {
        Self {
            last_updated,
            total_articles: 0,
            articles: Vec::new(),
            sources: Vec::new(),
            stats: Stats::default(),
        }
    }
}
