//! Article fingerprints and cross-source deduplication.
//!
//! Two keys identify an article:
//! - the fingerprint `id`, a hash of the URL, and
//! - a prefix of the normalized, lower-cased title, which catches the same
//!   wire story published by two outlets under different URLs.
//!
//! An article is dropped if either key was already seen anywhere in the
//! candidate set. The title key can be disabled with a prefix length of 0.

use crate::models::Article;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Hex characters kept from the URL digest.
const FINGERPRINT_LEN: usize = 12;

/// Stable identity of an article; a function of the URL alone.
pub fn fingerprint(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest
        .iter()
        .take(FINGERPRINT_LEN / 2)
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Lower-cased, whitespace-collapsed title cut to `prefix_len` characters.
/// `None` when title matching is disabled or the title is blank.
pub fn title_key(title: &str, prefix_len: usize) -> Option<String> {
    if prefix_len == 0 {
        return None;
    }
    let key: String = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
        .chars()
        .take(prefix_len)
        .collect();
    (!key.is_empty()).then_some(key)
}

/// Tracks seen keys across the whole candidate set.
#[derive(Debug, Default)]
pub struct Deduper {
    prefix_len: usize,
    seen_ids: HashSet<String>,
    seen_titles: HashSet<String>,
}

impl Deduper {
    pub fn new(prefix_len: usize) -> Self {
        Self {
            prefix_len,
            ..Self::default()
        }
    }

    /// Record the article's keys; `false` if either key was seen before.
    /// A rejected article records nothing.
    pub fn insert(&mut self, article: &Article) -> bool {
        let title = title_key(&article.title, self.prefix_len);
        if self.seen_ids.contains(&article.id)
            || title.as_ref().is_some_and(|t| self.seen_titles.contains(t))
        {
            return false;
        }
        self.seen_ids.insert(article.id.clone());
        if let Some(title) = title {
            self.seen_titles.insert(title);
        }
        true
    }
}

/// Remove duplicates, keeping the first occurrence and the input order.
pub fn dedupe(articles: Vec<Article>, prefix_len: usize) -> Vec<Article> {
    let mut deduper = Deduper::new(prefix_len);
    articles
        .into_iter()
        .filter(|a| deduper.insert(a))
        .collect()
}
