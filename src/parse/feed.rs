//! Syndication feeds through `feed-rs`.
//!
//! `feed-rs` folds Media RSS elements and RSS `<enclosure>` elements into the
//! same `Entry::media` objects, so their origin is lost. The URLs of
//! `<enclosure>` elements are collected from the document first; media
//! content at one of those URLs, or with a non-image type, is reported as an
//! enclosure. Everything else is media content.

use crate::fetch::FetchError;
use crate::models::{Enclosure, RawEntry};
use feed_rs::model::Entry;
use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static RE_ENCLOSURE_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<enclosure\b[^>]*?\burl\s*=\s*["']([^"']+)["']"#).unwrap()
});

pub fn parse_feed(bytes: &[u8]) -> Result<Vec<RawEntry>, FetchError> {
    let feed = parser::parse(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;
    let enclosure_urls = enclosure_urls(bytes);
    Ok(feed
        .entries
        .into_iter()
        .map(|entry| raw_entry(entry, &enclosure_urls))
        .collect())
}

/// Absolute URLs of every RSS `<enclosure>` in the document, in the same
/// normalized form `feed-rs` reports.
fn enclosure_urls(bytes: &[u8]) -> HashSet<String> {
    let text = String::from_utf8_lossy(bytes);
    RE_ENCLOSURE_URL
        .captures_iter(&text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| Url::parse(&m.as_str().trim().replace("&amp;", "&")).ok())
        .map(|u| u.to_string())
        .collect()
}

fn raw_entry(entry: Entry, enclosure_urls: &HashSet<String>) -> RawEntry {
    let link = select_link(&entry);

    let mut media_content = Vec::new();
    let mut media_thumbnail = Vec::new();
    let mut enclosures = Vec::new();
    for media in &entry.media {
        for content in &media.content {
            let Some(url) = content.url.as_ref() else {
                continue;
            };
            let href = url.to_string();
            let mime = content.content_type.as_ref().map(|m| m.to_string());
            let is_image = mime.as_deref().is_none_or(|m| m.starts_with("image/"));
            if is_image && !enclosure_urls.contains(&href) {
                media_content.push(href);
            } else {
                enclosures.push(Enclosure { href, mime });
            }
        }
        for thumbnail in &media.thumbnails {
            media_thumbnail.push(thumbnail.image.uri.clone());
        }
    }
    for l in &entry.links {
        if l.rel.as_deref() == Some("enclosure") {
            enclosures.push(Enclosure {
                href: l.href.clone(),
                mime: l.media_type.clone(),
            });
        }
    }

    RawEntry {
        link,
        title: entry.title.map(|t| t.content),
        summary: entry.summary.map(|s| s.content),
        content: entry.content.and_then(|c| c.body),
        published: entry.published.or(entry.updated),
        media_content,
        media_thumbnail,
        enclosures,
    }
}

/// The article link: an alternate (or rel-less) link first, then any
/// non-enclosure link, then an http(s) entry id.
fn select_link(entry: &Entry) -> Option<String> {
    let candidates = || {
        entry
            .links
            .iter()
            .filter(|l| !l.href.trim().is_empty())
            .filter(|l| l.rel.as_deref() != Some("enclosure"))
    };
    if let Some(l) = candidates().find(|l| {
        l.rel
            .as_deref()
            .is_none_or(|r| r.eq_ignore_ascii_case("alternate"))
    }) {
        return Some(l.href.trim().to_string());
    }
    if let Some(l) = candidates().next() {
        return Some(l.href.trim().to_string());
    }
    let id = entry.id.trim();
    if id.starts_with("http://") || id.starts_with("https://") {
        return Some(id.to_string());
    }
    None
}
