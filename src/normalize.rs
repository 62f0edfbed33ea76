//! Entry normalization: raw feed/API entries to article candidates.
//!
//! A candidate has everything an [`Article`](crate::models::Article) needs
//! except the fields derived later in the pipeline (fingerprint, location,
//! category). Entries without a usable link or title are skipped one at a
//! time; they never fail the whole source.

use crate::config::Settings;
use crate::models::{RawEntry, Source};
use crate::utils::{collapse_whitespace, truncate_chars};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use tracing::debug;
use url::Url;

static RE_BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[[^\]]*\]").unwrap());
static RE_SUBMITTED_BY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)submitted\s+by\s+\S+(?:\s+to\s+\S+)?").unwrap());
static RE_IMG_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).unwrap());

/// A normalized entry, before classification and fingerprinting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub title: String,
    pub description: String,
    pub url: String,
    pub image: Option<String>,
    pub published: DateTime<Utc>,
}

/// Normalize the newest entries of one source.
///
/// At most `settings.per_source_limit` entries are considered, in feed order.
/// Entries with no timestamp are stamped with `fetched_at`.
pub fn normalize(
    source: &Source,
    entries: Vec<RawEntry>,
    settings: &Settings,
    fetched_at: DateTime<Utc>,
) -> Vec<Candidate> {
    let considered = entries.len().min(settings.per_source_limit);
    let candidates: Vec<Candidate> = entries
        .into_iter()
        .take(settings.per_source_limit)
        .filter_map(|entry| normalize_entry(entry, settings, fetched_at))
        .collect();

    if candidates.len() < considered {
        debug!(
            source = %source.name,
            skipped = considered - candidates.len(),
            "Skipped entries without a usable link or title"
        );
    }
    candidates
}

fn normalize_entry(
    entry: RawEntry,
    settings: &Settings,
    fetched_at: DateTime<Utc>,
) -> Option<Candidate> {
    let link = entry.link.as_deref().map(str::trim).filter(|l| !l.is_empty())?;
    let base = Url::parse(link)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https"))?;

    let title = collapse_whitespace(&strip_markup(entry.title.as_deref().unwrap_or_default()));
    if title.is_empty() {
        return None;
    }

    // a markup-only summary counts as missing
    let description = [entry.summary.as_deref(), entry.content.as_deref()]
        .into_iter()
        .flatten()
        .map(clean_html)
        .find(|d| !d.is_empty())
        .unwrap_or_default();

    Some(Candidate {
        title: truncate_chars(&title, settings.title_max_chars),
        description: truncate_chars(&description, settings.description_max_chars),
        url: link.to_string(),
        image: extract_image(&entry, &base),
        published: entry.published.unwrap_or(fetched_at),
    })
}

/// Text content of an HTML fragment, entities decoded.
fn strip_markup(html: &str) -> String {
    if !html.contains(['<', '&']) {
        return html.to_string();
    }
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect()
}

/// Plain-text description from feed HTML.
///
/// Drops markup, bracketed meta annotations such as `[link]` and
/// `[comments]`, and Reddit-style "submitted by /u/x to r/y" attributions,
/// then collapses whitespace.
pub fn clean_html(text: &str) -> String {
    let text = strip_markup(text);
    let text = RE_SUBMITTED_BY.replace_all(&text, " ");
    let text = RE_BRACKETED.replace_all(&text, " ");
    collapse_whitespace(&text)
}

/// Pick the entry's image; the first candidate that resolves to an absolute
/// http(s) URL wins.
///
/// Preference order: media content, media thumbnail, image-typed enclosure,
/// then the first `<img src>` in the body HTML and finally in the summary.
/// Relative URLs resolve against the article link.
pub fn extract_image(entry: &RawEntry, base: &Url) -> Option<String> {
    let enclosures = entry
        .enclosures
        .iter()
        .filter(|e| e.mime.as_deref().is_some_and(|m| m.contains("image")))
        .map(|e| e.href.as_str());
    let inline = [entry.content.as_deref(), entry.summary.as_deref()]
        .into_iter()
        .flatten()
        .filter_map(first_img_src);

    entry
        .media_content
        .iter()
        .map(String::as_str)
        .chain(entry.media_thumbnail.iter().map(String::as_str))
        .chain(enclosures)
        .chain(inline)
        .find_map(|raw| absolute_http_url(raw, base))
}

fn first_img_src(html: &str) -> Option<&str> {
    RE_IMG_SRC
        .captures(html)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn absolute_http_url(raw: &str, base: &Url) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}
