//! NewsAPI.org-shaped JSON payloads.
//!
//! ```json
//! { "status": "ok", "totalResults": 1,
//!   "articles": [{ "title": "...", "url": "...", "description": "...",
//!                  "urlToImage": "...", "publishedAt": "2025-05-06T14:30:00Z" }] }
//! ```
//!
//! A `status` other than `"ok"` (bad key, rate limit) is a per-source failure
//! carrying the API's own message.

use crate::fetch::FetchError;
use crate::models::RawEntry;
use crate::utils::parse_timestamp;
use serde::Deserialize;

/// Placeholder NewsAPI substitutes for withdrawn articles.
const REMOVED: &str = "[Removed]";

#[derive(Debug, Deserialize)]
struct Response {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    title: Option<String>,
    url: Option<String>,
    description: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

pub fn parse_newsapi(bytes: &[u8]) -> Result<Vec<RawEntry>, FetchError> {
    let response: Response =
        serde_json::from_slice(bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

    if response.status != "ok" {
        let reason = response
            .message
            .or(response.code)
            .unwrap_or_else(|| format!("status {}", response.status));
        return Err(FetchError::Parse(reason));
    }

    Ok(response.articles.into_iter().map(raw_entry).collect())
}

fn raw_entry(article: ApiArticle) -> RawEntry {
    RawEntry {
        link: article.url,
        title: article.title.filter(|t| t != REMOVED),
        summary: article.description,
        content: article.content,
        published: article.published_at.as_deref().and_then(parse_timestamp),
        media_content: article.url_to_image.into_iter().collect(),
        ..RawEntry::default()
    }
}
