//! Turning fetched payloads into [`RawEntry`] lists.
//!
//! | Kind | Module | Parser |
//! |------|--------|--------|
//! | `feed` | [`feed`] | `feed-rs` (RSS 0.9x/1.0/2.0, Atom, JSON Feed) |
//! | `api` | [`newsapi`] | `serde_json`, NewsAPI.org response shape |
//!
//! Parse failures are reported as [`FetchError::Parse`] so that they follow
//! the same per-source handling as network failures.

pub mod feed;
pub mod newsapi;

use crate::fetch::{FetchError, RawPayload};
use crate::models::{RawEntry, Source, SourceKind};

/// Parse a payload according to the source's kind.
pub fn parse_payload(source: &Source, payload: &RawPayload) -> Result<Vec<RawEntry>, FetchError> {
    match source.kind {
        SourceKind::Feed => feed::parse_feed(&payload.bytes).map_err(|e| {
            // moved feeds often answer with an HTML landing page
            match payload.content_type.as_deref() {
                Some(ct) if ct.starts_with("text/html") => {
                    FetchError::Parse(format!("expected a feed, got {ct}"))
                }
                _ => e,
            }
        }),
        SourceKind::Api => newsapi::parse_newsapi(&payload.bytes),
    }
}
