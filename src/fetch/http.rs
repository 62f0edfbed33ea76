//! HTTP implementation of [`Fetch`] on top of `reqwest`.

use super::{Fetch, FetchError, RawFetchResult, RawPayload};
use crate::config::Settings;
use crate::models::{Source, SourceKind};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, instrument};
use url::Url;

const ACCEPT_FEED: &str =
    "application/rss+xml, application/atom+xml, application/xml;q=0.9, text/xml;q=0.9, */*;q=0.8";
const ACCEPT_JSON: &str = "application/json";
const API_KEY_HEADER: &str = "X-Api-Key";

/// Fetches sources over HTTP with one shared connection pool.
///
/// The client-level timeout bounds each request. API sources send the
/// configured key as a header; without a key they fail fast with
/// [`FetchError::MissingCredential`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    api_key: Option<String>,
}

impl HttpFetcher {
    pub fn new(settings: &Settings, api_key: Option<String>) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .timeout(settings.request_timeout())
            .gzip(true)
            .build()?;
        let api_key = api_key.filter(|k| !k.trim().is_empty());
        Ok(Self { client, api_key })
    }
}

impl Fetch for HttpFetcher {
    #[instrument(level = "debug", skip_all, fields(source = %source.name, kind = %source.kind))]
    async fn fetch(&self, source: &Source) -> RawFetchResult {
        let url = parse_endpoint(&source.endpoint)?;

        let request = match source.kind {
            SourceKind::Feed => self.client.get(url).header(ACCEPT, ACCEPT_FEED),
            SourceKind::Api => {
                let key = self.api_key.as_deref().ok_or(FetchError::MissingCredential)?;
                self.client
                    .get(url)
                    .header(ACCEPT, ACCEPT_JSON)
                    .header(API_KEY_HEADER, key)
            }
        };

        let response = request.send().await.map_err(from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.map_err(from_reqwest)?;
        debug!(bytes = bytes.len(), ?content_type, "Fetched payload");

        Ok(RawPayload {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}

/// Endpoints must be absolute http(s) URLs.
fn parse_endpoint(endpoint: &str) -> Result<Url, FetchError> {
    let url = Url::parse(endpoint).map_err(|e| FetchError::InvalidUrl(e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(FetchError::InvalidUrl(format!("unsupported scheme {other}"))),
    }
}

fn from_reqwest(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout
    } else if e.is_builder() {
        FetchError::InvalidUrl(e.without_url().to_string())
    } else if let Some(status) = e.status() {
        FetchError::Http {
            status: status.as_u16(),
        }
    } else {
        FetchError::Network(e.without_url().to_string())
    }
}
