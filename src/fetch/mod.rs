//! Network access for sources.
//!
//! Every source is read through the [`Fetch`] trait. The production
//! implementation is [`http::HttpFetcher`]; [`retry::RetryFetch`] wraps any
//! implementation with a per-call timeout, bounded retries and cancellation.
//!
//! # Failure model
//!
//! A fetch never panics or propagates past the per-source boundary: callers
//! always get a [`RawFetchResult`]. Only [`FetchError::is_transient`] failures
//! are retried.

pub mod http;
pub mod retry;

use crate::models::Source;
use thiserror::Error;

/// Payload returned by a successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawPayload {
    pub bytes: Vec<u8>,
    /// `Content-Type` header, when the server sent one.
    pub content_type: Option<String>,
}

/// Why a source contributed nothing.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("timed out")]
    Timeout,
    #[error("HTTP {status}")]
    Http { status: u16 },
    #[error("network: {0}")]
    Network(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("no API key configured")]
    MissingCredential,
    #[error("cancelled")]
    Cancelled,
}

impl FetchError {
    /// Timeouts, connection failures and 5xx responses are worth another try.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::Timeout | FetchError::Network(_) => true,
            FetchError::Http { status } => *status >= 500,
            _ => false,
        }
    }
}

pub type RawFetchResult = Result<RawPayload, FetchError>;

/// Reads one source's payload.
pub trait Fetch {
    async fn fetch(&self, source: &Source) -> RawFetchResult;
}
