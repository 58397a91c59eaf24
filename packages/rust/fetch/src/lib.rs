//! Collaborators for the retrieval stage: search and page fetching.
//!
//! This crate provides:
//! - [`SearchProvider`] / [`PageFetcher`] — the capability interfaces the
//!   retrieval stage is written against
//! - [`HttpFetcher`] — `reqwest`-backed fetcher with SSRF protection
//! - [`JsonFileSearch`] — offline search provider reading saved hits

mod http;
mod search;

use std::future::Future;

use docsift_shared::{Result, SearchHit};

pub use http::{HttpFetcher, is_ssrf_target};
pub use search::JsonFileSearch;

/// A fetched page body plus the little metadata the retrieval stage uses.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPage {
    /// Final URL requested.
    pub url: String,
    /// Raw response body (HTML or text).
    pub body: String,
    /// `<title>` or first `<h1>`, when the body has one.
    pub title: Option<String>,
}

/// Runs a query against some search backend.
pub trait SearchProvider: Send + Sync {
    /// Return at most `limit` hits for `query`, best first.
    fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// Fetches the raw content behind a URL.
pub trait PageFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<FetchedPage>> + Send;
}
