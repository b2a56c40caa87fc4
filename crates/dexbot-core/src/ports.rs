use async_trait::async_trait;

use crate::{model::SearchResponse, Result};

/// Raw answer to a pair search.
///
/// A non-success HTTP status is an outcome rather than an error so callers can
/// report it verbatim; `response` is only present for status 200.
#[derive(Clone, Debug, Default)]
pub struct SearchOutcome {
    pub status: u16,
    pub response: Option<SearchResponse>,
}

/// Hexagonal port for a pair-search backend.
///
/// `dexbot-dexscreener` implements it over HTTP; tests use in-memory fakes.
#[async_trait]
pub trait PairSource: Send + Sync {
    async fn search_pairs(&self, query: &str) -> Result<SearchOutcome>;
}
