//! Dexscreener adapter.
//!
//! Implements the `dexbot-core` PairSource port over the public
//! `latest/dex/search` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header::RETRY_AFTER, StatusCode};

use dexbot_core::{
    errors::Error,
    model::SearchResponse,
    ports::{PairSource, SearchOutcome},
    Result,
};

const SEARCH_PATH: &str = "/latest/dex/search";
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);
const MAX_RETRY_AFTER: Duration = Duration::from_secs(10);
const USER_AGENT: &str = concat!("dexbot/", env!("CARGO_PKG_VERSION"));

#[derive(Clone, Debug)]
pub struct DexscreenerClient {
    base_url: String,
    http: reqwest::Client,
}

impl DexscreenerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::Http(format!("client build failed: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn search_url(&self) -> String {
        format!("{}{SEARCH_PATH}", self.base_url)
    }

    async fn send_search(&self, query: &str) -> Result<reqwest::Response> {
        self.http
            .get(self.search_url())
            .query(&[("q", query)])
            .send()
            .await
            .map_err(|e| Error::Http(format!("dexscreener request error: {e}")))
    }
}

#[async_trait]
impl PairSource for DexscreenerClient {
    async fn search_pairs(&self, query: &str) -> Result<SearchOutcome> {
        let mut resp = self.send_search(query).await?;

        // One retry on 429, honoring Retry-After (capped).
        if resp.status() == StatusCode::TOO_MANY_REQUESTS {
            let wait = retry_after(
                resp.headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok()),
            );
            tracing::warn!(wait_ms = wait.as_millis() as u64, "dexscreener rate limited, retrying once");
            tokio::time::sleep(wait).await;
            resp = self.send_search(query).await?;
        }

        let status = resp.status();
        tracing::debug!(status = status.as_u16(), "dexscreener responded");

        if status != StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            tracing::debug!(
                status = status.as_u16(),
                body = %body.chars().take(200).collect::<String>(),
                "dexscreener error body"
            );
            return Ok(SearchOutcome {
                status: status.as_u16(),
                response: None,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| Error::Http(format!("dexscreener body error: {e}")))?;
        let parsed = decode_search(&bytes)?;

        Ok(SearchOutcome {
            status: status.as_u16(),
            response: Some(parsed),
        })
    }
}

fn decode_search(bytes: &[u8]) -> Result<SearchResponse> {
    serde_json::from_slice(bytes).map_err(|e| Error::Decode(format!("dexscreener json error: {e}")))
}

/// Parse a `Retry-After` header given in seconds.
fn retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_RETRY_AFTER)
        .min(MAX_RETRY_AFTER)
}
