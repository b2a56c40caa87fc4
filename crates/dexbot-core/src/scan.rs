//! The scan use case shared by the CLI and the bot.

use chrono::{DateTime, Utc};

use crate::{ports::PairSource, report::ScanReport, Result};

/// Parameters of one scan.
#[derive(Clone, Debug)]
pub struct ScanRequest {
    pub query: String,
    pub chain_id: String,
    pub limit: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ScanOutcome {
    Report { status: u16, report: ScanReport },
    BadStatus { status: u16 },
}

impl ScanOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ScanOutcome::Report { .. })
    }
}

pub async fn run_scan(
    source: &dyn PairSource,
    req: &ScanRequest,
    now: DateTime<Utc>,
) -> Result<ScanOutcome> {
    tracing::debug!(query = %req.query, chain = %req.chain_id, "searching pairs");
    let outcome = source.search_pairs(&req.query).await?;

    let Some(resp) = outcome.response.filter(|_| outcome.status == 200) else {
        tracing::warn!(status = outcome.status, "search returned error status");
        return Ok(ScanOutcome::BadStatus {
            status: outcome.status,
        });
    };

    let report = ScanReport::build(&resp, &req.chain_id, req.limit, now);
    tracing::info!(
        total = report.total_pairs,
        on_chain = report.chain_pairs,
        "scan complete"
    );
    Ok(ScanOutcome::Report {
        status: outcome.status,
        report,
    })
}
