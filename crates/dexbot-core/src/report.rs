//! Pair summaries and scan reports (display-ready projections of the wire types).

use chrono::{DateTime, Utc};

use crate::model::{Pair, SearchResponse};

const UNKNOWN: &str = "Unknown";
const MS_PER_HOUR: f64 = 3_600_000.0;

/// Keep pairs listed on `chain_id` (exact match), preserving response order.
pub fn filter_chain<'a>(pairs: &'a [Pair], chain_id: &str) -> Vec<&'a Pair> {
    pairs.iter().filter(|p| p.is_on_chain(chain_id)).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub struct PairSummary {
    pub name: String,
    pub symbol: String,
    pub liquidity_usd: f64,
    pub fdv: f64,
    pub market_cap: f64,
    pub volume_24h: f64,
    pub txns_1h: u64,
    pub txns_24h: u64,
    /// Hours since the pair was created; `None` when Dexscreener has no stamp.
    pub age_hours: Option<f64>,
    pub pair_address: Option<String>,
    pub url: Option<String>,
}

impl PairSummary {
    pub fn from_pair(pair: &Pair, now: DateTime<Utc>) -> Self {
        let base = &pair.base_token;
        Self {
            name: base.name.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            symbol: base.symbol.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            liquidity_usd: pair.liquidity.usd.unwrap_or(0.0),
            fdv: pair.fdv.unwrap_or(0.0),
            market_cap: pair.market_cap.unwrap_or(0.0),
            volume_24h: pair.volume.h24.unwrap_or(0.0),
            txns_1h: pair.txns.h1.total(),
            txns_24h: pair.txns.h24.total(),
            age_hours: age_hours(pair.pair_created_at, now),
            pair_address: pair.pair_address.clone(),
            url: pair.url.clone(),
        }
    }
}

/// A zero stamp counts as missing; a stamp in the future yields a negative age.
fn age_hours(created_at_ms: Option<i64>, now: DateTime<Utc>) -> Option<f64> {
    let created = created_at_ms.filter(|ms| *ms != 0)?;
    let diff_ms = now.timestamp_millis().saturating_sub(created);
    Some(diff_ms as f64 / MS_PER_HOUR)
}

/// Result of one successful search, filtered to a chain.
#[derive(Clone, Debug, PartialEq)]
pub struct ScanReport {
    pub chain_id: String,
    pub limit: usize,
    pub total_pairs: usize,
    pub chain_pairs: usize,
    pub summaries: Vec<PairSummary>,
}

impl ScanReport {
    pub fn build(resp: &SearchResponse, chain_id: &str, limit: usize, now: DateTime<Utc>) -> Self {
        let on_chain = filter_chain(&resp.pairs, chain_id);
        let summaries = on_chain
            .iter()
            .take(limit)
            .map(|p| PairSummary::from_pair(p, now))
            .collect();

        Self {
            chain_id: chain_id.to_string(),
            limit,
            total_pairs: resp.pairs.len(),
            chain_pairs: on_chain.len(),
            summaries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Liquidity, Token, TxnCount, TxnWindows};
    use chrono::TimeZone;

    fn pair(chain: &str, symbol: &str) -> Pair {
        Pair {
            chain_id: Some(chain.to_string()),
            pair_address: Some(format!("{chain}-{symbol}")),
            base_token: Token {
                address: None,
                name: Some(format!("{symbol} token")),
                symbol: Some(symbol.to_string()),
            },
            ..Default::default()
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.timestamp_millis_opt(1_700_000_000_000).unwrap()
    }

    #[test]
    fn filter_keeps_order_and_exact_chain() {
        let pairs = vec![
            pair("solana", "A"),
            pair("ethereum", "B"),
            pair("solana", "C"),
            pair("SOLANA", "D"),
        ];
        let kept: Vec<_> = filter_chain(&pairs, "solana")
            .into_iter()
            .map(|p| p.base_token.symbol.clone().unwrap())
            .collect();
        assert_eq!(kept, vec!["A", "C"]);
    }

    #[test]
    fn summary_defaults_for_sparse_pair() {
        let s = PairSummary::from_pair(&Pair::default(), now());
        assert_eq!(s.name, "Unknown");
        assert_eq!(s.symbol, "Unknown");
        assert_eq!(s.liquidity_usd, 0.0);
        assert_eq!(s.fdv, 0.0);
        assert_eq!(s.market_cap, 0.0);
        assert_eq!(s.volume_24h, 0.0);
        assert_eq!(s.txns_1h, 0);
        assert_eq!(s.txns_24h, 0);
        assert_eq!(s.age_hours, None);
    }

    #[test]
    fn summary_sums_txns_and_computes_age() {
        let mut p = pair("solana", "BONK");
        p.txns = TxnWindows {
            h1: TxnCount { buys: 7, sells: 3 },
            h24: TxnCount {
                buys: 100,
                sells: 50,
            },
            ..Default::default()
        };
        p.liquidity = Liquidity {
            usd: Some(42.0),
            ..Default::default()
        };
        // 90 minutes before `now`.
        p.pair_created_at = Some(1_700_000_000_000 - 5_400_000);

        let s = PairSummary::from_pair(&p, now());
        assert_eq!(s.txns_1h, 10);
        assert_eq!(s.txns_24h, 150);
        assert_eq!(s.liquidity_usd, 42.0);
        assert_eq!(s.age_hours, Some(1.5));
    }

    #[test]
    fn zero_creation_stamp_is_unknown_and_future_is_negative() {
        assert_eq!(age_hours(Some(0), now()), None);
        assert_eq!(
            age_hours(Some(1_700_000_000_000 + 3_600_000), now()),
            Some(-1.0)
        );
    }

    #[test]
    fn report_counts_and_truncates() {
        let mut pairs: Vec<Pair> = (0..15).map(|i| pair("solana", &format!("T{i}"))).collect();
        pairs.insert(3, pair("bsc", "X"));
        let resp = SearchResponse {
            schema_version: None,
            pairs,
        };

        let r = ScanReport::build(&resp, "solana", 10, now());
        assert_eq!(r.total_pairs, 16);
        assert_eq!(r.chain_pairs, 15);
        assert_eq!(r.summaries.len(), 10);
        assert_eq!(r.summaries[0].symbol, "T0");
        assert_eq!(r.summaries[3].symbol, "T3");
    }
}
