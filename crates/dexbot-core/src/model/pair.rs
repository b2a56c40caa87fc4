use serde::{Deserialize, Deserializer};

/// Body of `GET /latest/dex/search`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub schema_version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub pairs: Vec<Pair>,
}

/// One liquidity pool as reported by Dexscreener.
///
/// The API omits (or nulls) fields freely, especially for young pairs, so
/// everything is optional or defaulted.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    #[serde(default)]
    pub chain_id: Option<String>,
    #[serde(default)]
    pub dex_id: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pair_address: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub base_token: Token,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quote_token: Token,
    #[serde(default)]
    pub price_native: Option<String>,
    #[serde(default)]
    pub price_usd: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub txns: TxnWindows,
    #[serde(default, deserialize_with = "null_as_default")]
    pub volume: Windows,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price_change: Windows,
    #[serde(default, deserialize_with = "null_as_default")]
    pub liquidity: Liquidity,
    #[serde(default)]
    pub fdv: Option<f64>,
    #[serde(default)]
    pub market_cap: Option<f64>,
    /// Unix timestamp in milliseconds.
    #[serde(default)]
    pub pair_created_at: Option<i64>,
}

impl Pair {
    pub fn is_on_chain(&self, chain_id: &str) -> bool {
        self.chain_id.as_deref() == Some(chain_id)
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Token {
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct TxnWindows {
    #[serde(default, deserialize_with = "null_as_default")]
    pub m5: TxnCount,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h1: TxnCount,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h6: TxnCount,
    #[serde(default, deserialize_with = "null_as_default")]
    pub h24: TxnCount,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct TxnCount {
    #[serde(default, deserialize_with = "null_as_default")]
    pub buys: u64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sells: u64,
}

impl TxnCount {
    pub fn total(&self) -> u64 {
        self.buys.saturating_add(self.sells)
    }
}

/// Per-window numeric stats (`volume`, `priceChange`).
#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Windows {
    #[serde(default)]
    pub m5: Option<f64>,
    #[serde(default)]
    pub h1: Option<f64>,
    #[serde(default)]
    pub h6: Option<f64>,
    #[serde(default)]
    pub h24: Option<f64>,
}

#[derive(Clone, Copy, Debug, Default, Deserialize)]
pub struct Liquidity {
    #[serde(default)]
    pub usd: Option<f64>,
    #[serde(default)]
    pub base: Option<f64>,
    #[serde(default)]
    pub quote: Option<f64>,
}

fn null_as_default<'de, D, T>(d: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(d)?.unwrap_or_default())
}
