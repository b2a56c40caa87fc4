//! Dexscreener wire types.

pub mod pair;

pub use pair::{Liquidity, Pair, SearchResponse, Token, TxnCount, TxnWindows, Windows};
