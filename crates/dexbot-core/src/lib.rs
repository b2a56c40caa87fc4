//! Core domain + application logic for dexbot.
//!
//! This crate is framework-agnostic. The Dexscreener HTTP API and Telegram live
//! behind ports (traits) implemented in adapter crates.

pub mod config;
pub mod domain;
pub mod errors;
pub mod formatting;
pub mod logging;
pub mod messaging;
pub mod model;
pub mod ports;
pub mod report;
pub mod scan;
pub mod security;
pub mod watcher;

pub use errors::{Error, Result};
