use std::{env, fs, path::Path, time::Duration};

use crate::{errors::Error, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.dexscreener.com";
pub const MAX_REPORT_LIMIT: usize = 30;
const MIN_WATCH_INTERVAL_SECS: u64 = 10;
const MIN_HTTP_TIMEOUT_MS: u64 = 500;

/// Typed configuration, read from the environment (and an optional `.env`).
///
/// The scan path needs nothing beyond the defaults. Telegram keys are only
/// checked by [`Config::require_telegram`] when the bot is started.
#[derive(Clone, Debug)]
pub struct Config {
    // Dexscreener
    pub dexscreener_base_url: String,
    pub search_query: String,
    pub chain_id: String,
    pub report_limit: usize,
    pub http_timeout: Duration,

    // Telegram
    pub telegram_bot_token: String,
    pub telegram_allowed_users: Vec<i64>,
    pub telegram_safe_limit: usize,

    // Watcher
    pub watch_interval: Duration,
    pub watch_auto_subscribe: bool,

    // Rate limiting
    pub rate_limit_enabled: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dexscreener_base_url: DEFAULT_BASE_URL.to_string(),
            search_query: "solana".to_string(),
            chain_id: "solana".to_string(),
            report_limit: 10,
            http_timeout: Duration::from_millis(10_000),
            telegram_bot_token: String::new(),
            telegram_allowed_users: Vec::new(),
            telegram_safe_limit: 4000,
            watch_interval: Duration::from_secs(60),
            watch_auto_subscribe: false,
            rate_limit_enabled: true,
            rate_limit_requests: 10,
            rate_limit_window: Duration::from_secs(60),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary key lookup (the process env in `load`).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).and_then(non_empty);

        let dexscreener_base_url = get("DEXSCREENER_BASE_URL")
            .map(|s| s.trim().trim_end_matches('/').to_string())
            .unwrap_or(defaults.dexscreener_base_url);
        if !dexscreener_base_url.starts_with("http://")
            && !dexscreener_base_url.starts_with("https://")
        {
            return Err(Error::Config(format!(
                "DEXSCREENER_BASE_URL must be an http(s) URL, got '{dexscreener_base_url}'"
            )));
        }

        let search_query = get("DEXSCREENER_QUERY")
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.search_query);
        let chain_id = get("DEX_CHAIN_ID")
            .map(|s| s.trim().to_lowercase())
            .unwrap_or(defaults.chain_id);

        let report_limit = parse_opt::<usize>(get("REPORT_LIMIT"), "REPORT_LIMIT")?
            .unwrap_or(defaults.report_limit)
            .clamp(1, MAX_REPORT_LIMIT);
        let http_timeout = parse_opt::<u64>(get("HTTP_TIMEOUT_MS"), "HTTP_TIMEOUT_MS")?
            .map(|ms| Duration::from_millis(ms.max(MIN_HTTP_TIMEOUT_MS)))
            .unwrap_or(defaults.http_timeout);

        let telegram_bot_token = get("TELEGRAM_BOT_TOKEN")
            .map(|s| s.trim().to_string())
            .unwrap_or_default();
        let telegram_allowed_users = parse_csv_i64(get("TELEGRAM_ALLOWED_USERS"));
        let telegram_safe_limit =
            parse_opt::<usize>(get("TELEGRAM_SAFE_LIMIT"), "TELEGRAM_SAFE_LIMIT")?
                .unwrap_or(defaults.telegram_safe_limit)
                .clamp(200, 4096);

        let watch_interval = parse_opt::<u64>(get("WATCH_INTERVAL_SECS"), "WATCH_INTERVAL_SECS")?
            .map(|s| Duration::from_secs(s.max(MIN_WATCH_INTERVAL_SECS)))
            .unwrap_or(defaults.watch_interval);
        let watch_auto_subscribe = get("WATCH_AUTO_SUBSCRIBE")
            .map(|s| parse_bool(&s))
            .unwrap_or(defaults.watch_auto_subscribe);

        let rate_limit_enabled = get("RATE_LIMIT_ENABLED")
            .map(|s| parse_bool(&s))
            .unwrap_or(defaults.rate_limit_enabled);
        let rate_limit_requests =
            parse_opt::<u32>(get("RATE_LIMIT_REQUESTS"), "RATE_LIMIT_REQUESTS")?
                .unwrap_or(defaults.rate_limit_requests);
        let rate_limit_window = parse_opt::<u64>(get("RATE_LIMIT_WINDOW"), "RATE_LIMIT_WINDOW")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        Ok(Self {
            dexscreener_base_url,
            search_query,
            chain_id,
            report_limit,
            http_timeout,
            telegram_bot_token,
            telegram_allowed_users,
            telegram_safe_limit,
            watch_interval,
            watch_auto_subscribe,
            rate_limit_enabled,
            rate_limit_requests,
            rate_limit_window,
        })
    }

    /// Validate the keys the Telegram bot cannot start without.
    pub fn require_telegram(&self) -> Result<()> {
        if self.telegram_bot_token.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_BOT_TOKEN environment variable is required".to_string(),
            ));
        }
        if self.telegram_allowed_users.is_empty() {
            return Err(Error::Config(
                "TELEGRAM_ALLOWED_USERS environment variable is required".to_string(),
            ));
        }
        Ok(())
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_opt<T: std::str::FromStr>(v: Option<String>, key: &str) -> Result<Option<T>> {
    let Some(v) = v else {
        return Ok(None);
    };
    v.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|_| Error::Config(format!("{key} has an invalid value: '{v}'")))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_csv_i64(v: Option<String>) -> Vec<i64> {
    v.unwrap_or_default()
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<i64>().ok())
        .collect()
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_need_no_env() {
        let cfg = from_pairs(&[]).unwrap();
        assert_eq!(cfg.dexscreener_base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.search_query, "solana");
        assert_eq!(cfg.chain_id, "solana");
        assert_eq!(cfg.report_limit, 10);
        assert!(cfg.require_telegram().is_err());
    }

    #[test]
    fn reads_and_clamps_values() {
        let cfg = from_pairs(&[
            ("DEXSCREENER_BASE_URL", "http://localhost:8080/"),
            ("DEX_CHAIN_ID", " Base "),
            ("REPORT_LIMIT", "500"),
            ("WATCH_INTERVAL_SECS", "1"),
            ("HTTP_TIMEOUT_MS", "0"),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("TELEGRAM_ALLOWED_USERS", "1, 2,x,3"),
            ("WATCH_AUTO_SUBSCRIBE", "yes"),
        ])
        .unwrap();

        assert_eq!(cfg.dexscreener_base_url, "http://localhost:8080");
        assert_eq!(cfg.chain_id, "base");
        assert_eq!(cfg.report_limit, MAX_REPORT_LIMIT);
        assert_eq!(cfg.watch_interval, Duration::from_secs(10));
        assert_eq!(cfg.http_timeout, Duration::from_millis(500));
        assert_eq!(cfg.telegram_allowed_users, vec![1, 2, 3]);
        assert!(cfg.watch_auto_subscribe);
        assert!(cfg.require_telegram().is_ok());
    }

    #[test]
    fn rejects_garbage_numbers_and_urls() {
        assert!(from_pairs(&[("HTTP_TIMEOUT_MS", "soon")]).is_err());
        assert!(from_pairs(&[("DEXSCREENER_BASE_URL", "ftp://x")]).is_err());
    }

    #[test]
    fn strips_dotenv_quotes() {
        assert_eq!(strip_quotes("\"abc\""), "abc");
        assert_eq!(strip_quotes("'abc'"), "abc");
        assert_eq!(strip_quotes("\"abc"), "\"abc");
    }
}
