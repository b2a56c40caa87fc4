use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize tracing for a dexbot binary.
///
/// Logs go to stderr; stdout is reserved for the scan report. `RUST_LOG`
/// overrides the default filter entirely.
pub fn init(service_name: &str, level: Option<&str>) -> Result<()> {
    let level = level.unwrap_or("info").to_lowercase();
    if !matches!(
        level.as_str(),
        "trace" | "debug" | "info" | "warn" | "error"
    ) {
        return Err(Error::Config(format!(
            "invalid log level '{level}' (expected trace, debug, info, warn or error)"
        )));
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,{service_name}={level},dexbot_core={level},dexbot_dexscreener={level},dexbot_telegram={level},hyper=warn,reqwest=warn"
        ))
    });

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::External(format!("logging init failed: {e}")))?;

    Ok(())
}
