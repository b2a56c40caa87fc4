use std::{
    io::{self, Write},
    process::ExitCode,
    sync::Arc,
};

use chrono::Utc;
use clap::{error::ErrorKind, Args, CommandFactory, Parser, Subcommand};

use dexbot_core::{
    config::{Config, MAX_REPORT_LIMIT},
    formatting::{render_console, render_console_banner, render_console_failure},
    ports::PairSource,
    scan::{run_scan, ScanRequest},
};
use dexbot_dexscreener::DexscreenerClient;

/// Dexscreener pair scanner and Telegram bot.
#[derive(Parser, Debug)]
#[command(name = "dexbot", version, about)]
struct CliArgs {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    scan: ScanArgs,

    #[arg(long, global = true, value_name = "LEVEL", help = "Set logging level")]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch pairs once and print a report (default)
    Scan(ScanArgs),
    /// Run the Telegram bot (long polling)
    Bot,
}

#[derive(Args, Debug, Default)]
struct ScanArgs {
    #[arg(short, long, help = "Search query (defaults to DEXSCREENER_QUERY)")]
    query: Option<String>,

    #[arg(short, long, help = "Chain id to keep (defaults to DEX_CHAIN_ID)")]
    chain: Option<String>,

    #[arg(short, long, help = "Number of pairs to print (defaults to REPORT_LIMIT)")]
    limit: Option<usize>,
}

impl ScanArgs {
    fn is_empty(&self) -> bool {
        self.query.is_none() && self.chain.is_none() && self.limit.is_none()
    }

    /// Flags given after `scan` win over the ones given before it.
    fn or(self, outer: ScanArgs) -> ScanArgs {
        ScanArgs {
            query: self.query.or(outer.query),
            chain: self.chain.or(outer.chain),
            limit: self.limit.or(outer.limit),
        }
    }
}

impl CliArgs {
    /// The command to run; scan flags without a subcommand mean `scan`.
    fn resolve(self) -> Result<Commands, clap::Error> {
        match self.command {
            None => Ok(Commands::Scan(self.scan)),
            Some(Commands::Scan(inner)) => Ok(Commands::Scan(inner.or(self.scan))),
            Some(Commands::Bot) if !self.scan.is_empty() => Err(CliArgs::command().error(
                ErrorKind::ArgumentConflict,
                "--query, --chain and --limit only apply to scan",
            )),
            Some(Commands::Bot) => Ok(Commands::Bot),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = CliArgs::parse();
    let log_level = args.log_level.clone();
    let command = match args.resolve() {
        Ok(command) => command,
        Err(e) => e.exit(),
    };

    if let Err(e) = dexbot_core::logging::init("dexbot", log_level.as_deref()) {
        eprintln!("{e}");
        return ExitCode::from(2);
    }

    let cfg = match Config::load() {
        Ok(cfg) => Arc::new(cfg),
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            eprintln!("{e}");
            return ExitCode::from(2);
        }
    };

    let client = match DexscreenerClient::new(cfg.dexscreener_base_url.clone(), cfg.http_timeout) {
        Ok(c) => Arc::new(c),
        Err(e) => {
            eprintln!("{e}");
            return ExitCode::FAILURE;
        }
    };

    match command {
        Commands::Scan(scan_args) => scan(&cfg, client.as_ref(), scan_args).await,
        Commands::Bot => match dexbot_telegram::router::run_polling(cfg, client).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "telegram bot failed");
                eprintln!("telegram bot failed: {e}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn scan(cfg: &Config, source: &dyn PairSource, args: ScanArgs) -> ExitCode {
    let req = ScanRequest {
        query: args.query.unwrap_or_else(|| cfg.search_query.clone()),
        chain_id: args
            .chain
            .map(|c| c.trim().to_lowercase())
            .unwrap_or_else(|| cfg.chain_id.clone()),
        limit: args
            .limit
            .unwrap_or(cfg.report_limit)
            .clamp(1, MAX_REPORT_LIMIT),
    };

    let mut stdout = std::io::stdout().lock();
    // The banner goes out before the request so a slow API is visible.
    if let Err(e) = write_flushed(&mut stdout, &render_console_banner()) {
        return stdout_failed(e);
    }

    let (text, ok) = match run_scan(source, &req, Utc::now()).await {
        Ok(outcome) => (render_console(&outcome), outcome.is_success()),
        Err(e) => {
            tracing::debug!(error = ?e, "scan failed");
            (render_console_failure(&e), false)
        }
    };

    for line in text.split_inclusive('\n') {
        if let Err(e) = write_flushed(&mut stdout, line) {
            return stdout_failed(e);
        }
    }

    if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn write_flushed(out: &mut impl Write, text: &str) -> io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn stdout_failed(e: io::Error) -> ExitCode {
    if e.kind() == io::ErrorKind::BrokenPipe {
        tracing::debug!("stdout closed");
    } else {
        tracing::error!(error = %e, "failed to write report");
    }
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_subcommand_means_scan() {
        let args = CliArgs::try_parse_from(["dexbot"]).unwrap();
        assert!(args.command.is_none());
        assert!(args.log_level.is_none());
    }

    #[test]
    fn scan_flags_parse() {
        let args = CliArgs::try_parse_from([
            "dexbot",
            "scan",
            "--query",
            "bonk",
            "-c",
            "base",
            "-l",
            "3",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let Some(Commands::Scan(scan)) = args.command else {
            panic!("expected scan");
        };
        assert_eq!(scan.query.as_deref(), Some("bonk"));
        assert_eq!(scan.chain.as_deref(), Some("base"));
        assert_eq!(scan.limit, Some(3));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
    }

    fn resolve(argv: &[&str]) -> Result<Commands, clap::Error> {
        CliArgs::try_parse_from(argv)?.resolve()
    }

    #[test]
    fn scan_flags_work_without_subcommand() {
        let Ok(Commands::Scan(scan)) = resolve(&["dexbot", "--query", "bonk", "--limit", "3"])
        else {
            panic!("expected scan");
        };
        assert_eq!(scan.query.as_deref(), Some("bonk"));
        assert_eq!(scan.limit, Some(3));
        assert!(scan.chain.is_none());
    }

    #[test]
    fn flags_after_scan_win() {
        let Ok(Commands::Scan(scan)) =
            resolve(&["dexbot", "-q", "outer", "-c", "base", "scan", "-q", "inner"])
        else {
            panic!("expected scan");
        };
        assert_eq!(scan.query.as_deref(), Some("inner"));
        assert_eq!(scan.chain.as_deref(), Some("base"));
    }

    #[test]
    fn scan_flags_conflict_with_bot() {
        let err = resolve(&["dexbot", "--query", "bonk", "bot"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ArgumentConflict);
        assert!(matches!(
            resolve(&["dexbot", "--log-level", "debug", "bot"]),
            Ok(Commands::Bot)
        ));
    }

    #[test]
    fn writes_are_flushed_and_errors_surface() {
        struct Closed;
        impl Write for Closed {
            fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut buf = Vec::new();
        write_flushed(&mut buf, "line\n").unwrap();
        assert_eq!(buf, b"line\n");

        let err = write_flushed(&mut Closed, "line\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn bot_subcommand_parses() {
        let args = CliArgs::try_parse_from(["dexbot", "bot"]).unwrap();
        assert!(matches!(args.command, Some(Commands::Bot)));
        assert!(CliArgs::try_parse_from(["dexbot", "bot", "--query", "x"]).is_err());
    }
}
