//! Rendering of scan reports: plain console text and Telegram HTML.

use std::fmt::Write as _;

use crate::{
    report::{PairSummary, ScanReport},
    scan::ScanOutcome,
    Error,
};

const RULE: &str = "==================================================";

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Whole-dollar amount with `,` thousands separators, e.g. `$1,234,567`.
///
/// Small negatives that round to zero print `$0`, not the signed `$-0` the
/// original console report showed. Non-finite values also print `$0`.
pub fn format_usd(value: f64) -> String {
    if !value.is_finite() {
        return "$0".to_string();
    }

    let rounded = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(rounded.len() + rounded.len() / 3);
    for (i, ch) in rounded.chars().enumerate() {
        if i > 0 && (rounded.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    if value < 0.0 && rounded != "0" {
        format!("$-{grouped}")
    } else {
        format!("${grouped}")
    }
}

pub fn format_age(age_hours: Option<f64>) -> String {
    match age_hours {
        Some(h) => format!("{h:.1} hours"),
        None => "Unknown".to_string(),
    }
}

/// `solana` -> `Solana`.
pub fn chain_title(chain_id: &str) -> String {
    let mut chars = chain_id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Printed before the request is sent.
pub fn render_console_banner() -> String {
    format!("🔍 Testing Dexscreener API...\n{RULE}\n")
}

/// Console report for a completed request, following the banner.
pub fn render_console(outcome: &ScanOutcome) -> String {
    let mut out = String::new();

    let (status, report) = match outcome {
        ScanOutcome::Report { status, report } => (*status, report),
        ScanOutcome::BadStatus { status } => {
            let _ = writeln!(out, "📡 API Status: {status}");
            let _ = writeln!(out, "❌ API returned error status: {status}");
            return out;
        }
    };

    let title = chain_title(&report.chain_id);
    let _ = writeln!(out, "📡 API Status: {status}");
    let _ = writeln!(out, "✅ Total pairs fetched: {}", report.total_pairs);
    let _ = writeln!(out, "🔗 {title} pairs: {}", report.chain_pairs);

    if report.summaries.is_empty() {
        let _ = writeln!(out, "⚠️ No {title} pairs found in response");
        return out;
    }

    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(
        out,
        "📊 FIRST {} {} TOKENS:",
        report.limit,
        report.chain_id.to_uppercase()
    );
    let _ = writeln!(out, "{RULE}\n");

    for (i, s) in report.summaries.iter().enumerate() {
        let _ = writeln!(out, "#{} {} (${})", i + 1, s.name, s.symbol);
        let _ = writeln!(out, "   💧 Liquidity: {}", format_usd(s.liquidity_usd));
        let _ = writeln!(out, "   📊 FDV: {}", format_usd(s.fdv));
        let _ = writeln!(out, "   🏦 MCap: {}", format_usd(s.market_cap));
        let _ = writeln!(out, "   📈 24h Volume: {}", format_usd(s.volume_24h));
        let _ = writeln!(out, "   🔥 1H Txns: {}", s.txns_1h);
        let _ = writeln!(out, "   🔥 24H Txns: {}", s.txns_24h);
        let _ = writeln!(out, "   ⏱️  Age: {}", format_age(s.age_hours));
        out.push('\n');
    }

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "✅ TEST SUCCESSFUL - API is working!");
    let _ = writeln!(out, "{RULE}");
    out
}

/// Console output when the request itself failed (network, decode).
pub fn render_console_failure(err: &Error) -> String {
    format!("❌ Error: {err}\n")
}

fn pair_block_html(out: &mut String, heading: &str, s: &PairSummary) {
    let name = escape_html(&s.name);
    let symbol = escape_html(&s.symbol);
    match &s.url {
        Some(url) => {
            let _ = writeln!(
                out,
                "<b>{heading}<a href=\"{}\">{name}</a></b> (<code>${symbol}</code>)",
                escape_html(url)
            );
        }
        None => {
            let _ = writeln!(out, "<b>{heading}{name}</b> (<code>${symbol}</code>)");
        }
    }
    let _ = writeln!(out, "💧 Liquidity: {}", format_usd(s.liquidity_usd));
    let _ = writeln!(out, "📊 FDV: {}", format_usd(s.fdv));
    let _ = writeln!(out, "🏦 MCap: {}", format_usd(s.market_cap));
    let _ = writeln!(out, "📈 24h Volume: {}", format_usd(s.volume_24h));
    let _ = writeln!(out, "🔥 Txns 1h / 24h: {} / {}", s.txns_1h, s.txns_24h);
    let _ = writeln!(out, "⏱️ Age: {}", format_age(s.age_hours));
}

/// Telegram HTML for a completed request.
pub fn render_html(outcome: &ScanOutcome) -> String {
    let (status, report) = match outcome {
        ScanOutcome::Report { status, report } => (*status, report),
        ScanOutcome::BadStatus { status } => {
            return format!("❌ Dexscreener returned error status <code>{status}</code>");
        }
    };
    render_report_html(status, report)
}

fn render_report_html(status: u16, report: &ScanReport) -> String {
    let title = escape_html(&chain_title(&report.chain_id));
    let mut out = String::new();
    let _ = writeln!(
        out,
        "📡 Status <code>{status}</code> · {} pairs fetched · {} on {title}",
        report.total_pairs, report.chain_pairs
    );

    if report.summaries.is_empty() {
        let _ = writeln!(out, "\n⚠️ No {title} pairs found in response");
        return out;
    }

    let _ = writeln!(
        out,
        "\n<b>📊 First {} {title} tokens</b>",
        report.summaries.len()
    );
    for (i, s) in report.summaries.iter().enumerate() {
        out.push('\n');
        pair_block_html(&mut out, &format!("#{} ", i + 1), s);
    }
    out
}

/// Telegram HTML alert for a newly listed pair.
pub fn render_new_pair_html(chain_id: &str, s: &PairSummary) -> String {
    let mut out = format!(
        "🆕 <b>New {} pair</b>\n\n",
        escape_html(&chain_title(chain_id))
    );
    pair_block_html(&mut out, "", s);
    out
}

/// Split `text` on line boundaries into chunks of at most `limit` bytes.
///
/// A single line longer than `limit` is hard-split on a char boundary.
pub fn split_chunks(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.len() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();

    for line in text.split_inclusive('\n') {
        if chunk.len() + line.len() > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
        }
        if line.len() <= limit {
            chunk.push_str(line);
            continue;
        }

        let mut rest = line;
        while rest.len() > limit {
            let mut cut = limit;
            while !rest.is_char_boundary(cut) {
                cut -= 1;
            }
            if cut == 0 {
                // A single char wider than the limit: emit it whole.
                cut = rest.chars().next().map(|c| c.len_utf8()).unwrap_or(rest.len());
            }
            out.push(rest[..cut].to_string());
            rest = &rest[cut..];
        }
        chunk.push_str(rest);
    }

    if !chunk.trim().is_empty() {
        out.push(chunk);
    }
    out
}
