use chrono::Utc;

use dexbot_core::{
    domain::{ChatId, UserId},
    formatting::{chain_title, escape_html, render_html, split_chunks},
    messaging::types::ChatAction,
    scan::{run_scan, ScanRequest},
    Result,
};

use crate::router::AppState;

const MAX_QUERY_LEN: usize = 64;

/// Split `/cmd@botname args` into a lowercase command name and the rest.
pub fn parse_command(text: &str) -> (String, String) {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

async fn send_html_split(state: &AppState, chat_id: ChatId, html: &str) -> Result<()> {
    for chunk in split_chunks(html, state.cfg.telegram_safe_limit) {
        state.messenger.send_html(chat_id, &chunk).await?;
    }
    Ok(())
}

fn help_html(state: &AppState) -> String {
    let title = escape_html(&chain_title(&state.cfg.chain_id));
    format!(
        "🤖 <b>Dexscreener bot</b>\n\n\
Tracks {title} pairs via the Dexscreener search API.\n\n\
<b>📋 Commands:</b>\n\
/scan [query] - Top {limit} {title} pairs (default query <code>{query}</code>)\n\
/watch - Alert this chat about newly listed pairs\n\
/unwatch - Stop new-pair alerts\n\
/status - Watcher status\n\
/help - Show this message",
        limit = state.cfg.report_limit,
        query = escape_html(&state.cfg.search_query),
    )
}

/// Handle one text message from an authorized user.
///
/// Telegram-agnostic: all output goes through `state.messenger`, so this is
/// what the tests drive.
pub async fn execute_command(
    state: &AppState,
    chat_id: ChatId,
    user_id: UserId,
    text: &str,
) -> Result<()> {
    let (allowed, retry_after) = state.rate_limiter.lock().await.check(user_id);
    if !allowed {
        tracing::debug!(user_id = user_id.0, "rate limited");
        let msg = match retry_after {
            Some(d) => format!("⏳ Rate limited. Try again in {:.0}s.", d.as_secs_f64().ceil()),
            None => "⏳ Rate limited.".to_string(),
        };
        return send_html_split(state, chat_id, &msg).await;
    }

    if !text.trim_start().starts_with('/') {
        return send_html_split(
            state,
            chat_id,
            "Send /scan to list pairs or /help for all commands.",
        )
        .await;
    }

    let (cmd, arg) = parse_command(text);
    tracing::debug!(chat_id = chat_id.0, user_id = user_id.0, cmd = %cmd, "command");

    match cmd.as_str() {
        "start" | "help" => send_html_split(state, chat_id, &help_html(state)).await,

        "scan" => scan(state, chat_id, &arg).await,

        "watch" => {
            let msg = if state.watcher.subscribe(chat_id).await {
                format!(
                    "👀 Watching for new {} pairs every {}s.",
                    escape_html(&chain_title(&state.cfg.chain_id)),
                    state.cfg.watch_interval.as_secs()
                )
            } else {
                "Already watching. Use /unwatch to stop.".to_string()
            };
            send_html_split(state, chat_id, &msg).await
        }

        "unwatch" => {
            let msg = if state.watcher.unsubscribe(chat_id).await {
                "🔕 New-pair alerts stopped."
            } else {
                "This chat is not watching. Use /watch to start."
            };
            send_html_split(state, chat_id, msg).await
        }

        "status" => {
            let html = state.watcher.status_html(chat_id).await;
            send_html_split(state, chat_id, &html).await
        }

        _ => {
            let msg = format!(
                "Unknown command: /{}. Use /help for commands.",
                escape_html(&cmd)
            );
            send_html_split(state, chat_id, &msg).await
        }
    }
}

async fn scan(state: &AppState, chat_id: ChatId, arg: &str) -> Result<()> {
    let query = if arg.is_empty() {
        state.cfg.search_query.clone()
    } else {
        arg.chars().take(MAX_QUERY_LEN).collect()
    };

    let _ = state
        .messenger
        .send_chat_action(chat_id, ChatAction::Typing)
        .await;
    let placeholder = state
        .messenger
        .send_html(
            chat_id,
            &format!("🔍 Scanning Dexscreener for <code>{}</code>…", escape_html(&query)),
        )
        .await?;

    let req = ScanRequest {
        query,
        chain_id: state.cfg.chain_id.clone(),
        limit: state.cfg.report_limit,
    };
    let html = match run_scan(state.source.as_ref(), &req, Utc::now()).await {
        Ok(outcome) => render_html(&outcome),
        Err(e) => {
            tracing::warn!(error = %e, "scan failed");
            format!("❌ Error: <code>{}</code>", escape_html(&e.to_string()))
        }
    };

    let mut chunks = split_chunks(&html, state.cfg.telegram_safe_limit).into_iter();
    if let Some(first) = chunks.next() {
        state.messenger.edit_html(placeholder, &first).await?;
    }
    for chunk in chunks {
        state.messenger.send_html(chat_id, &chunk).await?;
    }
    Ok(())
}
