//! Telegram update handlers.
//!
//! Every message goes through the same gate:
//! - authorization against `TELEGRAM_ALLOWED_USERS`
//! - per-user rate limiting, then commands are routed to `commands` and
//!   anything else gets a usage hint

use std::sync::Arc;

use teloxide::{prelude::*, types::Message};

use dexbot_core::{domain::UserId, security::is_authorized};

use crate::router::AppState;

mod commands;

pub use commands::{execute_command, parse_command};

pub async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    let user_id = msg.from().map(|u| UserId(u.id.0 as i64));

    if !is_authorized(user_id, &state.cfg.telegram_allowed_users) {
        tracing::warn!(
            user_id = user_id.map(|u| u.0),
            chat_id = msg.chat.id.0,
            "unauthorized message"
        );
        let _ = bot
            .send_message(
                msg.chat.id,
                "Unauthorized. Contact the bot owner for access.",
            )
            .await;
        return Ok(());
    }

    let Some(user_id) = user_id else {
        return Ok(());
    };
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let chat_id = dexbot_core::domain::ChatId(msg.chat.id.0);
    if let Err(e) = execute_command(&state, chat_id, user_id, text).await {
        tracing::error!(chat_id = chat_id.0, error = %e, "command failed");
    }
    Ok(())
}
