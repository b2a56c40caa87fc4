use std::sync::Arc;

use teloxide::{dispatching::Dispatcher, dptree, prelude::*, types::BotCommand};

use tokio::sync::Mutex;

use dexbot_core::{
    config::Config,
    domain::ChatId,
    messaging::{
        port::MessagingPort,
        throttled::{ThrottleConfig, ThrottledMessenger},
    },
    ports::PairSource,
    security::RateLimiter,
    watcher::{PairWatcher, WatchSettings},
};

use crate::handlers;
use crate::TelegramMessenger;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub source: Arc<dyn PairSource>,
    pub messenger: Arc<dyn MessagingPort>,
    pub watcher: PairWatcher,
    pub rate_limiter: Arc<Mutex<RateLimiter>>,
}

impl AppState {
    pub fn new(
        cfg: Arc<Config>,
        source: Arc<dyn PairSource>,
        messenger: Arc<dyn MessagingPort>,
    ) -> Self {
        let watcher = PairWatcher::new(
            source.clone(),
            messenger.clone(),
            WatchSettings {
                query: cfg.search_query.clone(),
                chain_id: cfg.chain_id.clone(),
                interval: cfg.watch_interval,
            },
        );
        let rate_limiter = Arc::new(Mutex::new(RateLimiter::new(
            cfg.rate_limit_enabled,
            cfg.rate_limit_requests,
            cfg.rate_limit_window,
        )));

        Self {
            cfg,
            source,
            messenger,
            watcher,
            rate_limiter,
        }
    }
}

fn bot_commands() -> Vec<BotCommand> {
    vec![
        BotCommand::new("scan", "Scan Dexscreener pairs (optional query)"),
        BotCommand::new("watch", "Alert this chat about new pairs"),
        BotCommand::new("unwatch", "Stop new-pair alerts"),
        BotCommand::new("status", "Show watcher status"),
        BotCommand::new("help", "Show help"),
    ]
}

pub async fn run_polling(cfg: Arc<Config>, source: Arc<dyn PairSource>) -> anyhow::Result<()> {
    cfg.require_telegram()?;
    let bot = Bot::new(cfg.telegram_bot_token.clone());

    match bot.get_me().await {
        Ok(me) => tracing::info!(username = %me.username(), "dexbot started"),
        Err(e) => tracing::warn!(error = %e, "get_me failed"),
    }
    tracing::info!(
        allowed_users = cfg.telegram_allowed_users.len(),
        chain = %cfg.chain_id,
        query = %cfg.search_query,
        "bot configuration"
    );

    if let Err(e) = bot.set_my_commands(bot_commands()).await {
        tracing::warn!(error = %e, "failed to register bot commands");
    }

    // Throttle on top of the adapter's one-shot RetryAfter retry; alerts fan out
    // to every subscriber at once.
    let raw_messenger: Arc<dyn MessagingPort> = Arc::new(TelegramMessenger::new(bot.clone()));
    let messenger: Arc<dyn MessagingPort> = Arc::new(ThrottledMessenger::new(
        raw_messenger,
        ThrottleConfig::default(),
    ));

    let state = Arc::new(AppState::new(cfg.clone(), source, messenger));

    if cfg.watch_auto_subscribe {
        for &user_id in &cfg.telegram_allowed_users {
            state.watcher.subscribe(ChatId(user_id)).await;
        }
    }
    state.watcher.start().await;

    let handler =
        dptree::entry().branch(Update::filter_message().endpoint(handlers::handle_message));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state.clone()])
        .build()
        .dispatch()
        .await;

    state.watcher.stop().await;
    tracing::info!("dispatcher stopped");
    Ok(())
}
