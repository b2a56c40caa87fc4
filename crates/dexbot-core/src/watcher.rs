//! New-pair watcher.
//!
//! Polls the pair source on a fixed interval and alerts subscribed chats about
//! pairs (by `pairAddress`) it has not seen before:
//! - the first poll after (re)subscription only seeds the seen-set
//! - polling is skipped while nobody is subscribed
//! - the seen-set is bounded; the oldest addresses are evicted first
//! - poll failures are logged and the loop keeps going

use std::{
    collections::{BTreeSet, HashSet, VecDeque},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    domain::ChatId,
    formatting::{chain_title, escape_html, render_new_pair_html},
    messaging::port::MessagingPort,
    ports::PairSource,
    report::{filter_chain, PairSummary},
    Result,
};

const MAX_SEEN: usize = 5000;

#[derive(Clone, Debug)]
pub struct WatchSettings {
    pub query: String,
    pub chain_id: String,
    pub interval: Duration,
}

#[derive(Clone)]
pub struct PairWatcher {
    inner: Arc<WatcherInner>,
}

struct WatcherInner {
    source: Arc<dyn PairSource>,
    messenger: Arc<dyn MessagingPort>,
    settings: WatchSettings,
    state: Mutex<WatcherState>,
}

#[derive(Default)]
struct WatcherState {
    subscribers: BTreeSet<ChatId>,
    seen: SeenSet,
    seeded: bool,
    last_poll: Option<DateTime<Utc>>,
    last_error: Option<String>,
    task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
}

/// Insertion-ordered set with a fixed capacity.
#[derive(Debug)]
struct SeenSet {
    cap: usize,
    order: VecDeque<String>,
    set: HashSet<String>,
}

impl Default for SeenSet {
    fn default() -> Self {
        Self::with_capacity(MAX_SEEN)
    }
}

impl SeenSet {
    fn with_capacity(cap: usize) -> Self {
        Self {
            cap: cap.max(1),
            order: VecDeque::new(),
            set: HashSet::new(),
        }
    }

    /// Returns true when `key` was not present.
    fn insert(&mut self, key: &str) -> bool {
        if self.set.contains(key) {
            return false;
        }
        if self.order.len() >= self.cap {
            if let Some(old) = self.order.pop_front() {
                self.set.remove(&old);
            }
        }
        self.order.push_back(key.to_string());
        self.set.insert(key.to_string());
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

#[derive(Clone, Debug)]
pub struct WatchStatus {
    pub subscribed: bool,
    pub subscribers: usize,
    pub seen_pairs: usize,
    pub running: bool,
    pub last_poll: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl PairWatcher {
    pub fn new(
        source: Arc<dyn PairSource>,
        messenger: Arc<dyn MessagingPort>,
        settings: WatchSettings,
    ) -> Self {
        Self {
            inner: Arc::new(WatcherInner {
                source,
                messenger,
                settings,
                state: Mutex::new(WatcherState::default()),
            }),
        }
    }

    pub fn settings(&self) -> &WatchSettings {
        &self.inner.settings
    }

    /// Returns true if the chat was not subscribed before.
    pub async fn subscribe(&self, chat_id: ChatId) -> bool {
        let added = self.inner.state.lock().await.subscribers.insert(chat_id);
        if added {
            tracing::info!(chat_id = chat_id.0, "chat subscribed to pair alerts");
        }
        added
    }

    /// Returns true if the chat was subscribed.
    pub async fn unsubscribe(&self, chat_id: ChatId) -> bool {
        let removed = self.inner.state.lock().await.subscribers.remove(&chat_id);
        if removed {
            tracing::info!(chat_id = chat_id.0, "chat unsubscribed from pair alerts");
        }
        removed
    }

    pub async fn status(&self, chat_id: ChatId) -> WatchStatus {
        let st = self.inner.state.lock().await;
        WatchStatus {
            subscribed: st.subscribers.contains(&chat_id),
            subscribers: st.subscribers.len(),
            seen_pairs: st.seen.len(),
            running: st.task.as_ref().is_some_and(|h| !h.is_finished()),
            last_poll: st.last_poll,
            last_error: st.last_error.clone(),
        }
    }

    pub async fn status_html(&self, chat_id: ChatId) -> String {
        let s = self.status(chat_id).await;
        let settings = &self.inner.settings;

        let mut lines = vec![
            "👀 <b>Pair watcher</b>".to_string(),
            format!(
                "This chat: {}",
                if s.subscribed { "subscribed" } else { "not subscribed" }
            ),
            format!(
                "Chain: <code>{}</code> · query <code>{}</code>",
                escape_html(&settings.chain_id),
                escape_html(&settings.query)
            ),
            format!("Interval: {}s", settings.interval.as_secs()),
            format!("Subscribers: {}", s.subscribers),
            format!("Pairs seen: {}", s.seen_pairs),
            format!("Running: {}", if s.running { "yes" } else { "no" }),
        ];
        if let Some(t) = s.last_poll {
            lines.push(format!("Last poll: {}", t.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if let Some(e) = s.last_error {
            lines.push(format!("Last error: <code>{}</code>", escape_html(&e)));
        }
        lines.join("\n")
    }

    /// Spawn the polling loop (restarts it if already running).
    pub async fn start(&self) {
        self.stop().await;

        let cancel = CancellationToken::new();
        let this = self.clone();
        let token = cancel.clone();
        let handle = tokio::spawn(async move { this.run_loop(token).await });

        let mut st = self.inner.state.lock().await;
        st.cancel = Some(cancel);
        st.task = Some(handle);
        tracing::info!(
            interval_secs = self.inner.settings.interval.as_secs(),
            chain = %self.inner.settings.chain_id,
            "pair watcher started"
        );
    }

    pub async fn stop(&self) {
        let (cancel, task) = {
            let mut st = self.inner.state.lock().await;
            (st.cancel.take(), st.task.take())
        };
        if let Some(c) = cancel {
            c.cancel();
        }
        if let Some(h) = task {
            let _ = h.await;
        }
    }

    async fn run_loop(&self, cancel: CancellationToken) {
        let mut tick = tokio::time::interval(self.inner.settings.interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tick.tick() => {
                    if let Err(e) = self.poll_once(Utc::now()).await {
                        tracing::warn!(error = %e, "pair watcher poll failed");
                        self.inner.state.lock().await.last_error = Some(e.to_string());
                    }
                }
            }
        }
    }

    /// Run one poll. Returns the number of alerts delivered.
    pub async fn poll_once(&self, now: DateTime<Utc>) -> Result<usize> {
        let settings = &self.inner.settings;

        {
            let mut st = self.inner.state.lock().await;
            if st.subscribers.is_empty() {
                st.seeded = false;
                return Ok(0);
            }
        }

        let outcome = self.inner.source.search_pairs(&settings.query).await?;
        let Some(resp) = outcome.response.filter(|_| outcome.status == 200) else {
            let msg = format!("search returned status {}", outcome.status);
            tracing::warn!(status = outcome.status, "pair watcher got error status");
            self.inner.state.lock().await.last_error = Some(msg);
            return Ok(0);
        };

        let (fresh, subscribers) = {
            let mut st = self.inner.state.lock().await;
            st.last_poll = Some(now);
            st.last_error = None;

            let mut fresh: Vec<PairSummary> = Vec::new();
            for pair in filter_chain(&resp.pairs, &settings.chain_id) {
                let Some(addr) = pair.pair_address.as_deref() else {
                    continue;
                };
                if st.seen.insert(addr) {
                    fresh.push(PairSummary::from_pair(pair, now));
                }
            }

            if !st.seeded {
                st.seeded = true;
                tracing::debug!(seeded = fresh.len(), "pair watcher seeded");
                return Ok(0);
            }
            (fresh, st.subscribers.iter().copied().collect::<Vec<_>>())
        };

        let mut delivered = 0usize;
        for summary in &fresh {
            let html = render_new_pair_html(&settings.chain_id, summary);
            for chat_id in &subscribers {
                match self.inner.messenger.send_html(*chat_id, &html).await {
                    Ok(_) => delivered += 1,
                    Err(e) => {
                        tracing::warn!(chat_id = chat_id.0, error = %e, "pair alert failed")
                    }
                }
            }
        }

        if !fresh.is_empty() {
            tracing::info!(
                new_pairs = fresh.len(),
                delivered,
                chain = %chain_title(&settings.chain_id),
                "pair alerts sent"
            );
        }
        Ok(delivered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::{MessageId, MessageRef},
        messaging::types::{ChatAction, MessagingCapabilities},
        model::SearchResponse,
        ports::SearchOutcome,
        Error,
    };
    use async_trait::async_trait;

    #[derive(Default)]
    struct ScriptedSource {
        script: std::sync::Mutex<VecDeque<Result<SearchOutcome>>>,
        calls: std::sync::Mutex<usize>,
    }

    impl ScriptedSource {
        fn push_pairs(&self, addrs: &[(&str, &str)]) {
            let pairs = addrs
                .iter()
                .map(|(chain, addr)| {
                    serde_json::json!({
                        "chainId": chain,
                        "pairAddress": addr,
                        "baseToken": {"name": format!("{addr} token"), "symbol": addr.to_uppercase()}
                    })
                })
                .collect::<Vec<_>>();
            let resp: SearchResponse =
                serde_json::from_value(serde_json::json!({ "pairs": pairs })).unwrap();
            self.script.lock().unwrap().push_back(Ok(SearchOutcome {
                status: 200,
                response: Some(resp),
            }));
        }

        fn push(&self, r: Result<SearchOutcome>) {
            self.script.lock().unwrap().push_back(r);
        }
    }

    #[async_trait]
    impl PairSource for ScriptedSource {
        async fn search_pairs(&self, _query: &str) -> Result<SearchOutcome> {
            *self.calls.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(Error::External("script exhausted".to_string())))
        }
    }

    #[derive(Default)]
    struct FakeMessenger {
        sends: std::sync::Mutex<Vec<(ChatId, String)>>,
    }

    #[async_trait]
    impl MessagingPort for FakeMessenger {
        fn capabilities(&self) -> MessagingCapabilities {
            MessagingCapabilities {
                supports_html: true,
                supports_edit: true,
                supports_chat_actions: false,
                max_message_len: 4096,
            }
        }

        async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
            self.sends
                .lock()
                .unwrap()
                .push((chat_id, html.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: MessageId(1),
            })
        }

        async fn edit_html(&self, _msg: MessageRef, _html: &str) -> Result<()> {
            Ok(())
        }

        async fn send_chat_action(&self, _chat_id: ChatId, _action: ChatAction) -> Result<()> {
            Ok(())
        }
    }

    fn watcher(source: Arc<ScriptedSource>, messenger: Arc<FakeMessenger>) -> PairWatcher {
        PairWatcher::new(
            source,
            messenger,
            WatchSettings {
                query: "solana".to_string(),
                chain_id: "solana".to_string(),
                interval: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test]
    async fn first_poll_seeds_then_alerts_new_pairs_once() {
        let source = Arc::new(ScriptedSource::default());
        let messenger = Arc::new(FakeMessenger::default());
        let w = watcher(source.clone(), messenger.clone());
        assert!(w.subscribe(ChatId(10)).await);
        assert!(!w.subscribe(ChatId(10)).await);
        assert!(w.subscribe(ChatId(20)).await);

        source.push_pairs(&[("solana", "a"), ("solana", "b")]);
        source.push_pairs(&[("solana", "a"), ("solana", "c"), ("base", "d")]);
        source.push_pairs(&[("solana", "c")]);

        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 0);
        assert!(messenger.sends.lock().unwrap().is_empty());

        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 2);
        {
            let sends = messenger.sends.lock().unwrap();
            assert_eq!(sends.len(), 2);
            assert!(sends.iter().all(|(_, html)| html.contains("$C")));
            assert_eq!(sends[0].0, ChatId(10));
            assert_eq!(sends[1].0, ChatId(20));
        }

        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 0);
        assert_eq!(w.status(ChatId(10)).await.seen_pairs, 3);
    }

    #[tokio::test]
    async fn skips_polling_without_subscribers() {
        let source = Arc::new(ScriptedSource::default());
        let messenger = Arc::new(FakeMessenger::default());
        let w = watcher(source.clone(), messenger);

        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 0);
        assert_eq!(*source.calls.lock().unwrap(), 0);

        w.subscribe(ChatId(1)).await;
        assert!(w.unsubscribe(ChatId(1)).await);
        assert!(!w.unsubscribe(ChatId(1)).await);
        assert!(!w.status(ChatId(1)).await.subscribed);
    }

    #[tokio::test]
    async fn bad_status_is_recorded_not_fatal() {
        let source = Arc::new(ScriptedSource::default());
        let messenger = Arc::new(FakeMessenger::default());
        let w = watcher(source.clone(), messenger);
        w.subscribe(ChatId(1)).await;

        source.push(Ok(SearchOutcome {
            status: 500,
            response: None,
        }));
        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 0);
        let st = w.status(ChatId(1)).await;
        assert_eq!(st.last_error.as_deref(), Some("search returned status 500"));

        source.push(Err(Error::Http("boom".to_string())));
        assert!(w.poll_once(Utc::now()).await.is_err());
    }

    #[tokio::test]
    async fn every_new_pair_is_alerted_once() {
        let source = Arc::new(ScriptedSource::default());
        let messenger = Arc::new(FakeMessenger::default());
        let w = watcher(source.clone(), messenger.clone());
        w.subscribe(ChatId(1)).await;

        source.push_pairs(&[("solana", "seed")]);
        let many: Vec<String> = (0..8).map(|i| format!("p{i}")).collect();
        let many_refs: Vec<(&str, &str)> = many.iter().map(|a| ("solana", a.as_str())).collect();
        source.push_pairs(&many_refs);
        source.push_pairs(&many_refs);

        w.poll_once(Utc::now()).await.unwrap();
        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 8);
        assert_eq!(w.poll_once(Utc::now()).await.unwrap(), 0);
        assert_eq!(messenger.sends.lock().unwrap().len(), 8);
        assert_eq!(w.status(ChatId(1)).await.seen_pairs, 9);
    }

    #[test]
    fn seen_set_evicts_oldest() {
        let mut s = SeenSet::with_capacity(2);
        assert!(s.insert("a"));
        assert!(s.insert("b"));
        assert!(!s.insert("a"));
        assert!(s.insert("c"));
        assert_eq!(s.len(), 2);
        // "a" was evicted, so it is new again.
        assert!(s.insert("a"));
        assert!(!s.insert("c"));
    }

    #[tokio::test]
    async fn start_and_stop_loop() {
        let source = Arc::new(ScriptedSource::default());
        let messenger = Arc::new(FakeMessenger::default());
        let w = watcher(source, messenger);

        w.start().await;
        assert!(w.status(ChatId(1)).await.running);
        w.stop().await;
        assert!(!w.status(ChatId(1)).await.running);
        assert!(w.status_html(ChatId(1)).await.contains("Running: no"));
    }
}
