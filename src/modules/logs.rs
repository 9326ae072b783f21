//! Log tail viewer
//!
//! Fetches the tail of the proxy log on mount and on demand. Auto-refresh is
//! an explicit toggle, off unless the settings say otherwise:
//!
//! ```text
//! Stopped ──toggle──► Polling ──toggle──► Stopped
//!                        │
//!                        └──destroy──► Stopped
//! ```
//!
//! Every successful fetch is followed by a deferred scroll-to-bottom so the
//! renderer can flush the new text first.

use crate::config::LogSettings;
use crate::poll::PollingSupervisor;
use crate::service::{ErrorInfo, ServiceCall};
use crate::store::{Controller, Store};
use crate::transport::api::ConsoleApi;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Whatever displays the log; told to jump to the newest line.
pub trait ScrollTarget: Send + Sync {
    fn scroll_to_bottom(&self);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoScroll;

impl ScrollTarget for NoScroll {
    fn scroll_to_bottom(&self) {}
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogState {
    pub loaded: bool,
    pub log: String,
    pub auto_refresh: bool,
    pub error_info: Option<ErrorInfo>,
    pub fetched_at: Option<DateTime<Local>>,
}

struct LogShared {
    store: Store<LogState>,
    tail: ServiceCall<(), String>,
    scroll: Arc<dyn ScrollTarget>,
    scroll_delay: Duration,
}

impl LogShared {
    async fn load_content(&self) -> bool {
        self.store.update(|state| state.error_info = None);

        let outcome = self.tail.invoke(()).await;
        let fetched = matches!(outcome, Some(Ok(_)));

        self.store.update(|state| {
            match outcome {
                Some(Ok(log)) => {
                    state.log = log.trim_end().to_string();
                    state.fetched_at = Some(Local::now());
                }
                Some(Err(info)) => state.error_info = Some(info),
                None => {}
            }
            state.loaded = true;
        });
        fetched
    }

    fn schedule_scroll(self: &Arc<Self>) {
        let shared = self.clone();
        let lifetime = self.store.lifetime();
        tokio::spawn(async move {
            tokio::select! {
                _ = lifetime.cancelled() => {
                    debug!("Dropping scroll for torn-down log view");
                }
                _ = tokio::time::sleep(shared.scroll_delay) => {
                    shared.scroll.scroll_to_bottom();
                }
            }
        });
    }

    async fn fetch_and_scroll(self: &Arc<Self>) {
        if self.load_content().await {
            self.schedule_scroll();
        }
    }
}

pub struct LogController {
    shared: Arc<LogShared>,
    poller: PollingSupervisor,
    poll_interval: Duration,
}

impl LogController {
    pub fn new(api: ConsoleApi, settings: &LogSettings, scroll: Arc<dyn ScrollTarget>) -> Self {
        let store = Store::new(LogState::default());
        let tail = ServiceCall::new("logs.tail", store.lifetime(), move |_: ()| {
            let api = api.clone();
            async move { api.tail_log().await }
        });

        Self {
            shared: Arc::new(LogShared {
                store,
                tail,
                scroll,
                scroll_delay: settings.scroll_delay(),
            }),
            poller: PollingSupervisor::new("logs"),
            poll_interval: settings.poll_interval(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.shared.tail.is_loading()
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_polling()
    }

    /// Manual fetch, followed by a scroll.
    pub async fn refresh(&self) {
        self.shared.fetch_and_scroll().await;
    }

    /// Flips auto-refresh and returns the new setting.
    pub fn toggle_auto_refresh(&self) -> bool {
        let Some(enabled) = self.shared.store.update(|state| {
            state.auto_refresh = !state.auto_refresh;
            state.auto_refresh
        }) else {
            return false;
        };

        if enabled {
            let shared = self.shared.clone();
            self.poller.start(self.poll_interval, move || {
                let shared = shared.clone();
                async move { shared.fetch_and_scroll().await }
            });
        } else {
            self.poller.stop();
        }
        enabled
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        if self.shared.store.read(|state| state.auto_refresh) != enabled {
            self.toggle_auto_refresh();
        }
    }
}

#[async_trait]
impl Controller for LogController {
    type State = LogState;

    fn name(&self) -> &'static str {
        "logs"
    }

    fn store(&self) -> &Store<LogState> {
        &self.shared.store
    }

    async fn init(&self) {
        self.shared.fetch_and_scroll().await;
    }

    fn on_destroy(&self) {
        self.poller.stop();
        self.shared.store.teardown();
    }
}
