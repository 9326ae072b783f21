//! Repeating timer with statum-enforced lifecycle
//!
//! ```text
//! Armed ──start──► Running ──cancel──► Finished
//! ```
//!
//! The first tick fires one full period after `run_until_cancelled` starts.
//! Ticks missed while an action is still running are skipped, not bunched.

use futures::future::BoxFuture;
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub type PollAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

#[state]
#[derive(Debug, Clone)]
pub enum TickerState {
    Armed,    // Built, timer not yet scheduled
    Running,  // Firing the action every period
    Finished, // Cancelled, timer released
}

#[machine]
pub struct Ticker<S: TickerState> {
    name: String,
    period: Duration,
    action: PollAction,
    cancel: CancellationToken,
    ticks: u64,
}

impl<S: TickerState> Ticker<S> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Ticker<Armed> {
    pub fn create(
        name: String,
        period: Duration,
        action: PollAction,
        cancel: CancellationToken,
    ) -> Self {
        debug!("Arming ticker {} every {:?}", name, period);
        Self::new(name, period, action, cancel, 0)
    }

    pub fn start(self) -> Ticker<Running> {
        info!("Starting ticker: {}", self.name);
        self.transition()
    }
}

impl Ticker<Running> {
    pub async fn run_until_cancelled(mut self) -> Ticker<Finished> {
        let mut interval = tokio::time::interval_at(Instant::now() + self.period, self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = self.cancel.cancelled() => {
                    debug!("Ticker {} cancelled", self.name);
                    break;
                }

                _ = interval.tick() => {
                    self.ticks += 1;
                    (self.action)().await;
                }
            }
        }

        info!("Ticker {} finished after {} ticks", self.name, self.ticks);
        self.transition()
    }
}
