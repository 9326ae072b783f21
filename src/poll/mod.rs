//! Polling supervisor
//!
//! Owns at most one running [`Ticker`]. Starting again replaces the current
//! timer, stopping is idempotent and dropping the supervisor stops it.

pub mod ticker;

pub use ticker::{PollAction, Ticker};

use futures::FutureExt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug)]
struct PollingTask {
    cancel: CancellationToken,
    _handle: JoinHandle<u64>,
}

#[derive(Debug)]
pub struct PollingSupervisor {
    name: String,
    task: Mutex<Option<PollingTask>>,
}

impl PollingSupervisor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            task: Mutex::new(None),
        }
    }

    /// Runs `action` every `interval`, replacing any running timer.
    pub fn start<F, Fut>(&self, interval: Duration, action: F)
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let action: PollAction = Arc::new(move || action().boxed());

        let mut slot = self.slot();
        if let Some(previous) = slot.take() {
            debug!("Replacing running poller: {}", self.name);
            previous.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let ticker = Ticker::create(self.name.clone(), interval, action, cancel.clone()).start();
        let handle = tokio::spawn(async move { ticker.run_until_cancelled().await.ticks() });

        info!("Polling {} every {:?}", self.name, interval);
        *slot = Some(PollingTask {
            cancel,
            _handle: handle,
        });
    }

    /// Cancels the timer. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        match self.slot().take() {
            Some(task) => {
                task.cancel.cancel();
                info!("Polling stopped: {}", self.name);
                true
            }
            None => false,
        }
    }

    pub fn is_polling(&self) -> bool {
        self.slot()
            .as_ref()
            .is_some_and(|task| !task.cancel.is_cancelled())
    }

    fn slot(&self) -> MutexGuard<'_, Option<PollingTask>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for PollingSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}
