//! Mount/unmount lifecycle of feature modules
//!
//! [`ModuleHandle`] guarantees that a controller's `init` starts at most once
//! and `on_destroy` runs at most once, in that order or with `init` skipped
//! entirely. `on_destroy` never waits for `init`: an unfinished `init` keeps
//! running detached and its writes are discarded by the torn-down store.

use super::Store;
use async_trait::async_trait;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[async_trait]
pub trait Controller: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;

    fn name(&self) -> &'static str;

    fn store(&self) -> &Store<Self::State>;

    /// First-visibility work. Failures belong in the module's own state.
    async fn init(&self);

    /// Synchronous release of timers and tokens. Must not assume `init` ran.
    fn on_destroy(&self) {
        self.store().teardown();
    }

    fn subscribe(&self) -> watch::Receiver<Self::State> {
        self.store().subscribe()
    }

    fn snapshot(&self) -> Self::State {
        self.store().snapshot()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Created,
    Mounted,
    Unmounted,
}

pub struct ModuleHandle<C: Controller> {
    controller: Arc<C>,
    phase: Phase,
    init_task: Option<JoinHandle<()>>,
}

impl<C: Controller> ModuleHandle<C> {
    pub fn new(controller: Arc<C>) -> Self {
        Self {
            controller,
            phase: Phase::Created,
            init_task: None,
        }
    }

    pub fn controller(&self) -> &Arc<C> {
        &self.controller
    }

    pub fn is_mounted(&self) -> bool {
        self.phase == Phase::Mounted
    }

    /// Spawns `init`. Returns `false` if the module was mounted before.
    pub fn mount(&mut self) -> bool {
        if self.phase != Phase::Created {
            debug!("Module {} already mounted once", self.controller.name());
            return false;
        }

        info!("Mounting module: {}", self.controller.name());
        let controller = self.controller.clone();
        self.init_task = Some(tokio::spawn(async move {
            let name = controller.name();
            if AssertUnwindSafe(controller.init())
                .catch_unwind()
                .await
                .is_err()
            {
                error!("Module {} panicked during init", name);
            } else {
                debug!("Module {} initialised", name);
            }
        }));
        self.phase = Phase::Mounted;
        true
    }

    /// Runs `on_destroy`. Returns `false` if it already ran.
    pub fn unmount(&mut self) -> bool {
        if self.phase == Phase::Unmounted {
            return false;
        }

        info!("Unmounting module: {}", self.controller.name());
        self.controller.on_destroy();
        self.phase = Phase::Unmounted;
        // init is left to finish on its own
        self.init_task.take();
        true
    }

    /// Waits until `init` has returned. No-op if it was never spawned.
    pub async fn initialised(&mut self) {
        if let Some(task) = self.init_task.take() {
            if let Err(e) = task.await {
                error!("Init task of {} failed: {}", self.controller.name(), e);
            }
        }
    }
}

impl<C: Controller> Drop for ModuleHandle<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}
