//! Observable state container for feature modules
//!
//! Every controller owns exactly one [`Store`]. State is mutated only through
//! [`Store::update`], which notifies subscribers before it returns. Once the
//! store is torn down all further writes are discarded, so late results of
//! in-flight calls cannot touch an unmounted module.

pub mod lifecycle;

pub use lifecycle::{Controller, ModuleHandle};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug)]
pub struct Store<S> {
    state: watch::Sender<S>,
    lifetime: CancellationToken,
}

impl<S> Store<S> {
    pub fn new(initial: S) -> Self {
        Self {
            state: watch::Sender::new(initial),
            lifetime: CancellationToken::new(),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<S> {
        self.state.subscribe()
    }

    pub fn read<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow())
    }

    pub fn snapshot(&self) -> S
    where
        S: Clone,
    {
        self.state.borrow().clone()
    }

    /// Applies `f` and notifies subscribers. `None` once torn down.
    pub fn update<R>(&self, f: impl FnOnce(&mut S) -> R) -> Option<R> {
        if self.lifetime.is_cancelled() {
            debug!("Discarding write to a torn-down store");
            return None;
        }

        let mut result = None;
        self.state.send_modify(|state| result = Some(f(state)));
        result
    }

    pub fn is_alive(&self) -> bool {
        !self.lifetime.is_cancelled()
    }

    /// Token cancelled on teardown, for work bound to this store.
    pub fn lifetime(&self) -> CancellationToken {
        self.lifetime.child_token()
    }

    /// Returns `false` if the store was already torn down.
    pub fn teardown(&self) -> bool {
        if self.lifetime.is_cancelled() {
            return false;
        }
        self.lifetime.cancel();
        true
    }
}
