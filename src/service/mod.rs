//! Service call wrapper
//!
//! A [`ServiceCall`] wraps one asynchronous backend operation and tracks it
//! through a small state machine:
//!
//! ```text
//! Idle ──invoke──► Pending ──ok──► Succeeded
//!   ▲                │  ▲            │
//!   │                │  └──invoke────┤
//!   │                └──err──► Failed┘
//! ```
//!
//! Invoking again while `Pending` is allowed: the error is cleared, the last
//! data stays visible. A generation counter makes the most recent invocation
//! the only one allowed to write state, so overlapping calls resolve as
//! "last call wins" regardless of completion order. Calls are never retried.

pub mod error;

pub use error::{ErrorInfo, ServiceError};

use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

type Operation<A, T> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<T, ServiceError>> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallStatus {
    #[default]
    Idle,
    Pending,
    Succeeded,
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceCallState<T> {
    pub status: CallStatus,
    pub data: Option<T>,
    pub error: Option<ErrorInfo>,
}

impl<T> Default for ServiceCallState<T> {
    fn default() -> Self {
        Self {
            status: CallStatus::Idle,
            data: None,
            error: None,
        }
    }
}

pub struct ServiceCall<A, T> {
    name: String,
    operation: Operation<A, T>,
    state: watch::Sender<ServiceCallState<T>>,
    generation: AtomicU64,
    lifetime: CancellationToken,
}

impl<A, T> fmt::Debug for ServiceCall<A, T>
where
    T: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceCall")
            .field("name", &self.name)
            .field("state", &*self.state.borrow())
            .field("generation", &self.generation.load(Ordering::SeqCst))
            .finish()
    }
}

impl<A, T> ServiceCall<A, T>
where
    A: Send + 'static,
    T: Clone + Send + Sync + 'static,
{
    /// Binds `operation` to a wrapper that lives as long as `lifetime`.
    pub fn new<F, Fut>(name: impl Into<String>, lifetime: CancellationToken, operation: F) -> Self
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            operation: Arc::new(move |args| operation(args).boxed()),
            state: watch::Sender::new(ServiceCallState::default()),
            generation: AtomicU64::new(0),
            lifetime,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Runs the operation once.
    ///
    /// Returns `None` when the outcome must be ignored: the owning controller
    /// was torn down, or a newer invocation started before this one resolved.
    pub async fn invoke(&self, args: A) -> Option<Result<T, ErrorInfo>> {
        if self.lifetime.is_cancelled() {
            debug!("{} not started, owner already torn down", self.name);
            return None;
        }

        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.state.send_modify(|state| {
            state.status = CallStatus::Pending;
            state.error = None;
        });
        debug!("{} started (#{})", self.name, generation);

        let outcome = (self.operation)(args).await;

        if self.lifetime.is_cancelled() {
            debug!("{} resolved after teardown, dropping result", self.name);
            return None;
        }
        if self.generation.load(Ordering::SeqCst) != generation {
            debug!("{} (#{}) superseded by a newer call", self.name, generation);
            return None;
        }

        match outcome {
            Ok(data) => {
                self.state.send_modify(|state| {
                    state.status = CallStatus::Succeeded;
                    state.data = Some(data.clone());
                    state.error = None;
                });
                debug!("{} succeeded (#{})", self.name, generation);
                Some(Ok(data))
            }
            Err(err) => {
                let info = ErrorInfo::from(&err);
                warn!("{} failed: {}", self.name, info);
                self.state.send_modify(|state| {
                    state.status = CallStatus::Failed;
                    state.error = Some(info.clone());
                });
                Some(Err(info))
            }
        }
    }

    pub fn state(&self) -> ServiceCallState<T> {
        self.state.borrow().clone()
    }

    pub fn status(&self) -> CallStatus {
        self.state.borrow().status
    }

    pub fn is_loading(&self) -> bool {
        self.status() == CallStatus::Pending
    }

    pub fn subscribe(&self) -> watch::Receiver<ServiceCallState<T>> {
        self.state.subscribe()
    }
}
