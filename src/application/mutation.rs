//! Single-flight driver for one-shot write operations.

use crate::domain::errors::DashboardError;
use futures_util::future::BoxFuture;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

pub type MutationFn<P, R> =
    Arc<dyn Fn(P) -> BoxFuture<'static, Result<R, DashboardError>> + Send + Sync>;

pub type SuccessHook<R> = Arc<dyn Fn(&R) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MutationStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<R> {
    pub status: MutationStatus,
    pub result: Option<R>,
    pub error: Option<DashboardError>,
    /// Identifies the attempt that owns the state; a reset bumps it so a late
    /// result from the abandoned attempt is not committed.
    attempt: u64,
}

impl<R> MutationState<R> {
    fn idle(attempt: u64) -> Self {
        Self {
            status: MutationStatus::Idle,
            result: None,
            error: None,
            attempt,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == MutationStatus::Pending
    }
}

impl<R> Default for MutationState<R> {
    fn default() -> Self {
        Self::idle(0)
    }
}

struct Inner<P, R> {
    name: String,
    mutation_fn: MutationFn<P, R>,
    on_success: Option<SuccessHook<R>>,
    state: watch::Sender<MutationState<R>>,
}

/// Configures a [`MutationController`] before it can be shared.
pub struct MutationBuilder<P, R> {
    name: String,
    mutation_fn: MutationFn<P, R>,
    on_success: Option<SuccessHook<R>>,
}

impl<P, R> MutationBuilder<P, R> {
    /// Hook run exactly once per successful attempt, right after the success
    /// state is committed.
    pub fn on_success(mut self, hook: impl Fn(&R) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> MutationController<P, R> {
        let (state, _) = watch::channel(MutationState::idle(0));
        MutationController {
            inner: Arc::new(Inner {
                name: self.name,
                mutation_fn: self.mutation_fn,
                on_success: self.on_success,
                state,
            }),
        }
    }
}

/// Releases a pending attempt whose `submit` future ended without reaching
/// the commit, either dropped mid-flight or unwound by a panic.
struct PendingGuard<'a, R> {
    name: &'a str,
    state: &'a watch::Sender<MutationState<R>>,
    attempt: u64,
    armed: bool,
}

impl<R> Drop for PendingGuard<'_, R> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let attempt = self.attempt;
        let released = self.state.send_if_modified(|state| {
            if state.attempt != attempt || !state.is_pending() {
                return false;
            }
            *state = MutationState::idle(attempt);
            true
        });
        if released {
            warn!(
                "MutationController [{}]: attempt {} abandoned before completion (panicked: {})",
                self.name,
                attempt,
                std::thread::panicking()
            );
        }
    }
}

/// Submits payloads through `mutation_fn`, at most one at a time.
///
/// Clones share state, so the render loop and the task that awaits
/// `submit` observe the same attempt.
pub struct MutationController<P, R> {
    inner: Arc<Inner<P, R>>,
}

impl<P, R> Clone for MutationController<P, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P, R> MutationController<P, R>
where
    P: Send + 'static,
    R: Clone + Send + Sync + 'static,
{
    pub fn new<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, DashboardError>> + Send + 'static,
    {
        Self::builder(name, f).build()
    }

    pub fn builder<F, Fut>(name: impl Into<String>, f: F) -> MutationBuilder<P, R>
    where
        F: Fn(P) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, DashboardError>> + Send + 'static,
    {
        let mutation_fn: MutationFn<P, R> = Arc::new(move |payload| Box::pin(f(payload)));
        MutationBuilder {
            name: name.into(),
            mutation_fn,
            on_success: None,
        }
    }

    pub fn state(&self) -> MutationState<R> {
        self.inner.state.borrow().clone()
    }

    pub fn status(&self) -> MutationStatus {
        self.inner.state.borrow().status
    }

    pub fn watch(&self) -> watch::Receiver<MutationState<R>> {
        self.inner.state.subscribe()
    }

    /// Run one attempt. Rejected with `AlreadyPending`, without touching state
    /// or calling `mutation_fn`, while another attempt is pending.
    pub async fn submit(&self, payload: P) -> Result<R, DashboardError> {
        let mut attempt = 0;
        let started = self.inner.state.send_if_modified(|state| {
            if state.is_pending() {
                return false;
            }
            attempt = state.attempt + 1;
            *state = MutationState {
                status: MutationStatus::Pending,
                result: None,
                error: None,
                attempt,
            };
            true
        });
        if !started {
            debug!(
                "MutationController [{}]: submit rejected, attempt already pending",
                self.inner.name
            );
            return Err(DashboardError::AlreadyPending);
        }

        info!(
            "MutationController [{}]: attempt {} started",
            self.inner.name, attempt
        );
        let mut guard = PendingGuard {
            name: &self.inner.name,
            state: &self.inner.state,
            attempt,
            armed: true,
        };
        let outcome = (self.inner.mutation_fn)(payload).await;
        guard.armed = false;

        let committed = self.inner.state.send_if_modified(|state| {
            if state.attempt != attempt {
                return false;
            }
            match &outcome {
                Ok(result) => {
                    state.status = MutationStatus::Success;
                    state.result = Some(result.clone());
                    state.error = None;
                }
                Err(e) => {
                    state.status = MutationStatus::Error;
                    state.result = None;
                    state.error = Some(e.clone());
                }
            }
            true
        });

        match &outcome {
            Ok(result) if committed => {
                info!(
                    "MutationController [{}]: attempt {} succeeded",
                    self.inner.name, attempt
                );
                if let Some(hook) = &self.inner.on_success {
                    hook(result);
                }
            }
            Err(e) if committed => {
                warn!(
                    "MutationController [{}]: attempt {} failed: {}",
                    self.inner.name, attempt, e
                );
            }
            _ => {
                debug!(
                    "MutationController [{}]: attempt {} settled after reset, result dropped",
                    self.inner.name, attempt
                );
            }
        }
        outcome
    }

    /// Return to `Idle`, abandoning any pending attempt's result.
    pub fn reset(&self) {
        self.inner.state.send_modify(|state| {
            *state = MutationState::idle(state.attempt + 1);
        });
    }
}
