//! Poll-converge loop
//!
//! Cloud provisioning calls return before the backend has finished. The
//! [`Waiter`] repeatedly invokes a [`Refresh`] implementation until the
//! observed state reaches one of its target states, leaves the pending set,
//! or the timeout elapses.
//!
//! ## Flow
//!
//! ```text
//!   delay ──► refresh ──► state ∈ target?  ──yes──► Ok(snapshot)
//!                 ▲            │ no
//!                 │            ▼
//!                 │       state ∈ pending? ──no───► Err(UnexpectedState)
//!                 │            │ yes
//!                 └── sleep ◄──┘   (deadline passed ──► Err(Timeout))
//! ```
//!
//! A refresh error aborts the loop immediately with [`Error::Refresh`].
//! Refreshes used while deleting map "not found" to [`states::NOT_FOUND`]
//! and put it in the target set, so absence is success.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::future::Future;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::{Instant, sleep_until, timeout_at};
use tracing::debug;

/// Well-known state labels shared by resource refreshes
pub mod states {
    pub const AVAILABLE: &str = "available";
    pub const BUILD: &str = "build";
    pub const RETRY: &str = "retry";
    pub const DONE: &str = "done";
    pub const FOUND: &str = "found";
    pub const NOT_FOUND: &str = "not_found";
    pub const ACTIVE: &str = "active";
    pub const INACTIVE: &str = "inactive";
    pub const CONFIGURING: &str = "configuring";
    pub const ERROR: &str = "error";
    pub const FAILED: &str = "failed";
}

/// One observation of a remote entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refreshed<T> {
    /// What the refresh saw
    pub snapshot: T,
    /// State label derived from the snapshot
    pub state: String,
}

impl<T> Refreshed<T> {
    pub fn new(snapshot: T, state: impl Into<String>) -> Self {
        Self {
            snapshot,
            state: state.into(),
        }
    }
}

/// A single status query against a remote entity
///
/// Implemented per resource type, or built from a closure with [`RefreshFn`].
#[async_trait]
pub trait Refresh: Send + Sync {
    /// The entity snapshot returned on convergence
    type Snapshot: Send;

    /// Query the entity once and classify its state
    async fn refresh(&self) -> Result<Refreshed<Self::Snapshot>>;
}

/// Adapter turning an async closure into a [`Refresh`]
pub struct RefreshFn<F>(pub F);

#[async_trait]
impl<F, Fut, T> Refresh for RefreshFn<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<Refreshed<T>>> + Send,
    T: Send,
{
    type Snapshot = T;

    async fn refresh(&self) -> Result<Refreshed<T>> {
        (self.0)().await
    }
}

/// How the interval between refreshes evolves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    /// Always wait the configured interval
    Fixed,
    /// Double the interval after each pending refresh, up to `max`
    Exponential { max: Duration },
}

impl Backoff {
    fn next(&self, current: Duration) -> Duration {
        match self {
            Backoff::Fixed => current,
            Backoff::Exponential { max } => current.saturating_mul(2).min(*max),
        }
    }
}

/// Timing knobs shared by every wait a provider performs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    /// Wait before the first refresh
    pub delay: Duration,
    /// Minimum time between refreshes
    pub interval: Duration,
    /// Interval growth policy
    pub backoff: Backoff,
    /// Time between attempts of a retried mutating call
    pub retry_interval: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(10),
            interval: Duration::from_secs(10),
            backoff: Backoff::Fixed,
            retry_interval: Duration::from_secs(5),
        }
    }
}

/// Drives a [`Refresh`] to one of the target states
#[derive(Debug, Clone)]
pub struct Waiter {
    pending: Vec<String>,
    target: Vec<String>,
    timeout: Duration,
    delay: Duration,
    interval: Duration,
    backoff: Backoff,
    deadline: Option<Instant>,
}

impl Waiter {
    /// Create a waiter for the given pending and target states
    ///
    /// Defaults: 10 minute timeout, no initial delay, 1 second fixed interval.
    pub fn new<P, T, S1, S2>(pending: P, target: T) -> Self
    where
        P: IntoIterator<Item = S1>,
        T: IntoIterator<Item = S2>,
        S1: Into<String>,
        S2: Into<String>,
    {
        Self {
            pending: pending.into_iter().map(Into::into).collect(),
            target: target.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(600),
            delay: Duration::ZERO,
            interval: Duration::from_secs(1),
            backoff: Backoff::Fixed,
            deadline: None,
        }
    }

    /// Maximum total wait
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Wait before the first refresh
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Minimum time between refreshes
    pub fn interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Interval growth policy
    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Caller deadline; the loop stops at the earlier of this and the timeout
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Apply provider-wide delay, interval and backoff
    pub fn settings(self, settings: &PollSettings) -> Self {
        self.delay(settings.delay)
            .interval(settings.interval)
            .backoff(settings.backoff)
    }

    /// Target states
    pub fn target(&self) -> &[String] {
        &self.target
    }

    /// Poll until the refresh reports a target state
    pub async fn wait<R>(&self, refresh: &R) -> Result<R::Snapshot>
    where
        R: Refresh + ?Sized,
    {
        let started = Instant::now();
        let mut deadline = started + self.timeout;
        if let Some(caller) = self.deadline {
            deadline = deadline.min(caller);
        }

        let mut last_state = String::new();
        let mut interval = self.interval;
        let mut attempt: usize = 0;

        if !self.delay.is_zero() {
            sleep_until((started + self.delay).min(deadline)).await;
        }

        loop {
            if Instant::now() >= deadline {
                return Err(self.timeout_error(started, last_state));
            }

            attempt += 1;
            let refreshed = match timeout_at(deadline, refresh.refresh()).await {
                Err(_) => return Err(self.timeout_error(started, last_state)),
                Ok(Err(e)) => {
                    debug!("Refresh {} failed: {}", attempt, e);
                    return Err(Error::Refresh(Box::new(e)));
                }
                Ok(Ok(refreshed)) => refreshed,
            };

            debug!(
                "Refresh {} returned state '{}' (target: {:?})",
                attempt, refreshed.state, self.target
            );

            if self.target.contains(&refreshed.state) {
                return Ok(refreshed.snapshot);
            }

            if !self.pending.contains(&refreshed.state) {
                return Err(Error::UnexpectedState {
                    state: refreshed.state,
                    target: self.target.clone(),
                });
            }

            last_state = refreshed.state;
            sleep_until((Instant::now() + interval).min(deadline)).await;
            interval = self.backoff.next(interval);
        }
    }

    fn timeout_error(&self, started: Instant, last_state: String) -> Error {
        Error::Timeout {
            waited: started.elapsed(),
            target: self.target.clone(),
            last_state,
        }
    }
}

/// Repeat a create call until the service accepts or rejects it
///
/// Any failure other than a rejection (400, 422 or a local validation error)
/// is treated as a pending state and retried every `interval`. A rejection
/// is returned as-is. When `timeout` elapses the last failure is returned.
pub async fn retry_unless_rejected<T, F, Fut>(
    timeout: Duration,
    interval: Duration,
    call: F,
) -> Result<T>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
    T: Send,
{
    retry_while(timeout, interval, |e| !e.is_rejected(), call).await
}

/// Repeat a delete call until it succeeds or the entity is gone
///
/// A not-found answer counts as success. Every other failure is retried
/// until `timeout`, after which the last failure is returned.
pub async fn delete_with_retry<F, Fut>(timeout: Duration, interval: Duration, call: F) -> Result<()>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    let call = &call;
    retry_while(timeout, interval, |_| true, move || async move {
        match call().await {
            Err(e) if e.is_not_found() => Ok(()),
            other => other,
        }
    })
    .await
}

async fn retry_while<T, F, Fut, P>(
    timeout: Duration,
    interval: Duration,
    retryable: P,
    call: F,
) -> Result<T>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Result<T>> + Send,
    P: Fn(&Error) -> bool + Send + Sync,
    T: Send,
{
    let last_error: Mutex<Option<Error>> = Mutex::new(None);

    let call = &call;
    let retryable = &retryable;
    let last = &last_error;
    let refresh = RefreshFn(move || async move {
        match call().await {
            Ok(value) => Ok(Refreshed::new(Some(value), states::DONE)),
            Err(e) if retryable(&e) => {
                debug!("Call failed, retrying: {}", e);
                *last.lock().unwrap_or_else(PoisonError::into_inner) = Some(e);
                Ok(Refreshed::new(None, states::RETRY))
            }
            Err(e) => Err(e),
        }
    });

    let waiter = Waiter::new([states::RETRY], [states::DONE])
        .timeout(timeout)
        .interval(interval);

    match waiter.wait(&refresh).await {
        Ok(Some(value)) => Ok(value),
        Ok(None) => Err(Error::Other("retried call finished without a result".to_string())),
        Err(Error::Refresh(inner)) => Err(*inner),
        Err(timeout @ Error::Timeout { .. }) => {
            let last = last_error.into_inner().unwrap_or_else(PoisonError::into_inner);
            Err(last.unwrap_or(timeout))
        }
        Err(e) => Err(e),
    }
}
