//! Session-scoped background pollers for the badges.
//!
//! A poller runs its first poll immediately, then waits the base interval.
//! Consecutive failures stretch the wait as `min(base * 2^failures, max)`;
//! one success restores the base interval. A poller spawned before login
//! stays idle until a session starts. It stops when that session ends or its
//! handle is dropped.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::SessionContext;

/// Capped exponential backoff over a base poll interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            failures: 0,
        }
    }

    /// Wait before the next poll.
    pub fn delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures);
        self.base.saturating_mul(factor).min(self.max)
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn record_success(&mut self) {
        self.failures = 0;
    }

    pub fn record_failure(&mut self) {
        self.failures = self.failures.saturating_add(1);
    }
}

/// Owns a running poller. Dropping it stops the task.
#[derive(Debug)]
pub struct PollerHandle {
    name: &'static str,
    task: JoinHandle<()>,
}

impl PollerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn stop(self) {}
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub(crate) fn spawn_session_poller<F, Fut>(
    name: &'static str,
    session: &SessionContext,
    interval: Duration,
    max_backoff: Duration,
    poll: F,
) -> PollerHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let mut alive = session.watch();
    let task = tokio::spawn(async move {
        let mut backoff = Backoff::new(interval, max_backoff);
        while !*alive.borrow_and_update() {
            debug!(poller = name, "Waiting for a session");
            if alive.changed().await.is_err() {
                return;
            }
        }
        info!(poller = name, ?interval, "Background poller started");
        while *alive.borrow_and_update() {
            match poll().await {
                Ok(()) => backoff.record_success(),
                Err(e) => {
                    backoff.record_failure();
                    debug!(
                        poller = name,
                        failures = backoff.failures(),
                        error = %e,
                        "Poll failed, backing off"
                    );
                }
            }
            tokio::select! {
                _ = tokio::time::sleep(backoff.delay()) => {}
                changed = alive.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        info!(poller = name, "Background poller stopped");
    });
    PollerHandle { name, task }
}
