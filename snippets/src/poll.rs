//! Bounded, cancellable polling for eventually consistent reads.
//!
//! The delay between attempts is fixed; there is no backoff. With the default
//! policy the worst case is 10 attempts and roughly two seconds of waiting.

use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::errors::OpResult;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PollPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    /// Window before the poll start in which a match may have been received
    pub lookback: Duration,
    pub timeout: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            interval: Duration::from_millis(200),
            lookback: Duration::from_secs(60),
            timeout: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome<T> {
    Found(T),
    Exhausted { attempts: u32 },
    TimedOut { attempts: u32 },
    Cancelled { attempts: u32 },
}

impl<T> PollOutcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            PollOutcome::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// Receiving half of a cancellation flag
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

/// Sending half; dropping it never cancels
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    pub fn channel() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx })
    }

    /// A signal that can never fire
    pub fn never() -> CancelSignal {
        let (_handle, signal) = Self::channel();
        signal
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is requested. Pends forever if the handle
    /// was dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Run `attempt` until it yields `Some`, the attempt budget runs out, the
/// optional timeout elapses or `cancel` fires. A failed attempt counts as a
/// miss.
pub async fn poll_until<T, F, Fut>(
    policy: &PollPolicy,
    cancel: &CancelSignal,
    operation_name: &str,
    mut attempt: F,
) -> PollOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = OpResult<Option<T>>>,
{
    let deadline = policy.timeout.map(|timeout| Instant::now() + timeout);
    let mut attempts = 0;

    while attempts < policy.max_attempts {
        if cancel.is_cancelled() {
            return PollOutcome::Cancelled { attempts };
        }
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return PollOutcome::TimedOut { attempts };
        }

        attempts += 1;
        match attempt(attempts).await {
            Ok(Some(value)) => {
                debug!("{} matched on attempt {}", operation_name, attempts);
                return PollOutcome::Found(value);
            }
            Ok(None) => debug!("{}: no match on attempt {}", operation_name, attempts),
            Err(e) => warn!("{}: attempt {} failed: {}", operation_name, attempts, e),
        }

        if attempts == policy.max_attempts {
            break;
        }

        tokio::select! {
            _ = sleep(policy.interval) => {}
            _ = cancel.cancelled() => return PollOutcome::Cancelled { attempts },
        }
    }

    debug!("{} gave up after {} attempts", operation_name, attempts);
    PollOutcome::Exhausted { attempts }
}
