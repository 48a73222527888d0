//! Bounded fixed-interval polling for eventually-consistent checks.
//!
//! The driver is deterministic: it is attempt-count-bounded rather than
//! wall-clock-bounded and uses a fixed interval without backoff, since
//! the wait is short-lived and human-observed. The inter-attempt sleep
//! is interrupted immediately by cancellation.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for one polling run.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Fixed wait between attempts.
    pub interval: Duration,
    /// Maximum number of probe calls before giving up.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    /// Payment-status defaults: 5 seconds between polls, 30 polls.
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_attempts: 30,
        }
    }
}

/// Classification of a single probe result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T, E> {
    /// Terminal success; polling stops with this value.
    Settled(T),
    /// Terminal failure; polling stops with this cause.
    Halt(E),
    /// Not there yet; poll again after the interval.
    Retry,
}

/// Result of a polling run. Every variant reports the number of probe
/// calls actually issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult<T, E> {
    /// The probe settled successfully.
    Settled { value: T, attempts: u32 },
    /// The probe reported a terminal failure.
    Halted { cause: E, attempts: u32 },
    /// The attempt budget ran out without a terminal result.
    Exhausted { attempts: u32 },
    /// Cancellation stopped the run before a terminal result.
    Cancelled { attempts: u32 },
}

/// Repeatedly invokes `probe` until it settles, halts, the attempt budget
/// is exhausted, or `cancel` fires.
///
/// Cancellation is checked before each probe and interrupts the
/// inter-attempt sleep immediately; once cancelled, no further probe call
/// is issued. The probe receives the 1-based attempt number.
pub async fn poll<T, E, F, Fut>(
    config: &PollConfig,
    cancel: &CancellationToken,
    mut probe: F,
) -> PollResult<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Probe<T, E>>,
{
    for attempt in 1..=config.max_attempts {
        if cancel.is_cancelled() {
            debug!(attempt, "polling cancelled before probe");
            return PollResult::Cancelled {
                attempts: attempt - 1,
            };
        }

        match probe(attempt).await {
            Probe::Settled(value) => {
                debug!(attempt, "probe settled");
                return PollResult::Settled { value, attempts: attempt };
            }
            Probe::Halt(cause) => {
                debug!(attempt, "probe halted");
                return PollResult::Halted { cause, attempts: attempt };
            }
            Probe::Retry => {
                debug!(attempt, max_attempts = config.max_attempts, "probe retryable");
            }
        }

        if attempt < config.max_attempts {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(attempt, "polling cancelled during wait");
                    return PollResult::Cancelled { attempts: attempt };
                }
                _ = tokio::time::sleep(config.interval) => {}
            }
        }
    }

    warn!(attempts = config.max_attempts, "polling exhausted attempt budget");
    PollResult::Exhausted {
        attempts: config.max_attempts,
    }
}
