//! Bounded polling against live control-plane state
//!
//! [`poll_until`] evaluates a predicate until it reports [`PollStatus::Done`],
//! returns an error, or the deadline elapses. The first evaluation happens
//! immediately; every later one follows a sleep of `interval` (shortened to
//! the remaining budget near the deadline). A predicate is therefore always
//! evaluated at least once, even with a zero deadline.
//!
//! Predicates must map "not created yet" to [`PollStatus::Pending`]. Any
//! `Err` they return is treated as unrecoverable and ends polling at once.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::trace;

use crate::Error;

/// Outcome of one predicate evaluation
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollStatus<T> {
    /// Converged; polling stops and yields the value
    Done(T),
    /// Not converged yet; optional description of the observed progress
    Pending(Option<String>),
}

impl<T> PollStatus<T> {
    /// Pending without a progress description
    pub fn pending() -> Self {
        Self::Pending(None)
    }

    /// Pending with a description of what was observed (e.g. "2/3 tracked")
    pub fn progress(observed: impl Into<String>) -> Self {
        Self::Pending(Some(observed.into()))
    }
}

/// Cadence and budget for one polling loop
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PollConfig {
    /// Time between predicate evaluations
    pub interval: Duration,
    /// Total time budget measured from the first evaluation
    pub deadline: Duration,
}

impl PollConfig {
    /// Create a config with a fixed deadline
    pub fn new(interval: Duration, deadline: Duration) -> Self {
        Self { interval, deadline }
    }

    /// Create a config whose deadline scales with the fleet size
    pub fn scaled(interval: Duration, base_timeout: Duration, expected_nodes: usize) -> Self {
        Self::new(interval, scaled_deadline(base_timeout, expected_nodes))
    }
}

/// Deadline for fleet-wide convergence: `base * max(expected_nodes, 1)`
///
/// A zero-node fleet (scale down to nothing) still gets one base timeout.
pub fn scaled_deadline(base: Duration, expected_nodes: usize) -> Duration {
    let factor = u32::try_from(expected_nodes.max(1)).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// Poll `predicate` until it is done, fails, or the deadline elapses
///
/// # Arguments
/// * `config` - Interval and deadline
/// * `operation` - Human-readable description used in logs and the timeout error
/// * `predicate` - Async check returning `Ok(Done(v))`, `Ok(Pending(_))` or `Err`
///
/// # Returns
/// The value carried by `Done`, the predicate's error, or [`Error::Timeout`]
/// carrying the last progress description the predicate reported.
pub async fn poll_until<T, F, Fut>(
    config: PollConfig,
    operation: &str,
    mut predicate: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<PollStatus<T>, Error>>,
{
    let start = Instant::now();
    let mut last_observed: Option<String> = None;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match predicate().await? {
            PollStatus::Done(value) => {
                trace!(operation = %operation, attempts, "poll condition met");
                return Ok(value);
            }
            PollStatus::Pending(observed) => {
                if observed.is_some() {
                    last_observed = observed;
                }
            }
        }

        let elapsed = start.elapsed();
        if elapsed >= config.deadline {
            return Err(Error::timeout(
                operation,
                config.deadline,
                last_observed.unwrap_or_else(|| "nothing".to_string()),
            ));
        }

        trace!(operation = %operation, attempts, "poll condition not yet met");
        let remaining = config.deadline - elapsed;
        tokio::time::sleep(config.interval.min(remaining)).await;
    }
}
