use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::{Error, Result};

/// Circuit breaker phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Calls flow through, failures are counted
    Closed,

    /// Calls fail fast until the reset timeout elapses
    Open,

    /// Probe calls are admitted one at a time
    HalfOpen,
}

/// Tuning for one circuit breaker
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Consecutive failures that trip the breaker
    pub failure_threshold: u32,

    /// Quiet period before an open breaker admits a probe
    pub reset_timeout: Duration,

    /// Consecutive probe successes required to close again
    pub success_threshold: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

#[derive(Debug)]
struct BreakerInner {
    state: BreakerState,
    consecutive_failures: u32,
    probe_successes: u32,
    probe_in_flight: bool,
    opened_at: Option<Instant>,
}

/// Admission ticket for one dependency call.
///
/// Holds the half-open probe slot while the call runs and is consumed by
/// `success` or `failure`. Dropping it unreported releases the slot, so a
/// caller cancelled mid-call cannot leave the breaker stuck rejecting
/// everything in half-open.
#[must_use]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    probe: bool,
    reported: bool,
}

impl CallPermit<'_> {
    /// Reports a successful call
    pub fn success(mut self) {
        self.reported = true;
        self.breaker.record_success();
    }

    /// Reports a failed call
    pub fn failure(mut self) {
        self.reported = true;
        self.breaker.record_failure();
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if self.probe && !self.reported {
            let mut inner = self.breaker.inner.lock();
            if inner.state == BreakerState::HalfOpen {
                inner.probe_in_flight = false;
            }
        }
    }
}

/// Point-in-time view of a breaker, for diagnostics
#[derive(Debug, Clone)]
pub struct BreakerSnapshot {
    /// Current phase
    pub state: BreakerState,

    /// Consecutive failures observed while closed
    pub consecutive_failures: u32,

    /// Time until an open breaker admits a probe, if open
    pub retry_after: Option<Duration>,
}

/// Per-dependency circuit breaker.
///
/// Trips open after a run of consecutive failures, fails fast while open,
/// then admits one probe at a time until enough successes close it. A
/// success while closed decays the failure counter by one instead of
/// clearing it, so a flapping dependency still trips.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a closed breaker for the named dependency
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                probe_successes: 0,
                probe_in_flight: false,
                opened_at: None,
            }),
        }
    }

    /// Gate checked before every call to the dependency.
    ///
    /// While open this fails fast without touching the dependency; once the
    /// reset timeout has elapsed exactly one caller wins the transition to
    /// half-open and becomes the probe. The returned permit reports the
    /// outcome; dropped unreported it frees the probe slot.
    pub fn try_acquire(&self) -> Result<CallPermit<'_>> {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => Ok(self.permit(false)),
            BreakerState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    inner.state = BreakerState::HalfOpen;
                    inner.probe_successes = 0;
                    inner.probe_in_flight = true;
                    info!("Circuit '{}' half-open, admitting probe", self.name);
                    Ok(self.permit(true))
                } else {
                    Err(Error::CircuitOpen {
                        dependency: self.name.clone(),
                        retry_after: self.config.reset_timeout - elapsed,
                    })
                }
            }
            BreakerState::HalfOpen => {
                if inner.probe_in_flight {
                    Err(Error::CircuitOpen {
                        dependency: self.name.clone(),
                        retry_after: Duration::ZERO,
                    })
                } else {
                    inner.probe_in_flight = true;
                    Ok(self.permit(true))
                }
            }
        }
    }

    fn permit(&self, probe: bool) -> CallPermit<'_> {
        CallPermit {
            breaker: self,
            probe,
            reported: false,
        }
    }

    /// Reports a successful call
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                // Gradual decay: one success does not erase a failure streak
                inner.consecutive_failures = inner.consecutive_failures.saturating_sub(1);
            }
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.probe_successes += 1;
                if inner.probe_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.opened_at = None;
                    info!(
                        "Circuit '{}' closed after {} successful probes",
                        self.name, inner.probe_successes
                    );
                }
            }
            // Late completion from a call admitted before the trip
            BreakerState::Open => {}
        }
    }

    /// Reports a failed call
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    warn!(
                        "Circuit '{}' opened after {} consecutive failures",
                        self.name, inner.consecutive_failures
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.probe_in_flight = false;
                inner.probe_successes = 0;
                inner.state = BreakerState::Open;
                inner.opened_at = Some(Instant::now());
                warn!("Circuit '{}' reopened by failed probe", self.name);
            }
            BreakerState::Open => {}
        }
    }

    /// Current phase
    pub fn state(&self) -> BreakerState {
        self.inner.lock().state
    }

    /// Diagnostic view of the breaker
    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock();
        let retry_after = match inner.state {
            BreakerState::Open => inner.opened_at.map(|at| {
                self.config
                    .reset_timeout
                    .saturating_sub(at.elapsed())
            }),
            _ => None,
        };
        BreakerSnapshot {
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            retry_after,
        }
    }

    /// Operator override: returns the breaker to closed with clean counters
    pub fn force_reset(&self) {
        let mut inner = self.inner.lock();
        inner.state = BreakerState::Closed;
        inner.consecutive_failures = 0;
        inner.probe_successes = 0;
        inner.probe_in_flight = false;
        inner.opened_at = None;
        info!("Circuit '{}' force reset", self.name);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> BreakerConfig {
        BreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(10),
            success_threshold: 2,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_trips_open_at_threshold() {
        let breaker = CircuitBreaker::new("gas-oracle:ethereum", test_config());

        breaker.record_failure();
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());

        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
        assert!(matches!(
            breaker.try_acquire(),
            Err(Error::CircuitOpen { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_probe_after_reset_timeout() {
        let breaker = CircuitBreaker::new("dep", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(breaker.try_acquire().is_err());

        tokio::time::advance(Duration::from_secs(1)).await;
        // First caller wins the probe slot, the second fails fast
        let _probe = breaker.try_acquire().unwrap();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);
        assert!(breaker.try_acquire().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_probe_releases_slot() {
        let breaker = CircuitBreaker::new("dep", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(10)).await;

        // Probe admitted, then its caller is cancelled before reporting
        let probe = breaker.try_acquire().unwrap();
        assert!(breaker.try_acquire().is_err());
        drop(probe);

        // The slot is free again no matter how much time passes: the next
        // caller becomes the probe and can close the breaker
        tokio::time::advance(Duration::from_secs(3600)).await;
        breaker.try_acquire().unwrap().success();
        breaker.try_acquire().unwrap().success();
        assert_eq!(breaker.state(), BreakerState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_successes_close() {
        let breaker = CircuitBreaker::new("dep", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(10)).await;

        breaker.try_acquire().unwrap().success();
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        breaker.try_acquire().unwrap().success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_failure_reopens() {
        let breaker = CircuitBreaker::new("dep", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        tokio::time::advance(Duration::from_secs(10)).await;

        breaker.try_acquire().unwrap().failure();
        assert_eq!(breaker.state(), BreakerState::Open);

        // Fresh timer: still failing fast right after the reopen
        assert!(breaker.try_acquire().is_err());
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(breaker.try_acquire().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_success_decays_counter() {
        let breaker = CircuitBreaker::new("dep", test_config());

        breaker.record_failure();
        breaker.record_failure();
        breaker.record_success();
        assert_eq!(breaker.snapshot().consecutive_failures, 1);

        // Two more failures reach the threshold of three
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[tokio::test(start_paused = true)]
    async fn test_force_reset() {
        let breaker = CircuitBreaker::new("dep", test_config());
        for _ in 0..3 {
            breaker.record_failure();
        }
        assert_eq!(breaker.state(), BreakerState::Open);

        breaker.force_reset();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert!(breaker.try_acquire().is_ok());
    }
}
