//! Circuit breaker for backend protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: backend assumed down, requests fail fast
//! - Half-Open: testing if backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: window of `max_failures` calls is full and every call failed or was slow
//! Open → Half-Open: after `open_state_duration`
//! Half-Open → Closed: the single trial call succeeds (window reset)
//! Half-Open → Open: the trial call fails (duration restarts)
//! ```
//!
//! # Design Decisions
//! - Fail fast in Open state (no waiting for timeout)
//! - Single trial in Half-Open (prevents hammering recovering backend)
//! - Open → Half-Open is evaluated lazily on the next call, no timer task
//! - The lock guards one breaker only and is never held across an await

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::config::FailoverConfig;
use crate::observability::metrics;

/// Failure rate (failed calls / window) at which the breaker opens.
pub const FAILURE_RATE_THRESHOLD: f64 = 1.0;
/// Slow call rate (slow calls / window) at which the breaker opens.
pub const SLOW_CALL_RATE_THRESHOLD: f64 = 1.0;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn as_gauge(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }
}

/// Tuning of a breaker, derived from the failover configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Number of calls in the sliding window.
    pub window_size: usize,
    /// Calls slower than this count as slow.
    pub slow_call_duration: Duration,
    /// How long the breaker stays open.
    pub open_state_duration: Duration,
}

impl From<&FailoverConfig> for BreakerSettings {
    fn from(config: &FailoverConfig) -> Self {
        Self {
            window_size: config.max_failures.max(1) as usize,
            slow_call_duration: Duration::from_millis(config.slow_call_duration_ms),
            open_state_duration: Duration::from_millis(config.open_state_duration_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Slow,
    Failure,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    window: VecDeque<Outcome>,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

/// A keyed failure-tracking state machine.
#[derive(Debug)]
pub struct CircuitBreaker {
    key: String,
    settings: BreakerSettings,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(key: impl Into<String>, settings: BreakerSettings) -> Self {
        Self {
            key: key.into(),
            settings,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                window: VecDeque::with_capacity(settings.window_size),
                opened_at: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state, after applying an elapsed open duration.
    pub fn state(&self) -> CircuitState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Ask permission for a call. `None` means the call must be rejected.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        let state = inner.state;
        match state {
            CircuitState::Closed => Some(CallPermit::new(self, false)),
            CircuitState::Open => None,
            CircuitState::HalfOpen if inner.trial_in_flight => None,
            CircuitState::HalfOpen => {
                inner.trial_in_flight = true;
                tracing::debug!(breaker = %self.key, "Trial call permitted");
                Some(CallPermit::new(self, true))
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state != CircuitState::Open {
            return;
        }
        let elapsed = inner
            .opened_at
            .map_or(true, |at| at.elapsed() >= self.settings.open_state_duration);
        if elapsed {
            inner.trial_in_flight = false;
            self.transition(inner, CircuitState::HalfOpen);
        }
    }

    fn transition(&self, inner: &mut Inner, to: CircuitState) {
        let from = inner.state;
        inner.state = to;
        match to {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                tracing::warn!(
                    breaker = %self.key,
                    from = ?from,
                    open_for_ms = self.settings.open_state_duration.as_millis() as u64,
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                tracing::info!(breaker = %self.key, "Circuit breaker half-open");
            }
            CircuitState::Closed => {
                inner.window.clear();
                inner.opened_at = None;
                tracing::info!(breaker = %self.key, "Circuit breaker closed");
            }
        }
        metrics::record_circuit_state(&self.key, to.as_gauge());
    }

    fn should_open(&self, window: &VecDeque<Outcome>) -> bool {
        let len = window.len() as f64;
        let failures = window.iter().filter(|o| **o == Outcome::Failure).count() as f64;
        let slow = window.iter().filter(|o| **o == Outcome::Slow).count() as f64;

        failures / len >= FAILURE_RATE_THRESHOLD
            || slow / len >= SLOW_CALL_RATE_THRESHOLD
            || (failures + slow) / len >= FAILURE_RATE_THRESHOLD.max(SLOW_CALL_RATE_THRESHOLD)
    }

    fn record(&self, outcome: Outcome, trial: bool) {
        let mut inner = self.lock();

        let state = inner.state;
        match state {
            CircuitState::Closed => {
                inner.window.push_back(outcome);
                while inner.window.len() > self.settings.window_size {
                    inner.window.pop_front();
                }
                if inner.window.len() == self.settings.window_size && self.should_open(&inner.window) {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen if trial => {
                inner.trial_in_flight = false;
                if outcome == Outcome::Success {
                    self.transition(&mut inner, CircuitState::Closed);
                } else {
                    self.transition(&mut inner, CircuitState::Open);
                }
            }
            // Late outcome of a call admitted before the last transition.
            _ => {}
        }
    }

    fn release_trial(&self) {
        let mut inner = self.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.trial_in_flight = false;
        }
    }
}

/// Permission for one call. Record its outcome exactly once.
#[derive(Debug)]
#[must_use = "the outcome of a permitted call must be recorded"]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    recorded: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, trial: bool) -> Self {
        Self {
            breaker,
            trial,
            recorded: false,
        }
    }

    /// Returns true if this permit is the Half-Open trial.
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    /// The call completed; calls slower than the threshold count as slow.
    pub fn on_success(mut self, elapsed: Duration) {
        self.recorded = true;
        let outcome = if elapsed > self.breaker.settings.slow_call_duration {
            Outcome::Slow
        } else {
            Outcome::Success
        };
        self.breaker.record(outcome, self.trial);
    }

    /// The call failed or timed out.
    pub fn on_failure(mut self) {
        self.recorded = true;
        self.breaker.record(Outcome::Failure, self.trial);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        // A cancelled trial frees the slot without deciding the state.
        if !self.recorded && self.trial {
            self.breaker.release_trial();
        }
    }
}
