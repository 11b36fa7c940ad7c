//! Adaptive throttle between consecutive fetches
//!
//! The throttle is a feedback controller over a single delay value. Relief is
//! slow: the delay only shrinks after a long run of clean fetches. Punishment
//! is fast: a rate-limit signal doubles the delay at once, and a streak of
//! generic errors grows it on every further error.
//!
//! The weights below are tunable heuristics, not protocol constants.

use crate::config::ThrottleConfig;
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;

/// Consecutive successes needed before the delay relaxes
pub const SUCCESS_STREAK: u32 = 15;

/// Multiplier applied when a success streak completes
pub const RELIEF_FACTOR: f64 = 0.9;

/// Consecutive errors after which generic errors grow the delay
pub const ERROR_STREAK: u32 = 5;

/// Multiplier applied on a generic error once the error streak is reached
pub const ERROR_GROWTH: f64 = 1.2;

/// Multiplier applied on an explicit rate-limit response
pub const RATE_LIMIT_GROWTH: f64 = 2.0;

/// Kind of failed fetch reported to the throttle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSignal {
    /// Transport failure or unexpected status
    Generic,
    /// The remote explicitly asked us to slow down (HTTP 429)
    RateLimited,
}

/// Snapshot of the controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleState {
    pub current_delay: Duration,
    pub consecutive_successes: u32,
    pub consecutive_errors: u32,
    pub floor: Duration,
    pub ceiling: Duration,
}

/// Shared delay controller; one instance per harvesting run
#[derive(Debug)]
pub struct AdaptiveThrottle {
    state: Mutex<ThrottleState>,
    jitter: Duration,
}

impl AdaptiveThrottle {
    /// Creates a throttle starting at `base`, clamped to `[floor, ceiling]`
    pub fn new(base: Duration, floor: Duration, ceiling: Duration, jitter: Duration) -> Self {
        let ceiling = ceiling.max(floor);
        Self {
            state: Mutex::new(ThrottleState {
                current_delay: base.clamp(floor, ceiling),
                consecutive_successes: 0,
                consecutive_errors: 0,
                floor,
                ceiling,
            }),
            jitter,
        }
    }

    pub fn from_config(config: &ThrottleConfig) -> Self {
        Self::new(
            config.base_delay(),
            config.floor(),
            config.ceiling(),
            config.jitter(),
        )
    }

    /// Returns the delay to sleep before the next fetch
    ///
    /// This is the current delay plus a uniform jitter in `[0, jitter]` so that
    /// concurrent workers do not hit the remote in lock-step.
    pub fn delay_before_next(&self) -> Duration {
        let current = self.lock().current_delay;
        current + random_jitter(self.jitter)
    }

    /// Records a successful fetch
    pub fn record_success(&self) {
        let mut state = self.lock();
        state.consecutive_successes += 1;
        state.consecutive_errors = 0;

        if state.consecutive_successes >= SUCCESS_STREAK {
            state.current_delay = scale(state.current_delay, RELIEF_FACTOR).max(state.floor);
            state.consecutive_successes = 0;
            tracing::debug!(
                "Throttle relaxed to {:.2}s after a clean streak",
                state.current_delay.as_secs_f64()
            );
        }
    }

    /// Records a failed fetch
    pub fn record_error(&self, signal: ErrorSignal) {
        let mut state = self.lock();
        state.consecutive_errors += 1;
        state.consecutive_successes = 0;

        match signal {
            ErrorSignal::RateLimited => {
                state.current_delay =
                    scale(state.current_delay, RATE_LIMIT_GROWTH).min(state.ceiling);
                tracing::warn!(
                    "Rate limited, throttle raised to {:.2}s",
                    state.current_delay.as_secs_f64()
                );
            }
            ErrorSignal::Generic if state.consecutive_errors >= ERROR_STREAK => {
                state.current_delay = scale(state.current_delay, ERROR_GROWTH).min(state.ceiling);
                tracing::debug!(
                    "{} consecutive errors, throttle raised to {:.2}s",
                    state.consecutive_errors,
                    state.current_delay.as_secs_f64()
                );
            }
            ErrorSignal::Generic => {}
        }
    }

    /// Raises the floor (e.g. to honour a robots.txt crawl delay)
    ///
    /// The ceiling and the current delay are lifted as needed so the bounds
    /// stay ordered.
    pub fn raise_floor(&self, floor: Duration) {
        let mut state = self.lock();
        if floor > state.floor {
            state.floor = floor;
            state.ceiling = state.ceiling.max(floor);
            state.current_delay = state.current_delay.max(floor);
        }
    }

    pub fn current_delay(&self) -> Duration {
        self.lock().current_delay
    }

    pub fn snapshot(&self) -> ThrottleState {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Multiplies a duration, rounding to the nearest nanosecond
fn scale(delay: Duration, factor: f64) -> Duration {
    Duration::from_nanos((delay.as_nanos() as f64 * factor).round() as u64)
}

fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    Duration::from_secs_f64(rand::rng().random_range(0.0..=max.as_secs_f64()))
}
