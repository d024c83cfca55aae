//! Poll timing and wall-clock timeout enforcement
//!
//! All timing goes through the [`Clock`] trait so the poll loop and retry
//! backoff can be driven by a manual clock in tests:
//! - `interval_seconds`: delay between two progress queries
//! - `timeout_seconds`: wall-clock budget for one ticket, measured from the
//!   start of its poll loop

use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Source of time and blocking delays
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the caller for `duration`
    fn sleep(&self, duration: Duration);
}

/// Real time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Manually advanced clock; `sleep` advances time instantly
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
    sleeps: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
            sleeps: Mutex::new(Vec::new()),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(|e| e.into_inner());
        *offset += by;
    }

    /// Time elapsed since the clock was created
    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(duration);
        self.advance(duration);
    }
}

/// Poll configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Delay between progress queries (default: 5)
    pub interval_seconds: u64,

    /// Wall-clock budget per ticket (default: 1200 = 20 min)
    pub timeout_seconds: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            timeout_seconds: 1200,
        }
    }
}

impl PollConfig {
    /// Validate poll configuration bounds
    pub fn validate(&self) -> Result<(), TimeoutValidationError> {
        // interval_seconds must be in (0, 3600]
        if self.interval_seconds == 0 || self.interval_seconds > 3600 {
            return Err(TimeoutValidationError::IntervalOutOfBounds {
                value: self.interval_seconds,
            });
        }

        // timeout_seconds must be in [interval_seconds, 86400]
        if self.timeout_seconds < self.interval_seconds || self.timeout_seconds > 86400 {
            return Err(TimeoutValidationError::TimeoutOutOfBounds {
                value: self.timeout_seconds,
                min: self.interval_seconds,
            });
        }

        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Poll validation errors
#[derive(Debug, thiserror::Error)]
pub enum TimeoutValidationError {
    #[error("poll interval_seconds must be in (0, 3600], got {value}")]
    IntervalOutOfBounds { value: u64 },

    #[error("poll timeout_seconds must be in [{min}, 86400], got {value}")]
    TimeoutOutOfBounds { value: u64, min: u64 },
}

/// Timeout check result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutStatus {
    /// Budget not yet exceeded
    Ok,
    /// Wall-clock budget exceeded
    Exceeded,
}

impl TimeoutStatus {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TimeoutStatus::Exceeded)
    }
}

/// Wall-clock budget for one poll loop
///
/// The enforcer only reports; the caller decides to stop polling.
pub struct TimeoutEnforcer<'a> {
    clock: &'a dyn Clock,
    budget: Duration,
    start_time: Instant,
}

impl<'a> TimeoutEnforcer<'a> {
    /// Start measuring now
    pub fn start(clock: &'a dyn Clock, budget: Duration) -> Self {
        Self {
            clock,
            budget,
            start_time: clock.now(),
        }
    }

    /// Exceeded only once elapsed time is strictly greater than the budget
    pub fn check(&self) -> TimeoutStatus {
        if self.elapsed() > self.budget {
            TimeoutStatus::Exceeded
        } else {
            TimeoutStatus::Ok
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start_time)
    }
}
