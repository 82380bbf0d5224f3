//! Timeout policies and the timers that track one blocking operation.
//!
//! A [`TimeoutPolicy`] answers "how long may this logical operation run". At the
//! start of every blocking operation the policy produces a fresh [`Timer`],
//! which the polling loop consults before each round. Timers are pure
//! bookkeeping; they never sleep.
//!
//! Timers are built on [`tokio::time::Instant`] so a paused test runtime
//! controls them together with every sleep in the crate.

use crate::message::Timestamp;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

/// How long a blocking queue operation may run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TimeoutPolicy {
    /// Never expires
    #[default]
    Infinite,
    /// Expires a fixed period after the operation starts
    Constant {
        #[serde(rename = "period_ms", with = "duration_millis")]
        period: Duration,
    },
    /// Expires at an absolute wall-clock instant
    Deadline { at: Timestamp },
}

impl TimeoutPolicy {
    /// Policy expiring `period` after each operation starts
    pub fn constant(period: Duration) -> Self {
        Self::Constant { period }
    }

    /// Policy expiring at the given instant
    pub fn deadline(at: Timestamp) -> Self {
        Self::Deadline { at }
    }

    /// Start a timer for one logical operation
    pub fn new_timer(&self) -> Timer {
        let started_at = Instant::now();
        let expires_at = match self {
            Self::Infinite => None,
            // A period too large to represent behaves as no timeout at all
            Self::Constant { period } => started_at.checked_add(*period),
            Self::Deadline { at } => {
                // A deadline already in the past yields an expired timer
                let left = (at.as_datetime() - Utc::now())
                    .to_std()
                    .unwrap_or(Duration::ZERO);
                started_at.checked_add(left)
            }
        };

        Timer {
            started_at,
            expires_at,
        }
    }

    /// Check if the policy can ever expire
    pub fn is_finite(&self) -> bool {
        !matches!(self, Self::Infinite)
    }
}

impl From<Duration> for TimeoutPolicy {
    fn from(period: Duration) -> Self {
        Self::constant(period)
    }
}

impl fmt::Display for TimeoutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Infinite => write!(f, "infinite"),
            Self::Constant { period } => write!(f, "constant({:?})", period),
            Self::Deadline { at } => write!(f, "deadline({})", at),
        }
    }
}

/// Remaining budget of one blocking operation
#[derive(Debug, Clone)]
pub struct Timer {
    started_at: Instant,
    expires_at: Option<Instant>,
}

impl Timer {
    /// Time left before expiry; zero once expired, [`Duration::MAX`] when infinite
    pub fn remaining(&self) -> Duration {
        match self.expires_at {
            None => Duration::MAX,
            Some(expires_at) => expires_at.saturating_duration_since(Instant::now()),
        }
    }

    /// Check if the budget is used up; infinite timers never expire
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            None => false,
            Some(_) => self.remaining().is_zero(),
        }
    }

    /// Check if the timer can ever expire
    pub fn is_infinite(&self) -> bool {
        self.expires_at.is_none()
    }

    /// Time since the timer was started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Server-side wait for one long-poll round
///
/// Bounded by the service's per-call cap and by the caller's remaining budget,
/// so a single round never overshoots the overall timeout. Fractions of a
/// second round down; an exhausted budget yields zero.
pub fn long_poll_wait_seconds(max_wait_seconds: u32, remaining: Duration) -> u32 {
    let remaining_seconds = u32::try_from(remaining.as_secs()).unwrap_or(u32::MAX);
    max_wait_seconds.min(remaining_seconds)
}

/// Serde helper storing a [`Duration`] as whole milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
#[path = "timeout_tests.rs"]
mod tests;
