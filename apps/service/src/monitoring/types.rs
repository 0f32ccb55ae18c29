use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Pass/fail classification of a stored result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Up,
    Down,
    /// The target could not be reached at all (status code 0)
    Unknown,
}

impl std::fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetStatus::Up => write!(f, "up"),
            TargetStatus::Down => write!(f, "down"),
            TargetStatus::Unknown => write!(f, "unknown"),
        }
    }
}

/// A monitored URL and the interval it is polled at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    /// Seconds between probes
    pub interval: u64,
}

impl Target {
    pub fn new(url: impl Into<String>, interval: u64) -> Self {
        Self { url: url.into(), interval }
    }
}

/// Outcome of a single probe attempt. Never mutated once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    /// Normalized URL that was probed
    pub url: String,

    /// HTTP status code, 0 when the request never produced a response
    pub status_code: u16,

    /// Response latency in milliseconds, 0 on transport failure
    pub response_time: u64,

    /// Exactly `status_code == 200`
    pub is_up: bool,

    /// When the probe completed
    pub checked_at: DateTime<Utc>,

    /// Time-derived, strictly increasing identifier subscribers can de-duplicate on
    pub check_id: u64,
}

impl ProbeResult {
    /// Build a result from an HTTP response. Anything but 200 counts as down,
    /// redirects included.
    pub fn from_response(url: impl Into<String>, status_code: u16, response_time: u64, check_id: u64) -> Self {
        Self {
            url: url.into(),
            status_code,
            response_time,
            is_up: status_code == 200,
            checked_at: Utc::now(),
            check_id,
        }
    }

    /// Build the result of a probe that failed below HTTP (DNS, connect, timeout)
    pub fn unreachable(url: impl Into<String>, check_id: u64) -> Self {
        Self {
            url: url.into(),
            status_code: 0,
            response_time: 0,
            is_up: false,
            checked_at: Utc::now(),
            check_id,
        }
    }

    pub fn status(&self) -> TargetStatus {
        if self.is_up {
            TargetStatus::Up
        } else if self.status_code == 0 {
            TargetStatus::Unknown
        } else {
            TargetStatus::Down
        }
    }
}

/// What a throttled dispatch produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed(ProbeResult),
    /// Another probe for the same URL was dispatched too recently
    Suppressed,
}

impl CheckOutcome {
    pub fn result(&self) -> Option<&ProbeResult> {
        match self {
            CheckOutcome::Completed(result) => Some(result),
            CheckOutcome::Suppressed => None,
        }
    }

    pub fn is_suppressed(&self) -> bool {
        matches!(self, CheckOutcome::Suppressed)
    }
}

/// Hands out check ids: the current unix time in milliseconds, bumped when
/// two probes finish within the same millisecond.
#[derive(Debug, Default)]
pub struct CheckIdGenerator {
    last: AtomicU64,
}

impl CheckIdGenerator {
    pub fn next_id(&self) -> u64 {
        let now = u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default();
        let next = |previous: u64| now.max(previous + 1);

        match self.last.fetch_update(Ordering::AcqRel, Ordering::Acquire, |previous| Some(next(previous))) {
            Ok(previous) | Err(previous) => next(previous),
        }
    }
}
