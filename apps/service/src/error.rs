use thiserror::Error;

/// Failures reported synchronously to callers of the scheduler.
///
/// Transport failures never show up here: they are folded into a
/// [`ProbeResult`](crate::monitoring::ProbeResult) with status code 0.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Check interval too long: {interval} seconds (maximum: {max})")]
    IntervalTooLong { interval: u64, max: u64 },
    #[error("Check failed: {0}")]
    CheckFailed(String),
    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SchedulerError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.to_owned(), reason: reason.into() }
    }
}
