//! Pass/fail aggregation of stored results for listings and detail views.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{ProbeResult, Target, TargetStatus};

/// Results shown per target in listings
pub const SUMMARY_HISTORY: usize = 10;
/// Results shown on a target's detail view
pub const DETAILS_HISTORY: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetSummary {
    pub url: String,
    pub interval: u64,
    /// Newest first
    pub history: Vec<TargetStatus>,
    pub uptime_percentage: u32,
    pub status: TargetStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub status_code: u16,
    pub response_time: u64,
    pub is_up: bool,
    pub checked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetDetails {
    pub url: String,
    pub interval: u64,
    /// Newest first
    pub history: Vec<HistoryEntry>,
    pub uptime_percentage: u32,
}

/// Rounded share of up results, 0 when there are none.
pub fn uptime_percentage(results: &[ProbeResult]) -> u32 {
    if results.is_empty() {
        return 0;
    }
    let up = results.iter().filter(|r| r.is_up).count();
    (up as f64 / results.len() as f64 * 100.0).round() as u32
}

impl TargetSummary {
    /// `recent` comes from storage newest first.
    pub fn new(target: &Target, recent: &[ProbeResult]) -> Self {
        let recent = &recent[..recent.len().min(SUMMARY_HISTORY)];

        Self {
            url: target.url.clone(),
            interval: target.interval,
            history: recent.iter().map(ProbeResult::status).collect(),
            uptime_percentage: uptime_percentage(recent),
            status: recent.first().map_or(TargetStatus::Unknown, ProbeResult::status),
        }
    }
}

impl TargetDetails {
    /// `recent` comes from storage newest first.
    pub fn new(target: &Target, recent: &[ProbeResult]) -> Self {
        let recent = &recent[..recent.len().min(DETAILS_HISTORY)];

        Self {
            url: target.url.clone(),
            interval: target.interval,
            history: recent
                .iter()
                .map(|r| HistoryEntry {
                    status_code: r.status_code,
                    response_time: r.response_time,
                    is_up: r.is_up,
                    checked_at: r.checked_at,
                })
                .collect(),
            uptime_percentage: uptime_percentage(recent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn newest_first(codes: &[u16]) -> Vec<ProbeResult> {
        codes
            .iter()
            .enumerate()
            .map(|(i, code)| ProbeResult::from_response("https://a.test/", *code, 10, i as u64))
            .collect()
    }

    #[test]
    fn test_summary_without_results() {
        let summary = TargetSummary::new(&Target::new("https://a.test/", 30), &[]);
        assert_eq!(summary.status, TargetStatus::Unknown);
        assert_eq!(summary.uptime_percentage, 0);
        assert!(summary.history.is_empty());
    }

    #[test]
    fn test_summary_history_is_newest_first() {
        let summary = TargetSummary::new(&Target::new("https://a.test/", 30), &newest_first(&[200, 0, 500]));

        assert_eq!(summary.history, vec![TargetStatus::Up, TargetStatus::Unknown, TargetStatus::Down]);
        assert_eq!(summary.status, TargetStatus::Up);
        assert_eq!(summary.uptime_percentage, 33);
    }

    #[test]
    fn test_summary_keeps_last_ten() {
        let mut codes = vec![500; 10];
        codes.extend([200; 5]);
        let summary = TargetSummary::new(&Target::new("https://a.test/", 30), &newest_first(&codes));

        assert_eq!(summary.history.len(), 10);
        assert_eq!(summary.uptime_percentage, 0);
        assert_eq!(summary.status, TargetStatus::Down);
    }

    #[test]
    fn test_uptime_rounds() {
        assert_eq!(uptime_percentage(&newest_first(&[200, 200, 503])), 67);
        assert_eq!(uptime_percentage(&newest_first(&[200, 301])), 50);
    }

    #[test]
    fn test_details() {
        let details = TargetDetails::new(&Target::new("https://a.test/", 60), &newest_first(&[200, 404]));

        assert_eq!(details.interval, 60);
        assert_eq!(details.uptime_percentage, 50);
        assert!(details.history[0].is_up);
        assert_eq!(details.history[1].status_code, 404);
    }
}
