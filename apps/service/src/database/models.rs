use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::monitoring::types::Target;

/// Row of the `monitored_urls` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitoredUrl {
    pub id: Option<i64>,
    pub url: String,
    pub interval_seconds: u64,
    pub created_at: DateTime<Utc>,
}

impl MonitoredUrl {
    pub fn into_target(self) -> Target {
        Target::new(self.url, self.interval_seconds)
    }
}

/// Convert a timestamp to unix milliseconds for storage
pub fn datetime_to_millis(time: DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

/// Convert stored unix milliseconds back to a timestamp
pub fn millis_to_datetime(millis: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(millis).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_roundtrip_keeps_millisecond_precision() {
        let now = Utc::now();
        let restored = millis_to_datetime(datetime_to_millis(now));
        assert_eq!(restored.timestamp_millis(), now.timestamp_millis());
    }
}
