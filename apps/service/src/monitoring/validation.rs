//! Target validation: URL normalization and interval bounds.

use url::Url;

use crate::config::MonitoringConfig;
use crate::error::SchedulerError;

/// Normalize a user supplied URL into the key a target is identified by.
///
/// A missing scheme defaults to `https://`. Only http and https with a host
/// are accepted.
pub fn normalize_url(raw: &str) -> Result<String, SchedulerError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(SchedulerError::invalid_url(raw, "URL cannot be empty"));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_owned()
    } else {
        format!("https://{trimmed}")
    };

    let url = Url::parse(&candidate).map_err(|e| SchedulerError::invalid_url(raw, e.to_string()))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(SchedulerError::invalid_url(
                raw,
                format!("Invalid scheme '{other}'. Must be http or https"),
            ));
        }
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(SchedulerError::invalid_url(raw, "URL must have a valid host"));
    }

    Ok(url.into())
}

/// Raise an interval to the configured floor; reject one above the ceiling.
pub fn clamp_interval(interval_seconds: u64, config: &MonitoringConfig) -> Result<u64, SchedulerError> {
    if interval_seconds > config.max_interval_seconds {
        return Err(SchedulerError::IntervalTooLong {
            interval: interval_seconds,
            max: config.max_interval_seconds,
        });
    }

    Ok(interval_seconds.max(config.min_interval_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheme_defaults_to_https() {
        assert_eq!(normalize_url("example.com").unwrap(), "https://example.com/");
        assert_eq!(normalize_url("  example.com/status ").unwrap(), "https://example.com/status");
        assert_eq!(normalize_url("http://example.com:8080").unwrap(), "http://example.com:8080/");
    }

    #[test]
    fn test_equivalent_spellings_share_a_key() {
        assert_eq!(normalize_url("HTTPS://Example.com").unwrap(), normalize_url("example.com/").unwrap());
    }

    #[test]
    fn test_rejects_malformed_urls() {
        assert!(matches!(normalize_url(""), Err(SchedulerError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("   "), Err(SchedulerError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("ftp://example.com"), Err(SchedulerError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("https://"), Err(SchedulerError::InvalidUrl { .. })));
        assert!(matches!(normalize_url("http://exa mple.com"), Err(SchedulerError::InvalidUrl { .. })));
    }

    #[test]
    fn test_clamp_interval() {
        let config = MonitoringConfig::default();
        assert_eq!(clamp_interval(0, &config).unwrap(), 5);
        assert_eq!(clamp_interval(1, &config).unwrap(), 5);
        assert_eq!(clamp_interval(5, &config).unwrap(), 5);
        assert_eq!(clamp_interval(60, &config).unwrap(), 60);
        assert_eq!(clamp_interval(86_400, &config).unwrap(), 86_400);
        assert!(matches!(
            clamp_interval(86_401, &config),
            Err(SchedulerError::IntervalTooLong { interval: 86_401, max: 86_400 })
        ));
    }
}
