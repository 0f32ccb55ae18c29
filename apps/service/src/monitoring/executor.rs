use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::checker::Checker;
use super::sink::ResultSink;
use super::throttle::Throttle;
use super::types::{CheckIdGenerator, CheckOutcome, ProbeResult};

/// Monitoring executor - runs individual probes through the throttle and
/// hands their results to the sink
pub struct MonitoringExecutor {
    checker: Arc<dyn Checker>,
    throttle: Throttle,
    sink: Arc<ResultSink>,
    check_ids: CheckIdGenerator,
}

impl MonitoringExecutor {
    pub fn new(checker: Arc<dyn Checker>, throttle_window: Duration, sink: Arc<ResultSink>) -> Self {
        Self {
            checker,
            throttle: Throttle::new(throttle_window),
            sink,
            check_ids: CheckIdGenerator::default(),
        }
    }

    /// Execute one probe. Transport failures become a status 0 result.
    pub async fn probe(&self, url: &str) -> ProbeResult {
        match self.checker.check(url).await {
            Ok(response) => {
                let result =
                    ProbeResult::from_response(url, response.status_code, response.latency_ms, self.check_ids.next_id());
                info!(
                    url,
                    status_code = result.status_code,
                    response_time = result.response_time,
                    "Checked {}: {}",
                    url,
                    result.status()
                );
                result
            }
            Err(e) => {
                warn!(url, "Probe failed: {:#}", e);
                ProbeResult::unreachable(url, self.check_ids.next_id())
            }
        }
    }

    /// Throttled probe, published on completion.
    pub async fn check(&self, url: &str) -> CheckOutcome {
        if !self.throttle.try_dispatch(url) {
            debug!(url, "Skipping check, last dispatch was too recent");
            return CheckOutcome::Suppressed;
        }

        let result = self.probe(url).await;
        self.sink.publish(&result);
        CheckOutcome::Completed(result)
    }

    /// Like [`check`](Self::check), but gives up without publishing anything
    /// if `token` fires while the probe is in flight.
    pub async fn check_cancellable(&self, url: &str, token: &CancellationToken) -> Option<CheckOutcome> {
        if !self.throttle.try_dispatch(url) {
            debug!(url, "Skipping check, last dispatch was too recent");
            return Some(CheckOutcome::Suppressed);
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => {
                debug!(url, "Probe abandoned on stop signal");
                return None;
            }
            result = self.probe(url) => result,
        };

        self.sink.publish(&result);
        Some(CheckOutcome::Completed(result))
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }
}
