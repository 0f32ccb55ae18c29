/// Monitoring engine module - the concurrent polling scheduler
///
/// This module is responsible for:
/// - Probing targets over HTTP and classifying the outcome
/// - Running one poll loop per target and managing their lifecycle
/// - Throttling redundant probes per URL
/// - Publishing results to storage and live subscribers
pub mod checker;
pub mod executor;
pub(crate) mod poll_loop;
pub mod registry;
pub mod scheduler;
pub mod sink;
pub mod summary;
pub mod throttle;
pub mod types;
pub mod validation;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use checker::{Checker, HttpChecker, ProbeResponse};
pub use executor::MonitoringExecutor;
pub use registry::TargetRegistry;
pub use scheduler::{AddOutcome, AddedTarget, MonitoringScheduler};
pub use sink::{LiveEvent, ResultSink, STATUS_UPDATE_EVENT};
pub use summary::{DETAILS_HISTORY, SUMMARY_HISTORY, TargetDetails, TargetSummary};
pub use types::{CheckOutcome, ProbeResult, Target, TargetStatus};
pub use validation::{clamp_interval, normalize_url};
