use std::sync::Arc;

use logger::LogControl;
use uptime_service::database::Database;
use uptime_service::monitoring::MonitoringScheduler;

/// Shared by every worker
pub struct AppState {
    pub scheduler: Arc<MonitoringScheduler>,
    /// Read path for history queries
    pub database: Arc<dyn Database>,
    pub log_control: Arc<LogControl>,
    /// Used when a client adds a target without an interval
    pub default_interval: u64,
}
