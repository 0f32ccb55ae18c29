use std::sync::Arc;

use actix_web::web;
use logger::LevelFilter;
use tracing::subscriber::DefaultGuard;
use uptime_service::config::MonitoringConfig;
use uptime_service::monitoring::testing::{FakeChecker, MemoryDatabase};
use uptime_service::monitoring::{MonitoringScheduler, ResultSink};

use crate::state::AppState;

pub(crate) struct TestContext {
    pub state: web::Data<AppState>,
    pub database: Arc<MemoryDatabase>,
    _log_guard: DefaultGuard,
}

/// A stopped scheduler over in-memory storage whose probes always see 200
pub(crate) fn test_context() -> TestContext {
    let (log_control, log_guard) = logger::scoped(LevelFilter::INFO);
    let config = MonitoringConfig::default();
    let database = Arc::new(MemoryDatabase::new());
    let sink = Arc::new(ResultSink::spawn(database.clone(), 64, 64));
    let scheduler = MonitoringScheduler::new(config.clone(), Arc::new(FakeChecker::new(200)), database.clone(), sink);

    TestContext {
        state: web::Data::new(AppState {
            scheduler: Arc::new(scheduler),
            database: database.clone(),
            log_control: Arc::new(log_control),
            default_interval: config.default_interval_seconds,
        }),
        database,
        _log_guard: log_guard,
    }
}
