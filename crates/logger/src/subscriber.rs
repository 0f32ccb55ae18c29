use std::env::var;

use tracing::{level_filters::LevelFilter, subscriber::DefaultGuard, warn};
use tracing_subscriber::{Layer, filter::EnvFilter, layer::SubscriberExt, reload, util::SubscriberInitExt};

use crate::control::{FilterState, LogControl};

pub fn init() -> LogControl {
    init_with_level(LevelFilter::INFO)
}

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` directives are layered on top of `level`. The filter sits behind a
/// reload layer so the returned [`LogControl`] can change it while running.
pub fn init_with_level(level: LevelFilter) -> LogControl {
    let directives = var(EnvFilter::DEFAULT_ENV).unwrap_or_default();
    let state = FilterState::parse(level, &directives);
    let (filter, handle) = reload::Layer::new(state.build());

    let log_format = var("RUST_LOG_FORMAT")
        .inspect_err(|error| {
            warn!("Failed to read RUST_LOG_FORMAT, falling back to default: {error}")
        })
        .unwrap_or_default();

    let log_layer = match log_format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().compact().without_time().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(log_layer).init();

    LogControl::new(handle, state)
}

/// Install a thread-local subscriber that lives as long as the returned guard.
/// Meant for tests that need a working [`LogControl`].
pub fn scoped(level: LevelFilter) -> (LogControl, DefaultGuard) {
    scoped_with(level, "")
}

/// Like [`scoped`], with `RUST_LOG` style `directives` on top of `level`.
pub fn scoped_with(level: LevelFilter, directives: &str) -> (LogControl, DefaultGuard) {
    let state = FilterState::parse(level, directives);
    let (filter, handle) = reload::Layer::new(state.build());

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer());
    let guard = tracing::subscriber::set_default(subscriber);

    (LogControl::new(handle, state), guard)
}
