use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span};

use super::executor::MonitoringExecutor;
use super::registry::TargetRegistry;
use crate::config::MonitoringConfig;

#[derive(Debug, PartialEq, Eq)]
enum Pause {
    Elapsed,
    Stop,
}

enum Attempt {
    Done,
    Stopped,
    Failed,
}

/// The recurring task that probes one target.
///
/// It exits only when its token is cancelled or its URL leaves the registry.
pub(crate) struct PollLoop {
    url: String,
    registry: Arc<TargetRegistry>,
    executor: Arc<MonitoringExecutor>,
    token: CancellationToken,
    recent_check_window: Duration,
    sleep_slice: Duration,
    error_backoff: Duration,
}

impl PollLoop {
    pub(crate) fn new(
        url: &str,
        registry: Arc<TargetRegistry>,
        executor: Arc<MonitoringExecutor>,
        token: CancellationToken,
        config: &MonitoringConfig,
    ) -> Self {
        Self {
            url: url.to_owned(),
            registry,
            executor,
            token,
            recent_check_window: config.recent_check_window(),
            sleep_slice: config.sleep_slice(),
            error_backoff: config.error_backoff(),
        }
    }

    pub(crate) fn spawn(self, runtime: &Handle) -> JoinHandle<()> {
        let span = info_span!("poll_loop", url = %self.url);
        runtime.spawn(self.run().instrument(span))
    }

    async fn run(self) {
        info!("Poll loop started");

        let mut probe_now = !self
            .executor
            .throttle()
            .dispatched_within(&self.url, self.recent_check_window);
        if !probe_now {
            debug!("Skipping immediate probe, target was checked recently");
        }

        loop {
            if !probe_now {
                let Some(interval) = self.registry.interval_of(&self.url) else {
                    break;
                };
                if self.pause_until(self.next_due(interval)).await == Pause::Stop {
                    break;
                }
            }
            probe_now = false;

            match self.attempt().await {
                Attempt::Done => {}
                Attempt::Stopped => break,
                Attempt::Failed => {
                    if self.pause_until(Instant::now() + self.error_backoff).await == Pause::Stop {
                        break;
                    }
                    probe_now = true;
                }
            }
        }

        info!("Poll loop stopped");
    }

    async fn attempt(&self) -> Attempt {
        let check = self.executor.check_cancellable(&self.url, &self.token);
        match AssertUnwindSafe(check).catch_unwind().await {
            Ok(Some(_)) => Attempt::Done,
            Ok(None) => Attempt::Stopped,
            Err(panic) => {
                error!(
                    backoff_seconds = self.error_backoff.as_secs(),
                    "Poll loop iteration failed: {}",
                    panic_message(panic.as_ref())
                );
                Attempt::Failed
            }
        }
    }

    /// One interval after the last dispatch of this URL, by this loop or an
    /// on-demand check. Probe latency does not push the next probe back.
    fn next_due(&self, interval: u64) -> Instant {
        let last = self
            .executor
            .throttle()
            .last_dispatched(&self.url)
            .unwrap_or_else(Instant::now);
        last + Duration::from_secs(interval)
    }

    /// Sleep until `deadline` in slices, giving up early on a stop signal or
    /// when the target is no longer registered.
    async fn pause_until(&self, deadline: Instant) -> Pause {
        loop {
            let now = Instant::now();
            if now >= deadline {
                return Pause::Elapsed;
            }

            tokio::select! {
                biased;
                _ = self.token.cancelled() => return Pause::Stop,
                _ = tokio::time::sleep(self.sleep_slice.min(deadline - now)) => {}
            }

            if !self.registry.contains(&self.url) {
                debug!("Target no longer registered");
                return Pause::Stop;
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::sink::ResultSink;
    use crate::monitoring::testing::{FakeChecker, MemoryDatabase};

    struct Fixture {
        registry: Arc<TargetRegistry>,
        executor: Arc<MonitoringExecutor>,
        checker: Arc<FakeChecker>,
        config: MonitoringConfig,
    }

    fn fixture() -> Fixture {
        let config = MonitoringConfig::default();
        let checker = Arc::new(FakeChecker::new(200));
        let sink = Arc::new(ResultSink::spawn(Arc::new(MemoryDatabase::new()), 64, 64));
        Fixture {
            registry: Arc::new(TargetRegistry::new(config.min_interval_seconds)),
            executor: Arc::new(MonitoringExecutor::new(checker.clone(), config.throttle_window(), sink)),
            checker,
            config,
        }
    }

    impl Fixture {
        fn spawn(&self, url: &str, token: &CancellationToken) -> JoinHandle<()> {
            PollLoop::new(url, self.registry.clone(), self.executor.clone(), token.clone(), &self.config)
                .spawn(&Handle::current())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_exits_when_target_leaves_registry() {
        let fixture = fixture();
        fixture.registry.upsert("https://a.test/", 30);
        let task = fixture.spawn("https://a.test/", &CancellationToken::new());

        tokio::time::sleep(Duration::from_secs(1)).await;
        fixture.registry.remove("https://a.test/");

        tokio::time::timeout(Duration::from_millis(600), task).await.unwrap().unwrap();
        assert_eq!(fixture.checker.probe_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_skips_immediate_probe_after_recent_dispatch() {
        let fixture = fixture();
        fixture.registry.upsert("https://a.test/", 10);
        fixture.executor.check("https://a.test/").await;
        let started = Instant::now();

        let token = CancellationToken::new();
        let _task = fixture.spawn("https://a.test/", &token);
        tokio::time::sleep(Duration::from_secs(11)).await;
        token.cancel();

        let probes = fixture.checker.probes_for("https://a.test/");
        assert_eq!(probes.len(), 2);
        assert_eq!(probes[1] - started, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failures_keep_the_loop_alive() {
        let fixture = fixture();
        fixture.checker.set_status(0);
        fixture.registry.upsert("https://a.test/", 5);

        let token = CancellationToken::new();
        let task = fixture.spawn("https://a.test/", &token);
        tokio::time::sleep(Duration::from_secs(16)).await;

        assert_eq!(fixture.checker.probe_count(), 4);
        assert!(!task.is_finished());
        token.cancel();
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new(String::from("boom"));
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
