use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::checker::Checker;
use super::executor::MonitoringExecutor;
use super::poll_loop::PollLoop;
use super::registry::TargetRegistry;
use super::sink::{LiveEvent, ResultSink};
use super::types::{CheckOutcome, Target};
use super::validation::{clamp_interval, normalize_url};
use crate::config::MonitoringConfig;
use crate::database::Database;
use crate::error::SchedulerError;

/// What [`MonitoringScheduler::add_target`] did with an existing registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum AddOutcome {
    Added,
    /// Already registered with this interval
    Unchanged,
    /// The loop was restarted with a new interval
    Retuned { previous: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AddedTarget {
    pub url: String,
    pub interval: u64,
    #[serde(flatten)]
    pub outcome: AddOutcome,
}

struct LoopHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl LoopHandle {
    fn is_live(&self) -> bool {
        !self.task.is_finished()
    }
}

#[derive(Default)]
struct SchedulerState {
    running: bool,
    loops: HashMap<String, LoopHandle>,
}

/// Monitoring scheduler - owns the target registry and one poll loop per target.
///
/// Every mutation of the registry or the loop set happens while holding the
/// state lock, so add, remove and retune of a URL are atomic with respect to
/// each other. Poll loops and on-demand probes run on the runtime the
/// scheduler was created in.
pub struct MonitoringScheduler {
    config: MonitoringConfig,
    registry: Arc<TargetRegistry>,
    executor: Arc<MonitoringExecutor>,
    database: Arc<dyn Database>,
    runtime: Handle,
    state: Mutex<SchedulerState>,
}

impl MonitoringScheduler {
    /// Create a stopped scheduler with an empty registry.
    ///
    /// # Panics
    ///
    /// When called outside of a tokio runtime.
    pub fn new(
        config: MonitoringConfig,
        checker: Arc<dyn Checker>,
        database: Arc<dyn Database>,
        sink: Arc<ResultSink>,
    ) -> Self {
        let executor = Arc::new(MonitoringExecutor::new(checker, config.throttle_window(), sink));

        Self {
            registry: Arc::new(TargetRegistry::new(config.min_interval_seconds)),
            executor,
            database,
            runtime: Handle::current(),
            state: Mutex::new(SchedulerState::default()),
            config,
        }
    }

    pub fn config(&self) -> &MonitoringConfig {
        &self.config
    }

    /// Seed the registry from storage. Entries that no longer validate are
    /// skipped, rows that normalize differently are rewritten. Returns how many
    /// targets were loaded.
    pub async fn load_targets(&self) -> Result<usize, SchedulerError> {
        let stored = self.database.load_all_targets().await?;
        let mut state = self.state.lock().await;

        let mut loaded = 0;
        for target in stored {
            let validated = normalize_url(&target.url)
                .and_then(|url| Ok((url, clamp_interval(target.interval, &self.config)?)));

            match validated {
                Ok((url, interval)) => {
                    if url != target.url || interval != target.interval {
                        self.rewrite_stored(&target, &url, interval).await;
                    }
                    self.registry.upsert(&url, interval);
                    if state.running && !state.loops.get(&url).is_some_and(LoopHandle::is_live) {
                        let handle = self.spawn_loop(&url);
                        state.loops.insert(url, handle);
                    }
                    loaded += 1;
                }
                Err(e) => warn!(url = %target.url, "Skipping stored target: {}", e),
            }
        }

        info!("Loaded {} targets from storage", loaded);
        Ok(loaded)
    }

    /// Replace a stored row with its normalized form so later removals match it.
    async fn rewrite_stored(&self, stored: &Target, url: &str, interval: u64) {
        debug!(stored = %stored.url, url = %url, interval, "Rewriting stored target");
        if let Err(e) = self.database.persist_target(url, interval).await {
            error!(url = %url, "Failed to persist normalized target: {:#}", e);
            return;
        }
        if url == stored.url {
            return;
        }
        if let Err(e) = self.database.delete_target(&stored.url).await {
            error!(url = %stored.url, "Failed to delete stale target row: {:#}", e);
        }
    }

    /// Register `url`, or retune it when it is already registered with a
    /// different interval. Intervals below the floor are clamped.
    pub async fn add_target(&self, url: &str, interval_seconds: u64) -> Result<AddedTarget, SchedulerError> {
        let url = normalize_url(url)?;
        let interval = clamp_interval(interval_seconds, &self.config)?;

        let mut state = self.state.lock().await;

        let outcome = match self.registry.interval_of(&url) {
            None => AddOutcome::Added,
            Some(current) if current == interval => AddOutcome::Unchanged,
            Some(previous) => AddOutcome::Retuned { previous },
        };

        if let AddOutcome::Retuned { previous } = outcome {
            if let Some(handle) = state.loops.remove(&url) {
                debug!(url = %url, previous, interval, "Stopping poll loop to apply new interval");
                self.stop_loop(&url, handle).await;
            }
        }

        self.registry.upsert(&url, interval);
        if let Err(e) = self.database.persist_target(&url, interval).await {
            error!(url = %url, "Failed to persist target: {:#}", e);
        }

        if state.running && !state.loops.get(&url).is_some_and(LoopHandle::is_live) {
            let handle = self.spawn_loop(&url);
            state.loops.insert(url.clone(), handle);
        }

        match outcome {
            AddOutcome::Added => info!(url = %url, interval, "Target added"),
            AddOutcome::Unchanged => debug!(url = %url, interval, "Target already registered"),
            AddOutcome::Retuned { previous } => info!(url = %url, previous, interval, "Target interval changed"),
        }

        Ok(AddedTarget { url, interval, outcome })
    }

    /// Unregister `url` and wait for its loop to exit. Returns `false` when it
    /// was not registered, which includes URLs that do not parse.
    pub async fn remove_target(&self, url: &str) -> bool {
        let Ok(url) = normalize_url(url) else {
            return false;
        };

        let mut state = self.state.lock().await;

        let removed = self.registry.remove(&url);
        if let Some(handle) = state.loops.remove(&url) {
            self.stop_loop(&url, handle).await;
        }

        if removed.is_none() {
            debug!(url = %url, "Remove requested for unknown target");
            return false;
        }

        self.executor.throttle().forget(&url);
        if let Err(e) = self.database.delete_target(&url).await {
            error!(url = %url, "Failed to delete target from storage: {:#}", e);
        }

        info!(url = %url, "Target removed");
        true
    }

    pub fn list_targets(&self) -> Vec<Target> {
        self.registry.snapshot()
    }

    /// The registered target for `url`, if any.
    pub fn target(&self, url: &str) -> Option<Target> {
        let url = normalize_url(url).ok()?;
        let interval = self.registry.interval_of(&url)?;
        Some(Target::new(url, interval))
    }

    /// Probe `url` right away, subject to the same throttle as the loops.
    /// The URL does not have to be registered.
    pub async fn check_now(&self, url: &str) -> Result<CheckOutcome, SchedulerError> {
        let url = normalize_url(url)?;
        let retention = self.config.throttle_window().max(self.config.recent_check_window());
        self.executor
            .throttle()
            .prune(retention, |url| self.registry.contains(url));

        let executor = self.executor.clone();

        self.runtime
            .spawn(async move { executor.check(&url).await })
            .await
            .map_err(|e| SchedulerError::CheckFailed(e.to_string()))
    }

    #[cfg(test)]
    pub(crate) fn executor(&self) -> &MonitoringExecutor {
        &self.executor
    }

    /// Spawn one loop per registered target. Does nothing when already running.
    pub async fn start_all(&self) {
        let mut state = self.state.lock().await;
        if state.running {
            debug!("Monitoring already running");
            return;
        }

        let strays: Vec<_> = state.loops.drain().collect();
        if !strays.is_empty() {
            warn!("Stopping {} stray poll loops before start", strays.len());
            self.stop_loops(strays).await;
        }

        for target in self.registry.snapshot() {
            let handle = self.spawn_loop(&target.url);
            state.loops.insert(target.url, handle);
        }
        state.running = true;

        info!("Monitoring started with {} targets", state.loops.len());
    }

    /// Stop every loop and wait for them to exit. Targets stay registered.
    pub async fn stop_all(&self) {
        let mut state = self.state.lock().await;
        state.running = false;

        let handles: Vec<_> = state.loops.drain().collect();
        let count = handles.len();
        self.stop_loops(handles).await;

        info!("Monitoring stopped, {} poll loops shut down", count);
    }

    pub async fn is_running(&self) -> bool {
        self.state.lock().await.running
    }

    /// URLs that currently have a live poll loop, sorted.
    pub async fn active_loops(&self) -> Vec<String> {
        let state = self.state.lock().await;
        let mut urls: Vec<String> = state
            .loops
            .iter()
            .filter(|(_, handle)| handle.is_live())
            .map(|(url, _)| url.clone())
            .collect();
        urls.sort();
        urls
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.executor.sink().subscribe()
    }

    /// Stop all loops, then flush pending results to storage.
    pub async fn shutdown(&self) {
        self.stop_all().await;
        self.executor.sink().close().await;
    }

    fn spawn_loop(&self, url: &str) -> LoopHandle {
        let token = CancellationToken::new();
        let task = PollLoop::new(url, self.registry.clone(), self.executor.clone(), token.clone(), &self.config)
            .spawn(&self.runtime);

        LoopHandle { token, task }
    }

    async fn stop_loops(&self, handles: Vec<(String, LoopHandle)>) {
        join_all(handles.into_iter().map(|(url, handle)| async move {
            self.stop_loop(&url, handle).await;
        }))
        .await;
    }

    async fn stop_loop(&self, url: &str, handle: LoopHandle) {
        handle.token.cancel();
        let abort = handle.task.abort_handle();

        match tokio::time::timeout(self.config.stop_grace(), handle.task).await {
            Ok(Ok(())) => debug!(url = %url, "Poll loop exited"),
            Ok(Err(e)) if e.is_cancelled() => debug!(url = %url, "Poll loop was aborted"),
            Ok(Err(e)) => error!(url = %url, "Poll loop terminated abnormally: {}", e),
            Err(_) => {
                warn!(url = %url, "Poll loop did not stop in time, aborting");
                abort.abort();
            }
        }
    }
}
