//! In-memory stand-ins for the checker and storage collaborators.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use tokio::time::Instant;

use super::checker::{Checker, ProbeResponse};
use super::types::{ProbeResult, Target};
use crate::database::Database;

#[derive(Default)]
pub struct MemoryDatabase {
    results: Mutex<Vec<ProbeResult>>,
    targets: Mutex<BTreeMap<String, u64>>,
    failing: AtomicBool,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_targets<'a>(targets: impl IntoIterator<Item = (&'a str, u64)>) -> Self {
        let database = Self::new();
        database
            .targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(targets.into_iter().map(|(url, interval)| (url.to_owned(), interval)));
        database
    }

    /// Every write fails while set
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn results(&self) -> Vec<ProbeResult> {
        self.results.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn targets(&self) -> BTreeMap<String, u64> {
        self.targets.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(anyhow!("database is locked"));
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn persist_result(&self, result: &ProbeResult) -> Result<i64> {
        self.check_writable()?;
        let mut results = self.results.lock().unwrap_or_else(PoisonError::into_inner);
        results.push(result.clone());
        Ok(results.len() as i64)
    }

    async fn persist_target(&self, url: &str, interval: u64) -> Result<()> {
        self.check_writable()?;
        self.targets.lock().unwrap_or_else(PoisonError::into_inner).insert(url.to_owned(), interval);
        Ok(())
    }

    async fn delete_target(&self, url: &str) -> Result<bool> {
        self.check_writable()?;
        Ok(self.targets.lock().unwrap_or_else(PoisonError::into_inner).remove(url).is_some())
    }

    async fn load_all_targets(&self) -> Result<Vec<Target>> {
        Ok(self
            .targets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(url, interval)| Target::new(url.clone(), *interval))
            .collect())
    }

    async fn load_results(&self, url: Option<&str>, limit: usize) -> Result<Vec<ProbeResult>> {
        Ok(self
            .results
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .filter(|result| url.is_none_or(|url| result.url == url))
            .take(limit)
            .cloned()
            .collect())
    }
}

/// Answers every probe with a fixed status and records when each one started.
/// A status of 0 makes probes fail at the transport level.
pub struct FakeChecker {
    status_code: AtomicU16,
    latency: Duration,
    panic_next: AtomicBool,
    probes: Mutex<Vec<(String, Instant)>>,
}

impl FakeChecker {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code: AtomicU16::new(status_code),
            latency: Duration::ZERO,
            panic_next: AtomicBool::new(false),
            probes: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_status(&self, status_code: u16) {
        self.status_code.store(status_code, Ordering::SeqCst);
    }

    /// The next probe panics instead of answering
    pub fn panic_once(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn probes_for(&self, url: &str) -> Vec<Instant> {
        self.probes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(probed, _)| probed == url)
            .map(|(_, at)| *at)
            .collect()
    }
}

#[async_trait]
impl Checker for FakeChecker {
    async fn check(&self, target: &str) -> Result<ProbeResponse> {
        self.probes.lock().unwrap_or_else(PoisonError::into_inner).push((target.to_owned(), Instant::now()));

        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("checker blew up on {target}");
        }

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        match self.status_code.load(Ordering::SeqCst) {
            0 => Err(anyhow!("connection refused")),
            status_code => Ok(ProbeResponse { status_code, latency_ms: self.latency.as_millis() as u64 }),
        }
    }
}
