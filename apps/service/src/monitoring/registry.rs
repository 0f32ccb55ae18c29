use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::types::Target;

/// Result of [`TargetRegistry::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Unchanged,
    Changed { previous: u64 },
}

/// Authoritative URL -> interval map.
///
/// Reads are cheap and safe from any task. Mutations are only performed by the
/// scheduler while it holds its own lock, which keeps the registry and the set
/// of running loops in step.
#[derive(Debug)]
pub struct TargetRegistry {
    min_interval: u64,
    targets: RwLock<HashMap<String, u64>>,
}

impl TargetRegistry {
    pub fn new(min_interval: u64) -> Self {
        Self { min_interval, targets: RwLock::new(HashMap::new()) }
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, u64>> {
        self.targets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, u64>> {
        self.targets.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert or retune a target. Intervals below the floor are raised to it.
    pub fn upsert(&self, url: &str, interval: u64) -> Upsert {
        let interval = interval.max(self.min_interval);
        match self.write().insert(url.to_owned(), interval) {
            None => Upsert::Inserted,
            Some(previous) if previous == interval => Upsert::Unchanged,
            Some(previous) => Upsert::Changed { previous },
        }
    }

    /// Returns the interval the target had, `None` if it was not registered.
    pub fn remove(&self, url: &str) -> Option<u64> {
        self.write().remove(url)
    }

    pub fn interval_of(&self, url: &str) -> Option<u64> {
        self.read().get(url).copied()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.read().contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Point-in-time copy, sorted by URL.
    pub fn snapshot(&self) -> Vec<Target> {
        let mut targets: Vec<Target> = self
            .read()
            .iter()
            .map(|(url, interval)| Target::new(url.clone(), *interval))
            .collect();
        targets.sort_by(|a, b| a.url.cmp(&b.url));
        targets
    }
}
