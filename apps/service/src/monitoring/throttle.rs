use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::time::Instant;

/// Per-URL record of the last dispatched probe.
///
/// Each URL is its own entry, so probes of unrelated targets never wait on
/// each other.
#[derive(Debug)]
pub struct Throttle {
    window: Duration,
    last_dispatched: DashMap<String, Instant>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self { window, last_dispatched: DashMap::new() }
    }

    /// Claim the right to probe `url` now.
    ///
    /// Returns `false` (suppressed) when a probe was dispatched within the
    /// window; otherwise records the dispatch time and returns `true`.
    pub fn try_dispatch(&self, url: &str) -> bool {
        let now = Instant::now();
        match self.last_dispatched.entry(url.to_owned()) {
            Entry::Occupied(mut entry) => {
                if now.duration_since(*entry.get()) < self.window {
                    return false;
                }
                entry.insert(now);
                true
            }
            Entry::Vacant(entry) => {
                entry.insert(now);
                true
            }
        }
    }

    /// Whether a probe for `url` was dispatched less than `window` ago.
    pub fn dispatched_within(&self, url: &str, window: Duration) -> bool {
        self.last_dispatched
            .get(url)
            .is_some_and(|last| last.elapsed() < window)
    }

    pub fn last_dispatched(&self, url: &str) -> Option<Instant> {
        self.last_dispatched.get(url).map(|last| *last)
    }

    pub fn forget(&self, url: &str) {
        self.last_dispatched.remove(url);
    }

    /// Drop entries older than `retention` unless `keep` holds for their URL.
    pub fn prune(&self, retention: Duration, keep: impl Fn(&str) -> bool) {
        self.last_dispatched
            .retain(|url, last| last.elapsed() < retention || keep(url));
    }

    pub fn len(&self) -> usize {
        self.last_dispatched.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_dispatched.is_empty()
    }
}
