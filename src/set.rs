use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::clock::Clock;
use crate::config::WindowConfig;
use crate::error::Result;
use crate::metrics::{Snapshot, Total};
use crate::sample::Sample;
use crate::window::SlidingWindow;

type Windows<T> = DashMap<String, SlidingWindow<T>>;

/// Independent counters keyed by name, all sharing one configuration.
///
/// Counters are created on first `add`. Queries on keys that were never
/// written return zeroes. The counters themselves have no clock; a clocked
/// set ages all of them from a single shared clock thread.
pub struct WindowSet<T: Sample> {
    config: WindowConfig,
    // per-shard locking so adds on different keys don't contend
    windows: Arc<Windows<T>>,
    clock: Mutex<Option<Clock>>,
}

impl<T: Sample> WindowSet<T> {
    pub fn new(config: WindowConfig) -> Result<Self> {
        let set = Self::manual(config)?;
        let windows = Arc::clone(&set.windows);
        let clock = Clock::every(config.granularity, move || {
            advance(&windows);
            trace!(keys = windows.len(), "Set tick");
        })?;
        *set.clock_slot() = Some(clock);
        Ok(set)
    }

    /// Set without a clock; age it with [`WindowSet::advance_all`].
    pub fn manual(config: WindowConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            windows: Arc::new(DashMap::new()),
            clock: Mutex::new(None),
        })
    }

    fn clock_slot(&self) -> MutexGuard<'_, Option<Clock>> {
        self.clock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_running(&self) -> bool {
        self.clock_slot().as_ref().map_or(false, Clock::is_running)
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    pub fn add(&self, key: &str, value: T) -> Result<()> {
        if let Some(window) = self.windows.get(key) {
            window.add(value);
            return Ok(());
        }
        match self.windows.entry(key.to_owned()) {
            Entry::Occupied(e) => e.get().add(value),
            Entry::Vacant(e) => {
                let window = self.config.build_manual()?;
                window.add(value);
                e.insert(window);
                debug!(key, "Tracking new key");
            }
        }
        Ok(())
    }

    pub fn total(&self, key: &str, duration: Duration) -> Total<T> {
        self.windows
            .get(key)
            .map(|w| w.total(duration))
            .unwrap_or_default()
    }

    pub fn average(&self, key: &str, duration: Duration) -> f64 {
        self.windows.get(key).map_or(0.0, |w| w.average(duration))
    }

    pub fn rate(&self, key: &str, duration: Duration) -> f64 {
        self.windows.get(key).map_or(0.0, |w| w.rate(duration))
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.windows.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Drops a key's counter.
    pub fn remove(&self, key: &str) -> bool {
        self.windows.remove(key).is_some()
    }

    pub fn advance_all(&self) {
        advance(&self.windows);
    }

    pub fn reset_all(&self) {
        for entry in self.windows.iter() {
            entry.value().reset();
        }
    }

    /// Halts the shared clock for good. Counters stay usable but stop aging.
    pub fn stop_all(&self) {
        let clock = self.clock_slot().take();
        if let Some(mut clock) = clock {
            clock.stop();
        }
    }

    pub fn snapshot(&self) -> BTreeMap<String, Snapshot> {
        let running = self.is_running();
        self.windows
            .iter()
            .map(|e| {
                let mut snap = e.value().snapshot();
                snap.running = running;
                (e.key().clone(), snap)
            })
            .collect()
    }
}

fn advance<T: Sample>(windows: &Windows<T>) {
    for entry in windows.iter() {
        entry.value().advance();
    }
}
