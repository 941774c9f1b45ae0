//! Generational template storage
//!
//! Entries live in one of two buckets. `current` holds everything stored or
//! touched since the last sweep; `previous` holds what survived the last
//! sweep without being touched since. A sweep drops `previous` wholesale and
//! demotes `current` into its place, leaving `current` empty as the new
//! boundary.
//!
//! This is a coarse two-generation clock, not an LRU with per-entry TTL: an
//! untouched entry survives at least one full purge interval after its last
//! access and at most two. Access is O(1) and a sweep is O(k) in the size of
//! the dropped generation, with no per-entry timestamps.

use std::collections::HashMap;
use std::mem;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use prometheus::IntGauge;

use crate::error::TemplateResult;
use crate::metrics::{CacheMetrics, PurgeMetrics};
use crate::tasks::PurgeTarget;

use super::types::{StoreSnapshot, StoreStats, SweepReport, TemplateEntry};

#[derive(Default)]
struct Generations {
    current: HashMap<String, TemplateEntry>,
    previous: HashMap<String, TemplateEntry>,
    sweeps: u64,
    evicted_total: u64,
    last_sweep_at: Option<DateTime<Utc>>,
}

impl Generations {
    fn len(&self) -> usize {
        self.current.len() + self.previous.len()
    }
}

/// In-memory template storage with generational eviction.
///
/// Every operation, including the whole of [`TemplateStore::sweep`], runs
/// under a single mutex. The store's entries count towards the cached
/// templates gauge until it is dropped.
pub struct TemplateStore {
    inner: Mutex<Generations>,
    entries: IntGauge,
}

impl Default for TemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateStore {
    /// Create a new template store
    pub fn new() -> Self {
        Self::with_entries_gauge(CacheMetrics::entries_gauge())
    }

    fn with_entries_gauge(entries: IntGauge) -> Self {
        Self {
            inner: Mutex::new(Generations::default()),
            entries,
        }
    }

    fn generations(&self) -> MutexGuard<'_, Generations> {
        // Every mutation leaves both maps valid, so a poisoned lock is still usable
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a template, marking it as freshly touched
    pub fn get(&self, id: &str) -> Option<TemplateEntry> {
        let mut gens = self.generations();

        if let Some(entry) = gens.current.get(id) {
            return Some(entry.clone());
        }

        let entry = gens.previous.remove(id)?;
        gens.current.insert(id.to_string(), entry.clone());
        Some(entry)
    }

    /// Insert or replace a template; it joins the current generation
    pub fn put(&self, id: &str, text: String) -> TemplateEntry {
        let mut gens = self.generations();

        let entry = TemplateEntry::new(text, gens.sweeps);
        let demoted = gens.previous.remove(id).is_some();
        let replaced = gens.current.insert(id.to_string(), entry.clone()).is_some();
        drop(gens);

        if !demoted && !replaced {
            self.entries.inc();
        }

        entry
    }

    /// Remove a template; returns whether it was cached
    pub fn remove(&self, id: &str) -> bool {
        let mut gens = self.generations();
        let removed = gens.current.remove(id).is_some() || gens.previous.remove(id).is_some();
        drop(gens);

        if removed {
            self.entries.dec();
        }
        removed
    }

    /// Drop every cached template; returns how many were removed
    pub fn clear(&self) -> usize {
        let (current, previous) = {
            let mut gens = self.generations();
            (mem::take(&mut gens.current), mem::take(&mut gens.previous))
        };

        let removed = current.len() + previous.len();
        self.entries.sub(removed as i64);
        removed
    }

    /// Check for a template without touching it
    pub fn contains(&self, id: &str) -> bool {
        let gens = self.generations();
        gens.current.contains_key(id) || gens.previous.contains_key(id)
    }

    /// Get the number of cached templates
    pub fn len(&self) -> usize {
        self.generations().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one sweep cycle.
    ///
    /// Drops the previous generation and starts a fresh, empty current one.
    /// The boundary moves on every call, including when nothing is evicted.
    pub fn sweep(&self) -> SweepReport {
        let mut gens = self.generations();

        let survivors = mem::take(&mut gens.current);
        let dropped = mem::replace(&mut gens.previous, survivors);
        let evicted = dropped.len();

        gens.sweeps += 1;
        gens.evicted_total += evicted as u64;
        gens.last_sweep_at = Some(Utc::now());

        let report = SweepReport {
            evicted,
            retained: gens.previous.len(),
            generation: gens.sweeps,
        };
        drop(gens);

        // Deallocate outside the lock
        drop(dropped);

        self.entries.sub(evicted as i64);
        PurgeMetrics::record_sweep(evicted);

        tracing::debug!(
            evicted = report.evicted,
            retained = report.retained,
            generation = report.generation,
            "Template store swept"
        );

        report
    }

    pub fn stats(&self) -> StoreStats {
        let gens = self.generations();
        StoreStats {
            entries: gens.len(),
            current_generation: gens.current.len(),
            previous_generation: gens.previous.len(),
            sweeps: gens.sweeps,
            evicted_total: gens.evicted_total,
            last_sweep_at: gens.last_sweep_at,
        }
    }

    /// Capture the keys of both generations atomically
    pub fn snapshot(&self) -> StoreSnapshot {
        let gens = self.generations();
        StoreSnapshot {
            current: gens.current.keys().cloned().collect(),
            previous: gens.previous.keys().cloned().collect(),
        }
    }
}

impl Drop for TemplateStore {
    fn drop(&mut self) {
        let gens = self.inner.get_mut().unwrap_or_else(PoisonError::into_inner);
        self.entries.sub(gens.len() as i64);
    }
}

impl PurgeTarget for TemplateStore {
    fn purge(&self) -> TemplateResult<SweepReport> {
        Ok(self.sweep())
    }
}
