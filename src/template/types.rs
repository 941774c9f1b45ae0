//! Template cache types

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Flat placeholder name -> replacement value map, supplied per render
pub type ParamMap = HashMap<String, String>;

/// Raw text of a loaded template.
///
/// Immutable once stored; a reload replaces the entry wholesale.
#[derive(Debug, Clone)]
pub struct TemplateEntry {
    text: Arc<str>,
    loaded_at: DateTime<Utc>,
    generation: u64,
}

impl TemplateEntry {
    pub(crate) fn new(text: String, generation: u64) -> Self {
        Self {
            text: Arc::from(text),
            loaded_at: Utc::now(),
            generation,
        }
    }

    /// Template text
    pub fn text(&self) -> &str {
        &self.text
    }

    /// When the text was stored
    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    /// Number of sweeps the store had completed when this entry was stored
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Result of a single sweep cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Entries dropped because they were not touched for a whole interval
    pub evicted: usize,
    /// Entries carried over into the previous generation
    pub retained: usize,
    /// Sweep count after this cycle
    pub generation: u64,
}

/// Point-in-time statistics of a template store
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    /// Total cached templates
    pub entries: usize,
    /// Templates touched since the last sweep
    pub current_generation: usize,
    /// Templates that will be evicted by the next sweep unless touched
    pub previous_generation: usize,
    /// Completed sweep cycles
    pub sweeps: u64,
    /// Entries evicted over the store's lifetime
    pub evicted_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sweep_at: Option<DateTime<Utc>>,
}

/// Keys of both generations, captured under the store lock
#[derive(Debug, Clone, Default)]
pub struct StoreSnapshot {
    pub current: Vec<String>,
    pub previous: Vec<String>,
}

impl StoreSnapshot {
    /// True when no identifier appears in both generations
    pub fn is_consistent(&self) -> bool {
        let current: HashSet<&String> = self.current.iter().collect();
        self.previous.iter().all(|id| !current.contains(id))
    }

    pub fn len(&self) -> usize {
        self.current.len() + self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: &str) -> bool {
        self.current.iter().chain(self.previous.iter()).any(|k| k == id)
    }
}
