use crate::models::{WatchSummary, WatchedEntry};
use crate::store::ListStore;
use anyhow::{Context, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{info, warn};

pub const WATCHED_KEY: &str = "watched";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Added,
    /// An entry with the same id already exists; nothing was changed.
    AlreadyWatched,
}

/// Owns the watched-list and writes every mutation through to the store.
pub struct WatchlistManager {
    store: Arc<dyn ListStore>,
    entries: Mutex<Vec<WatchedEntry>>,
}

impl WatchlistManager {
    /// Never fails: an absent, unreadable or malformed value starts an empty list.
    pub fn load(store: Arc<dyn ListStore>) -> Self {
        let entries = match store.get(WATCHED_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<Option<Vec<WatchedEntry>>>(&raw) {
                Ok(list) => list.unwrap_or_default(),
                Err(e) => {
                    warn!("Persisted watched-list is malformed, starting empty: {}", e);
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!("Failed to read watched-list, starting empty: {:#}", e);
                Vec::new()
            }
        };
        info!("Loaded {} watched entries", entries.len());
        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    pub fn add(&self, entry: WatchedEntry) -> Result<AddOutcome> {
        let mut entries = self.lock();
        if entries.iter().any(|e| e.id == entry.id) {
            return Ok(AddOutcome::AlreadyWatched);
        }
        let mut next = entries.clone();
        info!(id = %entry.id, title = %entry.title, "Adding watched entry");
        next.push(entry);
        self.persist(&next)?;
        *entries = next;
        Ok(AddOutcome::Added)
    }

    /// Returns how many entries were removed.
    pub fn remove(&self, id: &str) -> Result<usize> {
        let mut entries = self.lock();
        let next: Vec<WatchedEntry> = entries.iter().filter(|e| e.id != id).cloned().collect();
        let removed = entries.len() - next.len();
        self.persist(&next)?;
        *entries = next;
        if removed > 0 {
            info!(id, "Removed watched entry");
        }
        Ok(removed)
    }

    pub fn entries(&self) -> Vec<WatchedEntry> {
        self.lock().clone()
    }

    pub fn get(&self, id: &str) -> Option<WatchedEntry> {
        self.lock().iter().find(|e| e.id == id).cloned()
    }

    pub fn is_watched(&self, id: &str) -> bool {
        self.lock().iter().any(|e| e.id == id)
    }

    /// Means are 0.0 when the list is empty.
    pub fn summarize(&self) -> WatchSummary {
        summarize(&self.lock())
    }

    // Runs on the caller's thread while `entries` is locked: the store write is
    // small and synchronous, and the lock keeps memory and store in step.
    fn persist(&self, entries: &[WatchedEntry]) -> Result<()> {
        let raw = serde_json::to_string(entries).context("serializing watched-list failed")?;
        self.store
            .set(WATCHED_KEY, &raw)
            .context("persisting watched-list failed")
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WatchedEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub fn summarize(entries: &[WatchedEntry]) -> WatchSummary {
    let count = entries.len();
    let mean = |f: fn(&WatchedEntry) -> f64| {
        if count == 0 {
            0.0
        } else {
            entries.iter().map(f).sum::<f64>() / count as f64
        }
    };
    WatchSummary {
        count,
        mean_imdb_rating: mean(|e| e.imdb_rating),
        mean_user_rating: mean(|e| f64::from(e.user_rating)),
        mean_runtime_minutes: mean(|e| f64::from(e.runtime_minutes)),
    }
}
