//! Concurrent storage of per-key request histories.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use super::history::RequestHistory;
use super::key::HistoryKey;

/// Shared handle to one key's history.
///
/// Cloning the handle does not copy the history. [`HistoryHandle::lock`] gives
/// exclusive access for one read-evaluate-append sequence; the lock is
/// released when the guard is dropped.
#[derive(Debug, Clone)]
pub struct HistoryHandle {
    history: Arc<Mutex<RequestHistory>>,
}

impl HistoryHandle {
    fn new() -> Self {
        Self {
            history: Arc::new(Mutex::new(RequestHistory::new())),
        }
    }

    /// Acquire exclusive access to the history.
    pub fn lock(&self) -> MutexGuard<'_, RequestHistory> {
        self.history.lock()
    }
}

/// Owns one history per resource/caller pair.
///
/// The map only guards insertion and lookup. Each history carries its own
/// lock, and the map shard is released before that lock is taken, so checks
/// for different keys never wait on each other's evaluation.
#[derive(Debug, Default)]
pub struct HistoryStore {
    histories: DashMap<HistoryKey, HistoryHandle>,
}

impl HistoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the history for `key`, creating an empty one on first use.
    ///
    /// Concurrent first calls for the same key all receive the same history.
    pub fn get_or_create(&self, key: &HistoryKey) -> HistoryHandle {
        if let Some(existing) = self.histories.get(key) {
            return existing.value().clone();
        }

        self.histories
            .entry(key.clone())
            .or_insert_with(|| {
                debug!(key = %key, "Creating new request history");
                HistoryHandle::new()
            })
            .value()
            .clone()
    }

    /// Number of timestamps currently stored for `key`.
    ///
    /// Returns `None` if no history exists for the key.
    pub fn history_len(&self, key: &HistoryKey) -> Option<usize> {
        let handle = self.histories.get(key)?.value().clone();
        let len = handle.lock().len();
        Some(len)
    }

    /// Keep only the histories for which `keep` returns `true`.
    ///
    /// A history that is checked out by an in-flight caller is always kept, so
    /// an admitted request can never be appended to a history that has already
    /// left the store. Returns the number of histories removed.
    pub fn retain<F>(&self, mut keep: F) -> usize
    where
        F: FnMut(&HistoryKey, &RequestHistory) -> bool,
    {
        let before = self.histories.len();
        self.histories.retain(|key, handle| {
            // The shard is write-locked here, so no new handle can be cloned
            // out while we look at the count.
            if Arc::strong_count(&handle.history) > 1 {
                return true;
            }
            match handle.history.try_lock() {
                Some(history) => keep(key, &*history),
                None => true,
            }
        });
        before.saturating_sub(self.histories.len())
    }

    /// Get the number of tracked histories.
    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    /// Clear all histories.
    ///
    /// This is primarily useful for testing.
    pub fn clear(&self) {
        self.histories.clear();
    }
}
