//! Queue state and its transitions.
//!
//! Pure data: no timers, no I/O. Every late callback carries the
//! `(id, attempt)` it was issued for and is applied only while that pair is
//! still the live upload of an existing entry.

use std::collections::HashMap;

use super::QueueSnapshot;
use crate::models::{EntryId, SourceFile, UploadEntry, UploadStatus};

/// Highest percentage reachable before the backend confirms.
pub const MAX_SIMULATED_PERCENT: u8 = 99;

/// Entries claimed by one `upload_all` pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub epoch: u64,
    pub items: Vec<(EntryId, u64)>,
}

#[derive(Debug, Default)]
pub struct QueueState {
    entries: Vec<UploadEntry>,
    progress: HashMap<EntryId, u8>,
    running: bool,
    epoch: u64,
    next_attempt: u64,
}

impl QueueState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `Ready` entries in arrival order.
    pub fn enqueue(&mut self, files: Vec<SourceFile>) -> Vec<EntryId> {
        files
            .into_iter()
            .map(|file| {
                let entry = UploadEntry::from_source(file);
                let id = entry.id;
                self.entries.push(entry);
                id
            })
            .collect()
    }

    /// Drop an entry and its progress, whatever its status.
    pub fn remove(&mut self, id: EntryId) -> Option<UploadEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        self.progress.remove(&id);
        Some(self.entries.remove(index))
    }

    /// Claim every non-complete entry for a new batch.
    ///
    /// Returns `None` when already running or when there is nothing to send.
    pub fn begin_batch(&mut self) -> Option<Batch> {
        if self.running {
            return None;
        }
        if !self.entries.iter().any(|e| e.status != UploadStatus::Complete) {
            return None;
        }

        self.running = true;
        self.epoch += 1;

        let mut items = Vec::new();
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.status != UploadStatus::Complete)
        {
            self.next_attempt += 1;
            entry.status = UploadStatus::Uploading;
            entry.attempt = self.next_attempt;
            self.progress.insert(entry.id, 0);
            items.push((entry.id, entry.attempt));
        }

        Some(Batch {
            epoch: self.epoch,
            items,
        })
    }

    /// Whether the batch started at `epoch` is still the running one.
    pub fn is_current(&self, epoch: u64) -> bool {
        self.running && self.epoch == epoch
    }

    /// The entry, if `attempt` is still its live upload.
    pub fn live_entry(&self, id: EntryId, attempt: u64) -> Option<&UploadEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .filter(|e| e.status == UploadStatus::Uploading && e.attempt == attempt)
    }

    fn live_entry_mut(&mut self, id: EntryId, attempt: u64) -> Option<&mut UploadEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .filter(|e| e.status == UploadStatus::Uploading && e.attempt == attempt)
    }

    /// Raise simulated progress. Never lowers it and never passes 99.
    ///
    /// Returns false once the attempt is no longer live.
    pub fn apply_tick(&mut self, id: EntryId, attempt: u64, percent: u8) -> bool {
        if self.live_entry(id, attempt).is_none() {
            return false;
        }
        let slot = self.progress.entry(id).or_insert(0);
        *slot = (*slot).max(percent.min(MAX_SIMULATED_PERCENT));
        true
    }

    /// Backend confirmed: `Complete`, backend id, 100%.
    pub fn complete(&mut self, id: EntryId, attempt: u64, backend_id: u64) -> bool {
        let Some(entry) = self.live_entry_mut(id, attempt) else {
            return false;
        };
        entry.status = UploadStatus::Complete;
        entry.backend_id = Some(backend_id);
        self.progress.insert(id, 100);
        true
    }

    /// Backend rejected the upload.
    pub fn fail(&mut self, id: EntryId, attempt: u64) -> bool {
        let Some(entry) = self.live_entry_mut(id, attempt) else {
            return false;
        };
        entry.status = UploadStatus::Error;
        true
    }

    /// Whether anything is in flight.
    pub fn has_in_flight(&self) -> bool {
        self.running
            || self
                .entries
                .iter()
                .any(|e| e.status == UploadStatus::Uploading)
    }

    /// Reset `Uploading` entries to `Ready`, clear all progress, stop the
    /// batch. Returns how many entries were reset.
    pub fn cancel(&mut self) -> usize {
        let mut reset = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.status == UploadStatus::Uploading)
        {
            entry.status = UploadStatus::Ready;
            reset += 1;
        }
        self.progress.clear();
        self.running = false;
        self.epoch += 1;
        reset
    }

    /// Mark the batch finished, unless it was superseded.
    pub fn finish_batch(&mut self, epoch: u64) {
        if self.epoch == epoch {
            self.running = false;
        }
    }

    /// Remove every `Complete` entry. Returns how many were removed.
    pub fn clear_completed(&mut self) -> usize {
        let before = self.entries.len();
        let progress = &mut self.progress;
        self.entries.retain(|e| {
            let keep = e.status != UploadStatus::Complete;
            if !keep {
                progress.remove(&e.id);
            }
            keep
        });
        before - self.entries.len()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            entries: self.entries.clone(),
            progress: self.progress.clone(),
            running: self.running,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn files(names: &[&str]) -> Vec<SourceFile> {
        names
            .iter()
            .map(|n| SourceFile::new(*n, 1024, "text/plain", Utc::now()))
            .collect()
    }

    fn status_of(state: &QueueState, id: EntryId) -> UploadStatus {
        state
            .snapshot()
            .entries
            .iter()
            .find(|e| e.id == id)
            .map(|e| e.status)
            .unwrap()
    }

    #[test]
    fn test_enqueue_keeps_arrival_order() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["a", "b", "c"]));
        let snap = state.snapshot();
        let names: Vec<_> = snap.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(snap.entries.iter().all(|e| e.status == UploadStatus::Ready));
        assert!(snap.progress.is_empty());
        assert_eq!(snap.entries.iter().map(|e| e.id).collect::<Vec<_>>(), ids);
    }

    #[test]
    fn test_begin_batch_guards() {
        let mut state = QueueState::new();
        assert!(state.begin_batch().is_none());

        state.enqueue(files(&["a"]));
        let batch = state.begin_batch().unwrap();
        assert_eq!(batch.items.len(), 1);
        assert!(state.begin_batch().is_none());
    }

    #[test]
    fn test_begin_batch_skips_complete() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["a", "b"]));
        let batch = state.begin_batch().unwrap();
        let (_, attempt) = batch.items[0];
        assert!(state.complete(ids[0], attempt, 1));
        state.finish_batch(batch.epoch);

        let next = state.begin_batch().unwrap();
        assert_eq!(next.items.len(), 1);
        assert_eq!(next.items[0].0, ids[1]);
    }

    #[test]
    fn test_tick_is_monotonic_and_capped() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["a"]));
        let batch = state.begin_batch().unwrap();
        let (id, attempt) = batch.items[0];

        assert!(state.apply_tick(id, attempt, 40));
        assert!(state.apply_tick(id, attempt, 20));
        assert_eq!(state.snapshot().progress[&id], 40);
        assert!(state.apply_tick(id, attempt, 100));
        assert_eq!(state.snapshot().progress[&ids[0]], 99);

        assert!(state.complete(id, attempt, 7));
        assert_eq!(state.snapshot().progress[&id], 100);
        assert!(!state.apply_tick(id, attempt, 50));
        assert_eq!(state.snapshot().progress[&id], 100);
    }

    #[test]
    fn test_cancel_resets_only_uploading() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["done", "failed", "pending"]));
        let batch = state.begin_batch().unwrap();
        assert!(state.complete(ids[0], batch.items[0].1, 1));
        assert!(state.fail(ids[1], batch.items[1].1));

        assert!(state.has_in_flight());
        assert_eq!(state.cancel(), 1);
        assert!(!state.is_running());
        assert!(state.snapshot().progress.is_empty());
        assert_eq!(status_of(&state, ids[0]), UploadStatus::Complete);
        assert_eq!(status_of(&state, ids[1]), UploadStatus::Error);
        assert_eq!(status_of(&state, ids[2]), UploadStatus::Ready);
        assert!(!state.has_in_flight());
    }

    #[test]
    fn test_late_resolution_after_cancel_is_ignored() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["a"]));
        let batch = state.begin_batch().unwrap();
        state.cancel();

        assert!(!state.is_current(batch.epoch));
        assert!(!state.complete(ids[0], batch.items[0].1, 9));
        let entry = &state.snapshot().entries[0];
        assert_eq!(entry.status, UploadStatus::Ready);
        assert_eq!(entry.backend_id, None);
    }

    #[test]
    fn test_resubmitted_entry_ignores_old_attempt() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["a"]));
        let first = state.begin_batch().unwrap();
        state.cancel();
        let second = state.begin_batch().unwrap();

        assert!(!state.apply_tick(ids[0], first.items[0].1, 80));
        assert_eq!(state.snapshot().progress[&ids[0]], 0);
        assert!(state.apply_tick(ids[0], second.items[0].1, 10));
    }

    #[test]
    fn test_finish_batch_ignores_superseded_epoch() {
        let mut state = QueueState::new();
        state.enqueue(files(&["a"]));
        let first = state.begin_batch().unwrap();
        state.cancel();
        let second = state.begin_batch().unwrap();

        state.finish_batch(first.epoch);
        assert!(state.is_running());
        state.finish_batch(second.epoch);
        assert!(!state.is_running());
    }

    #[test]
    fn test_remove_and_clear_completed() {
        let mut state = QueueState::new();
        let ids = state.enqueue(files(&["a", "b", "c", "d"]));
        let batch = state.begin_batch().unwrap();
        assert!(state.complete(ids[0], batch.items[0].1, 1));
        assert!(state.fail(ids[1], batch.items[1].1));

        let removed = state.remove(ids[2]).unwrap();
        assert_eq!(removed.name, "c");
        assert!(!state.snapshot().progress.contains_key(&ids[2]));
        assert!(state.remove(ids[2]).is_none());

        assert_eq!(state.clear_completed(), 1);
        let snap = state.snapshot();
        let names: Vec<_> = snap.entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["b", "d"]);
        assert!(!snap.progress.contains_key(&ids[0]));
    }
}
