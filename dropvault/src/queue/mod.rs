//! Local upload queue.
//!
//! # Architecture
//!
//! ```text
//! enqueue ──► QueueState (entries, progress, running, epoch)
//!                 ▲          │
//!   ticks ────────┘          └──► watch::Sender<QueueSnapshot> ──► API / CLI
//!   (TaskRegistry)
//! begin_upload ──► PendingBatch::run ──► FileService::create_file, one entry at a time
//! ```
//!
//! All transitions go through one mutex that is never held across an await.

pub mod manager;
pub mod progress;
pub mod state;
pub mod tasks;

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{EntryId, UploadEntry};

pub use manager::{PendingBatch, UploadQueue};
pub use progress::ProgressPlan;

/// Published copy of the queue after each change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueSnapshot {
    pub entries: Vec<UploadEntry>,
    pub progress: HashMap<EntryId, u8>,
    pub running: bool,
}

impl QueueSnapshot {
    pub fn progress_of(&self, id: EntryId) -> Option<u8> {
        self.progress.get(&id).copied()
    }

    pub fn entry(&self, id: EntryId) -> Option<&UploadEntry> {
        self.entries.iter().find(|e| e.id == id)
    }
}

/// Outcome of one `upload_all` pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub succeeded: usize,
    pub failed: usize,
    /// The batch was cancelled before every entry was attempted.
    pub cancelled: bool,
    /// Entries removed or reset before their turn.
    pub skipped: usize,
    /// Backend accepted the record but the entry was gone or reset by then.
    pub discarded: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum CancelOutcome {
    Cancelled { reset: usize },
    Noop,
}
