use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::sync::watch;

use super::progress::{spawn_ticker, ProgressPlan};
use super::state::QueueState;
use super::tasks::TaskRegistry;
use super::{BatchSummary, CancelOutcome, QueueSnapshot};
use crate::backend::RecordClient;
use crate::config::ProgressTiming;
use crate::error::{QueueError, QueueResult};
use crate::files::FileService;
use crate::models::{EntryId, NewFileRecord, SourceFile, UploadEntry};
use crate::notify::{plural_files, Notifier};

// ============================================================================
// Shared state
// ============================================================================

struct Inner {
    state: QueueState,
    tasks: TaskRegistry,
}

struct Shared {
    inner: Mutex<Inner>,
    snapshots: watch::Sender<QueueSnapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one transition and publish the resulting snapshot if it changed.
    fn update<R>(&self, f: impl FnOnce(&mut Inner) -> R) -> R {
        let mut inner = self.lock();
        let out = f(&mut inner);
        let snapshot = inner.state.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
        out
    }

    fn read<R>(&self, f: impl FnOnce(&Inner) -> R) -> R {
        f(&self.lock())
    }
}

/// What the batch loop does with its next entry.
enum Turn {
    Send(UploadEntry),
    Skip,
    Cancelled,
}

// ============================================================================
// Upload queue
// ============================================================================

/// Upload queue bound to a record backend.
///
/// Clones share the same queue. Dropping the last clone cancels every
/// scheduled progress ticker.
pub struct UploadQueue<C> {
    shared: Arc<Shared>,
    files: FileService<C>,
    notifier: Notifier,
    timing: ProgressTiming,
}

impl<C> Clone for UploadQueue<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            files: self.files.clone(),
            notifier: self.notifier.clone(),
            timing: self.timing,
        }
    }
}

impl<C: RecordClient> UploadQueue<C> {
    pub fn new(files: FileService<C>, notifier: Notifier) -> Self {
        let (snapshots, _) = watch::channel(QueueSnapshot::default());
        Self {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: QueueState::new(),
                    tasks: TaskRegistry::new(),
                }),
                snapshots,
            }),
            files,
            notifier,
            timing: ProgressTiming::default(),
        }
    }

    pub fn with_timing(mut self, timing: ProgressTiming) -> Self {
        self.timing = timing;
        self
    }

    pub fn files(&self) -> &FileService<C> {
        &self.files
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        self.shared.snapshots.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<QueueSnapshot> {
        self.shared.snapshots.subscribe()
    }

    /// Add files as `Ready` entries.
    pub fn enqueue(&self, files: Vec<SourceFile>) -> Vec<EntryId> {
        if files.is_empty() {
            return Vec::new();
        }
        let ids = self.shared.update(|inner| inner.state.enqueue(files));
        self.notifier
            .info(format!("{} added to queue", plural_files(ids.len())));
        ids
    }

    /// Remove an entry whatever its status, stopping its ticker.
    pub fn remove_entry(&self, id: EntryId) -> QueueResult<UploadEntry> {
        let removed = self.shared.update(|inner| {
            inner.tasks.cancel(id);
            inner.state.remove(id)
        });
        let entry = removed.ok_or(QueueError::UnknownEntry(id))?;
        self.notifier.info("File removed from queue");
        Ok(entry)
    }

    /// Upload every non-complete entry, one at a time, in queue order.
    ///
    /// Returns `None` when there is nothing to do or a batch is already
    /// running. Backend failures mark the entry `Error` and never abort the
    /// pass.
    pub async fn upload_all(&self) -> Option<BatchSummary> {
        Some(self.begin_upload()?.run().await)
    }

    /// Claim the next batch without awaiting anything.
    ///
    /// The queue reports `running` as soon as this returns `Some`, so a
    /// second caller gets `None` even before the batch is polled.
    pub fn begin_upload(&self) -> Option<PendingBatch<C>> {
        let batch = self.shared.update(|inner| inner.state.begin_batch())?;
        log::info!("Starting upload of {}", plural_files(batch.items.len()));
        Some(PendingBatch {
            queue: self.clone(),
            epoch: batch.epoch,
            items: batch.items,
        })
    }

    fn start_ticker(&self, inner: &mut Inner, entry: &UploadEntry, attempt: u64) {
        let plan = ProgressPlan::for_size(entry.size_bytes, &self.timing);
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let id = entry.id;

        inner.tasks.start(id, attempt, move |token| {
            let guard = token.clone();
            spawn_ticker(plan, token, move |percent| {
                let Some(shared) = weak.upgrade() else {
                    return false;
                };
                shared.update(|inner| {
                    !guard.is_cancelled() && inner.state.apply_tick(id, attempt, percent)
                })
            })
        });
    }

    /// Reset in-flight entries to `Ready` and stop the running batch.
    ///
    /// A backend call already in flight is not aborted; its result is
    /// discarded when it arrives.
    pub fn cancel_upload(&self) -> CancelOutcome {
        let reset = self.shared.update(|inner| {
            if !inner.state.has_in_flight() {
                return None;
            }
            inner.tasks.cancel_all();
            Some(inner.state.cancel())
        });

        match reset {
            Some(reset) => {
                self.notifier.info("Upload canceled");
                CancelOutcome::Cancelled { reset }
            }
            None => CancelOutcome::Noop,
        }
    }

    /// Drop every `Complete` entry.
    pub fn clear_completed(&self) -> usize {
        let cleared = self.shared.update(|inner| inner.state.clear_completed());
        self.notifier.info("Completed uploads cleared");
        cleared
    }

    pub fn is_running(&self) -> bool {
        self.shared.read(|inner| inner.state.is_running())
    }

    #[cfg(test)]
    pub(crate) fn has_ticker(&self, id: EntryId) -> bool {
        self.shared.read(|inner| inner.tasks.is_scheduled(id))
    }
}

// ============================================================================
// Claimed batch
// ============================================================================

/// A batch claimed by [`UploadQueue::begin_upload`].
///
/// Dropping it unfinished, including dropping the [`PendingBatch::run`]
/// future mid-call, stops its tickers and puts `Uploading` entries back to
/// `Ready`.
pub struct PendingBatch<C> {
    queue: UploadQueue<C>,
    epoch: u64,
    items: Vec<(EntryId, u64)>,
}

impl<C: RecordClient> PendingBatch<C> {
    /// Send each claimed entry to the backend in order.
    pub async fn run(mut self) -> BatchSummary {
        let items = std::mem::take(&mut self.items);
        let queue = &self.queue;
        let shared = &queue.shared;
        let epoch = self.epoch;
        let mut summary = BatchSummary::default();

        for (id, attempt) in items {
            let turn = shared.update(|inner| {
                if !inner.state.is_current(epoch) {
                    return Turn::Cancelled;
                }
                match inner.state.live_entry(id, attempt).cloned() {
                    Some(entry) => {
                        queue.start_ticker(inner, &entry, attempt);
                        Turn::Send(entry)
                    }
                    None => Turn::Skip,
                }
            });

            let entry = match turn {
                Turn::Send(entry) => entry,
                Turn::Skip => {
                    summary.skipped += 1;
                    continue;
                }
                Turn::Cancelled => {
                    summary.cancelled = true;
                    break;
                }
            };

            let result = queue
                .files
                .create_file(&NewFileRecord::completed(&entry, Utc::now()))
                .await;

            shared.update(|inner| {
                inner.tasks.cancel_attempt(id, attempt);
            });

            match result {
                Ok(record) => {
                    tokio::time::sleep(queue.timing.settle_delay).await;
                    let applied =
                        shared.update(|inner| inner.state.complete(id, attempt, record.id));
                    if applied {
                        summary.succeeded += 1;
                    } else {
                        summary.discarded += 1;
                        log::warn!(
                            "Record {} for \"{}\" was created after its upload was cancelled or removed",
                            record.id,
                            entry.name
                        );
                    }
                }
                Err(e) => {
                    log::error!("Upload failed for \"{}\": {}", entry.name, e);
                    if shared.update(|inner| inner.state.fail(id, attempt)) {
                        summary.failed += 1;
                    }
                }
            }
        }

        shared.update(|inner| inner.state.finish_batch(epoch));

        if summary.succeeded > 0 {
            queue.notifier.success(format!(
                "{} uploaded successfully!",
                plural_files(summary.succeeded)
            ));
        }
        if summary.failed > 0 {
            queue
                .notifier
                .error(format!("Failed to upload {}", plural_files(summary.failed)));
        }
        if summary.discarded > 0 {
            queue.notifier.warning(format!(
                "{} stored after being cancelled or removed",
                plural_files(summary.discarded)
            ));
        }

        summary
    }
}

impl<C> Drop for PendingBatch<C> {
    fn drop(&mut self) {
        let reset = self.queue.shared.update(|inner| {
            if !inner.state.is_current(self.epoch) {
                return None;
            }
            inner.tasks.cancel_all();
            Some(inner.state.cancel())
        });
        if let Some(reset) = reset {
            log::warn!(
                "Upload batch stopped before finishing; {} reset to ready",
                plural_files(reset)
            );
        }
    }
}
