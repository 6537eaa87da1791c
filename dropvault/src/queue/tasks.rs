//! Cancellable background tasks keyed by queue entry.

use std::collections::HashMap;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::EntryId;

struct ScheduledTask {
    attempt: u64,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    fn stop(self) {
        self.token.cancel();
        self.handle.abort();
    }
}

/// At most one live task per entry. Replacing or cancelling a task cancels
/// its token before aborting the handle.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: HashMap<EntryId, ScheduledTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task for `(id, attempt)`, stopping any previous one for `id`.
    pub fn start<F>(&mut self, id: EntryId, attempt: u64, spawn: F)
    where
        F: FnOnce(CancellationToken) -> JoinHandle<()>,
    {
        let token = CancellationToken::new();
        let handle = spawn(token.clone());
        if let Some(previous) = self.tasks.insert(
            id,
            ScheduledTask {
                attempt,
                token,
                handle,
            },
        ) {
            previous.stop();
        }
    }

    /// Stop whatever runs for `id`.
    pub fn cancel(&mut self, id: EntryId) -> bool {
        match self.tasks.remove(&id) {
            Some(task) => {
                task.stop();
                true
            }
            None => false,
        }
    }

    /// Stop the task for `id` only if it belongs to `attempt`.
    pub fn cancel_attempt(&mut self, id: EntryId, attempt: u64) -> bool {
        if self.tasks.get(&id).map(|t| t.attempt) != Some(attempt) {
            return false;
        }
        self.cancel(id)
    }

    pub fn cancel_all(&mut self) -> usize {
        let count = self.tasks.len();
        for (_, task) in self.tasks.drain() {
            task.stop();
        }
        count
    }

    pub fn is_scheduled(&self, id: EntryId) -> bool {
        self.tasks.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}

impl Drop for TaskRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
