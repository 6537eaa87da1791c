//! Simulated upload progress.
//!
//! The backend call gives no byte-level feedback, so progress is paced from
//! the file size: `size / bytes_per_second`, clamped to the configured
//! bounds, split into equal steps. It stops at 99% until the backend answers.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::state::MAX_SIMULATED_PERCENT;
use crate::config::ProgressTiming;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressPlan {
    pub duration: Duration,
    pub steps: u32,
    pub interval: Duration,
}

impl ProgressPlan {
    pub fn for_size(size_bytes: u64, timing: &ProgressTiming) -> Self {
        let steps = timing.steps.max(1);
        let raw = if timing.bytes_per_second == 0 {
            timing.max_duration
        } else {
            Duration::from_secs_f64(size_bytes as f64 / timing.bytes_per_second as f64)
        };
        let duration = raw.clamp(timing.min_duration, timing.max_duration.max(timing.min_duration));
        Self {
            duration,
            steps,
            interval: duration / steps,
        }
    }

    /// Percentage shown after `step` ticks.
    pub fn percent_at(&self, step: u32) -> u8 {
        let raw = (f64::from(step) * 100.0 / f64::from(self.steps)).round();
        (raw.min(f64::from(MAX_SIMULATED_PERCENT))) as u8
    }
}

/// Run the plan on a tokio task.
///
/// `apply` receives each percentage and returns false when the attempt is no
/// longer live; the ticker then exits. Cancelling `token` exits at the next
/// await point.
pub fn spawn_ticker<F>(plan: ProgressPlan, token: CancellationToken, mut apply: F) -> JoinHandle<()>
where
    F: FnMut(u8) -> bool + Send + 'static,
{
    tokio::spawn(async move {
        for step in 1..=plan.steps {
            tokio::select! {
                biased;
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(plan.interval) => {}
            }

            let percent = plan.percent_at(step);
            if !apply(percent) || percent >= MAX_SIMULATED_PERCENT {
                return;
            }
        }
    })
}
