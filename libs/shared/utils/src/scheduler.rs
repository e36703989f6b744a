use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tracing::debug;

/// Deferred work with a cancel switch.
pub trait TaskScheduler: Send + Sync {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask;
}

/// Handle to a scheduled task. Cancelling after the delay has elapsed is a
/// no-op; a task that already started runs to completion.
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    cancelled: Arc<AtomicBool>,
    fired: Arc<AtomicBool>,
}

impl ScheduledTask {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn has_fired(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }

    /// Called by the scheduler when the delay elapses. Returns whether the
    /// task should run.
    pub fn fire(&self) -> bool {
        if self.is_cancelled() {
            return false;
        }
        self.fired.store(true, Ordering::Release);
        true
    }
}

impl Default for ScheduledTask {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs tasks on the ambient tokio runtime after `tokio::time::sleep`, so a
/// paused test clock drives it deterministically.
#[derive(Debug, Clone, Default)]
pub struct TokioScheduler;

impl TaskScheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: BoxFuture<'static, ()>) -> ScheduledTask {
        let handle = ScheduledTask::new();
        let timer = handle.clone();

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if timer.fire() {
                task.await;
            } else {
                debug!("Scheduled task cancelled before firing");
            }
        });

        handle
    }
}
