//! Deferred execution on top of Tokio timers.

use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::trace;

/// Handle to a task armed with [`schedule`].
///
/// Dropping the handle leaves the task armed; use [`TimerHandle::cancel`]
/// to stop it before it fires.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancel the task if it has not fired yet.
    ///
    /// A task that is already running its callback is not interrupted.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Whether the task has fired (or was cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Run `task` once `after` has elapsed.
///
/// # Panics
///
/// Panics if called outside a Tokio runtime.
pub fn schedule<F>(after: Duration, task: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    trace!(after_ms = after.as_millis() as u64, "Scheduling deferred task");

    let task = tokio::spawn(async move {
        sleep(after).await;
        task();
    });

    TimerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_schedule_fires_after_delay() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = schedule(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(99)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert!(!handle.is_finished());

        sleep(Duration::from_millis(2)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_firing() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        let handle = schedule(Duration::from_millis(100), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_millis(50)).await;
        handle.cancel();

        sleep(Duration::from_millis(200)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_still_fires() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();

        drop(schedule(Duration::from_millis(10), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        sleep(Duration::from_millis(20)).await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
