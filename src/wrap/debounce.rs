//! Debounce: collapse bursts of calls into one trailing call.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::timer::{schedule, TimerHandle};

/// Quiet period used when none (or zero) is given.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(250);

type DebouncedFn<S, A> = Arc<dyn Fn(&S, &[A]) + Send + Sync>;

struct DebounceInner<S, A> {
    function: DebouncedFn<S, A>,
    quiet_period: Duration,
    pending: Mutex<Option<TimerHandle>>,
}

/// A function that only runs once calls have stopped for a quiet period.
pub struct Debounced<S, A> {
    inner: Arc<DebounceInner<S, A>>,
}

impl<S, A> Clone for Debounced<S, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Wrap `function` so it runs `quiet_period` after the last call of a burst.
///
/// A zero quiet period selects [`DEFAULT_QUIET_PERIOD`]. The function's
/// return value is discarded.
pub fn debounce<S, A, R, F>(function: F, quiet_period: Duration) -> Debounced<S, A>
where
    F: Fn(&S, &[A]) -> R + Send + Sync + 'static,
    S: Send + 'static,
    A: Send + 'static,
{
    let quiet_period = if quiet_period.is_zero() {
        DEFAULT_QUIET_PERIOD
    } else {
        quiet_period
    };

    Debounced {
        inner: Arc::new(DebounceInner {
            function: Arc::new(move |scope: &S, arguments: &[A]| {
                function(scope, arguments);
            }),
            quiet_period,
            pending: Mutex::new(None),
        }),
    }
}

impl<S, A> Debounced<S, A>
where
    S: Send + 'static,
    A: Send + 'static,
{
    /// Restart the quiet period, remembering only this call's receiver and
    /// arguments.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn call(&self, receiver: S, arguments: Vec<A>) {
        let mut pending = self.inner.pending.lock();

        if let Some(timer) = pending.take() {
            timer.cancel();
        }

        trace!(
            quiet_period_ms = self.inner.quiet_period.as_millis() as u64,
            "Debounced call rescheduled"
        );

        let function = Arc::clone(&self.inner.function);
        *pending = Some(schedule(self.inner.quiet_period, move || {
            function(&receiver, &arguments);
        }));
    }

    /// Whether a call is waiting for the quiet period to elapse.
    pub fn is_pending(&self) -> bool {
        self.inner
            .pending
            .lock()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    /// The quiet period.
    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet_period
    }
}
