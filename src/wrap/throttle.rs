//! Throttle: at most one effective call per threshold window.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::timer::{schedule, TimerHandle};

/// Threshold used when none (or zero) is given.
pub const DEFAULT_THRESHOLD: Duration = Duration::from_millis(250);

type ThrottledFn<S, A, R> = Arc<dyn Fn(&S, &[A]) -> R + Send + Sync>;

struct ThrottleState {
    /// When the function last actually ran
    last: Option<Instant>,
    /// Deferred call waiting for the window to reopen
    pending: Option<TimerHandle>,
    /// Bumped whenever a deferred call is armed or superseded
    generation: u64,
}

struct ThrottleInner<S, A, R> {
    function: ThrottledFn<S, A, R>,
    threshold: Duration,
    state: Mutex<ThrottleState>,
}

/// A function rate-limited to one effective call per threshold.
pub struct Throttled<S, A, R> {
    inner: Arc<ThrottleInner<S, A, R>>,
}

impl<S, A, R> Clone for Throttled<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Wrap `function` so it runs at most once per `threshold`.
///
/// A zero threshold selects [`DEFAULT_THRESHOLD`].
pub fn throttle<S, A, R, F>(function: F, threshold: Duration) -> Throttled<S, A, R>
where
    F: Fn(&S, &[A]) -> R + Send + Sync + 'static,
    S: Send + 'static,
    A: Send + 'static,
    R: 'static,
{
    let threshold = if threshold.is_zero() {
        DEFAULT_THRESHOLD
    } else {
        threshold
    };

    Throttled {
        inner: Arc::new(ThrottleInner {
            function: Arc::new(function),
            threshold,
            state: Mutex::new(ThrottleState {
                last: None,
                pending: None,
                generation: 0,
            }),
        }),
    }
}

impl<S, A, R> Throttled<S, A, R>
where
    S: Send + 'static,
    A: Send + 'static,
    R: 'static,
{
    /// Call the throttled function.
    ///
    /// Runs immediately and returns `Some(result)` when the window is open.
    /// Otherwise the first call inside a closed window is deferred to the
    /// moment it reopens and later calls in the same window are dropped;
    /// both return `None`.
    ///
    /// A call that finds the window open while a deferred call is still
    /// waiting supersedes it, so only one call runs per window.
    ///
    /// # Panics
    ///
    /// Panics if a call has to be deferred outside a Tokio runtime.
    pub fn call(&self, receiver: S, arguments: Vec<A>) -> Option<R> {
        let inner = &self.inner;
        let now = Instant::now();
        let mut state = inner.state.lock();

        let wait = state.last.map_or(Duration::ZERO, |last| {
            inner.threshold.saturating_sub(now.saturating_duration_since(last))
        });

        if wait.is_zero() {
            if let Some(timer) = state.pending.take() {
                timer.cancel();
                state.generation += 1;
                trace!("Stale deferred throttled call cancelled");
            }
            state.last = Some(now);
            drop(state);

            trace!("Throttled call running immediately");
            return Some((inner.function)(&receiver, &arguments));
        }

        if state.pending.is_some() {
            trace!("Throttled call dropped, one is already deferred");
            return None;
        }

        trace!(wait_ms = wait.as_millis() as u64, "Throttled call deferred");

        state.generation += 1;
        let generation = state.generation;
        let deferred = Arc::clone(inner);
        state.pending = Some(schedule(wait, move || {
            {
                let mut state = deferred.state.lock();
                // Superseded by an immediate call after this timer fired.
                if state.generation != generation {
                    return;
                }
                state.pending = None;
                state.last = Some(Instant::now());
            }
            (deferred.function)(&receiver, &arguments);
        }));

        None
    }

    /// Whether a deferred call is waiting to fire.
    pub fn is_pending(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// The minimum spacing between effective calls.
    pub fn threshold(&self) -> Duration {
        self.inner.threshold
    }
}
