//! Guarded invoker: bounds how many times, and until when, a function may fire.
//!
//! A guarded function counts down an invocation budget on every call and
//! refuses calls once the budget is spent or its deadline has passed. The
//! deadline can optionally be pushed out through a [`DeadlineExtender`], and
//! an `on_timeout` callback fires if the window closes before the function
//! was ever called.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::invocation::Invocation;
use super::timer::{schedule, TimerHandle};
use crate::error::{GuardError, Result};

/// Callback fired when a guarded function's window closes without a call.
pub type TimeoutCallback = Arc<dyn Fn() + Send + Sync>;

type GuardedFn<S, A, R> = Arc<dyn Fn(&S, &[A]) -> R + Send + Sync>;

/// Default number of permitted invocations.
const DEFAULT_INVOCATION_LIMIT: u32 = 1;

/// Configuration for a guarded function.
///
/// Converts from a plain `u32` (invocation limit only) or a `Vec<A>`
/// (bound arguments only) for the common shorthand forms.
#[derive(Clone)]
pub struct GuardConfig<S, A> {
    pub(crate) bound_arguments: Vec<A>,
    pub(crate) scope: Option<S>,
    pub(crate) invocation_limit: u32,
    pub(crate) time_limit: Option<Duration>,
    pub(crate) fail_silently: bool,
    pub(crate) delay: Duration,
    pub(crate) on_timeout: Option<TimeoutCallback>,
    pub(crate) extension_allowed: bool,
    pub(crate) name: Option<String>,
}

impl<S, A> Default for GuardConfig<S, A> {
    fn default() -> Self {
        Self {
            bound_arguments: Vec::new(),
            scope: None,
            invocation_limit: DEFAULT_INVOCATION_LIMIT,
            time_limit: None,
            fail_silently: false,
            delay: Duration::ZERO,
            on_timeout: None,
            extension_allowed: true,
            name: None,
        }
    }
}

impl<S, A> GuardConfig<S, A> {
    /// Create a configuration allowing a single call with no time limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style: arguments prepended to every call
    pub fn arguments(mut self, arguments: Vec<A>) -> Self {
        self.bound_arguments = arguments;
        self
    }

    /// Builder-style: fixed receiver, overriding the first caller's
    pub fn scope(mut self, scope: S) -> Self {
        self.scope = Some(scope);
        self
    }

    /// Builder-style: number of permitted calls
    pub fn invocation_limit(mut self, limit: u32) -> Self {
        self.invocation_limit = limit;
        self
    }

    /// Builder-style: window during which calls are permitted
    pub fn time_limit(mut self, time_limit: Duration) -> Self {
        self.time_limit = Some(time_limit);
        self
    }

    /// Builder-style: drop violating calls instead of returning an error
    pub fn fail_silently(mut self, fail_silently: bool) -> Self {
        self.fail_silently = fail_silently;
        self
    }

    /// Builder-style: defer permitted calls by this long
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Builder-style: callback fired when the window closes unused
    pub fn on_timeout<F>(mut self, on_timeout: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_timeout = Some(Arc::new(on_timeout));
        self
    }

    /// Builder-style: whether a [`DeadlineExtender`] is handed out
    pub fn extension_allowed(mut self, allowed: bool) -> Self {
        self.extension_allowed = allowed;
        self
    }

    /// Builder-style: label attached to log events
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

impl<S, A> From<u32> for GuardConfig<S, A> {
    fn from(invocation_limit: u32) -> Self {
        Self::default().invocation_limit(invocation_limit)
    }
}

impl<S, A> From<Vec<A>> for GuardConfig<S, A> {
    fn from(arguments: Vec<A>) -> Self {
        Self::default().arguments(arguments)
    }
}

impl<S: fmt::Debug, A: fmt::Debug> fmt::Debug for GuardConfig<S, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardConfig")
            .field("bound_arguments", &self.bound_arguments)
            .field("scope", &self.scope)
            .field("invocation_limit", &self.invocation_limit)
            .field("time_limit", &self.time_limit)
            .field("fail_silently", &self.fail_silently)
            .field("delay", &self.delay)
            .field("on_timeout", &self.on_timeout.is_some())
            .field("extension_allowed", &self.extension_allowed)
            .field("name", &self.name)
            .finish()
    }
}

/// Mutable state of one guarded function.
struct GuardState<S> {
    /// Calls left before the limit is hit
    remaining: u32,
    /// Start of the current window
    bound_time: Instant,
    /// Length of the current window
    time_limit: Option<Duration>,
    /// Pending `on_timeout` notification
    timeout_timer: Option<TimerHandle>,
    /// Receiver fixed by configuration or by the first call
    scope: Option<S>,
}

impl<S> GuardState<S> {
    fn deadline(&self) -> Option<Instant> {
        self.time_limit
            .and_then(|limit| self.bound_time.checked_add(limit))
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.deadline().is_some_and(|deadline| now >= deadline)
    }

    fn cancel_timeout(&mut self) {
        if let Some(timer) = self.timeout_timer.take() {
            timer.cancel();
        }
    }
}

struct GuardInner<S, A, R> {
    function: GuardedFn<S, A, R>,
    bound_arguments: Vec<A>,
    fail_silently: bool,
    delay: Duration,
    on_timeout: Option<TimeoutCallback>,
    name: Option<String>,
    state: Mutex<GuardState<S>>,
}

impl<S, A, R> GuardInner<S, A, R> {
    /// Turn a violation into the configured failure mode.
    fn reject<T: Default>(&self, error: GuardError) -> Result<T> {
        debug!(name = ?self.name, error = %error, "Guarded call rejected");

        if self.fail_silently {
            Ok(T::default())
        } else {
            Err(error)
        }
    }
}

/// Arm the `on_timeout` notification for a window of `after`.
fn arm_timeout(callback: &TimeoutCallback, after: Duration, name: Option<String>) -> TimerHandle {
    let callback = Arc::clone(callback);

    schedule(after, move || {
        debug!(name = ?name, "Guarded function timed out without being called");
        callback();
    })
}

/// A function wrapped with an invocation budget and an optional deadline.
///
/// Cloning yields another handle to the same guard; the budget and deadline
/// are shared between clones.
pub struct Guarded<S, A, R> {
    inner: Arc<GuardInner<S, A, R>>,
    extender: Option<DeadlineExtender<S, A, R>>,
}

impl<S, A, R> Clone for Guarded<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            extender: self.extender.clone(),
        }
    }
}

/// Wrap `function` with the guard described by `config`.
///
/// The function is not called here. When both a time limit and an
/// `on_timeout` callback are configured, the timeout notification is armed
/// immediately.
///
/// # Panics
///
/// Panics if the timeout notification is armed outside a Tokio runtime.
pub fn guard<S, A, R, F, C>(function: F, config: C) -> Guarded<S, A, R>
where
    F: Fn(&S, &[A]) -> R + Send + Sync + 'static,
    C: Into<GuardConfig<S, A>>,
    S: Clone + Send + 'static,
    A: Clone + Send + 'static,
    R: 'static,
{
    let config = config.into();

    let timeout_timer = match (config.time_limit, &config.on_timeout) {
        (Some(limit), Some(callback)) if !limit.is_zero() => {
            Some(arm_timeout(callback, limit, config.name.clone()))
        }
        _ => None,
    };

    trace!(
        name = ?config.name,
        invocation_limit = config.invocation_limit,
        time_limit = ?config.time_limit,
        delay = ?config.delay,
        "Creating guarded function"
    );

    let inner = Arc::new(GuardInner {
        function: Arc::new(function),
        bound_arguments: config.bound_arguments,
        fail_silently: config.fail_silently,
        delay: config.delay,
        on_timeout: config.on_timeout,
        name: config.name,
        state: Mutex::new(GuardState {
            remaining: config.invocation_limit,
            bound_time: Instant::now(),
            time_limit: config.time_limit,
            timeout_timer,
            scope: config.scope,
        }),
    });

    let extendable = config.time_limit.is_some() && config.extension_allowed;
    let extender = extendable.then(|| DeadlineExtender {
        inner: Arc::clone(&inner),
    });

    Guarded { inner, extender }
}

impl<S, A, R> Guarded<S, A, R>
where
    S: Clone + Send + 'static,
    A: Clone + Send + 'static,
    R: 'static,
{
    /// Call the guarded function with `receiver` and `arguments`.
    ///
    /// Returns `Ok(Some(result))` for an immediate call and `Ok(None)` when
    /// the call was deferred by the configured delay or silently dropped.
    /// A call past the limit reports [`GuardError::InvocationLimitExceeded`]
    /// even when the deadline has also passed.
    ///
    /// # Panics
    ///
    /// Panics if a delayed call is scheduled outside a Tokio runtime.
    pub fn call(&self, receiver: S, arguments: Vec<A>) -> Result<Option<R>> {
        let inner = &self.inner;

        let invocation = {
            let mut state = inner.state.lock();

            // The function is live now, so the timeout notification is stale.
            state.cancel_timeout();

            let scope = state.scope.get_or_insert(receiver).clone();

            match state.remaining.checked_sub(1) {
                Some(remaining) => state.remaining = remaining,
                None => return inner.reject(GuardError::InvocationLimitExceeded),
            }

            if state.is_expired(Instant::now()) {
                return inner.reject(GuardError::Timeout);
            }

            trace!(name = ?inner.name, remaining = state.remaining, "Guarded call permitted");

            Invocation::new(scope, &inner.bound_arguments, arguments)
        };

        if inner.delay.is_zero() {
            return Ok(Some(invocation.apply(&*inner.function)));
        }

        let function = Arc::clone(&inner.function);
        schedule(inner.delay, move || {
            invocation.apply(&*function);
        });

        Ok(None)
    }

    /// The deadline extension capability, present only when a time limit was
    /// configured and extension was not disabled.
    pub fn extender(&self) -> Option<&DeadlineExtender<S, A, R>> {
        self.extender.as_ref()
    }

    /// Number of calls still permitted by the invocation limit.
    pub fn remaining(&self) -> u32 {
        self.inner.state.lock().remaining
    }

    /// The instant from which calls time out, if a time limit is set.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.state.lock().deadline()
    }

    /// Whether the deadline has passed.
    pub fn is_expired(&self) -> bool {
        self.inner.state.lock().is_expired(Instant::now())
    }

    /// The resolved receiver, once configured or captured from a call.
    pub fn scope(&self) -> Option<S> {
        self.inner.state.lock().scope.clone()
    }

    /// The label used in log events.
    pub fn name(&self) -> Option<&str> {
        self.inner.name.as_deref()
    }
}

/// Pushes out the deadline of a [`Guarded`] function.
pub struct DeadlineExtender<S, A, R> {
    inner: Arc<GuardInner<S, A, R>>,
}

impl<S, A, R> Clone for DeadlineExtender<S, A, R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S, A, R> DeadlineExtender<S, A, R> {
    /// Restart the window at now with a length of `time_limit`.
    ///
    /// Fails with [`GuardError::Timeout`] (or does nothing when failing
    /// silently) if the current deadline has already passed. Rearms the
    /// `on_timeout` notification when one is configured.
    ///
    /// # Panics
    ///
    /// Panics if the notification is rearmed outside a Tokio runtime.
    pub fn extend(&self, time_limit: Duration) -> Result<()> {
        let inner = &self.inner;
        let mut state = inner.state.lock();
        let now = Instant::now();

        if state.is_expired(now) {
            drop(state);
            return inner.reject(GuardError::Timeout);
        }

        state.time_limit = Some(time_limit);
        state.bound_time = now;

        if let Some(callback) = &inner.on_timeout {
            state.cancel_timeout();
            state.timeout_timer = Some(arm_timeout(callback, time_limit, inner.name.clone()));
        }

        debug!(
            name = ?inner.name,
            time_limit_ms = time_limit.as_millis() as u64,
            remaining = state.remaining,
            "Deadline extended"
        );

        Ok(())
    }
}
