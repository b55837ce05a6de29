//! Wrappers that change how and when a callable fires.

mod debounce;
mod guard;
mod invocation;
mod throttle;
mod timer;

pub use debounce::{debounce, Debounced, DEFAULT_QUIET_PERIOD};
pub use guard::{guard, DeadlineExtender, GuardConfig, Guarded, TimeoutCallback};
pub use invocation::{concat_arguments, Invocation};
pub use throttle::{throttle, Throttled, DEFAULT_THRESHOLD};
pub use timer::{schedule, TimerHandle};
