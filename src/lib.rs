//! Callguard - invocation guards for callables
//!
//! This crate wraps functions with three independent behaviours: a guard that
//! bounds how many times and until when a function may fire, a throttle that
//! spaces out effective calls, and a debounce that collapses bursts of calls
//! into one trailing call. Deferred work runs on Tokio timers.

pub mod config;
pub mod error;
pub mod wrap;

pub use error::{GuardError, Result};
pub use wrap::{debounce, guard, throttle};
