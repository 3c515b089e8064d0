//! One independent, cancellable periodic task per active monitor.
//!
//! Tasks share no mutable state with each other; within one monitor the
//! check pipeline is serialized by a non-reentrant guard, and a tick that
//! arrives while the previous check is still in flight is skipped.

pub mod model;
pub mod runtime;

pub use model::ScheduleInfo;
pub use runtime::{CheckRunner, ScheduleRuntime};
