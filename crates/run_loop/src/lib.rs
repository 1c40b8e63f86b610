//! Cooperative per-thread task queue.
//!
//! Every thread owns one [`RunLoop`], reachable through [`RunLoop::current`].
//! Tasks are scheduled for a [`ScheduleTiming`] in one or more
//! [`RunLoopMode`]s and run when the owning thread turns its loop.

mod run_loop;
mod task;

pub use run_loop::{RunLoop, TurnReport, schedule, schedule_in};
pub use task::{RunLoopMode, ScheduleTiming};
