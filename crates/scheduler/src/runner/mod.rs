//! Scheduler loop.
//!
//! Split into focused submodules:
//! - `core`: Scheduler struct, constructor and accessors
//! - `scheduling`: tick, lease acquisition and hand-off, the run loop
//! - `control`: startup recovery, STOP/RESTART handling and drain
//!
//! Exclusivity across processes rests entirely on the window lease: the
//! instance whose `set_if_absent` succeeds for a (task, shard, window) runs
//! it, everyone else skips it.

mod control;
mod core;
mod scheduling;

pub use self::core::{Scheduler, SchedulerExit, TickOutcome};
