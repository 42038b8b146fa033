//! Distributed periodic task scheduler.
//!
//! Any number of processes may run a [`Scheduler`] over the same store; the
//! window and running leases keep each (task, shard, window) to at most one
//! active execution without a central coordinator.

pub mod execution;
pub mod metrics;
pub mod registry;
pub mod runner;
pub mod task;

pub use execution::run_guarded;
pub use metrics::{SchedulerMetrics, SchedulerState};
pub use registry::TaskRegistry;
pub use runner::{Scheduler, SchedulerExit, TickOutcome};
pub use task::{task_fn, CronTask, TaskDefinition, TaskDescriptor, TaskError};
