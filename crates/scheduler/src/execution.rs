//! Task execution wrapper: runs one (task, shard, window) and settles its
//! leases afterwards.

use std::any::Any;
use std::sync::{Arc, RwLock};

use tokio::time::Instant;
use tracing::{debug, error, warn};

use leasehold_core::{AppContext, Lease};

use crate::metrics::SchedulerMetrics;
use crate::task::{TaskDescriptor, TaskError};

/// Run `task` on its own tokio task so a panic in user code surfaces as
/// [`TaskError::Panicked`] instead of unwinding into the caller.
pub async fn run_guarded(ctx: &AppContext, task: &TaskDescriptor, shard: u32) -> Result<(), TaskError> {
    let exec = Arc::clone(&task.exec);
    let ctx = ctx.clone();
    match tokio::spawn(async move { exec.run(&ctx, shard).await }).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => Err(TaskError::Panicked(panic_message(e.into_panic()))),
        Err(e) => Err(TaskError::Failed(e.to_string())),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// A dispatched execution holding both of its leases.
pub(crate) struct Execution {
    pub(crate) task: Arc<TaskDescriptor>,
    pub(crate) shard: u32,
    pub(crate) window: Lease,
    pub(crate) running: Lease,
}

impl Execution {
    /// Run to completion, then release the running lease and either keep
    /// (success) or release (failure, bailout) the window lease.
    pub(crate) async fn run(self, ctx: AppContext, metrics: Arc<RwLock<SchedulerMetrics>>) {
        let Execution {
            task,
            shard,
            window,
            running,
        } = self;

        let started = Instant::now();
        let result = run_guarded(&ctx, &task, shard).await;
        let elapsed = started.elapsed();

        match &result {
            Ok(()) => debug!(task = %task.id, shard, elapsed_ms = elapsed.as_millis() as u64, "task finished"),
            Err(e) => error!(task = %task.id, shard, error = %e, "task failure"),
        }

        if result.is_err() || ctx.is_bailout() {
            let key = window.key().to_string();
            if let Err(e) = window.release().await {
                warn!(key = %key, error = %e, "failed to release window lease, leaving it to expire");
            }
        } else {
            window.detach();
        }

        let key = running.key().to_string();
        if let Err(e) = running.release().await {
            warn!(key = %key, error = %e, "failed to release running lease, leaving it to expire");
        }

        if let Ok(mut m) = metrics.write() {
            m.record_completion(&task.id, elapsed, result.is_ok());
        }
    }
}
