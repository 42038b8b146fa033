use std::sync::atomic::Ordering;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use leasehold_core::clock::random_jitter;
use leasehold_core::lease::{window_start, window_ttl};
use leasehold_core::{Lease, StoreError};

use crate::execution::{run_guarded, Execution};
use crate::task::{TaskDescriptor, TaskError};

use super::{Scheduler, SchedulerExit, TickOutcome};

impl Scheduler {
    /// One scheduling pass.
    ///
    /// Runs recovery on the first call, then either drains and exits (a
    /// control flag is set) or hands off every due (task, shard, window)
    /// whose leases this instance manages to acquire. Never waits for the
    /// executions it starts.
    pub async fn tick(&self) -> Result<TickOutcome, StoreError> {
        if !self.recovered.load(Ordering::SeqCst) {
            self.recover().await?;
            self.recovered.store(true, Ordering::SeqCst);
        }

        if self.control_requested().await? {
            let exit = self.shut_down().await?;
            return Ok(TickOutcome::Exit(exit));
        }

        self.lock_handles().retain(|h| !h.is_finished());

        let now = self.ctx.now();
        let mut dispatched = 0;
        for task in self.registry.iter() {
            let window = window_start(now, task.interval_secs, task.offset_secs);
            for shard in 0..task.shard_count {
                if self.try_dispatch(task, shard, window).await? {
                    dispatched += 1;
                }
            }
        }
        Ok(TickOutcome::Continue { dispatched })
    }

    /// Acquire both leases for one triple and spawn its execution.
    /// `Ok(false)` when the triple is already taken or still running.
    async fn try_dispatch(
        &self,
        task: &Arc<TaskDescriptor>,
        shard: u32,
        window: i64,
    ) -> Result<bool, StoreError> {
        let store = self.ctx.store();
        let window_key = self.keys.window(&task.id, shard, window);
        let running_key = self.keys.running(&task.id, shard);

        if store.exists(&window_key).await? || store.exists(&running_key).await? {
            return Ok(false);
        }

        let ttl = window_ttl(task.interval_secs, self.config.fallback_window_ttl_secs);
        let Some(window_lease) = Lease::try_acquire(store, window_key, ttl).await? else {
            debug!(task = %task.id, shard, window, "window taken by another instance");
            return Ok(false);
        };

        let running_lease =
            match Lease::write(store, running_key, self.config.running_ttl_secs).await {
                Ok(lease) => lease,
                Err(e) => {
                    // Give the window back so the triple can be retried.
                    if let Err(release_err) = window_lease.release().await {
                        warn!(task = %task.id, shard, window, error = %release_err, "could not release window lease");
                    }
                    return Err(e);
                }
            };

        info!(task = %task.id, shard, window, "running task");
        if let Ok(mut m) = self.metrics.write() {
            m.record_dispatch(&task.id);
        }

        let execution = Execution {
            task: Arc::clone(task),
            shard,
            window: window_lease,
            running: running_lease,
        };
        let handle = tokio::spawn(execution.run(self.ctx.clone(), Arc::clone(&self.metrics)));
        self.lock_handles().push(handle);
        Ok(true)
    }

    /// Tick until a control flag ends the loop, sleeping a random jitter
    /// between ticks. Store errors are logged and retried on the next tick.
    pub async fn run(&self) -> SchedulerExit {
        info!(tasks = self.registry.len(), "scheduler starting");
        loop {
            match self.tick().await {
                Ok(TickOutcome::Exit(exit)) => return exit,
                Ok(TickOutcome::Continue { .. }) => {}
                Err(e) => error!(error = %e, "scheduler tick failed"),
            }
            self.ctx.sleep(random_jitter(self.config.max_tick_jitter_ms)).await;
        }
    }

    /// Debug mode: run one task once on shard 0, outside the loop and
    /// without touching any lease.
    pub async fn run_once(&self, task_id: &str) -> Result<(), TaskError> {
        let task = self
            .registry
            .get(task_id)
            .ok_or_else(|| TaskError::Unknown(task_id.to_string()))?;

        self.ctx.set_debug(true);
        info!("Debugging {}", task_id);
        let result = run_guarded(&self.ctx, task, 0).await;
        match &result {
            Ok(()) => info!("Debug of {} finished", task_id),
            Err(e) => error!(task = %task_id, error = %e, "debug run failed"),
        }
        result
    }
}
