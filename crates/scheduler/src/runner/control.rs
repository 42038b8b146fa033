use std::time::Duration;

use tracing::{info, warn};

use leasehold_core::{StoreError, RESTART_KEY, STOP_KEY};

use crate::metrics::SchedulerState;

use super::{Scheduler, SchedulerExit};

impl Scheduler {
    /// Clear control flags and running leases left by a previous process.
    /// Window leases are kept: a window that already ran stays done.
    pub async fn recover(&self) -> Result<(), StoreError> {
        let store = self.ctx.store();
        store.delete(STOP_KEY).await?;
        store.delete(RESTART_KEY).await?;

        let stale = store.keys_with_prefix(&self.keys.running_prefix()).await?;
        for key in &stale {
            store.delete(key).await?;
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "cleared stale running leases");
        }
        Ok(())
    }

    pub(super) async fn control_requested(&self) -> Result<bool, StoreError> {
        let store = self.ctx.store();
        Ok(store.exists(STOP_KEY).await? || store.exists(RESTART_KEY).await?)
    }

    /// Drain, then settle on Stopped or Restarting.
    pub(super) async fn shut_down(&self) -> Result<SchedulerExit, StoreError> {
        self.set_state(SchedulerState::Draining);
        self.ctx.set_bailout();
        info!("control flag set, draining");

        self.drain().await?;

        let store = self.ctx.store();
        if store.exists(RESTART_KEY).await? {
            store.delete(RESTART_KEY).await?;
            self.set_state(SchedulerState::Restarting);
            info!("Restarting...");
            Ok(SchedulerExit::Restart)
        } else {
            self.set_state(SchedulerState::Stopped);
            info!("STOPPED");
            Ok(SchedulerExit::Stopped)
        }
    }

    /// Poll the running-lease prefix until it is empty or the attempt budget
    /// runs out. Returns how many running leases were still present.
    pub(super) async fn drain(&self) -> Result<usize, StoreError> {
        let store = self.ctx.store();
        let prefix = self.keys.running_prefix();
        let poll = Duration::from_millis(self.config.drain_poll_ms);

        for attempt in 0..self.config.drain_attempts {
            let running = store.keys_with_prefix(&prefix).await?;
            if running.is_empty() {
                return Ok(0);
            }
            info!(attempt, running = ?running, "waiting for running tasks");
            self.ctx.sleep(poll).await;
        }

        let remaining = store.keys_with_prefix(&prefix).await?.len();
        if remaining > 0 {
            warn!(remaining, "drain attempts exhausted, exiting with tasks still running");
        }
        Ok(remaining)
    }
}
