use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use tokio::task::JoinHandle;
use tracing::warn;

use leasehold_core::config::SchedulerConfig;
use leasehold_core::{AppContext, LeaseKeys};

use crate::metrics::{SchedulerMetrics, SchedulerState};
use crate::registry::TaskRegistry;

/// How a scheduler loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerExit {
    Stopped,
    Restart,
}

/// Result of one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Keep ticking. `dispatched` executions were handed off this tick.
    Continue { dispatched: usize },
    Exit(SchedulerExit),
}

/// Periodic task scheduler coordinated through store leases.
pub struct Scheduler {
    pub(super) ctx: AppContext,
    pub(super) registry: Arc<TaskRegistry>,
    pub(super) config: SchedulerConfig,
    pub(super) keys: LeaseKeys,
    pub(super) metrics: Arc<RwLock<SchedulerMetrics>>,
    /// Startup recovery has run.
    pub(super) recovered: AtomicBool,
    /// Executions handed off by this instance.
    pub(super) handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Scheduler {
    /// Scheduler configured from `ctx.config().scheduler`.
    pub fn new(ctx: AppContext, registry: TaskRegistry) -> Self {
        let config = ctx.config().scheduler.clone();
        Self::with_config(ctx, registry, config)
    }

    pub fn with_config(ctx: AppContext, registry: TaskRegistry, config: SchedulerConfig) -> Self {
        Self {
            keys: LeaseKeys::new(config.key_prefix.clone()),
            ctx,
            registry: Arc::new(registry),
            config,
            metrics: Arc::new(RwLock::new(SchedulerMetrics::default())),
            recovered: AtomicBool::new(false),
            handles: Mutex::new(Vec::new()),
        }
    }

    pub fn context(&self) -> &AppContext {
        &self.ctx
    }

    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    pub fn keys(&self) -> &LeaseKeys {
        &self.keys
    }

    /// Get a snapshot of the current scheduler metrics.
    pub fn metrics(&self) -> SchedulerMetrics {
        self.metrics
            .read()
            .map(|m| m.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn state(&self) -> SchedulerState {
        self.metrics().state
    }

    pub(super) fn set_state(&self, state: SchedulerState) {
        if let Ok(mut m) = self.metrics.write() {
            m.state = state;
        }
    }

    pub(super) fn lock_handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Wait for every execution this instance has handed off so far.
    ///
    /// The loop itself never does this; drain only watches the store.
    pub async fn join_in_flight(&self) {
        let handles = std::mem::take(&mut *self.lock_handles());
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "execution task did not complete");
            }
        }
    }
}
