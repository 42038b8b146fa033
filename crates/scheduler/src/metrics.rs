use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Lifecycle of a scheduler instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Running,
    Draining,
    Stopped,
    Restarting,
}

/// Scheduler operational metrics for this process.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerMetrics {
    pub state: SchedulerState,
    /// Executions handed off, by task id.
    pub tasks_dispatched: HashMap<String, u64>,
    pub tasks_succeeded: HashMap<String, u64>,
    pub tasks_failed: HashMap<String, u64>,
    /// Average execution duration by task id (successes and failures).
    pub avg_task_duration: HashMap<String, Duration>,
    /// Last completion time by task id.
    pub last_run: HashMap<String, DateTime<Utc>>,
    /// Executions started by this process and not yet finished.
    pub in_flight: usize,
}

impl Default for SchedulerMetrics {
    fn default() -> Self {
        Self {
            state: SchedulerState::Running,
            tasks_dispatched: HashMap::new(),
            tasks_succeeded: HashMap::new(),
            tasks_failed: HashMap::new(),
            avg_task_duration: HashMap::new(),
            last_run: HashMap::new(),
            in_flight: 0,
        }
    }
}

impl SchedulerMetrics {
    pub fn record_dispatch(&mut self, task_id: &str) {
        *self.tasks_dispatched.entry(task_id.to_string()).or_default() += 1;
        self.in_flight += 1;
    }

    /// Record a finished execution.
    pub fn record_completion(&mut self, task_id: &str, duration: Duration, ok: bool) {
        let counter = if ok {
            &mut self.tasks_succeeded
        } else {
            &mut self.tasks_failed
        };
        *counter.entry(task_id.to_string()).or_default() += 1;
        self.in_flight = self.in_flight.saturating_sub(1);
        self.last_run.insert(task_id.to_string(), Utc::now());

        let count = self.completed(task_id);
        let prev_avg = self
            .avg_task_duration
            .get(task_id)
            .copied()
            .unwrap_or_default();

        // Incremental mean: new_avg = prev_avg + (duration - prev_avg) / count
        let new_avg = if count <= 1 {
            duration
        } else {
            let prev_nanos = prev_avg.as_nanos() as f64;
            let cur_nanos = duration.as_nanos() as f64;
            let avg_nanos = prev_nanos + (cur_nanos - prev_nanos) / count as f64;
            Duration::from_nanos(avg_nanos as u64)
        };
        self.avg_task_duration.insert(task_id.to_string(), new_avg);
    }

    /// Finished executions of `task_id`, successful or not.
    pub fn completed(&self, task_id: &str) -> u64 {
        self.tasks_succeeded.get(task_id).copied().unwrap_or(0)
            + self.tasks_failed.get(task_id).copied().unwrap_or(0)
    }
}
