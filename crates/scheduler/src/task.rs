use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use leasehold_core::{AppContext, LoadError, StoreError};

/// Error type for a single task execution.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("Task failed: {0}")]
    Failed(String),
    #[error("Task panicked: {0}")]
    Panicked(String),
    #[error("Unknown task: {0}")]
    Unknown(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl TaskError {
    pub fn failed(msg: impl fmt::Display) -> Self {
        Self::Failed(msg.to_string())
    }
}

/// A unit of periodic work.
///
/// `shard` is in `[0, shard_count)` and lets one task split its work across
/// several independently leased executions.
#[async_trait]
pub trait CronTask: Send + Sync {
    async fn run(&self, ctx: &AppContext, shard: u32) -> Result<(), TaskError>;
}

/// Closure-backed [`CronTask`], built by [`task_fn`].
pub struct FnTask<F> {
    f: F,
}

#[async_trait]
impl<F, Fut> CronTask for FnTask<F>
where
    F: Fn(AppContext, u32) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), TaskError>> + Send,
{
    async fn run(&self, ctx: &AppContext, shard: u32) -> Result<(), TaskError> {
        (self.f)(ctx.clone(), shard).await
    }
}

/// Wrap an async closure as a task.
pub fn task_fn<F, Fut>(f: F) -> Arc<dyn CronTask>
where
    F: Fn(AppContext, u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(FnTask { f })
}

/// Raw task definition as handed in by a task module. Every field is
/// optional; [`TaskDescriptor::from_definition`] applies defaults and rejects
/// what cannot run.
#[derive(Clone, Default)]
pub struct TaskDefinition {
    pub exec: Option<Arc<dyn CronTask>>,
    /// Interval in seconds.
    pub span: Option<i64>,
    /// Seconds added to the window start.
    pub offset: Option<i64>,
    /// Number of shards.
    pub iterations: Option<i64>,
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("exec", &self.exec.is_some())
            .field("span", &self.span)
            .field("offset", &self.offset)
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl TaskDefinition {
    pub fn new(exec: Arc<dyn CronTask>) -> Self {
        Self {
            exec: Some(exec),
            ..Self::default()
        }
    }

    pub fn span(mut self, secs: i64) -> Self {
        self.span = Some(secs);
        self
    }

    pub fn offset(mut self, secs: i64) -> Self {
        self.offset = Some(secs);
        self
    }

    pub fn iterations(mut self, shards: i64) -> Self {
        self.iterations = Some(shards);
        self
    }
}

/// A validated, schedulable task.
#[derive(Clone)]
pub struct TaskDescriptor {
    pub id: String,
    pub exec: Arc<dyn CronTask>,
    pub interval_secs: i64,
    pub offset_secs: i64,
    pub shard_count: u32,
}

impl fmt::Debug for TaskDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDescriptor")
            .field("id", &self.id)
            .field("interval_secs", &self.interval_secs)
            .field("offset_secs", &self.offset_secs)
            .field("shard_count", &self.shard_count)
            .finish()
    }
}

impl TaskDescriptor {
    pub fn from_definition(id: impl Into<String>, def: TaskDefinition) -> Result<Self, LoadError> {
        let id = id.into();
        let exec = def
            .exec
            .ok_or_else(|| LoadError::MissingExec { id: id.clone() })?;

        let interval_secs = def.span.unwrap_or(1);
        if interval_secs < 1 {
            return Err(LoadError::InvalidSpan { id, span: interval_secs });
        }
        let offset_secs = def.offset.unwrap_or(0);
        if offset_secs < 0 {
            return Err(LoadError::InvalidOffset { id, offset: offset_secs });
        }
        let iterations = def.iterations.unwrap_or(1);
        let shard_count = match u32::try_from(iterations) {
            Ok(n) if n >= 1 => n,
            _ => return Err(LoadError::InvalidIterations { id, iterations }),
        };

        Ok(Self {
            id,
            exec,
            interval_secs,
            offset_secs,
            shard_count,
        })
    }

    /// "every N second interval [with an offset of M seconds]"
    pub fn schedule_summary(&self) -> String {
        let mut s = format!("every {} second interval", self.interval_secs);
        if self.offset_secs > 0 {
            s.push_str(&format!(" with an offset of {} seconds", self.offset_secs));
        }
        if self.shard_count > 1 {
            s.push_str(&format!(" across {} shards", self.shard_count));
        }
        s
    }
}
