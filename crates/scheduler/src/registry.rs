use std::sync::Arc;

use tracing::{info, warn};

use leasehold_core::LoadError;

use crate::task::{TaskDefinition, TaskDescriptor};

/// Ordered set of schedulable tasks. Iteration order is registration order.
#[derive(Debug, Default, Clone)]
pub struct TaskRegistry {
    tasks: Vec<Arc<TaskDescriptor>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add a task. Invalid definitions and duplicate ids are errors.
    pub fn register(&mut self, id: impl Into<String>, def: TaskDefinition) -> Result<(), LoadError> {
        let id = id.into();
        if self.get(&id).is_some() {
            return Err(LoadError::Duplicate(id));
        }
        let task = TaskDescriptor::from_definition(id, def)?;
        info!("Loaded {} to run {}", task.id, task.schedule_summary());
        self.tasks.push(Arc::new(task));
        Ok(())
    }

    /// Build a registry from task modules, skipping (and logging) the ones
    /// that cannot run. Only a duplicate id aborts the load.
    pub fn from_definitions<I, S>(defs: I) -> Result<Self, LoadError>
    where
        I: IntoIterator<Item = (S, TaskDefinition)>,
        S: Into<String>,
    {
        let mut registry = Self::new();
        for (id, def) in defs {
            match registry.register(id, def) {
                Ok(()) => {}
                Err(LoadError::Duplicate(id)) => return Err(LoadError::Duplicate(id)),
                Err(e) => warn!(error = %e, "skipping task"),
            }
        }
        Ok(registry)
    }

    pub fn get(&self, id: &str) -> Option<&Arc<TaskDescriptor>> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<TaskDescriptor>> {
        self.tasks.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.id.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
