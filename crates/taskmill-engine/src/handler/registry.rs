//! Handler registry for task-type dispatch
//!
//! Maps each task type to the handler that executes it. Workers look
//! handlers up here at dispatch time, so adding a task type means
//! registering a handler, not editing a dispatcher.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use taskmill_core::TaskType;

use super::builtin::{CpuIntensiveHandler, IoBoundHandler, TimeBasedHandler};
use super::TaskHandler;

/// Registry of task handlers, keyed by task type
///
/// # Example
///
/// ```ignore
/// let mut registry = HandlerRegistry::new();
/// registry.register(CpuIntensiveHandler);
/// registry.register(MyCustomIoHandler::new(client));
///
/// assert!(registry.contains(TaskType::CpuIntensive));
/// ```
pub struct HandlerRegistry {
    handlers: HashMap<TaskType, Arc<dyn TaskHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registry pre-loaded with the built-in handlers for all task types
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(CpuIntensiveHandler);
        registry.register(IoBoundHandler);
        registry.register(TimeBasedHandler);
        registry
    }

    /// Register a handler under its own task type
    ///
    /// The last registration for a type wins.
    pub fn register<H: TaskHandler>(&mut self, handler: H) {
        self.handlers.insert(handler.task_type(), Arc::new(handler));
    }

    /// Look up the handler for a task type
    pub fn get(&self, task_type: TaskType) -> Option<&Arc<dyn TaskHandler>> {
        self.handlers.get(&task_type)
    }

    /// Check if a task type has a registered handler
    pub fn contains(&self, task_type: TaskType) -> bool {
        self.handlers.contains_key(&task_type)
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check if the registry is empty
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Task types with a registered handler
    pub fn task_types(&self) -> impl Iterator<Item = TaskType> + '_ {
        self.handlers.keys().copied()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("task_types", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
