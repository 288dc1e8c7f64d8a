//! # Task registry: name → task lookup linked into the executable.
//!
//! The same executable acts as root supervisor, group supervisor and leaf
//! worker. Tasks are registered by name before [`dispatch`](crate::dispatch), so a
//! spawned worker resolves the name carried in its start command to code that is
//! already compiled in.

use std::collections::HashMap;
use std::fmt;

use super::task::TaskRef;

/// Name-indexed set of tasks.
#[derive(Clone, Default)]
pub struct TaskRegistry {
    tasks: HashMap<String, TaskRef>,
}

impl TaskRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `task` under its own name, replacing any previous entry.
    pub fn register(&mut self, task: TaskRef) -> &mut Self {
        self.tasks.insert(task.name().to_string(), task);
        self
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, task: TaskRef) -> Self {
        self.register(task);
        self
    }

    /// Looks a task up by name.
    pub fn get(&self, name: &str) -> Option<TaskRef> {
        self.tasks.get(name).cloned()
    }

    /// True if a task named `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    /// Sorted list of registered names.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl fmt::Debug for TaskRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRegistry")
            .field("tasks", &self.names())
            .finish()
    }
}
