// src/registry.rs

//! Name → task definition mapping.
//!
//! The registry is an ordinary value owned by whoever builds it (the config
//! layer in the binary, the test itself in tests). It is filled during
//! startup and then shared read-only, usually as `Arc<Registry>`.

use std::collections::BTreeMap;

use tracing::debug;

use crate::errors::TaskError;
use crate::task::TaskDef;
use crate::types::TaskName;

#[derive(Debug, Clone)]
struct Entry {
    def: TaskDef,
    description: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
    tasks: BTreeMap<TaskName, Entry>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `def`, replacing (and returning) any earlier binding.
    pub fn register(&mut self, name: impl Into<TaskName>, def: TaskDef) -> Option<TaskDef> {
        self.insert(name.into(), def, None)
    }

    /// Like [`register`](Self::register), with a description for listings.
    pub fn register_described(
        &mut self,
        name: impl Into<TaskName>,
        description: impl Into<String>,
        def: TaskDef,
    ) -> Option<TaskDef> {
        self.insert(name.into(), def, Some(description.into()))
    }

    fn insert(
        &mut self,
        name: TaskName,
        def: TaskDef,
        description: Option<String>,
    ) -> Option<TaskDef> {
        debug!(task = %name, kind = %def.kind(), "registering task");
        let previous = self.tasks.insert(name.clone(), Entry { def, description });
        if previous.is_some() {
            debug!(task = %name, "replaced earlier registration");
        }
        previous.map(|e| e.def)
    }

    /// Look up the definition bound to `name`.
    pub fn resolve(&self, name: &str) -> Result<&TaskDef, TaskError> {
        self.tasks
            .get(name)
            .map(|e| &e.def)
            .ok_or_else(|| TaskError::UnknownTask(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tasks.contains_key(name)
    }

    pub fn description(&self, name: &str) -> Option<&str> {
        self.tasks.get(name).and_then(|e| e.description.as_deref())
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tasks.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
