// src/config/model.rs

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;

use crate::errors::{BuildrigError, Result};
use crate::exec::ShellCommand;
use crate::registry::Registry;
use crate::task::{leaf, parallel, sequence, TaskDef, TaskRef};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// default_task = "default"
/// debounce_ms = 200
///
/// [task.clean]
/// cmd = "rm -rf dist"
///
/// [task.build]
/// sequence = ["clean", { parallel = ["assets", "manifest"] }]
///
/// [[watch]]
/// patterns = ["assets/**/*"]
/// task = "assets"
/// ```
///
/// This is the raw form straight out of `serde`; convert it into a
/// [`ConfigFile`] (via `TryFrom`) to get a validated config.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: ConfigSection,

    /// All tasks from `[task.<name>]`, keyed by task name.
    #[serde(default)]
    pub task: BTreeMap<String, TaskConfig>,

    /// Watch bindings from `[[watch]]`.
    #[serde(default)]
    pub watch: Vec<WatchConfig>,
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    task: BTreeMap<String, TaskConfig>,
    watch: Vec<WatchConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        task: BTreeMap<String, TaskConfig>,
        watch: Vec<WatchConfig>,
    ) -> Self {
        Self {
            config,
            task,
            watch,
        }
    }

    pub fn config_section(&self) -> &ConfigSection {
        &self.config
    }

    pub fn tasks(&self) -> &BTreeMap<String, TaskConfig> {
        &self.task
    }

    pub fn watches(&self) -> &[WatchConfig] {
        &self.watch
    }

    /// Register every configured task. Command leaves run in `root`.
    pub fn build_registry(&self, root: &Path) -> Result<Registry> {
        let mut registry = Registry::new();
        for (name, task) in self.task.iter() {
            let def = task_def(name, task, root)?;
            match &task.description {
                Some(description) => registry.register_described(name, description, def),
                None => registry.register(name, def),
            };
        }
        Ok(registry)
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigSection {
    /// Task run when no task is named on the command line.
    #[serde(default = "default_task_name")]
    pub default_task: String,

    /// Quiet period before a watch binding starts its task.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

fn default_task_name() -> String {
    "default".to_string()
}

fn default_debounce_ms() -> u64 {
    200
}

impl ConfigSection {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            default_task: default_task_name(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// `[task.<name>]` section, also used for inline references.
///
/// Exactly one of `cmd`, `sequence`, `parallel` must be set.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TaskConfig {
    #[serde(default)]
    pub description: Option<String>,

    /// Shell command for a leaf task.
    #[serde(default)]
    pub cmd: Option<String>,

    #[serde(default)]
    pub sequence: Option<Vec<TaskRefConfig>>,

    #[serde(default)]
    pub parallel: Option<Vec<TaskRefConfig>>,
}

/// Borrowed view of which kind of task a [`TaskConfig`] declares.
#[derive(Debug, Clone, Copy)]
pub enum TaskShape<'a> {
    Command(&'a str),
    Sequence(&'a [TaskRefConfig]),
    Parallel(&'a [TaskRefConfig]),
}

impl TaskConfig {
    /// Decide the task kind, or explain why the section is ambiguous/empty.
    pub fn shape(&self) -> std::result::Result<TaskShape<'_>, String> {
        let mut set = Vec::new();
        if self.cmd.is_some() {
            set.push("cmd");
        }
        if self.sequence.is_some() {
            set.push("sequence");
        }
        if self.parallel.is_some() {
            set.push("parallel");
        }
        if set.len() != 1 {
            return Err(format!(
                "must set exactly one of `cmd`, `sequence`, `parallel` (found: {})",
                if set.is_empty() {
                    "none".to_string()
                } else {
                    set.join(", ")
                }
            ));
        }

        if let Some(cmd) = &self.cmd {
            return Ok(TaskShape::Command(cmd));
        }
        if let Some(children) = &self.sequence {
            return Ok(TaskShape::Sequence(children));
        }
        match &self.parallel {
            Some(children) => Ok(TaskShape::Parallel(children)),
            None => Err("no task kind set".to_string()),
        }
    }
}

/// A child entry of `sequence` / `parallel`: a task name or an inline table.
#[derive(Debug, Clone)]
pub enum TaskRefConfig {
    Name(String),
    Inline(Box<TaskConfig>),
}

// Dispatches on the value type so an inline table goes straight through
// `TaskConfig` and its unknown-field errors reach the user.
impl<'de> Deserialize<'de> for TaskRefConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct TaskRefVisitor;

        impl<'de> Visitor<'de> for TaskRefVisitor {
            type Value = TaskRefConfig;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a task name or an inline task table")
            }

            fn visit_str<E: de::Error>(self, name: &str) -> std::result::Result<Self::Value, E> {
                Ok(TaskRefConfig::Name(name.to_string()))
            }

            fn visit_string<E: de::Error>(
                self,
                name: String,
            ) -> std::result::Result<Self::Value, E> {
                Ok(TaskRefConfig::Name(name))
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                map: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let task = TaskConfig::deserialize(de::value::MapAccessDeserializer::new(map))?;
                Ok(TaskRefConfig::Inline(Box::new(task)))
            }
        }

        deserializer.deserialize_any(TaskRefVisitor)
    }
}

/// `[[watch]]` entry.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatchConfig {
    /// Glob patterns relative to the project root.
    pub patterns: Vec<String>,

    /// Paths matching any of these are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Task re-run when a matching path changes.
    pub task: String,
}

fn task_def(label: &str, task: &TaskConfig, root: &Path) -> Result<TaskDef> {
    let shape = task
        .shape()
        .map_err(|msg| BuildrigError::ConfigError(format!("task '{label}' {msg}")))?;

    let def = match shape {
        TaskShape::Command(cmd) => leaf(ShellCommand::new(label, cmd, root)),
        TaskShape::Sequence(children) => sequence(child_refs(label, children, root)?),
        TaskShape::Parallel(children) => parallel(child_refs(label, children, root)?),
    };
    Ok(def)
}

fn child_refs(parent: &str, children: &[TaskRefConfig], root: &Path) -> Result<Vec<TaskRef>> {
    children
        .iter()
        .enumerate()
        .map(|(index, child)| match child {
            TaskRefConfig::Name(name) => Ok(TaskRef::ByName(name.clone())),
            TaskRefConfig::Inline(inline) => {
                let label = format!("{parent}[{index}]");
                Ok(TaskRef::from(task_def(&label, inline, root)?))
            }
        })
        .collect()
}
