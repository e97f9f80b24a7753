use std::collections::BTreeMap;

use buildrig::config::{
    ConfigFile, ConfigSection, RawConfigFile, TaskConfig, TaskRefConfig, WatchConfig,
};
use buildrig::errors::Result;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                task: BTreeMap::new(),
                watch: Vec::new(),
            },
        }
    }

    pub fn with_task(mut self, name: &str, task: TaskConfig) -> Self {
        self.config.task.insert(name.to_string(), task);
        self
    }

    pub fn with_watch(self, task: &str, patterns: &[&str]) -> Self {
        self.with_watch_excluding(task, patterns, &[])
    }

    pub fn with_watch_excluding(mut self, task: &str, patterns: &[&str], exclude: &[&str]) -> Self {
        self.config.watch.push(WatchConfig {
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            exclude: exclude.iter().map(|p| p.to_string()).collect(),
            task: task.to_string(),
        });
        self
    }

    pub fn default_task(mut self, name: &str) -> Self {
        self.config.config.default_task = name.to_string();
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.config.config.debounce_ms = ms;
        self
    }

    pub fn build_raw(self) -> RawConfigFile {
        self.config
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `TaskConfig`.
///
/// Start from [`cmd`](Self::cmd), [`sequence`](Self::sequence) or
/// [`parallel`](Self::parallel), then add children for composites.
pub struct TaskConfigBuilder {
    task: TaskConfig,
}

impl TaskConfigBuilder {
    pub fn cmd(cmd: &str) -> Self {
        Self {
            task: TaskConfig {
                cmd: Some(cmd.to_string()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn sequence() -> Self {
        Self {
            task: TaskConfig {
                sequence: Some(Vec::new()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn parallel() -> Self {
        Self {
            task: TaskConfig {
                parallel: Some(Vec::new()),
                ..TaskConfig::default()
            },
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.task.description = Some(text.to_string());
        self
    }

    /// Add a by-name child to the sequence/parallel list.
    pub fn child(mut self, name: &str) -> Self {
        self.children().push(TaskRefConfig::Name(name.to_string()));
        self
    }

    /// Add an inline child to the sequence/parallel list.
    pub fn inline(mut self, task: TaskConfig) -> Self {
        self.children().push(TaskRefConfig::Inline(Box::new(task)));
        self
    }

    /// Also set `cmd`, producing an invalid multi-kind task.
    pub fn also_cmd(mut self, cmd: &str) -> Self {
        self.task.cmd = Some(cmd.to_string());
        self
    }

    pub fn build(self) -> TaskConfig {
        self.task
    }

    fn children(&mut self) -> &mut Vec<TaskRefConfig> {
        match (&mut self.task.sequence, &mut self.task.parallel) {
            (Some(list), _) | (None, Some(list)) => list,
            (None, None) => panic!("child() on a command task; start from sequence() or parallel()"),
        }
    }
}
