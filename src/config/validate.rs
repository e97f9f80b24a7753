// src/config/validate.rs

use std::collections::{HashMap, VecDeque};

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{
    ConfigFile, RawConfigFile, TaskConfig, TaskRefConfig, TaskShape, WatchConfig,
};
use crate::errors::{BuildrigError, Result, TaskError};
use crate::watch::patterns::compile_glob;

/// Upper bound for `[config].debounce_ms` (one minute).
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildrigError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.task, raw.watch))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    validate_config_section(cfg)?;
    ensure_has_tasks(cfg)?;
    validate_task_shapes(cfg)?;
    validate_task_references(cfg)?;
    validate_reference_graph(cfg)?;
    validate_watches(cfg)?;
    Ok(())
}

fn validate_config_section(cfg: &RawConfigFile) -> Result<()> {
    let debounce_ms = cfg.config.debounce_ms;
    if debounce_ms > MAX_DEBOUNCE_MS {
        return Err(BuildrigError::ConfigError(format!(
            "[config].debounce_ms = {debounce_ms} is too large (at most {MAX_DEBOUNCE_MS})"
        )));
    }
    Ok(())
}

fn ensure_has_tasks(cfg: &RawConfigFile) -> Result<()> {
    if cfg.task.is_empty() {
        return Err(BuildrigError::ConfigError(
            "config must contain at least one [task.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_task_shapes(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        check_shape(name, task)?;
    }
    Ok(())
}

fn check_shape(label: &str, task: &TaskConfig) -> Result<()> {
    let shape = task
        .shape()
        .map_err(|msg| BuildrigError::ConfigError(format!("task '{label}' {msg}")))?;

    let (field, children) = match shape {
        TaskShape::Command(cmd) => {
            if cmd.trim().is_empty() {
                return Err(BuildrigError::ConfigError(format!(
                    "task '{label}' has an empty `cmd`"
                )));
            }
            return Ok(());
        }
        TaskShape::Sequence(children) => ("sequence", children),
        TaskShape::Parallel(children) => ("parallel", children),
    };

    if children.is_empty() {
        return Err(BuildrigError::ConfigError(format!(
            "task '{label}' has an empty `{field}`"
        )));
    }

    for (index, child) in children.iter().enumerate() {
        if let TaskRefConfig::Inline(inline) = child {
            check_shape(&format!("{label}[{index}]"), inline)?;
        }
    }
    Ok(())
}

/// Every by-name reference reachable from `task`, including inside inline
/// tables.
fn referenced_names(task: &TaskConfig) -> Vec<&str> {
    let mut names = Vec::new();
    collect_names(task, &mut names);
    names
}

fn collect_names<'a>(task: &'a TaskConfig, out: &mut Vec<&'a str>) {
    let children = task
        .sequence
        .iter()
        .chain(task.parallel.iter())
        .flat_map(|list| list.iter());

    for child in children {
        match child {
            TaskRefConfig::Name(name) => out.push(name.as_str()),
            TaskRefConfig::Inline(inline) => collect_names(inline, out),
        }
    }
}

fn validate_task_references(cfg: &RawConfigFile) -> Result<()> {
    for (name, task) in cfg.task.iter() {
        for dep in referenced_names(task) {
            if !cfg.task.contains_key(dep) {
                tracing::error!(task = %name, reference = %dep, "reference to unknown task");
                return Err(TaskError::UnknownTask(dep.to_string()).into());
            }
        }
    }
    Ok(())
}

fn validate_reference_graph(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: composite -> referenced task.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.task.keys() {
        graph.add_node(name.as_str());
    }

    for (name, task) in cfg.task.iter() {
        for dep in referenced_names(task) {
            graph.add_edge(name.as_str(), dep, ());
        }
    }

    // A topological sort will fail if there is a cycle.
    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => {
            let chain = cycle_through(&graph, cycle.node_id());
            Err(TaskError::CyclicReference(chain).into())
        }
    }
}

/// Shortest reference chain from `start` back to itself.
fn cycle_through(graph: &DiGraphMap<&str, ()>, start: &str) -> Vec<String> {
    let mut came_from: HashMap<&str, &str> = HashMap::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    queue.push_back(start);

    while let Some(node) = queue.pop_front() {
        for next in graph.neighbors(node) {
            if next == start {
                let mut chain = vec![start.to_string()];
                let mut cursor = node;
                let mut reversed = Vec::new();
                while cursor != start {
                    reversed.push(cursor.to_string());
                    cursor = came_from.get(cursor).copied().unwrap_or(start);
                }
                chain.extend(reversed.into_iter().rev());
                chain.push(start.to_string());
                return chain;
            }
            if next != start && !came_from.contains_key(next) {
                came_from.insert(next, node);
                queue.push_back(next);
            }
        }
    }

    vec![start.to_string()]
}

fn validate_watches(cfg: &RawConfigFile) -> Result<()> {
    for (index, watch) in cfg.watch.iter().enumerate() {
        validate_watch(index, watch, cfg)?;
    }
    Ok(())
}

fn validate_watch(index: usize, watch: &WatchConfig, cfg: &RawConfigFile) -> Result<()> {
    if !cfg.task.contains_key(&watch.task) {
        tracing::error!(watch = index, task = %watch.task, "watch binding names unknown task");
        return Err(TaskError::UnknownTask(watch.task.clone()).into());
    }

    if watch.patterns.is_empty() {
        return Err(BuildrigError::ConfigError(format!(
            "[[watch]] #{index} (task '{}') must list at least one pattern",
            watch.task
        )));
    }

    for pattern in watch.patterns.iter().chain(watch.exclude.iter()) {
        compile_glob(pattern).map_err(|e| {
            BuildrigError::ConfigError(format!(
                "[[watch]] #{index} (task '{}') has invalid glob '{pattern}': {e}",
                watch.task
            ))
        })?;
    }
    Ok(())
}
