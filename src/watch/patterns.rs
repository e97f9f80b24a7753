// src/watch/patterns.rs

use std::fmt;

use anyhow::Context;
use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};

use crate::config::ConfigFile;
use crate::errors::{BuildrigError, Result};
use crate::types::TaskName;

/// Uncompiled watch binding: which paths re-trigger which task.
///
/// Patterns are globs relative to the project root, e.g. `"assets/**/*"`.
/// A leading `./` is ignored. `*` and `?` stay within one path component;
/// use `**` to cross directories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchSpec {
    pub task: TaskName,
    pub patterns: Vec<String>,
    pub exclude: Vec<String>,
}

impl WatchSpec {
    pub fn new<N, I, S>(task: N, patterns: I) -> Self
    where
        N: Into<TaskName>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            task: task.into(),
            patterns: patterns.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
        }
    }

    pub fn excluding<I, S>(mut self, exclude: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(exclude.into_iter().map(Into::into));
        self
    }
}

/// Compiled glob sets for one binding.
#[derive(Clone)]
pub struct WatchProfile {
    task: TaskName,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchProfile")
            .field("task", &self.task)
            .finish_non_exhaustive()
    }
}

impl WatchProfile {
    pub fn compile(watch: &WatchSpec) -> Result<Self> {
        if watch.patterns.is_empty() {
            return Err(BuildrigError::ConfigError(format!(
                "watch binding for task '{}' has no patterns",
                watch.task
            )));
        }

        let watch_set = build_globset(&watch.patterns)
            .with_context(|| format!("building watch globset for task '{}'", watch.task))
            .map_err(config_error)?;

        let exclude_set = if watch.exclude.is_empty() {
            None
        } else {
            Some(
                build_globset(&watch.exclude)
                    .with_context(|| format!("building exclude globset for task '{}'", watch.task))
                    .map_err(config_error)?,
            )
        };

        Ok(Self {
            task: watch.task.clone(),
            watch_set,
            exclude_set,
        })
    }

    /// Task this binding re-runs.
    pub fn task(&self) -> &str {
        &self.task
    }

    /// True if a change to `rel_path` (relative to the project root, forward
    /// slashes) should trigger this binding.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        match &self.exclude_set {
            Some(exclude) => !exclude.is_match(rel_path),
            None => true,
        }
    }
}

fn config_error(err: anyhow::Error) -> BuildrigError {
    BuildrigError::ConfigError(format!("{err:#}"))
}

fn build_globset(patterns: &[String]) -> anyhow::Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = compile_glob(pat).with_context(|| format!("invalid glob pattern: {pat}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

/// Compile one watch pattern the way bindings match it. Paths handed to
/// [`WatchProfile::matches`] never start with `./`, so neither may the glob.
pub(crate) fn compile_glob(pattern: &str) -> std::result::Result<Glob, globset::Error> {
    let mut pattern = pattern;
    while let Some(rest) = pattern.strip_prefix("./") {
        pattern = rest;
    }
    GlobBuilder::new(pattern).literal_separator(true).build()
}

/// Watch specs declared by `[[watch]]` entries of a loaded config.
pub fn watches_from_config(cfg: &ConfigFile) -> Vec<WatchSpec> {
    cfg.watches()
        .iter()
        .map(|w| WatchSpec {
            task: w.task.clone(),
            patterns: w.patterns.clone(),
            exclude: w.exclude.clone(),
        })
        .collect()
}
