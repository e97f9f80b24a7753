// src/errors.rs

//! Crate-wide error types.
//!
//! - [`TaskError`] is what a failed run carries inside
//!   [`Outcome::Failure`](crate::exec::Outcome). It is `Clone` + `PartialEq`
//!   so outcomes can be compared and logged from several places.
//! - [`BuildrigError`] covers everything that can go wrong before or around a
//!   run: config loading, watcher setup, IO.

use thiserror::Error;

use crate::types::TaskName;

/// Failure of a single run (leaf, composite, or name resolution).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    #[error("unknown task '{0}'")]
    UnknownTask(TaskName),

    #[error("cyclic task reference: {}", .0.join(" -> "))]
    CyclicReference(Vec<TaskName>),

    #[error("task '{task}' failed: {reason}")]
    TaskBodyFailure { task: TaskName, reason: String },

    #[error("'{task}' failed ({} of its tasks): {}", .failures.len(), first_reason(.failures))]
    CompositeFailure {
        task: TaskName,
        failures: Vec<TaskError>,
    },

    #[error("task '{task}' was cancelled")]
    Cancelled { task: TaskName },
}

impl TaskError {
    /// True if this failure (or any nested failure) stems from cancellation.
    pub fn is_cancellation(&self) -> bool {
        match self {
            TaskError::Cancelled { .. } => true,
            TaskError::CompositeFailure { failures, .. } => {
                failures.iter().any(TaskError::is_cancellation)
            }
            _ => false,
        }
    }

    /// The first failure encountered, unwrapping nested composites.
    pub fn root_cause(&self) -> &TaskError {
        match self {
            TaskError::CompositeFailure { failures, .. } => failures
                .first()
                .map(TaskError::root_cause)
                .unwrap_or(self),
            _ => self,
        }
    }
}

fn first_reason(failures: &[TaskError]) -> String {
    failures
        .first()
        .map(|f| f.to_string())
        .unwrap_or_else(|| "no failures recorded".to_string())
}

#[derive(Error, Debug)]
pub enum BuildrigError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error("File watch error: {0}")]
    WatchError(#[from] notify::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildrigError>;
