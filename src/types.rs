use std::fmt;
use std::str::FromStr;

use crate::exec::Outcome;

/// Canonical task name type used throughout the crate.
pub type TaskName = String;

/// Whether an invocation is a one-shot build or a long-running watch session.
///
/// The mode is exported to shell task bodies as `BUILDRIG_MODE`, so a task can
/// e.g. skip minification while developing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Once,
    Watch,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Once => "once",
            RunMode::Watch => "watch",
        }
    }

    pub fn is_watch(&self) -> bool {
        matches!(self, RunMode::Watch)
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "once" => Ok(RunMode::Once),
            "watch" => Ok(RunMode::Watch),
            other => Err(format!(
                "invalid run mode: {other} (expected \"once\" or \"watch\")"
            )),
        }
    }
}

/// How a top-level invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// The root task reached a terminal outcome (one-shot mode).
    Finished(Outcome),
    /// The process was interrupted (Ctrl-C). Watch mode always ends this way.
    Interrupted,
}

impl Completion {
    /// Process exit status for this completion.
    pub fn exit_code(&self) -> i32 {
        match self {
            Completion::Finished(Outcome::Success) => 0,
            Completion::Finished(Outcome::Failure(_)) => 1,
            Completion::Interrupted => 130,
        }
    }
}
