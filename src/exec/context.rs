// src/exec/context.rs

use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::types::{RunMode, TaskName};

/// Per-invocation state handed to the executor and to every task body.
///
/// One context is created for the top-level run and one for each
/// watch-triggered run. Cloning is cheap; clones share the cancellation flag.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    root: TaskName,
    mode: RunMode,
    cancel: CancellationToken,
}

impl ExecutionContext {
    pub fn new(root: impl Into<TaskName>, mode: RunMode) -> Self {
        Self::with_cancellation(root, mode, CancellationToken::new())
    }

    pub fn with_cancellation(
        root: impl Into<TaskName>,
        mode: RunMode,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            root: root.into(),
            mode,
            cancel,
        }
    }

    /// Name of the task this invocation was started for.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Resolves once the context is cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }
}
