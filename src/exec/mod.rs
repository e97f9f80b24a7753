// src/exec/mod.rs

//! Plan execution.
//!
//! - [`Executor`] walks a [`Plan`] and produces an [`Outcome`]:
//!   sequences stop at the first failure, parallel groups start every child
//!   and wait for all of them to settle.
//! - [`context`] holds the per-invocation [`ExecutionContext`].
//! - [`command`] provides the shell-command leaf body used by config tasks.
//!
//! Parallel children are polled together on the caller's task (through
//! `FuturesUnordered`), so "parallel" means interleaved suspension points,
//! not extra threads. Suspension only happens inside leaf bodies.

pub mod command;
pub mod context;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{debug, error, info, warn};

use crate::errors::TaskError;
use crate::plan::Plan;
use crate::registry::Registry;
use crate::task::TaskBody;

pub use command::ShellCommand;
pub use context::ExecutionContext;

/// Terminal result of running a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Failure(TaskError),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }

    pub fn error(&self) -> Option<&TaskError> {
        match self {
            Outcome::Success => None,
            Outcome::Failure(err) => Some(err),
        }
    }

    pub fn into_result(self) -> Result<(), TaskError> {
        match self {
            Outcome::Success => Ok(()),
            Outcome::Failure(err) => Err(err),
        }
    }
}

type NodeFuture<'a> = Pin<Box<dyn Future<Output = Outcome> + Send + 'a>>;

/// Runs plans within one [`ExecutionContext`].
///
/// The executor keeps no state between runs beyond its context.
#[derive(Debug, Clone)]
pub struct Executor {
    ctx: ExecutionContext,
}

impl Executor {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.ctx
    }

    /// Run `plan` to a terminal outcome.
    pub async fn run(&self, plan: &Plan) -> Outcome {
        info!(
            root = %self.ctx.root(),
            mode = %self.ctx.mode(),
            leaves = plan.leaf_count(),
            "starting run"
        );
        let started = Instant::now();

        let outcome = self.run_node(plan).await;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            Outcome::Success => info!(root = %self.ctx.root(), elapsed_ms, "run succeeded"),
            Outcome::Failure(err) => {
                error!(root = %self.ctx.root(), elapsed_ms, error = %err, "run failed")
            }
        }
        outcome
    }

    fn run_node<'a>(&'a self, plan: &'a Plan) -> NodeFuture<'a> {
        Box::pin(async move {
            match plan {
                Plan::Leaf { label, body } => self.run_leaf(label, body).await,
                Plan::Sequence { label, children } => self.run_sequence(label, children).await,
                Plan::Parallel { label, children } => self.run_parallel(label, children).await,
            }
        })
    }

    async fn run_leaf(&self, label: &str, body: &Arc<dyn TaskBody>) -> Outcome {
        if self.ctx.is_cancelled() {
            debug!(task = %label, "run cancelled; not starting task");
            return Outcome::Failure(TaskError::Cancelled {
                task: label.to_string(),
            });
        }

        info!(task = %label, "starting task");
        let started = Instant::now();

        let pending = body.invoke(&self.ctx);
        let result = tokio::select! {
            res = pending => Some(res),
            _ = self.ctx.cancelled() => None,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match result {
            Some(Ok(())) => {
                info!(task = %label, elapsed_ms, "finished task");
                Outcome::Success
            }
            Some(Err(err)) => {
                let reason = format!("{err:#}");
                warn!(task = %label, elapsed_ms, error = %reason, "task failed");
                Outcome::Failure(TaskError::TaskBodyFailure {
                    task: label.to_string(),
                    reason,
                })
            }
            None => {
                warn!(task = %label, elapsed_ms, "task cancelled while running");
                Outcome::Failure(TaskError::Cancelled {
                    task: label.to_string(),
                })
            }
        }
    }

    async fn run_sequence(&self, label: &str, children: &[Plan]) -> Outcome {
        for (index, child) in children.iter().enumerate() {
            if let Outcome::Failure(err) = self.run_node(child).await {
                let skipped = children.len() - index - 1;
                if skipped > 0 {
                    debug!(
                        sequence = %label,
                        failed = %child.label(),
                        skipped,
                        "sequence stopped at first failure"
                    );
                }
                return Outcome::Failure(err);
            }
        }
        Outcome::Success
    }

    async fn run_parallel(&self, label: &str, children: &[Plan]) -> Outcome {
        let mut pending: FuturesUnordered<NodeFuture<'_>> =
            children.iter().map(|child| self.run_node(child)).collect();

        // Completion order, so `failures[0]` is the first one observed.
        let mut failures = Vec::new();
        while let Some(outcome) = pending.next().await {
            if let Outcome::Failure(err) = outcome {
                failures.push(err);
            }
        }

        if failures.is_empty() {
            return Outcome::Success;
        }

        debug!(
            parallel = %label,
            failed = failures.len(),
            total = children.len(),
            "parallel group settled with failures"
        );
        Outcome::Failure(TaskError::CompositeFailure {
            task: label.to_string(),
            failures,
        })
    }
}

/// Resolve `name` against `registry` and run it.
///
/// Resolution errors (unknown names, cycles) become a failed outcome, so
/// callers that re-enter the registry repeatedly (watch bindings) handle every
/// failure the same way.
pub async fn run_named(registry: &Registry, ctx: ExecutionContext, name: &str) -> Outcome {
    match Plan::resolve(registry, name) {
        Ok(plan) => Executor::new(ctx).run(&plan).await,
        Err(err) => {
            error!(task = %name, error = %err, "could not resolve task");
            Outcome::Failure(err)
        }
    }
}
