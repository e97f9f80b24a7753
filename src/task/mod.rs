// src/task/mod.rs

//! Task definitions and composition combinators.
//!
//! A [`TaskDef`] is either a leaf (an opaque [`TaskBody`]) or a composite
//! (`Sequence` / `Parallel`) over [`TaskRef`]s. References are either a
//! registered name or an inline definition. Nothing here executes anything:
//! the combinators only build values, which are later resolved into a
//! [`Plan`](crate::plan::Plan) against a [`Registry`](crate::registry::Registry).

pub mod body;

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use anyhow::Result;

use crate::exec::ExecutionContext;
use crate::types::TaskName;

pub use body::{BodyFuture, CallbackBody, Done, FnBody, TaskBody};

/// Which shape a task has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Leaf,
    Sequence,
    Parallel,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Leaf => "leaf",
            TaskKind::Sequence => "sequence",
            TaskKind::Parallel => "parallel",
        };
        f.write_str(s)
    }
}

/// A task definition as stored in the registry.
#[derive(Clone)]
pub enum TaskDef {
    Leaf(Arc<dyn TaskBody>),
    Sequence(Vec<TaskRef>),
    Parallel(Vec<TaskRef>),
}

impl TaskDef {
    pub fn kind(&self) -> TaskKind {
        match self {
            TaskDef::Leaf(_) => TaskKind::Leaf,
            TaskDef::Sequence(_) => TaskKind::Sequence,
            TaskDef::Parallel(_) => TaskKind::Parallel,
        }
    }

    /// Direct children of a composite; empty for leaves.
    pub fn children(&self) -> &[TaskRef] {
        match self {
            TaskDef::Leaf(_) => &[],
            TaskDef::Sequence(children) | TaskDef::Parallel(children) => children,
        }
    }
}

impl fmt::Debug for TaskDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskDef::Leaf(_) => f.write_str("Leaf(..)"),
            TaskDef::Sequence(children) => f.debug_tuple("Sequence").field(children).finish(),
            TaskDef::Parallel(children) => f.debug_tuple("Parallel").field(children).finish(),
        }
    }
}

/// Reference to a task from inside a composite.
#[derive(Debug, Clone)]
pub enum TaskRef {
    ByName(TaskName),
    Inline(Box<TaskDef>),
}

impl From<&str> for TaskRef {
    fn from(name: &str) -> Self {
        TaskRef::ByName(name.to_string())
    }
}

impl From<String> for TaskRef {
    fn from(name: String) -> Self {
        TaskRef::ByName(name)
    }
}

impl From<TaskDef> for TaskRef {
    fn from(def: TaskDef) -> Self {
        TaskRef::Inline(Box::new(def))
    }
}

/// Children run one after another; the first failure stops the rest.
pub fn sequence<I>(children: I) -> TaskDef
where
    I: IntoIterator,
    I::Item: Into<TaskRef>,
{
    TaskDef::Sequence(children.into_iter().map(Into::into).collect())
}

/// Children all start together and are all allowed to settle.
pub fn parallel<I>(children: I) -> TaskDef
where
    I: IntoIterator,
    I::Item: Into<TaskRef>,
{
    TaskDef::Parallel(children.into_iter().map(Into::into).collect())
}

pub fn leaf<B>(body: B) -> TaskDef
where
    B: TaskBody + 'static,
{
    TaskDef::Leaf(Arc::new(body))
}

/// Leaf from an async closure.
pub fn from_fn<F, Fut>(f: F) -> TaskDef
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    leaf(FnBody::new(f))
}

/// Leaf from a callback that signals through a [`Done`] handle.
pub fn from_callback<F>(f: F) -> TaskDef
where
    F: Fn(ExecutionContext, Done) + Send + Sync + 'static,
{
    leaf(CallbackBody::new(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinators_build_nested_shapes_without_running() {
        let def = sequence([
            TaskRef::from("clean"),
            parallel(["assets", "manifest"]).into(),
            "zip".into(),
        ]);

        assert_eq!(def.kind(), TaskKind::Sequence);
        let children = def.children();
        assert_eq!(children.len(), 3);
        assert!(matches!(&children[0], TaskRef::ByName(n) if n == "clean"));
        match &children[1] {
            TaskRef::Inline(inner) => {
                assert_eq!(inner.kind(), TaskKind::Parallel);
                assert_eq!(inner.children().len(), 2);
            }
            other => panic!("expected inline parallel, got {other:?}"),
        }
    }

    #[test]
    fn leaves_have_no_children() {
        let def = from_fn(|_ctx| async { Ok(()) });
        assert_eq!(def.kind(), TaskKind::Leaf);
        assert!(def.children().is_empty());
    }
}
