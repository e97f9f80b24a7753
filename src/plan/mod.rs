// src/plan/mod.rs

//! Resolved execution plans.
//!
//! A [`Plan`] is a [`TaskDef`] with every by-name reference replaced by the
//! definition it names. Resolution happens once, before the executor starts,
//! so unknown names and reference cycles are reported before any task body
//! has run.

use std::fmt;
use std::fmt::Write as _;
use std::sync::Arc;

use crate::errors::TaskError;
use crate::registry::Registry;
use crate::task::{TaskBody, TaskDef, TaskKind, TaskRef};
use crate::types::TaskName;

/// A concrete, reference-free execution tree.
#[derive(Clone)]
pub enum Plan {
    Leaf {
        label: String,
        body: Arc<dyn TaskBody>,
    },
    Sequence {
        label: String,
        children: Vec<Plan>,
    },
    Parallel {
        label: String,
        children: Vec<Plan>,
    },
}

impl Plan {
    /// Resolve the task registered under `name`.
    pub fn resolve(registry: &Registry, name: &str) -> Result<Plan, TaskError> {
        let mut stack = Vec::new();
        resolve_named(registry, name, &mut stack)
    }

    /// Resolve an arbitrary reference. Inline definitions are labelled
    /// `label`.
    pub fn resolve_ref(
        registry: &Registry,
        task_ref: &TaskRef,
        label: &str,
    ) -> Result<Plan, TaskError> {
        let mut stack = Vec::new();
        match task_ref {
            TaskRef::ByName(name) => resolve_named(registry, name, &mut stack),
            TaskRef::Inline(def) => resolve_def(registry, def, label.to_string(), &mut stack),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Plan::Leaf { label, .. }
            | Plan::Sequence { label, .. }
            | Plan::Parallel { label, .. } => label,
        }
    }

    pub fn kind(&self) -> TaskKind {
        match self {
            Plan::Leaf { .. } => TaskKind::Leaf,
            Plan::Sequence { .. } => TaskKind::Sequence,
            Plan::Parallel { .. } => TaskKind::Parallel,
        }
    }

    pub fn children(&self) -> &[Plan] {
        match self {
            Plan::Leaf { .. } => &[],
            Plan::Sequence { children, .. } | Plan::Parallel { children, .. } => children,
        }
    }

    /// Number of leaf invocations a full successful run performs.
    pub fn leaf_count(&self) -> usize {
        match self {
            Plan::Leaf { .. } => 1,
            _ => self.children().iter().map(Plan::leaf_count).sum(),
        }
    }

    /// Indented tree, one node per line, for `--dry-run`.
    pub fn render(&self) -> String {
        let mut out = String::new();
        render_into(self, 0, &mut out);
        out
    }
}

impl fmt::Debug for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Plan::Leaf { label, .. } => f.debug_struct("Leaf").field("label", label).finish(),
            Plan::Sequence { label, children } => f
                .debug_struct("Sequence")
                .field("label", label)
                .field("children", children)
                .finish(),
            Plan::Parallel { label, children } => f
                .debug_struct("Parallel")
                .field("label", label)
                .field("children", children)
                .finish(),
        }
    }
}

fn render_into(plan: &Plan, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match plan {
        Plan::Leaf { label, .. } => {
            let _ = writeln!(out, "{indent}{label}");
        }
        Plan::Sequence { label, children } | Plan::Parallel { label, children } => {
            let _ = writeln!(out, "{indent}{label}  [{}]", plan.kind());
            for child in children {
                render_into(child, depth + 1, out);
            }
        }
    }
}

/// `stack` holds the names currently being resolved, outermost first.
fn resolve_named(
    registry: &Registry,
    name: &str,
    stack: &mut Vec<TaskName>,
) -> Result<Plan, TaskError> {
    if let Some(pos) = stack.iter().position(|n| n == name) {
        let mut chain: Vec<TaskName> = stack[pos..].to_vec();
        chain.push(name.to_string());
        return Err(TaskError::CyclicReference(chain));
    }

    let def = registry.resolve(name)?;

    stack.push(name.to_string());
    let plan = resolve_def(registry, def, name.to_string(), stack);
    stack.pop();
    plan
}

fn resolve_def(
    registry: &Registry,
    def: &TaskDef,
    label: String,
    stack: &mut Vec<TaskName>,
) -> Result<Plan, TaskError> {
    let plan = match def {
        TaskDef::Leaf(body) => Plan::Leaf {
            label,
            body: Arc::clone(body),
        },
        TaskDef::Sequence(children) => Plan::Sequence {
            children: resolve_children(registry, children, &label, stack)?,
            label,
        },
        TaskDef::Parallel(children) => Plan::Parallel {
            children: resolve_children(registry, children, &label, stack)?,
            label,
        },
    };
    Ok(plan)
}

fn resolve_children(
    registry: &Registry,
    children: &[TaskRef],
    parent_label: &str,
    stack: &mut Vec<TaskName>,
) -> Result<Vec<Plan>, TaskError> {
    let mut resolved = Vec::with_capacity(children.len());
    for (index, child) in children.iter().enumerate() {
        let plan = match child {
            TaskRef::ByName(name) => resolve_named(registry, name, stack)?,
            TaskRef::Inline(def) => {
                resolve_def(registry, def, format!("{parent_label}[{index}]"), stack)?
            }
        };
        resolved.push(plan);
    }
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{from_fn, parallel, sequence};

    fn noop() -> TaskDef {
        from_fn(|_ctx| async { Ok(()) })
    }

    fn build_registry() -> Registry {
        let mut registry = Registry::new();
        registry.register("clean", noop());
        registry.register("assets", noop());
        registry.register("manifest", noop());
        registry.register("zip", noop());
        registry.register(
            "build",
            sequence([
                TaskRef::from("clean"),
                parallel(["assets", "manifest"]).into(),
                "zip".into(),
            ]),
        );
        registry
    }

    #[test]
    fn resolves_names_and_labels_inline_children() {
        let plan = Plan::resolve(&build_registry(), "build").unwrap();

        assert_eq!(plan.kind(), TaskKind::Sequence);
        let labels: Vec<_> = plan.children().iter().map(Plan::label).collect();
        assert_eq!(labels, vec!["clean", "build[1]", "zip"]);
        assert_eq!(plan.children()[1].kind(), TaskKind::Parallel);
        assert_eq!(plan.leaf_count(), 4);
    }

    #[test]
    fn forward_references_resolve_once_registered() {
        let mut registry = Registry::new();
        registry.register("default", sequence(["build"]));
        assert_eq!(
            Plan::resolve(&registry, "default").unwrap_err(),
            TaskError::UnknownTask("build".to_string())
        );

        registry.register("build", noop());
        assert!(Plan::resolve(&registry, "default").is_ok());
    }

    #[test]
    fn self_reference_is_reported_as_cycle() {
        let mut registry = Registry::new();
        registry.register("a", sequence(["b"]));
        registry.register("b", parallel([TaskRef::from(sequence(["a"]))]));

        let err = Plan::resolve(&registry, "a").unwrap_err();
        assert_eq!(
            err,
            TaskError::CyclicReference(vec!["a".into(), "b".into(), "a".into()])
        );
    }

    #[test]
    fn repeated_sibling_reference_is_not_a_cycle() {
        let mut registry = Registry::new();
        registry.register("lint", noop());
        registry.register("twice", parallel(["lint", "lint"]));

        let plan = Plan::resolve(&registry, "twice").unwrap();
        assert_eq!(plan.leaf_count(), 2);
    }

    #[test]
    fn render_indents_children() {
        let plan = Plan::resolve(&build_registry(), "build").unwrap();
        let rendered = plan.render();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "build  [sequence]",
                "  clean",
                "  build[1]  [parallel]",
                "    assets",
                "    manifest",
                "  zip",
            ]
        );
    }
}
