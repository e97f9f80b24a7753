// tests/executor_composition.rs

use std::time::Duration;

use buildrig::errors::TaskError;
use buildrig::exec::{run_named, ExecutionContext, Executor, Outcome};
use buildrig::plan::Plan;
use buildrig::registry::Registry;
use buildrig::task::{from_callback, parallel, sequence, TaskRef};
use buildrig::types::RunMode;
use buildrig_test_utils::recorder::{Gate, Recorder, Step};
use buildrig_test_utils::{init_tracing, wait_until, with_timeout};

fn started(name: &str) -> Step {
    Step::Started(name.to_string())
}

fn finished(name: &str) -> Step {
    Step::Finished(name.to_string())
}

fn ctx() -> ExecutionContext {
    ExecutionContext::new("build", RunMode::Once)
}

/// `build = sequence(a, parallel(b, c), d)`
fn diamond(rec: &Recorder, b_fails: bool) -> Registry {
    let mut registry = Registry::new();
    registry.register("a", rec.ok("a"));
    if b_fails {
        registry.register("b", rec.failing("b", "boom"));
    } else {
        registry.register("b", rec.ok("b"));
    }
    registry.register("c", rec.sleeping("c", Duration::from_millis(20)));
    registry.register("d", rec.ok("d"));
    registry.register(
        "build",
        sequence([
            TaskRef::from("a"),
            parallel(["b", "c"]).into(),
            "d".into(),
        ]),
    );
    registry
}

#[tokio::test]
async fn sequence_with_parallel_group_runs_in_order() {
    init_tracing();
    let rec = Recorder::new();
    let registry = diamond(&rec, false);

    let outcome = with_timeout(run_named(&registry, ctx(), "build")).await;
    assert_eq!(outcome, Outcome::Success);

    let a_done = rec.index_of(&finished("a")).unwrap();
    let b_start = rec.index_of(&started("b")).unwrap();
    let c_start = rec.index_of(&started("c")).unwrap();
    let b_done = rec.index_of(&finished("b")).unwrap();
    let c_done = rec.index_of(&finished("c")).unwrap();
    let d_start = rec.index_of(&started("d")).unwrap();

    assert!(a_done < b_start && a_done < c_start);
    // Both parallel children are in flight before either settles.
    assert!(b_start < b_done.min(c_done) && c_start < b_done.min(c_done));
    assert!(b_done < d_start && c_done < d_start);
    assert_eq!(rec.started(), vec!["a", "b", "c", "d"]);
}

#[tokio::test]
async fn failing_parallel_child_lets_siblings_settle_and_skips_rest() {
    init_tracing();
    let rec = Recorder::new();
    let registry = diamond(&rec, true);

    let outcome = with_timeout(run_named(&registry, ctx(), "build")).await;

    assert_eq!(
        outcome,
        Outcome::Failure(TaskError::CompositeFailure {
            task: "build[1]".to_string(),
            failures: vec![TaskError::TaskBodyFailure {
                task: "b".to_string(),
                reason: "boom".to_string(),
            }],
        })
    );

    assert_eq!(rec.finish_count("a"), 1);
    assert_eq!(rec.finish_count("b"), 1);
    assert_eq!(rec.finish_count("c"), 1, "sibling must settle before the group fails");
    assert_eq!(rec.start_count("d"), 0);
}

#[tokio::test]
async fn sequence_stops_at_first_failure_and_returns_it_unchanged() {
    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register("one", rec.ok("one"));
    registry.register("two", rec.failing("two", "compile error"));
    registry.register("three", rec.ok("three"));
    registry.register("all", sequence(["one", "two", "three"]));

    let outcome = run_named(&registry, ctx(), "all").await;

    assert_eq!(
        outcome,
        Outcome::Failure(TaskError::TaskBodyFailure {
            task: "two".to_string(),
            reason: "compile error".to_string(),
        })
    );
    assert_eq!(rec.started(), vec!["one", "two"]);
}

#[tokio::test]
async fn parallel_collects_every_failure_in_completion_order() {
    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register("slow", rec.sleeping("slow", Duration::from_millis(30)));
    registry.register("x", rec.failing("x", "x broke"));
    registry.register(
        "slow_fail",
        sequence([TaskRef::from("slow"), rec.failing("late", "late broke").into()]),
    );
    registry.register("group", parallel(["slow_fail", "x"]));

    let outcome = with_timeout(run_named(&registry, ctx(), "group")).await;

    let failures = match outcome {
        Outcome::Failure(TaskError::CompositeFailure { task, failures }) => {
            assert_eq!(task, "group");
            failures
        }
        other => panic!("expected composite failure, got {other:?}"),
    };
    assert_eq!(
        failures,
        vec![
            TaskError::TaskBodyFailure {
                task: "x".to_string(),
                reason: "x broke".to_string(),
            },
            TaskError::TaskBodyFailure {
                task: "slow_fail[1]".to_string(),
                reason: "late broke".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn nested_composite_failure_keeps_root_cause() {
    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register("inner", parallel([rec.failing("leaf", "disk full")]));
    registry.register("outer", parallel(["inner"]));

    let outcome = run_named(&registry, ctx(), "outer").await;
    let err = outcome.error().cloned().unwrap();

    assert_eq!(
        err.root_cause(),
        &TaskError::TaskBodyFailure {
            task: "inner[0]".to_string(),
            reason: "disk full".to_string(),
        }
    );
    assert!(!err.is_cancellation());
}

#[tokio::test]
async fn unknown_task_fails_before_anything_runs() {
    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register("a", rec.ok("a"));
    registry.register("build", sequence(["a", "missing"]));

    let outcome = run_named(&registry, ctx(), "build").await;

    assert_eq!(
        outcome,
        Outcome::Failure(TaskError::UnknownTask("missing".to_string()))
    );
    assert!(rec.steps().is_empty());
}

#[tokio::test]
async fn callback_bodies_signal_through_done_handle() {
    let mut registry = Registry::new();
    registry.register(
        "ok",
        from_callback(|_ctx, done| {
            tokio::spawn(async move {
                tokio::task::yield_now().await;
                done.success();
            });
        }),
    );
    registry.register(
        "fails",
        from_callback(|_ctx, done| done.fail(anyhow::anyhow!("lint errors"))),
    );
    registry.register("forgets", from_callback(|_ctx, done| drop(done)));

    assert_eq!(run_named(&registry, ctx(), "ok").await, Outcome::Success);

    assert_eq!(
        run_named(&registry, ctx(), "fails").await,
        Outcome::Failure(TaskError::TaskBodyFailure {
            task: "fails".to_string(),
            reason: "lint errors".to_string(),
        })
    );

    match run_named(&registry, ctx(), "forgets").await {
        Outcome::Failure(TaskError::TaskBodyFailure { task, reason }) => {
            assert_eq!(task, "forgets");
            assert!(reason.contains("completion handle"), "{reason}");
        }
        other => panic!("expected failure for dropped handle, got {other:?}"),
    }
}

#[tokio::test]
async fn cancellation_stops_running_leaf_and_skips_the_rest() {
    init_tracing();
    let rec = Recorder::new();
    let gate = Gate::new();
    let mut registry = Registry::new();
    registry.register("blocked", rec.gated("blocked", &gate));
    registry.register("after", rec.ok("after"));
    registry.register("all", sequence(["blocked", "after"]));

    let plan = Plan::resolve(&registry, "all").unwrap();
    let ctx = ctx();
    let executor = Executor::new(ctx.clone());

    let run = tokio::spawn(async move { executor.run(&plan).await });

    wait_until(|| rec.start_count("blocked") == 1).await;
    ctx.cancel();

    let outcome = with_timeout(run).await.unwrap();
    assert_eq!(
        outcome,
        Outcome::Failure(TaskError::Cancelled {
            task: "blocked".to_string(),
        })
    );
    assert!(outcome.error().unwrap().is_cancellation());
    assert_eq!(rec.start_count("after"), 0);
    assert_eq!(rec.finish_count("blocked"), 0);
}

#[tokio::test]
async fn cancelled_context_starts_nothing() {
    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register("a", rec.ok("a"));

    let ctx = ctx();
    ctx.cancel();

    let outcome = run_named(&registry, ctx, "a").await;
    assert!(matches!(outcome, Outcome::Failure(TaskError::Cancelled { .. })));
    assert!(rec.steps().is_empty());
}

#[tokio::test]
async fn re_registering_replaces_the_definition() {
    let rec = Recorder::new();
    let mut registry = Registry::new();
    registry.register("t", rec.failing("first", "old"));
    let previous = registry.register("t", rec.ok("second"));
    assert!(previous.is_some());

    assert_eq!(run_named(&registry, ctx(), "t").await, Outcome::Success);
    assert_eq!(rec.started(), vec!["second"]);
}

#[tokio::test]
async fn empty_composites_succeed() {
    let mut registry = Registry::new();
    registry.register("nothing", sequence(Vec::<TaskRef>::new()));
    registry.register("none", parallel(Vec::<TaskRef>::new()));

    assert_eq!(run_named(&registry, ctx(), "nothing").await, Outcome::Success);
    assert_eq!(run_named(&registry, ctx(), "none").await, Outcome::Success);
}
