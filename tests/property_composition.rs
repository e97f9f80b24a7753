// tests/property_composition.rs

use proptest::prelude::*;

use buildrig::errors::TaskError;
use buildrig::exec::{run_named, ExecutionContext, Outcome};
use buildrig::registry::Registry;
use buildrig::task::{parallel, sequence};
use buildrig::types::RunMode;
use buildrig_test_utils::recorder::Recorder;

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

/// Register `n` leaves named `t0..tn`, failing where `fails[i]` is set.
fn leaves(rec: &Recorder, registry: &mut Registry, fails: &[bool]) -> Vec<String> {
    fails
        .iter()
        .enumerate()
        .map(|(i, fail)| {
            let name = format!("t{i}");
            let def = if *fail {
                rec.failing(&name, &format!("{name} failed"))
            } else {
                rec.ok(&name)
            };
            registry.register(name.clone(), def);
            name
        })
        .collect()
}

proptest! {
    #[test]
    fn sequence_never_runs_past_first_failure(fails in proptest::collection::vec(any::<bool>(), 1..12)) {
        let rec = Recorder::new();
        let mut registry = Registry::new();
        let names = leaves(&rec, &mut registry, &fails);
        registry.register("seq", sequence(names.clone()));

        let outcome = block_on(run_named(
            &registry,
            ExecutionContext::new("seq", RunMode::Once),
            "seq",
        ));

        match fails.iter().position(|f| *f) {
            Some(first) => {
                let expected = TaskError::TaskBodyFailure {
                    task: names[first].clone(),
                    reason: format!("{} failed", names[first]),
                };
                prop_assert_eq!(outcome, Outcome::Failure(expected));
                prop_assert_eq!(rec.started(), names[..=first].to_vec());
            }
            None => {
                prop_assert_eq!(outcome, Outcome::Success);
                prop_assert_eq!(rec.started(), names.clone());
            }
        }
    }

    #[test]
    fn parallel_settles_every_child(fails in proptest::collection::vec(any::<bool>(), 1..12)) {
        let rec = Recorder::new();
        let mut registry = Registry::new();
        let names = leaves(&rec, &mut registry, &fails);
        registry.register("par", parallel(names.clone()));

        let outcome = block_on(run_named(
            &registry,
            ExecutionContext::new("par", RunMode::Once),
            "par",
        ));

        for name in &names {
            prop_assert_eq!(rec.start_count(name), 1);
            prop_assert_eq!(rec.finish_count(name), 1);
        }

        let failed = fails.iter().filter(|f| **f).count();
        match outcome {
            Outcome::Success => prop_assert_eq!(failed, 0),
            Outcome::Failure(TaskError::CompositeFailure { task, failures }) => {
                prop_assert_eq!(task, "par");
                prop_assert_eq!(failures.len(), failed);
            }
            other => prop_assert!(false, "unexpected outcome {:?}", other),
        }
    }
}
