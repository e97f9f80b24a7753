// tests/cli_run.rs

#![cfg(unix)]

use std::fs;
use std::path::Path;

use tempfile::TempDir;

use buildrig::cli::CliArgs;
use buildrig::errors::{BuildrigError, TaskError};
use buildrig::exec::Outcome;
use buildrig::types::Completion;
use buildrig::{run, run_with_shutdown};
use buildrig_test_utils::{init_tracing, wait_until, with_timeout};
use clap::Parser;
use tokio_util::sync::CancellationToken;

fn project(config: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("Buildrig.toml"), config).unwrap();
    dir
}

fn args(dir: &Path, extra: &[&str]) -> CliArgs {
    let config = dir.join("Buildrig.toml");
    let mut argv = vec![
        "buildrig".to_string(),
        "--config".to_string(),
        config.to_string_lossy().into_owned(),
    ];
    argv.extend(extra.iter().map(|s| s.to_string()));
    CliArgs::parse_from(argv)
}

const PIPELINE: &str = r#"
[config]
default_task = "build"

[task.clean]
description = "Remove build outputs"
cmd = "rm -rf dist && mkdir dist"

[task.scripts]
cmd = "echo scripts > dist/scripts.txt"

[task.styles]
cmd = "echo styles > dist/styles.txt"

[task.build]
sequence = ["clean", { parallel = ["scripts", "styles"] }]

[task.broken]
sequence = ["clean", { cmd = "exit 3" }, "scripts"]

[task.env]
cmd = 'printf "%s %s" "$BUILDRIG_TASK" "$BUILDRIG_MODE" > env.txt'
"#;

#[tokio::test]
async fn default_task_runs_shell_pipeline_in_project_root() {
    init_tracing();
    let dir = project(PIPELINE);

    let completion = with_timeout(run(args(dir.path(), &[]))).await.unwrap();

    assert_eq!(completion, Completion::Finished(Outcome::Success));
    assert_eq!(completion.exit_code(), 0);
    assert!(dir.path().join("dist/scripts.txt").exists());
    assert!(dir.path().join("dist/styles.txt").exists());
}

#[tokio::test]
async fn failing_command_stops_sequence_and_exits_one() {
    let dir = project(PIPELINE);

    let completion = with_timeout(run(args(dir.path(), &["broken"]))).await.unwrap();
    assert_eq!(completion.exit_code(), 1);

    match completion {
        Completion::Finished(Outcome::Failure(TaskError::TaskBodyFailure { task, reason })) => {
            assert_eq!(task, "broken[1]");
            assert!(reason.contains("exited with code 3"), "{reason}");
        }
        other => panic!("expected body failure, got {other:?}"),
    }
    assert!(dir.path().join("dist").exists(), "clean ran first");
    assert!(!dir.path().join("dist/scripts.txt").exists(), "scripts never ran");
}

#[tokio::test]
async fn commands_see_task_and_mode_in_environment() {
    let dir = project(PIPELINE);

    let completion = with_timeout(run(args(dir.path(), &["env"]))).await.unwrap();
    assert_eq!(completion, Completion::Finished(Outcome::Success));

    let env = fs::read_to_string(dir.path().join("env.txt")).unwrap();
    assert_eq!(env, "env once");
}

#[tokio::test]
async fn list_and_dry_run_execute_nothing() {
    let dir = project(PIPELINE);

    let listed = run(args(dir.path(), &["--list"])).await.unwrap();
    assert_eq!(listed.exit_code(), 0);

    let planned = run(args(dir.path(), &["build", "--dry-run", "--watch"]))
        .await
        .unwrap();
    assert_eq!(planned.exit_code(), 0);

    assert!(!dir.path().join("dist").exists());
}

#[tokio::test]
async fn unknown_task_is_an_error_before_running() {
    let dir = project(PIPELINE);

    let err = run(args(dir.path(), &["deploy"])).await.unwrap_err();
    assert!(matches!(
        err,
        BuildrigError::Task(TaskError::UnknownTask(ref n)) if n == "deploy"
    ));
}

const WATCHED: &str = r#"
[config]
default_task = "dev"
debounce_ms = 20

[task.build]
cmd = "echo run >> runs.log"

[task.lint]
cmd = "exit 1"

[task.dev]
sequence = ["build", "lint"]

[[watch]]
patterns = ["./src/**/*.ts"]
task = "build"
"#;

fn runs(dir: &Path) -> usize {
    fs::read_to_string(dir.join("runs.log"))
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

#[tokio::test]
async fn watch_mode_reruns_bound_task_until_shutdown() {
    init_tracing();
    let dir = project(WATCHED);
    fs::create_dir(dir.path().join("src")).unwrap();
    let shutdown = CancellationToken::new();

    let session = run_with_shutdown(args(dir.path(), &["--watch"]), shutdown.clone());
    let driver = async {
        // Initial root run: build succeeds, lint fails, the session keeps going.
        wait_until(|| runs(dir.path()) == 1).await;

        fs::write(dir.path().join("src/app.ts"), "export {}").unwrap();
        wait_until(|| runs(dir.path()) >= 2).await;

        shutdown.cancel();
    };

    let (completion, ()) = with_timeout(async { tokio::join!(session, driver) }).await;
    let completion = completion.unwrap();

    assert_eq!(completion, Completion::Interrupted);
    assert_eq!(completion.exit_code(), 130);
}
