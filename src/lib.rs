// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod plan;
pub mod registry;
pub mod task;
pub mod types;
pub mod watch;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_and_validate, project_root, ConfigFile};
use crate::errors::Result;
use crate::exec::{ExecutionContext, Executor, Outcome};
use crate::plan::Plan;
use crate::registry::Registry;
use crate::types::{Completion, RunMode};
use crate::watch::{watches_from_config, WatchOptions, WatchTrigger};

/// High-level entry point used by `main.rs`.
///
/// Installs the Ctrl-C handler and hands over to [`run_with_shutdown`].
pub async fn run(args: CliArgs) -> Result<Completion> {
    // Ctrl-C → cancel everything.
    let shutdown = CancellationToken::new();
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            info!("interrupt received; shutting down");
            shutdown.cancel();
        });
    }

    run_with_shutdown(args, shutdown).await
}

/// Same as [`run`], but stopped by cancelling `shutdown` instead of Ctrl-C.
///
/// This wires together:
/// - config loading and registry construction
/// - plan resolution for the requested task
/// - executor (one-shot) or executor + watch trigger (watch mode)
///
/// In watch mode it only returns once `shutdown` is cancelled.
pub async fn run_with_shutdown(args: CliArgs, shutdown: CancellationToken) -> Result<Completion> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;
    let root_dir = project_root(&config_path);

    let registry = Arc::new(cfg.build_registry(&root_dir)?);
    debug!(tasks = registry.len(), root = %root_dir.display(), "registry built");

    if args.list {
        print_task_list(&registry);
        return Ok(Completion::Finished(Outcome::Success));
    }

    let root_task = args
        .task
        .clone()
        .unwrap_or_else(|| cfg.config_section().default_task.clone());
    let plan = Plan::resolve(&registry, &root_task)?;

    if args.dry_run {
        print_dry_run(&plan, &cfg, args.mode());
        return Ok(Completion::Finished(Outcome::Success));
    }

    match args.mode() {
        RunMode::Once => run_once(&plan, &root_task, shutdown).await,
        RunMode::Watch => {
            run_watch(&plan, &root_task, &cfg, registry, &root_dir, shutdown).await
        }
    }
}

async fn run_once(plan: &Plan, root_task: &str, shutdown: CancellationToken) -> Result<Completion> {
    let ctx = ExecutionContext::with_cancellation(root_task, RunMode::Once, shutdown.clone());
    let outcome = Executor::new(ctx).run(plan).await;

    if shutdown.is_cancelled() {
        return Ok(Completion::Interrupted);
    }
    Ok(Completion::Finished(outcome))
}

async fn run_watch(
    plan: &Plan,
    root_task: &str,
    cfg: &ConfigFile,
    registry: Arc<Registry>,
    root_dir: &Path,
    shutdown: CancellationToken,
) -> Result<Completion> {
    let options = WatchOptions {
        debounce: cfg.config_section().debounce(),
        shutdown: shutdown.clone(),
    };

    let mut trigger = WatchTrigger::new(registry, options);
    for watch in watches_from_config(cfg) {
        trigger.bind(watch)?;
    }
    if trigger.binding_count() == 0 {
        warn!("watch mode without any [[watch]] bindings; nothing will be re-run");
    }
    let watcher = trigger.start(root_dir)?;

    // Bindings are live while the root task runs.
    let ctx =
        ExecutionContext::with_cancellation(root_task, RunMode::Watch, shutdown.child_token());
    if let Outcome::Failure(err) = Executor::new(ctx).run(plan).await {
        if !err.is_cancellation() {
            warn!(task = %root_task, error = %err, "initial run failed; still watching");
        }
    }

    info!("watching for changes (Ctrl+C to stop)");
    shutdown.cancelled().await;
    watcher.shutdown();

    Ok(Completion::Interrupted)
}

fn print_task_list(registry: &Registry) {
    let width = registry.names().map(str::len).max().unwrap_or(0);

    println!("tasks ({}):", registry.len());
    for name in registry.names() {
        match registry.description(name) {
            Some(desc) => println!("  {name:<width$}  {desc}"),
            None => println!("  {name}"),
        }
    }
}

fn print_dry_run(plan: &Plan, cfg: &ConfigFile, mode: RunMode) {
    println!("buildrig dry-run ({mode})");
    println!();
    println!("{}", plan.render());

    if mode.is_watch() {
        println!();
        println!("watch bindings ({}):", cfg.watches().len());
        println!("  debounce = {}ms", cfg.config_section().debounce_ms);
        for watch in cfg.watches() {
            println!("  - {} <- {:?}", watch.task, watch.patterns);
            if !watch.exclude.is_empty() {
                println!("      exclude: {:?}", watch.exclude);
            }
        }
    }

    debug!("dry-run complete (no execution)");
}
