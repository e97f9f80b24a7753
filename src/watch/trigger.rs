// src/watch/trigger.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::errors::{Result, TaskError};
use crate::exec::{run_named, ExecutionContext, Outcome};
use crate::registry::Registry;
use crate::types::{RunMode, TaskName};
use crate::watch::binding::{BindingAction, BindingCore, BindingInput};
use crate::watch::patterns::{WatchProfile, WatchSpec};
use crate::watch::watcher::{spawn_watcher, WatcherHandle};

/// Quiet period applied when nothing else is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Per-binding event buffer. A full buffer means a change is already queued
/// for that binding, so further events can be dropped.
const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct WatchOptions {
    /// Quiet period between the last matching change and the run it causes.
    pub debounce: Duration,
    /// Stops every binding when cancelled. Runs started by a binding use a
    /// child token, so cancelling this also cancels in-flight runs.
    pub shutdown: CancellationToken,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            shutdown: CancellationToken::new(),
        }
    }
}

/// A filesystem change forwarded to a binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub path: String,
}

struct Route {
    profile: WatchProfile,
    events: mpsc::Sender<ChangeEvent>,
}

/// Turns path changes into debounced, coalesced task runs.
///
/// Each [`bind`](WatchTrigger::bind) spawns one binding loop on the current
/// tokio runtime. [`dispatch`](WatchTrigger::dispatch) fans a changed path
/// out to every binding whose patterns match; bindings are independent of
/// each other.
pub struct WatchTrigger {
    registry: Arc<Registry>,
    options: WatchOptions,
    routes: Vec<Route>,
    loops: Vec<JoinHandle<()>>,
}

impl WatchTrigger {
    pub fn new(registry: Arc<Registry>, options: WatchOptions) -> Self {
        Self {
            registry,
            options,
            routes: Vec::new(),
            loops: Vec::new(),
        }
    }

    /// Register a binding. Must be called from within a tokio runtime.
    ///
    /// The task name is checked against the registry up front; a typo in a
    /// watch binding fails here rather than on the first change.
    pub fn bind(&mut self, watch: WatchSpec) -> Result<()> {
        if !self.registry.contains(&watch.task) {
            return Err(TaskError::UnknownTask(watch.task).into());
        }

        let profile = WatchProfile::compile(&watch)?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let binding = BindingLoop {
            task: watch.task.clone(),
            registry: Arc::clone(&self.registry),
            debounce: self.options.debounce,
            shutdown: self.options.shutdown.clone(),
            core: BindingCore::new(),
        };

        info!(
            task = %watch.task,
            patterns = ?watch.patterns,
            exclude = ?watch.exclude,
            "watch binding registered"
        );

        self.loops.push(tokio::spawn(binding.run(rx)));
        self.routes.push(Route {
            profile,
            events: tx,
        });
        Ok(())
    }

    pub fn binding_count(&self) -> usize {
        self.routes.len()
    }

    /// Forward a change of `rel_path` (relative to the project root, forward
    /// slashes) to every matching binding. Returns how many bindings matched.
    pub fn dispatch(&self, rel_path: &str) -> usize {
        let mut matched = 0;

        for route in &self.routes {
            if !route.profile.matches(rel_path) {
                continue;
            }
            matched += 1;

            let event = ChangeEvent {
                path: rel_path.to_string(),
            };
            match route.events.try_send(event) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    debug!(
                        task = %route.profile.task(),
                        path = %rel_path,
                        "binding already has a change pending; event coalesced"
                    );
                }
                Err(TrySendError::Closed(_)) => {
                    debug!(task = %route.profile.task(), "binding stopped; event dropped");
                }
            }
        }

        if matched == 0 {
            debug!(path = %rel_path, "change matched no watch binding");
        }
        matched
    }

    /// Start observing `root` recursively and feed changes into
    /// [`dispatch`](WatchTrigger::dispatch). Dropping the returned handle
    /// stops the filesystem watcher.
    pub fn start(self, root: impl Into<PathBuf>) -> Result<WatcherHandle> {
        spawn_watcher(root, Arc::new(self))
    }

    /// Stop every binding loop and cancel runs they started.
    pub fn shutdown(&self) {
        self.options.shutdown.cancel();
    }

    /// Wait for every binding loop to exit. Only returns after
    /// [`shutdown`](WatchTrigger::shutdown) (or cancellation of the token in
    /// [`WatchOptions`]).
    pub async fn join(mut self) {
        for handle in std::mem::take(&mut self.loops) {
            if let Err(err) = handle.await {
                warn!(error = %err, "watch binding loop ended abnormally");
            }
        }
    }
}

impl Drop for WatchTrigger {
    fn drop(&mut self) {
        // Closing the senders ends idle loops; running ones are aborted.
        self.routes.clear();
        for handle in &self.loops {
            handle.abort();
        }
    }
}

enum Wake {
    Shutdown,
    Disconnected,
    Changed(ChangeEvent),
    Quiesced,
    Finished(Outcome),
}

struct BindingLoop {
    task: TaskName,
    registry: Arc<Registry>,
    debounce: Duration,
    shutdown: CancellationToken,
    core: BindingCore,
}

impl BindingLoop {
    async fn run(mut self, mut events: mpsc::Receiver<ChangeEvent>) {
        let mut deadline: Option<Instant> = None;
        let mut running: Option<JoinHandle<Outcome>> = None;

        loop {
            let wake = tokio::select! {
                _ = self.shutdown.cancelled() => Wake::Shutdown,
                ev = events.recv() => match ev {
                    Some(ev) => Wake::Changed(ev),
                    None => Wake::Disconnected,
                },
                _ = sleep_until(deadline) => Wake::Quiesced,
                outcome = wait_for(&mut running, &self.task) => Wake::Finished(outcome),
            };

            let input = match wake {
                Wake::Shutdown | Wake::Disconnected => break,
                Wake::Changed(ev) => {
                    debug!(task = %self.task, path = %ev.path, state = ?self.core.state(), "change observed");
                    BindingInput::Changed
                }
                Wake::Quiesced => {
                    deadline = None;
                    BindingInput::Quiesced
                }
                Wake::Finished(outcome) => {
                    running = None;
                    self.report(outcome);
                    BindingInput::RunFinished
                }
            };

            match self.core.step(input) {
                BindingAction::Nothing => {}
                BindingAction::ArmTimer => deadline = Some(deadline_after(self.debounce)),
                BindingAction::StartRun => running = Some(self.start_run()),
            }
        }

        debug!(task = %self.task, "watch binding stopped");
    }

    fn start_run(&self) -> JoinHandle<Outcome> {
        info!(task = %self.task, run = self.core.runs_started(), "change detected; running task");

        let ctx = ExecutionContext::with_cancellation(
            self.task.clone(),
            RunMode::Watch,
            self.shutdown.child_token(),
        );
        let registry = Arc::clone(&self.registry);
        let task = self.task.clone();

        tokio::spawn(async move { run_named(&registry, ctx, &task).await })
    }

    fn report(&self, outcome: Outcome) {
        match outcome {
            Outcome::Success => info!(task = %self.task, "watch run succeeded"),
            Outcome::Failure(err) if err.is_cancellation() => {
                debug!(task = %self.task, "watch run cancelled")
            }
            Outcome::Failure(err) => {
                error!(task = %self.task, error = %err, "watch run failed; still watching")
            }
        }
    }
}

/// Deadline `debounce` from now, saturating instead of overflowing for
/// absurdly large quiet periods.
fn deadline_after(debounce: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(debounce)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

/// Roughly thirty years; far enough to never fire in practice.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}

async fn wait_for(running: &mut Option<JoinHandle<Outcome>>, task: &str) -> Outcome {
    match running {
        Some(handle) => match handle.await {
            Ok(outcome) => outcome,
            Err(join_err) => Outcome::Failure(TaskError::TaskBodyFailure {
                task: task.to_string(),
                reason: format!("watch run aborted: {join_err}"),
            }),
        },
        None => std::future::pending().await,
    }
}
