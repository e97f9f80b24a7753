use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use tokio::sync::Semaphore;

use buildrig::task::{from_fn, TaskDef};

/// One observable moment in a recorded body's life.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Started(String),
    Finished(String),
}

/// Shared log that recording bodies append to.
///
/// Every body records `Started` when invoked and `Finished` once it settles
/// (successfully or not), so tests can assert on ordering and on which
/// bodies were never invoked.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<Step>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body that yields once, then succeeds.
    pub fn ok(&self, name: &str) -> TaskDef {
        self.body(name, None, Behaviour::Succeed)
    }

    /// Body that yields once, then fails with `reason`.
    pub fn failing(&self, name: &str, reason: &str) -> TaskDef {
        self.body(name, None, Behaviour::Fail(reason.to_string()))
    }

    /// Body that sleeps for `delay`, then succeeds.
    pub fn sleeping(&self, name: &str, delay: Duration) -> TaskDef {
        self.body(name, Some(Wait::Sleep(delay)), Behaviour::Succeed)
    }

    /// Body that blocks on `gate` once per invocation, then succeeds.
    pub fn gated(&self, name: &str, gate: &Gate) -> TaskDef {
        self.body(name, Some(Wait::Gate(gate.clone())), Behaviour::Succeed)
    }

    pub fn steps(&self) -> Vec<Step> {
        self.log.lock().unwrap().clone()
    }

    /// Names in invocation order.
    pub fn started(&self) -> Vec<String> {
        self.steps()
            .into_iter()
            .filter_map(|s| match s {
                Step::Started(name) => Some(name),
                Step::Finished(_) => None,
            })
            .collect()
    }

    pub fn start_count(&self, name: &str) -> usize {
        self.count(&Step::Started(name.to_string()))
    }

    pub fn finish_count(&self, name: &str) -> usize {
        self.count(&Step::Finished(name.to_string()))
    }

    /// Position of the first occurrence of `step` in the log.
    pub fn index_of(&self, step: &Step) -> Option<usize> {
        self.steps().iter().position(|s| s == step)
    }

    fn count(&self, step: &Step) -> usize {
        self.steps().iter().filter(|s| *s == step).count()
    }

    fn body(&self, name: &str, wait: Option<Wait>, behaviour: Behaviour) -> TaskDef {
        let log = Arc::clone(&self.log);
        let name = name.to_string();

        from_fn(move |_ctx| {
            let log = Arc::clone(&log);
            let name = name.clone();
            let wait = wait.clone();
            let behaviour = behaviour.clone();

            async move {
                log.lock().unwrap().push(Step::Started(name.clone()));

                match wait {
                    Some(Wait::Sleep(delay)) => tokio::time::sleep(delay).await,
                    Some(Wait::Gate(gate)) => gate.pass().await?,
                    None => tokio::task::yield_now().await,
                }

                log.lock().unwrap().push(Step::Finished(name.clone()));
                match behaviour {
                    Behaviour::Succeed => Ok(()),
                    Behaviour::Fail(reason) => Err(anyhow!(reason)),
                }
            }
        })
    }
}

#[derive(Debug, Clone)]
enum Wait {
    Sleep(Duration),
    Gate(Gate),
}

#[derive(Debug, Clone)]
enum Behaviour {
    Succeed,
    Fail(String),
}

/// Hand-operated release valve for gated bodies.
///
/// Starts closed; each [`open`](Gate::open) lets that many invocations
/// through.
#[derive(Debug, Clone)]
pub struct Gate {
    permits: Arc<Semaphore>,
}

impl Gate {
    pub fn new() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(0)),
        }
    }

    pub fn open(&self, n: usize) {
        self.permits.add_permits(n);
    }

    async fn pass(&self) -> anyhow::Result<()> {
        self.permits.acquire().await?.forget();
        Ok(())
    }
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}
