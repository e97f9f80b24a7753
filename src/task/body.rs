// src/task/body.rs

//! Leaf task bodies.
//!
//! A body is an opaque unit of work: the executor invokes it once and awaits
//! a single terminal result. Two adapters cover the usual calling
//! conventions:
//!
//! - [`FnBody`] wraps an async closure.
//! - [`CallbackBody`] wraps a closure that is handed a [`Done`] handle and
//!   signals completion through it (backed by a `oneshot` channel, so it can
//!   only ever resolve once).

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use anyhow::{anyhow, Result};
use tokio::sync::oneshot;

use crate::exec::ExecutionContext;

/// Future returned by [`TaskBody::invoke`].
pub type BodyFuture = Pin<Box<dyn Future<Output = Result<()>> + Send + 'static>>;

/// Trait implemented by everything that can sit in a leaf task.
pub trait TaskBody: Send + Sync {
    /// Start the work. The returned future must resolve exactly once.
    fn invoke(&self, ctx: &ExecutionContext) -> BodyFuture;
}

/// Body backed by an async closure receiving the execution context.
pub struct FnBody<F> {
    f: F,
}

impl<F> FnBody<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F, Fut> TaskBody for FnBody<F>
where
    F: Fn(ExecutionContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    fn invoke(&self, ctx: &ExecutionContext) -> BodyFuture {
        Box::pin((self.f)(ctx.clone()))
    }
}

impl<F> fmt::Debug for FnBody<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnBody").finish_non_exhaustive()
    }
}

/// Single-use completion handle given to callback-style bodies.
///
/// Consuming `self` on every method is what guarantees a body cannot signal
/// twice. Dropping the handle without signalling is reported as a failure.
pub struct Done {
    tx: oneshot::Sender<Result<()>>,
}

impl Done {
    pub fn success(self) {
        self.finish(Ok(()));
    }

    pub fn fail(self, err: impl Into<anyhow::Error>) {
        self.finish(Err(err.into()));
    }

    pub fn finish(self, result: Result<()>) {
        // The receiver is gone only when the run was dropped (cancelled).
        let _ = self.tx.send(result);
    }
}

impl fmt::Debug for Done {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Done")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

/// Body backed by a closure that signals through a [`Done`] handle.
pub struct CallbackBody<F> {
    f: F,
}

impl<F> CallbackBody<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> TaskBody for CallbackBody<F>
where
    F: Fn(ExecutionContext, Done) + Send + Sync,
{
    fn invoke(&self, ctx: &ExecutionContext) -> BodyFuture {
        let (tx, rx) = oneshot::channel();
        (self.f)(ctx.clone(), Done { tx });

        Box::pin(async move {
            match rx.await {
                Ok(result) => result,
                Err(_) => Err(anyhow!(
                    "task body dropped its completion handle without signalling"
                )),
            }
        })
    }
}

impl<F> fmt::Debug for CallbackBody<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackBody").finish_non_exhaustive()
    }
}
