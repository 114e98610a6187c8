//! The interceptor chain: onion-model execution of a route's middleware
//! followed by its handler.
//!
//! ```text
//!   mw 1 ── before ──┐                              ┌── after ── mw 1
//!                    mw 2 ── before ──┐    ┌── after ── mw 2
//!                                     handler
//! ```
//!
//! Each middleware receives the context and a [`Next`]. Awaiting
//! `next.run(ctx)` runs everything downstream and returns once the response
//! is final, so code after it sees that response. Not calling it at all
//! short-circuits: no later middleware and no handler runs.
//!
//! Whenever a step's future resolves to a non-empty [`Reply`], the reply is
//! normalized into `ctx.res` on the spot, replacing what was there. Steps run
//! strictly one after another; a request's chain never runs concurrently with
//! itself.

use std::sync::Arc;

use crate::context::Context;
use crate::handler::{BoxFuture, BoxedHandler, StepResult};

/// A chain participant that can act before and after the rest of the chain.
///
/// Implement it on your own types, or wrap a closure with [`middleware`].
pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, StepResult>;
}

/// A type-erased middleware shared across concurrent requests.
pub type BoxedMiddleware = Arc<dyn Middleware>;

/// Wrapper implementing [`Middleware`] for a closure.
pub struct FnMiddleware<F>(F);

/// Wraps a closure as a [`Middleware`].
///
/// ```rust
/// use tsu_rpc::middleware;
///
/// let timing = middleware(|c, next| Box::pin(async move {
///     let started = std::time::Instant::now();
///     next.run(c).await?;
///     c.set_var("elapsed", started.elapsed());
///     Ok(().into())
/// }));
/// ```
pub fn middleware<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    FnMiddleware(f)
}

impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, StepResult> {
        (self.0)(ctx, next)
    }
}

/// The terminal step: runs the handler, ignores the (empty) continuation.
struct Terminal(BoxedHandler);

impl Middleware for Terminal {
    fn call<'a>(&'a self, ctx: &'a mut Context, _next: Next<'a>) -> BoxFuture<'a, StepResult> {
        self.0.call(ctx)
    }
}

/// A route's precomputed step list: middleware in declaration order, then
/// exactly one handler.
#[derive(Clone)]
pub(crate) struct Chain {
    steps: Arc<[BoxedMiddleware]>,
}

impl Chain {
    pub(crate) fn new(middleware: impl IntoIterator<Item = BoxedMiddleware>, handler: BoxedHandler) -> Self {
        let steps: Vec<BoxedMiddleware> = middleware
            .into_iter()
            .chain(std::iter::once(Arc::new(Terminal(handler)) as BoxedMiddleware))
            .collect();
        Self { steps: steps.into() }
    }

    pub(crate) async fn run(&self, ctx: &mut Context) -> anyhow::Result<()> {
        execute(&self.steps, ctx).await
    }
}

/// The continuation handed to a middleware.
///
/// Consumed by [`run`](Next::run), so a step can proceed at most once.
pub struct Next<'a> {
    rest: &'a [BoxedMiddleware],
}

impl Next<'_> {
    /// Runs the remainder of the chain and resolves once it has completed.
    ///
    /// An error from any downstream step surfaces here; match on it to
    /// substitute a response, or propagate it with `?`.
    pub async fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        execute(self.rest, ctx).await
    }

    /// Whether any step remains downstream.
    pub fn is_terminal(&self) -> bool { self.rest.is_empty() }
}

fn execute<'a>(steps: &'a [BoxedMiddleware], ctx: &'a mut Context) -> BoxFuture<'a, anyhow::Result<()>> {
    Box::pin(async move {
        let Some((step, rest)) = steps.split_first() else {
            return Ok(());
        };
        let reply = step.call(ctx, Next { rest }).await?;
        ctx.apply(reply)?;
        Ok(())
    })
}
