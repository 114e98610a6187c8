//! Handler trait and type erasure.
//!
//! # How async handlers are stored
//!
//! A route table holds handlers of *different* types in one collection, so
//! each one is hidden behind a trait object (`Arc<dyn Handler>`) and called
//! through a single vtable dispatch per request.
//!
//! A handler borrows the request's [`Context`] mutably for as long as its
//! future runs. A plain `async fn(&mut Context)` cannot name that borrow in a
//! `Fn` bound, so closures return a boxed future tied to the borrow instead:
//!
//! ```text
//! handler(|c| Box::pin(async move { … }))    ← user writes this
//!        ↓
//! FnHandler(closure)                          ← concrete wrapper
//!        ↓  stored as BoxedHandler = Arc<dyn Handler>
//! handler.call(&mut ctx) at request time     ← one vtable dispatch
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::context::Context;
use crate::output::Reply;

/// A heap-allocated, type-erased future borrowing for `'a`.
///
/// `Pin<Box<…>>` because the runtime polls the future in place; `Send` so
/// tokio can move it across worker threads between polls.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What every step resolves to. Errors are the chain's exceptions: they
/// propagate outward through each `Next::run` until a step handles them or
/// the dispatch boundary turns them into a `500`.
pub type StepResult = anyhow::Result<Reply>;

/// The terminal step of a route.
///
/// Implement it on your own types, or wrap a closure with [`handler`].
pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, StepResult>;
}

/// A type-erased handler shared across concurrent requests.
pub type BoxedHandler = Arc<dyn Handler>;

/// Newtype wrapper that holds a closure and implements [`Handler`], bridging
/// the typed world to the trait-object world.
pub struct FnHandler<F>(F);

/// Wraps a closure as a [`Handler`].
///
/// ```rust
/// use tsu_rpc::handler;
///
/// let hello = handler(|c| Box::pin(async move {
///     let name = c.param("name").unwrap_or("world").to_owned();
///     Ok(c.text(format!("hello {name}")).into())
/// }));
/// ```
pub fn handler<F>(f: F) -> FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    FnHandler(f)
}

impl<F> Handler for FnHandler<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, StepResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, StepResult> {
        (self.0)(ctx)
    }
}
