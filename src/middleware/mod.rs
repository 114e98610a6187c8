//! Built-in middleware.
//!
//! Middleware intercepts requests and responses and is the right place for
//! cross-cutting concerns: structured tracing, request-id injection,
//! authentication-header inspection, error recovery.
//!
//! - [`trace`]: per-request event with method, path, status, latency
//! - [`recover`]: turns a downstream error into a response

use std::time::Instant;

use crate::chain::{Middleware, Next};
use crate::context::Context;
use crate::handler::{BoxFuture, StepResult};
use crate::output::Reply;

/// Emits one `tracing` event per request once the rest of the chain has
/// produced its final response.
pub fn trace() -> Trace {
    Trace
}

#[derive(Clone, Copy, Debug, Default)]
pub struct Trace;

impl Middleware for Trace {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            let started = Instant::now();
            let method = ctx.req().method().clone();
            let path = ctx.req().path().to_owned();

            let result = next.run(ctx).await;

            match &result {
                Ok(()) => tracing::info!(
                    %method,
                    %path,
                    status = ctx.res().status().as_u16(),
                    elapsed = ?started.elapsed(),
                    "request completed"
                ),
                Err(e) => tracing::warn!(
                    %method,
                    %path,
                    elapsed = ?started.elapsed(),
                    "request failed: {e}"
                ),
            }
            result?;
            Ok(Reply::Empty)
        })
    }
}

/// Catches errors raised downstream and answers with `on_error(&error, ctx)`
/// instead of letting them reach the dispatch boundary.
///
/// ```rust
/// use http::StatusCode;
/// use tsu_rpc::{Output, middleware::recover};
///
/// let recover = recover(|e, _ctx| {
///     Output::json(serde_json::json!({ "error": e.to_string() }))
///         .with_status(StatusCode::SERVICE_UNAVAILABLE)
///         .into()
/// });
/// ```
pub fn recover<F>(on_error: F) -> Recover<F>
where
    F: Fn(&anyhow::Error, &Context) -> Reply + Send + Sync + 'static,
{
    Recover(on_error)
}

pub struct Recover<F>(F);

impl<F> Middleware for Recover<F>
where
    F: Fn(&anyhow::Error, &Context) -> Reply + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, StepResult> {
        Box::pin(async move {
            match next.run(ctx).await {
                Ok(()) => Ok(Reply::Empty),
                Err(e) => {
                    tracing::debug!("recovered from downstream error: {e:#}");
                    Ok((self.0)(&e, ctx))
                }
            }
        })
    }
}
