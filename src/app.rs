//! The dispatch boundary: request in, response out.
//!
//! [`App::fetch`] is the whole server-side contract. It looks the route up,
//! builds a fresh [`Context`], runs the route's chain and returns whatever
//! response the chain settled on. An error (or panic) that escapes the chain
//! is logged and replaced by a fixed `500`; this is the only place that
//! happens.

use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::chain::Chain;
use crate::context::{Context, Variables};
use crate::error::Result;
use crate::method::Method;
use crate::output::Output;
use crate::request::Request;
use crate::response::Response;
use crate::router::Router;
use crate::transformer::{TRANSFORMER_HEADER, Transformer, Transformers};

/// Server-level configuration.
///
/// ```rust
/// use tsu_rpc::{AppConfig, Variables};
///
/// let config = AppConfig::new()
///     .prefix("/api")
///     .vars(Variables::new().with("service", "billing"));
/// ```
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    prefix: Option<String>,
    transformers: Transformers,
    vars: Variables,
}

impl AppConfig {
    pub fn new() -> Self { Self::default() }

    /// Mounts every route under `prefix`.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Registers an additional transformer (see [`Transformers::register`]).
    pub fn transformer(mut self, transformer: impl Transformer) -> Self {
        self.transformers = self.transformers.register(transformer);
        self
    }

    pub fn transformers(mut self, transformers: Transformers) -> Self {
        self.transformers = transformers;
        self
    }

    /// Initial variables every request's context starts with.
    pub fn vars(mut self, vars: Variables) -> Self {
        self.vars = vars;
        self
    }
}

/// A route table bound to its configuration, ready to serve.
///
/// Immutable after construction and cheap to share: wrap it in an `Arc`.
pub struct App {
    router: Router,
    chains: Vec<Chain>,
    transformers: Transformers,
    vars: Variables,
}

impl App {
    pub fn new(router: Router) -> Self {
        Self::build(router, AppConfig::default())
    }

    /// # Errors
    ///
    /// Fails when prefixing makes two routes collide.
    pub fn with_config(router: Router, config: AppConfig) -> Result<Self> {
        let router = match &config.prefix {
            Some(prefix) => router.prefixed(prefix)?,
            None => router,
        };
        Ok(Self::build(router, config))
    }

    fn build(router: Router, config: AppConfig) -> Self {
        let chains = router
            .routes()
            .map(|route| route.chain(router.app_middleware()))
            .collect();
        Self { router, chains, transformers: config.transformers, vars: config.vars }
    }

    pub fn router(&self) -> &Router { &self.router }
    pub fn transformers(&self) -> &Transformers { &self.transformers }

    /// Handles one request end to end.
    pub async fn fetch(&self, req: Request) -> Response {
        let Ok(method) = Method::try_from(req.method()) else {
            tracing::debug!(method = %req.method(), "unsupported method");
            return Response::not_found();
        };

        let Some((index, params)) = self.router.lookup_index(method, req.path()) else {
            tracing::debug!(%method, path = req.path(), "no route matched");
            return Response::not_found();
        };

        let ctx = self.context(req, params);
        self.execute(index, ctx).await.0
    }

    pub(crate) fn context(&self, req: Request, params: HashMap<String, String>) -> Context {
        let transformer = self.transformers.negotiate(req.header(TRANSFORMER_HEADER));
        let echo = !self.transformers.is_default(&*transformer);
        Context::new(req, params, self.vars.clone(), transformer).echo_transformer(echo)
    }

    /// Runs the chain of the route at `index` on `ctx`. Returns the final
    /// response and, when the context captures outputs, the typed output
    /// behind it.
    pub(crate) async fn execute(&self, index: usize, mut ctx: Context) -> (Response, Option<Output>) {
        let (Some(route), Some(chain)) = (self.router.route_at(index), self.chains.get(index)) else {
            tracing::error!(index, "route index out of range");
            return (Response::internal_error(), None);
        };

        let outcome = AssertUnwindSafe(chain.run(&mut ctx)).catch_unwind().await;
        match outcome {
            Ok(Ok(())) => ctx.into_parts(),
            Ok(Err(e)) => {
                tracing::error!(method = %route.method(), path = route.path(), "unhandled error: {e:#}");
                (Response::internal_error(), None)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<String>()
                    .map(String::as_str)
                    .or_else(|| panic.downcast_ref::<&str>().copied())
                    .unwrap_or("unknown panic");
                tracing::error!(method = %route.method(), path = route.path(), "handler panicked: {message}");
                (Response::internal_error(), None)
            }
        }
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("App")
            .field("router", &self.router)
            .field("transformers", &self.transformers)
            .field("vars", &self.vars)
            .finish()
    }
}
