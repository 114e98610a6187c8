//! The in-process caller: calls run a route's chain directly, with no route
//! lookup by URL and no transport.

use std::collections::HashMap;
use std::sync::Arc;

use http::header::{HeaderName, HeaderValue};

use super::path::{Call, Dispatch, PathNode};
use super::request::RequestInit;
use super::response::ClientResponse;
use crate::app::App;
use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::request::Request;

const SYNTHETIC_BASE: &str = "http://localhost";

/// Builder for an in-process [`PathNode`] over an [`App`].
///
/// Path templates are matched exactly against the registered routes
/// (prefix included), falling back to the `ALL` route for the same template.
///
/// ```rust
/// use std::sync::Arc;
/// use tsu_rpc::{App, Router, client::Caller};
///
/// let app = Arc::new(App::new(Router::new()));
/// let caller = Caller::new(app).build();
/// ```
pub struct Caller {
    app: Arc<App>,
    defaults: RequestInit,
}

impl Caller {
    pub fn new(app: Arc<App>) -> Self {
        Self { app, defaults: RequestInit::new() }
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.defaults.headers.insert(name, value);
        self
    }

    pub fn build(self) -> PathNode {
        PathNode::root(Arc::new(CallerDispatch { app: self.app }), self.defaults)
    }
}

struct CallerDispatch {
    app: Arc<App>,
}

impl Dispatch for CallerDispatch {
    fn dispatch<'a>(&'a self, call: Call) -> BoxFuture<'a, Result<ClientResponse>> {
        Box::pin(async move {
            let Some(index) = self.app.router().find_index(call.method, &call.template) else {
                return Err(Error::RouteNotFound { method: call.method, path: call.template });
            };

            let params = extract_params(&call.template, &call.request.path);
            let req = Request::from_http(call.request.into_http(SYNTHETIC_BASE)?);
            let ctx = self.app.context(req, params).capture_output();

            let transformers = self.app.transformers();
            let (res, output) = self.app.execute(index, ctx).await;
            Ok(match output {
                Some(output) => ClientResponse::from_output(&output, res, transformers),
                None => ClientResponse::from_response(res, transformers).await,
            })
        })
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{SYNTHETIC_BASE}{path_and_query}")
    }
}

/// Pairs each `:name` segment of `template` with the substituted segment of
/// `path` at the same position.
fn extract_params(template: &str, path: &str) -> HashMap<String, String> {
    let segments = |s: &str| s.split('/').filter(|s| !s.is_empty()).map(str::to_owned).collect::<Vec<_>>();
    segments(template)
        .into_iter()
        .zip(segments(path))
        .filter_map(|(t, p)| {
            let name = t.strip_prefix(':')?.to_owned();
            let value = urlencoding::decode(&p).map(|v| v.into_owned()).unwrap_or(p);
            Some((name, value))
        })
        .collect()
}
