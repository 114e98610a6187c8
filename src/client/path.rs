//! Path-addressable access to a route tree.
//!
//! A [`PathNode`] is a value: appending a segment returns a new node and never
//! touches the one it came from, so nodes can be kept and reused freely.
//!
//! ```rust,no_run
//! # async fn run(root: tsu_rpc::client::PathNode) -> tsu_rpc::Result<()> {
//! use tsu_rpc::client::ClientInput;
//!
//! let users = root.segment("users");
//! let res = users
//!     .segment(":id")
//!     .get()
//!     .call(ClientInput::new().param("id", 42))
//!     .await?;
//! # Ok(()) }
//! ```

use std::fmt;
use std::sync::Arc;

use super::request::{BuiltRequest, ClientInput, RequestInit, build_request};
use super::response::ClientResponse;
use crate::error::Result;
use crate::handler::BoxFuture;
use crate::method::Method;

/// A fully built call, handed to a dispatch strategy.
#[derive(Clone, Debug)]
pub struct Call {
    /// The method the call was made through (before any override).
    pub method: Method,
    /// The accumulated path template, `:name` segments intact.
    pub template: String,
    pub request: BuiltRequest,
}

/// Where built calls go: over the network, or straight into an app.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch<'a>(&'a self, call: Call) -> BoxFuture<'a, Result<ClientResponse>>;

    /// The absolute URL a request with this path and query would be sent to.
    fn url(&self, path_and_query: &str) -> String;
}

/// A position in the route tree.
#[derive(Clone)]
pub struct PathNode {
    segments: Vec<String>,
    dispatcher: Arc<dyn Dispatch>,
    defaults: Arc<RequestInit>,
}

impl PathNode {
    pub(crate) fn root(dispatcher: Arc<dyn Dispatch>, defaults: RequestInit) -> Self {
        Self { segments: Vec::new(), dispatcher, defaults: Arc::new(defaults) }
    }

    /// The node one level below. `name` may hold several `/`-separated
    /// segments; empty ones are skipped.
    pub fn segment(&self, name: &str) -> Self {
        let mut next = self.clone();
        next.segments.extend(name.split('/').filter(|s| !s.is_empty()).map(str::to_owned));
        next
    }

    /// The accumulated path template.
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }

    pub fn method(&self, method: Method) -> RequestInvoker {
        RequestInvoker {
            method,
            template: self.path(),
            dispatcher: Arc::clone(&self.dispatcher),
            defaults: Arc::clone(&self.defaults),
        }
    }

    /// Resolves a method marker such as `$get` or `$all`.
    pub fn marker(&self, marker: &str) -> Option<RequestInvoker> {
        Method::from_marker(marker).map(|m| self.method(m))
    }

    pub fn get(&self) -> RequestInvoker { self.method(Method::Get) }
    pub fn post(&self) -> RequestInvoker { self.method(Method::Post) }
    pub fn put(&self) -> RequestInvoker { self.method(Method::Put) }
    pub fn patch(&self) -> RequestInvoker { self.method(Method::Patch) }
    pub fn delete(&self) -> RequestInvoker { self.method(Method::Delete) }
    pub fn all(&self) -> RequestInvoker { self.method(Method::All) }
}

impl fmt::Debug for PathNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PathNode").field("path", &self.path()).finish()
    }
}

/// A request function bound to one method and path template.
#[derive(Clone)]
pub struct RequestInvoker {
    method: Method,
    template: String,
    dispatcher: Arc<dyn Dispatch>,
    defaults: Arc<RequestInit>,
}

impl RequestInvoker {
    pub fn method(&self) -> Method { self.method }
    pub fn template(&self) -> &str { &self.template }

    pub async fn call(&self, input: ClientInput) -> Result<ClientResponse> {
        self.call_with(input, RequestInit::new()).await
    }

    /// Calls with per-call overrides. A missing path parameter fails here,
    /// before anything is dispatched.
    pub async fn call_with(&self, input: ClientInput, init: RequestInit) -> Result<ClientResponse> {
        let request = self.build(input, init)?;
        let call = Call { method: self.method, template: self.template.clone(), request };
        self.dispatcher.dispatch(call).await
    }

    /// The request a call with these arguments would send.
    pub fn build(&self, input: ClientInput, init: RequestInit) -> Result<BuiltRequest> {
        build_request(self.method, &self.template, input, &self.defaults, init)
    }

    /// The absolute URL for `input` (params substituted, query appended).
    pub fn url(&self, input: ClientInput) -> Result<String> {
        let built = self.build(input, RequestInit::new())?;
        Ok(self.dispatcher.url(&built.path_and_query()))
    }
}

impl fmt::Debug for RequestInvoker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestInvoker")
            .field("method", &self.method)
            .field("template", &self.template)
            .finish()
    }
}
