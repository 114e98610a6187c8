//! The network client: built requests go out through a [`Transport`].

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::{Client as HyperClient, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;

use super::path::{Call, Dispatch, PathNode};
use super::request::RequestInit;
use super::response::ClientResponse;
use crate::app::App;
use crate::error::{Error, Result};
use crate::handler::BoxFuture;
use crate::request::Request;
use crate::response::Response;
use crate::transformer::{TRANSFORMER_HEADER, Transformer, Transformers};

/// Sends one request and buffers the response.
///
/// The only thing the network client depends on; swap it out to test against
/// a mock or to send requests straight into an [`App`].
pub trait Transport: Send + Sync + 'static {
    fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'static, Result<http::Response<Bytes>>>;
}

/// Wrapper implementing [`Transport`] for a closure.
pub struct FnTransport<F>(F);

/// Wraps a closure as a [`Transport`].
///
/// ```rust
/// use tsu_rpc::client::transport_fn;
///
/// let echo = transport_fn(|req| Box::pin(async move {
///     Ok(http::Response::new(req.into_body()))
/// }));
/// ```
pub fn transport_fn<F>(f: F) -> FnTransport<F>
where
    F: Fn(http::Request<Bytes>) -> BoxFuture<'static, Result<http::Response<Bytes>>> + Send + Sync + 'static,
{
    FnTransport(f)
}

impl<F> Transport for FnTransport<F>
where
    F: Fn(http::Request<Bytes>) -> BoxFuture<'static, Result<http::Response<Bytes>>> + Send + Sync + 'static,
{
    fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'static, Result<http::Response<Bytes>>> {
        (self.0)(req)
    }
}

/// Plain-HTTP transport over hyper's pooled client.
#[derive(Clone)]
pub struct HyperTransport {
    client: HyperClient<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    pub fn new() -> Self {
        Self { client: HyperClient::builder(TokioExecutor::new()).build_http() }
    }
}

impl Default for HyperTransport {
    fn default() -> Self { Self::new() }
}

impl Transport for HyperTransport {
    fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'static, Result<http::Response<Bytes>>> {
        let client = self.client.clone();
        Box::pin(async move {
            let res = client
                .request(req.map(Full::new))
                .await
                .map_err(|e| Error::Transport(Box::new(e)))?;
            let (parts, body) = res.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| Error::Transport(Box::new(e)))?
                .to_bytes();
            Ok(http::Response::from_parts(parts, body))
        })
    }
}

/// Serves requests with an app in the same process, skipping the socket but
/// not the route lookup.
impl Transport for Arc<App> {
    fn send(&self, req: http::Request<Bytes>) -> BoxFuture<'static, Result<http::Response<Bytes>>> {
        let app = Arc::clone(self);
        Box::pin(async move {
            let res = app.fetch(Request::from_http(req)).await;
            Ok(res.into_buffered())
        })
    }
}

/// Builder for a network [`PathNode`].
///
/// ```rust
/// use tsu_rpc::client::Client;
///
/// let api = Client::new("http://localhost:3000")
///     .header(http::header::AUTHORIZATION, http::HeaderValue::from_static("Bearer t"))
///     .build();
/// let users = api.segment("users");
/// ```
pub struct Client {
    base_url: String,
    transport: Option<Arc<dyn Transport>>,
    defaults: RequestInit,
    transformers: Transformers,
}

impl Client {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            transport: None,
            defaults: RequestInit::new(),
            transformers: Transformers::new(),
        }
    }

    /// Replaces the default [`HyperTransport`].
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// A header sent with every request. Per-call headers of the same name win.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.defaults.headers.insert(name, value);
        self
    }

    /// Asks the server to encode json responses with the transformer
    /// registered as `name`.
    ///
    /// # Errors
    ///
    /// Fails when `name` is not a valid header value.
    pub fn transformer(mut self, name: &str) -> Result<Self> {
        let value = HeaderValue::from_str(name)?;
        self.defaults.headers.insert(HeaderName::from_static(TRANSFORMER_HEADER), value);
        Ok(self)
    }

    /// Makes a transformer available for decoding responses that name it.
    pub fn register(mut self, transformer: impl Transformer) -> Self {
        self.transformers = self.transformers.register(transformer);
        self
    }

    pub fn build(self) -> PathNode {
        let transport = self.transport.unwrap_or_else(|| Arc::new(HyperTransport::new()));
        let dispatch = NetworkDispatch {
            base_url: self.base_url.trim_end_matches('/').to_owned(),
            transport,
            transformers: self.transformers,
        };
        PathNode::root(Arc::new(dispatch), self.defaults)
    }
}

struct NetworkDispatch {
    base_url: String,
    transport: Arc<dyn Transport>,
    transformers: Transformers,
}

impl Dispatch for NetworkDispatch {
    fn dispatch<'a>(&'a self, call: Call) -> BoxFuture<'a, Result<ClientResponse>> {
        Box::pin(async move {
            tracing::debug!(method = %call.request.method, template = %call.template, "sending request");
            let req = call.request.into_http(&self.base_url)?;
            let res = self.transport.send(req).await?;
            Ok(ClientResponse::from_response(Response::from_http(res), &self.transformers).await)
        })
    }

    fn url(&self, path_and_query: &str) -> String {
        format!("{}{path_and_query}", self.base_url)
    }
}
