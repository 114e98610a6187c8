//! The low-level response: what a chain leaves in `Context::res` and what
//! [`App::fetch`](crate::App::fetch) hands back.
//!
//! Handlers normally return an [`Output`](crate::Output) and let the
//! normalizer build one of these. Returning a `Response` directly bypasses
//! normalization entirely.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use http::StatusCode;
use http_body_util::Full;

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
pub enum ContentType {
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream
    Text,         // text/plain; charset=utf-8
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
        }
    }
}

// ── Response ─────────────────────────────────────────────────────────────────

/// A fully-formed HTTP response.
///
/// ```rust
/// use tsu_rpc::{ContentType, Response};
/// use http::StatusCode;
///
/// Response::empty(StatusCode::NO_CONTENT);
///
/// Response::builder()
///     .status(StatusCode::CREATED)
///     .header(http::header::LOCATION, "/users/42")
///     .json(br#"{"id":42}"#.to_vec());
///
/// Response::builder().bytes(ContentType::Html, b"<p>ok</p>".to_vec());
/// ```
#[derive(Clone, Debug)]
pub struct Response {
    pub(crate) status: StatusCode,
    pub(crate) status_text: Option<String>,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Response {
    /// Response with no body and no headers.
    pub fn empty(status: StatusCode) -> Self {
        Self { status, status_text: None, headers: HeaderMap::new(), body: Bytes::new() }
    }

    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { status, status_text: None, headers, body: body.into() }
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: HeaderMap::new(), status: StatusCode::OK }
    }

    /// The response for a request no route matched.
    pub fn not_found() -> Self {
        Self::builder().status(StatusCode::NOT_FOUND).text("404 Not Found")
    }

    /// The fixed response for an error that escaped the whole chain. Carries
    /// no detail about the error itself.
    pub fn internal_error() -> Self {
        Self::builder()
            .status(StatusCode::INTERNAL_SERVER_ERROR)
            .text("Internal Server Error")
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn status_text(&self) -> Option<&str> { self.status_text.as_deref() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn headers_mut(&mut self) -> &mut HeaderMap { &mut self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    pub fn set_status(&mut self, status: StatusCode) {
        self.status = status;
    }

    /// Case-insensitive header lookup; `None` for non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    pub fn into_http(self) -> http::Response<Full<Bytes>> {
        self.into_buffered().map(Full::new)
    }

    /// The response as an `http::Response` over its buffered body.
    pub fn into_buffered(self) -> http::Response<Bytes> {
        let mut res = http::Response::new(self.body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        if let Some(text) = self.status_text {
            match hyper::ext::ReasonPhrase::try_from(text.into_bytes()) {
                Ok(reason) => {
                    res.extensions_mut().insert(reason);
                }
                Err(e) => tracing::debug!("dropping status text: {e}"),
            }
        }
        res
    }

    pub fn from_http(res: http::Response<Bytes>) -> Self {
        let (parts, body) = res.into_parts();
        let status_text = parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .and_then(|r| std::str::from_utf8(r.as_bytes()).ok())
            .map(str::to_owned);
        Self { status: parts.status, status_text, headers: parts.headers, body }
    }
}

impl Default for Response {
    /// The response every context starts with: empty `204 No Content`.
    fn default() -> Self { Self::empty(StatusCode::NO_CONTENT) }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `200 OK`. Terminated by a
/// typed body method. Headers that fail to parse are dropped.
pub struct ResponseBuilder {
    headers: HeaderMap,
    status: StatusCode,
}

impl ResponseBuilder {
    pub fn status(mut self, code: StatusCode) -> Self {
        self.status = code;
        self
    }

    pub fn header(mut self, name: HeaderName, value: &str) -> Self {
        match HeaderValue::from_str(value) {
            Ok(value) => {
                self.headers.append(name, value);
            }
            Err(e) => tracing::debug!(header = %name, "dropping header: {e}"),
        }
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: impl Into<Bytes>) -> Response {
        self.finish(ContentType::Json, body.into())
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.finish(ContentType::Text, Bytes::from(body.into()))
    }

    /// Terminate with a typed body.
    pub fn bytes(self, content_type: ContentType, body: impl Into<Bytes>) -> Response {
        self.finish(content_type, body.into())
    }

    /// Terminate with no body.
    pub fn no_body(self) -> Response {
        Response::new(self.status, self.headers, Bytes::new())
    }

    fn finish(mut self, content_type: ContentType, body: Bytes) -> Response {
        self.headers
            .entry(CONTENT_TYPE)
            .or_insert(HeaderValue::from_static(content_type.as_str()));
        Response::new(self.status, self.headers, body)
    }
}
