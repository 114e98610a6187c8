//! The uniform `{data, error, status, ok, res}` result of every call.

use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderMap, LOCATION};
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Result;
use crate::form::{self, FormData};
use crate::output::{Output, Payload};
use crate::response::Response;
use crate::transformer::{TRANSFORMER_HEADER, Transformer, Transformers};

/// The fetched response, body already buffered.
///
/// [`json`](Self::json) and [`text`](Self::text) re-derive from the buffered
/// bytes; they can be called any number of times.
#[derive(Clone)]
pub struct ResponseLike {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    transformer: Arc<dyn Transformer>,
}

impl ResponseLike {
    /// Wraps `res`, picking the transformer its `x-transformer` header names
    /// (the default when absent or unknown).
    pub(crate) fn new(res: Response, transformers: &Transformers) -> Self {
        let transformer = transformers.negotiate(res.header(TRANSFORMER_HEADER));
        let Response { status, headers, body, .. } = res;
        Self { status, headers, body, transformer }
    }

    pub fn status(&self) -> StatusCode { self.status }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(http::header::CONTENT_TYPE.as_str())
    }

    /// The body as text (lossy for non-UTF-8 bytes).
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// The body decoded by the response's transformer, then into `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = self.transformer.parse(&self.text())?;
        Ok(serde_json::from_value(value)?)
    }

    fn is_redirect(&self) -> bool {
        self.status.is_redirection() && self.headers.contains_key(LOCATION)
    }
}

impl std::fmt::Debug for ResponseLike {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseLike")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body", &self.body.len())
            .field("transformer", &self.transformer.name())
            .finish()
    }
}

/// What every call through a [`PathNode`](super::PathNode) resolves to.
///
/// `data` is only populated for 2xx, `error` only for 4xx/5xx; anything
/// else (and every redirect) leaves both empty.
#[derive(Clone, Debug)]
pub struct ClientResponse {
    pub data: Option<Value>,
    pub error: Option<Value>,
    pub status: StatusCode,
    pub ok: bool,
    pub res: ResponseLike,
}

impl ClientResponse {
    fn new(payload: Option<Value>, redirect: bool, res: ResponseLike) -> Self {
        let status = res.status();
        let (data, error) = partition(status, payload, redirect);
        Self { data, error, status, ok: is_ok(status), res }
    }

    /// Parses a response by its content type. Used by the network client,
    /// and by the caller when the chain ended on a raw response.
    pub(crate) async fn from_response(res: Response, transformers: &Transformers) -> Self {
        let res = ResponseLike::new(res, transformers);
        let redirect = res.is_redirect();
        let payload = if redirect { None } else { sniff(&res).await };
        Self::new(payload, redirect, res)
    }

    /// Builds the result straight from the typed output the chain produced.
    pub(crate) fn from_output(output: &Output, res: Response, transformers: &Transformers) -> Self {
        let res = ResponseLike::new(res, transformers);
        let payload = match output.payload() {
            Payload::Json(value) => Some(value.clone()),
            Payload::Text(text) => Some(Value::String(text.clone())),
            Payload::Form(form) => Some(form.to_value()),
            Payload::Body(_) | Payload::Redirect(_) => None,
        };
        Self::new(payload, output.is_redirect(), res)
    }

    pub fn data_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        Ok(self.data.clone().map(serde_json::from_value).transpose()?)
    }

    pub fn error_as<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        Ok(self.error.clone().map(serde_json::from_value).transpose()?)
    }
}

pub(crate) fn is_ok(status: StatusCode) -> bool {
    (200..300).contains(&status.as_u16())
}

/// Splits a payload into `(data, error)` by status.
pub(crate) fn partition(status: StatusCode, payload: Option<Value>, redirect: bool) -> (Option<Value>, Option<Value>) {
    if redirect {
        return (None, None);
    }
    match status.as_u16() {
        200..=299 => (payload, None),
        400..=599 => (None, payload),
        _ => (None, None),
    }
}

async fn sniff(res: &ResponseLike) -> Option<Value> {
    if res.body().is_empty() {
        return None;
    }
    let content_type = res.content_type()?.to_ascii_lowercase();

    if content_type.starts_with("application/json") || content_type.contains("+json") {
        return match res.transformer.parse(&res.text()) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!("json response did not parse, keeping text: {e}");
                Some(Value::String(res.text()))
            }
        };
    }
    if content_type.starts_with("text/") {
        return Some(Value::String(res.text()));
    }
    if form::is_multipart(&content_type) || form::is_urlencoded(&content_type) {
        return match FormData::parse(res.content_type(), res.body().clone()).await {
            Ok(form) => Some(form.to_value()),
            Err(e) => {
                tracing::debug!("form response did not parse: {e}");
                None
            }
        };
    }
    None
}
