//! Request construction shared by the network client and the caller.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, COOKIE, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::form::FormData;
use crate::method::Method;

/// The body of a call: json or form, never both.
#[derive(Clone, Debug, PartialEq)]
pub enum InputBody {
    Json(Value),
    Form(FormData),
}

/// Everything a call may carry: path params, query, body, headers, cookies.
///
/// ```rust
/// use tsu_rpc::client::ClientInput;
///
/// let input = ClientInput::new()
///     .param("id", 42)
///     .query("tags", serde_json::json!(["a", "b"]))
///     .json(serde_json::json!({ "name": "alice" }));
/// ```
#[derive(Clone, Debug, Default)]
pub struct ClientInput {
    pub params: HashMap<String, String>,
    pub query: Map<String, Value>,
    pub body: Option<InputBody>,
    pub headers: HeaderMap,
    pub cookies: Vec<(String, String)>,
}

impl ClientInput {
    pub fn new() -> Self { Self::default() }

    pub fn param(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.params.insert(name.into(), value.to_string());
        self
    }

    /// Adds a query value. `null` is omitted, arrays repeat the key.
    pub fn query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Sets a json body, replacing any form body.
    pub fn json(mut self, value: impl Into<Value>) -> Self {
        self.body = Some(InputBody::Json(value.into()));
        self
    }

    /// Sets a form body, replacing any json body.
    pub fn form(mut self, form: FormData) -> Self {
        self.body = Some(InputBody::Form(form));
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.push((name.into(), value.into()));
        self
    }
}

/// Request-init overrides: set as defaults when a proxy is built, or per call.
#[derive(Clone, Debug, Default)]
pub struct RequestInit {
    /// Wire method override, e.g. sending `GET` through an `ALL` route.
    pub method: Option<Method>,
    pub headers: HeaderMap,
    /// An explicit body. Wins over the input's json / form body.
    pub body: Option<Bytes>,
}

impl RequestInit {
    pub fn new() -> Self { Self::default() }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// `overrides` applied over `self`. On a header name collision the
    /// override's values replace the default's.
    pub fn merge(&self, overrides: RequestInit) -> RequestInit {
        let mut headers = self.headers.clone();
        overlay(&mut headers, overrides.headers);
        RequestInit {
            method: overrides.method.or(self.method),
            headers,
            body: overrides.body.or_else(|| self.body.clone()),
        }
    }
}

/// A request ready to be dispatched.
#[derive(Clone, Debug)]
pub struct BuiltRequest {
    pub method: http::Method,
    /// Path with every `:name` substituted and percent-encoded.
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl BuiltRequest {
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{q}", self.path),
            None => self.path.clone(),
        }
    }

    /// An `http::Request` addressed at `base` (scheme and authority).
    pub fn into_http(self, base: &str) -> Result<http::Request<Bytes>> {
        let uri = format!("{}{}", base.trim_end_matches('/'), self.path_and_query());
        let mut req = http::Request::builder().method(self.method).uri(uri).body(self.body)?;
        *req.headers_mut() = self.headers;
        Ok(req)
    }
}

/// Builds the request for `template` called with `method`.
///
/// Fails with [`Error::MissingParam`] before anything is sent when a `:name`
/// segment has no value in `input.params`.
pub fn build_request(
    method: Method,
    template: &str,
    input: ClientInput,
    defaults: &RequestInit,
    overrides: RequestInit,
) -> Result<BuiltRequest> {
    let path = substitute(template, &input.params)?;
    let query = encode_query(&input.query);

    // Per-call headers are applied last, after the input's own headers.
    let RequestInit { method: call_method, headers: call_headers, body: call_body } = overrides;
    let init = defaults.merge(RequestInit { method: call_method, headers: HeaderMap::new(), body: call_body });

    let mut headers = init.headers;
    overlay(&mut headers, input.headers);
    if !input.cookies.is_empty() {
        let cookie = input.cookies.iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("; ");
        headers.insert(COOKIE, HeaderValue::from_str(&cookie)?);
    }
    overlay(&mut headers, call_headers);

    let body = match (init.body, input.body) {
        (Some(explicit), _) => explicit,
        (None, Some(InputBody::Json(value))) => {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            Bytes::from(serde_json::to_vec(&value)?)
        }
        (None, Some(InputBody::Form(form))) => {
            let (content_type, body) = form.encode();
            headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type)?);
            body
        }
        (None, None) => Bytes::new(),
    };

    Ok(BuiltRequest { method: wire_method(init.method.unwrap_or(method))?, path, query, headers, body })
}

/// `ALL` has no standard verb; it goes out as the extension method `ALL`.
fn wire_method(method: Method) -> Result<http::Method> {
    match method.to_http() {
        Some(m) => Ok(m),
        None => {
            let m = http::Method::from_bytes(method.as_str().as_bytes()).map_err(http::Error::from)?;
            Ok(m)
        }
    }
}

fn substitute(template: &str, params: &HashMap<String, String>) -> Result<String> {
    let segments = template
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => params
                .get(name)
                .map(|v| urlencoding::encode(v).into_owned())
                .ok_or_else(|| Error::MissingParam(name.to_owned())),
            None => Ok(segment.to_owned()),
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(format!("/{}", segments.join("/")))
}

fn encode_query(query: &Map<String, Value>) -> Option<String> {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    let mut any = false;
    for (key, value) in query {
        let values: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for value in values {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            out.append_pair(key, &text);
            any = true;
        }
    }
    any.then(|| out.finish())
}

/// Inserts every entry of `from` into `into`, replacing same-named headers.
fn overlay(into: &mut HeaderMap, from: HeaderMap) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in from {
        // `HeaderMap`'s owning iterator yields the name only for the first
        // value of each header.
        if let Some(name) = name {
            into.remove(&name);
            current = Some(name);
        }
        if let Some(name) = &current {
            into.append(name.clone(), value);
        }
    }
}
