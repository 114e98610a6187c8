//! Incoming request type.

use std::collections::HashMap;

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap};
use http::{Method, Uri};
use serde_json::Value;

use crate::error::Result;
use crate::form::FormData;

/// An incoming HTTP request with its body fully buffered.
#[derive(Clone, Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) uri: Uri,
    pub(crate) headers: HeaderMap,
    pub(crate) body: Bytes,
}

impl Request {
    pub fn new(method: Method, uri: Uri, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self { method, uri, headers, body: body.into() }
    }

    pub fn from_http(req: http::Request<Bytes>) -> Self {
        let (parts, body) = req.into_parts();
        Self::new(parts.method, parts.uri, parts.headers, body)
    }

    pub fn method(&self) -> &Method { &self.method }
    pub fn uri(&self) -> &Uri { &self.uri }
    pub fn path(&self) -> &str { self.uri.path() }
    pub fn headers(&self) -> &HeaderMap { &self.headers }
    pub fn body(&self) -> &Bytes { &self.body }

    pub fn query_string(&self) -> Option<&str> { self.uri.query() }

    /// Case-insensitive header lookup; `None` for non-UTF-8 values.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }

    /// The query string as a flat map. When a key repeats, the first value wins;
    /// use [`queries`](Self::queries) to see all of them.
    pub fn query(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        for (k, v) in self.query_pairs() {
            map.entry(k).or_insert(v);
        }
        map
    }

    /// Every value of a repeated query key, in order.
    pub fn queries(&self, key: &str) -> Vec<String> {
        self.query_pairs()
            .filter(|(k, _)| k == key)
            .map(|(_, v)| v)
            .collect()
    }

    fn query_pairs(&self) -> impl Iterator<Item = (String, String)> + '_ {
        url::form_urlencoded::parse(self.query_string().unwrap_or_default().as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
    }

    /// The body parsed as JSON, or `None` when it is empty or not valid JSON.
    pub fn json(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }

    /// The body parsed as multipart or url-encoded form fields.
    pub async fn form(&self) -> Result<FormData> {
        FormData::parse(self.content_type(), self.body.clone()).await
    }
}
