//! Per-request state threaded through the chain.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::form::FormData;
use crate::output::{Output, Reply};
use crate::request::Request;
use crate::response::Response;
use crate::transformer::Transformer;

// ── Variables ─────────────────────────────────────────────────────────────────

/// String-keyed state shared between the steps of one request.
///
/// Seeded from the server-level initial variables (see
/// [`AppConfig::vars`](crate::AppConfig::vars)) and mutated by middleware.
/// Values are type-erased; read them back with the type they were stored as.
/// Cloning is cheap: values are reference counted and never mutated in place.
#[derive(Clone, Default)]
pub struct Variables {
    map: HashMap<String, Arc<dyn Any + Send + Sync>>,
}

impl Variables {
    pub fn new() -> Self { Self::default() }

    /// Stores `value` under `key`. Returns `self` for chaining.
    pub fn with<T: Any + Send + Sync>(mut self, key: impl Into<String>, value: T) -> Self {
        self.set(key, value);
        self
    }

    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.map.insert(key.into(), Arc::new(value));
    }

    /// The value under `key`, if present and of type `T`.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.map.get(key).and_then(|v| (**v).downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool { self.map.contains_key(key) }

    pub fn remove(&mut self, key: &str) -> bool { self.map.remove(key).is_some() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }
}

impl fmt::Debug for Variables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.map.keys()).finish()
    }
}

// ── Input sources ─────────────────────────────────────────────────────────────

/// A validated input source.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Ord, PartialOrd)]
pub enum Source {
    Json,
    Form,
    Query,
    Params,
}

impl Source {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json   => "json",
            Self::Form   => "form",
            Self::Query  => "query",
            Self::Params => "params",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Everything one request's chain can see and change.
///
/// Created per dispatch and dropped once the response is produced; nothing in
/// here is shared with any other request.
pub struct Context {
    req: Request,
    params: HashMap<String, String>,
    vars: Variables,
    input: HashMap<Source, Value>,
    res: Response,
    transformer: Arc<dyn Transformer>,
    echo_transformer: bool,
    capture: bool,
    output: Option<Output>,
}

impl Context {
    pub fn new(
        req: Request,
        params: HashMap<String, String>,
        vars: Variables,
        transformer: Arc<dyn Transformer>,
    ) -> Self {
        Self {
            req,
            params,
            vars,
            input: HashMap::new(),
            res: Response::default(),
            transformer,
            echo_transformer: false,
            capture: false,
            output: None,
        }
    }

    /// Name the negotiated transformer in json responses. Set when it is not
    /// the registry default.
    pub(crate) fn echo_transformer(mut self, echo: bool) -> Self {
        self.echo_transformer = echo;
        self
    }

    /// Keep a copy of the last normalized [`Output`] so an in-process caller
    /// can read the typed payload instead of re-parsing the body.
    pub(crate) fn capture_output(mut self) -> Self {
        self.capture = true;
        self
    }

    pub fn req(&self) -> &Request { &self.req }

    /// A path parameter extracted from the route template.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn vars(&self) -> &Variables { &self.vars }
    pub fn vars_mut(&mut self) -> &mut Variables { &mut self.vars }

    pub fn var<T: Any>(&self, key: &str) -> Option<&T> { self.vars.get(key) }

    pub fn set_var<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.vars.set(key, value);
    }

    /// The validated value for `source`, once a validator has accepted it.
    pub fn valid(&self, source: Source) -> Option<&Value> { self.input.get(&source) }

    /// The validated value for `source`, deserialized into `T`.
    pub fn valid_as<T: DeserializeOwned>(&self, source: Source) -> anyhow::Result<T> {
        let value = self
            .input
            .get(&source)
            .ok_or_else(|| anyhow::anyhow!("no validated {source} input"))?;
        Ok(T::deserialize(value)?)
    }

    /// Merges validated values into the input bag. Keys merged by earlier
    /// validators stay in place unless the same source is validated again.
    pub(crate) fn merge_input(&mut self, parsed: impl IntoIterator<Item = (Source, Value)>) {
        self.input.extend(parsed);
    }

    pub fn transformer(&self) -> &Arc<dyn Transformer> { &self.transformer }

    // ── response ──────────────────────────────────────────────────────────

    pub fn res(&self) -> &Response { &self.res }

    /// Mutable access to the current response. The response no longer
    /// reflects a typed output afterwards, so an in-process caller reads it
    /// as it would a network response.
    pub fn res_mut(&mut self) -> &mut Response {
        self.output = None;
        &mut self.res
    }

    /// Replaces the current response outright.
    pub fn set_res(&mut self, res: Response) {
        self.output = None;
        self.res = res;
    }

    /// Normalizes a step's reply into the current response. `Empty` is a no-op.
    pub(crate) fn apply(&mut self, reply: Reply) -> crate::Result<()> {
        match reply {
            Reply::Empty => {}
            Reply::Raw(res) => self.set_res(res),
            Reply::Output(out) => {
                let kept = self.capture.then(|| out.clone());
                self.res = out.into_response(&*self.transformer, self.echo_transformer)?;
                self.output = kept;
            }
        }
        Ok(())
    }

    pub(crate) fn into_parts(self) -> (Response, Option<Output>) {
        (self.res, self.output)
    }

    // ── output helpers ────────────────────────────────────────────────────

    pub fn json(&self, value: impl Into<Value>) -> Output { Output::json(value) }
    pub fn text(&self, text: impl Into<String>) -> Output { Output::text(text) }
    pub fn body(&self, bytes: impl Into<Bytes>) -> Output { Output::body(bytes) }
    pub fn form(&self, form: FormData) -> Output { Output::form(form) }
    pub fn redirect(&self, location: impl Into<String>) -> Output { Output::redirect(location) }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.req.method())
            .field("path", &self.req.path())
            .field("params", &self.params)
            .field("vars", &self.vars)
            .field("status", &self.res.status())
            .finish_non_exhaustive()
    }
}
