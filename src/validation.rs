//! Input validation as an ordinary middleware.
//!
//! [`validator`] takes a [`Schemas`] set and returns a middleware that, for
//! each declared source, extracts the raw value from the request, validates
//! it and either halts with a structured `400` or merges every parsed value
//! into the context's input bag and proceeds.
//!
//! Halting is the chain's ordinary short-circuit: the validator returns the
//! error output without calling `next`. Nothing is thrown.

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use serde_path_to_error::Segment;

use crate::chain::{Middleware, Next};
use crate::context::{Context, Source};
use crate::handler::{BoxFuture, StepResult};
use crate::output::Output;

/// One validation problem.
///
/// `path` locates the offending field. Issues leaving a validator are
/// prefixed with their source name, so a missing `name` in the JSON body is
/// reported at `["json", ...]`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub message: String,
    pub path: Vec<String>,
}

impl Issue {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into(), path: Vec::new() }
    }

    pub fn at(mut self, path: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.path = path.into_iter().map(Into::into).collect();
        self
    }

    fn prefixed(mut self, source: Source) -> Self {
        self.path.insert(0, source.as_str().to_owned());
        self
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.join("."), self.message)
    }
}

/// The validator contract: accept a value (absent when the request did not
/// carry the source at all) and return the parsed value or its issues.
pub trait Schema: Send + Sync + 'static {
    fn validate<'a>(&'a self, value: Option<Value>) -> BoxFuture<'a, Result<Value, Vec<Issue>>>;
}

// ── Typed ─────────────────────────────────────────────────────────────────────

/// A schema backed by serde: the value must deserialize into `T`. The parsed
/// value is `T` serialized back, so defaults and renames are applied.
pub struct Typed<T>(PhantomData<fn() -> T>);

/// A [`Typed`] schema for `T`.
pub fn typed<T>() -> Typed<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    Typed(PhantomData)
}

impl<T> Schema for Typed<T>
where
    T: DeserializeOwned + Serialize + 'static,
{
    fn validate<'a>(&'a self, value: Option<Value>) -> BoxFuture<'a, Result<Value, Vec<Issue>>> {
        Box::pin(std::future::ready(parse_typed::<T>(value)))
    }
}

fn parse_typed<T>(value: Option<Value>) -> Result<Value, Vec<Issue>>
where
    T: DeserializeOwned + Serialize,
{
    let parsed: T = match value {
        Some(value) => serde_path_to_error::deserialize(value).map_err(|e| vec![located(&e)])?,
        // An absent source is only fine when `T` accepts null (`Option<_>`, `()`).
        None => serde_json::from_value(Value::Null).map_err(|_| vec![Issue::new("Required")])?,
    };
    serde_json::to_value(&parsed).map_err(|e| vec![Issue::new(e.to_string())])
}

/// An issue at the field serde was reading when it failed. A missing field is
/// reported at the field itself rather than at its parent.
fn located(err: &serde_path_to_error::Error<serde_json::Error>) -> Issue {
    let message = err.inner().to_string();
    let mut path: Vec<String> = err
        .path()
        .iter()
        .filter_map(|segment| match segment {
            Segment::Seq { index } => Some(index.to_string()),
            Segment::Map { key } => Some(key.clone()),
            Segment::Enum { variant } => Some(variant.clone()),
            _ => None,
        })
        .collect();
    if let Some(field) = missing_field(&message) {
        path.push(field.to_owned());
    }
    Issue::new(message).at(path)
}

fn missing_field(message: &str) -> Option<&str> {
    message.strip_prefix("missing field `")?.split('`').next()
}

// ── closures ──────────────────────────────────────────────────────────────────

/// A schema implemented by a synchronous closure.
pub struct FnSchema<F>(F);

/// Wraps a closure as a [`Schema`].
pub fn schema_fn<F>(f: F) -> FnSchema<F>
where
    F: Fn(Option<Value>) -> Result<Value, Vec<Issue>> + Send + Sync + 'static,
{
    FnSchema(f)
}

impl<F> Schema for FnSchema<F>
where
    F: Fn(Option<Value>) -> Result<Value, Vec<Issue>> + Send + Sync + 'static,
{
    fn validate<'a>(&'a self, value: Option<Value>) -> BoxFuture<'a, Result<Value, Vec<Issue>>> {
        Box::pin(std::future::ready((self.0)(value)))
    }
}

// ── Schemas ───────────────────────────────────────────────────────────────────

/// The input schemas declared for a route, at most one per source.
#[derive(Clone, Default)]
pub struct Schemas {
    entries: Vec<(Source, Arc<dyn Schema>)>,
}

impl Schemas {
    pub fn new() -> Self { Self::default() }

    pub fn json(self, schema: impl Schema) -> Self { self.with(Source::Json, schema) }
    pub fn form(self, schema: impl Schema) -> Self { self.with(Source::Form, schema) }
    pub fn query(self, schema: impl Schema) -> Self { self.with(Source::Query, schema) }
    pub fn params(self, schema: impl Schema) -> Self { self.with(Source::Params, schema) }

    /// Declares `schema` for `source`, replacing an earlier declaration.
    pub fn with(mut self, source: Source, schema: impl Schema) -> Self {
        self.entries.retain(|(s, _)| *s != source);
        self.entries.push((source, Arc::new(schema)));
        self
    }

    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.entries.iter().map(|(s, _)| *s)
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }
}

impl fmt::Debug for Schemas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.sources()).finish()
    }
}

// ── the middleware ────────────────────────────────────────────────────────────

/// The validation middleware for `schemas`.
pub fn validator(schemas: Schemas) -> Validator {
    Validator { schemas }
}

/// Middleware produced by [`validator`].
#[derive(Clone, Debug)]
pub struct Validator {
    schemas: Schemas,
}

impl Validator {
    pub fn sources(&self) -> impl Iterator<Item = Source> + '_ {
        self.schemas.sources()
    }
}

impl Middleware for Validator {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, StepResult> {
        Box::pin(validate(&self.schemas, ctx, next))
    }
}

async fn validate(schemas: &Schemas, c: &mut Context, next: Next<'_>) -> StepResult {
    let mut raw = Vec::with_capacity(schemas.entries.len());
    for (source, schema) in &schemas.entries {
        raw.push((*source, Arc::clone(schema), extract(c, *source).await));
    }

    let results = futures::future::join_all(raw.into_iter().map(|(source, schema, value)| async move {
        (source, schema.validate(value).await)
    }))
    .await;

    let mut parsed = Vec::with_capacity(results.len());
    let mut issues = Vec::new();
    for (source, result) in results {
        match result {
            Ok(value) => parsed.push((source, value)),
            Err(found) => issues.extend(found.into_iter().map(|i| i.prefixed(source))),
        }
    }

    if !issues.is_empty() {
        tracing::debug!(path = c.req().path(), issues = issues.len(), "input validation failed");
        let body = json!({ "error": "Invalid input", "issues": issues });
        return Ok(Output::json(body).with_status(StatusCode::BAD_REQUEST).into());
    }

    c.merge_input(parsed);
    next.run(c).await?;
    Ok(().into())
}

/// The raw value of one source, `None` when the request does not carry it.
async fn extract(c: &Context, source: Source) -> Option<Value> {
    match source {
        Source::Json => c.req().json(),
        Source::Form => match c.req().form().await {
            Ok(form) => Some(form.to_value()),
            Err(e) => {
                tracing::debug!("unreadable form body: {e}");
                None
            }
        },
        Source::Query => Some(string_map(c.req().query())),
        Source::Params => Some(string_map(c.params().clone())),
    }
}

fn string_map(map: impl IntoIterator<Item = (String, String)>) -> Value {
    Value::Object(map.into_iter().map(|(k, v)| (k, Value::String(v))).collect::<Map<_, _>>())
}
