//! Typed step results and their normalization into a [`Response`].
//!
//! Every middleware and handler returns a [`Reply`]:
//!
//! - [`Reply::Empty`] leaves the context's current response as it is,
//! - [`Reply::Raw`] replaces it with a ready-made [`Response`],
//! - [`Reply::Output`] replaces it with the normalized form of an [`Output`].
//!
//! Normalization applies a per-kind default content type (only when none was
//! set explicitly), encodes json payloads through the negotiated
//! [`Transformer`] and fills in the default status: 200, or 302 for
//! redirects.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, LOCATION};
use http::StatusCode;
use serde_json::Value;

use crate::error::Result;
use crate::form::FormData;
use crate::response::{ContentType, Response};
use crate::transformer::{TRANSFORMER_HEADER, Transformer};

/// The payload of an [`Output`], tagged by kind.
#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Json(Value),
    Text(String),
    Form(FormData),
    Body(Bytes),
    /// Target location of a redirect.
    Redirect(String),
}

/// A tagged handler result, prior to normalization.
#[derive(Clone, Debug)]
pub struct Output {
    payload: Payload,
    status: Option<StatusCode>,
    status_text: Option<String>,
    headers: HeaderMap,
}

impl Output {
    pub fn new(payload: Payload) -> Self {
        Self { payload, status: None, status_text: None, headers: HeaderMap::new() }
    }

    pub fn json(value: impl Into<Value>) -> Self { Self::new(Payload::Json(value.into())) }

    /// Serializes any `Serialize` value into a json output.
    pub fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<Self> {
        Ok(Self::json(serde_json::to_value(value)?))
    }

    pub fn text(text: impl Into<String>) -> Self { Self::new(Payload::Text(text.into())) }

    pub fn form(form: FormData) -> Self { Self::new(Payload::Form(form)) }

    pub fn body(bytes: impl Into<Bytes>) -> Self { Self::new(Payload::Body(bytes.into())) }

    pub fn redirect(location: impl Into<String>) -> Self {
        Self::new(Payload::Redirect(location.into()))
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_status_text(mut self, text: impl Into<String>) -> Self {
        self.status_text = Some(text.into());
        self
    }

    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn payload(&self) -> &Payload { &self.payload }
    pub fn headers(&self) -> &HeaderMap { &self.headers }

    pub fn is_redirect(&self) -> bool {
        matches!(self.payload, Payload::Redirect(_))
    }

    /// The explicit status, or the kind default.
    pub fn status(&self) -> StatusCode {
        self.status.unwrap_or(if self.is_redirect() {
            StatusCode::FOUND
        } else {
            StatusCode::OK
        })
    }

    /// Builds the wire response. `transformer` encodes json payloads; `echo`
    /// names it in [`TRANSFORMER_HEADER`] when it is not the registry default.
    pub fn into_response(self, transformer: &dyn Transformer, echo: bool) -> Result<Response> {
        let status = self.status();
        let Self { payload, status_text, mut headers, .. } = self;

        let body = match payload {
            Payload::Json(value) => {
                default_content_type(&mut headers, ContentType::Json.as_str())?;
                if echo {
                    headers.insert(TRANSFORMER_HEADER, HeaderValue::from_str(transformer.name())?);
                }
                Bytes::from(transformer.stringify(&value)?)
            }
            Payload::Text(text) => {
                default_content_type(&mut headers, ContentType::Text.as_str())?;
                Bytes::from(text)
            }
            Payload::Form(form) => {
                let (content_type, body) = form.encode();
                default_content_type(&mut headers, &content_type)?;
                body
            }
            Payload::Body(bytes) => {
                default_content_type(&mut headers, ContentType::OctetStream.as_str())?;
                bytes
            }
            Payload::Redirect(location) => {
                headers.insert(LOCATION, HeaderValue::from_str(&location)?);
                Bytes::new()
            }
        };

        let mut res = Response::new(status, headers, body);
        res.status_text = status_text;
        Ok(res)
    }
}

fn default_content_type(headers: &mut HeaderMap, value: &str) -> Result<()> {
    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(value)?);
    }
    Ok(())
}

/// What a middleware or handler returns.
#[derive(Clone, Debug, Default)]
pub enum Reply {
    /// No value: keep the current response.
    #[default]
    Empty,
    Output(Output),
    Raw(Response),
}

impl Reply {
    pub fn is_empty(&self) -> bool { matches!(self, Self::Empty) }

    /// Normalizes into a response. An empty reply becomes an empty `204`.
    pub fn into_response(self, transformer: &dyn Transformer, echo: bool) -> Result<Response> {
        match self {
            Self::Empty => Ok(Response::default()),
            Self::Raw(res) => Ok(res),
            Self::Output(out) => out.into_response(transformer, echo),
        }
    }
}

impl From<Output> for Reply {
    fn from(out: Output) -> Self { Self::Output(out) }
}

impl From<Response> for Reply {
    fn from(res: Response) -> Self { Self::Raw(res) }
}

impl From<()> for Reply {
    fn from(_: ()) -> Self { Self::Empty }
}

impl<T: Into<Reply>> From<Option<T>> for Reply {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Empty, Into::into)
    }
}
