//! Form payloads: the multipart / url-encoded field list shared by inbound
//! request parsing, `form` outputs and client request bodies.

use std::convert::Infallible;

use bytes::{BufMut, Bytes, BytesMut};
use serde_json::{Map, Value};

use crate::error::Result;

/// A single form field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FormValue {
    Text(String),
    File(FilePart),
}

/// A binary form field.
#[derive(Clone, Debug, PartialEq)]
pub struct FilePart {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

impl From<&str> for FormValue {
    fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for FormValue {
    fn from(s: String) -> Self { Self::Text(s) }
}

impl From<FilePart> for FormValue {
    fn from(f: FilePart) -> Self { Self::File(f) }
}

/// Ordered form fields. A name may repeat; order is preserved on the wire.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FormData {
    entries: Vec<(String, FormValue)>,
}

impl FormData {
    pub fn new() -> Self { Self::default() }

    /// Appends a field. Returns `self` for chaining.
    pub fn append(mut self, name: impl Into<String>, value: impl Into<FormValue>) -> Self {
        self.push(name, value);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, value: impl Into<FormValue>) {
        self.entries.push((name.into(), value.into()));
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&FormValue> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a FormValue> + 'a {
        self.entries.iter().filter(move |(k, _)| k == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FormValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    /// JSON view used for validation and client-side parsing.
    ///
    /// A name seen once maps to its value; a repeated name maps to an array
    /// of every value in order. Files become `{name, type, size}` objects.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.entries {
            let value = match value {
                FormValue::Text(s) => Value::String(s.clone()),
                FormValue::File(f) => serde_json::json!({
                    "name": f.filename,
                    "type": f.content_type,
                    "size": f.bytes.len(),
                }),
            };
            match map.get_mut(name) {
                None => {
                    map.insert(name.clone(), value);
                }
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
            }
        }
        Value::Object(map)
    }

    /// Multipart encoding. Returns the content type (with boundary) and body.
    pub fn encode(&self) -> (String, Bytes) {
        let boundary = format!("----tsu-rpc-{}", uuid::Uuid::new_v4().simple());
        let mut body = BytesMut::new();
        for (name, value) in &self.entries {
            body.put_slice(format!("--{boundary}\r\n").as_bytes());
            match value {
                FormValue::Text(s) => {
                    body.put_slice(
                        format!("content-disposition: form-data; name=\"{}\"\r\n\r\n", escape(name))
                            .as_bytes(),
                    );
                    body.put_slice(s.as_bytes());
                }
                FormValue::File(f) => {
                    let filename = f.filename.as_deref().unwrap_or("blob");
                    body.put_slice(
                        format!(
                            "content-disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                            escape(name),
                            escape(filename),
                        )
                        .as_bytes(),
                    );
                    let content_type = f.content_type.as_deref().unwrap_or("application/octet-stream");
                    body.put_slice(format!("content-type: {content_type}\r\n\r\n").as_bytes());
                    body.put_slice(&f.bytes);
                }
            }
            body.put_slice(b"\r\n");
        }
        body.put_slice(format!("--{boundary}--\r\n").as_bytes());
        (format!("multipart/form-data; boundary={boundary}"), body.freeze())
    }

    /// Parses a `multipart/form-data` or `application/x-www-form-urlencoded` body.
    /// Any other content type yields an empty form.
    pub async fn parse(content_type: Option<&str>, body: Bytes) -> Result<Self> {
        let Some(content_type) = content_type else {
            return Ok(Self::new());
        };
        if is_urlencoded(content_type) {
            return Ok(Self::from_urlencoded(&body));
        }
        if !content_type.trim_start().to_ascii_lowercase().starts_with("multipart/form-data") {
            return Ok(Self::new());
        }

        let boundary = multer::parse_boundary(content_type)?;
        let stream = futures::stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = multer::Multipart::new(stream, boundary);
        let mut form = Self::new();
        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            let value = match field.file_name() {
                Some(filename) => {
                    let filename = Some(filename.to_owned());
                    let content_type = field.content_type().map(ToString::to_string);
                    let bytes = field.bytes().await?;
                    FormValue::File(FilePart { filename, content_type, bytes })
                }
                None => FormValue::Text(field.text().await?),
            };
            form.push(name, value);
        }
        Ok(form)
    }

    pub fn from_urlencoded(body: &[u8]) -> Self {
        let entries = url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), FormValue::Text(v.into_owned())))
            .collect();
        Self { entries }
    }
}

impl<K: Into<String>, V: Into<FormValue>> FromIterator<(K, V)> for FormData {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let entries = iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self { entries }
    }
}

pub(crate) fn is_urlencoded(content_type: &str) -> bool {
    content_type
        .trim_start()
        .to_ascii_lowercase()
        .starts_with("application/x-www-form-urlencoded")
}

pub(crate) fn is_multipart(content_type: &str) -> bool {
    content_type.trim_start().to_ascii_lowercase().starts_with("multipart/form-data")
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
