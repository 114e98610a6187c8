//! Unified error type.

use crate::method::Method;

/// A boxed error from a pluggable collaborator (transport, schema, ...).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// The error type returned by tsu-rpc's fallible operations.
///
/// Application-level errors (404, 400 validation failures, etc.) are
/// expressed as [`Response`](crate::Response) values, not as `Error`s. This
/// type surfaces infrastructure and calling-side failures: a route that
/// cannot be registered, a path parameter the caller forgot, a transport that
/// could not deliver the request.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid bind address: {0}")]
    Addr(#[from] std::net::AddrParseError),

    #[error("invalid route `{path}`: {source}")]
    InvalidRoute {
        path: String,
        #[source]
        source: matchit::InsertError,
    },

    #[error("missing path parameter `{0}`")]
    MissingParam(String),

    #[error("no route matches {method} {path}")]
    RouteNotFound { method: Method, path: String },

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("multipart: {0}")]
    Multipart(#[from] multer::Error),

    #[error("http: {0}")]
    Http(#[from] http::Error),

    #[error("invalid uri: {0}")]
    Uri(#[from] http::uri::InvalidUri),

    #[error("invalid header value: {0}")]
    HeaderValue(#[from] http::header::InvalidHeaderValue),

    #[error("transport: {0}")]
    Transport(#[source] BoxError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
