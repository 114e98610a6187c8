//! # tsu-rpc
//!
//! A request-dispatch runtime for HTTP RPC services.
//!
//! Every route is a chain: middleware in declaration order, then one handler.
//! Each step gets the request's [`Context`] and, for middleware, a [`Next`]
//! that runs everything downstream. Handlers return a typed [`Output`]; the
//! runtime turns it into a [`Response`], encoding json with the transformer
//! the client asked for.
//!
//! The same route tree is reachable three ways:
//!
//! - over a socket with [`Server`]
//! - over the network with [`client::Client`]
//! - in process with [`client::Caller`], which runs the chain directly
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tsu_rpc::{App, Method, Route, Router, Schemas, Server, Source, handler, middleware, typed};
//!
//! #[derive(serde::Deserialize, serde::Serialize)]
//! struct NewUser { name: String }
//!
//! #[tokio::main]
//! async fn main() -> tsu_rpc::Result<()> {
//!     let router = Router::new()
//!         .with(middleware::trace())
//!         .on(Method::Get, "/users/:id", handler(|c| Box::pin(async move {
//!             let id = c.param("id").unwrap_or_default().to_owned();
//!             Ok(c.json(serde_json::json!({ "id": id })).into())
//!         })))
//!         .route(
//!             Route::new(Method::Post, "/users", handler(|c| Box::pin(async move {
//!                 let user: NewUser = c.valid_as(Source::Json)?;
//!                 Ok(c.json(serde_json::json!({ "name": user.name }))
//!                     .with_status(http::StatusCode::CREATED)
//!                     .into())
//!             })))
//!             .validate(Schemas::new().json(typed::<NewUser>())),
//!         );
//!
//!     Server::bind("0.0.0.0:3000")?.serve(App::new(router)).await
//! }
//! ```

mod app;
mod chain;
mod context;
mod error;
mod form;
mod handler;
mod method;
mod output;
mod request;
mod response;
mod router;
mod server;
mod transformer;
mod validation;

pub mod client;
pub mod middleware;

pub use app::{App, AppConfig};
pub use chain::{BoxedMiddleware, FnMiddleware, Middleware, Next, middleware};
pub use context::{Context, Source, Variables};
pub use error::{BoxError, Error, Result};
pub use form::{FilePart, FormData, FormValue};
pub use handler::{BoxFuture, BoxedHandler, FnHandler, Handler, StepResult, handler};
pub use method::Method;
pub use output::{Output, Payload, Reply};
pub use request::Request;
pub use response::{ContentType, Response, ResponseBuilder};
pub use router::{Route, Router};
pub use server::Server;
pub use transformer::{JsonTransformer, TRANSFORMER_HEADER, Transformer, Transformers};
pub use validation::{FnSchema, Issue, Schema, Schemas, Typed, Validator, schema_fn, typed, validator};
