//! Minimal tsu-rpc example: validated JSON endpoints behind a tracing
//! middleware, mounted under `/api`.
//!
//! Run with:
//!   RUST_LOG=info cargo run --example basic
//!
//! Try:
//!   curl http://localhost:3000/api/users/42
//!   curl -X POST http://localhost:3000/api/users \
//!        -H 'content-type: application/json' \
//!        -d '{"name":"alice"}'
//!   curl -X POST http://localhost:3000/api/users -d '{}'      # 400 with issues
//!   curl -X DELETE http://localhost:3000/api/users/42
//!   curl http://localhost:3000/api/old-users                  # 302

use http::StatusCode;
use serde::{Deserialize, Serialize};
use tsu_rpc::{
    App, AppConfig, Context, Method, Output, Route, Router, Schemas, Server, Source, StepResult,
    Variables, handler, middleware, typed,
};

#[derive(Deserialize, Serialize)]
struct NewUser {
    name: String,
}

#[tokio::main]
async fn main() -> tsu_rpc::Result<()> {
    tracing_subscriber::fmt::init();

    let router = Router::new()
        .with(middleware::trace())
        .on(Method::Get, "/users/:id", handler(|c| Box::pin(get_user(c))))
        .route(
            Route::new(Method::Post, "/users", handler(|c| Box::pin(create_user(c))))
                .validate(Schemas::new().json(typed::<NewUser>())),
        )
        .on(Method::Delete, "/users/:id", handler(|_| Box::pin(async { Ok(().into()) })))
        .on(Method::All, "/old-users", handler(|c| Box::pin(async move {
            Ok(c.redirect("/api/users").into())
        })));

    let config = AppConfig::new()
        .prefix("/api")
        .vars(Variables::new().with("service", "users"));
    let app = App::with_config(router, config)?;

    Server::bind("0.0.0.0:3000")?.serve(app).await
}

// GET /api/users/:id
async fn get_user(c: &mut Context) -> StepResult {
    let id = c.param("id").unwrap_or_default().to_owned();
    let service = c.var::<&str>("service").copied().unwrap_or("unknown");
    Ok(c.json(serde_json::json!({ "id": id, "name": "alice", "service": service })).into())
}

// POST /api/users: the body has already been validated into a NewUser.
async fn create_user(c: &mut Context) -> StepResult {
    let user: NewUser = c.valid_as(Source::Json)?;
    Ok(Output::to_json(&user)?
        .with_status(StatusCode::CREATED)
        .with_header(http::header::LOCATION, http::HeaderValue::from_static("/api/users/99"))
        .into())
}
