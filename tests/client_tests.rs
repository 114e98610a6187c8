use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HeaderName};
use http::{HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tsu_rpc::client::{Client, ClientInput, RequestInit, Transport, transport_fn};
use tsu_rpc::{
    App, AppConfig, Error, Method, Route, Router, Schemas, Source, TRANSFORMER_HEADER, Transformer,
    handler, typed,
};

type Seen = Arc<Mutex<Vec<http::Request<Bytes>>>>;

fn mock(seen: &Seen, respond: fn() -> http::Response<Bytes>) -> impl Transport {
    let seen = Arc::clone(seen);
    transport_fn(move |req| {
        seen.lock().unwrap().push(req);
        Box::pin(async move { Ok(respond()) })
    })
}

fn json_response(status: StatusCode, body: &str) -> http::Response<Bytes> {
    http::Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .body(Bytes::from(body.to_owned()))
        .unwrap()
}

struct Envelope;

impl Transformer for Envelope {
    fn name(&self) -> &str { "envelope" }

    fn stringify(&self, value: &Value) -> tsu_rpc::Result<String> {
        Ok(serde_json::to_string(&json!({ "v": 1, "data": value }))?)
    }

    fn parse(&self, text: &str) -> tsu_rpc::Result<Value> {
        let mut wrapped: Value = serde_json::from_str(text)?;
        Ok(wrapped["data"].take())
    }
}

#[tokio::test]
async fn missing_param_fails_before_the_transport_is_called() {
    let seen = Seen::default();
    let api = Client::new("http://api.test")
        .transport(mock(&seen, || json_response(StatusCode::OK, "{}")))
        .build();

    let err = api.segment("users").segment(":id").get().call(ClientInput::new()).await.unwrap_err();

    assert!(matches!(err, Error::MissingParam(ref name) if name == "id"));
    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn request_carries_path_query_body_and_merged_headers() {
    let seen = Seen::default();
    let api = Client::new("http://api.test/")
        .transport(mock(&seen, || json_response(StatusCode::CREATED, r#"{"id":7}"#)))
        .header(HeaderName::from_static("x-tenant"), HeaderValue::from_static("default"))
        .header(HeaderName::from_static("x-trace"), HeaderValue::from_static("default"))
        .build();

    let input = ClientInput::new()
        .param("org", "acme inc")
        .query("dry_run", true)
        .json(json!({ "name": "alice" }));
    let init = RequestInit::new().header(HeaderName::from_static("x-tenant"), HeaderValue::from_static("call"));

    let res = api.segment("orgs/:org/users").post().call_with(input, init).await.unwrap();
    assert_eq!(res.status, StatusCode::CREATED);
    assert!(res.ok);
    assert_eq!(res.data, Some(json!({ "id": 7 })));

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    let req = &seen[0];
    assert_eq!(req.method(), &http::Method::POST);
    assert_eq!(req.uri().to_string(), "http://api.test/orgs/acme%20inc/users?dry_run=true");
    assert_eq!(req.headers().get("x-tenant").unwrap(), "call");
    assert_eq!(req.headers().get("x-trace").unwrap(), "default");
    assert_eq!(req.headers().get(CONTENT_TYPE).unwrap(), "application/json");
    assert_eq!(&req.body()[..], br#"{"name":"alice"}"#);
}

#[tokio::test]
async fn not_modified_has_neither_data_nor_error() {
    let seen = Seen::default();
    let api = Client::new("http://api.test")
        .transport(mock(&seen, || json_response(StatusCode::NOT_MODIFIED, r#"{"stale":true}"#)))
        .build();

    let res = api.segment("feed").get().call(ClientInput::new()).await.unwrap();
    assert_eq!(res.status, StatusCode::NOT_MODIFIED);
    assert!(!res.ok);
    assert_eq!(res.data, None);
    assert_eq!(res.error, None);
}

#[tokio::test]
async fn error_statuses_populate_error_only() {
    let seen = Seen::default();
    let api = Client::new("http://api.test")
        .transport(mock(&seen, || json_response(StatusCode::CONFLICT, r#"{"reason":"taken"}"#)))
        .build();

    let res = api.segment("users").post().call(ClientInput::new()).await.unwrap();
    assert!(!res.ok);
    assert_eq!(res.data, None);
    assert_eq!(res.error, Some(json!({ "reason": "taken" })));
    assert_eq!(res.res.text(), r#"{"reason":"taken"}"#);
}

#[tokio::test]
async fn echoed_transformer_decodes_the_body() {
    let seen = Seen::default();
    let api = Client::new("http://api.test")
        .transport(mock(&seen, || {
            http::Response::builder()
                .header(CONTENT_TYPE, "application/json")
                .header(TRANSFORMER_HEADER, "envelope")
                .body(Bytes::from_static(br#"{"v":1,"data":{"n":3}}"#))
                .unwrap()
        }))
        .register(Envelope)
        .transformer("envelope")
        .unwrap()
        .build();

    let res = api.segment("n").get().call(ClientInput::new()).await.unwrap();
    assert_eq!(res.data, Some(json!({ "n": 3 })));
    assert_eq!(res.res.json::<Value>().unwrap(), json!({ "n": 3 }));
    assert_eq!(seen.lock().unwrap()[0].headers().get(TRANSFORMER_HEADER).unwrap(), "envelope");
}

#[tokio::test]
async fn url_builds_without_sending() {
    let seen = Seen::default();
    let api = Client::new("http://api.test")
        .transport(mock(&seen, || json_response(StatusCode::OK, "{}")))
        .build();

    let url = api
        .segment("search")
        .get()
        .url(ClientInput::new().query("q", "rust").query("tag", json!(["a", "b"])).query("skip", Value::Null))
        .unwrap();
    assert_eq!(url, "http://api.test/search?q=rust&tag=a&tag=b");
    assert!(seen.lock().unwrap().is_empty());
}

#[derive(Debug, Deserialize, PartialEq, Serialize)]
struct User {
    name: String,
}

#[tokio::test]
async fn talks_to_an_app_through_the_transport_seam() {
    let router = Router::new()
        .route(
            Route::new(Method::Post, "/users", handler(|c| Box::pin(async move {
                let user: User = c.valid_as(Source::Json)?;
                Ok(c.json(json!({ "name": user.name, "id": 1 })).with_status(StatusCode::CREATED).into())
            })))
            .validate(Schemas::new().json(typed::<User>())),
        )
        .on(Method::Get, "/hello/:name", handler(|c| Box::pin(async move {
            let name = c.param("name").unwrap_or_default().to_owned();
            Ok(c.text(format!("hello {name}")).into())
        })));
    let app = Arc::new(App::with_config(router, AppConfig::new()).unwrap());
    let api = Client::new("http://in-process").transport(Arc::clone(&app)).build();

    let res = api
        .segment("users")
        .post()
        .call(ClientInput::new().json(json!({ "name": "alice" })))
        .await
        .unwrap();
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.data_as::<User>().unwrap(), Some(User { name: "alice".into() }));

    let res = api.segment("users").post().call(ClientInput::new().json(json!({}))).await.unwrap();
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    let error = res.error.unwrap();
    assert_eq!(error["issues"][0]["path"][0], "json");

    let res = api
        .segment("hello/:name")
        .get()
        .call(ClientInput::new().param("name", "bob"))
        .await
        .unwrap();
    assert_eq!(res.data, Some(json!("hello bob")));
}
