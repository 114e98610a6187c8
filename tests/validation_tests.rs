use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, HeaderValue, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tsu_rpc::{
    App, FormData, Issue, Method, Request, Route, Router, Schemas, Source, handler, schema_fn, typed,
};

#[derive(Deserialize, Serialize)]
struct NewUser {
    name: String,
}

#[derive(Deserialize, Serialize)]
struct Paging {
    page: String,
}

fn post_json(uri: &str, body: &str) -> Request {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Request::new(http::Method::POST, uri.parse().unwrap(), headers, Bytes::from(body.to_owned()))
}

fn echo_input() -> impl tsu_rpc::Handler {
    handler(|c| Box::pin(async move {
        let body = json!({
            "query": c.valid(Source::Query).cloned(),
            "json": c.valid(Source::Json).cloned(),
        });
        Ok(c.json(body).into())
    }))
}

#[tokio::test]
async fn invalid_json_is_a_400_with_issues() {
    let route = Route::new(Method::Post, "/users", echo_input())
        .validate(Schemas::new().json(typed::<NewUser>()));
    let app = App::new(Router::new().route(route));

    let res = app.fetch(post_json("/users", "{}")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["error"], "Invalid input");
    let issues: Vec<Issue> = serde_json::from_value(body["issues"].clone()).unwrap();
    assert_eq!(issues, vec![Issue::new("missing field `name`").at(["json", "name"])]);
}

#[tokio::test]
async fn issue_path_names_the_offending_field() {
    let route = Route::new(Method::Post, "/users", echo_input())
        .validate(Schemas::new().json(typed::<NewUser>()));
    let app = App::new(Router::new().route(route));

    let res = app.fetch(post_json("/users", r#"{"name":5}"#)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["issues"][0]["path"], json!(["json", "name"]));
    assert_eq!(body["issues"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn missing_body_reports_required() {
    let route = Route::new(Method::Post, "/users", echo_input())
        .validate(Schemas::new().json(typed::<NewUser>()));
    let app = App::new(Router::new().route(route));

    let req = Request::new(http::Method::POST, "/users".parse().unwrap(), HeaderMap::new(), Bytes::new());
    let res = app.fetch(req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["issues"][0]["message"], "Required");
    assert_eq!(body["issues"][0]["path"], json!(["json"]));
}

#[tokio::test]
async fn app_and_route_validation_merge_into_one_input_bag() {
    let route = Route::new(Method::Post, "/users", echo_input())
        .validate(Schemas::new().json(typed::<NewUser>()));
    let app = App::new(
        Router::new()
            .validate(Schemas::new().query(typed::<Paging>()))
            .route(route),
    );

    let res = app.fetch(post_json("/users?page=2", r#"{"name":"alice"}"#)).await;
    assert_eq!(res.status(), StatusCode::OK);

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body, json!({ "query": { "page": "2" }, "json": { "name": "alice" } }));
}

#[tokio::test]
async fn handler_is_not_reached_when_an_outer_validator_fails() {
    let route = Route::new(Method::Post, "/users", echo_input())
        .validate(Schemas::new().json(typed::<NewUser>()));
    let app = App::new(
        Router::new()
            .validate(Schemas::new().query(typed::<Paging>()))
            .route(route),
    );

    let res = app.fetch(post_json("/users", r#"{"name":"alice"}"#)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    assert_eq!(body["issues"][0]["path"][0], "query");
}

#[tokio::test]
async fn issues_from_every_source_are_reported_together() {
    let numeric_id = schema_fn(|value| {
        let numeric = value
            .as_ref()
            .and_then(|v| v["id"].as_str())
            .is_some_and(|id| id.parse::<u32>().is_ok());
        if numeric {
            Ok(value.unwrap_or_default())
        } else {
            Err(vec![Issue::new("must be a number").at(["id"])])
        }
    });
    let route = Route::new(Method::Post, "/users/:id", echo_input())
        .validate(Schemas::new().params(numeric_id).json(typed::<NewUser>()));
    let app = App::new(Router::new().route(route));

    let res = app.fetch(post_json("/users/abc", "{}")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let body: Value = serde_json::from_slice(res.body()).unwrap();
    let issues: Vec<Issue> = serde_json::from_value(body["issues"].clone()).unwrap();
    let heads: Vec<&str> = issues.iter().filter_map(|i| i.path.first().map(String::as_str)).collect();
    assert!(heads.contains(&"params"));
    assert!(heads.contains(&"json"));
    assert!(issues.iter().any(|i| i.path == ["params", "id"]));
}

#[tokio::test]
async fn form_bodies_validate_as_field_maps() {
    let route = Route::new(Method::Post, "/signup", handler(|c| Box::pin(async move {
        let user: NewUser = c.valid_as(Source::Form)?;
        Ok(c.text(user.name).into())
    })))
    .validate(Schemas::new().form(typed::<NewUser>()));
    let app = App::new(Router::new().route(route));

    let (content_type, body) = FormData::new().append("name", "bob").encode();
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_str(&content_type).unwrap());
    let req = Request::new(http::Method::POST, "/signup".parse().unwrap(), headers, body);

    let res = app.fetch(req).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&res.body()[..], b"bob");
}
