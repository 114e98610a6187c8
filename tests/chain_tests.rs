use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use tsu_rpc::{
    App, Method, Middleware, Output, Request, Response, Route, Router, handler, middleware,
    middleware::recover,
};

type Log = Arc<Mutex<Vec<String>>>;

fn get(uri: &str) -> Request {
    Request::new(http::Method::GET, uri.parse().unwrap(), HeaderMap::new(), Bytes::new())
}

fn recorder(log: &Log, name: &'static str) -> impl Middleware {
    let log = Arc::clone(log);
    middleware(move |c, next| {
        let log = Arc::clone(&log);
        Box::pin(async move {
            log.lock().unwrap().push(format!("{name}:before"));
            next.run(c).await?;
            log.lock().unwrap().push(format!("{name}:after"));
            Ok(().into())
        })
    })
}

#[tokio::test]
async fn steps_run_in_declaration_order_around_the_handler() {
    let log: Log = Arc::default();
    let handler_log = Arc::clone(&log);

    let route = Route::new(Method::Get, "/x", handler(move |c| {
        let log = Arc::clone(&handler_log);
        Box::pin(async move {
            log.lock().unwrap().push("handler".into());
            Ok(c.text("done").into())
        })
    }))
    .with(recorder(&log, "a"))
    .with(recorder(&log, "b"));

    let app = App::new(Router::new().with(recorder(&log, "app")).route(route));
    let res = app.fetch(get("/x")).await;

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&res.body()[..], b"done");
    assert_eq!(
        *log.lock().unwrap(),
        ["app:before", "a:before", "b:before", "handler", "b:after", "a:after", "app:after"],
    );
}

#[tokio::test]
async fn returning_early_skips_the_rest_of_the_chain() {
    let reached = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&reached);

    let route = Route::new(Method::Get, "/private", handler(move |_| {
        let flag = Arc::clone(&flag);
        Box::pin(async move {
            flag.store(true, Ordering::SeqCst);
            Ok(().into())
        })
    }))
    .with(middleware(|c, _next| Box::pin(async move {
        Ok(c.json(serde_json::json!({ "error": "unauthorized" }))
            .with_status(StatusCode::UNAUTHORIZED)
            .into())
    })));

    let res = App::new(Router::new().route(route)).fetch(get("/private")).await;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(!reached.load(Ordering::SeqCst));
}

#[tokio::test]
async fn handler_value_replaces_response_set_before_next() {
    let route = Route::new(Method::Get, "/x", handler(|c| Box::pin(async move {
        Ok(c.text("from handler").into())
    })))
    .with(middleware(|c, next| Box::pin(async move {
        c.set_res(Response::empty(StatusCode::INTERNAL_SERVER_ERROR));
        next.run(c).await?;
        Ok(().into())
    })));

    let res = App::new(Router::new().route(route)).fetch(get("/x")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&res.body()[..], b"from handler");
}

#[tokio::test]
async fn last_direct_write_wins() {
    let route = Route::new(Method::Get, "/x", handler(|c| Box::pin(async move {
        c.set_res(Response::builder().text("handler wrote this"));
        Ok(().into())
    })))
    .with(middleware(|c, next| Box::pin(async move {
        c.set_res(Response::empty(StatusCode::INTERNAL_SERVER_ERROR));
        next.run(c).await?;
        Ok(().into())
    })));

    let res = App::new(Router::new().route(route)).fetch(get("/x")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(&res.body()[..], b"handler wrote this");
}

#[tokio::test]
async fn value_returned_after_next_overrides_the_handler() {
    let route = Route::new(Method::Get, "/x", handler(|c| Box::pin(async move {
        Ok(c.text("inner").into())
    })))
    .with(middleware(|c, next| Box::pin(async move {
        next.run(c).await?;
        let inner = String::from_utf8_lossy(c.res().body()).into_owned();
        Ok(Output::text(format!("outer({inner})")).into())
    })));

    let res = App::new(Router::new().route(route)).fetch(get("/x")).await;
    assert_eq!(&res.body()[..], b"outer(inner)");
}

#[tokio::test]
async fn empty_chain_result_is_no_content() {
    let app = App::new(Router::new().on(Method::Get, "/x", handler(|_| Box::pin(async { Ok(().into()) }))));
    let res = app.fetch(get("/x")).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.body().is_empty());
}

#[tokio::test]
async fn uncaught_error_becomes_fixed_500() {
    let app = App::new(Router::new().on(Method::Get, "/boom", handler(|_| Box::pin(async {
        Err(anyhow::anyhow!("database password is hunter2"))
    }))));

    let res = app.fetch(get("/boom")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(&res.body()[..], b"Internal Server Error");
}

#[tokio::test]
async fn panic_becomes_fixed_500() {
    let app = App::new(Router::new().on(Method::Get, "/panic", handler(|_| Box::pin(async {
        let empty: Vec<u32> = Vec::new();
        Ok(Output::json(empty[3]).into())
    }))));

    let res = app.fetch(get("/panic")).await;
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn outer_step_can_catch_downstream_errors() {
    let failing = handler(|_| Box::pin(async { Err(anyhow::anyhow!("nope")) }));

    let caught = Route::new(Method::Get, "/manual", failing)
        .with(middleware(|c, next| Box::pin(async move {
            match next.run(c).await {
                Ok(()) => Ok(().into()),
                Err(e) => Ok(c.text(format!("caught: {e}")).with_status(StatusCode::BAD_GATEWAY).into()),
            }
        })));

    let recovered = Route::new(Method::Get, "/recover", handler(|_| Box::pin(async {
        Err(anyhow::anyhow!("down"))
    })))
    .with(recover(|e, _| {
        Output::json(serde_json::json!({ "error": e.to_string() }))
            .with_status(StatusCode::SERVICE_UNAVAILABLE)
            .into()
    }));

    let app = App::new(Router::new().route(caught).route(recovered));

    let res = app.fetch(get("/manual")).await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(&res.body()[..], b"caught: nope");

    let res = app.fetch(get("/recover")).await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(&res.body()[..], br#"{"error":"down"}"#);
}

#[tokio::test]
async fn unmatched_request_is_404() {
    let app = App::new(Router::new().on(Method::Post, "/only-post", handler(|_| Box::pin(async { Ok(().into()) }))));

    assert_eq!(app.fetch(get("/missing")).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.fetch(get("/only-post")).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn all_route_serves_any_method() {
    let app = App::new(
        Router::new()
            .on(Method::Get, "/thing", handler(|c| Box::pin(async move { Ok(c.text("get").into()) })))
            .on(Method::All, "/thing", handler(|c| Box::pin(async move { Ok(c.text("all").into()) }))),
    );

    assert_eq!(&app.fetch(get("/thing")).await.body()[..], b"get");

    let delete = Request::new(http::Method::DELETE, "/thing".parse().unwrap(), HeaderMap::new(), Bytes::new());
    assert_eq!(&app.fetch(delete).await.body()[..], b"all");
}

#[tokio::test]
async fn path_params_are_decoded() {
    let app = App::new(Router::new().on(Method::Get, "/users/:id", handler(|c| Box::pin(async move {
        let id = c.param("id").unwrap_or_default().to_owned();
        Ok(c.text(id).into())
    }))));

    let res = app.fetch(get("/users/a%20b")).await;
    assert_eq!(&res.body()[..], b"a b");
}
