//! Route descriptors and the radix-tree route table.
//!
//! One tree per method, plus one for [`Method::All`], consulted only when
//! the specific-method lookup misses. O(path-length) lookup. Templates use
//! `:name` segments; `req.param("name")` / `ctx.param("name")` reads them.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::chain::{BoxedMiddleware, Chain, Middleware};
use crate::context::Source;
use crate::error::{Error, Result};
use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;
use crate::validation::{Schemas, validator};

// ── Route ─────────────────────────────────────────────────────────────────────

/// A declared route: method, path template, ordered middleware, handler and
/// the input sources it validates.
///
/// ```rust
/// use tsu_rpc::{Method, Route, Schemas, handler, typed};
///
/// #[derive(serde::Serialize, serde::Deserialize)]
/// struct NewUser { name: String }
///
/// let route = Route::new(Method::Post, "/users", handler(|c| Box::pin(async move {
///     let user: NewUser = c.valid_as(tsu_rpc::Source::Json)?;
///     Ok(c.json(serde_json::json!({ "created": user.name })).into())
/// })))
/// .validate(Schemas::new().json(typed::<NewUser>()));
/// ```
#[derive(Clone)]
pub struct Route {
    method: Method,
    path: String,
    middleware: Vec<BoxedMiddleware>,
    handler: BoxedHandler,
    sources: Vec<Source>,
}

impl Route {
    pub fn new(method: Method, path: &str, handler: impl Handler) -> Self {
        Self {
            method,
            path: normalize_path(path),
            middleware: Vec::new(),
            handler: Arc::new(handler),
            sources: Vec::new(),
        }
    }

    /// Appends a middleware. Middleware runs in the order it is added.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// Appends a validation step for `schemas` at this point of the chain.
    pub fn validate(mut self, schemas: Schemas) -> Self {
        self.sources.extend(schemas.sources());
        self.with(validator(schemas))
    }

    pub fn method(&self) -> Method { self.method }
    pub fn path(&self) -> &str { &self.path }

    /// The input sources declared through [`validate`](Self::validate).
    pub fn sources(&self) -> &[Source] { &self.sources }

    pub fn middleware_len(&self) -> usize { self.middleware.len() }

    pub(crate) fn chain(&self, app_middleware: &[BoxedMiddleware]) -> Chain {
        let middleware = app_middleware.iter().chain(&self.middleware).cloned();
        Chain::new(middleware, Arc::clone(&self.handler))
    }

    fn prefixed(mut self, prefix: &str) -> Self {
        self.path = join_paths(prefix, &self.path);
        self
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("middleware", &self.middleware.len())
            .field("sources", &self.sources)
            .finish()
    }
}

// ── Router ────────────────────────────────────────────────────────────────────

/// The application route table.
///
/// Build it once at startup and hand it to [`App::new`](crate::App::new).
/// Registration methods return `self` so they chain naturally.
pub struct Router {
    routes: Vec<Arc<Route>>,
    middleware: Vec<BoxedMiddleware>,
    trees: HashMap<Method, MatchitRouter<usize>>,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new(), middleware: Vec::new(), trees: HashMap::new() }
    }

    /// Registers a bare handler for a method + path pair.
    ///
    /// # Panics
    ///
    /// Panics if the path conflicts with an already registered one for the
    /// same method. Use [`try_route`](Self::try_route) to handle that instead.
    pub fn on(self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.route(Route::new(method, path, handler))
    }

    /// Registers a fully described route.
    ///
    /// # Panics
    ///
    /// Same as [`on`](Self::on).
    pub fn route(self, route: Route) -> Self {
        let path = route.path.clone();
        self.try_route(route)
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"))
    }

    pub fn try_route(mut self, route: Route) -> Result<Self> {
        let index = self.routes.len();
        self.trees
            .entry(route.method)
            .or_default()
            .insert(to_matchit(&route.path), index)
            .map_err(|source| Error::InvalidRoute { path: route.path.clone(), source })?;
        self.routes.push(Arc::new(route));
        Ok(self)
    }

    /// App-level middleware: runs before every route's own middleware, in the
    /// order added, whenever it was added relative to the routes.
    pub fn with(mut self, middleware: impl Middleware) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    /// App-level validation, ahead of every route's own validators.
    pub fn validate(self, schemas: Schemas) -> Self {
        self.with(validator(schemas))
    }

    /// Re-roots every route under `prefix`.
    pub fn prefixed(self, prefix: &str) -> Result<Self> {
        let Self { routes, middleware, .. } = self;
        let mut router = Self { middleware, ..Self::new() };
        for route in routes {
            let route = Arc::unwrap_or_clone(route).prefixed(prefix);
            router = router.try_route(route)?;
        }
        Ok(router)
    }

    pub fn routes(&self) -> impl Iterator<Item = &Arc<Route>> {
        self.routes.iter()
    }

    pub(crate) fn app_middleware(&self) -> &[BoxedMiddleware] {
        &self.middleware
    }

    /// Matches a concrete request path. Falls back to the `ALL` tree when the
    /// method's own tree has no match. Parameters are percent-decoded.
    pub fn lookup(&self, method: Method, path: &str) -> Option<(&Arc<Route>, HashMap<String, String>)> {
        let (index, params) = self.lookup_index(method, path)?;
        Some((self.routes.get(index)?, params))
    }

    pub(crate) fn lookup_index(&self, method: Method, path: &str) -> Option<(usize, HashMap<String, String>)> {
        self.lookup_in(method, path)
            .or_else(|| self.lookup_in(Method::All, path))
    }

    fn lookup_in(&self, method: Method, path: &str) -> Option<(usize, HashMap<String, String>)> {
        let matched = self.trees.get(&method)?.at(path).ok()?;
        let params = matched.params.iter()
            .map(|(k, v)| {
                let v = urlencoding::decode(v).map_or_else(|_| v.to_owned(), |d| d.into_owned());
                (k.to_owned(), v)
            })
            .collect();
        Some((*matched.value, params))
    }

    /// Finds the route declared with exactly this template, falling back to
    /// the `ALL` route for the same template.
    pub fn find(&self, method: Method, template: &str) -> Option<&Arc<Route>> {
        self.routes.get(self.find_index(method, template)?)
    }

    pub(crate) fn find_index(&self, method: Method, template: &str) -> Option<usize> {
        let template = normalize_path(template);
        let exact = |m: Method| {
            self.routes.iter().position(|r| r.method == m && r.path == template)
        };
        exact(method).or_else(|| exact(Method::All))
    }

    pub(crate) fn route_at(&self, index: usize) -> Option<&Arc<Route>> {
        self.routes.get(index)
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

// ── path helpers ──────────────────────────────────────────────────────────────

/// Leading slash, no trailing slash (except the root itself).
pub(crate) fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    format!("/{trimmed}")
}

pub(crate) fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_matches('/');
    let path = path.trim_matches('/');
    match (prefix.is_empty(), path.is_empty()) {
        (true, _) => format!("/{path}"),
        (false, true) => format!("/{prefix}"),
        (false, false) => format!("/{prefix}/{path}"),
    }
}

/// `/users/:id` → `/users/{id}`; literal braces are escaped.
fn to_matchit(template: &str) -> String {
    template
        .split('/')
        .map(|segment| match segment.strip_prefix(':') {
            Some(name) => format!("{{{name}}}"),
            None => segment.replace('{', "{{").replace('}', "}}"),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler;

    fn noop() -> impl Handler {
        handler(|_| Box::pin(async { Ok(().into()) }))
    }

    #[test]
    fn templates_translate_to_matchit_syntax() {
        assert_eq!(to_matchit("/users/:id/posts/:post"), "/users/{id}/posts/{post}");
        assert_eq!(to_matchit("/a{b}"), "/a{{b}}");
    }

    #[test]
    fn lookup_extracts_decoded_params() {
        let router = Router::new().on(Method::Get, "/users/:id", noop());
        let (route, params) = router.lookup(Method::Get, "/users/a%20b").unwrap();
        assert_eq!(route.path(), "/users/:id");
        assert_eq!(params.get("id").map(String::as_str), Some("a b"));
        assert!(router.lookup(Method::Post, "/users/1").is_none());
    }

    #[test]
    fn all_is_a_fallback_only() {
        let router = Router::new()
            .on(Method::All, "/thing", noop())
            .on(Method::Get, "/thing", noop());

        let (get, _) = router.lookup(Method::Get, "/thing").unwrap();
        assert_eq!(get.method(), Method::Get);
        let (post, _) = router.lookup(Method::Post, "/thing").unwrap();
        assert_eq!(post.method(), Method::All);

        assert_eq!(router.find(Method::Delete, "/thing").unwrap().method(), Method::All);
        assert_eq!(router.find(Method::Get, "thing/").unwrap().method(), Method::Get);
        assert!(router.find(Method::Get, "/other").is_none());
    }

    #[test]
    fn conflicting_routes_are_rejected() {
        let err = Router::new()
            .on(Method::Get, "/users/:id", noop())
            .try_route(Route::new(Method::Get, "/users/:name", noop()))
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidRoute { .. }));
    }

    #[test]
    fn prefixing_moves_every_route() {
        let router = Router::new()
            .on(Method::Get, "/", noop())
            .on(Method::Get, "/users/:id", noop())
            .prefixed("/api/")
            .unwrap();

        assert!(router.lookup(Method::Get, "/api").is_some());
        assert!(router.lookup(Method::Get, "/api/users/7").is_some());
        assert!(router.lookup(Method::Get, "/users/7").is_none());
        assert!(router.find(Method::Get, "/api/users/:id").is_some());
    }
}
