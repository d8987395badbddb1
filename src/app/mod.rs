//! The dispatcher: compiles routes once, then finds and runs the route for each request.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::config::Config;
use crate::context::{BodyCache, Context, Query, RouteContext, UrlContext};
use crate::effects::{self, Instantiators};
use crate::error::ConfigError;
use crate::http::{Request, ResponseWriter};
use crate::middleware::Chain;
use crate::router::pattern::{self, MatchOptions, PathMatcher};
use crate::router::{HandlerResult, Route, RouteMethod};

// Everything a route needs per request, prepared once by `App::new`.
struct CompiledRoute {
    method: RouteMethod,
    matcher: PathMatcher,
    config: Arc<Config>,
    instantiators: Instantiators,
    chain: Arc<Chain>,
}

/// A compiled, immutable route table.
///
/// Building an `App` compiles every pattern, configures every effect against its route's
/// config and wraps every handler in its middleware. None of that is repeated per request;
/// cloning an `App` shares the table.
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::http::{Method, Request, ResponseWriter};
/// use rttp_router::router::Route;
/// use rttp_router::{App, Response, StatusCode};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let app = App::new(vec![Route::get("/foos/:fooId", |ctx: Context| async move {
///     let id = ctx.params().get("fooId").unwrap_or_default().to_owned();
///     Ok(Some(Response::text(StatusCode::Ok, id)))
/// })])
/// .unwrap();
///
/// let response = app
///     .dispatch(Request::new(Method::Get, "/foos/7"), ResponseWriter::new())
///     .await
///     .unwrap()
///     .unwrap();
/// assert_eq!(response.content(), b"7");
/// # }
/// ```
#[derive(Clone)]
pub struct App {
    routes: Arc<[CompiledRoute]>,
}

impl App {
    /// Compiles `routes` with the default [`MatchOptions`]: case-insensitive, trailing
    /// slash optional, prefix matching.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a malformed route or an effect that fails to build.
    pub fn new(routes: impl IntoIterator<Item = Route>) -> Result<Self, ConfigError> {
        Self::with_options(routes, MatchOptions::default())
    }

    /// Compiles `routes`, matching patterns with `options`.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for a malformed route or an effect that fails to build.
    pub fn with_options(
        routes: impl IntoIterator<Item = Route>,
        options: MatchOptions,
    ) -> Result<Self, ConfigError> {
        let routes = routes
            .into_iter()
            .map(|route| -> Result<CompiledRoute, ConfigError> {
                let method = route.validate()?;
                let matcher = pattern::compile(route.pattern(), options)?;
                let instantiators = effects::configure(route.config(), route.effects())?;
                let chain = Chain::new(route.middlewares().to_vec(), Arc::clone(route.handler()));
                Ok(CompiledRoute {
                    method,
                    matcher,
                    config: Arc::new(route.config().clone()),
                    instantiators,
                    chain,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(routes = routes.len(), ?options, "app compiled");
        Ok(Self {
            routes: routes.into(),
        })
    }

    /// Number of compiled routes.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Dispatches one request.
    ///
    /// Routes are tried in declaration order. For the first route whose method and pattern
    /// match, the route's effects are instantiated and its middleware chain and handler run.
    /// The request counts as handled once the handler returns a response or the response
    /// has been sent through `res`; otherwise scanning continues with the next route.
    ///
    /// Returns `Ok(None)` when no route handled the request, leaving the not-found response
    /// to the caller.
    ///
    /// # Errors
    ///
    /// Any error from effect instantiation, middleware or the handler is returned
    /// unchanged. Once a route has failed, no further routes are tried.
    pub async fn dispatch(&self, req: Request, res: ResponseWriter) -> HandlerResult {
        let req = Arc::new(req);
        let pathname = req.path().to_owned();
        let body = Arc::new(BodyCache::new(req.body().clone()));
        let mut query: Option<Query> = None;

        for route in self.routes.iter() {
            if !route.method.matches(req.method()) {
                continue;
            }
            trace!(pattern = route.matcher.pattern(), %pathname, "trying route");
            let Some(params) = route.matcher.matches(&pathname) else {
                continue;
            };
            debug!(
                method = %req.method(),
                pattern = route.matcher.pattern(),
                %pathname,
                "route matched"
            );

            let url_query = query
                .get_or_insert_with(|| Query::parse(req.query_string().unwrap_or_default()))
                .clone();
            let route_ctx = RouteContext::new(
                Arc::clone(&req),
                res.clone(),
                UrlContext {
                    query: url_query,
                    params,
                    pathname: pathname.clone(),
                },
                Arc::clone(&route.config),
                Arc::clone(&body),
            );

            let effects = effects::resolve(&route.instantiators, &route_ctx).await?;
            let outcome = route.chain.call(Context::new(route_ctx, effects)).await?;
            if outcome.is_some() || res.is_sent() {
                return Ok(outcome);
            }
            trace!(pattern = route.matcher.pattern(), "route declined request");
        }

        debug!(method = %req.method(), %pathname, "no route handled request");
        Ok(None)
    }
}

impl fmt::Debug for App {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(
                self.routes
                    .iter()
                    .map(|route| format!("{} {}", route.method, route.matcher.pattern())),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::error::Error;
    use crate::http::{Method, Response, StatusCode};

    fn text(body: &'static str) -> Route {
        Route::get("/", move |_ctx: Context| async move {
            Ok(Some(Response::text(StatusCode::Ok, body)))
        })
    }

    async fn body_of(app: &App, method: Method, url: &str) -> Option<String> {
        app.dispatch(Request::new(method, url), ResponseWriter::new())
            .await
            .unwrap()
            .map(|response| String::from_utf8(response.content().to_vec()).unwrap())
    }

    #[tokio::test]
    async fn first_declared_route_wins() {
        let app = App::new(vec![text("first"), text("second")]).unwrap();
        assert_eq!(body_of(&app, Method::Get, "/").await.as_deref(), Some("first"));
    }

    #[tokio::test]
    async fn method_mismatch_skips_route() {
        let app = App::new(vec![
            Route::post("/", |_ctx: Context| async {
                Ok(Some(Response::text(StatusCode::Ok, "post")))
            }),
            text("get"),
        ])
        .unwrap();
        assert_eq!(body_of(&app, Method::Get, "/").await.as_deref(), Some("get"));
        assert_eq!(body_of(&app, Method::Post, "/").await.as_deref(), Some("post"));
        assert_eq!(body_of(&app, Method::Delete, "/").await, None);
    }

    #[tokio::test]
    async fn declining_route_lets_scan_continue() {
        let app = App::new(vec![
            Route::get("/", |_ctx: Context| async { Ok(None) }),
            text("fallback"),
        ])
        .unwrap();
        assert_eq!(body_of(&app, Method::Get, "/").await.as_deref(), Some("fallback"));
    }

    #[tokio::test]
    async fn sent_response_stops_scan() {
        let later = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&later);
        let app = App::new(vec![
            Route::get("/", |ctx: Context| async move {
                ctx.res().send(Response::text(StatusCode::Accepted, "manual"))?;
                Ok(None)
            }),
            Route::get("/", move |_ctx: Context| {
                seen.fetch_add(1, Ordering::SeqCst);
                async { Ok(None) }
            }),
        ])
        .unwrap();

        let res = ResponseWriter::new();
        let outcome = app
            .dispatch(Request::new(Method::Get, "/"), res.clone())
            .await
            .unwrap();
        assert!(outcome.is_none());
        assert!(res.is_sent());
        assert_eq!(res.take().unwrap().status(), StatusCode::Accepted);
        assert_eq!(later.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn handler_error_stops_scan() {
        let app = App::new(vec![
            Route::get("/", |_ctx: Context| async {
                Err(Error::http(StatusCode::Forbidden, "no"))
            }),
            text("unreachable"),
        ])
        .unwrap();
        let err = app
            .dispatch(Request::new(Method::Get, "/"), ResponseWriter::new())
            .await
            .unwrap_err();
        assert_eq!(err.status(), StatusCode::Forbidden);
    }

    #[tokio::test]
    async fn context_carries_url_and_config() {
        let app = App::new(vec![
            Route::get("/items/:id", |ctx: Context| async move {
                let summary = format!(
                    "{} {} {} {}",
                    ctx.pathname(),
                    ctx.params().get("id").unwrap_or_default(),
                    ctx.query().get("sort").unwrap_or_default(),
                    ctx.config().get::<String>("region")?,
                );
                Ok(Some(Response::text(StatusCode::Ok, summary)))
            })
            .config_value("region", "eu"),
        ])
        .unwrap();

        assert_eq!(
            body_of(&app, Method::Get, "/items/9?sort=desc").await.as_deref(),
            Some("/items/9 9 desc eu")
        );
    }

    #[test]
    fn compile_rejects_invalid_routes() {
        let route = Route::new("", "/", |_ctx: Context| async { Ok(None) });
        assert!(matches!(App::new(vec![route]), Err(ConfigError::EmptyMethod { .. })));
    }

    #[test]
    fn debug_lists_routes() {
        let app = App::new(vec![text("x")]).unwrap();
        assert_eq!(app.len(), 1);
        assert_eq!(format!("{app:?}"), r#"["GET /"]"#);
    }
}
