//! Route declarations and the functions that combine them before an [`App`](crate::App)
//! is compiled.
//!
//! A [`Route`] binds a method and a path pattern to a handler, optionally with its own
//! config, effects and middleware. Route lists are plain `Vec<Route>` values, so they can
//! be built programmatically, concatenated, [composed](configure_routes) with shared
//! [`Defaults`] and [mounted](mount_at) under a prefix before a single `App::new` call.
//!
//! | Pattern              | Example match              | Captured params                 |
//! |----------------------|----------------------------|---------------------------------|
//! | `/users`             | `/users`                   | *(none)*                        |
//! | `/users/:id`         | `/users/42`                | `id → "42"`                     |
//! | `/files/*`           | `/files/docs/readme.txt`   | `wildcard → "docs/readme.txt"`  |
//!
//! Routes are matched in declaration order; the first route whose method and pattern both
//! match the incoming request wins.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::config::Config;
use crate::context::Context;
use crate::effects::{EffectBuilder, EffectMap};
use crate::error::{ConfigError, Error};
use crate::http::{Method, Response};
use crate::middleware::MiddlewareHandler;

pub mod pattern;

use pattern::{MatchOptions, has_captures};

/// What a handler resolves to.
///
/// `Ok(Some(response))` hands a response to the HTTP layer. `Ok(None)` means the handler
/// either wrote the response itself through [`ResponseWriter`](crate::ResponseWriter) or
/// declined the request, in which case dispatch moves on to the next route.
pub type HandlerResult = Result<Option<Response>, Error>;

/// Type-erased, heap-allocated async handler that processes a [`Context`].
///
/// Handlers are stored behind `Arc<dyn Fn(…)>` so they can be cloned and shared across
/// threads without copying the underlying closure. Build one with [`handler`] or let the
/// [`Route`] constructors do it.
pub type Handler =
    Arc<dyn Fn(Context) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static>;

/// Erases an async handler function into a [`Handler`].
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::router::handler;
/// use rttp_router::{Response, StatusCode};
///
/// let ping = handler(|_ctx: Context| async { Ok(Some(Response::text(StatusCode::Ok, "pong"))) });
/// ```
pub fn handler<H, F>(f: H) -> Handler
where
    H: Fn(Context) -> F + Send + Sync + 'static,
    F: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: Context| Box::pin(f(ctx)) as BoxFuture<'static, HandlerResult>)
}

/// The method a route answers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteMethod {
    /// Declared as `all` (any case); matches every request method.
    All,
    Only(Method),
}

impl RouteMethod {
    /// Parses a declared method name. Names are case-insensitive.
    ///
    /// # Errors
    ///
    /// - [`ConfigError::EmptyMethod`] — `method` is empty.
    /// - [`ConfigError::InvalidMethod`] — `method` is not an HTTP token.
    pub fn parse(method: &str, pattern: &str) -> Result<Self, ConfigError> {
        if method.is_empty() {
            return Err(ConfigError::EmptyMethod {
                pattern: pattern.to_owned(),
            });
        }
        if !method.bytes().all(is_token_byte) {
            return Err(ConfigError::InvalidMethod {
                method: method.to_owned(),
                pattern: pattern.to_owned(),
            });
        }
        if method.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        let Ok(method) = Method::from_str(&method.to_ascii_uppercase());
        Ok(Self::Only(method))
    }

    /// Returns `true` if a request with `method` should be tried against this route.
    pub fn matches(&self, method: &Method) -> bool {
        match self {
            Self::All => true,
            Self::Only(expected) => method.eq_ignore_case(expected.as_str()),
        }
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("ALL"),
            Self::Only(method) => fmt::Display::fmt(method, f),
        }
    }
}

// RFC 9110 token characters.
fn is_token_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b)
}

/// A route declaration.
///
/// The method is kept as declared and validated by [`configure_routes`] and
/// [`App::new`](crate::App::new).
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::router::Route;
/// use rttp_router::{Config, Response, StatusCode};
///
/// let route = Route::get("/users/:id", |ctx: Context| async move {
///     let id = ctx.params().get("id").unwrap_or_default().to_owned();
///     Ok(Some(Response::text(StatusCode::Ok, id)))
/// })
/// .config_value("cacheSeconds", 60);
///
/// assert_eq!(route.method(), "get");
/// assert_eq!(route.pattern(), "/users/:id");
/// ```
#[derive(Clone)]
pub struct Route {
    method: String,
    pattern: String,
    handler: Handler,
    config: Config,
    effects: EffectMap,
    middlewares: Vec<MiddlewareHandler>,
}

impl Route {
    /// Declares a route from a method name, a path pattern and an async handler.
    ///
    /// Nothing is validated here; bad methods or patterns are reported by
    /// [`configure_routes`] or [`App::new`](crate::App::new).
    ///
    /// # Arguments
    ///
    /// * `method` - An HTTP method name in any case, or `"all"` for every method
    /// * `pattern` - A path pattern such as `/users/:id` or `/files/*`
    /// * `f` - An async function receiving the request [`Context`]
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_router::context::Context;
    /// use rttp_router::router::Route;
    ///
    /// let purge = Route::new("PURGE", "/cache/*", |_ctx: Context| async { Ok(None) });
    /// assert_eq!(purge.method(), "PURGE");
    /// ```
    pub fn new<H, F>(method: impl Into<String>, pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::with_handler(method, pattern, handler(f))
    }

    /// Declares a route around an already erased [`Handler`].
    pub fn with_handler(
        method: impl Into<String>,
        pattern: impl Into<String>,
        handler: Handler,
    ) -> Self {
        Self {
            method: method.into(),
            pattern: pattern.into(),
            handler,
            config: Config::new(),
            effects: EffectMap::new(),
            middlewares: Vec::new(),
        }
    }

    /// Declares a `GET` route.
    pub fn get<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("get", pattern, f)
    }

    /// Declares a `POST` route.
    pub fn post<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("post", pattern, f)
    }

    /// Declares a `PUT` route.
    pub fn put<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("put", pattern, f)
    }

    /// Declares a `PATCH` route.
    pub fn patch<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("patch", pattern, f)
    }

    /// Declares a `DELETE` route.
    pub fn delete<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("delete", pattern, f)
    }

    /// Declares a `HEAD` route.
    pub fn head<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("head", pattern, f)
    }

    /// Declares a `OPTIONS` route.
    pub fn options<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("options", pattern, f)
    }

    /// A route answering every method.
    pub fn all<H, F>(pattern: impl Into<String>, f: H) -> Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::new("all", pattern, f)
    }

    /// Merges `config` over the route's config; keys in `config` win.
    #[must_use]
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = self.config.merged(&config);
        self
    }

    /// Sets a single route-level config value.
    #[must_use]
    pub fn config_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config = self.config.with(key, value);
        self
    }

    /// Declares an effect, replacing any effect of the same name.
    #[must_use]
    pub fn with_effect(mut self, name: impl Into<String>, builder: Arc<dyn EffectBuilder>) -> Self {
        self.effects.insert(name.into(), builder);
        self
    }

    /// Appends a middleware; it runs inside any middleware added before it.
    #[must_use]
    pub fn with_middleware(mut self, middleware: MiddlewareHandler) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// The method as declared, e.g. `"get"` or `"all"`.
    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn effects(&self) -> &EffectMap {
        &self.effects
    }

    /// Names of the declared effects, sorted.
    pub fn effect_names(&self) -> impl Iterator<Item = &str> {
        self.effects.keys().map(String::as_str)
    }

    /// Middleware in declaration order, outermost first.
    pub fn middlewares(&self) -> &[MiddlewareHandler] {
        &self.middlewares
    }

    /// The erased handler; clones share the same closure.
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    // Validation shared by `configure_routes` and `App::new`.
    pub(crate) fn validate(&self) -> Result<RouteMethod, ConfigError> {
        let method = RouteMethod::parse(&self.method, &self.pattern)?;
        pattern::compile(&self.pattern, MatchOptions::default())?;
        if self.effects.keys().any(String::is_empty) {
            return Err(ConfigError::EmptyEffectName {
                pattern: self.pattern.clone(),
            });
        }
        Ok(method)
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("config", &self.config)
            .field("effects", &self.effect_names().collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .finish_non_exhaustive()
    }
}

/// Config, effects and middleware shared by a group of routes.
#[derive(Clone, Default)]
pub struct Defaults {
    config: Config,
    effects: EffectMap,
    middlewares: Vec<MiddlewareHandler>,
}

impl Defaults {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = self.config.merged(&config);
        self
    }

    #[must_use]
    pub fn effect(mut self, name: impl Into<String>, builder: Arc<dyn EffectBuilder>) -> Self {
        self.effects.insert(name.into(), builder);
        self
    }

    #[must_use]
    pub fn middleware(mut self, middleware: MiddlewareHandler) -> Self {
        self.middlewares.push(middleware);
        self
    }
}

impl fmt::Debug for Defaults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Defaults")
            .field("config", &self.config)
            .field("effects", &self.effects.keys().collect::<Vec<_>>())
            .field("middlewares", &self.middlewares.len())
            .finish()
    }
}

/// Flattens `routes` with shared `defaults` into self-contained routes.
///
/// For every route, in order:
///
/// - config is `defaults.config` shallow-merged with the route's config (route keys win),
/// - effects are merged the same way, by name,
/// - middleware is the default list followed by the route's own.
///
/// Nothing else changes and the inputs are not mutated.
///
/// # Errors
///
/// Fails on the first route with an empty or malformed method, a malformed pattern or an
/// effect with an empty name.
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::router::{Defaults, Route, configure_routes};
/// use rttp_router::Config;
///
/// let defaults = Defaults::new().config(Config::new().with("a", 1).with("b", 1));
/// let routes = configure_routes(
///     vec![Route::get("/", |_ctx: Context| async { Ok(None) }).config_value("b", 2)],
///     &defaults,
/// )
/// .unwrap();
///
/// assert_eq!(routes[0].config().get::<i64>("a").unwrap(), 1);
/// assert_eq!(routes[0].config().get::<i64>("b").unwrap(), 2);
/// ```
pub fn configure_routes(
    routes: impl IntoIterator<Item = Route>,
    defaults: &Defaults,
) -> Result<Vec<Route>, ConfigError> {
    routes
        .into_iter()
        .map(|route| -> Result<Route, ConfigError> {
            route.validate()?;
            if defaults.effects.keys().any(String::is_empty) {
                return Err(ConfigError::EmptyEffectName {
                    pattern: route.pattern,
                });
            }

            let Route {
                method,
                pattern,
                handler,
                config,
                effects: route_effects,
                middlewares: route_middlewares,
            } = route;

            let mut effects = defaults.effects.clone();
            effects.extend(route_effects);
            let mut middlewares = defaults.middlewares.clone();
            middlewares.extend(route_middlewares);

            Ok(Route {
                method,
                pattern,
                handler,
                config: defaults.config.merged(&config),
                effects,
                middlewares,
            })
        })
        .collect()
}

/// Moves `routes` under `prefix` by prepending it to every pattern.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidPrefix`] unless `prefix` starts with `/`, does not end with
/// `/` and contains no `:name` or `*` segment.
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::router::{Route, mount_at};
///
/// let admin = mount_at("/admin", vec![Route::get("/users", |_ctx: Context| async { Ok(None) })])
///     .unwrap();
/// assert_eq!(admin[0].pattern(), "/admin/users");
///
/// assert!(mount_at("/teams/:id", Vec::new()).is_err());
/// ```
pub fn mount_at(
    prefix: &str,
    routes: impl IntoIterator<Item = Route>,
) -> Result<Vec<Route>, ConfigError> {
    let invalid = |reason| ConfigError::InvalidPrefix {
        prefix: prefix.to_owned(),
        reason,
    };
    if !prefix.starts_with('/') {
        return Err(invalid("must start with `/`"));
    }
    if prefix.ends_with('/') {
        return Err(invalid("must not end with `/`"));
    }
    if has_captures(prefix) {
        return Err(invalid("must not contain `:name` or `*` segments"));
    }

    Ok(routes
        .into_iter()
        .map(|route| Route {
            pattern: format!("{prefix}{}", route.pattern),
            ..route
        })
        .collect())
}

/// Collects routes together with their shared defaults.
///
/// A thin builder over [`configure_routes`] and [`mount_at`].
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::router::{Route, Router};
/// use rttp_router::{App, Config, Response, StatusCode};
///
/// let mut router = Router::new();
/// router
///     .config(Config::new().with("greeting", "hello"))
///     .get("/hello", |ctx: Context| async move {
///         let greeting: String = ctx.config().get("greeting")?;
///         Ok(Some(Response::text(StatusCode::Ok, greeting)))
///     })
///     .mount("/api", vec![Route::get("/ping", |_ctx: Context| async { Ok(None) })])
///     .unwrap();
///
/// let routes = router.build().unwrap();
/// assert_eq!(routes.len(), 2);
/// let app = App::new(routes).unwrap();
/// ```
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    defaults: Defaults,
}

impl Router {
    /// Creates an empty router with no defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a route for `method` (`"all"` for any method).
    pub fn on<H, F>(&mut self, method: &str, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.route(Route::new(method, pattern, f))
    }

    /// Adds a `GET` route.
    pub fn get<H, F>(&mut self, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on("get", pattern, f)
    }

    /// Adds a `POST` route.
    pub fn post<H, F>(&mut self, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on("post", pattern, f)
    }

    /// Adds a `PUT` route.
    pub fn put<H, F>(&mut self, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on("put", pattern, f)
    }

    /// Adds a `PATCH` route.
    pub fn patch<H, F>(&mut self, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on("patch", pattern, f)
    }

    /// Adds a `DELETE` route.
    pub fn delete<H, F>(&mut self, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on("delete", pattern, f)
    }

    /// Adds a route answering every method.
    pub fn all<H, F>(&mut self, pattern: &str, f: H) -> &mut Self
    where
        H: Fn(Context) -> F + Send + Sync + 'static,
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.on("all", pattern, f)
    }

    /// Adds a fully declared route.
    pub fn route(&mut self, route: Route) -> &mut Self {
        self.routes.push(route);
        self
    }

    /// Appends `routes` in order, e.g. a ready-made set from [`apps`](crate::apps).
    pub fn routes(&mut self, routes: impl IntoIterator<Item = Route>) -> &mut Self {
        self.routes.extend(routes);
        self
    }

    /// Adds `routes` under `prefix`. See [`mount_at`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPrefix`] for an unusable prefix.
    pub fn mount(
        &mut self,
        prefix: &str,
        routes: impl IntoIterator<Item = Route>,
    ) -> Result<&mut Self, ConfigError> {
        let mounted = mount_at(prefix, routes)?;
        Ok(self.routes(mounted))
    }

    /// Merges `config` into the shared config; later calls win.
    pub fn config(&mut self, config: Config) -> &mut Self {
        self.defaults.config = self.defaults.config.merged(&config);
        self
    }

    /// Declares an effect for every route.
    pub fn effect(&mut self, name: impl Into<String>, builder: Arc<dyn EffectBuilder>) -> &mut Self {
        self.defaults.effects.insert(name.into(), builder);
        self
    }

    /// Adds a middleware for every route, inside any added before it.
    pub fn middleware(&mut self, middleware: MiddlewareHandler) -> &mut Self {
        self.defaults.middlewares.push(middleware);
        self
    }

    /// Return the number of routes registered in this router.
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Return `true` if no routes have been registered.
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolves every route against the shared defaults. See [`configure_routes`].
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn build(&self) -> Result<Vec<Route>, ConfigError> {
        configure_routes(self.routes.iter().cloned(), &self.defaults)
    }
}
