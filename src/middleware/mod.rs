//! Middleware pipeline — handlers wrapped in declared order.
//!
//! Each route owns a [`Chain`]: its middleware list plus its handler, assembled once when
//! the [`App`](crate::App) is compiled. Dispatching a request walks the chain with a
//! [`Next`] cursor, so the first declared middleware is the outermost wrapper and the
//! handler runs last.
//!
//! ## Core types
//!
//! - [`Middleware`] — trait implemented by struct middleware.
//! - [`from_fn`] — turns an async closure into middleware.
//! - [`Next`] — cursor into the remaining chain; call [`Next::run`] to continue.
//! - [`MiddlewareHandler`] — type-erased, cheaply-cloneable middleware function.
//! - [`LogRequests`] and [`CatchAndRenderErrors`] — built-in middleware.
//!
//! Errors travel back out through the chain as `Err` values; a middleware may translate
//! them (as [`CatchAndRenderErrors`] does) or let them pass with `?`.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::context::Context;
use crate::router::{Handler, HandlerResult};

pub mod errors;
pub mod logger;

pub use errors::{CatchAndRenderErrors, ErrorPage};
pub use logger::LogRequests;

/// A type-erased, reference-counted middleware function.
pub type MiddlewareHandler =
    Arc<dyn Fn(Context, Next) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static>;

/// The core middleware trait.
///
/// Implementors receive the [`Context`] and a [`Next`] cursor. They may pass through
/// (`next.run(ctx).await`), short-circuit by returning without calling `next`, or inspect
/// and decorate what downstream returned.
pub trait Middleware: Send + Sync {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, HandlerResult>;
}

/// Converts a [`Middleware`] implementation into a [`MiddlewareHandler`].
///
/// # Examples
///
/// ```
/// use rttp_router::middleware::{LogRequests, from_middleware};
///
/// let handler = from_middleware(LogRequests::new());
/// ```
pub fn from_middleware<M>(middleware: M) -> MiddlewareHandler
where
    M: Middleware + 'static,
{
    let middleware = Arc::new(middleware);
    Arc::new(move |ctx: Context, next: Next| middleware.handle(ctx, next))
}

/// Wraps an async closure as middleware.
///
/// # Examples
///
/// ```
/// use rttp_router::context::Context;
/// use rttp_router::middleware::{self, Next};
///
/// let tag = middleware::from_fn(|ctx: Context, next: Next| async move {
///     ctx.res().set_header("X-Powered-By", "rttp")?;
///     next.run(ctx).await
/// });
/// ```
pub fn from_fn<F, Fut>(f: F) -> MiddlewareHandler
where
    F: Fn(Context, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    Arc::new(move |ctx: Context, next: Next| {
        Box::pin(f(ctx, next)) as BoxFuture<'static, HandlerResult>
    })
}

/// A route's middleware wrapped around its handler.
///
/// Built once per route; every request reuses it through an `Arc`.
pub struct Chain {
    middlewares: Vec<MiddlewareHandler>,
    handler: Handler,
}

impl Chain {
    /// Composes `middlewares` (outermost first) around `handler`.
    pub fn new(middlewares: Vec<MiddlewareHandler>, handler: Handler) -> Arc<Self> {
        Arc::new(Self {
            middlewares,
            handler,
        })
    }

    /// Runs the whole chain for one request.
    pub async fn call(self: &Arc<Self>, ctx: Context) -> HandlerResult {
        Next {
            chain: Arc::clone(self),
            index: 0,
        }
        .run(ctx)
        .await
    }
}

/// A cursor into the remaining middleware chain for a single request.
///
/// `Next` is consumed by [`run`](Self::run), so each middleware can continue the chain at
/// most once.
pub struct Next {
    chain: Arc<Chain>,
    // Tracks which middleware to invoke on the next `run` call.
    index: usize,
}

impl Next {
    /// Invokes the next middleware, or the handler once every middleware has run.
    pub async fn run(self, ctx: Context) -> HandlerResult {
        if let Some(middleware) = self.chain.middlewares.get(self.index).cloned() {
            let next = Next {
                chain: self.chain,
                index: self.index + 1,
            };
            middleware(ctx, next).await
        } else {
            let handler = Arc::clone(&self.chain.handler);
            handler(ctx).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::config::Config;
    use crate::context::{BodyCache, Params, Query, RouteContext, UrlContext};
    use crate::effects::Effects;
    use crate::http::{Method, Request, Response, ResponseWriter, StatusCode};
    use crate::router::handler;

    fn ctx() -> Context {
        let route = RouteContext::new(
            Arc::new(Request::new(Method::Get, "/")),
            ResponseWriter::new(),
            UrlContext {
                query: Query::default(),
                params: Params::new(),
                pathname: "/".into(),
            },
            Arc::new(Config::new()),
            Arc::new(BodyCache::default()),
        );
        Context::new(route, Effects::default())
    }

    fn recorder(log: &Arc<Mutex<Vec<String>>>, name: &'static str) -> MiddlewareHandler {
        let log = Arc::clone(log);
        from_fn(move |ctx: Context, next: Next| {
            let log = Arc::clone(&log);
            async move {
                log.lock().unwrap().push(format!("{name}:before"));
                let outcome = next.run(ctx).await;
                log.lock().unwrap().push(format!("{name}:after"));
                outcome
            }
        })
    }

    #[tokio::test]
    async fn first_declared_middleware_is_outermost() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handler_log = Arc::clone(&log);
        let chain = Chain::new(
            vec![recorder(&log, "outer"), recorder(&log, "inner")],
            handler(move |_ctx: Context| {
                let log = Arc::clone(&handler_log);
                async move {
                    log.lock().unwrap().push("handler".into());
                    Ok(Some(Response::new(StatusCode::Ok)))
                }
            }),
        );

        let outcome = chain.call(ctx()).await.unwrap();
        assert_eq!(outcome.unwrap().status(), StatusCode::Ok);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["outer:before", "inner:before", "handler", "inner:after", "outer:after"]
        );
    }

    #[tokio::test]
    async fn middleware_can_short_circuit() {
        let guard = from_fn(|_ctx: Context, _next: Next| async {
            Ok(Some(Response::new(StatusCode::Unauthorized)))
        });
        let chain = Chain::new(
            vec![guard],
            handler(|_ctx: Context| async {
                Err(crate::Error::other("handler must not run"))
            }),
        );

        let outcome = chain.call(ctx()).await.unwrap().unwrap();
        assert_eq!(outcome.status(), StatusCode::Unauthorized);
    }

    #[tokio::test]
    async fn errors_propagate_through_middleware() {
        let passthrough = from_fn(|ctx: Context, next: Next| async move { next.run(ctx).await });
        let chain = Chain::new(
            vec![passthrough],
            handler(|_ctx: Context| async {
                Err(crate::Error::http(StatusCode::Conflict, "taken"))
            }),
        );

        let err = chain.call(ctx()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::Conflict);
    }

    #[tokio::test]
    async fn chain_without_middleware_calls_handler() {
        let chain = Chain::new(vec![], handler(|_ctx: Context| async { Ok(None) }));
        assert!(chain.call(ctx()).await.unwrap().is_none());
    }
}
