//! Request logging middleware.

use futures_util::future::BoxFuture;
use tokio::time::Instant;

use super::{Middleware, Next};
use crate::context::Context;
use crate::effects::RequestLogger;
use crate::router::HandlerResult;

/// Logs each request's method, URL, outcome and duration once downstream has finished.
///
/// When the route resolves a [`RequestLogger`] under the effect name given to
/// [`LogRequests::with_effect`] (default `"logger"`), the record goes through it and so
/// honours its level and span; otherwise a plain `tracing::debug!` record is emitted.
///
/// # Examples
///
/// ```
/// use rttp_router::effects;
/// use rttp_router::middleware::{LogRequests, from_middleware};
/// use rttp_router::router::Router;
///
/// let mut router = Router::new();
/// router
///     .effect("logger", effects::logger())
///     .middleware(from_middleware(LogRequests::new()));
/// ```
#[derive(Debug, Clone)]
pub struct LogRequests {
    effect: String,
}

impl Default for LogRequests {
    fn default() -> Self {
        Self::new()
    }
}

impl LogRequests {
    /// Reads the request logger from the `logger` effect.
    pub fn new() -> Self {
        Self::with_effect("logger")
    }

    /// Uses the [`RequestLogger`] effect registered under `name`.
    pub fn with_effect(name: impl Into<String>) -> Self {
        Self {
            effect: name.into(),
        }
    }
}

impl Middleware for LogRequests {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, HandlerResult> {
        let logger = ctx.effects().shared::<RequestLogger>(&self.effect);
        Box::pin(async move {
            let start = Instant::now();
            let method = ctx.req().method().clone();
            let url = ctx.req().url().to_owned();
            let res = ctx.res().clone();

            let outcome = next.run(ctx).await;

            let duration = start.elapsed();
            let status = match &outcome {
                Ok(Some(response)) => response.status().as_u16().to_string(),
                Ok(None) if res.is_sent() => "sent".to_owned(),
                Ok(None) => "unhandled".to_owned(),
                Err(err) => err.status().as_u16().to_string(),
            };

            match logger {
                Some(logger) => {
                    logger.debug(&format!("{method} {url} - {status} ({duration:?})"));
                }
                None => {
                    tracing::debug!(%method, %url, %status, ?duration, "request handled");
                }
            }

            outcome
        })
    }
}
