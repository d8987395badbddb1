//! Error rendering middleware.
//!
//! [`CatchAndRenderErrors`] turns an `Err` coming back through the chain into a response
//! whose content type follows the requested pathname: `.json` gets a JSON body, `.js` a
//! JavaScript comment and anything else an HTML page produced by an [`ErrorPage`].

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Serialize;
use tracing::error;

use super::{Middleware, Next};
use crate::context::Context;
use crate::error::Error;
use crate::http::{Response, StatusCode};
use crate::router::HandlerResult;

/// Renders the HTML body of an error response.
///
/// Implemented for any `Fn(StatusCode, &str) -> String`.
pub trait ErrorPage: Send + Sync {
    fn render(&self, status: StatusCode, message: &str) -> String;
}

impl<F> ErrorPage for F
where
    F: Fn(StatusCode, &str) -> String + Send + Sync,
{
    fn render(&self, status: StatusCode, message: &str) -> String {
        self(status, message)
    }
}

/// A bare HTML page showing the status code and message.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorPage;

impl ErrorPage for DefaultErrorPage {
    fn render(&self, status: StatusCode, message: &str) -> String {
        format!(
            "<!DOCTYPE html><html><head><title>{code} {reason}</title></head>\
             <body><h1>{code}</h1><p>{message}</p></body></html>",
            code = status.as_u16(),
            reason = status.canonical_reason(),
            message = escape_html(message),
        )
    }
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody<'a> {
    message: &'a str,
    status_code: u16,
}

/// Catches errors from downstream and renders them as responses.
///
/// [`Error::Http`] keeps its status and message. Any other error becomes
/// `500 Internal Server Error` with the canonical reason as message, so internal details
/// never reach the client; the original error is logged. Call
/// [`expose_messages`](Self::expose_messages) to render the error's own message instead.
/// If the response was already sent before the error surfaced, the error is only logged.
///
/// # Examples
///
/// ```
/// use rttp_router::http::StatusCode;
/// use rttp_router::middleware::{CatchAndRenderErrors, from_middleware};
///
/// let plain = from_middleware(CatchAndRenderErrors::new());
/// let branded = from_middleware(CatchAndRenderErrors::with_page(
///     |status: StatusCode, message: &str| format!("<h1>Oops ({status})</h1><p>{message}</p>"),
/// ));
/// ```
#[derive(Clone)]
pub struct CatchAndRenderErrors {
    page: Arc<dyn ErrorPage>,
    expose_messages: bool,
}

impl Default for CatchAndRenderErrors {
    fn default() -> Self {
        Self::new()
    }
}

impl CatchAndRenderErrors {
    /// Renders HTML errors with [`DefaultErrorPage`].
    pub fn new() -> Self {
        Self::with_page(DefaultErrorPage)
    }

    /// Renders HTML errors with a custom [`ErrorPage`].
    ///
    /// # Arguments
    ///
    /// * `page` - Any `ErrorPage`, including a `Fn(StatusCode, &str) -> String` closure
    pub fn with_page(page: impl ErrorPage + 'static) -> Self {
        Self {
            page: Arc::new(page),
            expose_messages: false,
        }
    }

    /// Renders the message of non-HTTP errors instead of the canonical reason.
    ///
    /// Useful in development; in production it can leak internals to clients.
    pub fn expose_messages(mut self) -> Self {
        self.expose_messages = true;
        self
    }

    /// Builds the response for `err` as requested at `pathname`.
    pub fn render(&self, pathname: &str, err: &Error) -> Result<Response, Error> {
        let status = err.status();
        let message = match err {
            Error::Http { message, .. } => message.clone(),
            other if self.expose_messages => other.to_string(),
            _ => status.canonical_reason().to_owned(),
        };
        let message = message.as_str();

        let response = if pathname.ends_with(".json") {
            Response::json(
                status,
                &ErrorBody {
                    message,
                    status_code: status.as_u16(),
                },
            )?
        } else if pathname.ends_with(".js") {
            Response::javascript(status, format!("// {message}"))
        } else {
            Response::html(status, self.page.render(status, message))
        };
        Ok(response)
    }
}

impl Middleware for CatchAndRenderErrors {
    fn handle(&self, ctx: Context, next: Next) -> BoxFuture<'static, HandlerResult> {
        let this = self.clone();
        Box::pin(async move {
            let pathname = ctx.pathname().to_owned();
            let res = ctx.res().clone();

            let err = match next.run(ctx).await {
                Ok(outcome) => return Ok(outcome),
                Err(err) => err,
            };

            let status = err.status();
            if status.is_server_error() {
                error!(%pathname, %status, error = %err, "request failed");
            } else {
                tracing::debug!(%pathname, %status, error = %err, "request rejected");
            }

            if res.is_sent() {
                return Ok(None);
            }
            this.render(&pathname, &err).map(Some)
        })
    }
}
