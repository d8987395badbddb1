//! The `logger` effect: a per-request [`tracing`] span with a configured verbosity.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{Level, Span};

use super::{EffectBuilder, from_fn};
use crate::config::Config;
use crate::context::RouteContext;
use crate::error::ConfigError;

/// Config key read by [`logger`]. Accepts `trace`, `debug`, `info`, `warn` or `error`.
pub const LOG_LEVEL_KEY: &str = "logLevel";

/// A logger scoped to one request.
///
/// Records are emitted inside a span carrying the request method and URL, and are dropped
/// when they are more verbose than the configured level.
#[derive(Debug, Clone)]
pub struct RequestLogger {
    level: Level,
    span: Span,
}

impl RequestLogger {
    /// Creates a logger that emits at `level` and above inside `span`.
    pub fn new(level: Level, span: Span) -> Self {
        Self { level, span }
    }

    /// The most verbose level this logger emits.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The request span records are attached to.
    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Returns `true` if a record at `level` would be emitted.
    pub fn enabled(&self, level: Level) -> bool {
        level <= self.level
    }

    /// Logs `message` at `ERROR`.
    pub fn error(&self, message: &str) {
        if self.enabled(Level::ERROR) {
            self.span.in_scope(|| tracing::error!("{message}"));
        }
    }

    /// Logs `message` at `WARN` if enabled.
    pub fn warn(&self, message: &str) {
        if self.enabled(Level::WARN) {
            self.span.in_scope(|| tracing::warn!("{message}"));
        }
    }

    /// Logs `message` at `INFO` if enabled.
    pub fn info(&self, message: &str) {
        if self.enabled(Level::INFO) {
            self.span.in_scope(|| tracing::info!("{message}"));
        }
    }

    /// Logs `message` at `DEBUG` if enabled.
    pub fn debug(&self, message: &str) {
        if self.enabled(Level::DEBUG) {
            self.span.in_scope(|| tracing::debug!("{message}"));
        }
    }
}

/// Builds the `logger` effect.
///
/// The level comes from the `logLevel` config key (default `info`); an unknown level fails
/// at startup. Each request gets a fresh [`RequestLogger`].
pub fn logger() -> Arc<dyn EffectBuilder> {
    from_fn(|config: &Config| {
        let level = match config.get_opt::<String>(LOG_LEVEL_KEY)? {
            Some(name) => Level::from_str(&name).map_err(|e| ConfigError::InvalidValue {
                key: LOG_LEVEL_KEY.to_owned(),
                message: e.to_string(),
            })?,
            None => Level::INFO,
        };
        Ok(move |ctx: RouteContext| {
            let span = tracing::info_span!(
                "request",
                method = %ctx.req().method(),
                url = %ctx.req().url()
            );
            let logger = RequestLogger::new(level, span);
            async move { Ok(logger) }
        })
    })
}
