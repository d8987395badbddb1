//! Crate-wide error types.
//!
//! Two layers are distinguished:
//!
//! - [`ConfigError`] — problems detected while composing, mounting or compiling routes, or
//!   while loading configuration. These are meant to fail an application at startup.
//! - [`Error`] — everything that can go wrong while a request is being dispatched. Handlers,
//!   middleware and effects all return `Result<_, Error>`, and the dispatcher hands these back
//!   to its caller untouched.

use thiserror::Error;

use crate::http::StatusCode;

/// A boxed, thread-safe foreign error.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while building a route table or loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("route `{pattern}` has an empty method")]
    EmptyMethod { pattern: String },

    #[error("route `{pattern}` has an invalid method `{method}`")]
    InvalidMethod { method: String, pattern: String },

    #[error("invalid route pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("route pattern `{pattern}` captures `:{name}` more than once")]
    DuplicateParam { pattern: String, name: String },

    #[error("invalid mount prefix `{prefix}`: {reason}")]
    InvalidPrefix { prefix: String, reason: &'static str },

    #[error("route `{pattern}` declares an effect with an empty name")]
    EmptyEffectName { pattern: String },

    #[error("effect `{name}` could not be configured: {source}")]
    EffectBuild {
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("config must be a JSON object")]
    NotAnObject,

    #[error("config key `{key}` is required")]
    MissingKey { key: String },

    #[error("config key `{key}` is invalid: {message}")]
    InvalidValue { key: String, message: String },

    #[error("config is not valid: {}", errors.join("; "))]
    Invalid { errors: Vec<String> },

    #[error("failed to read config file `{path}`: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while a request is being handled.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// An error that already carries the HTTP status it should be rendered with.
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("effect `{name}` is not available in this context")]
    MissingEffect { name: String },

    #[error("response has already been sent")]
    AlreadySent,

    #[error("request body could not be decoded: {0}")]
    Body(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(BoxError),
}

impl Error {
    /// Creates an error that renders with the given status and message.
    ///
    /// # Examples
    ///
    /// ```
    /// use rttp_router::{Error, StatusCode};
    ///
    /// let err = Error::http(StatusCode::NotFound, "Not Found");
    /// assert_eq!(err.status(), StatusCode::NotFound);
    /// assert_eq!(err.to_string(), "Not Found");
    /// ```
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Wraps any foreign error.
    pub fn other(err: impl Into<BoxError>) -> Self {
        Self::Other(err.into())
    }

    /// The HTTP status this error should be rendered with.
    ///
    /// Only [`Error::Http`] carries its own status; everything else is a `500`.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Http { status, .. } => *status,
            _ => StatusCode::InternalServerError,
        }
    }
}
