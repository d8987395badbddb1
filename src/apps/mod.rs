//! Ready-made route sets applications append to their own.

use serde::Serialize;

use crate::context::Context;
use crate::error::Error;
use crate::http::{Response, StatusCode};
use crate::router::Route;

/// A catch-all route failing every request with `404 Not Found`.
///
/// Append it last; pair it with
/// [`CatchAndRenderErrors`](crate::middleware::CatchAndRenderErrors) to render the error.
///
/// # Examples
///
/// ```
/// use rttp_router::{App, apps};
///
/// let app = App::new(apps::not_found()).unwrap();
/// assert_eq!(app.len(), 1);
/// ```
pub fn not_found() -> Vec<Route> {
    vec![Route::all("/*", |_ctx: Context| async {
        Err(Error::http(StatusCode::NotFound, "Not Found"))
    })]
}

/// Build and deployment details served by [`version`].
///
/// Unknown fields default to `"n/a"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionInfo {
    pub name: String,
    pub version: String,
    pub commit: String,
    pub built_at: String,
    pub environment: String,
}

impl Default for VersionInfo {
    fn default() -> Self {
        let unknown = || "n/a".to_owned();
        Self {
            name: unknown(),
            version: unknown(),
            commit: unknown(),
            built_at: unknown(),
            environment: unknown(),
        }
    }
}

impl VersionInfo {
    /// Name and version of the crate being compiled, e.g.
    /// `VersionInfo::new(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))`.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn commit(mut self, commit: impl Into<String>) -> Self {
        self.commit = commit.into();
        self
    }

    #[must_use]
    pub fn built_at(mut self, built_at: impl Into<String>) -> Self {
        self.built_at = built_at.into();
        self
    }

    #[must_use]
    pub fn environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    /// The plain-text block served at `/version`, labels right-aligned.
    pub fn render_text(&self) -> String {
        format!(
            " project: {}\n version: v{}\ngit hash: {}\n   built: {}\n     tag: {}\n",
            self.name, self.version, self.commit, self.built_at, self.environment
        )
    }
}

/// `GET /version.json` and `GET /version`, describing the running build.
///
/// Both bodies are rendered once, here.
///
/// # Errors
///
/// Returns [`Error::Json`] if `info` cannot be serialized.
pub fn version(info: VersionInfo) -> Result<Vec<Route>, Error> {
    let json = Response::json(StatusCode::Ok, &info)?;
    let text = Response::text(StatusCode::Ok, info.render_text());

    Ok(vec![
        Route::get("/version.json", move |_ctx: Context| {
            let json = json.clone();
            async move { Ok(Some(json)) }
        }),
        Route::get("/version", move |_ctx: Context| {
            let text = text.clone();
            async move { Ok(Some(text)) }
        }),
    ])
}
