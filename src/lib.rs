//! # rttp-router
//!
//! Declarative request routing for async Rust: routes are plain values that can be
//! composed, mounted and compiled into an [`App`] that matches requests in declaration
//! order, instantiates per-request effects concurrently, runs middleware and calls the
//! handler.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rttp_router::context::Context;
//! use rttp_router::middleware::{CatchAndRenderErrors, from_middleware};
//! use rttp_router::router::{Route, Router};
//! use rttp_router::{App, Response, Server, StatusCode, apps, effects};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut router = Router::new();
//!     router
//!         .effect("logger", effects::logger())
//!         .middleware(from_middleware(CatchAndRenderErrors::new()))
//!         .get("/hello/:name", |ctx: Context| async move {
//!             let name = ctx.params().get("name").unwrap_or("world");
//!             Ok(Some(Response::text(StatusCode::Ok, format!("Hello, {name}!"))))
//!         })
//!         .routes(apps::not_found());
//!
//!     let app = App::new(router.build()?)?;
//!     Server::bind("127.0.0.1:8080").await?.serve(app).await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod apps;
pub mod config;
pub mod context;
pub mod effects;
pub mod error;
pub mod http;
pub mod middleware;
pub mod router;
pub mod server;

// ── Convenience re-exports ────────────────────────────────────────────────────
pub use app::App;
pub use config::{Config, ConfigSchema};
pub use context::{Context, RouteContext};
pub use error::{ConfigError, Error};
pub use http::{Headers, Method, Request, Response, ResponseState, ResponseWriter, StatusCode};
pub use router::pattern::MatchOptions;
pub use router::{Route, Router, configure_routes, mount_at};
pub use server::{Server, ServerError};
