//! A small app wiring routes, effects, middleware and the built-in route sets.
//!
//! ```text
//! RUST_LOG=debug cargo run --example hello_routes
//! curl localhost:8080/hello/ferris
//! curl localhost:8080/api/users/7
//! curl -X DELETE localhost:8080/api/users/7.json
//! curl localhost:8080/version
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use rttp_router::apps::VersionInfo;
use rttp_router::config::{ConfigSchema, ValueKind};
use rttp_router::context::Context;
use rttp_router::effects::{self, RequestLogger};
use rttp_router::middleware::{self, CatchAndRenderErrors, LogRequests, Next, from_middleware};
use rttp_router::router::{Route, Router};
use rttp_router::{App, Config, Error, Response, Server, StatusCode, apps};
use serde_json::json;
use tracing_subscriber::EnvFilter;

struct Counter(AtomicU64);

fn api_routes() -> Vec<Route> {
    vec![
        Route::get("/users/:id", |ctx: Context| async move {
            let id = ctx.params().get("id").unwrap_or_default();
            let visits = ctx.effects().require::<Arc<Counter>>("visits")?;
            let n = visits.0.fetch_add(1, Ordering::Relaxed) + 1;
            Ok(Some(Response::json(StatusCode::Ok, &json!({ "id": id, "visits": n }))?))
        }),
        Route::delete("/users/:id", |_ctx: Context| async {
            Err(Error::http(StatusCode::Forbidden, "users cannot be deleted"))
        }),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = ConfigSchema::new()
        .param("logLevel", ValueKind::String, Some(json!("info")))
        .param("greeting", ValueKind::String, Some(json!("Hello")))
        .load(Config::new())?;

    let counter = Arc::new(Counter(AtomicU64::new(0)));
    let powered_by = middleware::from_fn(|ctx: Context, next: Next| async move {
        ctx.res().set_header("X-Powered-By", "rttp-router")?;
        next.run(ctx).await
    });

    let mut router = Router::new();
    router
        .config(config)
        .effect("logger", effects::logger())
        .effect("visits", effects::shared(move |_config: &Config| Ok(Arc::clone(&counter))))
        .middleware(from_middleware(LogRequests::new()))
        .middleware(from_middleware(CatchAndRenderErrors::new()))
        .middleware(powered_by)
        .get("/hello/:name", |ctx: Context| async move {
            let greeting: String = ctx.config().get("greeting")?;
            let name = ctx.params().get("name").unwrap_or("world");
            if let Some(logger) = ctx.effects().get::<RequestLogger>("logger") {
                logger.info(&format!("greeting {name}"));
            }
            Ok(Some(Response::text(StatusCode::Ok, format!("{greeting}, {name}!"))))
        })
        .mount("/api", api_routes())?
        .routes(apps::version(VersionInfo::new(
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
        ))?)
        .routes(apps::not_found());

    let app = App::new(router.build()?)?;
    let server = Server::bind("127.0.0.1:8080").await?;
    println!("Listening on http://{}", server.local_addr());
    server.serve(app).await?;
    Ok(())
}
