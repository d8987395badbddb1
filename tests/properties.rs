//! Property tests for route selection, composition and mounting.

use std::sync::Arc;

use proptest::prelude::*;
use rttp_router::context::Context;
use rttp_router::middleware::{self, MiddlewareHandler, Next};
use rttp_router::router::pattern::{self, MatchOptions};
use rttp_router::router::{Defaults, Route, RouteMethod, configure_routes, mount_at};
use rttp_router::{App, Config, Method, Request, Response, ResponseWriter, StatusCode};

// Strategy: a route pattern built from a few static names, positional params and an
// optional trailing wildcard.
fn arb_pattern() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(
            prop_oneof![Just("a"), Just("b"), Just("users"), Just(":")],
            0..4,
        ),
        any::<bool>(),
    )
        .prop_map(|(segments, wildcard)| {
            let mut pattern = String::new();
            for (i, segment) in segments.into_iter().enumerate() {
                pattern.push('/');
                if segment == ":" {
                    pattern.push_str(&format!(":p{i}"));
                } else {
                    pattern.push_str(segment);
                }
            }
            if wildcard {
                pattern.push_str("/*");
            }
            if pattern.is_empty() {
                pattern.push('/');
            }
            pattern
        })
}

fn arb_path() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(
            prop_oneof![Just("a"), Just("b"), Just("users"), Just("42"), Just("A")],
            0..5,
        ),
        any::<bool>(),
    )
        .prop_map(|(segments, trailing_slash)| {
            let mut path = format!("/{}", segments.join("/"));
            if trailing_slash && !segments.is_empty() {
                path.push('/');
            }
            path
        })
}

fn arb_route_method() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("get"), Just("POST"), Just("all")]
}

fn arb_request_method() -> impl Strategy<Value = Method> {
    prop_oneof![Just(Method::Get), Just(Method::Post), Just(Method::Delete)]
}

fn arb_options() -> impl Strategy<Value = MatchOptions> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(sensitive, strict, end)| {
        MatchOptions {
            sensitive,
            strict,
            end,
        }
    })
}

fn indexed(method: &str, pattern: &str, index: usize) -> Route {
    Route::new(method, pattern, move |_ctx: Context| async move {
        Ok(Some(Response::text(StatusCode::Ok, index.to_string())))
    })
}

fn passthrough() -> MiddlewareHandler {
    middleware::from_fn(|ctx: Context, next: Next| async move { next.run(ctx).await })
}

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn assert_same_route(a: &Route, b: &Route) -> Result<(), TestCaseError> {
    prop_assert_eq!(a.method(), b.method());
    prop_assert_eq!(a.pattern(), b.pattern());
    prop_assert_eq!(a.config(), b.config());
    prop_assert!(Arc::ptr_eq(a.handler(), b.handler()));
    prop_assert_eq!(
        a.effect_names().collect::<Vec<_>>(),
        b.effect_names().collect::<Vec<_>>()
    );
    prop_assert_eq!(a.middlewares().len(), b.middlewares().len());
    for (x, y) in a.middlewares().iter().zip(b.middlewares()) {
        prop_assert!(Arc::ptr_eq(x, y));
    }
    Ok(())
}

proptest! {
    /// Property: the dispatcher picks the first route whose method and pattern match,
    /// exactly like a plain linear scan.
    #[test]
    fn dispatch_matches_linear_scan(
        declared in prop::collection::vec((arb_route_method(), arb_pattern()), 0..8),
        method in arb_request_method(),
        path in arb_path(),
        options in arb_options(),
    ) {
        let routes = declared
            .iter()
            .enumerate()
            .map(|(i, (m, p))| indexed(m, p, i));
        let app = App::with_options(routes, options).unwrap();

        let expected = declared.iter().position(|(m, p)| {
            RouteMethod::parse(m, p).unwrap().matches(&method)
                && pattern::compile(p, options).unwrap().matches(&path).is_some()
        });

        let outcome = block_on(app.dispatch(Request::new(method, path.as_str()), ResponseWriter::new()))
            .unwrap();
        let selected = outcome.map(|response| {
            String::from_utf8_lossy(response.content()).parse::<usize>().unwrap()
        });
        prop_assert_eq!(selected, expected);
    }

    /// Property: composing a concatenation equals concatenating the compositions.
    #[test]
    fn compose_is_order_preserving(
        first in prop::collection::vec((arb_route_method(), arb_pattern()), 0..5),
        second in prop::collection::vec((arb_route_method(), arb_pattern()), 0..5),
        shared_value in any::<i64>(),
    ) {
        let defaults = Defaults::new()
            .config(Config::new().with("shared", shared_value))
            .middleware(passthrough());
        let to_routes = |declared: &[(&str, String)], offset: usize| -> Vec<Route> {
            declared
                .iter()
                .enumerate()
                .map(|(i, (m, p))| indexed(m, p, offset + i).config_value("index", offset + i))
                .collect()
        };
        let a = to_routes(&first, 0);
        let b = to_routes(&second, first.len());

        let whole = configure_routes(a.iter().chain(&b).cloned(), &defaults).unwrap();
        let mut parts = configure_routes(a, &defaults).unwrap();
        parts.extend(configure_routes(b, &defaults).unwrap());

        prop_assert_eq!(whole.len(), parts.len());
        for (x, y) in whole.iter().zip(&parts) {
            assert_same_route(x, y)?;
        }
    }

    /// Property: mounting only prefixes the pattern.
    #[test]
    fn mount_is_prefix_only(
        prefix_segments in prop::collection::vec("[a-z]{1,6}", 1..3),
        declared in prop::collection::vec((arb_route_method(), arb_pattern()), 0..6),
    ) {
        let prefix = format!("/{}", prefix_segments.join("/"));
        let routes: Vec<Route> = declared
            .iter()
            .enumerate()
            .map(|(i, (m, p))| indexed(m, p, i))
            .collect();

        let mounted = mount_at(&prefix, routes.clone()).unwrap();

        prop_assert_eq!(mounted.len(), routes.len());
        for (after, before) in mounted.iter().zip(&routes) {
            prop_assert_eq!(after.pattern(), format!("{prefix}{}", before.pattern()));
            prop_assert_eq!(after.method(), before.method());
            prop_assert_eq!(after.config(), before.config());
            prop_assert!(Arc::ptr_eq(after.handler(), before.handler()));
        }
    }
}
