//! Per-request context handed to effects, middleware and handlers.
//!
//! A context is accumulated in stages while a request is dispatched:
//!
//! 1. the request and its [`ResponseWriter`],
//! 2. the URL data of the matched route — [`Query`], [`Params`] and the pathname,
//! 3. the route's merged [`Config`],
//! 4. the resolved [`Effects`].
//!
//! Stages 1–3 form a [`RouteContext`], which is what effect instantiators see. Adding the
//! effects yields the [`Context`] passed to middleware and handlers; it dereferences to its
//! `RouteContext`, so every earlier stage stays reachable and nothing is shadowed.

use std::collections::HashMap;
use std::ops::Deref;
use std::sync::Arc;

use percent_encoding::percent_decode_str;

use crate::config::Config;
use crate::effects::Effects;
use crate::http::{Request, ResponseWriter};

pub mod body;

pub use body::BodyCache;

/// Named path parameters captured by the matched route pattern.
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Params {
    map: HashMap<String, String>,
}

impl Params {
    /// Creates an empty parameter map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a captured value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.map.insert(key.into(), value.into());
    }

    /// Returns the value captured for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(String::as_str)
    }

    /// Number of captured params.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over `(name, value)` pairs in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Params::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

/// Decoded query string (or urlencoded form) pairs, in order, repeated keys kept.
///
/// # Examples
///
/// ```
/// use rttp_router::context::Query;
///
/// let q = Query::parse("tag=a&tag=b&name=J%C3%BCrgen+K");
/// assert_eq!(q.get("tag"), Some("a"));
/// assert_eq!(q.get_all("tag").collect::<Vec<_>>(), vec!["a", "b"]);
/// assert_eq!(q.get("name"), Some("Jürgen K"));
/// ```
#[derive(Default, Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pairs: Vec<(String, String)>,
}

impl Query {
    /// Parses `key=value&key2=value2`, decoding `+` and percent escapes.
    pub fn parse(raw: &str) -> Self {
        let pairs = raw
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (decode_form_component(key), decode_form_component(value))
            })
            .collect();
        Self { pairs }
    }

    /// Returns the first value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns every value for `key`, in order.
    pub fn get_all<'a, 'k>(
        &'a self,
        key: &'k str,
    ) -> impl Iterator<Item = &'a str> + use<'a, 'k> {
        self.pairs
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Returns `true` if `key` appears at least once.
    pub fn contains_key(&self, key: &str) -> bool {
        self.pairs.iter().any(|(k, _)| k == key)
    }

    /// Number of key/value pairs, counting duplicates.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Iterates over the decoded pairs in their original order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

fn decode_form_component(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

/// URL data extracted for the matched route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlContext {
    pub query: Query,
    pub params: Params,
    pub pathname: String,
}

/// Everything known about a request once a route has matched, before effects exist.
///
/// Cloning is cheap; every field is shared.
#[derive(Debug, Clone)]
pub struct RouteContext {
    req: Arc<Request>,
    res: ResponseWriter,
    url: Arc<UrlContext>,
    config: Arc<Config>,
    body: Arc<BodyCache>,
}

impl RouteContext {
    /// Assembles a route context. The dispatcher does this on every match; tests and custom
    /// HTTP layers may do it directly.
    pub fn new(
        req: Arc<Request>,
        res: ResponseWriter,
        url: UrlContext,
        config: Arc<Config>,
        body: Arc<BodyCache>,
    ) -> Self {
        Self {
            req,
            res,
            url: Arc::new(url),
            config,
            body,
        }
    }

    /// The incoming request.
    pub fn req(&self) -> &Request {
        &self.req
    }

    /// The response handle for this request.
    pub fn res(&self) -> &ResponseWriter {
        &self.res
    }

    /// Parameters captured by the route pattern.
    pub fn params(&self) -> &Params {
        &self.url.params
    }

    /// The decoded query string.
    pub fn query(&self) -> &Query {
        &self.url.query
    }

    /// The request pathname, without the query string.
    pub fn pathname(&self) -> &str {
        &self.url.pathname
    }

    /// The URL data as one value.
    pub fn url(&self) -> &UrlContext {
        &self.url
    }

    /// The route's merged configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Cached decoded forms of the request body.
    pub fn body(&self) -> &BodyCache {
        &self.body
    }
}

/// The full per-request context: a [`RouteContext`] plus resolved [`Effects`].
#[derive(Debug, Clone)]
pub struct Context {
    route: RouteContext,
    effects: Effects,
}

impl Context {
    /// Attaches resolved effects to a route context.
    pub fn new(route: RouteContext, effects: Effects) -> Self {
        Self { route, effects }
    }

    /// Effects instantiated for this request.
    pub fn effects(&self) -> &Effects {
        &self.effects
    }

    /// The context as effect instantiators saw it.
    pub fn route(&self) -> &RouteContext {
        &self.route
    }

    /// Splits the context back into its parts.
    pub fn into_parts(self) -> (RouteContext, Effects) {
        (self.route, self.effects)
    }
}

impl Deref for Context {
    type Target = RouteContext;

    fn deref(&self) -> &RouteContext {
        &self.route
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::Method;

    #[test]
    fn query_keeps_order_and_duplicates() {
        let q = Query::parse("a=1&b=2&a=3&flag");
        assert_eq!(q.len(), 4);
        assert_eq!(q.get("a"), Some("1"));
        assert_eq!(q.get_all("a").collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(q.get("flag"), Some(""));
        assert!(q.contains_key("b"));
        assert!(!q.contains_key("c"));
    }

    #[test]
    fn query_values_outlive_the_lookup_key() {
        let q = Query::parse("page=2&tag=x&tag=y");
        let (page, tags) = {
            let page_key = String::from("page");
            let tag_key = String::from("tag");
            (q.get(&page_key), q.get_all(&tag_key).collect::<Vec<_>>())
        };
        assert_eq!(page, Some("2"));
        assert_eq!(tags, vec!["x", "y"]);
    }

    #[test]
    fn empty_query() {
        assert!(Query::parse("").is_empty());
        assert!(Query::parse("&&").is_empty());
    }

    #[test]
    fn params_from_pairs() {
        let params: Params = [("fooId", "1"), ("barId", "2")].into_iter().collect();
        assert_eq!(params.get("fooId"), Some("1"));
        assert_eq!(params.get("barId"), Some("2"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn context_derefs_to_route_context() {
        let req = Request::new(Method::Get, "/foo?x=1");
        let route = RouteContext::new(
            Arc::new(req),
            ResponseWriter::new(),
            UrlContext {
                query: Query::parse("x=1"),
                params: Params::new(),
                pathname: "/foo".into(),
            },
            Arc::new(Config::new().with("name", "demo")),
            Arc::new(BodyCache::default()),
        );
        let ctx = Context::new(route, Effects::default());

        assert_eq!(ctx.pathname(), "/foo");
        assert_eq!(ctx.query().get("x"), Some("1"));
        assert_eq!(ctx.config().get::<String>("name").unwrap(), "demo");
        assert_eq!(ctx.req().method(), &Method::Get);
        assert!(ctx.effects().is_empty());
    }
}
