//! Request-scoped effects — resources such as loggers, sessions or API clients that are
//! built from configuration once and instantiated for each request.
//!
//! An effect goes through two stages:
//!
//! 1. **Build** — when an [`App`](crate::App) is compiled, each route's [`EffectBuilder`]s
//!    receive the route's merged [`Config`] and return an [`EffectInstantiator`].
//! 2. **Instantiate** — for every request matching the route, each instantiator receives the
//!    [`RouteContext`] (which has no effects yet) and produces a value, possibly
//!    asynchronously.
//!
//! [`resolve`] runs every instantiator of a route concurrently and fails with the first
//! error to occur. Values end up in [`Effects`], keyed by the name they were declared with.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use futures_util::future::{BoxFuture, try_join_all};
use tracing::{debug, warn};

use crate::config::Config;
use crate::context::RouteContext;
use crate::error::{BoxError, ConfigError};
use crate::Error;

pub mod logger;

pub use logger::{RequestLogger, logger};

/// A type-erased effect value.
pub type EffectValue = Arc<dyn Any + Send + Sync>;

/// Second stage of an effect: produces a value for one request.
pub trait EffectInstantiator: Send + Sync {
    /// Creates this effect's value for the request described by `ctx`.
    fn instantiate(&self, ctx: RouteContext) -> BoxFuture<'static, Result<EffectValue, Error>>;
}

/// First stage of an effect: binds configuration, producing an [`EffectInstantiator`].
pub trait EffectBuilder: Send + Sync {
    /// Configures the effect for one route.
    ///
    /// # Errors
    ///
    /// Failing here fails [`App::new`](crate::App::new), i.e. application startup.
    fn build(&self, config: &Config) -> Result<Arc<dyn EffectInstantiator>, BoxError>;
}

/// Effect builders keyed by name, as declared on routers and routes.
pub type EffectMap = BTreeMap<String, Arc<dyn EffectBuilder>>;

/// Builders bound to a route's config, ready to run per request.
pub type Instantiators = Vec<(String, Arc<dyn EffectInstantiator>)>;

struct FnInstantiator<F>(F);

impl<F, Fut, T> EffectInstantiator for FnInstantiator<F>
where
    F: Fn(RouteContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
    T: Any + Send + Sync,
{
    fn instantiate(&self, ctx: RouteContext) -> BoxFuture<'static, Result<EffectValue, Error>> {
        let fut = (self.0)(ctx);
        Box::pin(async move { fut.await.map(|value| Arc::new(value) as EffectValue) })
    }
}

struct FnBuilder<B>(B);

impl<B, I> EffectBuilder for FnBuilder<B>
where
    B: Fn(&Config) -> Result<I, Error> + Send + Sync,
    I: EffectInstantiator + 'static,
{
    fn build(&self, config: &Config) -> Result<Arc<dyn EffectInstantiator>, BoxError> {
        let instantiator = (self.0)(config).map_err(BoxError::from)?;
        Ok(Arc::new(instantiator))
    }
}

/// Defines an effect from a pair of closures: a config-bound builder returning a
/// per-request instantiator.
///
/// # Examples
///
/// ```
/// use rttp_router::effects::{self, EffectBuilder};
/// use rttp_router::Config;
///
/// // Hands each request a greeting built from config plus the request path.
/// let greeter = effects::from_fn(|config: &Config| {
///     let greeting: String = config.get("greeting")?;
///     Ok(move |ctx: rttp_router::context::RouteContext| {
///         let text = format!("{greeting} from {}", ctx.pathname());
///         async move { Ok(text) }
///     })
/// });
///
/// assert!(greeter.build(&Config::new()).is_err());
/// assert!(greeter.build(&Config::new().with("greeting", "hi")).is_ok());
/// ```
pub fn from_fn<B, F, Fut, T>(build: B) -> Arc<dyn EffectBuilder>
where
    B: Fn(&Config) -> Result<F, Error> + Send + Sync + 'static,
    F: Fn(RouteContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, Error>> + Send + 'static,
    T: Any + Send + Sync,
{
    Arc::new(FnBuilder(move |config: &Config| {
        build(config).map(FnInstantiator)
    }))
}

/// Defines an effect whose value is built once from config and shared by every request,
/// like a connection pool or API client.
///
/// # Examples
///
/// ```
/// use rttp_router::effects;
/// use rttp_router::Config;
///
/// struct ApiClient {
///     base_url: String,
/// }
///
/// let api = effects::shared(|config: &Config| {
///     Ok(ApiClient { base_url: config.get("apiUrl")? })
/// });
/// # let _ = api;
/// ```
pub fn shared<B, T>(build: B) -> Arc<dyn EffectBuilder>
where
    B: Fn(&Config) -> Result<T, Error> + Send + Sync + 'static,
    T: Any + Send + Sync,
{
    Arc::new(FnBuilder(move |config: &Config| {
        let value: EffectValue = Arc::new(build(config)?);
        Ok(SharedInstantiator(value))
    }))
}

struct SharedInstantiator(EffectValue);

impl EffectInstantiator for SharedInstantiator {
    fn instantiate(&self, _ctx: RouteContext) -> BoxFuture<'static, Result<EffectValue, Error>> {
        let value = Arc::clone(&self.0);
        Box::pin(async move { Ok(value) })
    }
}

/// Runs the first stage for every builder in `effects`.
///
/// # Errors
///
/// Returns [`ConfigError::EffectBuild`] naming the first builder that fails.
pub fn configure(config: &Config, effects: &EffectMap) -> Result<Instantiators, ConfigError> {
    effects
        .iter()
        .map(|(name, builder)| {
            builder
                .build(config)
                .map(|instantiator| (name.clone(), instantiator))
                .map_err(|source| ConfigError::EffectBuild {
                    name: name.clone(),
                    source,
                })
        })
        .collect()
}

/// Instantiates every effect concurrently against the same context snapshot.
///
/// Resolves to a map with exactly the names in `instantiators`. If any instantiator fails,
/// the first failure to occur is returned unchanged and no partial map is produced.
pub async fn resolve(
    instantiators: &[(String, Arc<dyn EffectInstantiator>)],
    ctx: &RouteContext,
) -> Result<Effects, Error> {
    if instantiators.is_empty() {
        return Ok(Effects::default());
    }
    debug!(count = instantiators.len(), "instantiating effects");

    let pending = instantiators.iter().map(|(name, instantiator)| {
        let name = name.clone();
        let creating = instantiator.instantiate(ctx.clone());
        async move {
            match creating.await {
                Ok(value) => Ok((name, value)),
                Err(err) => {
                    warn!(effect = %name, error = %err, "effect instantiation failed");
                    Err(err)
                }
            }
        }
    });

    let values = try_join_all(pending).await?;
    Ok(Effects {
        values: Arc::new(values.into_iter().collect()),
    })
}

/// Effect values resolved for one request.
#[derive(Clone, Default)]
pub struct Effects {
    values: Arc<BTreeMap<String, EffectValue>>,
}

impl Effects {
    /// Borrows the effect named `name` if it exists and has type `T`.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        self.values.get(name)?.downcast_ref::<T>()
    }

    /// Like [`get`](Self::get) but reports a missing or mistyped effect as an error.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingEffect`].
    pub fn require<T: Any>(&self, name: &str) -> Result<&T, Error> {
        self.get(name).ok_or_else(|| Error::MissingEffect {
            name: name.to_owned(),
        })
    }

    /// Returns a shared handle to the effect named `name`, for use beyond the context's
    /// lifetime (e.g. inside middleware after the context moved downstream).
    pub fn shared<T: Any + Send + Sync>(&self, name: &str) -> Option<Arc<T>> {
        let value = Arc::clone(self.values.get(name)?);
        value.downcast::<T>().ok()
    }

    /// Returns `true` if an effect named `name` was resolved.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Names of the resolved effects, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of resolved effects.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Effects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.names()).finish()
    }
}
