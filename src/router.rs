//! The router: registrations, warm-up, and lookup.
//!
//! Routes reach the router two ways: individually via [`Router::add_route`],
//! or in batches via a [`RouteProvider`] registered with
//! [`Router::add_provider`]. Registrations are replayed in order into a fresh
//! [`RouteTrie`] on warm-up, so a later registration at the same path shadows
//! an earlier one.
//!
//! ## Warm-up and Invalidation
//!
//! Warm-up is lazy and happens at most once per cycle: the first call to
//! [`resolve`](Router::resolve) or [`routes`](Router::routes) asks every
//! provider for its routes and builds the trie. [`reset`](Router::reset)
//! throws the trie away (e.g. after a source file changed) and the next call
//! rebuilds it from scratch. The trie is never edited in place.

use crate::route::{ProviderError, Route, RouteKind, RouteProvider};
use crate::trie::{MatchKind, Params, RouteTrie};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RouterError {
    #[error("provider {provider} failed: {source}")]
    Provider {
        provider: String,
        #[source]
        source: ProviderError,
    },
}

enum Registration {
    Route { path: String, route: Arc<Route> },
    Provider(Arc<dyn RouteProvider>),
}

/// One row of the route table.
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// Trie path, with `:param` / `*wildcard` markers.
    pub path: String,
    pub kind: MatchKind,
    pub route: Arc<Route>,
}

#[derive(Default)]
pub struct Router {
    registrations: Vec<Registration>,
    trie: OnceLock<RouteTrie<Arc<Route>>>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("registrations", &self.registrations.len())
            .field("warm", &self.is_warm())
            .finish()
    }
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a single route at `path`.
    pub fn add_route(&mut self, path: &str, route: Arc<Route>) {
        self.registrations.push(Registration::Route {
            path: path.to_string(),
            route,
        });
        self.reset();
    }

    /// Register a provider. Its routes are enumerated on the next warm-up.
    pub fn add_provider(&mut self, provider: Arc<dyn RouteProvider>) {
        self.registrations.push(Registration::Provider(provider));
        self.reset();
    }

    /// Discard the trie. The next lookup warms up again.
    pub fn reset(&mut self) {
        if self.trie.take().is_some() {
            tracing::debug!("router reset");
        }
    }

    pub fn is_warm(&self) -> bool {
        self.trie.get().is_some()
    }

    /// Build the trie if it has not been built since the last reset.
    pub fn warmup(&self) -> Result<&RouteTrie<Arc<Route>>, RouterError> {
        if let Some(trie) = self.trie.get() {
            return Ok(trie);
        }
        let trie = self.build_trie()?;
        tracing::debug!(routes = trie.len(), "router warmed up");
        Ok(self.trie.get_or_init(|| trie))
    }

    fn build_trie(&self) -> Result<RouteTrie<Arc<Route>>, RouterError> {
        let mut trie = RouteTrie::new();
        for registration in &self.registrations {
            match registration {
                Registration::Route { path, route } => trie.add(path, Arc::clone(route)),
                Registration::Provider(provider) => {
                    let routes = provider.routes().map_err(|source| RouterError::Provider {
                        provider: provider.name().to_string(),
                        source,
                    })?;
                    tracing::debug!(
                        provider = provider.name(),
                        kind = %provider.kind(),
                        count = routes.len(),
                        "registered provider routes"
                    );
                    for route in routes {
                        let path = route.url_path().to_string();
                        trie.add(&path, route);
                    }
                }
            }
        }
        Ok(trie)
    }

    /// Resolve a URL path to its route and captured params.
    pub fn resolve(&self, url_path: &str) -> Result<Option<(Arc<Route>, Params)>, RouterError> {
        let trie = self.warmup()?;
        Ok(trie
            .resolve(url_path)
            .map(|(route, params)| (Arc::clone(route), params)))
    }

    /// Every registered route, in trie walk order.
    pub fn routes(&self) -> Result<Vec<Arc<Route>>, RouterError> {
        Ok(self.entries()?.into_iter().map(|e| e.route).collect())
    }

    /// The route table: every route with its trie path and match kind.
    pub fn entries(&self) -> Result<Vec<RouteEntry>, RouterError> {
        let trie = self.warmup()?;
        let mut entries = Vec::new();
        trie.walk(|entry| {
            entries.push(RouteEntry {
                path: entry.path,
                kind: entry.kind,
                route: Arc::clone(entry.route),
            })
        });
        Ok(entries)
    }

    /// URL path of the route registered with stable id `id`.
    pub fn url_for(&self, id: &str) -> Result<Option<String>, RouterError> {
        Ok(self
            .routes()?
            .iter()
            .find(|r| r.id() == Some(id))
            .map(|r| r.url_path().to_string()))
    }

    /// Ask providers of `kind`, in registration order, to resolve a route
    /// from `params`.
    pub fn get_route(&self, kind: RouteKind, params: &Params) -> Option<Arc<Route>> {
        self.registrations.iter().find_map(|registration| match registration {
            Registration::Provider(p) if p.kind() == kind => p.get_route(params),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn custom(path: &str, body: &'static str) -> Arc<Route> {
        Arc::new(Route::custom(path, move |_: &Route, _: &Params| {
            Ok(body.to_string())
        }))
    }

    fn body(route: &Route) -> String {
        route.build(&Params::new()).unwrap()
    }

    /// Provider that counts how often it is enumerated.
    struct CountingProvider {
        name: String,
        routes: Vec<Arc<Route>>,
        calls: AtomicUsize,
    }

    impl CountingProvider {
        fn new(name: &str, routes: Vec<Arc<Route>>) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                routes,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl RouteProvider for CountingProvider {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> RouteKind {
            RouteKind::Custom
        }

        fn routes(&self) -> Result<Vec<Arc<Route>>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.routes.clone())
        }

        fn get_route(&self, params: &Params) -> Option<Arc<Route>> {
            let wanted = params.get("path")?;
            self.routes.iter().find(|r| r.url_path() == wanted).cloned()
        }
    }

    struct FailingProvider;

    impl RouteProvider for FailingProvider {
        fn name(&self) -> &str {
            "failing"
        }

        fn kind(&self) -> RouteKind {
            RouteKind::Document
        }

        fn routes(&self) -> Result<Vec<Arc<Route>>, ProviderError> {
            Err(ProviderError::Invalid("content dir unreadable".into()))
        }
    }

    #[test]
    fn warmup_is_lazy_and_idempotent() {
        let provider = CountingProvider::new("pages", vec![custom("/", "home")]);
        let mut router = Router::new();
        router.add_provider(provider.clone());
        assert!(!router.is_warm());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);

        router.warmup().unwrap();
        router.warmup().unwrap();
        router.resolve("/").unwrap();
        router.routes().unwrap();

        assert!(router.is_warm());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reset_forces_rebuild() {
        let provider = CountingProvider::new("pages", vec![custom("/", "home")]);
        let mut router = Router::new();
        router.add_provider(provider.clone());
        router.routes().unwrap();

        router.reset();
        assert!(!router.is_warm());
        router.routes().unwrap();

        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn resolve_returns_route_and_params() {
        let mut router = Router::new();
        router.add_route("/posts/:slug/", custom("/posts/:slug/", "post"));
        let (route, params) = router.resolve("/posts/hello/").unwrap().unwrap();
        assert_eq!(body(&route), "post");
        assert_eq!(params["slug"], "hello");
    }

    #[test]
    fn resolve_unknown_is_none() {
        let router = Router::new();
        assert!(router.resolve("/nothing/").unwrap().is_none());
    }

    #[test]
    fn later_provider_shadows_earlier() {
        let mut router = Router::new();
        router.add_provider(CountingProvider::new("a", vec![custom("/x/", "from a")]));
        router.add_provider(CountingProvider::new("b", vec![custom("/x/", "from b")]));
        let (route, _) = router.resolve("/x/").unwrap().unwrap();
        assert_eq!(body(&route), "from b");
        assert_eq!(router.routes().unwrap().len(), 1);
    }

    #[test]
    fn add_route_after_warmup_is_visible() {
        let mut router = Router::new();
        router.add_route("/a/", custom("/a/", "a"));
        router.warmup().unwrap();
        router.add_route("/b/", custom("/b/", "b"));
        assert!(router.resolve("/b/").unwrap().is_some());
    }

    #[test]
    fn routes_enumerates_in_walk_order() {
        let mut router = Router::new();
        router.add_provider(CountingProvider::new(
            "pages",
            vec![custom("/b/", "b"), custom("/", "home"), custom("/a/", "a")],
        ));
        let paths: Vec<String> = router
            .routes()
            .unwrap()
            .iter()
            .map(|r| r.url_path().to_string())
            .collect();
        assert_eq!(paths, vec!["/", "/a/", "/b/"]);
    }

    #[test]
    fn entries_report_match_kind() {
        let mut router = Router::new();
        router.add_route("/files/*rest", custom("/files/*rest", "file"));
        let entries = router.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/files/*rest");
        assert_eq!(entries[0].kind, MatchKind::Wildcard);
    }

    #[test]
    fn provider_failure_is_reported_with_name() {
        let mut router = Router::new();
        router.add_provider(Arc::new(FailingProvider));
        let err = router.routes().unwrap_err();
        assert_eq!(
            err.to_string(),
            "provider failing failed: content dir unreadable"
        );
        assert!(!router.is_warm());
    }

    #[test]
    fn url_for_finds_route_by_id() {
        let mut router = Router::new();
        let route = Route::custom("/about/", |_: &Route, _: &Params| Ok(String::new()))
            .with_id("pages/about");
        router.add_route("/about/", Arc::new(route));
        assert_eq!(
            router.url_for("pages/about").unwrap().as_deref(),
            Some("/about/")
        );
        assert_eq!(router.url_for("missing").unwrap(), None);
    }

    #[test]
    fn get_route_asks_providers_of_kind() {
        let mut router = Router::new();
        router.add_provider(CountingProvider::new("custom", vec![custom("/x/", "x")]));
        let mut params = Params::new();
        params.insert("path".into(), "/x/".into());

        assert!(router.get_route(RouteKind::Custom, &params).is_some());
        assert!(router.get_route(RouteKind::Document, &params).is_none());
    }
}
