//! Routes: the buildable units of a site.
//!
//! A [`Route`] pairs a URL path with the knowledge of how to produce the bytes
//! served at that path. Routes are immutable once constructed and are shared
//! as `Arc<Route>` between the router's trie and the builder.
//!
//! The kind of a route is a closed enum carried on the route itself:
//!
//! - [`RouteKind::Document`]: rendered from a content document
//! - [`RouteKind::StaticDir`]: copied byte-for-byte from a static directory
//! - [`RouteKind::Custom`]: rendered by a caller-supplied [`Render`]
//!
//! Routes are created by a [`RouteProvider`], which enumerates a batch of
//! related routes (all documents, one static tree, ...) for the router to
//! register.

use crate::trie::Params;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("route {0} has no renderer")]
    NoRenderer(String),
    #[error("route {0} has no source file")]
    NoSource(String),
    #[error("route {0} is not text; copy its source file instead")]
    Binary(String),
    #[error("{0}")]
    Failed(String),
}

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Origin of a route. Drives how the builder produces its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteKind {
    Document,
    StaticDir,
    Custom,
}

impl fmt::Display for RouteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RouteKind::Document => "document",
            RouteKind::StaticDir => "staticDir",
            RouteKind::Custom => "custom",
        })
    }
}

/// Produces the content of a route.
///
/// Implemented by the document renderer and by closures for custom routes.
/// Must be `Send + Sync`: routes are built concurrently.
pub trait Render: Send + Sync {
    fn render(&self, route: &Route, params: &Params) -> Result<String, RenderError>;

    /// Concrete URL paths a parameterized route expands to at build time.
    fn static_paths(&self, _route: &Route) -> Vec<String> {
        Vec::new()
    }
}

impl<F> Render for F
where
    F: Fn(&Route, &Params) -> Result<String, RenderError> + Send + Sync,
{
    fn render(&self, route: &Route, params: &Params) -> Result<String, RenderError> {
        self(route, params)
    }
}

/// A buildable unit: one URL path, one output file (or one per static path).
#[derive(Clone)]
pub struct Route {
    kind: RouteKind,
    url_path: String,
    id: Option<String>,
    source_path: Option<PathBuf>,
    content_type: String,
    locale: Option<String>,
    static_paths: Option<Vec<String>>,
    renderer: Option<Arc<dyn Render>>,
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("kind", &self.kind)
            .field("url_path", &self.url_path)
            .field("id", &self.id)
            .field("source_path", &self.source_path)
            .field("content_type", &self.content_type)
            .field("locale", &self.locale)
            .finish_non_exhaustive()
    }
}

impl Route {
    fn new(kind: RouteKind, url_path: &str) -> Self {
        let url_path = normalize_url_path(url_path);
        let content_type = content_type_for(&url_path).to_string();
        Self {
            kind,
            url_path,
            id: None,
            source_path: None,
            content_type,
            locale: None,
            static_paths: None,
            renderer: None,
        }
    }

    /// A route rendered from the document at `source`.
    pub fn document(url_path: &str, source: impl Into<PathBuf>, renderer: Arc<dyn Render>) -> Self {
        let mut route = Self::new(RouteKind::Document, url_path);
        route.source_path = Some(source.into());
        route.renderer = Some(renderer);
        route
    }

    /// A route copied verbatim from `source`.
    pub fn static_file(url_path: &str, source: impl Into<PathBuf>) -> Self {
        let mut route = Self::new(RouteKind::StaticDir, url_path);
        route.source_path = Some(source.into());
        route
    }

    /// A route rendered by a closure, with no backing source file.
    pub fn custom<F>(url_path: &str, render: F) -> Self
    where
        F: Fn(&Route, &Params) -> Result<String, RenderError> + Send + Sync + 'static,
    {
        Self::custom_renderer(url_path, Arc::new(render))
    }

    /// A route rendered by `renderer`, with no backing source file.
    pub fn custom_renderer(url_path: &str, renderer: Arc<dyn Render>) -> Self {
        let mut route = Self::new(RouteKind::Custom, url_path);
        route.renderer = Some(renderer);
        route
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<PathBuf>) -> Self {
        self.source_path = Some(source.into());
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Override the content type inferred from the URL extension.
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Fix the concrete paths a parameterized route is built at.
    pub fn with_static_paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.static_paths = Some(
            paths
                .into_iter()
                .map(|p| normalize_url_path(p.as_ref()))
                .collect(),
        );
        self
    }

    pub fn kind(&self) -> RouteKind {
        self.kind
    }

    pub fn url_path(&self) -> &str {
        &self.url_path
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Whether the URL contains `:param` or `*wildcard` segments.
    pub fn is_dynamic(&self) -> bool {
        self.url_path
            .split('/')
            .any(|s| s.starts_with(':') || s.starts_with('*'))
    }

    /// Concrete paths to build for a dynamic route. Explicit paths take
    /// precedence over the renderer's.
    pub fn static_paths(&self) -> Vec<String> {
        if let Some(paths) = &self.static_paths {
            return paths.clone();
        }
        match &self.renderer {
            Some(renderer) => renderer
                .static_paths(self)
                .iter()
                .map(|p| normalize_url_path(p))
                .collect(),
            None => Vec::new(),
        }
    }

    /// Produce the content for this route.
    ///
    /// Static routes read their source file as UTF-8 text and fail with
    /// [`RenderError::Binary`] otherwise. Byte-exact output comes from copying
    /// [`Route::source_path`]. Everything else goes through the renderer.
    pub fn build(&self, params: &Params) -> Result<String, RenderError> {
        match self.kind {
            RouteKind::StaticDir => {
                let source = self
                    .source_path
                    .as_ref()
                    .ok_or_else(|| RenderError::NoSource(self.url_path.clone()))?;
                String::from_utf8(std::fs::read(source)?)
                    .map_err(|_| RenderError::Binary(self.url_path.clone()))
            }
            RouteKind::Document | RouteKind::Custom => {
                let renderer = self
                    .renderer
                    .as_ref()
                    .ok_or_else(|| RenderError::NoRenderer(self.url_path.clone()))?;
                renderer.render(self, params)
            }
        }
    }
}

/// A source of related routes.
///
/// Providers may compute their routes lazily but must return the same set
/// for repeated calls within one warm-up cycle.
pub trait RouteProvider: Send + Sync {
    /// Human-readable name used in logs and errors.
    fn name(&self) -> &str;

    fn kind(&self) -> RouteKind;

    /// Enumerate every route this provider owns.
    fn routes(&self) -> Result<Vec<Arc<Route>>, ProviderError>;

    /// Resolve one route from provider-specific params.
    fn get_route(&self, _params: &Params) -> Option<Arc<Route>> {
        None
    }
}

/// Collapse duplicate slashes and ensure a leading slash.
///
/// Trailing slashes are meaningful (`/about/` is a directory index) and kept.
pub fn normalize_url_path(path: &str) -> String {
    let mut out = String::with_capacity(path.len() + 1);
    out.push('/');
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        out.push_str(segment);
        out.push('/');
    }
    if !path.ends_with('/') && out.len() > 1 {
        out.pop();
    }
    out
}

/// Infer a content type from the extension of the last URL segment.
///
/// Extensionless paths are HTML pages.
pub fn content_type_for(url_path: &str) -> &'static str {
    let last = url_path.rsplit('/').next().unwrap_or("");
    let ext = match last.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => return "text/html",
    };
    match ext.as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "xml" => "application/xml",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "avif" => "image/avif",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}
