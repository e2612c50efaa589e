//! Concrete route providers.
//!
//! | Provider | Kind | Routes |
//! |----------|------|--------|
//! | [`DocumentProvider`] | `document` | one per markdown file per locale |
//! | [`StaticDirProvider`] | `staticDir` | one per file in a directory tree |
//! | [`CustomProvider`] | `custom` | an explicit list |
//!
//! ## Document URLs
//!
//! ```text
//! content/index.md            → /             (id "index")
//! content/about.md            → /about/       (id "about")
//! content/blog/index.md       → /blog/        (id "blog/index")
//! content/blog/first-post.md  → /blog/first-post/
//!
//! with locales = ["de"]:
//! content/about.md            → /de/about/    (id "about@de")
//! ```
//!
//! Files are enumerated in sorted order so repeated enumerations return the
//! same routes in the same order.

use crate::route::{ProviderError, Render, Route, RouteKind, RouteProvider};
use crate::trie::Params;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::WalkDir;

/// Markdown documents under a content directory.
pub struct DocumentProvider {
    content_dir: PathBuf,
    renderer: Arc<dyn Render>,
    default_locale: String,
    locales: Vec<String>,
}

impl DocumentProvider {
    pub fn new(content_dir: impl Into<PathBuf>, renderer: Arc<dyn Render>) -> Self {
        Self {
            content_dir: content_dir.into(),
            renderer,
            default_locale: "en".to_string(),
            locales: Vec::new(),
        }
    }

    /// Also register every document under `/<locale>/` for each of `locales`.
    pub fn with_locales(mut self, default_locale: &str, locales: &[String]) -> Self {
        self.default_locale = default_locale.to_string();
        self.locales = locales
            .iter()
            .filter(|l| *l != default_locale)
            .cloned()
            .collect();
        self
    }

    fn document_route(&self, rel: &str, locale: Option<&str>) -> Arc<Route> {
        let stem = rel.strip_suffix(".md").unwrap_or(rel);
        let url = document_url(stem);
        let source = self.content_dir.join(rel);
        let route = match locale {
            Some(locale) => Route::document(&format!("/{locale}{url}"), source, Arc::clone(&self.renderer))
                .with_id(format!("{stem}@{locale}"))
                .with_locale(locale),
            None => Route::document(&url, source, Arc::clone(&self.renderer))
                .with_id(stem)
                .with_locale(self.default_locale.as_str()),
        };
        Arc::new(route)
    }
}

impl RouteProvider for DocumentProvider {
    fn name(&self) -> &str {
        "documents"
    }

    fn kind(&self) -> RouteKind {
        RouteKind::Document
    }

    fn routes(&self) -> Result<Vec<Arc<Route>>, ProviderError> {
        if !self.content_dir.is_dir() {
            tracing::warn!(dir = %self.content_dir.display(), "content directory not found");
            return Ok(Vec::new());
        }
        let docs: Vec<String> = relative_files(&self.content_dir)?
            .into_iter()
            .filter(|rel| rel.ends_with(".md"))
            .collect();

        let mut routes = Vec::with_capacity(docs.len() * (1 + self.locales.len()));
        for rel in &docs {
            routes.push(self.document_route(rel, None));
            for locale in &self.locales {
                routes.push(self.document_route(rel, Some(locale)));
            }
        }
        Ok(routes)
    }

    /// Params: `path` is the document path relative to the content directory,
    /// without the `.md` extension; `locale` is optional.
    fn get_route(&self, params: &Params) -> Option<Arc<Route>> {
        let stem = params.get("path")?.trim_matches('/');
        let rel = format!("{stem}.md");
        if !self.content_dir.join(&rel).is_file() {
            return None;
        }
        match params.get("locale").map(String::as_str) {
            None => Some(self.document_route(&rel, None)),
            Some(l) if l == self.default_locale => Some(self.document_route(&rel, None)),
            Some(l) if self.locales.iter().any(|x| x == l) => Some(self.document_route(&rel, Some(l))),
            Some(_) => None,
        }
    }
}

/// URL of a document from its extensionless relative path.
pub fn document_url(stem: &str) -> String {
    match stem.strip_suffix("index") {
        Some(dir) if dir.is_empty() || dir.ends_with('/') => format!("/{dir}"),
        _ => format!("/{stem}/"),
    }
}

/// Every file of a static directory, served under a URL prefix.
pub struct StaticDirProvider {
    name: String,
    dir: PathBuf,
    serve_at: String,
}

impl StaticDirProvider {
    pub fn new(dir: impl Into<PathBuf>, serve_at: &str) -> Self {
        Self {
            name: format!("static:{serve_at}"),
            dir: dir.into(),
            serve_at: serve_at.to_string(),
        }
    }

    fn file_route(&self, rel: &str) -> Arc<Route> {
        let url = format!("{}{}", self.serve_at, rel);
        Arc::new(Route::static_file(&url, self.dir.join(rel)))
    }
}

impl RouteProvider for StaticDirProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RouteKind {
        RouteKind::StaticDir
    }

    fn routes(&self) -> Result<Vec<Arc<Route>>, ProviderError> {
        if !self.dir.is_dir() {
            return Err(ProviderError::Invalid(format!(
                "static directory not found: {}",
                self.dir.display()
            )));
        }
        Ok(relative_files(&self.dir)?
            .iter()
            .map(|rel| self.file_route(rel))
            .collect())
    }

    /// Params: `path` is the file path relative to the static directory.
    fn get_route(&self, params: &Params) -> Option<Arc<Route>> {
        let rel = params.get("path")?.trim_start_matches('/');
        if rel.split('/').any(|s| s == "..") || !self.dir.join(rel).is_file() {
            return None;
        }
        Some(self.file_route(rel))
    }
}

/// An explicit, caller-assembled list of routes.
pub struct CustomProvider {
    name: String,
    routes: Vec<Arc<Route>>,
}

impl CustomProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            routes: Vec::new(),
        }
    }

    pub fn with_route(mut self, route: Route) -> Self {
        self.routes.push(Arc::new(route));
        self
    }
}

impl RouteProvider for CustomProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> RouteKind {
        RouteKind::Custom
    }

    fn routes(&self) -> Result<Vec<Arc<Route>>, ProviderError> {
        Ok(self.routes.clone())
    }

    /// Params: `path` is the route's URL path.
    fn get_route(&self, params: &Params) -> Option<Arc<Route>> {
        let wanted = crate::route::normalize_url_path(params.get("path")?);
        self.routes.iter().find(|r| r.url_path() == wanted).cloned()
    }
}

/// Files under `dir` as sorted `/`-separated relative paths. Hidden entries
/// are skipped.
fn relative_files(dir: &Path) -> Result<Vec<String>, ProviderError> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| ProviderError::Invalid(e.to_string()))?;
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        files.push(rel.join("/"));
    }
    Ok(files)
}
