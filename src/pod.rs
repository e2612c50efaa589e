//! A pod: one site root with its config, content, and build state.
//!
//! [`Pod::open`] wires everything a build needs from `podsite.toml`:
//!
//! ```text
//! podsite.toml ──► PodConfig
//!                    ├─ translations_dir ──► Catalog ──► MarkdownRenderer
//!                    ├─ content_dir ───────► DocumentProvider ─┐
//!                    └─ static_dirs ───────► StaticDirProvider ┴─► Router
//! ```
//!
//! The pod owns the router and catalog. [`Pod::invalidate`] drops the route
//! trie and recorded translation misses so the next build starts from the
//! current state of the source tree.

use crate::builder::{BuildError, BuildOptions, BuildResult, Builder};
use crate::config::{ConfigError, PodConfig, load_config};
use crate::export::{ExportError, ExportOptions, ExportResult, export};
use crate::git::GitInfo;
use crate::hooks::Hooks;
use crate::locale::{Catalog, LocaleError};
use crate::provider::{DocumentProvider, StaticDirProvider};
use crate::render::MarkdownRenderer;
use crate::route::RouteProvider;
use crate::router::Router;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PodError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("locale error: {0}")]
    Locale(#[from] LocaleError),
    #[error("pod root not found: {0}")]
    NotFound(PathBuf),
}

#[derive(Debug)]
pub struct Pod {
    root: PathBuf,
    config: PodConfig,
    catalog: Arc<Catalog>,
    router: Router,
    hooks: Hooks,
}

impl Pod {
    /// Open the pod at `root`, loading its config and translations.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PodError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(PodError::NotFound(root));
        }
        let config = load_config(&root)?;
        let l10n = &config.localization;
        let catalog = Arc::new(Catalog::load(
            &root.join(&l10n.translations_dir),
            &l10n.default_locale,
            &l10n.locales,
        )?);

        let renderer = Arc::new(MarkdownRenderer::new(
            Arc::clone(&catalog),
            config.site_title.clone(),
        ));
        let mut router = Router::new();
        router.add_provider(Arc::new(
            DocumentProvider::new(root.join(&config.content_dir), renderer)
                .with_locales(&l10n.default_locale, &l10n.locales),
        ));
        for dir in &config.static_dirs {
            router.add_provider(Arc::new(StaticDirProvider::new(
                root.join(&dir.path),
                &dir.serve_at,
            )));
        }

        tracing::debug!(root = %root.display(), static_dirs = config.static_dirs.len(), "opened pod");
        Ok(Self {
            root,
            config,
            catalog,
            router,
            hooks: Hooks::new(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &PodConfig {
        &self.config
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn hooks_mut(&mut self) -> &mut Hooks {
        &mut self.hooks
    }

    /// Register an extra provider after the built-in ones.
    pub fn add_provider(&mut self, provider: Arc<dyn RouteProvider>) {
        self.router.add_provider(provider);
    }

    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.config.output_dir)
    }

    /// Forget the route trie and recorded translation misses.
    pub fn invalidate(&mut self) {
        self.router.reset();
        self.catalog.clear_missing();
    }

    /// Build the pod into its output directory.
    pub fn build(&self, options: &BuildOptions) -> Result<BuildResult, BuildError> {
        self.catalog.clear_missing();
        Builder::new(&self.router, self.output_dir())
            .root(&self.root)
            .concurrency(
                self.config.build.build_concurrency,
                self.config.build.commit_concurrency,
            )
            .translations(self.catalog.as_ref())
            .hooks(&self.hooks)
            .git(GitInfo::discover(&self.root))
            .build(options)
    }

    /// Export options for this pod with its own build directory and
    /// concurrency filled in.
    pub fn export_options(&self, export_dir: impl Into<PathBuf>) -> ExportOptions {
        let mut options = ExportOptions::new(self.output_dir(), export_dir);
        options.concurrency = self.config.build.commit_concurrency;
        options
    }

    pub fn export(&self, options: &ExportOptions) -> Result<ExportResult, ExportError> {
        export(options)
    }
}
