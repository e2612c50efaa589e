//! The build pipeline: routes in, committed output tree and manifest out.
//!
//! A build runs as a fixed sequence of phases. Each phase finishes completely
//! before the next starts:
//!
//! ```text
//! 1. Collect   router.routes(), filtered by --pattern globs, expanded over
//!              static paths                        → Vec<Job>
//!              load the previous manifest          (bad manifest → abort)
//! 2. Stage     fresh StagingArea beside the output tree
//! 3. Build     render/copy every job into staging  (build pool)
//!              any failure → abort, output untouched
//! 4. Hash      SHA-256 per staged file             (build pool)
//!    Commit    rename staged files into place      (commit pool)
//! 5. Diff      new manifest vs .control/manifest.json
//! 6. Prune     delete stale files (full builds only)
//! 7. Persist   manifest.json, metrics.json, locales/<locale>.yaml
//! 8. Return    BuildResult { manifest, metrics, diff }
//! ```
//!
//! ## Incremental Builds
//!
//! A build with patterns only rebuilds routes whose source path (relative to
//! the pod root) matches one of the globs. It never deletes output: its diff
//! has no deletes, and the persisted manifest is the previous one with the
//! rebuilt entries laid over it.
//!
//! ## Output Paths
//!
//! | URL | Output file |
//! |-----|-------------|
//! | `/` | `index.html` |
//! | `/about/` | `about/index.html` |
//! | `/feed` | `feed/index.html` |
//! | `/static/site.css` | `static/site.css` |

use crate::config::effective_workers;
use crate::git::GitInfo;
use crate::hooks::{HookError, Hooks};
use crate::locale::{MissingTranslations, stub_table};
use crate::manifest::{
    BuildDiffPaths, BuildManifest, CONTROL_DIR, FileEntry, ManifestError, hash_file,
    is_contained_path, manifest_path, write_atomic,
};
use crate::metrics::{BuildMetrics, resident_memory_bytes};
use crate::prune::{PruneError, remove_stale_files};
use crate::route::{Route, RouteKind};
use crate::router::{Router, RouterError};
use crate::staging::StagingArea;
use crate::trie::Params;
use globset::{Glob, GlobSet, GlobSetBuilder};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

pub const METRICS_FILENAME: &str = "metrics.json";
pub const LOCALES_DIR: &str = "locales";

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("invalid pattern {pattern:?}: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("no routes to build")]
    EmptyRouteSet,
    #[error("{}", route_build_message(.failures))]
    RouteBuild { failures: Vec<RouteFailure> },
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Prune(#[from] PruneError),
    #[error(transparent)]
    Hook(#[from] HookError),
    #[error("metrics serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("locale stub serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

fn route_build_message(failures: &[RouteFailure]) -> String {
    match failures {
        [] => "route build failed".to_string(),
        [only] => format!("route build failed: {only}"),
        [first, rest @ ..] => format!(
            "route build failed: {first} (and {} more route(s))",
            rest.len()
        ),
    }
}

/// One route that could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteFailure {
    pub url_path: String,
    pub message: String,
}

impl fmt::Display for RouteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.url_path, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Glob patterns over source paths. Non-empty makes the build incremental.
    pub patterns: Vec<String>,
    /// Persist missing translations as `.control/locales/<locale>.yaml`.
    pub write_locales: bool,
}

impl BuildOptions {
    pub fn is_incremental(&self) -> bool {
        !self.patterns.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct BuildResult {
    /// The manifest as persisted.
    pub manifest: BuildManifest,
    pub metrics: BuildMetrics,
    pub diff: BuildDiffPaths,
}

/// One concrete output: a route, the URL it is built at and its params.
#[derive(Debug, Clone)]
struct Job {
    route: Arc<Route>,
    url_path: String,
    params: Params,
    output: String,
}

#[derive(Debug)]
struct Staged {
    output: String,
    kind: RouteKind,
    bytes: u64,
}

/// Builds every route of a [`Router`] into an output directory.
pub struct Builder<'a> {
    router: &'a Router,
    root: PathBuf,
    output_dir: PathBuf,
    build_concurrency: usize,
    commit_concurrency: usize,
    translations: Option<&'a dyn MissingTranslations>,
    hooks: Option<&'a Hooks>,
    git: GitInfo,
}

impl<'a> Builder<'a> {
    pub fn new(router: &'a Router, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            router,
            root: PathBuf::from("."),
            output_dir: output_dir.into(),
            build_concurrency: 40,
            commit_concurrency: 2000,
            translations: None,
            hooks: None,
            git: GitInfo::default(),
        }
    }

    /// Directory that `--pattern` globs are matched relative to.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    pub fn concurrency(mut self, build: usize, commit: usize) -> Self {
        self.build_concurrency = build;
        self.commit_concurrency = commit;
        self
    }

    pub fn translations(mut self, translations: &'a dyn MissingTranslations) -> Self {
        self.translations = Some(translations);
        self
    }

    pub fn hooks(mut self, hooks: &'a Hooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn git(mut self, git: GitInfo) -> Self {
        self.git = git;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn control_dir(&self) -> PathBuf {
        self.output_dir.join(CONTROL_DIR)
    }

    pub fn build(&self, options: &BuildOptions) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let incremental = options.is_incremental();

        // 1. Collect
        let routes = self.collect(&options.patterns)?;
        if routes.is_empty() {
            return Err(BuildError::EmptyRouteSet);
        }
        if let Some(hooks) = self.hooks {
            hooks.run_before_build(&routes)?;
        }
        let (jobs, mut failures) = self.expand(&routes)?;
        if jobs.is_empty() && failures.is_empty() {
            return Err(BuildError::EmptyRouteSet);
        }
        tracing::info!(routes = routes.len(), outputs = jobs.len(), incremental, "collected routes");

        // Read before anything is staged: a bad manifest must fail the build
        // while the output tree is still untouched.
        let control_dir = self.control_dir();
        let previous = BuildManifest::load(&manifest_path(&control_dir))?;

        // 2-3. Stage and build
        let staging = StagingArea::create(&self.output_dir)?;
        let build_pool = worker_pool(self.build_concurrency)?;
        let results: Vec<Result<Staged, RouteFailure>> =
            build_pool.install(|| jobs.par_iter().map(|job| stage(&staging, job)).collect());

        let mut staged = Vec::with_capacity(results.len());
        for result in results {
            match result {
                Ok(s) => staged.push(s),
                Err(failure) => failures.push(failure),
            }
        }
        if !failures.is_empty() {
            for failure in &failures {
                tracing::error!(route = %failure.url_path, error = %failure.message, "route failed to build");
            }
            return Err(BuildError::RouteBuild { failures });
        }

        // 4. Hash and commit
        let files: Vec<FileEntry> = build_pool.install(|| {
            staged
                .par_iter()
                .map(|s| {
                    hash_file(&staging.staging_path(&s.output)).map(|sha| FileEntry {
                        path: s.output.clone(),
                        sha,
                    })
                })
                .collect::<io::Result<_>>()
        })?;
        let mut metrics = BuildMetrics::default();
        for s in &staged {
            metrics.record(s.kind, s.bytes);
        }
        let manifest = BuildManifest::new(self.git.branch.clone(), self.git.commit.clone(), files);

        let outputs: Vec<String> = staged.into_iter().map(|s| s.output).collect();
        let commit_pool = worker_pool(self.commit_concurrency)?;
        let stats = staging.commit(&outputs, &commit_pool)?;
        drop(staging);
        tracing::info!(files = stats.total(), copied = stats.copied, "committed output");

        // 5. Diff
        let diff = BuildDiffPaths::compute(previous.as_ref(), &manifest, incremental);

        // 6. Prune
        if !incremental && !diff.deletes.is_empty() {
            let removed = remove_stale_files(&self.output_dir, &diff.deletes)?;
            tracing::info!(removed, "pruned stale files");
        }

        // 7. Persist
        let manifest = match (incremental, previous) {
            (true, Some(previous)) => previous.merged_with(&manifest),
            _ => manifest,
        };
        manifest.save(&manifest_path(&control_dir))?;

        if let Some(translations) = self.translations {
            let missing = translations.missing_translations();
            metrics.record_missing(&missing);
            if options.write_locales {
                for (locale, strings) in &missing {
                    let path = control_dir.join(LOCALES_DIR).join(format!("{locale}.yaml"));
                    write_atomic(&path, stub_table(strings)?.as_bytes())?;
                    tracing::info!(locale = %locale, missing = strings.len(), "wrote locale stub");
                }
            }
        }
        metrics.memory_usage_bytes = resident_memory_bytes();
        metrics.elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        write_atomic(
            &control_dir.join(METRICS_FILENAME),
            serde_json::to_string_pretty(&metrics)?.as_bytes(),
        )?;

        tracing::info!(
            adds = diff.adds.len(),
            edits = diff.edits.len(),
            deletes = diff.deletes.len(),
            elapsed_ms = metrics.elapsed_ms,
            "build complete"
        );

        // 8. Return
        let result = BuildResult {
            manifest,
            metrics,
            diff,
        };
        if let Some(hooks) = self.hooks {
            hooks.run_after_build(&result)?;
        }
        Ok(result)
    }

    /// Every route, restricted to those whose source matches `patterns`.
    fn collect(&self, patterns: &[String]) -> Result<Vec<Arc<Route>>, BuildError> {
        let routes = self.router.routes()?;
        if patterns.is_empty() {
            return Ok(routes);
        }
        let globs = compile_patterns(patterns)?;
        Ok(routes
            .into_iter()
            .filter(|route| {
                route.source_path().is_some_and(|source| {
                    let rel = source.strip_prefix(&self.root).unwrap_or(source);
                    globs.is_match(rel)
                })
            })
            .collect())
    }

    /// Turn routes into jobs: one per static route, one per static path of a
    /// dynamic route. Later routes win duplicate output paths.
    fn expand(&self, routes: &[Arc<Route>]) -> Result<(Vec<Job>, Vec<RouteFailure>), BuildError> {
        let mut by_output: BTreeMap<String, Job> = BTreeMap::new();
        let mut failures = Vec::new();

        let mut push = |route: &Arc<Route>, url_path: String, params: Params| {
            match output_path(&url_path) {
                Ok(output) => {
                    let job = Job {
                        route: Arc::clone(route),
                        url_path,
                        params,
                        output: output.clone(),
                    };
                    if let Some(previous) = by_output.insert(output.clone(), job) {
                        tracing::warn!(
                            output = %output,
                            shadowed = %previous.url_path,
                            "duplicate output path; later route wins"
                        );
                    }
                }
                Err(message) => failures.push(RouteFailure { url_path, message }),
            }
        };

        for route in routes {
            if !route.is_dynamic() {
                push(route, route.url_path().to_string(), Params::new());
                continue;
            }
            let paths = route.static_paths();
            if paths.is_empty() {
                tracing::debug!(route = %route.url_path(), "dynamic route has no static paths, skipped");
                continue;
            }
            for path in paths {
                match self.router.resolve(&path)? {
                    Some((resolved, params)) if Arc::ptr_eq(&resolved, route) => {
                        push(route, path, params)
                    }
                    _ => tracing::warn!(
                        route = %route.url_path(),
                        path = %path,
                        "static path resolves to a different route, skipped"
                    ),
                }
            }
        }
        Ok((by_output.into_values().collect(), failures))
    }
}

/// Render or copy one job into the staging area.
fn stage(staging: &StagingArea, job: &Job) -> Result<Staged, RouteFailure> {
    let fail = |message: String| RouteFailure {
        url_path: job.url_path.clone(),
        message,
    };
    let route = &job.route;
    let bytes = match route.kind() {
        RouteKind::StaticDir => {
            let source = route
                .source_path()
                .ok_or_else(|| fail("static route has no source file".to_string()))?;
            let path = staging
                .copy_in(&job.output, source)
                .map_err(|e| fail(format!("copy from {}: {e}", source.display())))?;
            file_len(&path).map_err(|e| fail(e.to_string()))?
        }
        RouteKind::Document | RouteKind::Custom => {
            let content = route.build(&job.params).map_err(|e| fail(e.to_string()))?;
            staging
                .write(&job.output, content.as_bytes())
                .map_err(|e| fail(e.to_string()))?;
            content.len() as u64
        }
    };
    tracing::debug!(route = %job.url_path, output = %job.output, bytes, "staged");
    Ok(Staged {
        output: job.output.clone(),
        kind: route.kind(),
        bytes,
    })
}

fn file_len(path: &Path) -> io::Result<u64> {
    Ok(std::fs::metadata(path)?.len())
}

fn worker_pool(configured: usize) -> Result<rayon::ThreadPool, rayon::ThreadPoolBuildError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(effective_workers(configured))
        .build()
}

/// Compile incremental-build patterns into one matcher.
pub fn compile_patterns(patterns: &[String]) -> Result<GlobSet, BuildError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| BuildError::Pattern {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| BuildError::Pattern {
        pattern: patterns.join(", "),
        source,
    })
}

/// File path, relative to the output directory, that a URL is written to.
///
/// Directory-style URLs and extensionless URLs become `index.html` files.
/// A URL with `.` or `..` segments, or one that lands inside the control
/// directory, is rejected.
pub fn output_path(url_path: &str) -> Result<String, String> {
    let trimmed = url_path.trim_start_matches('/');
    let out = if trimmed.is_empty() || trimmed.ends_with('/') {
        format!("{trimmed}index.html")
    } else {
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        if last.contains('.') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/index.html")
        }
    };
    if out.split('/').next() == Some(CONTROL_DIR) {
        return Err(format!("output path is reserved for build bookkeeping: {url_path}"));
    }
    if !is_contained_path(&out) {
        return Err(format!("output path escapes the output directory: {url_path}"));
    }
    Ok(out)
}
