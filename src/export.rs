//! Export: reconcile a finished build into a separately tracked publish tree.
//!
//! The export target keeps its own manifest (by default in
//! `<export_dir>/.control/`). Exporting diffs the build manifest against it
//! with the same algorithm a build uses, then:
//!
//! - copies adds and edits from the build directory
//! - deletes files the build no longer produces
//! - saves the build manifest as the export target's new manifest
//!
//! Unchanged files are never touched, so repeated exports of the same build
//! are cheap no-ops.

use crate::config::effective_workers;
use crate::manifest::{
    BuildDiffPaths, BuildManifest, CONTROL_DIR, ManifestError, manifest_path,
};
use crate::prune::{PruneError, remove_stale_files};
use crate::staging::copy_files;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("no build manifest at {0}; run a build first")]
    ManifestNotFound(PathBuf),
    #[error(transparent)]
    Manifest(#[from] ManifestError),
    #[error(transparent)]
    Prune(#[from] PruneError),
    #[error("failed to start worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}

/// Where to export from and to.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub build_dir: PathBuf,
    pub export_dir: PathBuf,
    /// Defaults to `<export_dir>/.control`.
    pub export_control_dir: Option<PathBuf>,
    /// Upper bound on concurrent file copies.
    pub concurrency: usize,
}

impl ExportOptions {
    pub fn new(build_dir: impl Into<PathBuf>, export_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
            export_dir: export_dir.into(),
            export_control_dir: None,
            concurrency: 2000,
        }
    }

    pub fn control_dir(&self) -> PathBuf {
        self.export_control_dir
            .clone()
            .unwrap_or_else(|| self.export_dir.join(CONTROL_DIR))
    }
}

#[derive(Debug, Clone)]
pub struct ExportResult {
    pub diff: BuildDiffPaths,
    pub copied: usize,
    pub removed: usize,
}

/// Bring `options.export_dir` in line with the build at `options.build_dir`.
pub fn export(options: &ExportOptions) -> Result<ExportResult, ExportError> {
    let build_manifest_path = manifest_path(&options.build_dir.join(CONTROL_DIR));
    let build = BuildManifest::load(&build_manifest_path)?
        .ok_or(ExportError::ManifestNotFound(build_manifest_path))?;

    let export_manifest_path = manifest_path(&options.control_dir());
    let previous = BuildManifest::load(&export_manifest_path)?;
    let diff = BuildDiffPaths::compute(previous.as_ref(), &build, false);

    let copied = copy_changed(&options.build_dir, &options.export_dir, &diff, options.concurrency)?;
    let removed = if diff.deletes.is_empty() {
        0
    } else {
        remove_stale_files(&options.export_dir, &diff.deletes)?
    };
    build.save(&export_manifest_path)?;

    tracing::info!(
        export_dir = %options.export_dir.display(),
        copied,
        removed,
        unchanged = diff.no_changes.len(),
        "export complete"
    );
    Ok(ExportResult {
        diff,
        copied,
        removed,
    })
}

fn copy_changed(
    from: &Path,
    to: &Path,
    diff: &BuildDiffPaths,
    concurrency: usize,
) -> Result<usize, ExportError> {
    let changed: Vec<&String> = diff.changed().collect();
    if changed.is_empty() {
        return Ok(0);
    }
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(effective_workers(concurrency))
        .build()?;
    Ok(copy_files(from, to, &changed, &pool)?)
}
