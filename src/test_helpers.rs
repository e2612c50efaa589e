//! Shared test utilities for the podsite test suite.
//!
//! Provides a fixture pod, small file helpers, and lookups over build
//! results that panic with a descriptive message on a miss.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let pod = Pod::open(tmp.path()).unwrap();
//! let result = pod.build(&BuildOptions::default()).unwrap();
//!
//! let entry = find_file(&result.manifest, "about/index.html");
//! assert_eq!(read_output(&pod.output_dir(), &entry.path), "...");
//! ```

use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::manifest::{BuildManifest, FileEntry};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/pod/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/pod");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

/// Write `body` to `root/rel`, creating parent directories.
pub fn write_file(root: &Path, rel: &str, body: &str) {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, body).unwrap_or_else(|e| panic!("write {}: {e}", path.display()));
}

/// Read an output file as a string. Panics with the directory listing if the
/// file is missing.
pub fn read_output(output_dir: &Path, rel: &str) -> String {
    let path = output_dir.join(rel);
    fs::read_to_string(&path).unwrap_or_else(|e| {
        let listing = list_files(output_dir);
        panic!("output '{rel}' unreadable ({e}). Present: {listing:?}")
    })
}

/// Every file under `dir` as sorted `/`-separated relative paths.
pub fn list_files(dir: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(dir)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();
    files
}

// =========================================================================
// Manifest lookups
// =========================================================================

/// Find a manifest entry by output path. Panics if not found.
pub fn find_file<'a>(manifest: &'a BuildManifest, path: &str) -> &'a FileEntry {
    manifest
        .files
        .iter()
        .find(|f| f.path == path)
        .unwrap_or_else(|| {
            let paths = manifest_paths(manifest);
            panic!("manifest entry '{path}' not found. Available: {paths:?}")
        })
}

/// All output paths in manifest order.
pub fn manifest_paths(manifest: &BuildManifest) -> Vec<&str> {
    manifest.files.iter().map(|f| f.path.as_str()).collect()
}
