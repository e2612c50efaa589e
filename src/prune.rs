//! Removal of output files that no longer belong to the site.
//!
//! Deletes are applied after a full build (or export) has committed its new
//! files. Each stale file is unlinked, then any directories it leaves empty
//! are removed, walking up until a non-empty directory or the tree root.
//!
//! A file that is already gone is not an error: another process may have
//! cleaned it up, or a previous interrupted run may have got there first.
//! Such cases are logged as warnings. Any other failure aborts.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PruneError {
    #[error("failed to remove stale file {path}: {source}")]
    Cleanup {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Delete each of `paths` (relative to `root`). Returns how many files were
/// actually removed.
pub fn remove_stale_files(root: &Path, paths: &[String]) -> Result<usize, PruneError> {
    let mut removed = 0;
    for rel in paths {
        let path = root.join(rel);
        match fs::remove_file(&path) {
            Ok(()) => {
                removed += 1;
                tracing::debug!(path = %rel, "removed stale file");
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!(path = %rel, "stale file already removed");
            }
            Err(source) => return Err(PruneError::Cleanup { path, source }),
        }
        remove_empty_parents(root, &path)?;
    }
    Ok(removed)
}

/// Remove empty directories from `path`'s parent up to (not including)
/// `root`.
fn remove_empty_parents(root: &Path, path: &Path) -> Result<(), PruneError> {
    let mut dir = path.parent();
    while let Some(current) = dir {
        if current == root || !current.starts_with(root) {
            break;
        }
        match fs::read_dir(current) {
            Ok(mut entries) => {
                if entries.next().is_some() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                dir = current.parent();
                continue;
            }
            Err(source) => {
                return Err(PruneError::Cleanup {
                    path: current.to_path_buf(),
                    source,
                });
            }
        }
        match fs::remove_dir(current) {
            Ok(()) => tracing::debug!(dir = %current.display(), "removed empty directory"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            // Something was written into it concurrently; leave it.
            Err(e) if e.kind() == io::ErrorKind::DirectoryNotEmpty => break,
            Err(source) => {
                return Err(PruneError::Cleanup {
                    path: current.to_path_buf(),
                    source,
                });
            }
        }
        dir = current.parent();
    }
    Ok(())
}
