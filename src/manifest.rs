//! Build manifests and the diff between two of them.
//!
//! Every build records which files it produced and a content hash for each:
//!
//! ```json
//! {
//!   "branch": "main",
//!   "built": "2026-10-18T09:12:44Z",
//!   "commit": { "sha": "…", "message": "…", "author": { "name": "…", "email": "…", "timestamp": "…" } },
//!   "files": [ { "path": "about/index.html", "sha": "9f86d0…" } ]
//! }
//! ```
//!
//! The manifest lives at `<output>/.control/manifest.json`. Comparing the new
//! manifest with the previous one by path and by hash yields the
//! [`BuildDiffPaths`] used to prune stale output and to report what changed.
//!
//! ## Hashing
//!
//! Hashes are SHA-256 over the exact bytes written, hex encoded. Each file is
//! hashed independently so the digests do not depend on build order or
//! platform.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory inside an output tree holding build bookkeeping.
pub const CONTROL_DIR: &str = ".control";

/// Name of the manifest file within a control directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("manifest {manifest} lists a path outside its tree: {entry}")]
    UnsafePath { manifest: PathBuf, entry: String },
}

/// One output file and the hash of its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub sha: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitAuthor {
    pub name: String,
    pub email: String,
    pub timestamp: String,
}

/// The commit the build was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub sha: String,
    pub message: String,
    pub author: CommitAuthor,
}

/// Record of one build's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub branch: Option<String>,
    pub built: String,
    pub commit: Option<CommitInfo>,
    pub files: Vec<FileEntry>,
}

impl BuildManifest {
    /// A manifest for `files`, sorted by path.
    pub fn new(
        branch: Option<String>,
        commit: Option<CommitInfo>,
        mut files: Vec<FileEntry>,
    ) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Self {
            branch,
            built: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            commit,
            files,
        }
    }

    /// Path → hash lookup.
    pub fn hashes(&self) -> BTreeMap<&str, &str> {
        self.files
            .iter()
            .map(|f| (f.path.as_str(), f.sha.as_str()))
            .collect()
    }

    /// Overlay `other`'s files on top of this manifest's (other wins), keeping
    /// `other`'s metadata.
    pub fn merged_with(&self, other: &BuildManifest) -> BuildManifest {
        let mut files: BTreeMap<&str, &str> = self.hashes();
        files.extend(other.hashes());
        BuildManifest {
            branch: other.branch.clone(),
            built: other.built.clone(),
            commit: other.commit.clone(),
            files: files
                .into_iter()
                .map(|(path, sha)| FileEntry {
                    path: path.to_string(),
                    sha: sha.to_string(),
                })
                .collect(),
        }
    }

    /// Load a manifest file. Returns `Ok(None)` if it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>, ManifestError> {
        let content = match fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut manifest: Self =
            serde_json::from_str(&content).map_err(|source| ManifestError::Json {
                path: path.to_path_buf(),
                source,
            })?;
        if let Some(bad) = manifest.files.iter().find(|f| !is_contained_path(&f.path)) {
            return Err(ManifestError::UnsafePath {
                manifest: path.to_path_buf(),
                entry: bad.path.clone(),
            });
        }
        manifest.files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(Some(manifest))
    }

    /// Write the manifest as pretty JSON, replacing any previous file in one
    /// rename.
    pub fn save(&self, path: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| ManifestError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, json.as_bytes())?;
        Ok(())
    }
}

/// Whether `path` names a file strictly inside the tree it is relative to.
///
/// Rejects empty and absolute paths, `.` and `..` segments, and anything
/// under [`CONTROL_DIR`].
pub fn is_contained_path(path: &str) -> bool {
    if path.is_empty() || path.contains('\\') || Path::new(path).is_absolute() {
        return false;
    }
    let segments: Vec<&str> = path.split('/').collect();
    segments[0] != CONTROL_DIR
        && segments
            .iter()
            .all(|s| !s.is_empty() && *s != "." && *s != "..")
}

/// Write `bytes` to a temporary sibling of `path`, then rename over `path`.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

/// Location of the manifest within a control directory.
pub fn manifest_path(control_dir: &Path) -> PathBuf {
    control_dir.join(MANIFEST_FILENAME)
}

/// Output paths grouped by how they changed between two manifests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDiffPaths {
    pub adds: Vec<String>,
    pub edits: Vec<String>,
    pub no_changes: Vec<String>,
    pub deletes: Vec<String>,
}

impl BuildDiffPaths {
    /// Compare `new` against `old`.
    ///
    /// A missing `old` makes every file an add. When `incremental` is set the
    /// new manifest only covers part of the site, so nothing is ever marked
    /// for deletion.
    pub fn compute(old: Option<&BuildManifest>, new: &BuildManifest, incremental: bool) -> Self {
        let old_hashes = old.map(BuildManifest::hashes).unwrap_or_default();
        let mut diff = Self::default();

        for file in &new.files {
            match old_hashes.get(file.path.as_str()) {
                None => diff.adds.push(file.path.clone()),
                Some(sha) if *sha != file.sha => diff.edits.push(file.path.clone()),
                Some(_) => diff.no_changes.push(file.path.clone()),
            }
        }

        if !incremental {
            let new_paths = new.hashes();
            diff.deletes = old_hashes
                .keys()
                .filter(|path| !new_paths.contains_key(*path))
                .map(|path| path.to_string())
                .collect();
        }

        diff.adds.sort();
        diff.edits.sort();
        diff.no_changes.sort();
        diff
    }

    /// Paths whose content must be written to the destination.
    pub fn changed(&self) -> impl Iterator<Item = &String> {
        self.adds.iter().chain(self.edits.iter())
    }

    pub fn is_unchanged(&self) -> bool {
        self.adds.is_empty() && self.edits.is_empty() && self.deletes.is_empty()
    }
}

/// SHA-256 of a file's contents, returned as a hex string.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let bytes = fs::read(path)?;
    Ok(hash_bytes(&bytes))
}

/// SHA-256 of `bytes`, returned as a hex string.
pub fn hash_bytes(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
