//! Staged writes and their commit into the output tree.
//!
//! A build never writes into the output directory while routes are still
//! rendering. Every file is first written under a [`StagingArea`], a uniquely
//! named directory created next to the output directory:
//!
//! ```text
//! site/
//! ├── build/                       ← output tree (only touched by commit)
//! └── .podsite-staging-a8Xq2/      ← staging root for one build
//!     ├── index.html
//!     └── about/index.html
//! ```
//!
//! Keeping the staging root on the same volume lets [`StagingArea::commit`]
//! move files with a plain rename. When a rename crosses devices anyway
//! (bind mounts, overlay filesystems) the file is copied instead. The staging
//! root is removed when the area is dropped, whether or not it was committed,
//! so a failed build leaves nothing behind.

use rayon::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const STAGING_PREFIX: &str = ".podsite-staging-";

/// Raw OS error for a rename across filesystems (EXDEV on Unix,
/// ERROR_NOT_SAME_DEVICE on Windows).
#[cfg(unix)]
const CROSS_DEVICE_OS_ERROR: i32 = 18;
#[cfg(windows)]
const CROSS_DEVICE_OS_ERROR: i32 = 17;
#[cfg(not(any(unix, windows)))]
const CROSS_DEVICE_OS_ERROR: i32 = -1;

/// How a file reached its destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transfer {
    Renamed,
    Copied,
}

/// Counts of files committed by each method.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CommitStats {
    pub renamed: usize,
    pub copied: usize,
}

impl CommitStats {
    pub fn total(&self) -> usize {
        self.renamed + self.copied
    }

    fn record(&mut self, transfer: Transfer) {
        match transfer {
            Transfer::Renamed => self.renamed += 1,
            Transfer::Copied => self.copied += 1,
        }
    }
}

/// A per-build staging root paired with the output tree it commits into.
#[derive(Debug)]
pub struct StagingArea {
    root: TempDir,
    output_dir: PathBuf,
}

impl StagingArea {
    /// Create a fresh staging root beside `output_dir`.
    pub fn create(output_dir: &Path) -> io::Result<Self> {
        let parent = match output_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        let root = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)?;
        Ok(Self {
            root,
            output_dir: output_dir.to_path_buf(),
        })
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Where the file for output path `rel` is written during the build.
    pub fn staging_path(&self, rel: &str) -> PathBuf {
        self.root.path().join(rel)
    }

    /// Where the file for output path `rel` ends up after commit.
    pub fn final_path(&self, rel: &str) -> PathBuf {
        self.output_dir.join(rel)
    }

    /// Write `bytes` to the staging path for `rel`, creating parent
    /// directories.
    pub fn write(&self, rel: &str, bytes: &[u8]) -> io::Result<PathBuf> {
        let path = self.staging_path(rel);
        ensure_parent(&path)?;
        fs::write(&path, bytes)?;
        Ok(path)
    }

    /// Copy `source` to the staging path for `rel`.
    pub fn copy_in(&self, rel: &str, source: &Path) -> io::Result<PathBuf> {
        let path = self.staging_path(rel);
        ensure_parent(&path)?;
        fs::copy(source, &path)?;
        Ok(path)
    }

    /// Move every staged file in `files` into the output tree.
    pub fn commit(&self, files: &[String], pool: &rayon::ThreadPool) -> io::Result<CommitStats> {
        self.commit_with(files, pool, |from, to| fs::rename(from, to))
    }

    /// [`commit`](Self::commit) with an injectable rename, so the
    /// cross-device fallback can be exercised.
    pub fn commit_with<R>(
        &self,
        files: &[String],
        pool: &rayon::ThreadPool,
        rename: R,
    ) -> io::Result<CommitStats>
    where
        R: Fn(&Path, &Path) -> io::Result<()> + Sync,
    {
        fs::create_dir_all(&self.output_dir)?;
        let transfers: Vec<Transfer> = pool.install(|| {
            files
                .par_iter()
                .map(|rel| {
                    move_file(&self.staging_path(rel), &self.final_path(rel), &rename)
                })
                .collect::<io::Result<_>>()
        })?;

        let mut stats = CommitStats::default();
        for transfer in transfers {
            stats.record(transfer);
        }
        tracing::debug!(
            renamed = stats.renamed,
            copied = stats.copied,
            "committed staged files"
        );
        Ok(stats)
    }
}

/// Move `from` to `to`, falling back to a copy when the rename crosses
/// filesystems. The source is left in place after a copy; it disappears with
/// its staging root.
pub fn move_file<R>(from: &Path, to: &Path, rename: &R) -> io::Result<Transfer>
where
    R: Fn(&Path, &Path) -> io::Result<()>,
{
    ensure_parent(to)?;
    match rename(from, to) {
        Ok(()) => Ok(Transfer::Renamed),
        Err(e) if is_cross_device(&e) => {
            tracing::debug!(from = %from.display(), to = %to.display(), "cross-device rename, copying");
            fs::copy(from, to)?;
            Ok(Transfer::Copied)
        }
        Err(e) => Err(e),
    }
}

/// Copy each of `files` from `src_root` to `dst_root`, preserving relative
/// paths.
pub fn copy_files(
    src_root: &Path,
    dst_root: &Path,
    files: &[&String],
    pool: &rayon::ThreadPool,
) -> io::Result<usize> {
    pool.install(|| {
        files.par_iter().try_for_each(|rel| {
            let to = dst_root.join(rel.as_str());
            ensure_parent(&to)?;
            fs::copy(src_root.join(rel.as_str()), &to).map(|_| ())
        })
    })?;
    Ok(files.len())
}

pub fn is_cross_device(err: &io::Error) -> bool {
    err.kind() == io::ErrorKind::CrossesDevices || err.raw_os_error() == Some(CROSS_DEVICE_OS_ERROR)
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(parent) => fs::create_dir_all(parent),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn pool() -> rayon::ThreadPool {
        rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn staging_root_is_sibling_of_output() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("build");
        let area = StagingArea::create(&output).unwrap();

        assert_eq!(area.root().parent().unwrap(), tmp.path());
        let name = area.root().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(STAGING_PREFIX));
        assert!(!output.exists(), "output must not be created before commit");
    }

    #[test]
    fn staging_roots_are_unique() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("build");
        let a = StagingArea::create(&output).unwrap();
        let b = StagingArea::create(&output).unwrap();
        assert_ne!(a.root(), b.root());
    }

    #[test]
    fn drop_removes_staging_root() {
        let tmp = TempDir::new().unwrap();
        let area = StagingArea::create(&tmp.path().join("build")).unwrap();
        area.write("a/index.html", b"x").unwrap();
        let root = area.root().to_path_buf();
        drop(area);
        assert!(!root.exists());
    }

    #[test]
    fn commit_moves_files_into_output() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("build");
        let area = StagingArea::create(&output).unwrap();
        area.write("index.html", b"home").unwrap();
        area.write("about/index.html", b"about").unwrap();

        let stats = area
            .commit(&paths(&["index.html", "about/index.html"]), &pool())
            .unwrap();

        assert_eq!(stats, CommitStats { renamed: 2, copied: 0 });
        assert_eq!(fs::read_to_string(output.join("index.html")).unwrap(), "home");
        assert_eq!(
            fs::read_to_string(output.join("about/index.html")).unwrap(),
            "about"
        );
        assert!(!area.staging_path("index.html").exists());
    }

    #[test]
    fn commit_overwrites_existing_output() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("build");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("index.html"), "old").unwrap();

        let area = StagingArea::create(&output).unwrap();
        area.write("index.html", b"new").unwrap();
        area.commit(&paths(&["index.html"]), &pool()).unwrap();

        assert_eq!(fs::read_to_string(output.join("index.html")).unwrap(), "new");
    }

    #[test]
    fn cross_device_rename_falls_back_to_copy() {
        let tmp = TempDir::new().unwrap();
        let output = tmp.path().join("build");
        let area = StagingArea::create(&output).unwrap();
        area.write("nested/page.html", b"payload").unwrap();

        let stats = area
            .commit_with(&paths(&["nested/page.html"]), &pool(), |_, _| {
                Err(io::Error::from(io::ErrorKind::CrossesDevices))
            })
            .unwrap();

        assert_eq!(stats, CommitStats { renamed: 0, copied: 1 });
        assert_eq!(
            fs::read_to_string(output.join("nested/page.html")).unwrap(),
            "payload"
        );
    }

    #[test]
    fn raw_exdev_is_cross_device() {
        let err = io::Error::from_raw_os_error(CROSS_DEVICE_OS_ERROR);
        assert!(is_cross_device(&err));
        assert!(!is_cross_device(&io::Error::from(io::ErrorKind::NotFound)));
    }

    #[test]
    fn other_rename_errors_propagate() {
        let tmp = TempDir::new().unwrap();
        let area = StagingArea::create(&tmp.path().join("build")).unwrap();
        area.write("a.html", b"a").unwrap();

        let result = area.commit_with(&paths(&["a.html"]), &pool(), |_, _| {
            Err(io::Error::from(io::ErrorKind::PermissionDenied))
        });
        assert_eq!(result.unwrap_err().kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn copy_files_preserves_relative_paths() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        let dst = tmp.path().join("dst");
        fs::create_dir_all(src.join("a")).unwrap();
        fs::write(src.join("a/b.html"), "b").unwrap();
        fs::write(src.join("c.css"), "c").unwrap();

        let files = paths(&["a/b.html", "c.css"]);
        let refs: Vec<&String> = files.iter().collect();
        assert_eq!(copy_files(&src, &dst, &refs, &pool()).unwrap(), 2);
        assert_eq!(fs::read_to_string(dst.join("a/b.html")).unwrap(), "b");
        assert!(src.join("c.css").exists(), "copy keeps the source");
    }
}
