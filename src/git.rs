//! Git metadata recorded in the build manifest.
//!
//! Read by shelling out to `git`; a pod outside a repository, or a machine
//! without git installed, simply builds with a null branch and commit.

use crate::manifest::{CommitAuthor, CommitInfo};
use std::path::Path;
use std::process::Command;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitInfo {
    pub branch: Option<String>,
    pub commit: Option<CommitInfo>,
}

/// `git log` format: one field per line.
const LOG_FORMAT: &str = "--format=%H%n%s%n%an%n%ae%n%aI";

impl GitInfo {
    /// Read branch and last commit for the repository containing `root`.
    pub fn discover(root: &Path) -> Self {
        let branch = git(root, &["rev-parse", "--abbrev-ref", "HEAD"])
            .filter(|b| !b.is_empty() && b != "HEAD");
        let commit = git(root, &["log", "-1", LOG_FORMAT]).and_then(|out| parse_log(&out));
        if branch.is_none() && commit.is_none() {
            tracing::debug!(root = %root.display(), "no git metadata");
        }
        Self { branch, commit }
    }
}

fn git(root: &Path, args: &[&str]) -> Option<String> {
    Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
}

fn parse_log(out: &str) -> Option<CommitInfo> {
    let mut lines = out.lines();
    let sha = lines.next()?.trim();
    if sha.is_empty() {
        return None;
    }
    let message = lines.next().unwrap_or_default();
    let name = lines.next().unwrap_or_default();
    let email = lines.next().unwrap_or_default();
    let timestamp = lines.next().unwrap_or_default();
    Some(CommitInfo {
        sha: sha.to_string(),
        message: message.to_string(),
        author: CommitAuthor {
            name: name.to_string(),
            email: email.to_string(),
            timestamp: timestamp.to_string(),
        },
    })
}
