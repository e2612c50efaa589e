//! Build metrics written to `.control/metrics.json`.

use crate::locale::MissingByLocale;
use crate::route::RouteKind;
use serde::Serialize;
use std::collections::BTreeMap;

/// File count and byte total for one kind of route.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutputTotals {
    pub files: usize,
    pub bytes: u64,
}

impl OutputTotals {
    fn add(&mut self, bytes: u64) {
        self.files += 1;
        self.bytes += bytes;
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildMetrics {
    /// Documents and custom routes.
    pub documents: OutputTotals,
    /// Files copied from static directories.
    pub static_files: OutputTotals,
    /// Number of distinct missing strings per locale.
    pub missing_translations: BTreeMap<String, usize>,
    /// Resident set size at build completion, where the platform reports it.
    pub memory_usage_bytes: Option<u64>,
    pub elapsed_ms: u64,
}

impl BuildMetrics {
    pub fn record(&mut self, kind: RouteKind, bytes: u64) {
        match kind {
            RouteKind::StaticDir => self.static_files.add(bytes),
            RouteKind::Document | RouteKind::Custom => self.documents.add(bytes),
        }
    }

    pub fn record_missing(&mut self, missing: &MissingByLocale) {
        self.missing_translations = missing
            .iter()
            .map(|(locale, strings)| (locale.clone(), strings.len()))
            .collect();
    }

    pub fn total_files(&self) -> usize {
        self.documents.files + self.static_files.files
    }

    pub fn total_bytes(&self) -> u64 {
        self.documents.bytes + self.static_files.bytes
    }
}

/// Resident memory of the current process in bytes.
#[cfg(target_os = "linux")]
pub fn resident_memory_bytes() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss(&status)
}

#[cfg(not(target_os = "linux"))]
pub fn resident_memory_bytes() -> Option<u64> {
    None
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_vm_rss(status: &str) -> Option<u64> {
    let line = status.lines().find(|l| l.starts_with("VmRSS:"))?;
    let kib: u64 = line
        .trim_start_matches("VmRSS:")
        .trim()
        .trim_end_matches("kB")
        .trim()
        .parse()
        .ok()?;
    Some(kib * 1024)
}
