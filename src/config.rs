//! Pod configuration module.
//!
//! Handles loading, validating, and merging `podsite.toml`. A pod root holds at
//! most one config file; its values are laid over the stock defaults, so a
//! file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! my-site/
//! ├── podsite.toml          # Optional, overrides stock defaults
//! ├── content/              # Markdown documents
//! │   ├── index.md
//! │   └── blog/
//! │       └── first-post.md
//! ├── static/               # Copied byte-for-byte
//! ├── translations/
//! │   └── de.yaml
//! └── build/                # Output tree (created by `podsite build`)
//!     └── .control/
//!         ├── manifest.json
//!         └── metrics.json
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! content_dir = "content"
//! output_dir = "build"
//! site_title = "Untitled"
//!
//! [[static_dirs]]
//! path = "static"           # Relative to the pod root
//! serve_at = "/static/"     # URL prefix, must start and end with "/"
//!
//! [build]
//! build_concurrency = 40    # Route build/copy workers
//! commit_concurrency = 2000 # Staged-file move workers
//!
//! [localization]
//! default_locale = "en"
//! locales = []              # Extra locales, each served under /<locale>/
//! translations_dir = "translations"
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// File name of the pod config, looked up in the pod root.
pub const CONFIG_FILENAME: &str = "podsite.toml";

/// Upper bound on OS threads in either worker pool.
pub const MAX_WORKERS: usize = 256;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pod configuration loaded from `podsite.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PodConfig {
    /// Directory of markdown documents, relative to the pod root.
    pub content_dir: String,
    /// Build output directory, relative to the pod root.
    pub output_dir: String,
    /// Site title used by the document layout.
    pub site_title: String,
    /// Static directory trees served verbatim.
    pub static_dirs: Vec<StaticDirConfig>,
    pub build: BuildConfig,
    pub localization: LocalizationConfig,
}

impl Default for PodConfig {
    fn default() -> Self {
        Self {
            content_dir: "content".to_string(),
            output_dir: "build".to_string(),
            site_title: "Untitled".to_string(),
            static_dirs: Vec::new(),
            build: BuildConfig::default(),
            localization: LocalizationConfig::default(),
        }
    }
}

impl PodConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.build.build_concurrency == 0 {
            return Err(ConfigError::Validation(
                "build.build_concurrency must be greater than 0".into(),
            ));
        }
        if self.build.commit_concurrency == 0 {
            return Err(ConfigError::Validation(
                "build.commit_concurrency must be greater than 0".into(),
            ));
        }
        for dir in &self.static_dirs {
            if !dir.serve_at.starts_with('/') || !dir.serve_at.ends_with('/') {
                return Err(ConfigError::Validation(format!(
                    "static_dirs.serve_at must start and end with '/': {:?}",
                    dir.serve_at
                )));
            }
        }
        let l10n = &self.localization;
        if l10n.default_locale.is_empty() {
            return Err(ConfigError::Validation(
                "localization.default_locale must not be empty".into(),
            ));
        }
        if l10n.locales.contains(&l10n.default_locale) {
            return Err(ConfigError::Validation(format!(
                "localization.locales must not repeat the default locale {:?}",
                l10n.default_locale
            )));
        }
        if l10n.locales.iter().any(|l| l.is_empty() || l.contains('/')) {
            return Err(ConfigError::Validation(
                "localization.locales entries must be non-empty and contain no '/'".into(),
            ));
        }
        Ok(())
    }
}

/// One static directory tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StaticDirConfig {
    pub path: String,
    pub serve_at: String,
}

/// Worker pool sizes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Upper bound on concurrent route builds.
    pub build_concurrency: usize,
    /// Upper bound on concurrent staged-file moves.
    pub commit_concurrency: usize,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            build_concurrency: 40,
            commit_concurrency: 2000,
        }
    }
}

/// Resolve a configured concurrency to a worker thread count.
///
/// The configured value is an upper bound on in-flight operations; the
/// thread count is clamped to `[1, MAX_WORKERS]`.
pub fn effective_workers(configured: usize) -> usize {
    configured.clamp(1, MAX_WORKERS)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalizationConfig {
    pub default_locale: String,
    /// Locales other than the default.
    pub locales: Vec<String>,
    /// Directory of `<locale>.yaml` translation tables, relative to the pod root.
    pub translations_dir: String,
}

impl Default for LocalizationConfig {
    fn default() -> Self {
        Self {
            default_locale: "en".to_string(),
            locales: Vec::new(),
            translations_dir: "translations".to_string(),
        }
    }
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PodConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay, arrays included, replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `podsite.toml` from a pod root as a raw TOML value.
///
/// Returns `Ok(None)` if the pod has no config file.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<PodConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PodConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config of the pod at `root`.
pub fn load_config(root: &Path) -> Result<PodConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Returns a fully-commented stock `podsite.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Podsite Configuration
# =====================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# This file lives in the pod root as podsite.toml.
# Unknown keys will cause an error.

# Directory of markdown documents, relative to the pod root.
content_dir = "content"

# Build output directory, relative to the pod root.
output_dir = "build"

# Title shown in the document layout.
site_title = "Untitled"

# ---------------------------------------------------------------------------
# Static directories
# ---------------------------------------------------------------------------
# Each entry copies a directory tree into the output byte-for-byte.
# serve_at must start and end with "/".
#
# [[static_dirs]]
# path = "static"
# serve_at = "/static/"

# ---------------------------------------------------------------------------
# Build
# ---------------------------------------------------------------------------
[build]
# Maximum concurrent route builds (rendering and static copies).
build_concurrency = 40

# Maximum concurrent moves from the staging area into the output tree.
# Worker threads are capped at 256 regardless of this value.
commit_concurrency = 2000

# ---------------------------------------------------------------------------
# Localization
# ---------------------------------------------------------------------------
[localization]
# Locale of the unprefixed routes.
default_locale = "en"

# Additional locales. Each document is also built under /<locale>/.
locales = []

# Directory of <locale>.yaml translation tables, relative to the pod root.
translations_dir = "translations"
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = PodConfig::default();
        assert_eq!(config.content_dir, "content");
        assert_eq!(config.output_dir, "build");
        assert!(config.static_dirs.is_empty());
        assert_eq!(config.build.build_concurrency, 40);
        assert_eq!(config.build.commit_concurrency, 2000);
        assert_eq!(config.localization.default_locale, "en");
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
site_title = "Field Notes"

[build]
build_concurrency = 8
"#;
        let config: PodConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.site_title, "Field Notes");
        assert_eq!(config.build.build_concurrency, 8);
        // Defaults preserved
        assert_eq!(config.build.commit_concurrency, 2000);
        assert_eq!(config.content_dir, "content");
    }

    #[test]
    fn parse_static_dirs() {
        let toml = r#"
[[static_dirs]]
path = "static"
serve_at = "/static/"

[[static_dirs]]
path = "assets/img"
serve_at = "/img/"
"#;
        let config: PodConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.static_dirs.len(), 2);
        assert_eq!(config.static_dirs[1].path, "assets/img");
        assert_eq!(config.static_dirs[1].serve_at, "/img/");
    }

    // =========================================================================
    // Worker pool sizing
    // =========================================================================

    #[test]
    fn effective_workers_passes_small_values() {
        assert_eq!(effective_workers(40), 40);
    }

    #[test]
    fn effective_workers_clamps_large_values() {
        assert_eq!(effective_workers(2000), MAX_WORKERS);
    }

    #[test]
    fn effective_workers_never_zero() {
        assert_eq!(effective_workers(0), 1);
    }

    // =========================================================================
    // merge_toml tests
    // =========================================================================

    #[test]
    fn merge_toml_scalar_override() {
        let base: toml::Value = toml::from_str(r#"output_dir = "build""#).unwrap();
        let overlay: toml::Value = toml::from_str(r#"output_dir = "public""#).unwrap();
        let merged = merge_toml(base, overlay);
        assert_eq!(merged.get("output_dir").unwrap().as_str(), Some("public"));
    }

    #[test]
    fn merge_toml_table_merge() {
        let base: toml::Value = toml::from_str(
            r#"
[build]
build_concurrency = 40
commit_concurrency = 2000
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[build]
build_concurrency = 4
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let build = merged.get("build").unwrap();
        assert_eq!(build.get("build_concurrency").unwrap().as_integer(), Some(4));
        assert_eq!(
            build.get("commit_concurrency").unwrap().as_integer(),
            Some(2000)
        );
    }

    #[test]
    fn merge_toml_arrays_replace() {
        let base: toml::Value = toml::from_str(
            r#"
[localization]
locales = ["de", "fr"]
"#,
        )
        .unwrap();
        let overlay: toml::Value = toml::from_str(
            r#"
[localization]
locales = ["es"]
"#,
        )
        .unwrap();
        let merged = merge_toml(base, overlay);
        let locales = merged
            .get("localization")
            .unwrap()
            .get("locales")
            .unwrap()
            .as_array()
            .unwrap();
        assert_eq!(locales.len(), 1);
    }

    // =========================================================================
    // Unknown key rejection tests
    // =========================================================================

    #[test]
    fn unknown_key_rejected() {
        let toml_str = r#"
[build]
build_concurency = 4
"#;
        let result: Result<PodConfig, _> = toml::from_str(toml_str);
        let err = result.unwrap_err().to_string();
        assert!(err.contains("unknown field"));
    }

    #[test]
    fn unknown_section_rejected() {
        let result: Result<PodConfig, _> = toml::from_str("[deploy]\ntarget = \"s3\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn unknown_static_dir_key_rejected() {
        let toml_str = r#"
[[static_dirs]]
path = "static"
serve_at = "/static/"
mount = "/s/"
"#;
        let result: Result<PodConfig, _> = toml::from_str(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_key_rejected_via_load_config() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "outptu_dir = \"x\"\n").unwrap();
        assert!(load_config(tmp.path()).is_err());
    }

    // =========================================================================
    // Validation tests
    // =========================================================================

    #[test]
    fn validate_default_config_passes() {
        assert!(PodConfig::default().validate().is_ok());
    }

    #[test]
    fn validate_zero_concurrency() {
        let mut config = PodConfig::default();
        config.build.build_concurrency = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("build_concurrency"));

        let mut config = PodConfig::default();
        config.build.commit_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_serve_at_slashes() {
        let mut config = PodConfig::default();
        config.static_dirs.push(StaticDirConfig {
            path: "static".into(),
            serve_at: "/static".into(),
        });
        assert!(config.validate().is_err());

        config.static_dirs[0].serve_at = "static/".into();
        assert!(config.validate().is_err());

        config.static_dirs[0].serve_at = "/".into();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_locales() {
        let mut config = PodConfig::default();
        config.localization.locales = vec!["en".into()];
        assert!(config.validate().is_err());

        config.localization.locales = vec!["de".into()];
        assert!(config.validate().is_ok());

        config.localization.default_locale = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn load_config_validates_values() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            "[build]\ncommit_concurrency = 0\n",
        )
        .unwrap();
        let result = load_config(tmp.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    // =========================================================================
    // load_config / load_raw_config tests
    // =========================================================================

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output_dir, "build");
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join(CONFIG_FILENAME),
            r#"
output_dir = "public"

[[static_dirs]]
path = "static"
serve_at = "/static/"

[localization]
locales = ["de"]
"#,
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.output_dir, "public");
        assert_eq!(config.static_dirs.len(), 1);
        assert_eq!(config.localization.locales, vec!["de"]);
        assert_eq!(config.localization.translations_dir, "translations");
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(CONFIG_FILENAME), "output_dir = [").unwrap();
        assert!(matches!(
            load_config(tmp.path()),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn load_raw_config_returns_none_when_no_file() {
        let tmp = TempDir::new().unwrap();
        assert!(load_raw_config(tmp.path()).unwrap().is_none());
    }

    // =========================================================================
    // stock_config_toml tests
    // =========================================================================

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let config: PodConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(config.content_dir, "content");
        assert_eq!(config.build.build_concurrency, 40);
        assert_eq!(config.build.commit_concurrency, 2000);
        assert_eq!(config.localization.default_locale, "en");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let content = stock_config_toml();
        assert!(content.contains("[[static_dirs]]"));
        assert!(content.contains("[build]"));
        assert!(content.contains("[localization]"));
    }

    #[test]
    fn stock_defaults_value_has_all_sections() {
        let val = stock_defaults_value();
        assert!(val.is_table());
        assert!(val.get("build").is_some());
        assert!(val.get("localization").is_some());
        assert!(val.get("static_dirs").is_some());
    }
}
