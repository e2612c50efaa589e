//! Translation lookup and missing-translation tracking.
//!
//! Each non-default locale has a flat YAML table of `source string →
//! translation` under the translations directory:
//!
//! ```text
//! translations/
//! ├── de.yaml
//! └── fr.yaml
//! ```
//!
//! Lookups for strings absent from a locale's table fall back to the source
//! string and are recorded. The builder consumes the recorded misses through
//! [`MissingTranslations`] to report counts in the metrics file and, when
//! asked, to write stub tables that translators can fill in.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LocaleError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid translation table {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Strings requested but not found, keyed by locale id.
pub type MissingByLocale = BTreeMap<String, BTreeSet<String>>;

/// Read-only view of translation misses, consumed by the builder.
pub trait MissingTranslations: Send + Sync {
    fn missing_translations(&self) -> MissingByLocale;
}

/// Translation tables for every configured locale.
#[derive(Debug, Default)]
pub struct Catalog {
    default_locale: String,
    tables: BTreeMap<String, BTreeMap<String, String>>,
    missing: Mutex<MissingByLocale>,
}

impl Catalog {
    /// A catalog with no tables: every non-default lookup is a miss.
    pub fn new(default_locale: impl Into<String>) -> Self {
        Self {
            default_locale: default_locale.into(),
            ..Default::default()
        }
    }

    /// Load `<dir>/<locale>.yaml` for each locale. A missing file is an empty
    /// table.
    pub fn load(dir: &Path, default_locale: &str, locales: &[String]) -> Result<Self, LocaleError> {
        let mut catalog = Self::new(default_locale);
        for locale in locales.iter().filter(|l| *l != default_locale) {
            let path = dir.join(format!("{locale}.yaml"));
            let table = if path.exists() {
                let content = fs::read_to_string(&path)?;
                parse_table(&content).map_err(|source| LocaleError::Yaml {
                    path: path.clone(),
                    source,
                })?
            } else {
                BTreeMap::new()
            };
            catalog.tables.insert(locale.clone(), table);
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, locale: &str, source: &str, translation: &str) {
        self.tables
            .entry(locale.to_string())
            .or_default()
            .insert(source.to_string(), translation.to_string());
    }

    pub fn default_locale(&self) -> &str {
        &self.default_locale
    }

    /// Translate `source` into `locale`, recording a miss when the table has
    /// no entry (or an empty one).
    pub fn translate(&self, locale: &str, source: &str) -> String {
        if locale == self.default_locale {
            return source.to_string();
        }
        match self.tables.get(locale).and_then(|t| t.get(source)) {
            Some(translation) if !translation.is_empty() => translation.clone(),
            _ => {
                self.record_missing(locale, source);
                source.to_string()
            }
        }
    }

    fn record_missing(&self, locale: &str, source: &str) {
        let mut missing = match self.missing.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        missing
            .entry(locale.to_string())
            .or_default()
            .insert(source.to_string());
    }

    /// Forget recorded misses. Called when the pod is invalidated.
    pub fn clear_missing(&self) {
        match self.missing.lock() {
            Ok(mut guard) => guard.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl MissingTranslations for Catalog {
    fn missing_translations(&self) -> MissingByLocale {
        match self.missing.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

fn parse_table(content: &str) -> Result<BTreeMap<String, String>, serde_yaml::Error> {
    if content.trim().is_empty() {
        return Ok(BTreeMap::new());
    }
    let table: Option<BTreeMap<String, Option<String>>> = serde_yaml::from_str(content)?;
    Ok(table
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect())
}

/// Render a stub table listing `strings` with empty translations.
pub fn stub_table(strings: &BTreeSet<String>) -> Result<String, serde_yaml::Error> {
    let table: BTreeMap<&str, &str> = strings.iter().map(|s| (s.as_str(), "")).collect();
    serde_yaml::to_string(&table)
}
