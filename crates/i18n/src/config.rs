use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Localization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocaleConfig {
    /// Locale used when no locale is requested and none has been set.
    pub default_locale: String,
    /// Second locale consulted when a key is missing.
    pub fallback_locale: String,
    /// Locales that may be selected or loaded. Empty means any.
    pub supported_locales: Vec<String>,
    /// Directory holding one `<locale>.json` file per locale.
    pub translations_path: Option<PathBuf>,
    /// Keep loaded files in memory instead of re-reading them per lookup.
    pub cache: bool,
}

impl Default for LocaleConfig {
    fn default() -> Self {
        LocaleConfig {
            default_locale: "en".to_string(),
            fallback_locale: "en".to_string(),
            supported_locales: vec!["en".to_string(), "es".to_string()],
            translations_path: None,
            cache: true,
        }
    }
}

impl LocaleConfig {
    pub fn new(default_locale: &str, fallback_locale: &str, supported: &[&str]) -> Self {
        LocaleConfig {
            default_locale: default_locale.to_string(),
            fallback_locale: fallback_locale.to_string(),
            supported_locales: supported.iter().map(|s| s.to_string()).collect(),
            ..LocaleConfig::default()
        }
    }

    pub fn with_translations_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.translations_path = Some(path.into());
        self
    }

    pub fn is_supported(&self, locale: &str) -> bool {
        self.supported_locales.is_empty() || self.supported_locales.iter().any(|l| l == locale)
    }
}
