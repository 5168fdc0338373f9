//! The localization resolver.
//!
//! Lookups walk `requested locale -> its base language -> fallback ->
//! default` and return the key itself when nothing matches. Catalogs live
//! behind a reader/writer lock as shared `Arc`s, so concurrent lookups only
//! ever take the read side; switching the current locale or loading a file
//! takes the write side briefly.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};

use crate::catalog::{self, Catalog};
use crate::config::LocaleConfig;
use crate::error::LocaleError;

/// Interpolation parameters, `name -> replacement`.
pub type Params = BTreeMap<String, String>;

/// Build [`Params`] from pairs.
pub fn params<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: ToString,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.to_string()))
        .collect()
}

/// Locales written right to left when a schema declares nothing.
pub const RTL_LOCALES: &[&str] = &["ar", "he", "fa", "ur"];

/// Whether `locale` is written right to left.
///
/// An explicit entry in `directions` (locale -> `rtl`/`ltr`) wins over the
/// built-in set. Region subtags are ignored for the built-in check.
pub fn is_rtl(locale: &str, directions: Option<&BTreeMap<String, String>>) -> bool {
    if let Some(dir) = directions.and_then(|d| d.get(locale).or_else(|| d.get(base_language(locale)))) {
        return dir.eq_ignore_ascii_case("rtl");
    }
    RTL_LOCALES.contains(&base_language(locale))
}

/// `es-MX` and `es_MX` -> `es`.
pub fn base_language(locale: &str) -> &str {
    locale.split(['-', '_']).next().unwrap_or(locale)
}

/// Replace `{{name}}` (or `{{.name}}`) placeholders from `params`.
///
/// Placeholders without a matching parameter are left as written.
pub fn interpolate(template: &str, params: &Params) -> String {
    if params.is_empty() || !template.contains("{{") {
        return template.to_string();
    }
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let name = after[..end].trim().trim_start_matches('.');
                match params.get(name) {
                    Some(v) => out.push_str(v),
                    None => out.push_str(&rest[start..start + 2 + end + 2]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

struct State {
    current: String,
    catalogs: HashMap<String, Arc<Catalog>>,
    /// Keys added at runtime; they win over bundled and file entries.
    added: HashMap<String, Catalog>,
    files_loaded: HashSet<String>,
}

pub struct LocalizationResolver {
    config: LocaleConfig,
    state: RwLock<State>,
}

impl std::fmt::Debug for LocalizationResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizationResolver")
            .field("config", &self.config)
            .field("current", &self.current_locale())
            .finish()
    }
}

impl Default for LocalizationResolver {
    fn default() -> Self {
        LocalizationResolver::new(LocaleConfig::default())
    }
}

impl LocalizationResolver {
    /// Create a resolver preloaded with the bundled catalogs.
    pub fn new(config: LocaleConfig) -> Self {
        let catalogs = catalog::BUILTIN_LOCALES
            .iter()
            .filter_map(|l| catalog::builtin(l).map(|c| (l.to_string(), Arc::new(c))))
            .collect();
        LocalizationResolver {
            state: RwLock::new(State {
                current: config.default_locale.clone(),
                catalogs,
                added: HashMap::new(),
                files_loaded: HashSet::new(),
            }),
            config,
        }
    }

    pub fn config(&self) -> &LocaleConfig {
        &self.config
    }

    pub fn current_locale(&self) -> String {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    /// Switch the locale used when callers do not name one.
    pub fn set_locale(&self, locale: &str) -> Result<(), LocaleError> {
        if !self.config.is_supported(locale) {
            return Err(LocaleError::Unsupported {
                locale: locale.to_string(),
            });
        }
        self.ensure_loaded(locale);
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .current = locale.to_string();
        Ok(())
    }

    /// Resolve `key`, substituting `params`. Returns `key` when untranslated.
    pub fn get(&self, key: &str, params: &Params, locale: Option<&str>) -> String {
        match self.translate(key, locale) {
            Some(template) => interpolate(&template, params),
            None => key.to_string(),
        }
    }

    /// The raw template for `key`, or `None` when no locale in the chain has it.
    pub fn translate(&self, key: &str, locale: Option<&str>) -> Option<String> {
        let requested = match locale {
            Some(l) => l.to_string(),
            None => self.current_locale(),
        };
        let chain = self.chain(&requested);
        for l in &chain {
            self.ensure_loaded(l);
        }
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        chain
            .iter()
            .find_map(|l| state.catalogs.get(l).and_then(|c| c.get(key)).cloned())
    }

    /// Whether any locale in the chain for `locale` defines `key`.
    pub fn has_key(&self, key: &str, locale: Option<&str>) -> bool {
        self.translate(key, locale).is_some()
    }

    /// Resolve `base.one` when `count == 1`, `base.other` otherwise.
    ///
    /// `count` is added to the parameters. Falls back to `base` itself, then
    /// to the literal key.
    pub fn get_plural(&self, base: &str, count: i64, params: &Params, locale: Option<&str>) -> String {
        let form = if count == 1 { "one" } else { "other" };
        let mut params = params.clone();
        params.insert("count".to_string(), count.to_string());
        let key = format!("{}.{}", base, form);
        match self
            .translate(&key, locale)
            .or_else(|| self.translate(base, locale))
        {
            Some(template) => interpolate(&template, &params),
            None => key,
        }
    }

    /// Merge nested translations into `locale`'s catalog.
    pub fn add_translations(&self, locale: &str, translations: &serde_json::Value) {
        let flat = catalog::flatten(translations);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let merged = merge(state.catalogs.get(locale).map(Arc::as_ref), flat.clone());
        state.catalogs.insert(locale.to_string(), Arc::new(merged));
        state
            .added
            .entry(locale.to_string())
            .or_default()
            .extend(flat);
    }

    /// Read `<translations_path>/<locale>.json` and merge it over the
    /// bundled catalog. Keys from [`add_translations`](Self::add_translations)
    /// stay on top. Returns the number of keys loaded.
    pub fn load_locale_file(&self, locale: &str) -> Result<usize, LocaleError> {
        let path = self.file_path(locale)?;
        let text = std::fs::read_to_string(&path).map_err(|source| LocaleError::Io {
            path: path.clone(),
            source,
        })?;
        let json: serde_json::Value =
            serde_json::from_str(&text).map_err(|source| LocaleError::Parse {
                path: path.clone(),
                source,
            })?;
        let flat = catalog::flatten(&json);
        let count = flat.len();
        let mut base = catalog::builtin(locale).unwrap_or_default();
        base.extend(flat);
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(added) = state.added.get(locale) {
            base.extend(added.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        state.catalogs.insert(locale.to_string(), Arc::new(base));
        state.files_loaded.insert(locale.to_string());
        log::debug!("loaded {} translation key(s) for '{}' from {}", count, locale, path.display());
        Ok(count)
    }

    /// Locales with a catalog in memory.
    pub fn loaded_locales(&self) -> Vec<String> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let mut locales: Vec<String> = state.catalogs.keys().cloned().collect();
        locales.sort();
        locales
    }

    /// Whether `locale` is right to left, honoring a schema's direction map.
    pub fn is_rtl(&self, locale: &str, directions: Option<&BTreeMap<String, String>>) -> bool {
        is_rtl(locale, directions)
    }

    /// `rtl` or `ltr`.
    pub fn direction(&self, locale: &str, directions: Option<&BTreeMap<String, String>>) -> &'static str {
        if is_rtl(locale, directions) {
            "rtl"
        } else {
            "ltr"
        }
    }

    fn file_path(&self, locale: &str) -> Result<PathBuf, LocaleError> {
        self.config
            .translations_path
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", locale)))
            .ok_or(LocaleError::NoPath)
    }

    /// The ordered, de-duplicated lookup chain for `requested`.
    fn chain(&self, requested: &str) -> Vec<String> {
        let mut chain: Vec<String> = Vec::with_capacity(4);
        let mut push = |l: &str, gated: bool| {
            if (!gated || self.config.is_supported(l)) && !chain.iter().any(|c| c == l) {
                chain.push(l.to_string());
            }
        };
        push(requested, true);
        push(base_language(requested), true);
        push(&self.config.fallback_locale, false);
        push(&self.config.default_locale, false);
        chain
    }

    /// Load a locale's file on first use (or every use when caching is off).
    fn ensure_loaded(&self, locale: &str) {
        if self.config.translations_path.is_none() || !self.config.is_supported(locale) {
            return;
        }
        if self.config.cache {
            let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
            if state.files_loaded.contains(locale) {
                return;
            }
        }
        match self.load_locale_file(locale) {
            Ok(_) => {}
            Err(LocaleError::Io { source, .. }) if source.kind() == std::io::ErrorKind::NotFound => {
                self.mark_loaded(locale);
            }
            Err(e) => {
                log::warn!("{}", e);
                self.mark_loaded(locale);
            }
        }
    }

    fn mark_loaded(&self, locale: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .files_loaded
            .insert(locale.to_string());
    }
}

fn merge(existing: Option<&Catalog>, additions: Catalog) -> Catalog {
    let mut merged = existing.cloned().unwrap_or_default();
    merged.extend(additions);
    merged
}
