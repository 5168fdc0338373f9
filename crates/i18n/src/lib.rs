//! formweave-i18n: locale-aware message resolution.
//!
//! Provides [`LocalizationResolver`], which resolves message keys through a
//! locale fallback chain, substitutes `{{name}}` placeholders, picks plural
//! forms and detects right-to-left scripts. English and Spanish catalogs
//! ship with the crate; JSON files under a configured directory are merged
//! over them on first use.
//!
//! # Process-wide default
//!
//! [`global`] returns a shared resolver, creating one with
//! [`LocaleConfig::default`] on first use. [`install_global`] replaces it
//! (returning the previous instance) and [`reset_global`] drops it so the
//! next [`global`] call starts fresh. Components that accept a resolver
//! explicitly should be handed one instead of reaching for the global.

mod catalog;
mod config;
mod error;
mod resolver;

use std::sync::{Arc, PoisonError, RwLock};

pub use catalog::{builtin, flatten, Catalog, BUILTIN_LOCALES};
pub use config::LocaleConfig;
pub use error::LocaleError;
pub use resolver::{
    base_language, interpolate, is_rtl, params, LocalizationResolver, Params, RTL_LOCALES,
};

static GLOBAL: RwLock<Option<Arc<LocalizationResolver>>> = RwLock::new(None);

/// The process-wide resolver, created with default settings on first use.
pub fn global() -> Arc<LocalizationResolver> {
    if let Some(r) = GLOBAL.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
        return Arc::clone(r);
    }
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(slot.get_or_insert_with(|| Arc::new(LocalizationResolver::default())))
}

/// Replace the process-wide resolver, returning the previous one.
pub fn install_global(resolver: Arc<LocalizationResolver>) -> Option<Arc<LocalizationResolver>> {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .replace(resolver)
}

/// Drop the process-wide resolver.
pub fn reset_global() {
    GLOBAL.write().unwrap_or_else(PoisonError::into_inner).take();
}
