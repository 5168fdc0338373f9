//! Fallback chains, translation files and concurrent locale switching.

use std::sync::Arc;
use std::thread;

use formweave_i18n::{params, LocaleConfig, LocaleError, LocalizationResolver, Params};

fn en_es() -> LocalizationResolver {
    LocalizationResolver::new(LocaleConfig::new("en", "en", &["en", "es"]))
}

#[test]
fn fallback_chain() {
    let r = en_es();
    let p = params([("field", "Email")]);
    assert_eq!(r.get("validation.required", &p, Some("es")), "Email es requerido");
    assert_eq!(r.get("validation.required", &p, Some("de")), "Email is required");
    assert_eq!(r.get("unknown.key", &Params::new(), Some("en")), "unknown.key");
}

#[test]
fn files_merge_over_builtin_and_load_lazily() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("es.json"),
        r#"{"validation": {"required": "Falta {{field}}"}, "greeting": {"hello": "Hola"}}"#,
    )
    .unwrap();
    std::fs::write(dir.path().join("fr.json"), r#"{"greeting": {"hello": "Bonjour"}}"#).unwrap();

    let config = LocaleConfig::new("en", "en", &["en", "es"]).with_translations_path(dir.path());
    let r = LocalizationResolver::new(config);
    let p = params([("field", "Email")]);

    assert_eq!(r.get("validation.required", &p, Some("es")), "Falta Email");
    assert_eq!(r.get("greeting.hello", &p, Some("es")), "Hola");
    // Keys the file does not override keep their bundled text.
    assert_eq!(r.get("actions.cancel", &p, Some("es")), "Cancelar");
    // fr is not supported, so its file is never read.
    assert_eq!(r.get("greeting.hello", &p, Some("fr")), "greeting.hello");
    assert!(!r.loaded_locales().contains(&"fr".to_string()));
}

#[test]
fn cached_files_are_read_once() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("es.json");
    std::fs::write(&file, r#"{"k": "uno"}"#).unwrap();
    let config = LocaleConfig::new("en", "en", &["en", "es"]).with_translations_path(dir.path());
    let r = LocalizationResolver::new(config);
    assert_eq!(r.get("k", &Params::new(), Some("es")), "uno");
    std::fs::write(&file, r#"{"k": "dos"}"#).unwrap();
    assert_eq!(r.get("k", &Params::new(), Some("es")), "uno");
    // An explicit reload picks up the change.
    r.load_locale_file("es").unwrap();
    assert_eq!(r.get("k", &Params::new(), Some("es")), "dos");
}

#[test]
fn uncached_files_are_reread() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("es.json");
    std::fs::write(&file, r#"{"k": "uno"}"#).unwrap();
    let mut config = LocaleConfig::new("en", "en", &["en", "es"]).with_translations_path(dir.path());
    config.cache = false;
    let r = LocalizationResolver::new(config);
    assert_eq!(r.get("k", &Params::new(), Some("es")), "uno");
    std::fs::write(&file, r#"{"k": "dos"}"#).unwrap();
    assert_eq!(r.get("k", &Params::new(), Some("es")), "dos");
}

#[test]
fn runtime_translations_survive_file_loads() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("en.json");
    std::fs::write(&file, r#"{"forms": {"title": "From file", "footer": "Bye"}}"#).unwrap();
    let mut config = LocaleConfig::new("en", "en", &["en", "es"]).with_translations_path(dir.path());
    config.cache = false;
    let r = LocalizationResolver::new(config);

    r.add_translations("en", &serde_json::json!({"forms": {"title": "Hello"}}));
    assert_eq!(r.get("forms.title", &Params::new(), Some("en")), "Hello");
    assert_eq!(r.get("forms.footer", &Params::new(), Some("en")), "Bye");

    std::fs::write(&file, r#"{"forms": {"title": "Edited", "footer": "Later"}}"#).unwrap();
    assert_eq!(r.get("forms.title", &Params::new(), Some("en")), "Hello");
    assert_eq!(r.get("forms.footer", &Params::new(), Some("en")), "Later");
}

#[test]
fn malformed_file_reports_parse_error_and_lookups_still_work() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("es.json"), "{not json").unwrap();
    let config = LocaleConfig::new("en", "en", &["en", "es"]).with_translations_path(dir.path());
    let r = LocalizationResolver::new(config);
    assert!(matches!(r.load_locale_file("es"), Err(LocaleError::Parse { .. })));
    assert_eq!(r.get("actions.save", &Params::new(), Some("es")), "Guardar");
}

#[test]
fn concurrent_locale_switch_never_yields_partial_strings() {
    let r = Arc::new(en_es());
    let key = "validation.required";
    let p = params([("field", "Email")]);
    let english = r.get(key, &p, Some("en"));
    let spanish = r.get(key, &p, Some("es"));

    let mut handles = Vec::new();
    for w in 0..2 {
        let r = Arc::clone(&r);
        handles.push(thread::spawn(move || {
            for i in 0..500 {
                let locale = if (i + w) % 2 == 0 { "en" } else { "es" };
                r.set_locale(locale).unwrap();
            }
            Vec::new()
        }));
    }
    for reader in 0..5 {
        let r = Arc::clone(&r);
        let p = p.clone();
        handles.push(thread::spawn(move || {
            let mut seen = Vec::with_capacity(1000);
            for i in 0..1000 {
                // Alternate between the current locale and an explicit one.
                let out = if (i + reader) % 2 == 0 {
                    r.get(key, &p, None)
                } else {
                    r.get(key, &p, Some(if i % 3 == 0 { "es" } else { "en" }))
                };
                seen.push(out);
            }
            seen
        }));
    }

    for h in handles {
        for out in h.join().unwrap() {
            assert!(
                out == english || out == spanish,
                "unexpected translation: {:?}",
                out
            );
        }
    }
}

#[test]
fn global_resolver_can_be_replaced_and_reset() {
    let custom = Arc::new(LocalizationResolver::new(LocaleConfig::new("es", "en", &["en", "es"])));
    formweave_i18n::install_global(Arc::clone(&custom));
    assert_eq!(formweave_i18n::global().current_locale(), "es");
    formweave_i18n::reset_global();
    assert_eq!(formweave_i18n::global().current_locale(), "en");
}
