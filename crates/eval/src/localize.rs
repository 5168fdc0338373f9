//! Resolve a schema's per-locale text in place.

use std::collections::BTreeMap;

use formweave_core::Schema;
use formweave_i18n::{base_language, LocalizationResolver};

/// Entry for `locale`, then for its base language (`es-MX` → `es`).
fn pick<'a>(map: &'a BTreeMap<String, String>, locale: &str) -> Option<&'a String> {
    map.get(locale).or_else(|| map.get(base_language(locale)))
}

fn apply(target: &mut String, map: &BTreeMap<String, String>, locale: &str) {
    if let Some(text) = pick(map, locale) {
        target.clone_from(text);
    }
}

fn apply_opt(target: &mut Option<String>, map: &BTreeMap<String, String>, locale: &str) {
    if let Some(text) = pick(map, locale) {
        *target = Some(text.clone());
    }
}

/// Replace title, labels, placeholders, help, tooltips and action text
/// with their `locale` variants.
///
/// Text without a per-locale entry that is itself a catalog key
/// (`actions.submit`) is translated through `resolver`. Applying the same
/// locale twice changes nothing.
pub fn localize_schema(schema: &mut Schema, locale: &str, resolver: &LocalizationResolver) {
    if let Some(i18n) = schema.i18n.as_ref() {
        apply(&mut schema.title, &i18n.title, locale);
        apply_opt(&mut schema.description, &i18n.description, locale);
    }

    for field in &mut schema.fields {
        if let Some(i18n) = field.i18n.as_ref() {
            apply(&mut field.label, &i18n.label, locale);
            apply_opt(&mut field.placeholder, &i18n.placeholder, locale);
            apply_opt(&mut field.help, &i18n.help, locale);
            apply_opt(&mut field.tooltip, &i18n.tooltip, locale);
            apply_opt(&mut field.description, &i18n.description, locale);
        }
        if let Some(text) = resolver.translate(&field.label, Some(locale)) {
            field.label = text;
        }
    }

    for action in &mut schema.actions {
        apply(&mut action.text, &action.i18n, locale);
        if let Some(text) = resolver.translate(&action.text, Some(locale)) {
            action.text = text;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formweave_core::{ActionBuilder, FieldBuilder, SchemaBuilder};
    use formweave_i18n::LocaleConfig;

    #[test]
    fn maps_and_catalog_keys() {
        let mut schema = SchemaBuilder::form("contact")
            .title("Contact")
            .i18n_title("es", "Contacto")
            .field(
                FieldBuilder::text("name")
                    .label("Name")
                    .i18n_label("es", "Nombre")
                    .i18n_placeholder("es", "Tu nombre"),
            )
            .action(ActionBuilder::submit("send", "actions.submit"))
            .must_build();
        let resolver = LocalizationResolver::new(LocaleConfig::default());

        localize_schema(&mut schema, "es-MX", &resolver);
        assert_eq!(schema.title, "Contacto");
        assert_eq!(schema.fields[0].label, "Nombre");
        assert_eq!(schema.fields[0].placeholder.as_deref(), Some("Tu nombre"));
        assert_eq!(schema.actions[0].text, "Enviar");

        let once = schema.clone();
        localize_schema(&mut schema, "es-MX", &resolver);
        assert_eq!(schema, once);
    }
}
