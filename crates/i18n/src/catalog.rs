//! Message catalogs: flattening and the bundled English/Spanish defaults.

use std::collections::HashMap;

use serde_json::{json, Value};

/// A flat `key -> message` table for one locale.
pub type Catalog = HashMap<String, String>;

/// Flatten nested JSON objects into dotted keys.
///
/// `{"validation": {"required": "x"}}` becomes `validation.required = x`.
/// Non-string leaves are rendered with their JSON text; nulls are skipped.
pub fn flatten(value: &Value) -> Catalog {
    let mut out = Catalog::new();
    flatten_into(value, "", &mut out);
    out
}

fn flatten_into(value: &Value, prefix: &str, out: &mut Catalog) {
    match value {
        Value::Object(map) => {
            for (k, v) in map {
                let key = if prefix.is_empty() {
                    k.clone()
                } else {
                    format!("{}.{}", prefix, k)
                };
                flatten_into(v, &key, out);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Locales with a bundled catalog.
pub const BUILTIN_LOCALES: &[&str] = &["en", "es"];

/// The bundled catalog for `locale`, if one ships with the crate.
pub fn builtin(locale: &str) -> Option<Catalog> {
    match locale {
        "en" => Some(flatten(&english())),
        "es" => Some(flatten(&spanish())),
        _ => None,
    }
}

fn english() -> Value {
    json!({
        "validation": {
            "required": "{{field}} is required",
            "min_length": "{{field}} must be at least {{min}} characters",
            "max_length": "{{field}} must be at most {{max}} characters",
            "pattern": "{{field}} has an invalid format",
            "invalid_email": "Please enter a valid email address",
            "invalid_url": "Please enter a valid URL",
            "invalid_phone": "Please enter a valid phone number",
            "invalid_uuid": "{{field}} must be a valid UUID",
            "invalid_date": "{{field}} must be a valid date (YYYY-MM-DD)",
            "invalid_time": "{{field}} must be a valid time (HH:MM)",
            "invalid_datetime": "{{field}} must be a valid date and time",
            "min_value": "{{field}} must be at least {{min}}",
            "max_value": "{{field}} must be at most {{max}}",
            "invalid_step": "{{field}} must be a multiple of {{step}}",
            "invalid_integer": "{{field}} must be a whole number",
            "must_be_positive": "{{field}} must be positive",
            "min_items": "{{field}} requires at least {{min}} items",
            "max_items": "{{field}} allows at most {{max}} items",
            "unique_items": "{{field}} must not contain duplicates",
            "file_size": "File exceeds the maximum size of {{size}} bytes",
            "file_type": "File type {{type}} is not allowed",
            "invalid_type": "{{field}} must be a {{expected}}",
            "invalid_option": "{{field}} has an invalid selection",
            "custom": "{{field}} is invalid",
            "field_not_found": "Field {{field}} not found"
        },
        "items": {
            "count": {
                "one": "{{count}} item",
                "other": "{{count}} items"
            }
        },
        "actions": {
            "submit": "Submit",
            "cancel": "Cancel",
            "reset": "Reset",
            "save": "Save",
            "delete": "Delete",
            "confirm": "Confirm"
        },
        "messages": {
            "validation_failed": "Please correct the errors below",
            "submit_success": "Form submitted successfully",
            "loading": "Loading...",
            "confirm_delete": "Are you sure you want to delete this item?"
        }
    })
}

fn spanish() -> Value {
    json!({
        "validation": {
            "required": "{{field}} es requerido",
            "min_length": "{{field}} debe tener al menos {{min}} caracteres",
            "max_length": "{{field}} debe tener como máximo {{max}} caracteres",
            "pattern": "{{field}} tiene un formato inválido",
            "invalid_email": "Por favor ingrese un correo electrónico válido",
            "invalid_url": "Por favor ingrese una URL válida",
            "invalid_phone": "Por favor ingrese un número de teléfono válido",
            "invalid_uuid": "{{field}} debe ser un UUID válido",
            "invalid_date": "{{field}} debe ser una fecha válida (AAAA-MM-DD)",
            "invalid_time": "{{field}} debe ser una hora válida (HH:MM)",
            "invalid_datetime": "{{field}} debe ser una fecha y hora válidas",
            "min_value": "{{field}} debe ser al menos {{min}}",
            "max_value": "{{field}} debe ser como máximo {{max}}",
            "invalid_step": "{{field}} debe ser múltiplo de {{step}}",
            "invalid_integer": "{{field}} debe ser un número entero",
            "must_be_positive": "{{field}} debe ser positivo",
            "min_items": "{{field}} requiere al menos {{min}} elementos",
            "max_items": "{{field}} permite como máximo {{max}} elementos",
            "unique_items": "{{field}} no debe contener duplicados",
            "file_size": "El archivo excede el tamaño máximo de {{size}} bytes",
            "file_type": "El tipo de archivo {{type}} no está permitido",
            "invalid_type": "{{field}} debe ser {{expected}}",
            "invalid_option": "{{field}} tiene una selección inválida",
            "custom": "{{field}} no es válido",
            "field_not_found": "Campo {{field}} no encontrado"
        },
        "items": {
            "count": {
                "one": "{{count}} elemento",
                "other": "{{count}} elementos"
            }
        },
        "actions": {
            "submit": "Enviar",
            "cancel": "Cancelar",
            "reset": "Restablecer",
            "save": "Guardar",
            "delete": "Eliminar",
            "confirm": "Confirmar"
        },
        "messages": {
            "validation_failed": "Por favor corrija los errores a continuación",
            "submit_success": "Formulario enviado correctamente",
            "loading": "Cargando...",
            "confirm_delete": "¿Está seguro de que desea eliminar este elemento?"
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flattens_nested_keys() {
        let flat = flatten(&json!({"a": {"b": {"c": "x"}, "n": 3, "z": null}}));
        assert_eq!(flat["a.b.c"], "x");
        assert_eq!(flat["a.n"], "3");
        assert!(!flat.contains_key("a.z"));
    }

    #[test]
    fn builtin_catalogs_share_keys() {
        let en = builtin("en").unwrap();
        let es = builtin("es").unwrap();
        let mut en_keys: Vec<_> = en.keys().collect();
        let mut es_keys: Vec<_> = es.keys().collect();
        en_keys.sort();
        es_keys.sort();
        assert_eq!(en_keys, es_keys);
        assert!(builtin("de").is_none());
    }
}
