//! Static configuration validation.
//!
//! Checks that a schema is internally consistent before any data flows
//! through it: rule bounds are ordered, patterns compile, selection fields
//! have an option source and layout children point at real fields. Every
//! check runs and every defect is collected, so callers repair once.

use std::collections::BTreeSet;

use regex::Regex;

use crate::error::{SchemaError, SchemaErrors};
use crate::graph;
use crate::model::{
    Action, ActionType, DataSourceKind, Field, FieldValidation, Layout, Schema,
};

/// A descriptor that can check its own configuration.
pub trait Validate {
    /// Every configuration defect, or an empty list.
    fn validate(&self) -> Vec<SchemaError>;
}

/// Run [`Validate`] and fold the result into a `Result`.
pub fn check<T: Validate + ?Sized>(item: &T) -> Result<(), SchemaErrors> {
    let errors = item.validate();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(SchemaErrors(errors))
    }
}

// ──────────────────────────────────────────────
// Field
// ──────────────────────────────────────────────

impl Validate for Field {
    fn validate(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        let name = self.name.as_str();
        let err = |msg: String| SchemaError::validation(msg).with_field(name);

        if self.name.trim().is_empty() {
            errors.push(SchemaError::validation("field name is required"));
        }
        if self.label.trim().is_empty() {
            errors.push(err("field label is required".to_string()));
        }
        if !self.field_type.is_known() {
            errors.push(err(format!("unrecognized field type '{}'", self.field_type)));
        }
        if self.field_type.is_selection()
            && self.options.is_empty()
            && self.data_source.is_none()
        {
            errors.push(err(format!(
                "{} field requires options or a data source",
                self.field_type
            )));
        }
        if let Some(ds) = &self.data_source {
            if ds.kind == DataSourceKind::Api && ds.url.as_deref().map_or(true, str::is_empty) {
                errors.push(err("api data source requires a url".to_string()));
            }
        }
        if let Some(rules) = &self.validation {
            for msg in rule_defects(rules) {
                errors.push(err(msg));
            }
        }
        if self.dependencies.iter().any(|d| d == name) {
            errors.push(err("field cannot depend on itself".to_string()));
        }
        errors
    }
}

fn rule_defects(rules: &FieldValidation) -> Vec<String> {
    let mut defects = Vec::new();
    if let (Some(min), Some(max)) = (rules.min_length, rules.max_length) {
        if min > max {
            defects.push(format!("minLength ({}) exceeds maxLength ({})", min, max));
        }
    }
    if let (Some(min), Some(max)) = (rules.min, rules.max) {
        if min > max {
            defects.push(format!("min ({}) exceeds max ({})", min, max));
        }
    }
    if let (Some(min), Some(max)) = (rules.min_items, rules.max_items) {
        if min > max {
            defects.push(format!("minItems ({}) exceeds maxItems ({})", min, max));
        }
    }
    if let Some(step) = rules.step {
        if step <= 0.0 || !step.is_finite() {
            defects.push(format!("step must be a positive number, got {}", step));
        }
    }
    if let Some(pattern) = &rules.pattern {
        if let Err(e) = Regex::new(pattern) {
            defects.push(format!("invalid pattern '{}': {}", pattern, e));
        }
    }
    if let Some(file) = &rules.file {
        if file.max_size == Some(0) {
            defects.push("file maxSize must be greater than zero".to_string());
        }
    }
    if rules.custom.iter().any(|c| c.trim().is_empty()) {
        defects.push("custom rule names cannot be empty".to_string());
    }
    defects
}

// ──────────────────────────────────────────────
// Action
// ──────────────────────────────────────────────

impl Validate for Action {
    fn validate(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        let err = |msg: &str| {
            SchemaError::validation(msg.to_string()).with_detail("action", self.id.clone())
        };
        if self.id.trim().is_empty() {
            errors.push(SchemaError::validation("action id is required"));
        }
        if self.text.trim().is_empty() {
            errors.push(err("action text is required"));
        }
        match self.action_type {
            ActionType::Link if self.url().is_none() => {
                errors.push(err("link action requires a url"));
            }
            ActionType::Custom if self.handler().is_none() => {
                errors.push(err("custom action requires a handler"));
            }
            _ => {}
        }
        if let Some(confirm) = &self.confirm {
            if confirm.message.trim().is_empty() {
                errors.push(err("confirmation requires a message"));
            }
        }
        errors
    }
}

// ──────────────────────────────────────────────
// Layout
// ──────────────────────────────────────────────

impl Validate for Layout {
    fn validate(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        let mut seen = BTreeSet::new();
        for (kind, child) in self.children() {
            if child.id.trim().is_empty() {
                errors.push(SchemaError::validation(format!(
                    "{} id is required",
                    kind.as_str()
                )));
            } else if !seen.insert(child.id.as_str()) {
                errors.push(
                    SchemaError::validation(format!("duplicate layout id '{}'", child.id))
                        .with_detail("layout", child.id.clone()),
                );
            }
        }
        if let Some(0) = self.columns {
            errors.push(SchemaError::validation("layout columns must be at least 1"));
        }
        errors
    }
}

/// Layout references that name no field in `known`.
pub fn unresolved_layout_refs(layout: &Layout, known: &BTreeSet<&str>) -> Vec<SchemaError> {
    let mut errors = Vec::new();
    for (kind, child) in layout.children() {
        for name in &child.fields {
            if !known.contains(name.as_str()) {
                errors.push(
                    SchemaError::validation(format!(
                        "{} '{}' references unknown field '{}'",
                        kind.as_str(),
                        child.id,
                        name
                    ))
                    .with_field(name.clone())
                    .with_detail("layout", child.id.clone()),
                );
            }
        }
    }
    errors
}

// ──────────────────────────────────────────────
// Schema
// ──────────────────────────────────────────────

impl Validate for Schema {
    fn validate(&self) -> Vec<SchemaError> {
        let mut errors = Vec::new();
        if self.id.trim().is_empty() {
            errors.push(SchemaError::validation("schema id is required"));
        }
        let has_layout = self.layout.as_ref().is_some_and(|l| !l.is_empty());
        if self.fields.is_empty() && !has_layout {
            errors.push(SchemaError::validation(
                "schema must declare at least one field or layout",
            ));
        }

        let mut names = BTreeSet::new();
        for field in &self.fields {
            if !field.name.is_empty() && !names.insert(field.name.as_str()) {
                errors.push(
                    SchemaError::validation(format!("duplicate field name '{}'", field.name))
                        .with_field(field.name.clone()),
                );
            }
            errors.extend(field.validate());
        }
        for field in &self.fields {
            for dep in &field.dependencies {
                if !names.contains(dep.as_str()) {
                    errors.push(
                        SchemaError::validation(format!("depends on unknown field '{}'", dep))
                            .with_field(field.name.clone()),
                    );
                }
            }
        }
        if let Err(cycle) = graph::dependency_order(&self.fields) {
            errors.push(cycle);
        }

        let mut action_ids = BTreeSet::new();
        for action in &self.actions {
            if !action.id.is_empty() && !action_ids.insert(action.id.as_str()) {
                errors.push(SchemaError::validation(format!(
                    "duplicate action id '{}'",
                    action.id
                )));
            }
            errors.extend(action.validate());
        }

        if let Some(layout) = &self.layout {
            errors.extend(layout.validate());
            errors.extend(unresolved_layout_refs(layout, &names));
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        ActionConfirm, FieldOption, FieldType, LayoutChild, LayoutType, SchemaType,
    };

    fn text(name: &str) -> Field {
        Field::new(name, FieldType::Text, name.to_uppercase())
    }

    #[test]
    fn valid_schema_passes() {
        let mut s = Schema::new("contact", SchemaType::Form, "Contact");
        s.fields.push(text("name"));
        let mut color = Field::new("color", FieldType::Select, "Color");
        color.options.push(FieldOption::new("red", "Red"));
        s.fields.push(color);
        assert!(check(&s).is_ok());
    }

    #[test]
    fn collects_every_defect() {
        let mut s = Schema::new("", SchemaType::Form, "Broken");
        let mut bad = Field::new("qty", FieldType::Number, "");
        bad.validation = Some(FieldValidation {
            min: Some(10.0),
            max: Some(1.0),
            pattern: Some("([".into()),
            ..FieldValidation::default()
        });
        s.fields.push(bad);
        s.fields.push(text("qty"));
        s.fields.push(Field::new("pick", FieldType::Radio, "Pick"));
        let errs = check(&s).unwrap_err();
        assert!(errs.mentions("schema id is required"));
        assert!(errs.mentions("field label is required"));
        assert!(errs.mentions("min (10) exceeds max (1)"));
        assert!(errs.mentions("invalid pattern"));
        assert!(errs.mentions("duplicate field name 'qty'"));
        assert!(errs.mentions("radio field requires options or a data source"));
    }

    #[test]
    fn layout_references_must_resolve() {
        let mut s = Schema::new("s", SchemaType::Form, "S");
        s.fields.push(text("a"));
        let mut layout = Layout::new(LayoutType::Sections);
        layout.sections.push(LayoutChild::new("main", "Main", ["a", "ghost"]));
        layout.tabs.push(LayoutChild::new("main", "Dup", ["a"]));
        s.layout = Some(layout);
        let errs = check(&s).unwrap_err();
        assert!(errs.mentions("unknown field 'ghost'"));
        assert!(errs.mentions("duplicate layout id 'main'"));
    }

    #[test]
    fn action_requirements() {
        let link = Action::new("go", ActionType::Link, "Go");
        assert!(link.validate().iter().any(|e| e.message.contains("url")));
        let custom = Action::new("run", ActionType::Custom, "Run");
        assert!(custom.validate().iter().any(|e| e.message.contains("handler")));
        let mut del = Action::new("del", ActionType::Button, "Delete");
        del.confirm = Some(ActionConfirm::default());
        assert!(del.validate().iter().any(|e| e.message.contains("confirmation")));
        assert!(Action::new("", ActionType::Submit, "").validate().len() == 2);
    }

    #[test]
    fn dependency_cycles_are_rejected() {
        let mut s = Schema::new("s", SchemaType::Form, "S");
        let mut a = text("a");
        a.dependencies.push("b".into());
        let mut b = text("b");
        b.dependencies.push("a".into());
        s.fields.extend([a, b]);
        let errs = check(&s).unwrap_err();
        assert!(errs.mentions("dependency cycle"));
    }

    #[test]
    fn unknown_type_reported() {
        let f = Field::new("x", FieldType::Other("hologram".into()), "X");
        assert!(f.validate()[0].message.contains("unrecognized field type 'hologram'"));
    }
}
