use std::collections::BTreeSet;

use crate::error::{SchemaError, SchemaErrors};
use crate::model::{
    CompareOp, ConditionGroup, Conditional, DataSource, DataSourceKind, Field, FieldI18n,
    FieldLayout, FieldOption, FieldType, FieldValidation, FileRules, StringFormat, Transform,
};
use crate::validate::Validate;
use crate::value::Value;

/// Fluent constructor for [`Field`].
#[derive(Debug, Clone)]
pub struct FieldBuilder {
    field: Field,
    errors: Vec<SchemaError>,
}

impl FieldBuilder {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        FieldBuilder {
            field: Field::new(name, field_type, ""),
            errors: Vec::new(),
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        FieldBuilder::new(name, FieldType::Text)
    }

    pub fn email(name: impl Into<String>) -> Self {
        FieldBuilder::new(name, FieldType::Email)
    }

    pub fn number(name: impl Into<String>) -> Self {
        FieldBuilder::new(name, FieldType::Number)
    }

    pub fn select(name: impl Into<String>) -> Self {
        FieldBuilder::new(name, FieldType::Select)
    }

    pub fn name(&self) -> &str {
        &self.field.name
    }

    fn record(&mut self, message: impl Into<String>) {
        let err = SchemaError::validation(message).with_field(self.field.name.clone());
        self.errors.push(err);
    }

    fn rules(&mut self) -> &mut FieldValidation {
        self.field.validation.get_or_insert_with(FieldValidation::default)
    }

    fn conditional(&mut self) -> &mut Conditional {
        self.field.conditional.get_or_insert_with(Conditional::default)
    }

    fn i18n(&mut self) -> &mut FieldI18n {
        self.field.i18n.get_or_insert_with(FieldI18n::default)
    }

    // ── Content ─────────────────────────────────────────────────────

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.field.label = label.into();
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.field.description = Some(text.into());
        self
    }

    pub fn placeholder(mut self, text: impl Into<String>) -> Self {
        self.field.placeholder = Some(text.into());
        self
    }

    pub fn help(mut self, text: impl Into<String>) -> Self {
        self.field.help = Some(text.into());
        self
    }

    pub fn tooltip(mut self, text: impl Into<String>) -> Self {
        self.field.tooltip = Some(text.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.field.icon = Some(icon.into());
        self
    }

    pub fn value(mut self, value: impl Into<Value>) -> Self {
        self.field.value = Some(value.into());
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.field.default = Some(value.into());
        self
    }

    /// Add an option; a repeated option value is recorded as an error.
    pub fn option(mut self, value: impl Into<Value>, label: impl Into<String>) -> Self {
        let option = FieldOption::new(value, label);
        if self.field.options.iter().any(|o| o.value == option.value) {
            let msg = format!("duplicate option value '{}'", option.value);
            self.record(msg);
        } else {
            self.field.options.push(option);
        }
        self
    }

    pub fn options<I, V, L>(self, options: I) -> Self
    where
        I: IntoIterator<Item = (V, L)>,
        V: Into<Value>,
        L: Into<String>,
    {
        options
            .into_iter()
            .fold(self, |b, (value, label)| b.option(value, label))
    }

    pub fn data_source(mut self, source: DataSource) -> Self {
        self.field.data_source = Some(source);
        self
    }

    /// Load options from a remote endpoint.
    pub fn api_source(self, url: impl Into<String>) -> Self {
        self.data_source(DataSource {
            kind: DataSourceKind::Api,
            url: Some(url.into()),
            method: None,
            options: Vec::new(),
            cache_ttl: None,
        })
    }

    // ── State flags ─────────────────────────────────────────────────

    pub fn required(mut self) -> Self {
        self.field.required = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.field.disabled = true;
        self
    }

    pub fn readonly(mut self) -> Self {
        self.field.readonly = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.field.hidden = true;
        self
    }

    // ── Validation rules ────────────────────────────────────────────

    pub fn min_length(mut self, n: usize) -> Self {
        self.rules().min_length = Some(n);
        self
    }

    pub fn max_length(mut self, n: usize) -> Self {
        self.rules().max_length = Some(n);
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.rules().pattern = Some(pattern.into());
        self
    }

    /// Pattern plus the message shown when it does not match.
    pub fn pattern_with_message(mut self, pattern: impl Into<String>, message: impl Into<String>) -> Self {
        let rules = self.rules();
        rules.pattern = Some(pattern.into());
        rules.pattern_message = Some(message.into());
        self
    }

    pub fn format(mut self, format: StringFormat) -> Self {
        self.rules().format = Some(format);
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.rules().min = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.rules().max = Some(max);
        self
    }

    pub fn range(self, min: f64, max: f64) -> Self {
        self.min(min).max(max)
    }

    pub fn step(mut self, step: f64) -> Self {
        self.rules().step = Some(step);
        self
    }

    pub fn integer(mut self) -> Self {
        self.rules().integer = true;
        self
    }

    pub fn positive(mut self) -> Self {
        self.rules().positive = true;
        self
    }

    pub fn min_items(mut self, n: usize) -> Self {
        self.rules().min_items = Some(n);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.rules().max_items = Some(n);
        self
    }

    pub fn unique_items(mut self) -> Self {
        self.rules().unique_items = true;
        self
    }

    pub fn max_file_size(mut self, bytes: u64) -> Self {
        self.rules()
            .file
            .get_or_insert_with(FileRules::default)
            .max_size = Some(bytes);
        self
    }

    pub fn accept(mut self, mime: impl Into<String>) -> Self {
        let mime = mime.into();
        if mime.trim().is_empty() {
            self.record("accepted MIME type cannot be empty");
            return self;
        }
        self.rules()
            .file
            .get_or_insert_with(FileRules::default)
            .accept
            .push(mime);
        self
    }

    /// Attach a custom rule resolved by name at validation time.
    pub fn custom_rule(mut self, name: impl Into<String>) -> Self {
        self.rules().custom.push(name.into());
        self
    }

    /// Override the message for one rule (`required`, `minLength`, ...).
    pub fn message(mut self, rule: impl Into<String>, text: impl Into<String>) -> Self {
        self.rules().messages.insert(rule.into(), text.into());
        self
    }

    // ── Behavior ────────────────────────────────────────────────────

    pub fn transform(mut self, transform: Transform) -> Self {
        self.field.transform = Some(transform);
        self
    }

    pub fn show_when(mut self, group: ConditionGroup) -> Self {
        self.conditional().show = Some(group);
        self
    }

    pub fn hide_when(mut self, group: ConditionGroup) -> Self {
        self.conditional().hide = Some(group);
        self
    }

    pub fn required_when(mut self, group: ConditionGroup) -> Self {
        self.conditional().required = Some(group);
        self
    }

    pub fn disabled_when(mut self, group: ConditionGroup) -> Self {
        self.conditional().disabled = Some(group);
        self
    }

    pub fn readonly_when(mut self, group: ConditionGroup) -> Self {
        self.conditional().readonly = Some(group);
        self
    }

    /// Shorthand for a single-condition show clause.
    pub fn visible_if(
        self,
        field: impl Into<String>,
        operator: CompareOp,
        value: impl Into<Value>,
    ) -> Self {
        self.show_when(ConditionGroup::when(field, operator, value))
    }

    pub fn depends_on(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if self.field.dependencies.contains(&name) {
            let msg = format!("dependency '{}' declared twice", name);
            self.record(msg);
        } else {
            self.field.dependencies.push(name);
        }
        self
    }

    pub fn debounce_ms(mut self, ms: u64) -> Self {
        self.field.debounce_ms = Some(ms);
        self
    }

    // ── Presentation and permissions ────────────────────────────────

    pub fn col_span(mut self, span: u32) -> Self {
        self.field
            .layout
            .get_or_insert_with(FieldLayout::default)
            .col_span = Some(span);
        self
    }

    pub fn i18n_label(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.i18n().label.insert(locale.into(), text.into());
        self
    }

    pub fn i18n_placeholder(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.i18n().placeholder.insert(locale.into(), text.into());
        self
    }

    pub fn i18n_help(mut self, locale: impl Into<String>, text: impl Into<String>) -> Self {
        self.i18n().help.insert(locale.into(), text.into());
        self
    }

    pub fn require_permission(mut self, permission: impl Into<String>) -> Self {
        self.field.require_permission = Some(permission.into());
        self
    }

    pub fn require_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen: BTreeSet<String> = self.field.require_roles.iter().cloned().collect();
        for role in roles {
            let role = role.into();
            if seen.insert(role.clone()) {
                self.field.require_roles.push(role);
            }
        }
        self
    }

    // ── Terminal ────────────────────────────────────────────────────

    /// Materialize the field, or every defect recorded by setters and
    /// found by configuration validation.
    pub fn build(self) -> Result<Field, SchemaErrors> {
        let mut errors = self.errors;
        errors.extend(self.field.validate());
        if errors.is_empty() {
            Ok(self.field)
        } else {
            Err(SchemaErrors(errors))
        }
    }

    /// Like [`build`](Self::build) but fails fast.
    ///
    /// # Panics
    ///
    /// Panics with the combined error when the field is invalid.
    #[track_caller]
    pub fn must_build(self) -> Field {
        match self.build() {
            Ok(field) => field,
            Err(errors) => panic!("invalid field: {}", errors),
        }
    }
}
