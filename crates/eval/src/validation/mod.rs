//! Value validation.
//!
//! [`FieldValidator`] checks submitted values against the rules a field
//! declares: required-ness (static or conditional), string length, pattern
//! and format, numeric bounds and step, list size and uniqueness, upload
//! size and type, option membership, and named custom rules. Messages are
//! resolved through a [`LocalizationResolver`]; a field's own `messages`
//! map overrides the catalog text rule by rule.

pub mod formats;
pub mod rules;

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use formweave_core::{
    cancellable, CancellationToken, DataMap, Field, FieldOption, FieldType, Schema, SchemaError,
    StringFormat, Value,
};
use formweave_i18n::{interpolate, LocalizationResolver, Params};

use crate::condition::{ConditionEvaluator, EvalContext, EvalOptions};
use crate::visibility::{FieldConditions, Visibility};

pub use rules::{CustomRule, FnRule, RuleContext, RuleError, RuleOutcome, RuleRegistry};

// ──────────────────────────────────────────────
// Results
// ──────────────────────────────────────────────

/// Outcome of validating a whole data map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    /// Field name to error messages.
    pub errors: BTreeMap<String, Vec<String>>,
    /// Field name to warnings; they never make the result invalid.
    pub warnings: BTreeMap<String, Vec<String>>,
    /// Cleaned values of the schema's fields.
    pub data: DataMap,
}

impl ValidationResult {
    pub fn field_errors(&self, name: &str) -> &[String] {
        self.errors.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn error_count(&self) -> usize {
        self.errors.values().map(Vec::len).sum()
    }
}

/// Errors and warnings for one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldReport {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl FieldReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Accumulates per-field problems so callers see every one at once.
#[derive(Debug, Default)]
pub struct ErrorCollector {
    errors: BTreeMap<String, Vec<String>>,
    warnings: BTreeMap<String, Vec<String>>,
}

impl ErrorCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_error(&mut self, field: &str, message: impl Into<String>) {
        self.errors.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn add_warning(&mut self, field: &str, message: impl Into<String>) {
        self.warnings.entry(field.to_string()).or_default().push(message.into());
    }

    pub fn extend(&mut self, field: &str, report: FieldReport) {
        for e in report.errors {
            self.add_error(field, e);
        }
        for w in report.warnings {
            self.add_warning(field, w);
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn finish(self, data: DataMap) -> ValidationResult {
        ValidationResult {
            valid: self.errors.is_empty(),
            errors: self.errors,
            warnings: self.warnings,
            data,
        }
    }
}

// ──────────────────────────────────────────────
// Validator
// ──────────────────────────────────────────────

/// Validates values against field rules.
#[derive(Debug, Clone)]
pub struct FieldValidator {
    resolver: Arc<LocalizationResolver>,
    evaluator: Arc<ConditionEvaluator>,
    rules: Arc<RuleRegistry>,
    options: EvalOptions,
    locale: Option<String>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValidator {
    /// A validator using the process-wide resolver and no custom rules.
    pub fn new() -> Self {
        FieldValidator {
            resolver: formweave_i18n::global(),
            evaluator: Arc::new(ConditionEvaluator::new()),
            rules: Arc::new(RuleRegistry::new()),
            options: EvalOptions::default(),
            locale: None,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<LocalizationResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn with_evaluator(mut self, evaluator: Arc<ConditionEvaluator>) -> Self {
        self.evaluator = evaluator;
        self
    }

    pub fn with_rules(mut self, rules: Arc<RuleRegistry>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// Pin message resolution to `locale` instead of the resolver's current one.
    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn resolver(&self) -> &Arc<LocalizationResolver> {
        &self.resolver
    }

    pub fn evaluator(&self) -> &Arc<ConditionEvaluator> {
        &self.evaluator
    }

    pub fn rules(&self) -> &Arc<RuleRegistry> {
        &self.rules
    }

    pub fn options(&self) -> &EvalOptions {
        &self.options
    }

    pub fn locale(&self) -> String {
        self.locale
            .clone()
            .unwrap_or_else(|| self.resolver.current_locale())
    }

    /// Normalize a raw value: apply the field transform, trim text and
    /// parse numeric strings for numeric kinds.
    pub fn clean_value(&self, field: &Field, value: Value) -> Value {
        let value = field.transform_value(value);
        match value {
            Value::String(s) if field.field_type.is_numeric() => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    Value::Null
                } else if let Ok(n) = trimmed.parse::<i64>() {
                    Value::Int(n)
                } else if let Ok(f) = trimmed.parse::<f64>() {
                    Value::Float(f)
                } else {
                    Value::String(s)
                }
            }
            Value::String(s) if field.field_type != FieldType::Password => {
                Value::String(s.trim().to_string())
            }
            other => other,
        }
    }

    /// Built-in checks only; custom rules are not consulted.
    ///
    /// `value` should already be cleaned. An absent or empty value only
    /// fails when `required` is set.
    pub fn check_value(&self, field: &Field, value: Option<&Value>, required: bool) -> Vec<String> {
        let locale = self.locale();
        let msg = Messages {
            validator: self,
            field,
            locale: &locale,
        };
        let mut errors = Vec::new();

        let Some(value) = value.filter(|v| !v.is_empty_value()) else {
            if required {
                errors.push(msg.render("required", "validation.required", &[]));
            }
            return errors;
        };

        if let Some(expected) = type_mismatch(&field.field_type, value) {
            errors.push(msg.render("type", "validation.invalid_type", &[("expected", expected.into())]));
            return errors;
        }

        let rules = field.validation.clone().unwrap_or_default();

        // Strings
        let implied = implied_format(&field.field_type);
        if let Some(s) = value.as_str() {
            let len = s.chars().count();
            if let Some(min) = rules.min_length.filter(|min| len < *min) {
                errors.push(msg.render("minLength", "validation.min_length", &[("min", min.to_string())]));
            }
            if let Some(max) = rules.max_length.filter(|max| len > *max) {
                errors.push(msg.render("maxLength", "validation.max_length", &[("max", max.to_string())]));
            }
            if let Some(pattern) = &rules.pattern {
                match self.evaluator.cached_regex(pattern) {
                    Ok(re) if !re.is_match(s) => errors.push(match &rules.pattern_message {
                        Some(custom) => interpolate(custom, &msg.params(&[])),
                        None => msg.render("pattern", "validation.pattern", &[]),
                    }),
                    Ok(_) => {}
                    Err(e) => log::warn!("skipping pattern on '{}': {}", field.name, e),
                }
            }
            if let Some(format) = rules.format.or(implied) {
                if !formats::matches_format(format, s) {
                    errors.push(msg.render("format", formats::message_key(format), &[]));
                }
            }
        } else if let Some(format) = rules.format.or(implied) {
            errors.push(msg.render("format", formats::message_key(format), &[]));
        }

        // Numbers
        if let Some(n) = value.as_f64() {
            if let Some(min) = rules.min.filter(|min| n < *min) {
                errors.push(msg.render("min", "validation.min_value", &[("min", number(min))]));
            }
            if let Some(max) = rules.max.filter(|max| n > *max) {
                errors.push(msg.render("max", "validation.max_value", &[("max", number(max))]));
            }
            if rules.integer && n.fract() != 0.0 {
                errors.push(msg.render("integer", "validation.invalid_integer", &[]));
            }
            if rules.positive && n <= 0.0 {
                errors.push(msg.render("positive", "validation.must_be_positive", &[]));
            }
            if let Some(step) = rules.step {
                if off_step(n, step, rules.min.unwrap_or(0.0)) {
                    errors.push(msg.render("step", "validation.invalid_step", &[("step", number(step))]));
                }
            }
        }

        // Lists
        if let Some(items) = value.as_list() {
            if let Some(min) = rules.min_items.filter(|min| items.len() < *min) {
                errors.push(msg.render("minItems", "validation.min_items", &[("min", min.to_string())]));
            }
            if let Some(max) = rules.max_items.filter(|max| items.len() > *max) {
                errors.push(msg.render("maxItems", "validation.max_items", &[("max", max.to_string())]));
            }
            let duplicated = items
                .iter()
                .enumerate()
                .any(|(i, a)| items[i + 1..].iter().any(|b| a.loosely_equals(b)));
            if rules.unique_items && duplicated {
                errors.push(msg.render("uniqueItems", "validation.unique_items", &[]));
            }
        }

        // Uploads
        if let Some(file_rules) = rules.file.as_ref().filter(|_| field.field_type.is_file()) {
            let uploads: Vec<&Value> = match value {
                Value::List(items) => items.iter().collect(),
                single => vec![single],
            };
            for upload in uploads {
                let meta = upload.as_map();
                let size = meta.and_then(|m| m.get("size")).and_then(Value::as_i64);
                if let (Some(limit), Some(size)) = (file_rules.max_size, size) {
                    if size > 0 && size as u64 > limit {
                        errors.push(msg.render("maxSize", "validation.file_size", &[("size", limit.to_string())]));
                    }
                }
                if !file_rules.accept.is_empty() {
                    let mime = meta
                        .and_then(|m| m.get("type").or_else(|| m.get("mimeType")))
                        .and_then(Value::as_str);
                    let name = meta
                        .and_then(|m| m.get("name"))
                        .and_then(Value::as_str)
                        .or_else(|| upload.as_str());
                    if !file_rules.accept.iter().any(|a| formats::accepts(a, mime, name)) {
                        let shown = mime.or(name).unwrap_or_default().to_string();
                        errors.push(msg.render("accept", "validation.file_type", &[("type", shown)]));
                    }
                }
            }
        }

        // Options
        if field.field_type.is_selection() {
            let options = field.available_options();
            if !options.is_empty() {
                let chosen: Vec<&Value> = match value {
                    Value::List(items) => items.iter().collect(),
                    single => vec![single],
                };
                if chosen.iter().any(|v| !has_option(options, v)) {
                    errors.push(msg.render("options", "validation.invalid_option", &[]));
                }
            }
        }

        errors
    }

    /// Built-in checks plus custom rules for one field.
    ///
    /// `data` is the consistent snapshot conditional clauses and custom
    /// rules see.
    pub async fn validate_field(&self, field: &Field, value: Option<&Value>, data: &DataMap) -> FieldReport {
        let ctx = EvalContext::with_options(data, self.options.clone());
        let required = field.is_required(&self.evaluator, &ctx);
        let mut report = FieldReport {
            errors: self.check_value(field, value, required),
            warnings: Vec::new(),
        };

        let custom = field
            .validation
            .as_ref()
            .map(|v| v.custom.as_slice())
            .unwrap_or_default();
        let Some(value) = value.filter(|v| !v.is_empty_value()) else {
            return report;
        };
        if !report.errors.is_empty() || custom.is_empty() {
            return report;
        }

        let locale = self.locale();
        let msg = Messages {
            validator: self,
            field,
            locale: &locale,
        };
        for name in custom {
            let Some(rule) = self.rules.get(name) else {
                log::warn!("field '{}' names unknown rule '{}'", field.name, name);
                report.warnings.push(format!("unknown validation rule '{}'", name));
                continue;
            };
            let rule_ctx = RuleContext {
                field,
                data,
                locale: &locale,
            };
            let outcome = match rule.timeout() {
                Some(limit) => match tokio::time::timeout(limit, rule.check(value, rule_ctx)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RuleError::Timeout(limit)),
                },
                None => rule.check(value, rule_ctx).await,
            };
            match outcome {
                Ok(RuleOutcome::Valid) => {}
                Ok(RuleOutcome::Invalid(message)) if message.is_empty() => {
                    report.errors.push(msg.render(name, "validation.custom", &[]));
                }
                Ok(RuleOutcome::Invalid(message)) => {
                    let overridden = field
                        .validation
                        .as_ref()
                        .and_then(|v| v.messages.get(name.as_str()));
                    report.errors.push(match overridden {
                        Some(text) => interpolate(text, &msg.params(&[])),
                        None => message,
                    });
                }
                Err(e) if rule.fatal() => {
                    log::debug!("fatal rule '{}' failed on '{}': {}", name, field.name, e);
                    report.errors.push(msg.render(name, "validation.custom", &[]));
                }
                Err(e) => {
                    log::warn!("rule '{}' failed on '{}': {}", name, field.name, e);
                    report.warnings.push(format!("rule '{}' could not run: {}", name, e));
                }
            }
        }
        report
    }

    /// Validate a whole data map against a schema.
    ///
    /// Keys without a matching field are ignored. Fields that are not
    /// visible for this data, and presentational fields, are skipped.
    pub async fn validate_data(&self, schema: &Schema, data: &DataMap) -> ValidationResult {
        let snapshot = self.clean_data(schema, data);
        let ctx = EvalContext::with_options(&snapshot, self.options.clone());
        let mut collector = ErrorCollector::new();
        let mut cleaned = DataMap::new();

        for field in &schema.fields {
            if field.field_type.is_decorative() {
                continue;
            }
            let value = snapshot.get(&field.name);
            if let Some(v) = value {
                cleaned.insert(field.name.clone(), v.clone());
            }
            if !field.is_visible(&self.evaluator, &ctx) {
                continue;
            }
            let report = self.validate_field(field, value, &snapshot).await;
            collector.extend(&field.name, report);
        }
        collector.finish(cleaned)
    }

    /// [`validate_data`](Self::validate_data), abandoned when `token` fires.
    pub async fn validate_data_with(
        &self,
        schema: &Schema,
        data: &DataMap,
        token: &CancellationToken,
    ) -> Result<ValidationResult, SchemaError> {
        cancellable(token, async { Ok(self.validate_data(schema, data).await) }).await
    }

    /// `data` with every schema field's value cleaned; other keys kept as-is.
    pub fn clean_data(&self, schema: &Schema, data: &DataMap) -> DataMap {
        let mut out = data.clone();
        for field in &schema.fields {
            if let Some(v) = out.remove(&field.name) {
                out.insert(field.name.clone(), self.clean_value(field, v));
            }
        }
        out
    }
}

// ──────────────────────────────────────────────
// Helpers
// ──────────────────────────────────────────────

struct Messages<'a> {
    validator: &'a FieldValidator,
    field: &'a Field,
    locale: &'a str,
}

impl Messages<'_> {
    fn label(&self) -> String {
        let localized = self
            .field
            .i18n
            .as_ref()
            .and_then(|i| i.label.get(self.locale))
            .cloned();
        match localized {
            Some(label) => label,
            None if self.field.label.is_empty() => self.field.name.clone(),
            None => self.field.label.clone(),
        }
    }

    fn params(&self, extra: &[(&str, String)]) -> Params {
        let mut params = Params::new();
        params.insert("field".to_string(), self.label());
        for (k, v) in extra {
            params.insert(k.to_string(), v.clone());
        }
        params
    }

    /// Override from the field's `messages` map, else the catalog entry.
    fn render(&self, rule: &str, key: &str, extra: &[(&str, String)]) -> String {
        let params = self.params(extra);
        let overridden = self
            .field
            .validation
            .as_ref()
            .and_then(|v| v.messages.get(rule));
        match overridden {
            Some(text) => interpolate(text, &params),
            None => self.validator.resolver.get(key, &params, Some(self.locale)),
        }
    }
}

fn implied_format(kind: &FieldType) -> Option<StringFormat> {
    match kind {
        FieldType::Email => Some(StringFormat::Email),
        FieldType::Date => Some(StringFormat::Date),
        FieldType::Time => Some(StringFormat::Time),
        FieldType::DateTime => Some(StringFormat::DateTime),
        _ => None,
    }
}

/// Name of the expected shape when `value` cannot belong to `kind`.
fn type_mismatch(kind: &FieldType, value: &Value) -> Option<&'static str> {
    if kind.is_numeric() && !value.is_number() {
        return Some("number");
    }
    if kind.is_multi_valued() && value.as_list().is_none() {
        return Some("list");
    }
    if kind.is_file() && !matches!(value, Value::String(_) | Value::Map(_) | Value::List(_)) {
        return Some("file");
    }
    None
}

fn has_option(options: &[FieldOption], value: &Value) -> bool {
    options
        .iter()
        .any(|o| o.value.loosely_equals(value) || has_option(&o.children, value))
}

/// Whether `value` misses the grid `base + k * step`, checked in exact decimals.
fn off_step(value: f64, step: f64, base: f64) -> bool {
    let exact = |x: f64| x.to_string().parse::<Decimal>().ok();
    match (exact(value), exact(step), exact(base)) {
        (Some(v), Some(s), Some(b)) if !s.is_zero() => v
            .checked_sub(b)
            .and_then(|d| d.checked_rem(s))
            .is_some_and(|r| !r.is_zero()),
        _ => false,
    }
}

fn number(x: f64) -> String {
    Value::Float(x).to_string()
}
