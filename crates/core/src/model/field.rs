//! Field descriptors.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::condition::Conditional;
use crate::value::Value;

// ──────────────────────────────────────────────
// Field type
// ──────────────────────────────────────────────

macro_rules! field_types {
    ($($variant:ident => $name:literal),+ $(,)?) => {
        /// The closed set of input kinds a field can declare.
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum FieldType {
            $($variant,)+
            /// A type string outside the known set; rejected by config validation.
            Other(String),
        }

        impl FieldType {
            pub const ALL: &'static [FieldType] = &[$(FieldType::$variant,)+];

            pub fn as_str(&self) -> &str {
                match self {
                    $(FieldType::$variant => $name,)+
                    FieldType::Other(s) => s,
                }
            }

            pub fn parse(s: &str) -> FieldType {
                match s {
                    $($name => FieldType::$variant,)+
                    "icon-picker" => FieldType::IconPicker,
                    "table-repeater" => FieldType::TableRepeater,
                    other => FieldType::Other(other.to_string()),
                }
            }
        }
    };
}

field_types! {
    Text => "text",
    Email => "email",
    Password => "password",
    Number => "number",
    Date => "date",
    Time => "time",
    DateTime => "datetime",
    DateRange => "daterange",
    Select => "select",
    MultiSelect => "multiselect",
    Radio => "radio",
    Checkbox => "checkbox",
    Checkboxes => "checkboxes",
    TreeSelect => "treeselect",
    Cascader => "cascader",
    Transfer => "transfer",
    Switch => "switch",
    Slider => "slider",
    Rating => "rating",
    Color => "color",
    File => "file",
    Image => "image",
    Signature => "signature",
    Currency => "currency",
    Tags => "tags",
    Location => "location",
    Relation => "relation",
    Autocomplete => "autocomplete",
    IconPicker => "iconpicker",
    Formula => "formula",
    Display => "display",
    Divider => "divider",
    Html => "html",
    Static => "static",
    Group => "group",
    Fieldset => "fieldset",
    Tabs => "tabs",
    Panel => "panel",
    Collapse => "collapse",
    Repeatable => "repeatable",
    TableRepeater => "table_repeater",
    Textarea => "textarea",
}

impl FieldType {
    pub fn is_known(&self) -> bool {
        !matches!(self, FieldType::Other(_))
    }

    /// Kinds whose value is picked from an option source.
    pub fn is_selection(&self) -> bool {
        matches!(
            self,
            FieldType::Select
                | FieldType::MultiSelect
                | FieldType::Radio
                | FieldType::Checkboxes
                | FieldType::TreeSelect
                | FieldType::Cascader
                | FieldType::Transfer
        )
    }

    /// Kinds that hold numbers.
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Number | FieldType::Currency | FieldType::Slider | FieldType::Rating
        )
    }

    /// Kinds that hold lists.
    pub fn is_multi_valued(&self) -> bool {
        matches!(
            self,
            FieldType::MultiSelect
                | FieldType::Checkboxes
                | FieldType::Tags
                | FieldType::Transfer
                | FieldType::Repeatable
                | FieldType::TableRepeater
        )
    }

    /// Kinds that hold uploads.
    pub fn is_file(&self) -> bool {
        matches!(self, FieldType::File | FieldType::Image)
    }

    /// Presentational kinds that never carry a value.
    pub fn is_decorative(&self) -> bool {
        matches!(
            self,
            FieldType::Divider | FieldType::Html | FieldType::Static | FieldType::Display
        )
    }
}

impl From<String> for FieldType {
    fn from(s: String) -> Self {
        FieldType::parse(&s)
    }
}

impl From<FieldType> for String {
    fn from(t: FieldType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ──────────────────────────────────────────────
// Options and data sources
// ──────────────────────────────────────────────

/// One choice of a selection field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldOption {
    pub value: Value,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FieldOption>,
}

impl FieldOption {
    pub fn new(value: impl Into<Value>, label: impl Into<String>) -> Self {
        FieldOption {
            value: value.into(),
            label: label.into(),
            description: None,
            group: None,
            disabled: false,
            children: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    Api,
    Static,
    Computed,
}

/// Where a selection field loads its options from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    #[serde(rename = "type")]
    pub kind: DataSourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<u64>,
}

// ──────────────────────────────────────────────
// Validation rules
// ──────────────────────────────────────────────

/// Well-known string formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringFormat {
    Email,
    Url,
    Phone,
    Uuid,
    Date,
    Time,
    #[serde(alias = "date-time")]
    DateTime,
}

/// Upload constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRules {
    /// Maximum size in bytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u64>,
    /// Allowed MIME types; `image/*` style wildcards match a whole family.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accept: Vec<String>,
}

/// Declarative validation rules for a field's value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldValidation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Message shown when `pattern` does not match.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<StringFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub integer: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub positive: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_items: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_items: Option<usize>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub unique_items: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<FileRules>,
    /// Names of custom rules resolved through a rule registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom: Vec<String>,
    /// Per-rule message overrides keyed by rule name (`required`, `minLength`, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub messages: BTreeMap<String, String>,
}

// ──────────────────────────────────────────────
// Transform, presentation, i18n
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transform {
    Uppercase,
    Lowercase,
    Trim,
    Capitalize,
    Slugify,
}

impl Transform {
    pub fn apply(&self, input: &str) -> String {
        match self {
            Transform::Uppercase => input.to_uppercase(),
            Transform::Lowercase => input.to_lowercase(),
            Transform::Trim => input.trim().to_string(),
            Transform::Capitalize => {
                let mut chars = input.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars).collect(),
                    None => String::new(),
                }
            }
            Transform::Slugify => {
                let mut slug = String::with_capacity(input.len());
                for c in input.trim().chars() {
                    if c.is_alphanumeric() {
                        slug.extend(c.to_lowercase());
                    } else if !slug.ends_with('-') && !slug.is_empty() {
                        slug.push('-');
                    }
                }
                slug.trim_end_matches('-').to_string()
            }
        }
    }

    /// Apply to string values; other values pass through unchanged.
    pub fn apply_value(&self, value: Value) -> Value {
        match value {
            Value::String(s) => Value::String(self.apply(&s)),
            other => other,
        }
    }
}

/// Grid placement hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldLayout {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub col_span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_span: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Style {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub css: BTreeMap<String, String>,
}

/// Per-locale overrides of a field's text, keyed by locale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldI18n {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub label: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub placeholder: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub help: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tooltip: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub description: BTreeMap<String, String>,
}

// ──────────────────────────────────────────────
// Field
// ──────────────────────────────────────────────

/// A single form input descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub disabled: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source: Option<DataSource>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<FieldValidation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditional: Option<Conditional>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debounce_ms: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub layout: Option<FieldLayout>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<Style>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub i18n: Option<FieldI18n>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub require_permission: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub require_roles: Vec<String>,
}

impl Field {
    /// A bare field with no rules, flags or presentation.
    pub fn new(name: impl Into<String>, field_type: FieldType, label: impl Into<String>) -> Self {
        Field {
            name: name.into(),
            field_type,
            label: label.into(),
            description: None,
            placeholder: None,
            help: None,
            tooltip: None,
            icon: None,
            required: false,
            disabled: false,
            readonly: false,
            hidden: false,
            value: None,
            default: None,
            options: Vec::new(),
            data_source: None,
            validation: None,
            transform: None,
            conditional: None,
            dependencies: Vec::new(),
            debounce_ms: None,
            layout: None,
            style: None,
            i18n: None,
            require_permission: None,
            require_roles: Vec::new(),
        }
    }

    /// Options declared inline or by a static data source.
    pub fn available_options(&self) -> &[FieldOption] {
        if !self.options.is_empty() {
            return &self.options;
        }
        match &self.data_source {
            Some(ds) if ds.kind == DataSourceKind::Static => &ds.options,
            _ => &[],
        }
    }

    /// The value a fresh session starts with.
    pub fn initial_value(&self) -> Option<&Value> {
        self.value.as_ref().or(self.default.as_ref())
    }

    /// Apply the declared transform, if any.
    pub fn transform_value(&self, value: Value) -> Value {
        match &self.transform {
            Some(t) => t.apply_value(value),
            None => value,
        }
    }
}
