//! Parsing schema documents from bytes.

use std::fmt;
use std::sync::Arc;

use formweave_core::{validate, ErrorKind, Schema, SchemaError, SchemaErrors};

/// Errors produced while reading a schema document.
#[derive(Debug, Clone, PartialEq)]
pub enum InterchangeError {
    /// The input was empty or whitespace only.
    Empty,
    /// The input exceeds the configured size limit.
    TooLarge { size: usize, max: usize },
    /// The bytes are not well-formed in the detected format.
    Syntax { format: Format, message: String },
    /// The document declares more fields than allowed.
    TooManyFields { count: usize, max: usize },
    /// The document parsed but its configuration is inconsistent.
    Invalid(SchemaErrors),
    /// A parser plugin claimed the input and then failed on it.
    Plugin { name: String, message: String },
    /// Output could not be produced.
    Serialize(String),
}

impl fmt::Display for InterchangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterchangeError::Empty => write!(f, "schema document is empty"),
            InterchangeError::TooLarge { size, max } => {
                write!(f, "schema document is {} bytes, limit is {}", size, max)
            }
            InterchangeError::Syntax { format, message } => {
                write!(f, "invalid {} document: {}", format, message)
            }
            InterchangeError::TooManyFields { count, max } => {
                write!(f, "schema declares {} fields, limit is {}", count, max)
            }
            InterchangeError::Invalid(errors) => write!(f, "invalid schema: {}", errors),
            InterchangeError::Plugin { name, message } => {
                write!(f, "parser plugin '{}' failed: {}", name, message)
            }
            InterchangeError::Serialize(msg) => write!(f, "cannot serialize schema: {}", msg),
        }
    }
}

impl std::error::Error for InterchangeError {}

impl From<InterchangeError> for SchemaError {
    fn from(err: InterchangeError) -> Self {
        match err {
            InterchangeError::Invalid(errors) => errors.into_error(),
            InterchangeError::Serialize(_) => {
                SchemaError::internal(err.to_string()).with_code("serialize_failed")
            }
            other => {
                let code = match &other {
                    InterchangeError::Empty => "empty_document",
                    InterchangeError::TooLarge { .. } => "document_too_large",
                    InterchangeError::Syntax { .. } => "syntax_error",
                    InterchangeError::TooManyFields { .. } => "too_many_fields",
                    _ => "plugin_failed",
                };
                SchemaError::new(ErrorKind::Validation, other.to_string()).with_code(code)
            }
        }
    }
}

// ──────────────────────────────────────────────
// Formats
// ──────────────────────────────────────────────

/// Built-in wire formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// JSON documents open with `{` or `[`; everything else is read as YAML.
    pub fn detect(data: &[u8]) -> Format {
        match data.iter().find(|b| !b.is_ascii_whitespace()) {
            Some(b'{') | Some(b'[') => Format::Json,
            _ => Format::Yaml,
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Format::Json => write!(f, "json"),
            Format::Yaml => write!(f, "yaml"),
        }
    }
}

// ──────────────────────────────────────────────
// Options and plugins
// ──────────────────────────────────────────────

/// Limits applied to every parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    /// Largest accepted document, in bytes.
    pub max_size: usize,
    /// Largest accepted number of top-level fields.
    pub max_fields: usize,
    /// Run static configuration validation on the parsed schema.
    pub validate: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        ParseOptions {
            max_size: 10 * 1024 * 1024,
            max_fields: 500,
            validate: true,
        }
    }
}

/// An alternate input format.
///
/// Plugins are asked in registration order; the first whose `can_parse`
/// returns true handles the document. The resulting schema still goes
/// through the parser's limits and validation.
pub trait ParserPlugin: Send + Sync {
    fn name(&self) -> &str;
    fn can_parse(&self, data: &[u8]) -> bool;
    fn parse(&self, data: &[u8]) -> Result<Schema, String>;
}

// ──────────────────────────────────────────────
// Parser
// ──────────────────────────────────────────────

/// Reads schema documents.
#[derive(Clone, Default)]
pub struct Parser {
    options: ParseOptions,
    plugins: Vec<Arc<dyn ParserPlugin>>,
}

impl fmt::Debug for Parser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parser")
            .field("options", &self.options)
            .field("plugins", &self.plugin_names())
            .finish()
    }
}

impl Parser {
    pub fn new(options: ParseOptions) -> Self {
        Parser {
            options,
            plugins: Vec::new(),
        }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    /// Add a plugin. A plugin with the same name is replaced in place.
    pub fn register_plugin(&mut self, plugin: Arc<dyn ParserPlugin>) {
        match self.plugins.iter().position(|p| p.name() == plugin.name()) {
            Some(idx) => self.plugins[idx] = plugin,
            None => self.plugins.push(plugin),
        }
    }

    /// Remove a plugin by name. Returns whether one was registered.
    pub fn unregister_plugin(&mut self, name: &str) -> bool {
        let before = self.plugins.len();
        self.plugins.retain(|p| p.name() != name);
        self.plugins.len() != before
    }

    pub fn plugin_names(&self) -> Vec<String> {
        self.plugins.iter().map(|p| p.name().to_string()).collect()
    }

    /// Parse a document, letting plugins claim it first.
    pub fn parse(&self, data: &[u8]) -> Result<Schema, InterchangeError> {
        self.check_size(data)?;
        if let Some(plugin) = self.plugins.iter().find(|p| p.can_parse(data)) {
            log::debug!("parser plugin '{}' claimed document", plugin.name());
            let schema = plugin.parse(data).map_err(|message| InterchangeError::Plugin {
                name: plugin.name().to_string(),
                message,
            })?;
            return self.finish(schema);
        }
        let schema = match Format::detect(data) {
            Format::Json => decode_json(data)?,
            Format::Yaml => decode_yaml(data)?,
        };
        self.finish(schema)
    }

    /// Parse JSON without consulting plugins.
    pub fn parse_json(&self, data: &[u8]) -> Result<Schema, InterchangeError> {
        self.check_size(data)?;
        self.finish(decode_json(data)?)
    }

    /// Parse YAML without consulting plugins.
    pub fn parse_yaml(&self, data: &[u8]) -> Result<Schema, InterchangeError> {
        self.check_size(data)?;
        self.finish(decode_yaml(data)?)
    }

    fn check_size(&self, data: &[u8]) -> Result<(), InterchangeError> {
        if data.len() > self.options.max_size {
            return Err(InterchangeError::TooLarge {
                size: data.len(),
                max: self.options.max_size,
            });
        }
        if data.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(InterchangeError::Empty);
        }
        Ok(())
    }

    fn finish(&self, schema: Schema) -> Result<Schema, InterchangeError> {
        if schema.fields.len() > self.options.max_fields {
            return Err(InterchangeError::TooManyFields {
                count: schema.fields.len(),
                max: self.options.max_fields,
            });
        }
        if self.options.validate {
            validate::check(&schema).map_err(InterchangeError::Invalid)?;
        }
        Ok(schema)
    }
}

fn decode_json(data: &[u8]) -> Result<Schema, InterchangeError> {
    serde_json::from_slice(data).map_err(|e| InterchangeError::Syntax {
        format: Format::Json,
        message: e.to_string(),
    })
}

fn decode_yaml(data: &[u8]) -> Result<Schema, InterchangeError> {
    serde_yaml::from_slice(data).map_err(|e| InterchangeError::Syntax {
        format: Format::Yaml,
        message: e.to_string(),
    })
}
