//! Error taxonomy shared by every formweave crate.
//!
//! Errors are classified by an [`ErrorKind`] code rather than by Rust type,
//! so a registry miss, a builder defect and a permission denial all travel
//! as a [`SchemaError`] that callers can match on `kind`.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Error classification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Permission,
    DataSource,
    Render,
    Workflow,
    Tenant,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Permission => "permission",
            ErrorKind::DataSource => "data_source",
            ErrorKind::Render => "render",
            ErrorKind::Workflow => "workflow",
            ErrorKind::Tenant => "tenant",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Code carried by errors produced when a cancellation token fires.
pub const CANCELLED_CODE: &str = "cancelled";

/// A classified error with optional field attribution and detail map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("{}", self.render())]
pub struct SchemaError {
    pub code: String,
    pub kind: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl SchemaError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        SchemaError {
            code: kind.as_str().to_string(),
            kind,
            message: message.into(),
            field: None,
            details: BTreeMap::new(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        SchemaError::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        SchemaError::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        SchemaError::new(ErrorKind::Conflict, message)
    }

    pub fn permission(message: impl Into<String>) -> Self {
        SchemaError::new(ErrorKind::Permission, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        SchemaError::new(ErrorKind::Internal, message)
    }

    /// The error returned when a cancellation token fires mid-operation.
    pub fn cancelled() -> Self {
        SchemaError::new(ErrorKind::Internal, "operation cancelled").with_code(CANCELLED_CODE)
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.code == CANCELLED_CODE
    }

    fn render(&self) -> String {
        match &self.field {
            Some(field) => format!("[{}] {}: {}", self.code, field, self.message),
            None => format!("[{}] {}", self.code, self.message),
        }
    }
}

/// Every defect found by a builder or static validation pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaErrors(pub Vec<SchemaError>);

impl SchemaErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SchemaError> {
        self.0.iter()
    }

    #[cfg(test)]
    pub(crate) fn mentions(&self, needle: &str) -> bool {
        self.0.iter().any(|e| e.message.contains(needle))
    }

    /// Collapse into a single validation error whose details list every defect.
    pub fn into_error(self) -> SchemaError {
        let count = self.0.len();
        let messages: Vec<Value> = self.0.iter().map(|e| Value::String(e.to_string())).collect();
        SchemaError::validation(format!("{} validation error(s)", count))
            .with_detail("errors", Value::List(messages))
    }
}

impl fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} error(s)", self.0.len())?;
        for e in &self.0 {
            write!(f, "\n  {}", e)?;
        }
        Ok(())
    }
}

impl std::error::Error for SchemaErrors {}

impl From<Vec<SchemaError>> for SchemaErrors {
    fn from(errors: Vec<SchemaError>) -> Self {
        SchemaErrors(errors)
    }
}

impl IntoIterator for SchemaErrors {
    type Item = SchemaError;
    type IntoIter = std::vec::IntoIter<SchemaError>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_code_and_field() {
        let e = SchemaError::validation("is required").with_field("email");
        assert_eq!(e.to_string(), "[validation] email: is required");
        assert_eq!(
            SchemaError::not_found("schema 'x' not found").to_string(),
            "[not_found] schema 'x' not found"
        );
    }

    #[test]
    fn cancelled_is_internal_with_own_code() {
        let e = SchemaError::cancelled();
        assert_eq!(e.kind, ErrorKind::Internal);
        assert!(e.is_cancelled());
    }

    #[test]
    fn combined_error_lists_every_defect() {
        let errs = SchemaErrors(vec![
            SchemaError::validation("a"),
            SchemaError::validation("b").with_field("f"),
        ]);
        let text = errs.to_string();
        assert!(text.contains("2 error(s)"));
        assert!(text.contains("[validation] f: b"));
        let single = errs.into_error();
        assert_eq!(single.details["errors"].as_list().unwrap().len(), 2);
    }
}
