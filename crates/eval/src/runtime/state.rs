//! Per-session form state.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use formweave_core::{DataMap, Value};

use crate::visibility::FieldState;

/// When field validation runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    /// On every change (debounced) and on blur.
    #[default]
    OnChange,
    /// On blur only.
    OnBlur,
    /// Only when the form is submitted.
    OnSubmit,
}

/// Runtime settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub mode: ValidationMode,
    /// Message locale; the resolver's current locale when unset.
    pub locale: Option<String>,
    /// Debounce for fields that declare none. Zero validates immediately.
    pub default_debounce_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    #[default]
    Idle,
    Submitting,
    Submitted,
    Failed,
}

/// Everything a session tracks. Returned by value from
/// [`Runtime::snapshot`](super::Runtime::snapshot).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeState {
    pub values: DataMap,
    pub initial: DataMap,
    pub dirty: BTreeSet<String>,
    pub touched: BTreeSet<String>,
    pub errors: BTreeMap<String, Vec<String>>,
    pub warnings: BTreeMap<String, Vec<String>>,
    /// Fields with a scheduled or running validation.
    pub pending: BTreeSet<String>,
    pub current_step: usize,
    pub current_tab: Option<String>,
    pub status: SubmissionStatus,
    pub submit_count: u32,
    pub field_states: BTreeMap<String, FieldState>,
    /// Change counter per field; validation results for an older
    /// generation are discarded.
    #[serde(skip)]
    pub(crate) generations: BTreeMap<String, u64>,
}

impl RuntimeState {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub(crate) fn generation(&self, name: &str) -> u64 {
        self.generations.get(name).copied().unwrap_or(0)
    }

    pub(crate) fn bump(&mut self, name: &str) -> u64 {
        let gen = self.generations.entry(name.to_string()).or_insert(0);
        *gen += 1;
        *gen
    }

    /// Recompute the dirty flag of `name` against its initial value.
    pub(crate) fn refresh_dirty(&mut self, name: &str) {
        let initial = self.initial.get(name).unwrap_or(&Value::Null);
        let current = self.values.get(name).unwrap_or(&Value::Null);
        let same = initial.loosely_equals(current)
            || (initial.is_empty_value() && current.is_empty_value());
        if same {
            self.dirty.remove(name);
        } else {
            self.dirty.insert(name.to_string());
        }
    }

    pub(crate) fn set_errors(&mut self, name: &str, errors: Vec<String>, warnings: Vec<String>) {
        if errors.is_empty() {
            self.errors.remove(name);
        } else {
            self.errors.insert(name.to_string(), errors);
        }
        if warnings.is_empty() {
            self.warnings.remove(name);
        } else {
            self.warnings.insert(name.to_string(), warnings);
        }
    }
}

/// Counters for one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeStats {
    pub changes: u64,
    /// Field validations that ran to completion.
    pub validations: u64,
    /// Validation results dropped because a newer change arrived.
    pub discarded: u64,
    pub submissions: u64,
}
