//! Condition tree evaluation.
//!
//! [`ConditionEvaluator::assess`] walks a [`ConditionGroup`] against a data
//! map and never fails: a subtree that errors (unknown operator, bad regex,
//! depth limit) or whose operands do not fit the operator counts as false,
//! and the problem is reported alongside the result. Callers that need the
//! error use [`ConditionEvaluator::evaluate`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, OnceLock, PoisonError};

use regex::Regex;
use serde::{Deserialize, Serialize};

use formweave_core::{
    Condition, ConditionGroup, ConditionNode, DataMap, ErrorKind, LogicOp, SchemaError, Value,
};

use crate::compare::{self, Verdict};

/// Compiled patterns kept per evaluator before the cache is cleared.
pub const REGEX_CACHE_LIMIT: usize = 1000;

// ──────────────────────────────────────────────
// Options and context
// ──────────────────────────────────────────────

/// Knobs for comparison semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Compare strings byte for byte. When false, strings are lowercased first.
    pub case_sensitive: bool,
    /// Refuse to coerce numeric strings to numbers.
    pub strict_types: bool,
    /// Deepest group nesting accepted; the root group is depth 1.
    pub max_depth: usize,
}

impl Default for EvalOptions {
    fn default() -> Self {
        EvalOptions {
            case_sensitive: true,
            strict_types: false,
            max_depth: 10,
        }
    }
}

/// Data plus options for one evaluation.
#[derive(Debug, Clone)]
pub struct EvalContext<'a> {
    pub data: &'a DataMap,
    pub options: EvalOptions,
}

impl<'a> EvalContext<'a> {
    pub fn new(data: &'a DataMap) -> Self {
        EvalContext {
            data,
            options: EvalOptions::default(),
        }
    }

    pub fn with_options(data: &'a DataMap, options: EvalOptions) -> Self {
        EvalContext { data, options }
    }
}

// ──────────────────────────────────────────────
// Errors and diagnostics
// ──────────────────────────────────────────────

/// A condition that could not be evaluated at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionError {
    UnknownOperator { op: String },
    InvalidRegex { pattern: String, message: String },
    DepthExceeded { max: usize },
    /// NOT applied to zero or several children.
    NotArity { count: usize },
}

impl fmt::Display for ConditionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionError::UnknownOperator { op } => write!(f, "unknown operator '{}'", op),
            ConditionError::InvalidRegex { pattern, message } => {
                write!(f, "invalid regex '{}': {}", pattern, message)
            }
            ConditionError::DepthExceeded { max } => {
                write!(f, "condition nesting exceeds maximum depth {}", max)
            }
            ConditionError::NotArity { count } => {
                write!(f, "NOT requires exactly one condition, got {}", count)
            }
        }
    }
}

impl std::error::Error for ConditionError {}

impl From<ConditionError> for SchemaError {
    fn from(e: ConditionError) -> Self {
        let code = match &e {
            ConditionError::UnknownOperator { .. } => "unknown_operator",
            ConditionError::InvalidRegex { .. } => "invalid_regex",
            ConditionError::DepthExceeded { .. } => "depth_exceeded",
            ConditionError::NotArity { .. } => "not_arity",
        };
        SchemaError::new(ErrorKind::Validation, e.to_string()).with_code(code)
    }
}

/// A comparison whose operand types did not fit its operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub field: String,
    pub operator: String,
    pub message: String,
}

/// Result of a lenient evaluation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Assessment {
    pub result: bool,
    pub diagnostics: Vec<Diagnostic>,
    pub errors: Vec<ConditionError>,
}

impl Assessment {
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty() && self.errors.is_empty()
    }
}

// ──────────────────────────────────────────────
// Evaluator
// ──────────────────────────────────────────────

/// Evaluates condition trees; owns a bounded cache of compiled patterns.
#[derive(Debug, Default)]
pub struct ConditionEvaluator {
    regexes: Mutex<HashMap<String, Regex>>,
}

/// A node either settles to a boolean or fails; failure reads as false.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Outcome {
    Settled(bool),
    Failed,
}

impl Outcome {
    fn truthy(self) -> bool {
        matches!(self, Outcome::Settled(true))
    }
}

struct Walk<'e, 'c> {
    evaluator: &'e ConditionEvaluator,
    ctx: &'c EvalContext<'c>,
    diagnostics: Vec<Diagnostic>,
    errors: Vec<ConditionError>,
}

impl Walk<'_, '_> {
    fn group(&mut self, group: &ConditionGroup, depth: usize) -> Outcome {
        if depth > self.ctx.options.max_depth {
            self.errors.push(ConditionError::DepthExceeded {
                max: self.ctx.options.max_depth,
            });
            return Outcome::Failed;
        }
        match group.operator {
            LogicOp::And => {
                for node in &group.conditions {
                    if !self.node(node, depth).truthy() {
                        return Outcome::Settled(false);
                    }
                }
                Outcome::Settled(true)
            }
            LogicOp::Or => {
                for node in &group.conditions {
                    if self.node(node, depth).truthy() {
                        return Outcome::Settled(true);
                    }
                }
                Outcome::Settled(false)
            }
            LogicOp::Not => {
                if group.conditions.len() != 1 {
                    self.errors.push(ConditionError::NotArity {
                        count: group.conditions.len(),
                    });
                    return Outcome::Failed;
                }
                match self.node(&group.conditions[0], depth) {
                    Outcome::Settled(b) => Outcome::Settled(!b),
                    Outcome::Failed => Outcome::Failed,
                }
            }
        }
    }

    fn node(&mut self, node: &ConditionNode, depth: usize) -> Outcome {
        match node {
            ConditionNode::Group(group) => self.group(group, depth + 1),
            ConditionNode::Condition(cond) => self.leaf(cond),
        }
    }

    fn leaf(&mut self, cond: &Condition) -> Outcome {
        let left = Value::lookup_path(self.ctx.data, &cond.field);
        let evaluator = self.evaluator;
        match compare::compare(&cond.operator, left, &cond.value, &self.ctx.options, |p| {
            evaluator.cached_regex(p)
        }) {
            Ok(Verdict::Holds(b)) => Outcome::Settled(b),
            Ok(Verdict::Mismatch(message)) => {
                self.diagnostics.push(Diagnostic {
                    field: cond.field.clone(),
                    operator: cond.operator.to_string(),
                    message,
                });
                Outcome::Failed
            }
            Err(e) => {
                self.errors.push(e);
                Outcome::Failed
            }
        }
    }
}

impl ConditionEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate leniently, collecting diagnostics and errors.
    pub fn assess(&self, group: &ConditionGroup, ctx: &EvalContext<'_>) -> Assessment {
        let mut walk = Walk {
            evaluator: self,
            ctx,
            diagnostics: Vec::new(),
            errors: Vec::new(),
        };
        let result = walk.group(group, 1).truthy();
        Assessment {
            result,
            diagnostics: walk.diagnostics,
            errors: walk.errors,
        }
    }

    /// Evaluate, surfacing the first error encountered.
    ///
    /// Type mismatches are not errors: they make the comparison false.
    pub fn evaluate(
        &self,
        group: &ConditionGroup,
        ctx: &EvalContext<'_>,
    ) -> Result<bool, ConditionError> {
        let assessment = self.assess(group, ctx);
        match assessment.errors.into_iter().next() {
            Some(e) => Err(e),
            None => Ok(assessment.result),
        }
    }

    /// Evaluate an optional clause, returning `absent` when there is none.
    ///
    /// Errors are logged and the clause reads as false.
    pub fn holds(&self, clause: Option<&ConditionGroup>, ctx: &EvalContext<'_>, absent: bool) -> bool {
        let Some(group) = clause else {
            return absent;
        };
        let assessment = self.assess(group, ctx);
        for e in &assessment.errors {
            log::warn!("condition evaluated as false: {}", e);
        }
        for d in &assessment.diagnostics {
            log::debug!("condition on '{}' ({}): {}", d.field, d.operator, d.message);
        }
        assessment.result
    }

    /// Compile `pattern`, reusing an earlier compilation when possible.
    pub fn cached_regex(&self, pattern: &str) -> Result<Regex, ConditionError> {
        let mut cache = self.regexes.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(re) = cache.get(pattern) {
            return Ok(re.clone());
        }
        let re = Regex::new(pattern).map_err(|e| ConditionError::InvalidRegex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;
        if cache.len() >= REGEX_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(pattern.to_string(), re.clone());
        Ok(re)
    }

    /// Number of compiled patterns currently cached.
    pub fn cached_patterns(&self) -> usize {
        self.regexes.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

/// The process-wide evaluator used when none is injected.
pub fn default_evaluator() -> &'static ConditionEvaluator {
    static DEFAULT: OnceLock<ConditionEvaluator> = OnceLock::new();
    DEFAULT.get_or_init(ConditionEvaluator::new)
}
