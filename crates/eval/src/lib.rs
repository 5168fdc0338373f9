//! formweave-eval: everything that happens to a schema at request time.
//!
//! - [`ConditionEvaluator`] decides condition trees against form data.
//! - [`FieldValidator`] checks values against field rules and produces
//!   localized messages.
//! - [`Enricher`] specializes a schema for one user: access checks, tenant
//!   overrides, dynamic defaults, localization and per-field runtime state.
//! - [`Runtime`] runs a live form session with debounced validation.
//!
//! The schema model itself lives in `formweave-core`.

mod compare;
pub mod condition;
pub mod enrich;
pub mod localize;
pub mod runtime;
pub mod validation;
pub mod visibility;

pub use condition::{
    default_evaluator, Assessment, ConditionError, ConditionEvaluator, Diagnostic, EvalContext,
    EvalOptions,
};
pub use enrich::{
    check_access, ActionRuntime, BasicUser, EnrichedSchema, Enricher, FieldOverride,
    FieldRuntime, Reason, StaticTenantProvider, TenantCustomization, TenantProvider, User,
};
pub use localize::localize_schema;
pub use runtime::{
    Runtime, RuntimeBuilder, RuntimeConfig, RuntimeState, RuntimeStats, SubmissionStatus,
    ValidationMode,
};
pub use validation::{
    CustomRule, ErrorCollector, FieldReport, FieldValidator, FnRule, RuleContext, RuleError,
    RuleOutcome, RuleRegistry, ValidationResult,
};
pub use visibility::{FieldConditions, FieldState, Visibility};
