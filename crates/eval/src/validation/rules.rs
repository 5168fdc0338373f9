//! Named custom validation rules.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;

use formweave_core::{DataMap, Field, SchemaError, Value};

/// What a custom rule sees besides the value itself.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    pub field: &'a Field,
    /// Consistent snapshot of the whole form.
    pub data: &'a DataMap,
    pub locale: &'a str,
}

/// Verdict of a rule that ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleOutcome {
    Valid,
    /// The value is rejected. An empty message falls back to `validation.custom`.
    Invalid(String),
}

/// A rule that could not reach a verdict.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Other(String),
}

/// A validation rule resolved by name from a [`RuleRegistry`].
///
/// Failures to reach a verdict degrade to warnings unless [`fatal`](Self::fatal)
/// returns true, in which case they are reported as field errors.
#[async_trait]
pub trait CustomRule: Send + Sync {
    fn name(&self) -> &str;

    fn fatal(&self) -> bool {
        false
    }

    /// Upper bound on one check. `None` waits indefinitely.
    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn check(&self, value: &Value, ctx: RuleContext<'_>) -> Result<RuleOutcome, RuleError>;
}

type CheckFn = dyn Fn(&Value, RuleContext<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync;

/// A synchronous rule built from a closure.
pub struct FnRule {
    name: String,
    fatal: bool,
    timeout: Option<Duration>,
    check: Box<CheckFn>,
}

impl FnRule {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Value, RuleContext<'_>) -> Result<RuleOutcome, RuleError> + Send + Sync + 'static,
    {
        FnRule {
            name: name.into(),
            fatal: false,
            timeout: None,
            check: Box::new(check),
        }
    }

    pub fn fatal(mut self) -> Self {
        self.fatal = true;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl CustomRule for FnRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn fatal(&self) -> bool {
        self.fatal
    }

    fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    async fn check(&self, value: &Value, ctx: RuleContext<'_>) -> Result<RuleOutcome, RuleError> {
        (self.check)(value, ctx)
    }
}

/// Rules keyed by name.
#[derive(Default)]
pub struct RuleRegistry {
    rules: RwLock<HashMap<String, Arc<dyn CustomRule>>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a rule. A second rule with the same name is a conflict.
    pub fn register(&self, rule: impl CustomRule + 'static) -> Result<(), SchemaError> {
        self.register_arc(Arc::new(rule))
    }

    pub fn register_arc(&self, rule: Arc<dyn CustomRule>) -> Result<(), SchemaError> {
        let mut rules = self.rules.write().unwrap_or_else(PoisonError::into_inner);
        let name = rule.name().to_string();
        if rules.contains_key(&name) {
            return Err(SchemaError::conflict(format!("rule '{}' is already registered", name))
                .with_code("duplicate_rule")
                .with_detail("rule", name));
        }
        rules.insert(name, rule);
        Ok(())
    }

    pub fn unregister(&self, name: &str) -> bool {
        self.rules
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CustomRule>> {
        self.rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .rules
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry").field("rules", &self.names()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use formweave_core::{ErrorKind, FieldType};

    #[test]
    fn duplicate_names_conflict() {
        let registry = RuleRegistry::new();
        registry
            .register(FnRule::new("even", |_, _| Ok(RuleOutcome::Valid)))
            .unwrap();
        let err = registry
            .register(FnRule::new("even", |_, _| Ok(RuleOutcome::Valid)))
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(registry.names(), vec!["even".to_string()]);
        assert!(registry.unregister("even"));
        assert!(registry.get("even").is_none());
    }

    #[tokio::test]
    async fn closure_rules_see_value_and_context() {
        let rule = FnRule::new("even", |value, ctx| match value.as_i64() {
            Some(n) if n % 2 == 0 => Ok(RuleOutcome::Valid),
            Some(_) => Ok(RuleOutcome::Invalid(format!("{} must be even", ctx.field.label))),
            None => Err(RuleError::Other("not a number".into())),
        });
        let field = Field::new("n", FieldType::Number, "N");
        let data = DataMap::new();
        let ctx = RuleContext {
            field: &field,
            data: &data,
            locale: "en",
        };
        assert_eq!(rule.check(&Value::Int(4), ctx).await, Ok(RuleOutcome::Valid));
        assert_eq!(
            rule.check(&Value::Int(3), ctx).await,
            Ok(RuleOutcome::Invalid("N must be even".into()))
        );
        assert!(rule.check(&Value::from("x"), ctx).await.is_err());
    }
}
