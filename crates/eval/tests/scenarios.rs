//! End-to-end form sessions.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use formweave_core::{
    CompareOp, ConditionGroup, DataMap, EventBus, EventKind, FieldBuilder, SchemaBuilder, Value,
};
use formweave_eval::{
    default_evaluator, CustomRule, EvalContext, FieldValidator, FnRule, RuleContext, RuleError,
    RuleOutcome, RuleRegistry, Runtime, RuntimeConfig, SubmissionStatus, ValidationMode,
    Visibility,
};

fn data(pairs: &[(&str, &str)]) -> DataMap {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), Value::from(*v)))
        .collect()
}

#[tokio::test]
async fn empty_required_email_fails_submit() {
    let schema = SchemaBuilder::form("signup")
        .field(FieldBuilder::email("email").label("Email").required())
        .must_build();
    let bus = Arc::new(EventBus::inline());
    let submits = Arc::new(Mutex::new(0));
    let counter = Arc::clone(&submits);
    bus.subscribe(EventKind::FormSubmit, move |_| {
        *counter.lock().unwrap() += 1;
        Ok(())
    });

    let rt = Runtime::builder(schema).bus(Arc::clone(&bus)).build();
    rt.handle_change("email", "").await.unwrap();
    let result = rt.handle_submit(&DataMap::new()).await.unwrap();

    assert!(!result.valid);
    assert!(result
        .field_errors("email")
        .contains(&"Email is required".to_string()));
    assert!(rt
        .field_errors("email")
        .contains(&"Email is required".to_string()));
    assert_eq!(rt.status(), SubmissionStatus::Failed);
    assert!(rt.is_touched("email"));
    assert_eq!(*submits.lock().unwrap(), 1);
}

#[tokio::test]
async fn valid_submit_marks_submitted() {
    let schema = SchemaBuilder::form("signup")
        .field(FieldBuilder::email("email").label("Email").required())
        .must_build();
    let rt = Runtime::new(schema, RuntimeConfig::default());
    let result = rt
        .handle_submit(&data(&[("email", "  ada@example.com ")]))
        .await
        .unwrap();
    assert!(result.valid, "{:?}", result.errors);
    assert_eq!(result.data.get("email"), Some(&Value::from("ada@example.com")));
    assert_eq!(rt.status(), SubmissionStatus::Submitted);
    assert_eq!(rt.snapshot().submit_count, 1);
}

#[test]
fn spouse_name_follows_marital_status() {
    let schema = SchemaBuilder::form("household")
        .field(FieldBuilder::select("marital").label("Marital status").option("single", "Single").option("married", "Married"))
        .field(
            FieldBuilder::text("spouse_name")
                .label("Spouse name")
                .show_when(ConditionGroup::when("marital", CompareOp::Eq, "married")),
        )
        .must_build();
    let spouse = schema.field("spouse_name").unwrap();

    let single = data(&[("marital", "single")]);
    assert!(!spouse.is_visible(default_evaluator(), &EvalContext::new(&single)));

    let married = data(&[("marital", "married")]);
    assert!(spouse.is_visible(default_evaluator(), &EvalContext::new(&married)));
}

#[tokio::test(start_paused = true)]
async fn debounced_changes_validate_once() {
    let schema = SchemaBuilder::form("search")
        .field(
            FieldBuilder::text("query")
                .label("Query")
                .debounce_ms(50)
                .custom_rule("record"),
        )
        .must_build();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let rules = Arc::new(RuleRegistry::new());
    rules
        .register(FnRule::new("record", move |value, _| {
            log.lock().unwrap().push(value.to_display_string());
            Ok(RuleOutcome::Valid)
        }))
        .unwrap();
    let rt = Runtime::builder(schema)
        .validator(FieldValidator::new().with_rules(rules))
        .build();

    rt.handle_change("query", "a").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    rt.handle_change("query", "ab").await.unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    rt.handle_change("query", "abc").await.unwrap();
    rt.wait_idle().await;

    assert_eq!(*seen.lock().unwrap(), vec!["abc".to_string()]);
    let stats = rt.stats();
    assert_eq!(stats.changes, 3);
    assert_eq!(stats.validations, 1);
    assert_eq!(stats.discarded, 2);
}

#[tokio::test(start_paused = true)]
async fn blur_replaces_pending_debounce() {
    let schema = SchemaBuilder::form("search")
        .field(FieldBuilder::text("query").label("Query").required().debounce_ms(200))
        .must_build();
    let rt = Runtime::new(schema, RuntimeConfig::default());

    rt.handle_change("query", "").await.unwrap();
    assert!(rt.is_valid());
    rt.handle_blur("query").await.unwrap();
    assert_eq!(rt.field_errors("query"), vec!["Query is required"]);
    rt.wait_idle().await;
    assert_eq!(rt.stats().validations, 1);
}

struct SlowRule;

#[async_trait::async_trait]
impl CustomRule for SlowRule {
    fn name(&self) -> &str {
        "slow"
    }

    async fn check(
        &self,
        _value: &Value,
        _ctx: RuleContext<'_>,
    ) -> Result<RuleOutcome, RuleError> {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(RuleOutcome::Valid)
    }
}

#[tokio::test(start_paused = true)]
async fn change_during_blur_validation_leaves_session_idle() {
    let schema = SchemaBuilder::form("search")
        .field(FieldBuilder::text("query").label("Query").custom_rule("slow"))
        .must_build();
    let rules = Arc::new(RuleRegistry::new());
    rules.register(SlowRule).unwrap();
    let config = RuntimeConfig {
        mode: ValidationMode::OnBlur,
        ..RuntimeConfig::default()
    };
    let rt = Runtime::builder(schema)
        .config(config)
        .validator(FieldValidator::new().with_rules(rules))
        .build();

    rt.handle_change("query", "a").await.unwrap();
    let blur = tokio::spawn({
        let rt = rt.clone();
        async move { rt.handle_blur("query").await }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    rt.handle_change("query", "ab").await.unwrap();
    blur.await.unwrap().unwrap();

    tokio::time::timeout(Duration::from_secs(5), rt.wait_idle())
        .await
        .expect("session should be idle once the stale blur finishes");
    assert!(rt.snapshot().pending.is_empty());
    assert_eq!(rt.stats().discarded, 1);
}

#[tokio::test]
async fn change_and_submit_agree_on_numeric_strings() {
    let schema = SchemaBuilder::form("order")
        .field(FieldBuilder::number("qty").label("Qty").required())
        .must_build();
    let rt = Runtime::new(schema, RuntimeConfig::default());

    rt.handle_change("qty", "5").await.unwrap();
    assert!(rt.field_errors("qty").is_empty(), "{:?}", rt.errors());
    rt.handle_blur("qty").await.unwrap();
    assert!(rt.field_errors("qty").is_empty(), "{:?}", rt.errors());

    let result = rt.handle_submit(&DataMap::new()).await.unwrap();
    assert!(result.valid, "{:?}", result.errors);

    rt.handle_change("qty", "five").await.unwrap();
    let on_change = rt.field_errors("qty");
    assert_eq!(on_change.len(), 1);
    let result = rt.handle_submit(&DataMap::new()).await.unwrap();
    assert_eq!(result.field_errors("qty"), on_change.as_slice());
}

#[tokio::test(start_paused = true)]
async fn submit_discards_in_flight_debounce() {
    let schema = SchemaBuilder::form("search")
        .field(FieldBuilder::text("query").label("Query").min_length(3).debounce_ms(100))
        .must_build();
    let rt = Runtime::new(schema, RuntimeConfig::default());

    rt.handle_change("query", "ab").await.unwrap();
    let result = rt.handle_submit(&data(&[("query", "abcd")])).await.unwrap();
    assert!(result.valid);
    tokio::time::sleep(Duration::from_millis(200)).await;
    rt.wait_idle().await;
    assert!(rt.is_valid());
    assert_eq!(rt.value("query"), Some(Value::from("abcd")));
}
