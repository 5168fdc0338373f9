//! Property tests for condition evaluation and value checks.

use std::collections::BTreeMap;
use std::sync::Arc;

use formweave_core::{
    CompareOp, Condition, ConditionGroup, ConditionNode, Conditional, DataMap, Field,
    FieldBuilder, FieldType, LogicOp, Schema, SchemaBuilder, Value,
};
use formweave_eval::{
    default_evaluator, BasicUser, EvalContext, Enricher, FieldOverride, FieldValidator,
    StaticTenantProvider, TenantCustomization, Visibility,
};
use formweave_i18n::LocalizationResolver;
use proptest::prelude::*;

fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        (-100i64..100).prop_map(Value::Int),
        (-100.0f64..100.0).prop_map(Value::Float),
        "[a-z0-9 ]{0,6}".prop_map(Value::String),
    ];
    leaf.prop_recursive(2, 16, 4, |inner| {
        prop::collection::vec(inner, 0..4).prop_map(Value::List)
    })
}

fn op_strategy() -> impl Strategy<Value = CompareOp> {
    prop_oneof![
        Just(CompareOp::Eq),
        Just(CompareOp::Ne),
        Just(CompareOp::Lt),
        Just(CompareOp::Le),
        Just(CompareOp::Gt),
        Just(CompareOp::Ge),
        Just(CompareOp::In),
        Just(CompareOp::NotIn),
        Just(CompareOp::Contains),
        Just(CompareOp::StartsWith),
        Just(CompareOp::EndsWith),
        Just(CompareOp::Empty),
        Just(CompareOp::NotEmpty),
    ]
}

fn condition_strategy() -> impl Strategy<Value = ConditionNode> {
    ("[abc]", op_strategy(), value_strategy())
        .prop_map(|(field, op, value)| ConditionNode::Condition(Condition::new(field, op, value)))
}

fn group_strategy() -> impl Strategy<Value = ConditionGroup> {
    let leaf = condition_strategy().prop_map(|c| ConditionGroup::all(vec![c]));
    leaf.prop_recursive(3, 24, 4, |inner| {
        let node = prop_oneof![
            condition_strategy(),
            inner.clone().prop_map(ConditionNode::Group),
        ];
        prop_oneof![
            prop::collection::vec(node.clone(), 0..4).prop_map(ConditionGroup::all),
            prop::collection::vec(node.clone(), 0..4).prop_map(ConditionGroup::any),
            node.prop_map(ConditionGroup::not),
        ]
    })
}

fn data_strategy() -> impl Strategy<Value = DataMap> {
    prop::collection::btree_map("[abc]", value_strategy(), 0..3)
}

fn nested(group: ConditionGroup) -> ConditionNode {
    ConditionNode::Group(group)
}

fn ticket(show: ConditionGroup, hide: ConditionGroup) -> Schema {
    SchemaBuilder::form("ticket")
        .field(FieldBuilder::text("a").label("A").i18n_label("es", "Ae"))
        .field(FieldBuilder::text("b").label("B").show_when(show))
        .field(FieldBuilder::text("c").label("C").hide_when(hide).require_permission("c.edit"))
        .field(FieldBuilder::text("tenant_id").label("Tenant"))
        .field(FieldBuilder::text("created_by").label("Author"))
        .must_build()
}

fn enricher() -> Enricher {
    let provider = Arc::new(StaticTenantProvider::new());
    let mut custom = TenantCustomization::default();
    custom.fields.insert(
        "a".into(),
        FieldOverride {
            label: Some("Tenant A".into()),
            required: Some(true),
            ..FieldOverride::default()
        },
    );
    provider.insert("ticket", "acme", custom);
    Enricher::new()
        .with_resolver(Arc::new(LocalizationResolver::default()))
        .with_tenant_provider(provider)
}

fn block_on<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap()
        .block_on(fut)
}

proptest! {
    #[test]
    fn evaluation_is_deterministic(group in group_strategy(), data in data_strategy()) {
        let ctx = EvalContext::new(&data);
        let first = default_evaluator().assess(&group, &ctx);
        let second = default_evaluator().assess(&group, &ctx);
        prop_assert_eq!(first.result, second.result);
        prop_assert_eq!(first.errors.len(), second.errors.len());
    }

    #[test]
    fn double_negation_is_identity(group in group_strategy(), data in data_strategy()) {
        let ctx = EvalContext::new(&data);
        let plain = default_evaluator().assess(&group, &ctx);
        prop_assume!(plain.errors.is_empty());
        let twice = ConditionGroup::not(nested(ConditionGroup::not(nested(group))));
        prop_assert_eq!(default_evaluator().evaluate(&twice, &ctx), Ok(plain.result));
    }

    #[test]
    fn excluded_middle_holds(group in group_strategy(), data in data_strategy()) {
        let ctx = EvalContext::new(&data);
        prop_assume!(default_evaluator().assess(&group, &ctx).errors.is_empty());
        let either = ConditionGroup::any(vec![
            nested(group.clone()),
            nested(ConditionGroup::not(nested(group))),
        ]);
        prop_assert_eq!(default_evaluator().evaluate(&either, &ctx), Ok(true));
    }

    #[test]
    fn hide_clause_overrides_show(
        show in group_strategy(),
        hide in group_strategy(),
        data in data_strategy(),
    ) {
        let ctx = EvalContext::new(&data);
        let hidden = default_evaluator().assess(&hide, &ctx).result;
        let mut field = Field::new("x", FieldType::Text, "X");
        field.conditional = Some(Conditional {
            show: Some(show),
            hide: Some(hide),
            ..Conditional::default()
        });
        if hidden {
            prop_assert!(!field.is_visible(default_evaluator(), &ctx));
        }
    }

    #[test]
    fn re_enrichment_is_stable(
        show in group_strategy(),
        hide in group_strategy(),
        data in data_strategy(),
        tenant in prop::option::of(prop_oneof![Just("acme"), Just("globex")]),
        locale in prop_oneof![Just("en"), Just("es")],
        may_edit in any::<bool>(),
    ) {
        let mut user = BasicUser::new("u1").locale(locale);
        if let Some(t) = tenant {
            user = user.tenant(t);
        }
        if may_edit {
            user = user.permission("c.edit");
        }
        let enricher = enricher();
        let (once, twice) = block_on(async {
            let once = enricher.enrich(&ticket(show, hide), &user, &data).await.unwrap();
            let twice = enricher.re_enrich(&once, &user, &data).await.unwrap();
            (once, twice)
        });
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn value_checks_are_deterministic(value in value_strategy(), required in any::<bool>()) {
        let validator = FieldValidator::new();
        let mut field = Field::new("n", FieldType::Number, "N");
        field.validation = Some(formweave_core::FieldValidation {
            min: Some(0.0),
            max: Some(50.0),
            messages: BTreeMap::new(),
            ..Default::default()
        });
        let first = validator.check_value(&field, Some(&value), required);
        let second = validator.check_value(&field, Some(&value), required);
        prop_assert_eq!(&first, &second);
        if required && value.is_empty_value() {
            prop_assert!(!first.is_empty());
        }
    }
}

#[test]
fn logic_ops_round_trip_through_serde() {
    let group = ConditionGroup {
        operator: LogicOp::Or,
        conditions: vec![ConditionNode::Condition(Condition::new("a", CompareOp::Eq, 1))],
    };
    let json = serde_json::to_string(&group).unwrap();
    assert!(json.contains("\"OR\""));
}
