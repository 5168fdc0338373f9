//! Builder behavior across the whole schema tree.

use formweave_core::{
    ActionBuilder, CompareOp, ConditionGroup, FieldBuilder, LayoutBuilder, LayoutType,
    SchemaBuilder, SchemaErrors, SchemaType, StringFormat, Transform, Validate,
};
use proptest::prelude::*;

fn mentions(errs: &SchemaErrors, needle: &str) -> bool {
    errs.iter().any(|e| e.message.contains(needle))
}

fn contact_schema() -> SchemaBuilder {
    SchemaBuilder::form("contact")
        .title("Contact")
        .version("1")
        .field(FieldBuilder::text("name").label("Name").required().transform(Transform::Trim))
        .field(
            FieldBuilder::email("email")
                .label("Email")
                .required()
                .format(StringFormat::Email),
        )
        .field(
            FieldBuilder::select("topic")
                .label("Topic")
                .options([("sales", "Sales"), ("support", "Support")]),
        )
        .field(
            FieldBuilder::text("order_id")
                .label("Order")
                .visible_if("topic", CompareOp::Eq, "support")
                .depends_on("topic"),
        )
        .action(ActionBuilder::submit("send", "Send"))
}

#[test]
fn full_schema_builds() {
    let schema = contact_schema()
        .layout(
            LayoutBuilder::new(LayoutType::Sections)
                .section("who", "Who", ["name", "email"])
                .section("what", "What", ["topic", "order_id"]),
        )
        .build()
        .unwrap();
    assert_eq!(schema.fields.len(), 4);
    assert_eq!(schema.layout.as_ref().unwrap().sections.len(), 2);
    assert!(schema.validate().is_empty());
}

#[test]
fn nested_defects_surface_once_at_build() {
    let errs = contact_schema()
        .field(FieldBuilder::number("age").range(120.0, 0.0))
        .field(FieldBuilder::text("name").label("Dup"))
        .action(ActionBuilder::new("go", formweave_core::ActionType::Link, "Go"))
        .layout(LayoutBuilder::new(LayoutType::Tabs).tab("t", "T", ["ghost"]))
        .build()
        .unwrap_err();
    assert!(mentions(&errs, "field label is required"));
    assert!(mentions(&errs, "min (120) exceeds max (0)"));
    assert!(mentions(&errs, "duplicate field name 'name'"));
    assert!(mentions(&errs, "link action requires a url"));
    // The layout builder itself has no field list; the reference error comes
    // from the schema-level pass after the layout is attached.
    assert!(mentions(&errs, "unknown field 'ghost'"));
}

#[test]
fn layout_only_schema_without_fields_is_rejected_when_layout_empty() {
    let errs = SchemaBuilder::new("empty", SchemaType::Detail)
        .build()
        .unwrap_err();
    assert!(mentions(&errs, "at least one field or layout"));
}

#[test]
fn dependency_cycle_fails_build() {
    let errs = SchemaBuilder::form("cyc")
        .field(FieldBuilder::text("a").label("A").depends_on("b"))
        .field(FieldBuilder::text("b").label("B").depends_on("c"))
        .field(FieldBuilder::text("c").label("C").depends_on("a"))
        .build()
        .unwrap_err();
    assert!(mentions(&errs, "dependency cycle between fields: a, b, c"));
}

#[test]
fn hide_rules_attach_to_conditional() {
    let field = FieldBuilder::text("x")
        .label("X")
        .hide_when(ConditionGroup::when("y", CompareOp::Empty, formweave_core::Value::Null))
        .build()
        .unwrap();
    assert!(field.conditional.unwrap().hide.is_some());
}

proptest! {
    /// Whatever mix of declared fields and layout references is generated,
    /// an accepted schema only references fields it declares.
    #[test]
    fn accepted_schemas_have_resolved_layout_refs(
        declared in proptest::collection::btree_set("[a-e]", 1..5),
        referenced in proptest::collection::vec("[a-g]", 0..6),
    ) {
        let mut builder = SchemaBuilder::form("p");
        for name in &declared {
            builder = builder.field(FieldBuilder::text(name.clone()).label(name.to_uppercase()));
        }
        builder = builder.layout(
            LayoutBuilder::new(LayoutType::Sections).section("s", "S", referenced.clone()),
        );
        match builder.build() {
            Ok(schema) => {
                let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
                for r in schema.layout.as_ref().unwrap().referenced_fields() {
                    prop_assert!(names.contains(&r));
                }
            }
            Err(_) => {
                prop_assert!(referenced.iter().any(|r| !declared.contains(r)));
            }
        }
    }
}
