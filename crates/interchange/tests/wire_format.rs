//! Serialized schemas validate against schema/formweave-schema.json.

use std::path::Path;

use formweave_core::{
    ActionBuilder, CompareOp, Condition, ConditionGroup, ConditionNode, FieldBuilder,
    LayoutBuilder, LayoutType, Schema, SchemaBuilder, StringFormat, Transform,
};
use formweave_interchange::{to_json, to_yaml, Parser};

fn validator() -> jsonschema::Validator {
    let schema_path =
        Path::new(env!("CARGO_MANIFEST_DIR")).join("../../schema/formweave-schema.json");
    let schema_src = std::fs::read_to_string(&schema_path)
        .unwrap_or_else(|e| panic!("Failed to read schema at {}: {}", schema_path.display(), e));
    let schema_value: serde_json::Value = serde_json::from_str(&schema_src).unwrap();
    jsonschema::validator_for(&schema_value)
        .unwrap_or_else(|e| panic!("Failed to compile schema: {}", e))
}

fn signup() -> Schema {
    SchemaBuilder::form("signup")
        .title("Sign up")
        .version("2")
        .tag("public")
        .tenant("acme", true)
        .i18n_title("es", "Registro")
        .field(
            FieldBuilder::email("email")
                .label("Email")
                .required()
                .format(StringFormat::Email)
                .i18n_label("es", "Correo"),
        )
        .field(
            FieldBuilder::number("age")
                .label("Age")
                .range(18.0, 120.0)
                .integer()
                .default_value(30),
        )
        .field(
            FieldBuilder::select("plan")
                .label("Plan")
                .option("free", "Free")
                .option("pro", "Pro"),
        )
        .field(
            FieldBuilder::text("company")
                .label("Company")
                .transform(Transform::Trim)
                .show_when(ConditionGroup::any(vec![
                    ConditionNode::Condition(Condition::new("plan", CompareOp::Eq, "pro")),
                    ConditionNode::Group(ConditionGroup::not(ConditionNode::Condition(
                        Condition::new("age", CompareOp::Lt, 21),
                    ))),
                ])),
        )
        .action(ActionBuilder::submit("go", "Create account").confirm("Sure?"))
        .layout(
            LayoutBuilder::new(LayoutType::Steps)
                .step("account", "Account", ["email", "plan"])
                .step("details", "Details", ["age", "company"]),
        )
        .must_build()
}

#[test]
fn serialized_schemas_match_wire_schema() {
    let validator = validator();
    let minimal = SchemaBuilder::form("tiny")
        .field(FieldBuilder::text("a").label("A"))
        .must_build();
    for schema in [signup(), minimal] {
        let instance = serde_json::to_value(&schema).unwrap();
        if let Err(error) = validator.validate(&instance) {
            panic!("{} does not match the wire schema: {}", schema.id, error);
        }
    }
}

#[test]
fn aliases_are_written_back_canonically() {
    let doc = r#"{
        "id": "legacy",
        "type": "form",
        "fields": [
            {"name": "age", "type": "number", "label": "Age"},
            {"name": "note", "type": "text", "label": "Note",
             "conditional": {"show": {"logic": "and", "conditions": [
                {"field": "age", "operator": ">=", "value": 18}
             ]}}}
        ],
        "layout": {"type": "tabs", "tabs": [{"id": "main", "label": "Main", "fields": ["age", "note"]}]}
    }"#;
    let schema = Parser::default().parse(doc.as_bytes()).unwrap();
    let out: serde_json::Value = serde_json::from_str(&to_json(&schema).unwrap()).unwrap();

    let show = &out["fields"][1]["conditional"]["show"];
    assert_eq!(show["operator"], "AND");
    assert_eq!(show["conditions"][0]["operator"], "ge");
    assert_eq!(out["layout"]["tabs"][0]["title"], "Main");
    assert!(validator().validate(&out).is_ok());
}

#[test]
fn yaml_output_reads_back_as_json_equivalent() {
    let schema = signup();
    let yaml = to_yaml(&schema).unwrap();
    let from_yaml: serde_json::Value = serde_yaml::from_str(&yaml).unwrap();
    assert_eq!(from_yaml, serde_json::to_value(&schema).unwrap());
}
