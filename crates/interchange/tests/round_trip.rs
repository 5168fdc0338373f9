//! Generated schemas read back unchanged from both wire formats.

use formweave_core::{
    ActionBuilder, CompareOp, ConditionGroup, FieldBuilder, LayoutBuilder, LayoutType, Schema,
    SchemaBuilder, Transform,
};
use formweave_interchange::{content_hash, to_json, to_yaml, Parser};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct FieldSpec {
    kind: u8,
    required: bool,
    readonly: bool,
    placeholder: Option<String>,
    /// Lower bound and width, in halves.
    bounds: Option<(i32, u16)>,
    show_after_previous: bool,
    trim: bool,
}

fn field_spec() -> impl Strategy<Value = FieldSpec> {
    (
        0u8..4,
        any::<bool>(),
        any::<bool>(),
        prop::option::of("[a-z]{1,8}"),
        prop::option::of((-100i32..100, 0u16..200)),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(
            |(kind, required, readonly, placeholder, bounds, show_after_previous, trim)| {
                FieldSpec {
                    kind,
                    required,
                    readonly,
                    placeholder,
                    bounds,
                    show_after_previous,
                    trim,
                }
            },
        )
}

fn field(index: usize, spec: &FieldSpec, previous: Option<&str>) -> FieldBuilder {
    let name = format!("f{}", index);
    let mut b = match spec.kind {
        0 => FieldBuilder::text(name.clone()),
        1 => FieldBuilder::email(name.clone()),
        2 => FieldBuilder::number(name.clone()),
        _ => FieldBuilder::select(name.clone())
            .option("v_one", "One")
            .option("v_two", "Two"),
    };
    b = b.label(format!("Field {}", index));
    if spec.required {
        b = b.required();
    }
    if spec.readonly {
        b = b.readonly();
    }
    if let Some(text) = &spec.placeholder {
        b = b.placeholder(format!("Enter {}", text));
    }
    if let Some((low, width)) = spec.bounds {
        b = match spec.kind {
            2 => {
                let min = f64::from(low) / 2.0;
                b.range(min, min + f64::from(width) / 2.0)
                    .default_value(min)
            }
            0 | 1 => {
                let min = low.unsigned_abs() as usize % 20;
                b.min_length(min).max_length(min + usize::from(width))
            }
            _ => b,
        };
    }
    if spec.trim && spec.kind != 2 {
        b = b.transform(Transform::Trim);
    }
    if let (true, Some(prev)) = (spec.show_after_previous, previous) {
        b = b.show_when(ConditionGroup::when(prev, CompareOp::Ne, "v_one"));
    }
    b
}

fn schema_strategy() -> impl Strategy<Value = Schema> {
    (
        prop::collection::vec(field_spec(), 1..6),
        1u8..10,
        any::<bool>(),
        any::<bool>(),
        prop::option::of("[a-z]{1,6}"),
    )
        .prop_map(|(specs, version, sectioned, with_action, tag)| {
            let mut builder = SchemaBuilder::form("generated")
                .title("Generated")
                .version(version.to_string());
            let names: Vec<String> = (0..specs.len()).map(|i| format!("f{}", i)).collect();
            for (i, spec) in specs.iter().enumerate() {
                let previous = i.checked_sub(1).map(|p| names[p].as_str());
                builder = builder.field(field(i, spec, previous));
            }
            if sectioned {
                let split = names.len().div_ceil(2);
                let mut layout = LayoutBuilder::new(LayoutType::Sections)
                    .section("first", "First", names[..split].to_vec());
                if split < names.len() {
                    layout = layout.section("second", "Second", names[split..].to_vec());
                }
                builder = builder.layout(layout);
            }
            if with_action {
                builder = builder.action(ActionBuilder::submit("save", "Save").confirm("Sure?"));
            }
            if let Some(tag) = tag {
                builder = builder.tag(format!("tag_{}", tag));
            }
            builder.must_build()
        })
}

proptest! {
    #[test]
    fn json_round_trip_preserves_built_schemas(schema in schema_strategy()) {
        let text = to_json(&schema).unwrap();
        let back = Parser::default().parse(text.as_bytes()).unwrap();
        prop_assert_eq!(&back, &schema);
        prop_assert_eq!(content_hash(&back).unwrap(), content_hash(&schema).unwrap());
    }

    #[test]
    fn yaml_round_trip_preserves_built_schemas(schema in schema_strategy()) {
        let text = to_yaml(&schema).unwrap();
        let back = Parser::default().parse(text.as_bytes()).unwrap();
        prop_assert_eq!(&back, &schema);
    }
}
