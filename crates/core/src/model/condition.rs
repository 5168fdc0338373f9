//! Condition trees driving dynamic visibility, required and disabled state.
//!
//! Operators are kept open-ended on input: aliases such as `==` or `gte`
//! normalize to their canonical form, and unknown strings survive parsing
//! so the evaluator can report them instead of the parser rejecting the
//! whole document.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Boolean connective of a [`ConditionGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicOp {
    #[serde(rename = "AND", alias = "and")]
    And,
    #[serde(rename = "OR", alias = "or")]
    Or,
    #[serde(rename = "NOT", alias = "not")]
    Not,
}

/// Comparison operator of a leaf [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Empty,
    NotEmpty,
    /// An operator string that matched no known operator or alias.
    Unknown(String),
}

impl CompareOp {
    pub fn parse(s: &str) -> CompareOp {
        match s.trim().to_ascii_lowercase().as_str() {
            "eq" | "equal" | "equals" | "==" => CompareOp::Eq,
            "ne" | "neq" | "not_equal" | "!=" => CompareOp::Ne,
            "lt" | "less" | "<" => CompareOp::Lt,
            "le" | "lte" | "less_or_equal" | "<=" => CompareOp::Le,
            "gt" | "greater" | ">" => CompareOp::Gt,
            "ge" | "gte" | "greater_or_equal" | ">=" => CompareOp::Ge,
            "in" | "select_any_in" => CompareOp::In,
            "not_in" | "select_not_any_in" => CompareOp::NotIn,
            "contains" => CompareOp::Contains,
            "starts_with" => CompareOp::StartsWith,
            "ends_with" => CompareOp::EndsWith,
            "matches" | "regex" | "match_regexp" => CompareOp::Matches,
            "empty" | "is_empty" => CompareOp::Empty,
            "not_empty" | "is_not_empty" => CompareOp::NotEmpty,
            _ => CompareOp::Unknown(s.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::In => "in",
            CompareOp::NotIn => "not_in",
            CompareOp::Contains => "contains",
            CompareOp::StartsWith => "starts_with",
            CompareOp::EndsWith => "ends_with",
            CompareOp::Matches => "matches",
            CompareOp::Empty => "empty",
            CompareOp::NotEmpty => "not_empty",
            CompareOp::Unknown(s) => s,
        }
    }
}

impl From<String> for CompareOp {
    fn from(s: String) -> Self {
        CompareOp::parse(&s)
    }
}

impl From<CompareOp> for String {
    fn from(op: CompareOp) -> Self {
        op.as_str().to_string()
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single comparison: `field <operator> value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: CompareOp,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: CompareOp, value: impl Into<Value>) -> Self {
        Condition {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A boolean tree of conditions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(alias = "logic")]
    pub operator: LogicOp,
    pub conditions: Vec<ConditionNode>,
}

impl ConditionGroup {
    pub fn all(conditions: Vec<ConditionNode>) -> Self {
        ConditionGroup {
            operator: LogicOp::And,
            conditions,
        }
    }

    pub fn any(conditions: Vec<ConditionNode>) -> Self {
        ConditionGroup {
            operator: LogicOp::Or,
            conditions,
        }
    }

    pub fn not(node: ConditionNode) -> Self {
        ConditionGroup {
            operator: LogicOp::Not,
            conditions: vec![node],
        }
    }

    /// A one-condition AND group, the common shape for show/hide clauses.
    pub fn when(field: impl Into<String>, operator: CompareOp, value: impl Into<Value>) -> Self {
        ConditionGroup::all(vec![ConditionNode::Condition(Condition::new(
            field, operator, value,
        ))])
    }

    /// Every field path referenced anywhere in the tree.
    pub fn referenced_fields(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_fields(&mut out);
        out
    }

    fn collect_fields<'a>(&'a self, out: &mut Vec<&'a str>) {
        for node in &self.conditions {
            match node {
                ConditionNode::Condition(c) => out.push(c.field.as_str()),
                ConditionNode::Group(g) => g.collect_fields(out),
            }
        }
    }
}

/// Either a nested group or a leaf condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionNode {
    Group(ConditionGroup),
    Condition(Condition),
}

impl From<Condition> for ConditionNode {
    fn from(c: Condition) -> Self {
        ConditionNode::Condition(c)
    }
}

impl From<ConditionGroup> for ConditionNode {
    fn from(g: ConditionGroup) -> Self {
        ConditionNode::Group(g)
    }
}

/// Conditional clauses attached to a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<ConditionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<ConditionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<ConditionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub disabled: Option<ConditionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<ConditionGroup>,
}

/// Show/hide clauses attached to layout children and actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisibilityRule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show: Option<ConditionGroup>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hide: Option<ConditionGroup>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_normalize_to_canonical() {
        let c: Condition =
            serde_json::from_str(r#"{"field": "age", "operator": ">=", "value": 18}"#).unwrap();
        assert_eq!(c.operator, CompareOp::Ge);
        let out = serde_json::to_value(&c).unwrap();
        assert_eq!(out["operator"], "ge");
    }

    #[test]
    fn unknown_operator_survives_parsing() {
        let c: Condition =
            serde_json::from_str(r#"{"field": "x", "operator": "between", "value": 1}"#).unwrap();
        assert_eq!(c.operator, CompareOp::Unknown("between".into()));
    }

    #[test]
    fn nested_groups_parse_with_logic_alias() {
        let g: ConditionGroup = serde_json::from_str(
            r#"{
                "logic": "OR",
                "conditions": [
                    {"field": "a", "operator": "eq", "value": 1},
                    {"operator": "NOT", "conditions": [{"field": "b", "operator": "empty"}]}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(g.operator, LogicOp::Or);
        assert!(matches!(g.conditions[0], ConditionNode::Condition(_)));
        assert!(matches!(g.conditions[1], ConditionNode::Group(_)));
        assert_eq!(g.referenced_fields(), vec!["a", "b"]);
    }
}
