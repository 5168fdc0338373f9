//! Leaf operator semantics.
//!
//! Every comparison dispatches on the [`Value`] tag of both operands. A
//! left operand of `None` stands for a field path that resolved to nothing
//! (*undefined*); it is distinct from an explicit `Null`.

use std::cmp::Ordering;

use formweave_core::{CompareOp, Value};

use crate::condition::{ConditionError, EvalOptions};

/// Outcome of a single comparison.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verdict {
    Holds(bool),
    /// Operand types do not fit the operator; the message explains how.
    Mismatch(String),
}

impl Verdict {
    fn mismatch(op: &CompareOp, left: &Value, right: &Value) -> Verdict {
        Verdict::Mismatch(format!(
            "operator '{}' not defined for {} and {}",
            op,
            left.type_name(),
            right.type_name()
        ))
    }
}

/// Compare `left` against `right` with `op`.
///
/// `regex` resolves a pattern (already adjusted for case sensitivity) to a
/// compiled expression; the evaluator passes its cache here.
pub(crate) fn compare<F>(
    op: &CompareOp,
    left: Option<&Value>,
    right: &Value,
    options: &EvalOptions,
    regex: F,
) -> Result<Verdict, ConditionError>
where
    F: FnOnce(&str) -> Result<regex::Regex, ConditionError>,
{
    let verdict = match op {
        CompareOp::Eq => Verdict::Holds(equals(left, right, options)),
        CompareOp::Ne => Verdict::Holds(!equals(left, right, options)),

        CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
            let Some(left) = left else {
                return Ok(Verdict::Holds(false));
            };
            match order(left, right, options) {
                Some(ordering) => Verdict::Holds(match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                }),
                None => Verdict::mismatch(op, left, right),
            }
        }

        CompareOp::In | CompareOp::NotIn => {
            let Some(candidates) = right.as_list() else {
                return Ok(Verdict::Mismatch(format!(
                    "operator '{}' requires a list on the right, got {}",
                    op,
                    right.type_name()
                )));
            };
            let found = match left {
                None => false,
                Some(Value::List(items)) => items
                    .iter()
                    .any(|item| candidates.iter().any(|c| values_equal(item, c, options))),
                Some(value) => candidates.iter().any(|c| values_equal(value, c, options)),
            };
            Verdict::Holds(if *op == CompareOp::In { found } else { !found })
        }

        CompareOp::Contains => match left {
            None | Some(Value::Null) => Verdict::Holds(false),
            Some(Value::List(items)) => {
                Verdict::Holds(items.iter().any(|item| values_equal(item, right, options)))
            }
            Some(value @ Value::Map(map)) => match right.as_str() {
                Some(key) => Verdict::Holds(map.contains_key(key)),
                None => Verdict::mismatch(op, value, right),
            },
            Some(value) => match text_pair(value, right, options) {
                Some((l, r)) => Verdict::Holds(l.contains(&r)),
                None => Verdict::mismatch(op, value, right),
            },
        },

        CompareOp::StartsWith | CompareOp::EndsWith => match left {
            None | Some(Value::Null) => Verdict::Holds(false),
            Some(value) => match text_pair(value, right, options) {
                Some((l, r)) if *op == CompareOp::StartsWith => Verdict::Holds(l.starts_with(&r)),
                Some((l, r)) => Verdict::Holds(l.ends_with(&r)),
                None => Verdict::mismatch(op, value, right),
            },
        },

        CompareOp::Matches => {
            let Some(pattern) = right.as_str() else {
                return Ok(Verdict::Mismatch(format!(
                    "operator 'matches' requires a string pattern, got {}",
                    right.type_name()
                )));
            };
            let re = if options.case_sensitive {
                regex(pattern)?
            } else {
                regex(&format!("(?i){}", pattern))?
            };
            match left {
                None | Some(Value::Null) => Verdict::Holds(false),
                Some(Value::String(s)) => Verdict::Holds(re.is_match(s)),
                Some(value) if !options.strict_types && value.is_number() => {
                    Verdict::Holds(re.is_match(&value.to_display_string()))
                }
                Some(value) => Verdict::mismatch(op, value, right),
            }
        }

        CompareOp::Empty => Verdict::Holds(left.map_or(true, Value::is_empty_value)),
        CompareOp::NotEmpty => Verdict::Holds(!left.map_or(true, Value::is_empty_value)),

        CompareOp::Unknown(name) => {
            return Err(ConditionError::UnknownOperator { op: name.clone() })
        }
    };
    Ok(verdict)
}

/// Equality where *undefined* equals `Null`.
fn equals(left: Option<&Value>, right: &Value, options: &EvalOptions) -> bool {
    match left {
        None => matches!(right, Value::Null),
        Some(left) => values_equal(left, right, options),
    }
}

/// Deep equality honoring case folding and, outside strict mode, numeric strings.
pub(crate) fn values_equal(left: &Value, right: &Value, options: &EvalOptions) -> bool {
    match (left, right) {
        (Value::String(a), Value::String(b)) => {
            if options.case_sensitive {
                a == b
            } else {
                a.to_lowercase() == b.to_lowercase()
            }
        }
        (Value::List(a), Value::List(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y, options))
        }
        (Value::String(_), _) | (_, Value::String(_)) if !options.strict_types => {
            match (number(left, false), number(right, false)) {
                (Some(a), Some(b)) if left.is_number() || right.is_number() => a == b,
                _ => false,
            }
        }
        _ => left.loosely_equals(right),
    }
}

/// Ordering for numbers (with coercion) and strings.
fn order(left: &Value, right: &Value, options: &EvalOptions) -> Option<Ordering> {
    if let (Value::String(a), Value::String(b)) = (left, right) {
        // Two numeric strings still order numerically outside strict mode.
        if !options.strict_types {
            if let (Some(x), Some(y)) = (number(left, false), number(right, false)) {
                return x.partial_cmp(&y);
            }
        }
        return Some(if options.case_sensitive {
            a.cmp(b)
        } else {
            a.to_lowercase().cmp(&b.to_lowercase())
        });
    }
    let a = number(left, options.strict_types)?;
    let b = number(right, options.strict_types)?;
    a.partial_cmp(&b)
}

fn number(value: &Value, strict: bool) -> Option<f64> {
    match value {
        Value::Int(_) | Value::Float(_) => value.as_f64(),
        Value::String(s) if !strict => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok().filter(|f| f.is_finite())
            }
        }
        _ => None,
    }
}

/// Both operands as text for substring operators, case-folded if needed.
fn text_pair(left: &Value, right: &Value, options: &EvalOptions) -> Option<(String, String)> {
    let as_text = |v: &Value| match v {
        Value::String(s) => Some(s.clone()),
        Value::Int(_) | Value::Float(_) | Value::Bool(_) if !options.strict_types => {
            Some(v.to_display_string())
        }
        _ => None,
    };
    let (l, r) = (as_text(left)?, as_text(right)?);
    if options.case_sensitive {
        Some((l, r))
    } else {
        Some((l.to_lowercase(), r.to_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(op: CompareOp, left: Option<Value>, right: Value) -> Verdict {
        run_with(op, left, right, &EvalOptions::default())
    }

    fn run_with(op: CompareOp, left: Option<Value>, right: Value, options: &EvalOptions) -> Verdict {
        compare(&op, left.as_ref(), &right, options, |p| {
            regex::Regex::new(p).map_err(|e| ConditionError::InvalidRegex {
                pattern: p.to_string(),
                message: e.to_string(),
            })
        })
        .unwrap()
    }

    #[test]
    fn undefined_equals_null_only() {
        assert_eq!(run(CompareOp::Eq, None, Value::Null), Verdict::Holds(true));
        assert_eq!(run(CompareOp::Eq, None, "x".into()), Verdict::Holds(false));
        assert_eq!(run(CompareOp::Ne, None, "x".into()), Verdict::Holds(true));
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(run(CompareOp::Eq, Some(1.into()), 1.0.into()), Verdict::Holds(true));
        assert_eq!(run(CompareOp::Gt, Some("10".into()), 9.into()), Verdict::Holds(true));
        assert_eq!(run(CompareOp::Lt, Some("9".into()), "10".into()), Verdict::Holds(true));
        let strict = EvalOptions {
            strict_types: true,
            ..EvalOptions::default()
        };
        assert!(matches!(
            run_with(CompareOp::Gt, Some("10".into()), 9.into(), &strict),
            Verdict::Mismatch(_)
        ));
        assert_eq!(
            run_with(CompareOp::Eq, Some("1".into()), 1.into(), &strict),
            Verdict::Holds(false)
        );
    }

    #[test]
    fn membership_needs_a_list() {
        let list = Value::from(vec!["a", "b"]);
        assert_eq!(run(CompareOp::In, Some("a".into()), list.clone()), Verdict::Holds(true));
        assert_eq!(run(CompareOp::In, None, list.clone()), Verdict::Holds(false));
        assert_eq!(run(CompareOp::NotIn, None, list.clone()), Verdict::Holds(true));
        assert_eq!(
            run(CompareOp::In, Some(Value::from(vec!["z", "b"])), list),
            Verdict::Holds(true)
        );
        assert!(matches!(
            run(CompareOp::In, Some("a".into()), "a".into()),
            Verdict::Mismatch(_)
        ));
    }

    #[test]
    fn case_folding() {
        let loose = EvalOptions {
            case_sensitive: false,
            ..EvalOptions::default()
        };
        assert_eq!(run(CompareOp::Eq, Some("ABC".into()), "abc".into()), Verdict::Holds(false));
        assert_eq!(
            run_with(CompareOp::Eq, Some("ABC".into()), "abc".into(), &loose),
            Verdict::Holds(true)
        );
        assert_eq!(
            run_with(CompareOp::Matches, Some("Hello".into()), "^hel".into(), &loose),
            Verdict::Holds(true)
        );
        assert_eq!(
            run_with(CompareOp::StartsWith, Some("Hello".into()), "HE".into(), &loose),
            Verdict::Holds(true)
        );
    }

    #[test]
    fn emptiness() {
        assert_eq!(run(CompareOp::Empty, None, Value::Null), Verdict::Holds(true));
        assert_eq!(run(CompareOp::Empty, Some("".into()), Value::Null), Verdict::Holds(true));
        assert_eq!(
            run(CompareOp::Empty, Some(Value::List(vec![])), Value::Null),
            Verdict::Holds(true)
        );
        assert_eq!(run(CompareOp::NotEmpty, Some(0.into()), Value::Null), Verdict::Holds(true));
    }

    #[test]
    fn contains_on_lists_maps_and_strings() {
        assert_eq!(
            run(CompareOp::Contains, Some(Value::from(vec![1, 2])), 2.into()),
            Verdict::Holds(true)
        );
        assert_eq!(
            run(CompareOp::Contains, Some("formweave".into()), "weave".into()),
            Verdict::Holds(true)
        );
        assert!(matches!(
            run(CompareOp::Contains, Some(true.into()), Value::List(vec![])),
            Verdict::Mismatch(_)
        ));
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let op = CompareOp::Unknown("between".into());
        let err = compare(&op, None, &Value::Null, &EvalOptions::default(), |_| {
            unreachable!()
        })
        .unwrap_err();
        assert_eq!(err, ConditionError::UnknownOperator { op: "between".into() });
    }
}
