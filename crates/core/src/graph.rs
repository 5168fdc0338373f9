//! Field dependency ordering.
//!
//! Each field lists the fields it reads. A field must be re-evaluated after
//! everything it depends on, so the declared lists form a DAG that is
//! topologically sorted with Kahn's algorithm. Whatever remains once no
//! zero-in-degree node is left sits on a cycle.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::SchemaError;
use crate::model::Field;

/// Order field names so every field follows its dependencies.
///
/// Dependencies naming unknown fields are ignored here; static validation
/// reports them separately. Ties keep declaration order.
pub fn dependency_order(fields: &[Field]) -> Result<Vec<String>, SchemaError> {
    let known: BTreeSet<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    let mut in_degree: BTreeMap<&str, usize> = BTreeMap::new();
    let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();

    for field in fields {
        in_degree.entry(field.name.as_str()).or_insert(0);
        let deps: BTreeSet<&str> = field
            .dependencies
            .iter()
            .map(String::as_str)
            .filter(|d| known.contains(d))
            .collect();
        for dep in deps {
            *in_degree.entry(field.name.as_str()).or_insert(0) += 1;
            dependents.entry(dep).or_default().push(field.name.as_str());
        }
    }

    let mut queue: VecDeque<&str> = fields
        .iter()
        .map(|f| f.name.as_str())
        .filter(|n| in_degree.get(n) == Some(&0))
        .collect();
    let mut order = Vec::with_capacity(fields.len());

    while let Some(name) = queue.pop_front() {
        order.push(name.to_string());
        if let Some(next) = dependents.get(name) {
            for &d in next {
                if let Some(deg) = in_degree.get_mut(d) {
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(d);
                    }
                }
            }
        }
    }

    if order.len() < in_degree.len() {
        let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        let cycle: Vec<&str> = in_degree
            .keys()
            .copied()
            .filter(|n| !placed.contains(n))
            .collect();
        return Err(
            SchemaError::validation(format!("dependency cycle between fields: {}", cycle.join(", ")))
                .with_detail("cycle", cycle.into_iter().map(String::from).collect::<Vec<_>>()),
        );
    }

    Ok(order)
}

/// Map each field name to the fields that list it as a dependency.
pub fn dependents_map(fields: &[Field]) -> BTreeMap<String, Vec<String>> {
    let mut map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for field in fields {
        for dep in &field.dependencies {
            map.entry(dep.clone()).or_default().push(field.name.clone());
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn field(name: &str, deps: &[&str]) -> Field {
        let mut f = Field::new(name, FieldType::Text, name);
        f.dependencies = deps.iter().map(|d| d.to_string()).collect();
        f
    }

    #[test]
    fn orders_dependencies_first() {
        let fields = vec![field("total", &["price", "qty"]), field("price", &[]), field("qty", &[])];
        let order = dependency_order(&fields).unwrap();
        assert_eq!(order, vec!["price", "qty", "total"]);
    }

    #[test]
    fn detects_two_node_cycle() {
        let fields = vec![field("a", &["b"]), field("b", &["a"]), field("c", &[])];
        let err = dependency_order(&fields).unwrap_err();
        assert!(err.message.contains("a, b"), "{}", err);
        assert_eq!(err.details["cycle"], crate::value::Value::from(vec!["a", "b"]));
    }

    #[test]
    fn self_dependency_is_a_cycle() {
        let fields = vec![field("a", &["a"])];
        assert!(dependency_order(&fields).is_err());
    }

    #[test]
    fn unknown_dependencies_are_ignored() {
        let fields = vec![field("a", &["ghost"])];
        assert_eq!(dependency_order(&fields).unwrap(), vec!["a"]);
    }
}
