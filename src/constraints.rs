//! Pure keyword extractors: numeric bounds, string length/pattern and field
//! metadata. None of these look at the registry or the building set.

use serde_json::{Map, Number, Value};

use crate::ir::{Constraints, FieldMeta};

fn number(node: &Map<String, Value>, key: &str) -> Option<Number> {
    node.get(key).and_then(|v| match v {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    })
}

/// `exclusiveMinimum→gt`, `exclusiveMaximum→lt`, `minimum→ge`,
/// `maximum→le`, `multipleOf→multiple_of`. Non-numeric values are ignored.
pub fn numeric_constraints(node: &Map<String, Value>) -> Constraints {
    Constraints {
        gt: number(node, "exclusiveMinimum"),
        lt: number(node, "exclusiveMaximum"),
        ge: number(node, "minimum"),
        le: number(node, "maximum"),
        multiple_of: number(node, "multipleOf"),
        ..Constraints::default()
    }
}

/// `minLength`, `maxLength`, `pattern`.
pub fn string_constraints(node: &Map<String, Value>) -> Constraints {
    Constraints {
        min_length: node.get("minLength").and_then(Value::as_u64),
        max_length: node.get("maxLength").and_then(Value::as_u64),
        pattern: node.get("pattern").and_then(Value::as_str).map(str::to_owned),
        ..Constraints::default()
    }
}

pub fn field_meta(node: &Map<String, Value>) -> FieldMeta {
    FieldMeta {
        title: node.get("title").cloned(),
        description: node.get("description").cloned(),
        examples: node.get("examples").cloned(),
        deprecated: node.get("deprecated").cloned(),
    }
}
