use serde_json::{Map, Value};

use crate::constraints::{numeric_constraints, string_constraints};
use crate::graph::local_definition_name;
use crate::ir::{MapValues, ScalarKind, Ty};
use crate::registry::{Building, Registry};

/// Map one schema node to its type descriptor. First matching keyword wins:
/// `$ref`, `const`, `enum`, `oneOf`, `anyOf`, then `type`.
///
/// Unsupported shapes degrade to [`Ty::Opaque`] instead of failing.
pub fn resolve(node: &Value, registry: &Registry, building: &Building) -> Ty {
    let Value::Object(node) = node else {
        return Ty::Opaque;
    };

    if let Some(reference) = node.get("$ref") {
        return resolve_ref(reference, registry, building);
    }
    if let Some(value) = node.get("const") {
        return Ty::Literal(vec![value.clone()]);
    }
    if let Some(values) = node.get("enum") {
        return match values {
            Value::Array(values) => Ty::Literal(values.clone()),
            _ => Ty::Opaque,
        };
    }
    if let Some(Value::Array(branches)) = node.get("oneOf") {
        return resolve_one_of(node, branches, registry, building);
    }
    if let Some(Value::Array(branches)) = node.get("anyOf") {
        return resolve_any_of(branches, registry, building);
    }

    let sub = |v: Option<&Value>| match v {
        Some(v) => resolve(v, registry, building),
        None => Ty::Opaque,
    };

    match node.get("type").and_then(Value::as_str) {
        Some("integer") => {
            let constraints = numeric_constraints(node);
            if constraints.is_positive_only() {
                Ty::scalar(ScalarKind::PositiveInt)
            } else {
                Ty::Scalar { kind: ScalarKind::Integer, constraints }
            }
        }
        Some("number") => Ty::Scalar {
            kind: ScalarKind::Number,
            constraints: numeric_constraints(node),
        },
        Some("string") => resolve_string(node),
        Some("object") => Ty::Map(match node.get("additionalProperties") {
            None => MapValues::Unspecified,
            Some(Value::Bool(true)) => MapValues::Any,
            Some(Value::Bool(false)) => MapValues::Forbidden,
            Some(value) => MapValues::Typed(Box::new(resolve(value, registry, building))),
        }),
        Some("boolean") => Ty::scalar(ScalarKind::Boolean),
        Some("array") => {
            if let Some(Value::Array(prefix)) = node.get("prefixItems") {
                Ty::Tuple(prefix.iter().map(|p| resolve(p, registry, building)).collect())
            } else if node.get("uniqueItems").and_then(Value::as_bool) == Some(true) {
                Ty::Set(Box::new(sub(node.get("items"))))
            } else {
                Ty::List(Box::new(sub(node.get("items"))))
            }
        }
        Some("null") => Ty::scalar(ScalarKind::Null),
        _ => Ty::Opaque,
    }
}

fn resolve_ref(reference: &Value, registry: &Registry, building: &Building) -> Ty {
    let Some(name) = reference.as_str().and_then(local_definition_name) else {
        tracing::warn!(%reference, "non-local $ref resolves to an opaque type");
        return Ty::Opaque;
    };
    if building.contains(&name) {
        tracing::trace!(%name, "forward reference to a definition under construction");
        return Ty::Ref(name);
    }
    match registry.get(&name) {
        Some(id) => Ty::Model(id),
        None => {
            tracing::warn!(%name, "$ref to a definition that is not built; deferring by name");
            Ty::Ref(name)
        }
    }
}

fn resolve_one_of(
    node: &Map<String, Value>,
    branches: &[Value],
    registry: &Registry,
    building: &Building,
) -> Ty {
    let mut members: Vec<Ty> = branches.iter().map(|b| resolve(b, registry, building)).collect();
    match members.len() {
        0 => {
            tracing::warn!("empty oneOf resolves to an opaque type");
            Ty::Opaque
        }
        1 => members.remove(0),
        _ => {
            let discriminator = node
                .get("discriminator")
                .and_then(|d| d.get("propertyName"))
                .and_then(Value::as_str)
                .map(str::to_owned);
            Ty::Union { members, discriminator }
        }
    }
}

// Only the nullable shape `[X, {type: null}]` is understood.
fn resolve_any_of(branches: &[Value], registry: &Registry, building: &Building) -> Ty {
    let is_null = |b: &&Value| b.get("type").and_then(Value::as_str) == Some("null");
    let has_null = branches.iter().any(|b| is_null(&b));
    let non_null: Vec<&Value> = branches.iter().filter(|b| !is_null(b)).collect();

    match non_null.as_slice() {
        [inner] if has_null => Ty::Optional(Box::new(resolve(inner, registry, building))),
        _ => {
            tracing::warn!(
                branches = branches.len(),
                "anyOf shape not supported; resolves to an opaque type"
            );
            Ty::Opaque
        }
    }
}

fn resolve_string(node: &Map<String, Value>) -> Ty {
    let format = node.get("format").and_then(Value::as_str).and_then(ScalarKind::from_format);
    match format {
        Some(ScalarKind::Uri) => Ty::Scalar {
            kind: ScalarKind::Uri,
            constraints: string_constraints(node),
        },
        Some(kind) => Ty::scalar(kind),
        None => Ty::Scalar { kind: ScalarKind::String, constraints: string_constraints(node) },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::Constraints;
    use serde_json::json;

    fn r(node: Value) -> Ty {
        resolve(&node, &Registry::new(), &Building::new())
    }

    #[test]
    fn positive_integer_shorthand() {
        assert_eq!(
            r(json!({"type": "integer", "exclusiveMinimum": 0})),
            Ty::scalar(ScalarKind::PositiveInt)
        );
        let bounded = r(json!({"type": "integer", "exclusiveMinimum": 0, "exclusiveMaximum": 150}));
        assert!(matches!(bounded, Ty::Scalar { kind: ScalarKind::Integer, .. }));
        assert_eq!(r(json!({"type": "integer"})), Ty::scalar(ScalarKind::Integer));
    }

    #[test]
    fn unique_items_is_a_set() {
        assert_eq!(
            r(json!({"type": "array", "items": {"type": "string"}, "uniqueItems": true})),
            Ty::Set(Box::new(Ty::scalar(ScalarKind::String)))
        );
        assert_eq!(r(json!({"type": "array", "uniqueItems": true})), Ty::Set(Box::new(Ty::Opaque)));
        assert_eq!(r(json!({"type": "array"})), Ty::List(Box::new(Ty::Opaque)));
    }

    #[test]
    fn prefix_items_win_over_items() {
        let t = r(json!({
            "type": "array",
            "prefixItems": [{"type": "number"}, {"type": "boolean"}],
            "uniqueItems": true
        }));
        assert_eq!(
            t,
            Ty::Tuple(vec![Ty::scalar(ScalarKind::Number), Ty::scalar(ScalarKind::Boolean)])
        );
    }

    #[test]
    fn format_beats_string_constraints_except_uri() {
        assert_eq!(
            r(json!({"type": "string", "format": "date-time", "minLength": 3})),
            Ty::scalar(ScalarKind::DateTime)
        );
        assert_eq!(
            r(json!({"type": "string", "format": "uri", "minLength": 1})),
            Ty::Scalar {
                kind: ScalarKind::Uri,
                constraints: Constraints { min_length: Some(1), ..Default::default() }
            }
        );
        // unknown formats fall back to a plain constrained string
        assert_eq!(
            r(json!({"type": "string", "format": "email", "pattern": "@"})),
            Ty::Scalar {
                kind: ScalarKind::String,
                constraints: Constraints { pattern: Some("@".into()), ..Default::default() }
            }
        );
    }

    #[test]
    fn keyword_precedence() {
        // $ref beats everything else on the node
        assert_eq!(
            r(json!({"$ref": "#/$defs/X", "const": 1, "type": "string"})),
            Ty::Ref("X".into())
        );
        assert_eq!(r(json!({"const": "cat", "type": "string"})), Ty::Literal(vec![json!("cat")]));
        assert_eq!(r(json!({"enum": [1, 2], "const": 3})), Ty::Literal(vec![json!(3)]));
        assert_eq!(
            r(json!({"enum": ["a", "b"], "type": "string"})),
            Ty::Literal(vec![json!("a"), json!("b")])
        );
    }

    #[test]
    fn refs_consult_building_then_registry() {
        let mut registry = Registry::new();
        let mut arena = crate::model::TypeArena::new();
        let id =
            crate::model::ModelFactory::define_composite(&mut arena, "Foo", None, vec![]).unwrap();
        registry.insert("Foo", id);
        let node = json!({"$ref": "#/$defs/Foo"});

        assert_eq!(resolve(&node, &registry, &Building::new()), Ty::Model(id));
        assert_eq!(resolve(&node, &registry, &Building::new().with("Foo")), Ty::Ref("Foo".into()));
        assert_eq!(r(json!({"$ref": "#/$defs/Nope"})), Ty::Ref("Nope".into()));
        assert_eq!(r(json!({"$ref": "https://example.com/schema.json"})), Ty::Opaque);
    }

    #[test]
    fn one_of_collapses_and_carries_discriminator() {
        assert_eq!(r(json!({"oneOf": [{"type": "boolean"}]})), Ty::scalar(ScalarKind::Boolean));
        assert_eq!(r(json!({"oneOf": []})), Ty::Opaque);
        let t = r(json!({
            "oneOf": [{"$ref": "#/$defs/Cat"}, {"$ref": "#/$defs/Dog"}],
            "discriminator": {"propertyName": "pet_type", "mapping": {}}
        }));
        assert_eq!(
            t,
            Ty::Union {
                members: vec![Ty::Ref("Cat".into()), Ty::Ref("Dog".into())],
                discriminator: Some("pet_type".into())
            }
        );
    }

    #[test]
    fn any_of_only_handles_nullable() {
        assert_eq!(
            r(json!({"anyOf": [{"type": "string"}, {"type": "null"}]})),
            Ty::Optional(Box::new(Ty::scalar(ScalarKind::String)))
        );
        assert_eq!(
            r(json!({"anyOf": [{"type": "null"}, {"type": "integer"}]})),
            Ty::Optional(Box::new(Ty::scalar(ScalarKind::Integer)))
        );
        assert_eq!(r(json!({"anyOf": [{"type": "string"}, {"type": "integer"}]})), Ty::Opaque);
        let three = json!({"anyOf": [{"type": "string"}, {"type": "integer"}, {"type": "null"}]});
        assert_eq!(r(three), Ty::Opaque);
    }

    #[test]
    fn objects_and_fallbacks() {
        assert_eq!(
            r(json!({"type": "object", "additionalProperties": {"type": "integer"}})),
            Ty::Map(MapValues::Typed(Box::new(Ty::scalar(ScalarKind::Integer))))
        );
        assert_eq!(r(json!({"type": "object"})), Ty::Map(MapValues::Unspecified));
        assert_eq!(
            r(json!({"type": "object", "additionalProperties": true})),
            Ty::Map(MapValues::Any)
        );
        assert_eq!(
            r(json!({"type": "object", "additionalProperties": false})),
            Ty::Map(MapValues::Forbidden)
        );
        assert_eq!(r(json!({"type": "null"})), Ty::scalar(ScalarKind::Null));
        assert_eq!(r(json!({"description": "anything"})), Ty::Opaque);
        assert_eq!(r(json!({"type": ["string", "null"]})), Ty::Opaque);
        assert_eq!(r(json!(true)), Ty::Opaque);
    }
}
