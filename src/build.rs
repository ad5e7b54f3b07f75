//! Definition builder: schema object → field specs → model.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::constraints::field_meta;
use crate::error::ConvertError;
use crate::ir::FieldSpec;
use crate::model::{ModelFactory, ModelId, ValueKind};
use crate::registry::{Building, Registry};
use crate::resolve::resolve;

/// Field specs of an object schema, in property order.
pub fn field_specs(
    schema: &Map<String, Value>,
    registry: &Registry,
    building: &Building,
) -> Vec<FieldSpec> {
    let required: HashSet<&str> = schema
        .get("required")
        .and_then(Value::as_array)
        .map(|names| names.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();

    let Some(properties) = schema.get("properties") else {
        return Vec::new();
    };
    let Value::Object(properties) = properties else {
        tracing::warn!("`properties` is not an object; no fields built");
        return Vec::new();
    };

    properties
        .iter()
        .map(|(name, prop)| {
            let meta = match prop {
                Value::Object(p) => field_meta(p),
                _ => Default::default(),
            };
            FieldSpec {
                name: name.clone(),
                ty: resolve(prop, registry, building),
                required: required.contains(name.as_str()),
                default: prop.get("default").cloned(),
                meta,
            }
        })
        .collect()
}

fn description(schema: &Map<String, Value>) -> Option<String> {
    schema.get("description").and_then(Value::as_str).map(str::to_owned)
}

/// Build a named definition and register it under `name`.
///
/// The handle is registered before finalizing, so fields that point back at
/// `name` resolve to the model itself.
pub fn build_definition<F: ModelFactory>(
    factory: &mut F,
    registry: &mut Registry,
    name: &str,
    schema: &Map<String, Value>,
    default_title: &str,
) -> Result<ModelId, ConvertError> {
    let building = Building::new().with(name);
    let title = schema.get("title").and_then(Value::as_str).unwrap_or(default_title);
    let fields = field_specs(schema, registry, &building);
    let id = factory.define_composite(title, description(schema), fields)?;
    registry.insert(name, id);
    factory.bind(id, name)?;
    factory.finalize(id, registry)?;
    tracing::debug!(%name, %id, "definition built");
    Ok(id)
}

/// Build the document root as a composite. It has no definition name, so it
/// is not registered.
pub fn build_root<F: ModelFactory>(
    factory: &mut F,
    registry: &Registry,
    schema: &Map<String, Value>,
    default_title: &str,
) -> Result<ModelId, ConvertError> {
    let title = schema.get("title").and_then(Value::as_str).unwrap_or(default_title);
    let building = Building::new().with(title);
    let fields = field_specs(schema, registry, &building);
    let id = factory.define_composite(title, description(schema), fields)?;
    factory.finalize(id, registry)?;
    Ok(id)
}

/// Build an enumeration definition (`enum` at the definition's top level).
pub fn build_enum<F: ModelFactory>(
    factory: &mut F,
    registry: &mut Registry,
    name: &str,
    schema: &Map<String, Value>,
) -> Result<ModelId, ConvertError> {
    let values = schema
        .get("enum")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();
    let members = enum_members(name, values)?;
    let value_kind = ValueKind::infer(schema.get("type").and_then(Value::as_str), values);
    let id = factory.define_enum(name, description(schema), members, value_kind)?;
    registry.insert(name, id);
    factory.bind(id, name)?;
    tracing::debug!(%name, %id, "enum built");
    Ok(id)
}

/// Member label for an enum value: the string itself, or its JSON text.
pub fn member_label(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Label → value table. Two values with the same label are an error.
pub fn enum_members(
    definition: &str,
    values: &[Value],
) -> Result<IndexMap<String, Value>, ConvertError> {
    let mut members = IndexMap::with_capacity(values.len());
    for value in values {
        let label = member_label(value);
        if members.contains_key(&label) {
            tracing::warn!(%definition, %label, "enum member labels collide");
            return Err(ConvertError::EnumLabelCollision {
                definition: definition.to_owned(),
                label,
            });
        }
        members.insert(label, value.clone());
    }
    Ok(members)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ScalarKind, Ty};
    use crate::model::{ModelKind, TypeArena};
    use serde_json::json;

    fn obj(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn fields_keep_order_required_and_defaults() {
        let schema = obj(json!({
            "properties": {
                "foo": {"type": "integer", "description": "how many"},
                "size": {"anyOf": [{"type": "number"}, {"type": "null"}], "default": null},
                "note": {"type": "string"}
            },
            "required": ["foo"]
        }));
        let fields = field_specs(&schema, &Registry::new(), &Building::new());
        let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["foo", "size", "note"]);
        assert!(fields[0].required);
        assert_eq!(fields[0].meta.description, Some(json!("how many")));
        assert!(!fields[1].required);
        assert_eq!(fields[1].default, Some(Value::Null));
        // optional without default stays without one
        assert!(!fields[2].required);
        assert_eq!(fields[2].default, None);
    }

    #[test]
    fn self_reference_resolves_after_registration() {
        let schema = obj(json!({
            "title": "Node",
            "properties": {
                "value": {"type": "integer"},
                "children": {"type": "array", "items": {"$ref": "#/$defs/Node"}, "default": []}
            },
            "required": ["value"]
        }));
        let mut arena = TypeArena::new();
        let mut registry = Registry::new();
        let id =
            build_definition(&mut arena, &mut registry, "Node", &schema, "DynamicModel").unwrap();
        assert_eq!(registry.get("Node"), Some(id));
        let node = arena.get(id).unwrap();
        assert_eq!(node.field("children").unwrap().ty, Ty::List(Box::new(Ty::Model(id))));
        assert_eq!(node.field("value").unwrap().ty, Ty::scalar(ScalarKind::Integer));
    }

    #[test]
    fn untitled_definition_uses_default_title() {
        let mut arena = TypeArena::new();
        let mut registry = Registry::new();
        let schema = obj(json!({}));
        let id =
            build_definition(&mut arena, &mut registry, "Thing", &schema, "DynamicModel").unwrap();
        let thing = arena.get(id).unwrap();
        assert_eq!(thing.name, "DynamicModel");
        assert_eq!(thing.key.as_deref(), Some("Thing"));
        assert_eq!(registry.get("Thing"), Some(id));
    }

    #[test]
    fn integer_enum() {
        let schema = obj(json!({"enum": [1, 2, 3], "title": "Priority", "type": "integer"}));
        let mut arena = TypeArena::new();
        let mut registry = Registry::new();
        let id = build_enum(&mut arena, &mut registry, "Priority", &schema).unwrap();
        let ModelKind::Enum { members, value_kind } = &arena.get(id).unwrap().kind else {
            panic!("expected enum");
        };
        assert_eq!(*value_kind, ValueKind::Integer);
        assert_eq!(members.keys().collect::<Vec<_>>(), ["1", "2", "3"]);
        assert_eq!(members["2"], json!(2));
    }

    #[test]
    fn untyped_enum_takes_its_kind_from_members() {
        let kind_of = |schema: Value| {
            let mut arena = TypeArena::new();
            let mut registry = Registry::new();
            let id = build_enum(&mut arena, &mut registry, "P", &obj(schema)).unwrap();
            match &arena.get(id).unwrap().kind {
                ModelKind::Enum { value_kind, .. } => *value_kind,
                other => panic!("expected enum, got {other:?}"),
            }
        };
        assert_eq!(kind_of(json!({"enum": [1, 2, 3], "title": "P"})), ValueKind::Integer);
        assert_eq!(kind_of(json!({"enum": ["a", "b"]})), ValueKind::String);
        assert_eq!(kind_of(json!({"enum": [1, "a", null]})), ValueKind::Other);
        assert_eq!(kind_of(json!({"enum": [1.5, 2]})), ValueKind::Other);
        assert_eq!(kind_of(json!({"enum": ["1", "2"], "type": "integer"})), ValueKind::Integer);
    }

    #[test]
    fn colliding_labels_are_flagged() {
        let err = enum_members("Mixed", &[json!(1), json!("1")]).unwrap_err();
        assert!(matches!(
            err,
            ConvertError::EnumLabelCollision { ref label, .. } if label == "1"
        ));
        assert!(enum_members("Dup", &[json!("a"), json!("a")]).is_err());
        assert_eq!(member_label(&json!(true)), "true");
        assert_eq!(member_label(&json!("male")), "male");
    }
}
