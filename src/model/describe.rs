//! JSON Schema re-derivation from built models.
//!
//! Referenced models are emitted once under `$defs` and pointed at with
//! `$ref`. A root that reaches itself is emitted as a bare `$ref` next to the
//! `$defs` table, so recursive documents come back in the shape they went in.

use std::collections::HashMap;

use indexmap::IndexSet;
use serde_json::{Map, Value, json};

use super::{ModelId, ModelKind, TypeArena, ValueKind};
use crate::ir::{Constraints, FieldSpec, MapValues, ScalarKind, Ty};

fn def_ref(name: &str) -> String {
    format!("#/$defs/{name}")
}

struct Describer<'a> {
    arena: &'a TypeArena,
    seen: IndexSet<ModelId>,   // discovery order
    keys: HashMap<ModelId, String>,
}

impl TypeArena {
    /// Re-derive the JSON Schema document of model `id`.
    pub fn describe(&self, id: ModelId) -> Value {
        let mut d = Describer { arena: self, seen: IndexSet::new(), keys: HashMap::new() };
        let mut body = d.body(id);

        let mut defs = Map::new();
        let mut next = 0;
        while let Some(&dep) = d.seen.get_index(next) {
            next += 1;
            if dep == id {
                continue;
            }
            let schema = d.body(dep);
            defs.insert(d.key(dep), schema);
        }

        if d.seen.contains(&id) {
            // recursive root: every model, root included, lives in $defs
            let key = d.key(id);
            defs.insert(key.clone(), body);
            return json!({ "$defs": defs, "$ref": def_ref(&key) });
        }
        if !defs.is_empty() {
            if let Value::Object(map) = &mut body {
                map.insert("$defs".into(), Value::Object(defs));
            }
        }
        body
    }
}

impl Describer<'_> {
    /// `$defs` key of `id`: the name it was registered under, else its title.
    /// A key already handed to another model gets a numeric suffix.
    fn key(&mut self, id: ModelId) -> String {
        if let Some(key) = self.keys.get(&id) {
            return key.clone();
        }
        let base = match self.arena.get(id) {
            Some(def) => def.key.clone().unwrap_or_else(|| def.name.clone()),
            None => id.to_string(),
        };
        let mut key = base.clone();
        let mut n = 1;
        while self.keys.values().any(|taken| *taken == key) {
            n += 1;
            key = format!("{base}{n}");
        }
        self.keys.insert(id, key.clone());
        key
    }

    fn body(&mut self, id: ModelId) -> Value {
        let arena = self.arena;
        let Some(def) = arena.get(id) else {
            return json!({});
        };
        let mut o = match &def.kind {
            ModelKind::Composite { fields } => {
                let mut props = Map::new();
                for f in fields {
                    props.insert(f.name.clone(), self.property(f));
                }
                let required: Vec<Value> = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| Value::from(f.name.clone()))
                    .collect();
                let mut o = Map::new();
                o.insert("properties".into(), Value::Object(props));
                if !required.is_empty() {
                    o.insert("required".into(), Value::Array(required));
                }
                o.insert("type".into(), json!("object"));
                o
            }
            ModelKind::Enum { members, value_kind } => {
                let mut o = Map::new();
                o.insert("enum".into(), Value::Array(members.values().cloned().collect()));
                match value_kind {
                    ValueKind::String => { o.insert("type".into(), json!("string")); }
                    ValueKind::Integer => { o.insert("type".into(), json!("integer")); }
                    ValueKind::Other => {}
                }
                o
            }
            ModelKind::Wrapper { root } => self.object(root),
        };
        o.insert("title".into(), Value::from(def.name.clone()));
        if let Some(desc) = &def.description {
            o.insert("description".into(), Value::from(desc.clone()));
        }
        Value::Object(o)
    }

    fn property(&mut self, f: &FieldSpec) -> Value {
        let mut o = self.object(&f.ty);
        let meta = [
            ("title", &f.meta.title),
            ("description", &f.meta.description),
            ("examples", &f.meta.examples),
            ("deprecated", &f.meta.deprecated),
            ("default", &f.default),
        ];
        for (key, value) in meta {
            if let Some(v) = value {
                o.insert(key.into(), v.clone());
            }
        }
        Value::Object(o)
    }

    fn ty(&mut self, ty: &Ty) -> Value {
        Value::Object(self.object(ty))
    }

    fn object(&mut self, ty: &Ty) -> Map<String, Value> {
        let mut o = Map::new();
        match ty {
            Ty::Opaque => {}
            Ty::Scalar { kind, constraints } => {
                o.insert("type".into(), json!(kind.json_type()));
                if let Some(format) = kind.format() {
                    o.insert("format".into(), json!(format));
                }
                if *kind == ScalarKind::PositiveInt {
                    o.insert("exclusiveMinimum".into(), json!(0));
                }
                constraint_keywords(constraints, &mut o);
            }
            Ty::Literal(values) => {
                if let [single] = values.as_slice() {
                    o.insert("const".into(), single.clone());
                } else {
                    o.insert("enum".into(), Value::Array(values.clone()));
                }
                if let Some(t) = shared_json_type(values) {
                    o.insert("type".into(), json!(t));
                }
            }
            Ty::Ref(name) => {
                o.insert("$ref".into(), Value::from(def_ref(name)));
            }
            Ty::Model(id) => {
                self.seen.insert(*id);
                let key = self.key(*id);
                o.insert("$ref".into(), Value::from(def_ref(&key)));
            }
            Ty::Optional(inner) => {
                o.insert("anyOf".into(), json!([self.ty(inner), {"type": "null"}]));
            }
            Ty::Union { members, discriminator } => {
                let branches: Vec<Value> = members.iter().map(|m| self.ty(m)).collect();
                o.insert("oneOf".into(), Value::Array(branches));
                if let Some(tag) = discriminator {
                    let mut disc = Map::new();
                    let mapping = self.mapping(members, tag);
                    if !mapping.is_empty() {
                        disc.insert("mapping".into(), Value::Object(mapping));
                    }
                    disc.insert("propertyName".into(), Value::from(tag.clone()));
                    o.insert("discriminator".into(), Value::Object(disc));
                }
            }
            Ty::List(item) => {
                o.insert("items".into(), self.ty(item));
                o.insert("type".into(), json!("array"));
            }
            Ty::Set(item) => {
                o.insert("items".into(), self.ty(item));
                o.insert("type".into(), json!("array"));
                o.insert("uniqueItems".into(), json!(true));
            }
            Ty::Tuple(elems) => {
                let prefix: Vec<Value> = elems.iter().map(|e| self.ty(e)).collect();
                o.insert("maxItems".into(), json!(elems.len()));
                o.insert("minItems".into(), json!(elems.len()));
                o.insert("prefixItems".into(), Value::Array(prefix));
                o.insert("type".into(), json!("array"));
            }
            Ty::Map(values) => {
                let extra = match values {
                    MapValues::Unspecified => None,
                    MapValues::Any => Some(json!(true)),
                    MapValues::Forbidden => Some(json!(false)),
                    MapValues::Typed(value_ty) => Some(self.ty(value_ty)),
                };
                if let Some(extra) = extra {
                    o.insert("additionalProperties".into(), extra);
                }
                o.insert("type".into(), json!("object"));
            }
        }
        o
    }

    /// Tag value → branch `$ref`, from each composite branch's literal field.
    fn mapping(&mut self, members: &[Ty], tag: &str) -> Map<String, Value> {
        let arena = self.arena;
        let mut mapping = Map::new();
        for member in members {
            let Ty::Model(id) = member else { continue };
            let Some(def) = arena.get(*id) else { continue };
            if let Some(Ty::Literal(values)) = def.field(tag).map(|f| &f.ty) {
                let target = def_ref(&self.key(*id));
                for v in values.iter().filter_map(Value::as_str) {
                    mapping.insert(v.to_owned(), Value::from(target.clone()));
                }
            }
        }
        mapping
    }
}

fn constraint_keywords(c: &Constraints, o: &mut Map<String, Value>) {
    let numeric = [
        ("exclusiveMinimum", &c.gt),
        ("exclusiveMaximum", &c.lt),
        ("minimum", &c.ge),
        ("maximum", &c.le),
        ("multipleOf", &c.multiple_of),
    ];
    for (key, n) in numeric {
        if let Some(n) = n {
            o.insert(key.into(), Value::Number(n.clone()));
        }
    }
    if let Some(n) = c.min_length {
        o.insert("minLength".into(), json!(n));
    }
    if let Some(n) = c.max_length {
        o.insert("maxLength".into(), json!(n));
    }
    if let Some(p) = &c.pattern {
        o.insert("pattern".into(), json!(p));
    }
}

fn shared_json_type(values: &[Value]) -> Option<&'static str> {
    let type_of = |v: &Value| match v {
        Value::Null => Some("null"),
        Value::Bool(_) => Some("boolean"),
        Value::Number(n) if n.is_i64() || n.is_u64() => Some("integer"),
        Value::Number(_) => Some("number"),
        Value::String(_) => Some("string"),
        _ => None,
    };
    let first = type_of(values.first()?)?;
    values.iter().all(|v| type_of(v) == Some(first)).then_some(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FieldMeta;
    use crate::model::ModelFactory;
    use crate::registry::Registry;

    fn field(name: &str, ty: Ty, required: bool) -> FieldSpec {
        FieldSpec { name: name.into(), ty, required, default: None, meta: FieldMeta::default() }
    }

    #[test]
    fn plain_composite() {
        let mut arena = TypeArena::new();
        let id = arena
            .define_composite(
                "Entity",
                Some("A thing.".into()),
                vec![
                    field("id", Ty::scalar(ScalarKind::Uuid), true),
                    field("rank", Ty::scalar(ScalarKind::PositiveInt), false),
                ],
            )
            .unwrap();
        assert_eq!(
            arena.describe(id),
            json!({
                "description": "A thing.",
                "properties": {
                    "id": {"format": "uuid", "type": "string"},
                    "rank": {"exclusiveMinimum": 0, "type": "integer"}
                },
                "required": ["id"],
                "title": "Entity",
                "type": "object"
            })
        );
    }

    #[test]
    fn referenced_models_are_collected_into_defs() {
        let mut arena = TypeArena::new();
        let members = [("low", json!("low")), ("high", json!("high"))]
            .into_iter()
            .map(|(k, v)| (k.to_owned(), v))
            .collect();
        let level = arena.define_enum("Level", None, members, ValueKind::String).unwrap();
        let task = arena
            .define_composite("Task", None, vec![field("level", Ty::Model(level), true)])
            .unwrap();
        let schema = arena.describe(task);
        assert_eq!(schema["properties"]["level"], json!({"$ref": "#/$defs/Level"}));
        assert_eq!(
            schema["$defs"]["Level"],
            json!({"enum": ["low", "high"], "title": "Level", "type": "string"})
        );
    }

    #[test]
    fn models_sharing_a_title_get_distinct_keys() {
        let mut arena = TypeArena::new();
        let int = arena
            .define_composite("Item", None, vec![field("n", Ty::scalar(ScalarKind::Integer), true)])
            .unwrap();
        let text = arena
            .define_composite("Item", None, vec![field("s", Ty::scalar(ScalarKind::String), true)])
            .unwrap();
        let keyed = arena.define_composite("Config", None, vec![]).unwrap();
        arena.bind(keyed, "Cfg").unwrap();
        let root = arena
            .define_composite(
                "Root",
                None,
                vec![
                    field("a", Ty::Model(int), true),
                    field("b", Ty::Model(text), true),
                    field("c", Ty::Model(keyed), true),
                ],
            )
            .unwrap();

        let schema = arena.describe(root);
        assert_eq!(schema["properties"]["a"], json!({"$ref": "#/$defs/Item"}));
        assert_eq!(schema["properties"]["b"], json!({"$ref": "#/$defs/Item2"}));
        assert_eq!(schema["properties"]["c"], json!({"$ref": "#/$defs/Cfg"}));
        assert_eq!(schema["$defs"]["Item2"]["required"], json!(["s"]));
        assert_eq!(schema["$defs"]["Cfg"]["title"], json!("Config"));
    }

    #[test]
    fn recursive_root_is_a_bare_ref() {
        let mut arena = TypeArena::new();
        let next = Ty::Optional(Box::new(Ty::Ref("Node".into())));
        let id = arena.define_composite("Node", None, vec![field("next", next, false)]).unwrap();
        let mut registry = Registry::new();
        registry.insert("Node", id);
        arena.finalize(id, &registry).unwrap();

        let schema = arena.describe(id);
        assert_eq!(schema["$ref"], json!("#/$defs/Node"));
        assert_eq!(
            schema["$defs"]["Node"]["properties"]["next"],
            json!({"anyOf": [{"$ref": "#/$defs/Node"}, {"type": "null"}]})
        );
        assert!(schema.get("properties").is_none());
    }

    #[test]
    fn literal_types() {
        assert_eq!(shared_json_type(&[json!("a"), json!("b")]), Some("string"));
        assert_eq!(shared_json_type(&[json!(1), json!(2.5)]), None);
        assert_eq!(shared_json_type(&[]), None);
    }
}
