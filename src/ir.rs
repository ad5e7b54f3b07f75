// Resolved type descriptors. One `Ty` per schema node; consumed by the model facility.

use serde_json::{Number, Value};

use crate::model::ModelId;

#[derive(Debug, Clone, PartialEq)]
pub enum Ty {
    Scalar { kind: ScalarKind, constraints: Constraints },
    Literal(Vec<Value>),     // one alternative per value, schema order
    Ref(String),             // by-name reference, resolved in `ModelFactory::finalize`
    Model(ModelId),          // already-built definition
    Union {
        members: Vec<Ty>,
        discriminator: Option<String>,
    },
    Optional(Box<Ty>),
    List(Box<Ty>),
    Set(Box<Ty>),
    Tuple(Vec<Ty>),          // exact arity
    Map(MapValues),          // string-keyed
    Opaque,                  // accept anything
}

/// What a mapping's `additionalProperties` says about its values.
#[derive(Debug, Clone, PartialEq)]
pub enum MapValues {
    Unspecified,             // keyword absent
    Any,                     // `true`
    Forbidden,               // `false`: only the empty object
    Typed(Box<Ty>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Null,
    Boolean,
    Integer,
    PositiveInt,             // integer with a lone `gt: 0`
    Number,
    String,
    DateTime,
    Date,
    Time,
    Duration,
    Uuid,
    Binary,
    Uri,
}

impl ScalarKind {
    /// JSON Schema `format` keyword for the specialized string kinds.
    pub fn format(self) -> Option<&'static str> {
        match self {
            ScalarKind::DateTime => Some("date-time"),
            ScalarKind::Date => Some("date"),
            ScalarKind::Time => Some("time"),
            ScalarKind::Duration => Some("duration"),
            ScalarKind::Uuid => Some("uuid"),
            ScalarKind::Binary => Some("binary"),
            ScalarKind::Uri => Some("uri"),
            _ => None,
        }
    }

    pub fn from_format(format: &str) -> Option<Self> {
        match format {
            "date-time" => Some(ScalarKind::DateTime),
            "date" => Some(ScalarKind::Date),
            "time" => Some(ScalarKind::Time),
            "duration" => Some(ScalarKind::Duration),
            "uuid" => Some(ScalarKind::Uuid),
            "binary" => Some(ScalarKind::Binary),
            "uri" => Some(ScalarKind::Uri),
            _ => None,
        }
    }

    /// JSON Schema `type` keyword this kind is carried by.
    pub fn json_type(self) -> &'static str {
        match self {
            ScalarKind::Null => "null",
            ScalarKind::Boolean => "boolean",
            ScalarKind::Integer | ScalarKind::PositiveInt => "integer",
            ScalarKind::Number => "number",
            _ => "string",
        }
    }
}

/// Constraint options attached to a scalar. Bounds keep the schema's own
/// number representation so `0` and `0.0` stay distinct.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Constraints {
    pub gt: Option<Number>,
    pub lt: Option<Number>,
    pub ge: Option<Number>,
    pub le: Option<Number>,
    pub multiple_of: Option<Number>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        *self == Constraints::default()
    }

    /// Exactly `gt: 0` (integer zero) and nothing else.
    pub fn is_positive_only(&self) -> bool {
        let zero = self.gt.as_ref().and_then(Number::as_u64) == Some(0);
        zero && Constraints { gt: None, ..self.clone() }.is_empty()
    }
}

impl Ty {
    pub fn scalar(kind: ScalarKind) -> Self {
        Ty::Scalar { kind, constraints: Constraints::default() }
    }

    /// Visit every nested descriptor mutably, depth first.
    pub fn walk_mut(&mut self, f: &mut impl FnMut(&mut Ty)) {
        f(self);
        match self {
            Ty::Union { members, .. } | Ty::Tuple(members) => {
                for m in members {
                    m.walk_mut(f);
                }
            }
            Ty::Optional(inner) | Ty::List(inner) | Ty::Set(inner) => inner.walk_mut(f),
            Ty::Map(MapValues::Typed(inner)) => inner.walk_mut(f),
            _ => {}
        }
    }

    /// Visit every nested descriptor, depth first.
    pub fn walk(&self, f: &mut impl FnMut(&Ty)) {
        f(self);
        match self {
            Ty::Union { members, .. } | Ty::Tuple(members) => {
                for m in members {
                    m.walk(f);
                }
            }
            Ty::Optional(inner) | Ty::List(inner) | Ty::Set(inner) => inner.walk(f),
            Ty::Map(MapValues::Typed(inner)) => inner.walk(f),
            _ => {}
        }
    }
}

/// Verbatim per-field metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMeta {
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub examples: Option<Value>,
    pub deprecated: Option<Value>,
}

impl FieldMeta {
    pub fn is_empty(&self) -> bool {
        *self == FieldMeta::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: Ty,
    pub required: bool,
    pub default: Option<Value>,  // `Some(Value::Null)` is an explicit `null` default
    pub meta: FieldMeta,
}
