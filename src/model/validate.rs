//! Instance validation against built models.
//!
//! `validate` returns the normalized instance: defaults filled in, unknown
//! keys dropped, set duplicates collapsed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Number, Value};
use thiserror::Error;

use super::{ModelId, ModelKind, TypeArena};
use crate::ir::{Constraints, MapValues, ScalarKind, Ty};

static UUID_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?i)[0-9a-f]{8}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{4}-?[0-9a-f]{12}$")
        .expect("static regex")
});

static DURATION_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"^-?P(?:\d+(?:\.\d+)?Y)?(?:\d+(?:\.\d+)?M)?(?:\d+(?:\.\d+)?W)?(?:\d+(?:\.\d+)?D)?",
        r"(?:T(?:\d+(?:\.\d+)?H)?(?:\d+(?:\.\d+)?M)?(?:\d+(?:\.\d+)?S)?)?$",
    ))
    .expect("static regex")
});

static URI_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*://[^\s/?#]+[^\s]*$").expect("static regex")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("at {path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

fn fail<T>(path: &str, message: impl Into<String>) -> Result<T, ValidationError> {
    Err(ValidationError { path: path.to_owned(), message: message.into() })
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl TypeArena {
    /// Check `instance` against model `id`.
    pub fn validate(&self, id: ModelId, instance: &Value) -> Result<Value, ValidationError> {
        self.check_model(id, instance, "$")
    }

    fn check_model(&self, id: ModelId, v: &Value, path: &str) -> Result<Value, ValidationError> {
        let Some(def) = self.get(id) else {
            return fail(path, format!("unknown model {id}"));
        };
        match &def.kind {
            ModelKind::Wrapper { root } => self.check(root, v, path),
            ModelKind::Enum { members, .. } => {
                if members.values().any(|m| m == v) {
                    Ok(v.clone())
                } else {
                    let allowed: Vec<&str> = members.keys().map(String::as_str).collect();
                    let allowed = allowed.join(", ");
                    fail(path, format!("{v} is not a member of {} ({allowed})", def.name))
                }
            }
            ModelKind::Composite { fields } => {
                let Value::Object(obj) = v else {
                    let found = kind_of(v);
                    return fail(path, format!("expected {} object, found {found}", def.name));
                };
                let mut out = Map::new();
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    match obj.get(&field.name) {
                        Some(value) => {
                            let checked = self.check(&field.ty, value, &field_path)?;
                            out.insert(field.name.clone(), checked);
                        }
                        None if field.required => {
                            return fail(&field_path, "missing required field");
                        }
                        None => {
                            if let Some(default) = &field.default {
                                out.insert(field.name.clone(), default.clone());
                            }
                        }
                    }
                }
                Ok(Value::Object(out))
            }
        }
    }

    fn check(&self, ty: &Ty, v: &Value, path: &str) -> Result<Value, ValidationError> {
        match ty {
            Ty::Opaque => Ok(v.clone()),
            Ty::Scalar { kind, constraints } => {
                self.check_scalar(*kind, constraints, v, path)?;
                Ok(v.clone())
            }
            Ty::Literal(values) => {
                if values.contains(v) {
                    Ok(v.clone())
                } else {
                    let allowed: Vec<String> = values.iter().map(Value::to_string).collect();
                    fail(path, format!("expected one of {}, found {v}", allowed.join(", ")))
                }
            }
            Ty::Ref(name) => fail(path, format!("unresolved reference to `{name}`")),
            Ty::Model(id) => self.check_model(*id, v, path),
            Ty::Optional(inner) => match v {
                Value::Null => Ok(Value::Null),
                _ => self.check(inner, v, path),
            },
            Ty::Union { members, discriminator: Some(tag) } => {
                self.check_tagged(members, tag, v, path)
            }
            Ty::Union { members, discriminator: None } => {
                let mut last = None;
                for member in members {
                    match self.check(member, v, path) {
                        Ok(out) => return Ok(out),
                        Err(e) => last = Some(e),
                    }
                }
                Err(last.unwrap_or_else(|| ValidationError {
                    path: path.to_owned(),
                    message: "empty union".into(),
                }))
            }
            Ty::List(item) => {
                let items = self.array(v, path)?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, x)| self.check(item, x, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Ty::Set(item) => {
                let items = self.array(v, path)?;
                let mut out: Vec<Value> = Vec::with_capacity(items.len());
                for (i, x) in items.iter().enumerate() {
                    let checked = self.check(item, x, &format!("{path}[{i}]"))?;
                    if !out.contains(&checked) {
                        out.push(checked);
                    }
                }
                Ok(Value::Array(out))
            }
            Ty::Tuple(elems) => {
                let items = self.array(v, path)?;
                if items.len() != elems.len() {
                    let (want, got) = (elems.len(), items.len());
                    return fail(path, format!("expected {want} items, found {got}"));
                }
                elems
                    .iter()
                    .zip(items)
                    .enumerate()
                    .map(|(i, (t, x))| self.check(t, x, &format!("{path}[{i}]")))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            Ty::Map(values) => {
                let Value::Object(obj) = v else {
                    return fail(path, format!("expected object, found {}", kind_of(v)));
                };
                match values {
                    MapValues::Unspecified | MapValues::Any => Ok(v.clone()),
                    MapValues::Forbidden => match obj.keys().next() {
                        Some(k) => fail(&format!("{path}.{k}"), "no properties are allowed"),
                        None => Ok(v.clone()),
                    },
                    MapValues::Typed(value_ty) => {
                        let mut out = Map::new();
                        for (k, x) in obj {
                            let checked = self.check(value_ty, x, &format!("{path}.{k}"))?;
                            out.insert(k.clone(), checked);
                        }
                        Ok(Value::Object(out))
                    }
                }
            }
        }
    }

    fn array<'v>(&self, v: &'v Value, path: &str) -> Result<&'v Vec<Value>, ValidationError> {
        match v {
            Value::Array(items) => Ok(items),
            other => fail(path, format!("expected array, found {}", kind_of(other))),
        }
    }

    /// Route on the discriminator property to the branch whose literal field admits it.
    fn check_tagged(
        &self,
        members: &[Ty],
        tag: &str,
        v: &Value,
        path: &str,
    ) -> Result<Value, ValidationError> {
        let Some(found) = v.get(tag) else {
            return fail(path, format!("missing discriminator `{tag}`"));
        };
        for member in members {
            let Ty::Model(id) = member else { continue };
            let admits = self
                .get(*id)
                .and_then(|def| def.field(tag))
                .is_some_and(|f| matches!(&f.ty, Ty::Literal(values) if values.contains(found)));
            if admits {
                return self.check_model(*id, v, path);
            }
        }
        fail(&format!("{path}.{tag}"), format!("{found} does not match any variant"))
    }

    fn check_scalar(
        &self,
        kind: ScalarKind,
        c: &Constraints,
        v: &Value,
        path: &str,
    ) -> Result<(), ValidationError> {
        let expected = kind.json_type();
        match kind {
            ScalarKind::Null => {
                if !v.is_null() {
                    return fail(path, format!("expected null, found {}", kind_of(v)));
                }
            }
            ScalarKind::Boolean => {
                if !v.is_boolean() {
                    return fail(path, format!("expected boolean, found {}", kind_of(v)));
                }
            }
            ScalarKind::Integer | ScalarKind::PositiveInt | ScalarKind::Number => {
                let Value::Number(n) = v else {
                    return fail(path, format!("expected {expected}, found {}", kind_of(v)));
                };
                if kind != ScalarKind::Number && !(n.is_i64() || n.is_u64()) {
                    return fail(path, format!("expected integer, found {n}"));
                }
                if kind == ScalarKind::PositiveInt && n.as_f64().is_none_or(|x| x <= 0.0) {
                    return fail(path, format!("{n} is not positive"));
                }
                check_bounds(n, c, path)?;
            }
            ScalarKind::Duration if v.is_number() => {}
            _ => {
                let Value::String(s) = v else {
                    return fail(path, format!("expected string, found {}", kind_of(v)));
                };
                if !self.format_ok(kind, s) {
                    let format = kind.format().unwrap_or("string");
                    return fail(path, format!("{s:?} is not a valid {format}"));
                }
                self.check_string(s, c, path)?;
            }
        }
        Ok(())
    }

    fn format_ok(&self, kind: ScalarKind, s: &str) -> bool {
        match kind {
            ScalarKind::DateTime => {
                DateTime::parse_from_rfc3339(s).is_ok()
                    || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
            }
            ScalarKind::Date => NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok(),
            ScalarKind::Time => {
                NaiveTime::parse_from_str(s, "%H:%M:%S%.f").is_ok()
                    || NaiveTime::parse_from_str(s, "%H:%M").is_ok()
            }
            // at least one component after `P`, none of them empty
            ScalarKind::Duration => {
                s.bytes().any(|b| b.is_ascii_digit())
                    && !s.ends_with('T')
                    && DURATION_RX.is_match(s)
            }
            ScalarKind::Uuid => UUID_RX.is_match(s),
            ScalarKind::Uri => URI_RX.is_match(s),
            _ => true,
        }
    }

    fn check_string(&self, s: &str, c: &Constraints, path: &str) -> Result<(), ValidationError> {
        let len = s.chars().count() as u64;
        if let Some(min) = c.min_length {
            if len < min {
                return fail(path, format!("shorter than {min} characters"));
            }
        }
        if let Some(max) = c.max_length {
            if len > max {
                return fail(path, format!("longer than {max} characters"));
            }
        }
        if let Some(pattern) = &c.pattern {
            let matched = match self.pattern(pattern) {
                Some(rx) => rx.is_match(s),
                None => Regex::new(pattern).map(|rx| rx.is_match(s)).unwrap_or(false),
            };
            if !matched {
                return fail(path, format!("{s:?} does not match `{pattern}`"));
            }
        }
        Ok(())
    }
}

fn check_bounds(n: &Number, c: &Constraints, path: &str) -> Result<(), ValidationError> {
    let Some(x) = n.as_f64() else { return Ok(()) };
    let bound = |b: &Option<Number>| b.as_ref().and_then(Number::as_f64);
    if let Some(b) = bound(&c.gt) {
        if x <= b {
            return fail(path, format!("{n} must be greater than {b}"));
        }
    }
    if let Some(b) = bound(&c.lt) {
        if x >= b {
            return fail(path, format!("{n} must be less than {b}"));
        }
    }
    if let Some(b) = bound(&c.ge) {
        if x < b {
            return fail(path, format!("{n} must be at least {b}"));
        }
    }
    if let Some(b) = bound(&c.le) {
        if x > b {
            return fail(path, format!("{n} must be at most {b}"));
        }
    }
    if let Some(m) = bound(&c.multiple_of) {
        let q = x / m;
        if m == 0.0 || (q - q.round()).abs() > 1e-9 {
            return fail(path, format!("{n} is not a multiple of {m}"));
        }
    }
    Ok(())
}
