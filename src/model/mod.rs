//! Runtime model facility.
//!
//! Turns field lists and enum member tables into named, inspectable models
//! that can validate instances (`validate`) and re-derive a JSON Schema
//! (`describe`). Models live in a [`TypeArena`] and refer to each other through
//! [`ModelId`] indices, so self-referencing models need no owning cycles:
//! a field points at a name first and is rewritten to an index by
//! [`ModelFactory::finalize`] once the target is registered.
pub mod describe;
pub mod validate;

use std::collections::HashMap;
use std::fmt;

use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;

use crate::error::ModelError;
use crate::ir::{FieldSpec, Ty};
use crate::registry::Registry;

pub use validate::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(usize);

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Underlying kind of an enum's member values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueKind {
    String,
    Integer,
    Other,
}

impl ValueKind {
    /// From an enum definition's `type` keyword, or from its members when the
    /// keyword is absent.
    pub fn infer(ty: Option<&str>, members: &[Value]) -> Self {
        match ty {
            Some("string") => ValueKind::String,
            Some("integer") => ValueKind::Integer,
            Some(_) => ValueKind::Other,
            None if members.is_empty() => ValueKind::Other,
            None if members.iter().all(Value::is_string) => ValueKind::String,
            None if members.iter().all(|m| m.is_i64() || m.is_u64()) => ValueKind::Integer,
            None => ValueKind::Other,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ModelKind {
    Composite { fields: Vec<FieldSpec> },
    Enum { members: IndexMap<String, Value>, value_kind: ValueKind },
    /// Property-less root holding exactly one value of `root`.
    Wrapper { root: Ty },
}

#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    /// `$defs` key the model was registered under, if any.
    pub key: Option<String>,
    pub description: Option<String>,
    pub kind: ModelKind,
    pub finalized: bool,
}

impl ModelDef {
    pub fn fields(&self) -> &[FieldSpec] {
        match &self.kind {
            ModelKind::Composite { fields } => fields,
            _ => &[],
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields().iter().find(|f| f.name == name)
    }

    fn types_mut(&mut self) -> Vec<&mut Ty> {
        match &mut self.kind {
            ModelKind::Composite { fields } => fields.iter_mut().map(|f| &mut f.ty).collect(),
            ModelKind::Wrapper { root } => vec![root],
            ModelKind::Enum { .. } => Vec::new(),
        }
    }
}

/// Construction seam. The converter only ever talks to this trait.
pub trait ModelFactory {
    fn define_composite(
        &mut self,
        name: &str,
        description: Option<String>,
        fields: Vec<FieldSpec>,
    ) -> Result<ModelId, ModelError>;

    fn define_enum(
        &mut self,
        name: &str,
        description: Option<String>,
        members: IndexMap<String, Value>,
        value_kind: ValueKind,
    ) -> Result<ModelId, ModelError>;

    fn define_wrapper(
        &mut self,
        name: &str,
        description: Option<String>,
        root: Ty,
    ) -> Result<ModelId, ModelError>;

    /// Record the definition name `id` is registered under.
    fn bind(&mut self, id: ModelId, key: &str) -> Result<(), ModelError>;

    /// Resolve by-name references inside `id` through `registry`.
    fn finalize(&mut self, id: ModelId, registry: &Registry) -> Result<(), ModelError>;
}

/// Arena-backed [`ModelFactory`].
#[derive(Debug, Clone, Default)]
pub struct TypeArena {
    models: Vec<ModelDef>,
    patterns: HashMap<String, Regex>,
}

impl TypeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: ModelId) -> Option<&ModelDef> {
        self.models.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub(crate) fn pattern(&self, pattern: &str) -> Option<&Regex> {
        self.patterns.get(pattern)
    }

    fn push(&mut self, def: ModelDef) -> Result<ModelId, ModelError> {
        let mut pending = Vec::new();
        for ty in def_types(&def) {
            ty.walk(&mut |t| {
                if let Ty::Scalar { constraints, .. } = t {
                    if let Some(p) = &constraints.pattern {
                        pending.push(p.clone());
                    }
                }
            });
        }
        for pattern in pending {
            if self.patterns.contains_key(&pattern) {
                continue;
            }
            let compiled = Regex::new(&pattern).map_err(|source| ModelError::InvalidPattern {
                model: def.name.clone(),
                pattern: pattern.clone(),
                source,
            })?;
            self.patterns.insert(pattern, compiled);
        }

        let id = ModelId(self.models.len());
        tracing::trace!(name = %def.name, %id, "model defined");
        self.models.push(def);
        Ok(id)
    }
}

fn def_types(def: &ModelDef) -> Vec<&Ty> {
    match &def.kind {
        ModelKind::Composite { fields } => fields.iter().map(|f| &f.ty).collect(),
        ModelKind::Wrapper { root } => vec![root],
        ModelKind::Enum { .. } => Vec::new(),
    }
}

impl ModelFactory for TypeArena {
    fn define_composite(
        &mut self,
        name: &str,
        description: Option<String>,
        fields: Vec<FieldSpec>,
    ) -> Result<ModelId, ModelError> {
        let finalized = fields.iter().all(|f| !has_refs(&f.ty));
        self.push(ModelDef {
            name: name.to_owned(),
            key: None,
            description,
            kind: ModelKind::Composite { fields },
            finalized,
        })
    }

    fn define_enum(
        &mut self,
        name: &str,
        description: Option<String>,
        members: IndexMap<String, Value>,
        value_kind: ValueKind,
    ) -> Result<ModelId, ModelError> {
        self.push(ModelDef {
            name: name.to_owned(),
            key: None,
            description,
            kind: ModelKind::Enum { members, value_kind },
            finalized: true,
        })
    }

    fn define_wrapper(
        &mut self,
        name: &str,
        description: Option<String>,
        root: Ty,
    ) -> Result<ModelId, ModelError> {
        let finalized = !has_refs(&root);
        self.push(ModelDef {
            name: name.to_owned(),
            key: None,
            description,
            kind: ModelKind::Wrapper { root },
            finalized,
        })
    }

    fn bind(&mut self, id: ModelId, key: &str) -> Result<(), ModelError> {
        let def = self.models.get_mut(id.0).ok_or(ModelError::UnknownModel(id))?;
        def.key = Some(key.to_owned());
        Ok(())
    }

    fn finalize(&mut self, id: ModelId, registry: &Registry) -> Result<(), ModelError> {
        let def = self.models.get_mut(id.0).ok_or(ModelError::UnknownModel(id))?;
        if def.finalized {
            return Ok(());
        }
        let model = def.name.clone();
        let mut missing = None;
        for ty in def.types_mut() {
            ty.walk_mut(&mut |t| {
                if let Ty::Ref(name) = t {
                    match registry.get(name) {
                        Some(target) => *t = Ty::Model(target),
                        None => {
                            missing.get_or_insert_with(|| name.clone());
                        }
                    }
                }
            });
        }
        if let Some(reference) = missing {
            return Err(ModelError::UnresolvedReference { model, reference });
        }
        def.finalized = true;
        Ok(())
    }
}

fn has_refs(ty: &Ty) -> bool {
    let mut found = false;
    ty.walk(&mut |t| found |= matches!(t, Ty::Ref(_)));
    found
}
