//! Entry point: JSON Schema document → model.
//!
//! Named definitions are built first, in dependency order, into a registry
//! that lives only as long as one call. The root is then either an alias for
//! one of them, a wrapper around a single value, or a composite of its own.

use serde_json::Value;

use crate::build::{build_definition, build_enum, build_root};
use crate::error::ConvertError;
use crate::graph::{build_order, definitions, dependency_graph, local_definition_name};
use crate::model::{ModelDef, ModelFactory, ModelId, TypeArena, ValidationError};
use crate::registry::{Building, Registry};
use crate::resolve::resolve;

// ------------------------------- Policy ---------------------------------- //

pub const DEFAULT_MODEL_TITLE: &str = "DynamicModel";
pub const DEFAULT_ROOT_TITLE: &str = "DynamicRootModel";

/// Display names used when a schema carries no `title`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    pub model_title: String,
    pub root_title: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            model_title: DEFAULT_MODEL_TITLE.to_owned(),
            root_title: DEFAULT_ROOT_TITLE.to_owned(),
        }
    }
}

/// A converted schema: the arena holding every built model plus the root handle.
#[derive(Debug, Clone)]
pub struct Model {
    arena: TypeArena,
    root: ModelId,
}

impl Model {
    pub fn root(&self) -> ModelId {
        self.root
    }
    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }
    pub fn def(&self) -> Option<&ModelDef> {
        self.arena.get(self.root)
    }
    pub fn name(&self) -> &str {
        self.def().map(|d| d.name.as_str()).unwrap_or_default()
    }
    /// Re-derive the JSON Schema of the root model.
    pub fn describe(&self) -> Value {
        self.arena.describe(self.root)
    }
    /// Validate an instance against the root model, returning it normalized.
    pub fn validate(&self, instance: &Value) -> Result<Value, ValidationError> {
        self.arena.validate(self.root, instance)
    }
}

pub fn convert(schema: &Value) -> Result<Model, ConvertError> {
    convert_with_options(schema, &ConvertOptions::default())
}

pub fn convert_with_options(
    schema: &Value,
    options: &ConvertOptions,
) -> Result<Model, ConvertError> {
    let mut arena = TypeArena::new();
    let root = convert_into(&mut arena, schema, options)?;
    Ok(Model { arena, root })
}

/// Definition names of `schema` in the order they would be built.
pub fn definition_order(schema: &Value) -> Result<Vec<String>, ConvertError> {
    let root = schema.as_object().ok_or(ConvertError::RootNotObject)?;
    Ok(build_order(&dependency_graph(&definitions(root))))
}

/// Convert `schema` through any [`ModelFactory`] and return the root handle.
pub fn convert_into<F: ModelFactory>(
    factory: &mut F,
    schema: &Value,
    options: &ConvertOptions,
) -> Result<ModelId, ConvertError> {
    let root = schema.as_object().ok_or(ConvertError::RootNotObject)?;
    let mut registry = Registry::new();

    // 1) named definitions, dependencies first
    let defs = definitions(root);
    if !defs.is_empty() {
        let order = build_order(&dependency_graph(&defs));
        tracing::debug!(?order, "definition build order");
        for name in &order {
            let Some(Value::Object(def)) = defs.get(name).copied() else {
                return Err(ConvertError::DefinitionNotObject(name.clone()));
            };
            if def.contains_key("enum") {
                build_enum(factory, &mut registry, name, def)?;
            } else {
                build_definition(factory, &mut registry, name, def, &options.model_title)?;
            }
        }
    }

    // 2) the whole document is an alias for one definition
    if !root.contains_key("properties") {
        let target = root.get("$ref").and_then(Value::as_str).and_then(local_definition_name);
        if let Some(name) = target {
            return registry.get(&name).ok_or(ConvertError::UnknownDefinition(name));
        }
    }

    // 3) property-less root wraps exactly one value
    if !root.contains_key("properties") {
        let title = root.get("title").and_then(Value::as_str).unwrap_or(&options.root_title);
        let ty = resolve(schema, &registry, &Building::new());
        let description = root.get("description").and_then(Value::as_str).map(str::to_owned);
        let id = factory.define_wrapper(title, description, ty)?;
        factory.finalize(id, &registry)?;
        tracing::debug!(%title, %id, "wrapper root built");
        return Ok(id);
    }

    // 4) ordinary composite root
    let id = build_root(factory, &registry, root, &options.model_title)?;
    tracing::debug!(%id, definitions = registry.len(), "root model built");
    Ok(id)
}
