//! JSON Schema → typed model conversion.
//!
//! [`convert`] walks a schema document, builds every `$defs` entry in
//! dependency order and returns a [`Model`]: a handle into a [`TypeArena`] of
//! composites, enums and wrappers that can validate instances and re-derive
//! its own schema.
//!
//! ```
//! use serde_json::json;
//!
//! let schema = json!({
//!     "title": "Counter",
//!     "type": "object",
//!     "properties": {"count": {"type": "integer", "exclusiveMinimum": 0}},
//!     "required": ["count"]
//! });
//! let model = schema2model::convert(&schema).unwrap();
//! assert!(model.validate(&json!({"count": 3})).is_ok());
//! assert!(model.validate(&json!({"count": 0})).is_err());
//! assert_eq!(model.describe(), schema);
//! ```
pub mod build;
pub mod cli;
pub mod constraints;
pub mod convert;
pub mod error;
pub mod graph;
pub mod ir;
pub mod model;
pub mod path_de;
pub mod registry;
pub mod resolve;

pub use convert::{
    ConvertOptions, Model, convert, convert_into, convert_with_options, definition_order,
};
pub use error::{ConvertError, ModelError};
pub use ir::{Constraints, FieldMeta, FieldSpec, MapValues, ScalarKind, Ty};
pub use model::{ModelFactory, ModelId, TypeArena, ValidationError, ValueKind};
pub use registry::{Building, Registry};
