use thiserror::Error;

use crate::model::ModelId;

/// Failures raised by the model facility while defining or finalizing types.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A by-name reference with no registered definition behind it.
    #[error("model `{model}` references `{reference}`, which was never defined")]
    UnresolvedReference { model: String, reference: String },
    /// A `pattern` constraint that is not a valid regular expression.
    #[error("model `{model}` has an invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        model: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("unknown model handle {0}")]
    UnknownModel(ModelId),
}

/// Failures of a schema conversion.
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("schema root must be a JSON object")]
    RootNotObject,
    #[error("definition `{0}` must be a JSON object")]
    DefinitionNotObject(String),
    /// The root is an alias (`$ref`) for a definition that was never built.
    #[error("root references unknown definition `{0}`")]
    UnknownDefinition(String),
    /// Two enum values stringify to the same member label (e.g. `1` and `"1"`).
    #[error("enum `{definition}` has two members labelled `{label}`")]
    EnumLabelCollision { definition: String, label: String },
    #[error(transparent)]
    Model(#[from] ModelError),
}
