use serde::de::DeserializeOwned;
use thiserror::Error;

/// Parse failure with the JSON path it happened at.
#[derive(Debug, Error)]
#[error("at JSON path {path} → {message}")]
pub struct DocumentError {
    pub path: String,
    pub message: String,
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T, DocumentError> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| DocumentError {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn error_names_the_path() {
        let src = r#"{"$defs": {"Node": {"type": [1, }}}"#;
        let err = from_str_with_path::<Value>(src).unwrap_err();
        assert!(err.path.starts_with("$defs.Node"), "{}", err.path);
        let ok: Value = from_str_with_path(r#"{"type": "integer"}"#).unwrap();
        assert_eq!(ok["type"], "integer");
    }
}
