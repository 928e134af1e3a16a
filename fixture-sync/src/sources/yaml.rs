use std::{fs, path::Path};

use serde_json::Value;

use crate::error::SourceError;

use super::{json::headers_from_document, HeaderStream};

/// YAML documents share the JSON item shapes; third-party suites nest them under `test_cases`.
pub fn read_headers(path: &Path) -> Result<HeaderStream, SourceError> {
    let content = fs::read(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_yaml::from_slice(&content).map_err(|err| SourceError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let stream = headers_from_document(document).into_iter().map(Ok::<_, SourceError>);
    Ok(Box::new(stream))
}
