//! Schema-driven canonical JSON for final fixture pages.
//!
//! A page is validated against the fixture schema and re-serialized deterministically: object
//! keys follow the schema's `properties` order (local `$ref`s are followed), keys the schema does
//! not list keep their input order, indentation is four spaces and the text ends with a newline.

use std::{fs, path::Path};

use jsonschema::Validator;
use serde::Serialize;
use serde_json::{ser::PrettyFormatter, Map, Value};

use crate::{
    error::{NormalizationError, SchemaLoadError},
    result::Entry,
};

pub const EMBEDDED_SCHEMA: &str = include_str!("../schema/fixture-page.json");

const MAX_REF_DEPTH: usize = 16;

pub trait JsonNormalizer {
    fn normalize(&self, page: &[Entry]) -> Result<String, NormalizationError>;
}

pub struct SchemaNormalizer {
    schema: Value,
    validator: Validator,
}

impl SchemaNormalizer {
    pub fn embedded() -> Result<Self, SchemaLoadError> {
        Self::from_schema_text(EMBEDDED_SCHEMA, "<embedded>")
    }

    pub fn from_path(path: &Path) -> Result<Self, SchemaLoadError> {
        let text = fs::read_to_string(path).map_err(|source| SchemaLoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_schema_text(&text, &path.display().to_string())
    }

    pub fn from_schema_text(text: &str, origin: &str) -> Result<Self, SchemaLoadError> {
        let schema: Value = serde_json::from_str(text).map_err(|source| SchemaLoadError::Parse {
            origin: origin.to_string(),
            source,
        })?;
        let validator =
            jsonschema::validator_for(&schema).map_err(|err| SchemaLoadError::Compile {
                origin: origin.to_string(),
                message: err.to_string(),
            })?;

        Ok(SchemaNormalizer { schema, validator })
    }

    pub fn normalize_value(&self, value: Value) -> Result<String, NormalizationError> {
        let messages: Vec<String> = self
            .validator
            .iter_errors(&value)
            .map(|err| err.to_string())
            .collect();
        if !messages.is_empty() {
            return Err(NormalizationError::SchemaViolation { messages });
        }

        let ordered = order_value(&self.schema, &self.schema, value);

        let mut out = Vec::new();
        let mut serializer =
            serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(b"    "));
        ordered.serialize(&mut serializer)?;
        out.push(b'\n');

        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

impl JsonNormalizer for SchemaNormalizer {
    fn normalize(&self, page: &[Entry]) -> Result<String, NormalizationError> {
        if page.is_empty() {
            return Err(NormalizationError::EmptyPage);
        }
        self.normalize_value(serde_json::to_value(page)?)
    }
}

fn resolve<'a>(root: &'a Value, mut schema: &'a Value) -> &'a Value {
    for _ in 0..MAX_REF_DEPTH {
        let Some(target) = schema
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(|reference| reference.strip_prefix('#'))
            .and_then(|pointer| root.pointer(pointer))
        else {
            break;
        };
        schema = target;
    }
    schema
}

fn order_value(root: &Value, schema: &Value, value: Value) -> Value {
    let schema = resolve(root, schema);
    match value {
        Value::Object(map) => {
            let properties = schema.get("properties").and_then(Value::as_object);
            let additional = schema
                .get("additionalProperties")
                .filter(|s| s.is_object())
                .unwrap_or(&Value::Null);

            let mut pending: Vec<(String, Option<Value>)> =
                map.into_iter().map(|(key, value)| (key, Some(value))).collect();
            let mut ordered = Map::new();

            if let Some(properties) = properties {
                for (key, property_schema) in properties {
                    let Some(value) = pending
                        .iter_mut()
                        .find(|(name, _)| name == key)
                        .and_then(|(_, value)| value.take())
                    else {
                        continue;
                    };
                    ordered.insert(key.clone(), order_value(root, property_schema, value));
                }
            }
            for (key, value) in pending {
                if let Some(value) = value {
                    ordered.insert(key, order_value(root, additional, value));
                }
            }
            Value::Object(ordered)
        }
        Value::Array(items) => {
            let item_schema = schema.get("items").unwrap_or(&Value::Null);
            Value::Array(
                items
                    .into_iter()
                    .map(|item| order_value(root, item_schema, item))
                    .collect(),
            )
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        headers::HeaderSet,
        result::{ClassificationResult, Client},
    };
    use serde_json::json;

    fn entry(ua: &str) -> Entry {
        Entry {
            headers: HeaderSet::from_pairs([("user-agent", ua), ("accept", "*/*")]),
            result: ClassificationResult {
                client: Client {
                    name: Some("Chrome".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_embedded_schema_compiles() {
        assert!(SchemaNormalizer::embedded().is_ok());
    }

    #[test]
    fn test_keys_follow_schema_order() {
        let normalizer = SchemaNormalizer::embedded().unwrap();
        let scrambled = json!([{
            "device": {
                "type": null, "brand": null, "manufacturer": null,
                "marketingName": null, "deviceName": null
            },
            "os": {"version": null, "name": null, "manufacturer": null},
            "engine": {"manufacturer": null, "version": null, "name": null},
            "client": {"type": "browser", "name": "Chrome", "version": null, "manufacturer": null},
            "headers": {"user-agent": "UA", "accept": "*/*"}
        }]);

        let text = normalizer.normalize_value(scrambled).unwrap();

        let headers = text.find("\"headers\"").unwrap();
        let client = text.find("\"client\"").unwrap();
        let device = text.find("\"device\"").unwrap();
        assert!(headers < client && client < device);
        assert!(text.find("\"user-agent\"").unwrap() < text.find("\"accept\"").unwrap());
        let name = text.find("\"name\": \"Chrome\"").unwrap();
        assert!(name < text.find("\"type\": \"browser\"").unwrap());
        assert!(text.starts_with("[\n    {\n        \"headers\": {"));
        assert!(text.ends_with("]\n"));
    }

    #[test]
    fn test_normalization_is_stable() {
        let normalizer = SchemaNormalizer::embedded().unwrap();
        let page = vec![entry("A"), entry("B")];

        let first = normalizer.normalize(&page).unwrap();
        let reparsed: Vec<Entry> = serde_json::from_str(&first).unwrap();
        let second = normalizer.normalize(&reparsed).unwrap();

        assert_eq!(first, second);
        assert_eq!(reparsed, page);
    }

    #[test]
    fn test_schema_violations_are_reported() {
        let normalizer = SchemaNormalizer::embedded().unwrap();
        let invalid = json!([{
            "headers": {}, "client": {}, "engine": {}, "os": {}, "device": {}, "extra": 1
        }]);

        let err = normalizer.normalize_value(invalid).unwrap_err();

        match err {
            NormalizationError::SchemaViolation { messages } => assert!(messages.len() >= 2),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_empty_pages_are_rejected() {
        let normalizer = SchemaNormalizer::embedded().unwrap();

        assert!(matches!(
            normalizer.normalize(&[]),
            Err(NormalizationError::EmptyPage)
        ));
    }

    #[test]
    fn test_broken_schemas_fail_to_load() {
        assert!(matches!(
            SchemaNormalizer::from_schema_text("{not json", "test"),
            Err(SchemaLoadError::Parse { .. })
        ));
        assert!(matches!(
            SchemaNormalizer::from_schema_text(r#"{"type": 12}"#, "test"),
            Err(SchemaLoadError::Compile { .. })
        ));
        assert!(matches!(
            SchemaNormalizer::from_path(Path::new("/nonexistent/schema.json")),
            Err(SchemaLoadError::Read { .. })
        ));
    }
}
