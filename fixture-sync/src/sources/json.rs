use std::{fs, path::Path};

use serde_json::{Map, Value};
use tracing::debug;

use crate::{error::SourceError, headers::HeaderSet};

use super::HeaderStream;

/// Keys that carry a bare user agent when an item has no `headers` object.
const USER_AGENT_KEYS: [&str; 4] = ["ua", "user-agent", "user_agent", "user_agent_string"];

pub fn read_headers(path: &Path) -> Result<HeaderStream, SourceError> {
    let content = fs::read(path).map_err(|source| SourceError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let document: Value = serde_json::from_slice(&content).map_err(|err| SourceError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    })?;

    let stream = headers_from_document(document).into_iter().map(Ok::<_, SourceError>);
    Ok(Box::new(stream))
}

/// Every header set in a parsed document: a list of items, a `test_cases` list, or one item.
pub fn headers_from_document(document: Value) -> Vec<HeaderSet> {
    let items = match document {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("test_cases") {
            Some(Value::Array(items)) => items,
            Some(_) => Vec::new(),
            None => vec![Value::Object(map)],
        },
        other => vec![other],
    };

    items
        .iter()
        .filter_map(|item| {
            let headers = headers_from_json(item);
            if headers.is_none() {
                debug!("ignoring item without headers: {item}");
            }
            headers
        })
        .collect()
}

/// One item: a user agent string, an object with a `headers` map, or an object with one of the
/// user-agent keys. Items that produce no headers yield `None`.
pub fn headers_from_json(item: &Value) -> Option<HeaderSet> {
    let headers = match item {
        Value::String(user_agent) => HeaderSet::from_user_agent(user_agent),
        Value::Object(map) => match map.get("headers") {
            Some(Value::Object(headers)) => from_header_map(headers),
            _ => USER_AGENT_KEYS
                .iter()
                .find_map(|key| map.get(*key).and_then(Value::as_str))
                .map(HeaderSet::from_user_agent)?,
        },
        _ => return None,
    };

    (!headers.is_empty()).then_some(headers)
}

fn from_header_map(headers: &Map<String, Value>) -> HeaderSet {
    HeaderSet::from_pairs(
        headers
            .iter()
            .filter_map(|(name, value)| value.as_str().map(|value| (name, value))),
    )
}
