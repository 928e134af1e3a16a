use std::{fmt, path::PathBuf};

use crate::result::ClassificationResult;

pub const UNKNOWN_SEGMENT: &str = "unknown";

/// Categorical bucket `{deviceManufacturer}/{deviceType}/{clientManufacturer}/{clientType}`.
///
/// Every segment is lower-cased and never empty; anything missing routes to `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ShardPath {
    device_manufacturer: String,
    device_type: String,
    client_manufacturer: String,
    client_type: String,
}

impl ShardPath {
    pub fn route(result: &ClassificationResult) -> Self {
        ShardPath {
            device_manufacturer: manufacturer_segment(result.device.manufacturer.as_deref()),
            device_type: category_segment(result.device.kind.as_deref()),
            client_manufacturer: manufacturer_segment(result.client.manufacturer.as_deref()),
            client_type: category_segment(result.client.kind.as_deref()),
        }
    }

    /// Rebuilds a shard from on-disk segments. The segments go through the same sanitizing as
    /// routing, so only already-routed paths round-trip unchanged.
    pub fn from_segments(segments: [&str; 4]) -> Self {
        let [device_manufacturer, device_type, client_manufacturer, client_type] = segments;
        ShardPath {
            device_manufacturer: manufacturer_segment(Some(device_manufacturer)),
            device_type: category_segment(Some(device_type)),
            client_manufacturer: manufacturer_segment(Some(client_manufacturer)),
            client_type: category_segment(Some(client_type)),
        }
    }

    pub fn segments(&self) -> [&str; 4] {
        [
            &self.device_manufacturer,
            &self.device_type,
            &self.client_manufacturer,
            &self.client_type,
        ]
    }

    pub fn to_path_buf(&self) -> PathBuf {
        self.segments().iter().collect()
    }
}

impl fmt::Display for ShardPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments().join("/"))
    }
}

fn manufacturer_segment(value: Option<&str>) -> String {
    let stripped = value.map(|v| v.replace(['.', ' '], ""));
    category_segment(stripped.as_deref())
}

fn category_segment(value: Option<&str>) -> String {
    let cleaned = value
        .unwrap_or_default()
        .trim()
        .to_lowercase()
        .replace(['/', '\\', ':'], "");

    if cleaned.is_empty() || cleaned.chars().all(|c| c == '.') {
        UNKNOWN_SEGMENT.to_string()
    } else {
        cleaned
    }
}
