use serde::{Deserialize, Serialize};

use crate::headers::HeaderSet;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Client {
    pub name: Option<String>,
    pub version: Option<String>,
    /// Name of the rendering engine the client is built on
    pub engine: Option<String>,
    pub manufacturer: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Engine {
    pub name: Option<String>,
    pub version: Option<String>,
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Os {
    pub name: Option<String>,
    pub version: Option<String>,
    pub manufacturer: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Device {
    pub device_name: Option<String>,
    pub marketing_name: Option<String>,
    pub manufacturer: Option<String>,
    pub brand: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

impl Device {
    pub fn device_type(&self) -> DeviceType {
        self.kind
            .as_deref()
            .map(DeviceType::parse)
            .unwrap_or(DeviceType::Unknown)
    }
}

/// Structured detector output. `None` means "not detected".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassificationResult {
    pub client: Client,
    pub engine: Engine,
    pub os: Os,
    pub device: Device,
}

/// The persisted unit: a header set plus what the detector made of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub headers: HeaderSet,
    #[serde(flatten)]
    pub result: ClassificationResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Smartphone,
    FeaturePhone,
    Tablet,
    Phablet,
    Desktop,
    Tv,
    Console,
    CarBrowser,
    Wearable,
    Unknown,
}

impl DeviceType {
    pub const ALL: [DeviceType; 10] = [
        DeviceType::Smartphone,
        DeviceType::FeaturePhone,
        DeviceType::Tablet,
        DeviceType::Phablet,
        DeviceType::Desktop,
        DeviceType::Tv,
        DeviceType::Console,
        DeviceType::CarBrowser,
        DeviceType::Wearable,
        DeviceType::Unknown,
    ];

    pub fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "smartphone" | "mobile-phone" | "mobile phone" => DeviceType::Smartphone,
            "feature-phone" | "feature phone" => DeviceType::FeaturePhone,
            "tablet" => DeviceType::Tablet,
            "phablet" => DeviceType::Phablet,
            "desktop" => DeviceType::Desktop,
            "tv" | "television" | "smart-tv" => DeviceType::Tv,
            "console" => DeviceType::Console,
            "car-browser" | "car-entertainment-system" => DeviceType::CarBrowser,
            "wearable" | "smartwatch" => DeviceType::Wearable,
            _ => DeviceType::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Smartphone => "smartphone",
            DeviceType::FeaturePhone => "feature-phone",
            DeviceType::Tablet => "tablet",
            DeviceType::Phablet => "phablet",
            DeviceType::Desktop => "desktop",
            DeviceType::Tv => "tv",
            DeviceType::Console => "console",
            DeviceType::CarBrowser => "car-browser",
            DeviceType::Wearable => "wearable",
            DeviceType::Unknown => "unknown",
        }
    }

    pub fn is_mobile(&self) -> bool {
        matches!(
            self,
            DeviceType::Smartphone
                | DeviceType::FeaturePhone
                | DeviceType::Tablet
                | DeviceType::Phablet
                | DeviceType::Wearable
        )
    }

    pub fn is_tablet(&self) -> bool {
        matches!(self, DeviceType::Tablet)
    }

    pub fn is_tv(&self) -> bool {
        matches!(self, DeviceType::Tv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_serializes_flat() {
        let entry = Entry {
            headers: HeaderSet::from_user_agent("UA"),
            result: ClassificationResult {
                device: Device {
                    device_name: Some("Galaxy S9".to_string()),
                    kind: Some("smartphone".to_string()),
                    ..Default::default()
                },
                ..Default::default()
            },
        };

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["headers"], json!({"user-agent": "UA"}));
        assert_eq!(value["device"]["deviceName"], json!("Galaxy S9"));
        assert_eq!(value["device"]["type"], json!("smartphone"));
        assert_eq!(value["client"]["name"], json!(null));

        let parsed: Entry = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, entry);
    }

    #[test]
    fn test_missing_records_default_to_empty() {
        let entry: Entry =
            serde_json::from_value(json!({"headers": {"user-agent": "UA"}})).unwrap();

        assert_eq!(entry.result, ClassificationResult::default());
    }

    #[test]
    fn test_device_type_parsing() {
        for device_type in DeviceType::ALL {
            assert_eq!(DeviceType::parse(device_type.as_str()), device_type);
        }
        assert_eq!(DeviceType::parse("Mobile Phone"), DeviceType::Smartphone);
        assert_eq!(DeviceType::parse("fridge"), DeviceType::Unknown);
    }

    #[test]
    fn test_capability_flags() {
        assert!(DeviceType::Smartphone.is_mobile());
        assert!(DeviceType::Tablet.is_tablet());
        assert!(DeviceType::Tv.is_tv());
        assert!(!DeviceType::Desktop.is_mobile());
        assert!(!DeviceType::Console.is_tv());
    }
}
