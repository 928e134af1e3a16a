use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    headers::HeaderSet,
    result::{Device, DeviceType},
};

// Android style model token, e.g. "; SM-G960F Build/"
static MODEL_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r";\s*([^;()]+?)\s+Build/").expect("model token pattern is valid"));

/// Refines the device record once its type is known.
pub trait DeviceParser {
    fn refine(&self, headers: &HeaderSet, device: &mut Device);
}

/// Handheld devices: pulls the model token out of the user agent, falling back to a generic label.
struct HandheldParser {
    generic_name: &'static str,
}

impl DeviceParser for HandheldParser {
    fn refine(&self, headers: &HeaderSet, device: &mut Device) {
        if device.device_name.is_some() {
            return;
        }

        let model = headers
            .user_agent()
            .and_then(|ua| MODEL_TOKEN.captures(ua))
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|model| !model.is_empty());

        device.device_name = Some(model.unwrap_or_else(|| self.generic_name.to_string()));
    }
}

/// Stationary devices that carry no model information in their headers.
struct GenericParser {
    generic_name: &'static str,
}

impl DeviceParser for GenericParser {
    fn refine(&self, _headers: &HeaderSet, device: &mut Device) {
        if device.device_name.is_none() {
            device.device_name = Some(self.generic_name.to_string());
        }
    }
}

struct PassthroughParser;

impl DeviceParser for PassthroughParser {
    fn refine(&self, _headers: &HeaderSet, _device: &mut Device) {}
}

/// Lookup table from device type to its parser, built once at startup.
pub struct DeviceRegistry {
    parsers: HashMap<DeviceType, Box<dyn DeviceParser>>,
    fallback: Box<dyn DeviceParser>,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRegistry {
    pub fn new() -> Self {
        let mut parsers: HashMap<DeviceType, Box<dyn DeviceParser>> = HashMap::new();
        let handheld = [
            (DeviceType::Smartphone, "general Mobile Phone"),
            (DeviceType::Phablet, "general Mobile Phone"),
            (DeviceType::FeaturePhone, "general Feature Phone"),
            (DeviceType::Tablet, "general Tablet"),
            (DeviceType::Wearable, "general Wearable"),
        ];
        for (device_type, generic_name) in handheld {
            parsers.insert(device_type, Box::new(HandheldParser { generic_name }));
        }

        let stationary = [
            (DeviceType::Desktop, "general Desktop"),
            (DeviceType::Tv, "general TV"),
            (DeviceType::Console, "general Console"),
        ];
        for (device_type, generic_name) in stationary {
            parsers.insert(device_type, Box::new(GenericParser { generic_name }));
        }

        DeviceRegistry {
            parsers,
            fallback: Box::new(PassthroughParser),
        }
    }

    pub fn parser_for(&self, device_type: DeviceType) -> &dyn DeviceParser {
        self.parsers
            .get(&device_type)
            .map(|parser| parser.as_ref())
            .unwrap_or(self.fallback.as_ref())
    }

    pub fn refine(&self, headers: &HeaderSet, device: &mut Device) {
        self.parser_for(device.device_type()).refine(headers, device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device_of(kind: &str) -> Device {
        Device {
            kind: Some(kind.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_handheld_model_token_is_extracted() {
        let registry = DeviceRegistry::new();
        let headers = HeaderSet::from_user_agent(
            "Mozilla/5.0 (Linux; Android 10; SM-G960F Build/QP1A.190711.020) AppleWebKit/537.36",
        );
        let mut device = device_of("smartphone");

        registry.refine(&headers, &mut device);

        assert_eq!(device.device_name.as_deref(), Some("SM-G960F"));
    }

    #[test]
    fn test_handheld_without_model_gets_generic_label() {
        let registry = DeviceRegistry::new();
        let headers = HeaderSet::from_user_agent("Mozilla/5.0 (Linux; Android 10; K)");
        let mut device = device_of("tablet");

        registry.refine(&headers, &mut device);

        assert_eq!(device.device_name.as_deref(), Some("general Tablet"));
    }

    #[test]
    fn test_detected_names_are_kept() {
        let registry = DeviceRegistry::new();
        let headers = HeaderSet::from_user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)");
        let mut device = device_of("desktop");
        device.device_name = Some("Surface Book".to_string());

        registry.refine(&headers, &mut device);

        assert_eq!(device.device_name.as_deref(), Some("Surface Book"));
    }

    #[test]
    fn test_desktop_gets_generic_label() {
        let registry = DeviceRegistry::new();
        let headers = HeaderSet::from_user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64)");
        let mut device = device_of("desktop");

        registry.refine(&headers, &mut device);

        assert_eq!(device.device_name.as_deref(), Some("general Desktop"));
    }

    #[test]
    fn test_unregistered_types_are_untouched() {
        let registry = DeviceRegistry::new();
        let headers = HeaderSet::from_user_agent("Mozilla/5.0");
        let mut device = Device::default();

        registry.refine(&headers, &mut device);

        assert_eq!(device, Device::default());
    }
}
