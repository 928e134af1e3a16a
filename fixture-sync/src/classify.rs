//! Wraps the detector and applies the semantic-level deduplication pass.

use std::{collections::HashSet, fmt};

use tracing::{debug, warn};

use crate::{
    detector::Detector,
    error::DetectionError,
    headers::HeaderSet,
    report::{Phase, RunReporter, Stopwatch},
    result::ClassificationResult,
};

pub const CLASSIFICATION_SEPARATOR: &str = "|";

/// Device labels that say nothing about a concrete device.
pub const GENERIC_DEVICE_NAMES: &[&str] = &[
    "general Desktop",
    "general Apple Device",
    "general Mobile Device",
    "general Mobile Phone",
    "general Feature Phone",
    "general Tablet",
    "general TV",
    "general Console",
    "general Wearable",
    "Windows Desktop",
    "Linux Desktop",
];

pub const GENERIC_CLIENT_NAMES: &[&str] = &["general Browser", "general Crawler"];

/// Semantic key over the detected client/engine/os/device names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassificationKey(String);

impl ClassificationKey {
    pub fn from_result(result: &ClassificationResult) -> Self {
        let parts = [
            result.client.name.as_deref(),
            result.engine.name.as_deref(),
            result.os.name.as_deref(),
            result.device.device_name.as_deref(),
            result.device.marketing_name.as_deref(),
            result.device.manufacturer.as_deref(),
        ];
        ClassificationKey(
            parts
                .iter()
                .map(|part| part.unwrap_or_default())
                .collect::<Vec<_>>()
                .join(CLASSIFICATION_SEPARATOR),
        )
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClassificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InformationLevel {
    /// Generic device, bot, or ordinary desktop-class result
    Low,
    /// Mobile/tablet/tv with concrete client and device names
    High,
    /// Neither; bypasses semantic deduplication
    Undetermined,
}

fn is_generic_device(name: Option<&str>) -> bool {
    name.is_some_and(|name| GENERIC_DEVICE_NAMES.contains(&name))
}

fn is_concrete(name: Option<&str>, generic: &[&str]) -> bool {
    match name {
        Some(name) => {
            let trimmed = name.trim();
            !trimmed.is_empty()
                && !trimmed.eq_ignore_ascii_case("unknown")
                && !generic.contains(&trimmed)
        }
        None => false,
    }
}

pub fn information_level(result: &ClassificationResult) -> InformationLevel {
    let device_type = result.device.device_type();
    let handheld_or_tv = device_type.is_mobile() || device_type.is_tablet() || device_type.is_tv();
    let device_name = result.device.device_name.as_deref();

    if is_generic_device(device_name)
        || result.client.kind.as_deref() == Some("bot")
        || !handheld_or_tv
    {
        return InformationLevel::Low;
    }

    if is_concrete(result.client.name.as_deref(), GENERIC_CLIENT_NAMES)
        && is_concrete(device_name, GENERIC_DEVICE_NAMES)
    {
        return InformationLevel::High;
    }

    InformationLevel::Undetermined
}

#[derive(Debug)]
pub enum Classification {
    Accepted(ClassificationResult),
    Duplicate(ClassificationKey),
    Failed(DetectionError),
}

pub struct ClassifierAdapter {
    detector: Box<dyn Detector>,
    seen: HashSet<ClassificationKey>,
}

impl ClassifierAdapter {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        ClassifierAdapter {
            detector,
            seen: HashSet::new(),
        }
    }

    pub fn classify(&mut self, headers: &HeaderSet, reporter: &mut RunReporter) -> Classification {
        let watch = Stopwatch::start();
        let detected = self.detector.detect(headers);
        reporter.record(Phase::Detect, watch);

        match detected {
            Ok(result) => self.admit(result, reporter),
            Err(err) => {
                reporter.errors += 1;
                warn!(
                    user_agent = headers.user_agent().unwrap_or_default(),
                    "detection failed: {err}"
                );
                Classification::Failed(err)
            }
        }
    }

    /// Marks a result as already persisted, e.g. when resuming from intermediates.
    pub fn remember(&mut self, result: &ClassificationResult) {
        self.seen.insert(ClassificationKey::from_result(result));
    }

    fn admit(
        &mut self,
        result: ClassificationResult,
        reporter: &mut RunReporter,
    ) -> Classification {
        match information_level(&result) {
            InformationLevel::Low | InformationLevel::High => {
                let key = ClassificationKey::from_result(&result);
                if self.seen.contains(&key) {
                    reporter.duplicate();
                    debug!(key = %key, "semantic duplicate dropped");
                    return Classification::Duplicate(key);
                }
                self.seen.insert(key);
                Classification::Accepted(result)
            }
            InformationLevel::Undetermined => Classification::Accepted(result),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::{Client, Device, Engine, Os};

    struct FixedDetector(ClassificationResult);

    impl Detector for FixedDetector {
        fn detect(&self, headers: &HeaderSet) -> Result<ClassificationResult, DetectionError> {
            if headers.user_agent() == Some("broken") {
                return Err(DetectionError::NoUsableHeader);
            }
            Ok(self.0.clone())
        }
    }

    fn result(
        device_name: Option<&str>,
        device_type: &str,
        client_type: &str,
    ) -> ClassificationResult {
        ClassificationResult {
            client: Client {
                name: Some("Chrome".to_string()),
                kind: Some(client_type.to_string()),
                ..Default::default()
            },
            engine: Engine {
                name: Some("Blink".to_string()),
                ..Default::default()
            },
            os: Os {
                name: Some("Android".to_string()),
                ..Default::default()
            },
            device: Device {
                device_name: device_name.map(String::from),
                kind: Some(device_type.to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_information_levels() {
        assert_eq!(
            information_level(&result(Some("general Desktop"), "smartphone", "browser")),
            InformationLevel::Low
        );
        assert_eq!(
            information_level(&result(Some("Galaxy S9"), "smartphone", "bot")),
            InformationLevel::Low
        );
        assert_eq!(
            information_level(&result(Some("Surface"), "desktop", "browser")),
            InformationLevel::Low
        );
        assert_eq!(
            information_level(&result(Some("Galaxy S9"), "smartphone", "browser")),
            InformationLevel::High
        );
        assert_eq!(
            information_level(&result(Some("unknown"), "tv", "browser")),
            InformationLevel::Undetermined
        );
        assert_eq!(
            information_level(&result(None, "tablet", "browser")),
            InformationLevel::Undetermined
        );
    }

    #[test]
    fn test_low_information_repeats_are_suppressed() {
        let detector = FixedDetector(result(Some("general Desktop"), "desktop", "browser"));
        let mut adapter = ClassifierAdapter::new(Box::new(detector));
        let mut reporter = RunReporter::new();

        let first = adapter.classify(&HeaderSet::from_user_agent("A"), &mut reporter);
        let second = adapter.classify(&HeaderSet::from_user_agent("B"), &mut reporter);

        assert!(matches!(first, Classification::Accepted(_)));
        assert!(matches!(second, Classification::Duplicate(_)));
        assert_eq!(reporter.duplicates, 1);
    }

    #[test]
    fn test_high_information_repeats_are_suppressed() {
        let detector = FixedDetector(result(Some("Galaxy S9"), "smartphone", "browser"));
        let mut adapter = ClassifierAdapter::new(Box::new(detector));
        let mut reporter = RunReporter::new();

        adapter.classify(&HeaderSet::from_user_agent("A"), &mut reporter);
        let second = adapter.classify(&HeaderSet::from_user_agent("B"), &mut reporter);

        assert!(matches!(second, Classification::Duplicate(_)));
    }

    #[test]
    fn test_undetermined_results_bypass_semantic_dedup() {
        let detector = FixedDetector(result(None, "smartphone", "browser"));
        let mut adapter = ClassifierAdapter::new(Box::new(detector));
        let mut reporter = RunReporter::new();

        for ua in ["A", "B", "C"] {
            let outcome = adapter.classify(&HeaderSet::from_user_agent(ua), &mut reporter);
            assert!(matches!(outcome, Classification::Accepted(_)));
        }
        assert_eq!(reporter.duplicates, 0);
    }

    #[test]
    fn test_detection_failures_are_counted() {
        let detector = FixedDetector(result(None, "smartphone", "browser"));
        let mut adapter = ClassifierAdapter::new(Box::new(detector));
        let mut reporter = RunReporter::new();

        let outcome = adapter.classify(&HeaderSet::from_user_agent("broken"), &mut reporter);

        assert!(matches!(outcome, Classification::Failed(_)));
        assert_eq!(reporter.errors, 1);
    }

    #[test]
    fn test_remembered_results_count_as_seen() {
        let persisted = result(Some("general Desktop"), "desktop", "browser");
        let mut adapter = ClassifierAdapter::new(Box::new(FixedDetector(persisted.clone())));
        let mut reporter = RunReporter::new();

        adapter.remember(&persisted);
        let outcome = adapter.classify(&HeaderSet::from_user_agent("A"), &mut reporter);

        assert!(matches!(outcome, Classification::Duplicate(_)));
    }

    #[test]
    fn test_classification_key_layout() {
        let galaxy = result(Some("Galaxy S9"), "smartphone", "browser");
        let key = ClassificationKey::from_result(&galaxy);

        assert_eq!(key.as_str(), "Chrome|Blink|Android|Galaxy S9||");
    }
}
