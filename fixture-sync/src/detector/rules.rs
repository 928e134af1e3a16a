//! Configuration-driven detector.
//!
//! Rules live in a YAML file with four ordered sections (`clients`, `engines`, `platforms`,
//! `devices`). Within a section the first rule whose pattern matches its header fills the record;
//! values may reference named capture groups, e.g. `version: $version`.

use std::{
    collections::BTreeMap,
    fs,
    path::{Path, PathBuf},
};

use regex::Regex;
use serde::Deserialize;
use tracing::info;

use crate::{
    detector::{devices::DeviceRegistry, Detector},
    error::{DetectionError, RuleLoadError},
    headers::{HeaderSet, USER_AGENT},
    result::{ClassificationResult, Client, Device, Engine, Os},
};

pub const EMBEDDED_RULES: &str = include_str!("../../rules/default.yaml");

#[derive(Debug, Deserialize)]
struct RuleFile {
    #[serde(default)]
    clients: Vec<RawRule>,
    #[serde(default)]
    engines: Vec<RawRule>,
    #[serde(default)]
    platforms: Vec<RawRule>,
    #[serde(default)]
    devices: Vec<RawRule>,
}

#[derive(Debug, Deserialize)]
struct RawRule {
    pattern: String,
    header: Option<String>,
    set: BTreeMap<String, String>,
}

#[derive(Debug)]
struct Rule {
    header: String,
    pattern: Regex,
    set: Vec<(String, String)>,
}

/// Records a rule section can fill, field by field.
trait RuleTarget {
    const FIELDS: &'static [&'static str];

    fn assign(&mut self, field: &str, value: String);
}

impl RuleTarget for Client {
    const FIELDS: &'static [&'static str] = &["name", "version", "engine", "manufacturer", "type"];

    fn assign(&mut self, field: &str, value: String) {
        match field {
            "name" => self.name = Some(value),
            "version" => self.version = Some(value),
            "engine" => self.engine = Some(value),
            "manufacturer" => self.manufacturer = Some(value),
            "type" => self.kind = Some(value),
            _ => {}
        }
    }
}

impl RuleTarget for Engine {
    const FIELDS: &'static [&'static str] = &["name", "version", "manufacturer"];

    fn assign(&mut self, field: &str, value: String) {
        match field {
            "name" => self.name = Some(value),
            "version" => self.version = Some(value),
            "manufacturer" => self.manufacturer = Some(value),
            _ => {}
        }
    }
}

impl RuleTarget for Os {
    const FIELDS: &'static [&'static str] = &["name", "version", "manufacturer"];

    fn assign(&mut self, field: &str, value: String) {
        match field {
            "name" => self.name = Some(value),
            "version" => self.version = Some(value),
            "manufacturer" => self.manufacturer = Some(value),
            _ => {}
        }
    }
}

impl RuleTarget for Device {
    const FIELDS: &'static [&'static str] = &[
        "deviceName",
        "marketingName",
        "manufacturer",
        "brand",
        "type",
    ];

    fn assign(&mut self, field: &str, value: String) {
        match field {
            "deviceName" => self.device_name = Some(value),
            "marketingName" => self.marketing_name = Some(value),
            "manufacturer" => self.manufacturer = Some(value),
            "brand" => self.brand = Some(value),
            "type" => self.kind = Some(value),
            _ => {}
        }
    }
}

/// Compiled rule sections.
#[derive(Debug)]
pub struct RuleSet {
    clients: Vec<Rule>,
    engines: Vec<Rule>,
    platforms: Vec<Rule>,
    devices: Vec<Rule>,
    inspected: Vec<String>,
}

impl RuleSet {
    pub fn parse(text: &str, origin: &str) -> Result<Self, RuleLoadError> {
        let file: RuleFile =
            serde_yaml::from_str(text).map_err(|source| RuleLoadError::Parse {
                origin: origin.to_string(),
                source,
            })?;

        let clients = compile::<Client>("clients", file.clients)?;
        let engines = compile::<Engine>("engines", file.engines)?;
        let platforms = compile::<Os>("platforms", file.platforms)?;
        let devices = compile::<Device>("devices", file.devices)?;

        let mut inspected: Vec<String> = Vec::new();
        for rule in clients.iter().chain(&engines).chain(&platforms).chain(&devices) {
            if !inspected.contains(&rule.header) {
                inspected.push(rule.header.clone());
            }
        }

        Ok(RuleSet {
            clients,
            engines,
            platforms,
            devices,
            inspected,
        })
    }

    pub fn len(&self) -> usize {
        self.clients.len() + self.engines.len() + self.platforms.len() + self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Header names at least one rule looks at.
    pub fn inspected_headers(&self) -> &[String] {
        &self.inspected
    }
}

fn compile<T: RuleTarget>(
    section: &'static str,
    raw: Vec<RawRule>,
) -> Result<Vec<Rule>, RuleLoadError> {
    raw.into_iter()
        .enumerate()
        .map(|(index, rule)| {
            if let Some(field) = rule.set.keys().find(|f| !T::FIELDS.contains(&f.as_str())) {
                return Err(RuleLoadError::UnknownField {
                    section,
                    index,
                    field: field.clone(),
                });
            }
            let pattern = Regex::new(&rule.pattern).map_err(|source| RuleLoadError::Pattern {
                section,
                index,
                source,
            })?;
            let header = rule
                .header
                .map(|h| h.trim().to_lowercase().replace('_', "-"))
                .unwrap_or_else(|| USER_AGENT.to_string());

            Ok(Rule {
                header,
                pattern,
                set: rule.set.into_iter().collect(),
            })
        })
        .collect()
}

fn apply_first<T: RuleTarget>(rules: &[Rule], headers: &HeaderSet, target: &mut T) {
    for rule in rules {
        let Some(value) = headers.get(&rule.header) else {
            continue;
        };
        let Some(caps) = rule.pattern.captures(value) else {
            continue;
        };

        for (field, template) in &rule.set {
            let mut expanded = String::new();
            caps.expand(template, &mut expanded);
            let expanded = expanded.trim();
            if !expanded.is_empty() {
                target.assign(field, expanded.to_string());
            }
        }
        return;
    }
}

pub enum RuleSource {
    Embedded,
    File(PathBuf),
}

/// Loads a [`RuleSet`] once per run. Constructed explicitly and handed to the detector.
pub struct RuleLoader {
    source: RuleSource,
}

impl RuleLoader {
    pub fn embedded() -> Self {
        RuleLoader {
            source: RuleSource::Embedded,
        }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Self {
        RuleLoader {
            source: RuleSource::File(path.as_ref().to_path_buf()),
        }
    }

    pub fn load(&self) -> Result<RuleSet, RuleLoadError> {
        let rules = match &self.source {
            RuleSource::Embedded => RuleSet::parse(EMBEDDED_RULES, "<embedded>")?,
            RuleSource::File(path) => {
                let text = fs::read_to_string(path).map_err(|source| RuleLoadError::Read {
                    path: path.clone(),
                    source,
                })?;
                RuleSet::parse(&text, &path.display().to_string())?
            }
        };
        info!("loaded {} detection rules", rules.len());
        Ok(rules)
    }
}

pub struct RuleDetector {
    rules: RuleSet,
    devices: DeviceRegistry,
}

impl RuleDetector {
    pub fn new(rules: RuleSet, devices: DeviceRegistry) -> Self {
        RuleDetector { rules, devices }
    }
}

impl Detector for RuleDetector {
    fn detect(&self, headers: &HeaderSet) -> Result<ClassificationResult, DetectionError> {
        if headers.is_empty() {
            return Err(DetectionError::EmptyHeaders);
        }
        if let Some((name, _)) = headers
            .iter()
            .find(|(_, value)| value.chars().any(char::is_control))
        {
            return Err(DetectionError::MalformedHeader {
                name: name.to_string(),
            });
        }
        if !self
            .rules
            .inspected_headers()
            .iter()
            .any(|name| headers.get(name).is_some())
        {
            return Err(DetectionError::NoUsableHeader);
        }

        let mut result = ClassificationResult::default();
        apply_first(&self.rules.clients, headers, &mut result.client);
        apply_first(&self.rules.engines, headers, &mut result.engine);
        // a client rule may name its engine explicitly
        if result.client.name.is_some() && result.client.engine.is_none() {
            result.client.engine.clone_from(&result.engine.name);
        }
        apply_first(&self.rules.platforms, headers, &mut result.os);
        apply_first(&self.rules.devices, headers, &mut result.device);
        self.devices.refine(headers, &mut result.device);

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RULES: &str = r#"
clients:
  - pattern: 'SamsungBrowser/(?P<version>[\d.]+)'
    set: { name: Samsung Internet, version: $version, manufacturer: Samsung, type: browser }
  - pattern: 'Chrome/(?P<version>[\d.]+)'
    set: { name: Chrome, version: $version, manufacturer: Google, type: browser }
engines:
  - pattern: 'Chrome/'
    set: { name: Blink, manufacturer: Google }
platforms:
  - header: sec-ch-ua-platform
    pattern: '"?(?P<name>Android)"?'
    set: { name: $name, manufacturer: Google }
  - pattern: 'Android (?P<version>[\d.]+)'
    set: { name: Android, version: $version, manufacturer: Google }
devices:
  - pattern: 'SM-G\w+'
    set: { manufacturer: Samsung, brand: Samsung, type: smartphone }
"#;

    fn detector() -> RuleDetector {
        RuleDetector::new(RuleSet::parse(RULES, "test").unwrap(), DeviceRegistry::new())
    }

    #[test]
    fn test_first_matching_rule_fills_each_record() {
        let headers = HeaderSet::from_user_agent(
            "Mozilla/5.0 (Linux; Android 10; SM-G960F Build/QP1A) Chrome/83.0.4103.106 Mobile",
        );

        let result = detector().detect(&headers).unwrap();

        assert_eq!(result.client.name.as_deref(), Some("Chrome"));
        assert_eq!(result.client.version.as_deref(), Some("83.0.4103.106"));
        assert_eq!(result.client.manufacturer.as_deref(), Some("Google"));
        assert_eq!(result.engine.name.as_deref(), Some("Blink"));
        assert_eq!(result.client.engine.as_deref(), Some("Blink"));
        assert_eq!(result.os.version.as_deref(), Some("10"));
        assert_eq!(result.device.manufacturer.as_deref(), Some("Samsung"));
        assert_eq!(result.device.device_name.as_deref(), Some("SM-G960F"));
    }

    #[test]
    fn test_rules_can_inspect_other_headers() {
        let headers = HeaderSet::from_pairs([("sec-ch-ua-platform", "\"Android\"")]);

        let result = detector().detect(&headers).unwrap();

        assert_eq!(result.os.name.as_deref(), Some("Android"));
        assert_eq!(result.os.version, None);
        assert_eq!(result.client, Client::default());
    }

    #[test]
    fn test_client_rule_can_name_its_engine() {
        let rules = RuleSet::parse(
            r#"
clients:
  - pattern: 'Firefox/'
    set: { name: Firefox, engine: Gecko, type: browser }
engines:
  - pattern: 'Firefox/'
    set: { name: Servo }
"#,
            "test",
        )
        .unwrap();
        let detector = RuleDetector::new(rules, DeviceRegistry::new());
        let headers = HeaderSet::from_user_agent("Mozilla/5.0 (X11; Linux x86_64) Firefox/126.0");

        let result = detector.detect(&headers).unwrap();

        assert_eq!(result.client.engine.as_deref(), Some("Gecko"));
        assert_eq!(result.engine.name.as_deref(), Some("Servo"));
    }

    #[test]
    fn test_malformed_input_is_rejected() {
        let detector = detector();

        assert!(matches!(
            detector.detect(&HeaderSet::default()),
            Err(DetectionError::EmptyHeaders)
        ));
        assert!(matches!(
            detector.detect(&HeaderSet::from_pairs([("accept", "*/*")])),
            Err(DetectionError::NoUsableHeader)
        ));
        assert!(matches!(
            detector.detect(&HeaderSet::from_user_agent("Mozilla/5.0 \u{7}")),
            Err(DetectionError::MalformedHeader { .. })
        ));
    }

    #[test]
    fn test_unknown_fields_fail_to_load() {
        let text = "clients:\n  - pattern: 'x'\n    set: { colour: red }\n";

        let err = RuleSet::parse(text, "test").unwrap_err();

        assert!(matches!(
            err,
            RuleLoadError::UnknownField { section: "clients", index: 0, .. }
        ));
    }

    #[test]
    fn test_invalid_patterns_fail_to_load() {
        let text = "devices:\n  - pattern: '(unclosed'\n    set: { type: tv }\n";

        let err = RuleSet::parse(text, "test").unwrap_err();

        assert!(matches!(err, RuleLoadError::Pattern { section: "devices", .. }));
    }

    #[test]
    fn test_embedded_rules_load() {
        let rules = RuleLoader::embedded().load().unwrap();

        assert!(!rules.is_empty());
        assert!(rules.inspected_headers().iter().any(|h| h == USER_AGENT));
    }
}
