use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

pub const USER_AGENT: &str = "user-agent";
pub const HTTP_PREFIX: &str = "http-";

/// Ordered header name -> value mapping identifying one request.
///
/// Names are lower-cased with `_` mapped to `-`, values have whitespace runs collapsed, and empty
/// names or values are dropped on insert. Insertion order is preserved and is significant: it is
/// part of the identity key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSet {
    headers: Vec<(String, String)>,
}

impl HeaderSet {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut set = HeaderSet::default();
        for (name, value) in pairs {
            set.insert(name.as_ref(), value.as_ref());
        }
        set
    }

    pub fn from_user_agent(user_agent: &str) -> Self {
        Self::from_pairs([(USER_AGENT, user_agent)])
    }

    /// Inserts a header. A repeated name replaces the earlier value but keeps its position.
    pub fn insert(&mut self, name: &str, value: &str) {
        let name = normalize_name(name);
        let value = normalize_value(value);
        if name.is_empty() || value.is_empty() {
            return;
        }

        match self.headers.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.headers.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.get(USER_AGENT)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// Every `(canonical, http-prefixed)` name pair where both variants of a header are present.
    pub fn conflicting_variants(&self) -> Vec<(&str, &str)> {
        self.headers
            .iter()
            .filter_map(|(name, _)| {
                let canonical = name.strip_prefix(HTTP_PREFIX)?;
                self.get(canonical).map(|_| (canonical, name.as_str()))
            })
            .collect()
    }
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase().replace('_', "-")
}

fn normalize_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

impl Serialize for HeaderSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len()))?;
        for (name, value) in &self.headers {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderSetVisitor;

        impl<'de> Visitor<'de> for HeaderSetVisitor {
            type Value = HeaderSet;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HeaderSet, A::Error> {
                let mut set = HeaderSet::default();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    set.insert(&name, &value);
                }
                Ok(set)
            }
        }

        deserializer.deserialize_map(HeaderSetVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_and_values_are_normalized() {
        let set = HeaderSet::from_pairs([
            ("  User-Agent ", "Mozilla/5.0   (X11;\tLinux)  "),
            ("HTTP_X_REQUESTED_WITH", "com.example.app"),
        ]);

        assert_eq!(set.user_agent(), Some("Mozilla/5.0 (X11; Linux)"));
        assert_eq!(set.get("http-x-requested-with"), Some("com.example.app"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_values_are_dropped() {
        let set = HeaderSet::from_pairs([("user-agent", "   "), ("", "value"), ("accept", "*/*")]);

        assert_eq!(set.len(), 1);
        assert_eq!(set.get("accept"), Some("*/*"));
    }

    #[test]
    fn test_repeated_name_keeps_position() {
        let set = HeaderSet::from_pairs([("a", "1"), ("b", "2"), ("A", "3")]);

        let pairs: Vec<_> = set.iter().collect();
        assert_eq!(pairs, vec![("a", "3"), ("b", "2")]);
    }

    #[test]
    fn test_conflicting_variants_are_reported() {
        let set = HeaderSet::from_pairs([
            ("x-requested-with", "com.example"),
            ("http-x-requested-with", "com.example"),
            ("http-accept", "*/*"),
        ]);

        assert_eq!(
            set.conflicting_variants(),
            vec![("x-requested-with", "http-x-requested-with")]
        );
    }

    #[test]
    fn test_json_keeps_header_order() {
        let set = HeaderSet::from_pairs([("user-agent", "UA"), ("accept-language", "de")]);

        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"{"user-agent":"UA","accept-language":"de"}"#);

        let parsed: HeaderSet = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, set);
    }
}
