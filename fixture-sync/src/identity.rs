use std::fmt;

use crate::headers::HeaderSet;

/// Separates a header name from its value inside the key.
pub const ROW_SEPARATOR: &str = "::";
/// Separates consecutive headers inside the key.
pub const HEADER_SEPARATOR: &str = "-#-";

/// Exact-match deduplication key for raw input.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Builds the identity key in the header set's iteration order. Filtering empty sets is the
/// caller's job; an empty set yields an empty key.
pub fn build_key(headers: &HeaderSet) -> IdentityKey {
    let key = headers
        .iter()
        .map(|(name, value)| format!("{name}{ROW_SEPARATOR}{value}"))
        .collect::<Vec<_>>()
        .join(HEADER_SEPARATOR);
    IdentityKey(key)
}
