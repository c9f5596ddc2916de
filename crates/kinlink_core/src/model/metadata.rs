//! Ordered metadata block with typed accessors.
//!
//! # Responsibility
//! - Hold a document's frontmatter fields in source order.
//! - Offer typed reads so callers never interpret raw YAML values ad hoc.
//!
//! # Invariants
//! - Key order is preserved across read/modify/write.
//! - Replacing an existing key keeps its position; new keys are appended.

use indexmap::IndexMap;
use serde_yaml::Value;

/// Claimed contact UID field.
pub const FIELD_UID: &str = "UID";
/// Display name field.
pub const FIELD_DISPLAY_NAME: &str = "FN";
/// Gender field (`M|F|NB|U`).
pub const FIELD_GENDER: &str = "GENDER";
/// Prefix shared by every keyed-encoding relationship field.
pub const RELATED_PREFIX: &str = "RELATED";

/// Parsed metadata block of one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    fields: IndexMap<String, Value>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Returns a string field verbatim.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    /// Returns scalar fields as text (`UID: 42` reads as `"42"`).
    pub fn get_text(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(value) => Some(value.clone()),
            Value::Number(value) => Some(value.to_string()),
            Value::Bool(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.insert(key.into(), value)
    }

    pub fn insert_str(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<Value> {
        self.insert(key, Value::String(value.into()))
    }

    /// Removes a field, keeping the relative order of the others.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Keys owned by the keyed relationship encoding, in source order.
    pub fn related_keys(&self) -> Vec<String> {
        self.keys()
            .filter(|key| is_related_key(key))
            .map(str::to_string)
            .collect()
    }

    /// Keyed-encoding fields as `(key, value)` pairs, in source order.
    pub fn related_fields(&self) -> Vec<(String, Value)> {
        self.iter()
            .filter(|(key, _)| is_related_key(key))
            .map(|(key, value)| (key.to_string(), value.clone()))
            .collect()
    }
}

impl FromIterator<(String, Value)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Whether a field belongs to the keyed relationship encoding.
///
/// Matches `RELATED`, `RELATED[...]` and the dotted `RELATED.<...>` shape,
/// but not unrelated fields that merely share the prefix (`RELATEDNESS`).
pub fn is_related_key(key: &str) -> bool {
    match key.strip_prefix(RELATED_PREFIX) {
        Some(rest) => rest.is_empty() || rest.starts_with('[') || rest.starts_with('.'),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{is_related_key, Metadata};
    use serde_yaml::Value;

    #[test]
    fn insert_keeps_position_of_existing_keys() {
        let mut metadata = Metadata::new();
        metadata.insert_str("FN", "Jane");
        metadata.insert_str("UID", "a");
        metadata.insert_str("FN", "Janet");

        let keys: Vec<&str> = metadata.keys().collect();
        assert_eq!(keys, vec!["FN", "UID"]);
        assert_eq!(metadata.get_str("FN"), Some("Janet"));
    }

    #[test]
    fn get_text_reads_scalars() {
        let mut metadata = Metadata::new();
        metadata.insert("UID", Value::Number(42.into()));
        assert_eq!(metadata.get_text("UID").as_deref(), Some("42"));
        assert_eq!(metadata.get_str("UID"), None);
    }

    #[test]
    fn related_key_detection_requires_delimiter() {
        assert!(is_related_key("RELATED"));
        assert!(is_related_key("RELATED[spouse]"));
        assert!(is_related_key("RELATED[1:friend]"));
        assert!(is_related_key("RELATED.friend"));
        assert!(!is_related_key("RELATEDNESS"));
        assert!(!is_related_key("related[spouse]"));
    }
}
