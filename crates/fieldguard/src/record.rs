//! Record capability.
//!
//! The engine does not own attribute storage or dirty tracking. It works
//! against the [`Record`] trait, which the host record system implements.
//! [`Model`] is a self-contained implementation backed by ordered maps.

use indexmap::{IndexMap, IndexSet};
use serde_json::{Map, Value};

/// A structured record whose fields can be guarded.
pub trait Record {
    /// Fully-qualified type name the rules are keyed by.
    fn entity_type(&self) -> &str;

    /// Name of the primary-key attribute.
    fn key_name(&self) -> &str {
        "id"
    }

    /// Current primary-key value, if any.
    fn key_value(&self) -> Option<&Value> {
        self.attribute(self.key_name())
    }

    /// Current value of `field`.
    fn attribute(&self, field: &str) -> Option<&Value>;

    /// Sets `field` to `value`.
    fn set_attribute(&mut self, field: &str, value: Value);

    /// Removes `field` from the current attributes.
    fn unset_attribute(&mut self, field: &str);

    /// Last-persisted value of `field`, if it was ever persisted.
    fn original(&self, field: &str) -> Option<&Value>;

    /// Whether `field` changed since the record was loaded or last synced.
    fn is_dirty(&self, field: &str) -> bool;

    /// All fields that changed since the record was loaded or last synced.
    fn dirty_fields(&self) -> Vec<String>;

    /// Excludes `field` from the projection without touching its value.
    fn hide(&mut self, field: &str);

    /// Whether `field` is excluded from the projection.
    fn is_hidden(&self, field: &str) -> bool;

    /// Plain key-value projection of the visible attributes.
    fn to_projection(&self) -> Map<String, Value>;
}

/// A generic attribute-map record.
///
/// Attributes keep insertion order. `original` holds the last-persisted state:
/// empty for a new record, a copy of the attributes for a retrieved one.
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    entity_type: String,
    key_name: String,
    attributes: IndexMap<String, Value>,
    original: IndexMap<String, Value>,
    hidden: IndexSet<String>,
}

impl Model {
    /// Creates an empty, never-persisted record of `entity_type`.
    #[must_use]
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_name: "id".to_string(),
            attributes: IndexMap::new(),
            original: IndexMap::new(),
            hidden: IndexSet::new(),
        }
    }

    /// Creates a never-persisted record filled with `attributes`.
    ///
    /// Every attribute counts as dirty.
    #[must_use]
    pub fn from_attributes(entity_type: impl Into<String>, attributes: Map<String, Value>) -> Self {
        let mut model = Self::new(entity_type);
        model.fill(attributes);
        model
    }

    /// Creates a record as loaded from storage: nothing is dirty.
    #[must_use]
    pub fn retrieved(entity_type: impl Into<String>, attributes: Map<String, Value>) -> Self {
        let mut model = Self::from_attributes(entity_type, attributes);
        model.sync_original();
        model
    }

    /// Overrides the primary-key attribute name.
    #[must_use]
    pub fn with_key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = key_name.into();
        self
    }

    /// Sets several attributes at once.
    pub fn fill(&mut self, attributes: Map<String, Value>) {
        self.attributes.extend(attributes);
    }

    /// Marks the current attributes as persisted.
    pub fn sync_original(&mut self) {
        self.original = self.attributes.clone();
    }

    /// All current attributes, hidden ones included.
    #[must_use]
    pub fn attributes(&self) -> &IndexMap<String, Value> {
        &self.attributes
    }

    /// Fields currently excluded from the projection.
    #[must_use]
    pub fn hidden(&self) -> &IndexSet<String> {
        &self.hidden
    }
}

impl Record for Model {
    fn entity_type(&self) -> &str {
        &self.entity_type
    }

    fn key_name(&self) -> &str {
        &self.key_name
    }

    fn attribute(&self, field: &str) -> Option<&Value> {
        self.attributes.get(field)
    }

    fn set_attribute(&mut self, field: &str, value: Value) {
        self.attributes.insert(field.to_string(), value);
    }

    fn unset_attribute(&mut self, field: &str) {
        self.attributes.shift_remove(field);
    }

    fn original(&self, field: &str) -> Option<&Value> {
        self.original.get(field)
    }

    fn is_dirty(&self, field: &str) -> bool {
        self.attributes.get(field) != self.original.get(field)
    }

    fn dirty_fields(&self) -> Vec<String> {
        let changed = self
            .attributes
            .iter()
            .filter(|(field, value)| self.original.get(field.as_str()) != Some(*value))
            .map(|(field, _)| field.clone());
        // Persisted fields that were unset since.
        let removed = self
            .original
            .keys()
            .filter(|field| !self.attributes.contains_key(field.as_str()))
            .cloned();
        changed.chain(removed).collect()
    }

    fn hide(&mut self, field: &str) {
        self.hidden.insert(field.to_string());
    }

    fn is_hidden(&self, field: &str) -> bool {
        self.hidden.contains(field)
    }

    fn to_projection(&self) -> Map<String, Value> {
        self.attributes
            .iter()
            .filter(|(field, _)| !self.hidden.contains(field.as_str()))
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attrs(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn test_new_record_is_fully_dirty() {
        let model = Model::from_attributes("User", attrs(json!({"name": "John", "age": 30})));
        assert!(model.is_dirty("name"));
        assert_eq!(model.dirty_fields(), vec!["name", "age"]);
        assert!(model.original("name").is_none());
    }

    #[test]
    fn test_retrieved_record_is_clean() {
        let mut model = Model::retrieved("User", attrs(json!({"id": 1, "name": "John"})));
        assert!(model.dirty_fields().is_empty());

        model.set_attribute("name", json!("Jane"));
        assert!(model.is_dirty("name"));
        assert!(!model.is_dirty("id"));
        assert_eq!(model.original("name"), Some(&json!("John")));

        model.set_attribute("name", json!("John"));
        assert!(!model.is_dirty("name"));
    }

    #[test]
    fn test_key_value_uses_key_name() {
        let model = Model::retrieved("User", attrs(json!({"uuid": "a-1", "id": 5})))
            .with_key_name("uuid");
        assert_eq!(model.key_name(), "uuid");
        assert_eq!(model.key_value(), Some(&json!("a-1")));
    }

    #[test]
    fn test_hidden_fields_are_not_projected() {
        let mut model =
            Model::retrieved("User", attrs(json!({"name": "John", "password": "hash"})));
        model.hide("password");

        assert!(model.is_hidden("password"));
        assert_eq!(model.attribute("password"), Some(&json!("hash")));
        assert_eq!(Value::Object(model.to_projection()), json!({"name": "John"}));
    }

    #[test]
    fn test_projection_preserves_order() {
        let model = Model::from_attributes("User", attrs(json!({"z": 1, "a": 2, "m": 3})));
        let keys: Vec<_> = model.to_projection().keys().cloned().collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }

    #[test]
    fn test_unset_attribute() {
        let mut model = Model::from_attributes("User", attrs(json!({"a": 1, "b": 2})));
        model.unset_attribute("a");
        assert!(model.attribute("a").is_none());
        assert!(!model.is_dirty("a"));
    }

    #[test]
    fn test_unset_persisted_attribute_is_listed_dirty() {
        let mut model = Model::retrieved("User", attrs(json!({"a": 1, "b": 2})));
        model.unset_attribute("a");
        model.set_attribute("b", json!(3));

        assert!(model.is_dirty("a"));
        assert_eq!(model.dirty_fields(), vec!["b", "a"]);
    }
}
