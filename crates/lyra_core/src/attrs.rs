use std::collections::HashMap;

use crate::{KeyRegistry, MediaKey, Value};

/// Typed key/value dictionary backing a record. A write whose runtime type
/// does not match the key's declared type is rejected and logged, leaving
/// the prior value (or absence) intact.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AttributeStore {
    values: HashMap<MediaKey, Value>,
}

impl AttributeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, registry: &KeyRegistry, key: MediaKey, value: Value) {
        let Some(declared) = registry.declared_type(key) else {
            log::warn!("ignoring write to unregistered key {key:?}");
            return;
        };
        if value.value_type() != declared {
            log::warn!(
                "type mismatch for key '{}': declared {declared:?}, got {:?}",
                registry.name(key).unwrap_or("?"),
                value.value_type()
            );
            return;
        }
        self.values.insert(key, value);
    }

    pub fn get(&self, key: MediaKey) -> Option<&Value> {
        self.values.get(&key)
    }

    pub fn remove(&mut self, key: MediaKey) -> Option<Value> {
        self.values.remove(&key)
    }

    pub fn contains(&self, key: MediaKey) -> bool {
        self.values.contains_key(&key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (MediaKey, &Value)> {
        self.values.iter().map(|(key, value)| (*key, value))
    }
}

#[cfg(test)]
mod tests {
    use super::AttributeStore;
    use crate::{KeyRegistry, MediaKey, Value};

    #[test]
    fn set_and_get_roundtrip() {
        let registry = KeyRegistry::with_defaults();
        let mut attrs = AttributeStore::new();
        attrs.set(&registry, MediaKey::TITLE, Value::from("Aria"));
        attrs.set(&registry, MediaKey::BITRATE, Value::from(192i64));
        assert_eq!(attrs.get(MediaKey::TITLE).and_then(Value::as_str), Some("Aria"));
        assert_eq!(attrs.get(MediaKey::BITRATE).and_then(Value::as_int), Some(192));
        assert_eq!(attrs.len(), 2);
    }

    #[test]
    fn type_mismatch_keeps_prior_value() {
        let registry = KeyRegistry::with_defaults();
        let mut attrs = AttributeStore::new();
        attrs.set(&registry, MediaKey::BITRATE, Value::from(192i64));
        attrs.set(&registry, MediaKey::BITRATE, Value::from("fast"));
        assert_eq!(attrs.get(MediaKey::BITRATE).and_then(Value::as_int), Some(192));
    }

    #[test]
    fn type_mismatch_on_absent_key_stays_absent() {
        let registry = KeyRegistry::with_defaults();
        let mut attrs = AttributeStore::new();
        attrs.set(&registry, MediaKey::RATING, Value::from("five"));
        assert!(attrs.get(MediaKey::RATING).is_none());
    }

    #[test]
    fn unregistered_key_is_ignored() {
        let registry = KeyRegistry::with_defaults();
        let mut attrs = AttributeStore::new();
        attrs.set(&registry, MediaKey(999), Value::from("x"));
        assert!(attrs.is_empty());
    }
}
