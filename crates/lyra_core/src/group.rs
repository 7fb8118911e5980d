use crate::{KeyRegistry, MediaKey, Value};

/// One relation group's worth of attributes: a snapshot of keys that only
/// have meaning together (e.g. URL + mime + bitrate). Key order is the
/// insertion order; the first key determines the group when the snapshot is
/// handed to a multi-value operation.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GroupSnapshot {
    keys: Vec<MediaKey>,
    values: Vec<Option<Value>>,
}

impl GroupSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot declaring `keys` with no values yet.
    pub fn with_keys(keys: &[MediaKey]) -> Self {
        Self {
            keys: keys.to_vec(),
            values: vec![None; keys.len()],
        }
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
        match self.keys.iter().position(|k| *k == key) {
            Some(index) => self.values[index] = Some(value),
            None => {
                self.keys.push(key);
                self.values.push(Some(value));
            }
        }
    }

    pub fn get(&self, key: MediaKey) -> Option<&Value> {
        self.keys
            .iter()
            .position(|k| *k == key)
            .and_then(|index| self.values[index].as_ref())
    }

    /// First declared key, used to resolve the snapshot's relation group.
    pub fn first_key(&self) -> Option<MediaKey> {
        self.keys.first().copied()
    }

    pub fn keys(&self) -> &[MediaKey] {
        &self.keys
    }

    /// True when no key holds a value (declared-only keys do not count).
    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn iter(&self) -> impl Iterator<Item = (MediaKey, &Value)> {
        self.keys
            .iter()
            .zip(self.values.iter())
            .filter_map(|(key, value)| value.as_ref().map(|value| (*key, value)))
    }
}
