use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{LyraError, LyraResult, ValueType};

/// Identifier of a registered metadata key.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MediaKey(pub u16);

impl MediaKey {
    pub const ID: MediaKey = MediaKey(1);
    pub const SOURCE: MediaKey = MediaKey(2);
    pub const TITLE: MediaKey = MediaKey(3);
    pub const URL: MediaKey = MediaKey(4);
    pub const ARTIST: MediaKey = MediaKey(5);
    pub const ALBUM: MediaKey = MediaKey(6);
    pub const GENRE: MediaKey = MediaKey(7);
    pub const THUMBNAIL: MediaKey = MediaKey(8);
    pub const AUTHOR: MediaKey = MediaKey(9);
    pub const DESCRIPTION: MediaKey = MediaKey(10);
    pub const LYRICS: MediaKey = MediaKey(11);
    pub const SITE: MediaKey = MediaKey(12);
    pub const DATE: MediaKey = MediaKey(13);
    pub const MIME: MediaKey = MediaKey(14);
    pub const LAST_PLAYED: MediaKey = MediaKey(15);
    pub const DURATION: MediaKey = MediaKey(16);
    pub const CHILDCOUNT: MediaKey = MediaKey(17);
    pub const WIDTH: MediaKey = MediaKey(18);
    pub const HEIGHT: MediaKey = MediaKey(19);
    pub const BITRATE: MediaKey = MediaKey(20);
    pub const PLAY_COUNT: MediaKey = MediaKey(21);
    pub const LAST_POSITION: MediaKey = MediaKey(22);
    pub const FRAMERATE: MediaKey = MediaKey(23);
    pub const RATING: MediaKey = MediaKey(24);
}

#[derive(Clone, Debug)]
struct KeyDef {
    name: String,
    value_type: ValueType,
}

/// Registry of metadata keys: declared type, wire name, and the relation
/// group each key belongs to. Every registered key resolves to a group;
/// a key with no declared relations forms a singleton group.
#[derive(Clone, Debug, Default)]
pub struct KeyRegistry {
    defs: HashMap<MediaKey, KeyDef>,
    by_name: HashMap<String, MediaKey>,
    groups: HashMap<MediaKey, Vec<MediaKey>>,
    order: Vec<MediaKey>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the well-known media keys and the
    /// URL/mime/bitrate relation group.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        let defaults: &[(MediaKey, &str, ValueType)] = &[
            (MediaKey::ID, "id", ValueType::Str),
            (MediaKey::SOURCE, "source", ValueType::Str),
            (MediaKey::TITLE, "title", ValueType::Str),
            (MediaKey::URL, "url", ValueType::Str),
            (MediaKey::ARTIST, "artist", ValueType::Str),
            (MediaKey::ALBUM, "album", ValueType::Str),
            (MediaKey::GENRE, "genre", ValueType::Str),
            (MediaKey::THUMBNAIL, "thumbnail", ValueType::Str),
            (MediaKey::AUTHOR, "author", ValueType::Str),
            (MediaKey::DESCRIPTION, "description", ValueType::Str),
            (MediaKey::LYRICS, "lyrics", ValueType::Str),
            (MediaKey::SITE, "site", ValueType::Str),
            (MediaKey::DATE, "date", ValueType::Str),
            (MediaKey::MIME, "mime", ValueType::Str),
            (MediaKey::LAST_PLAYED, "last_played", ValueType::Str),
            (MediaKey::DURATION, "duration", ValueType::Int),
            (MediaKey::CHILDCOUNT, "childcount", ValueType::Int),
            (MediaKey::WIDTH, "width", ValueType::Int),
            (MediaKey::HEIGHT, "height", ValueType::Int),
            (MediaKey::BITRATE, "bitrate", ValueType::Int),
            (MediaKey::PLAY_COUNT, "play_count", ValueType::Int),
            (MediaKey::LAST_POSITION, "last_position", ValueType::Int),
            (MediaKey::FRAMERATE, "framerate", ValueType::Float),
            (MediaKey::RATING, "rating", ValueType::Float),
        ];
        for (key, name, value_type) in defaults {
            registry
                .register(*key, name, *value_type)
                .expect("default keys are unique");
        }
        registry
            .register_relation(&[MediaKey::URL, MediaKey::MIME, MediaKey::BITRATE])
            .expect("default relation keys are registered");
        registry
    }

    pub fn register(
        &mut self,
        key: MediaKey,
        name: &str,
        value_type: ValueType,
    ) -> LyraResult<()> {
        if self.defs.contains_key(&key) {
            return Err(LyraError::validation(format!(
                "key {key:?} is already registered"
            )));
        }
        if self.by_name.contains_key(name) {
            return Err(LyraError::validation(format!(
                "key name '{name}' is already registered"
            )));
        }
        self.defs.insert(
            key,
            KeyDef {
                name: name.to_string(),
                value_type,
            },
        );
        self.by_name.insert(name.to_string(), key);
        self.groups.insert(key, vec![key]);
        self.order.push(key);
        Ok(())
    }

    /// Declares that `keys` travel together as one relation group, in the
    /// given order. The first key is the group's representative.
    pub fn register_relation(&mut self, keys: &[MediaKey]) -> LyraResult<()> {
        if keys.is_empty() {
            return Err(LyraError::validation("relation group cannot be empty"));
        }
        for key in keys {
            if !self.defs.contains_key(key) {
                return Err(LyraError::validation(format!(
                    "relation group member {key:?} is not registered"
                )));
            }
        }
        for key in keys {
            self.groups.insert(*key, keys.to_vec());
        }
        Ok(())
    }

    pub fn name(&self, key: MediaKey) -> Option<&str> {
        self.defs.get(&key).map(|def| def.name.as_str())
    }

    pub fn declared_type(&self, key: MediaKey) -> Option<ValueType> {
        self.defs.get(&key).map(|def| def.value_type)
    }

    pub fn key_by_name(&self, name: &str) -> Option<MediaKey> {
        self.by_name.get(name).copied()
    }

    /// The ordered relation group `key` belongs to. Total for registered
    /// keys; `None` means the key was never registered (a caller error).
    pub fn related_keys(&self, key: MediaKey) -> Option<&[MediaKey]> {
        self.groups.get(&key).map(Vec::as_slice)
    }

    /// The group representative for `key`, i.e. the first key of its group.
    pub fn representative(&self, key: MediaKey) -> Option<MediaKey> {
        self.related_keys(key).and_then(|group| group.first().copied())
    }

    /// Registered keys in registration order.
    pub fn keys(&self) -> &[MediaKey] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::{KeyRegistry, MediaKey};
    use crate::ValueType;

    #[test]
    fn defaults_cover_well_known_keys() {
        let registry = KeyRegistry::with_defaults();
        assert_eq!(registry.name(MediaKey::TITLE), Some("title"));
        assert_eq!(registry.declared_type(MediaKey::BITRATE), Some(ValueType::Int));
        assert_eq!(
            registry.declared_type(MediaKey::FRAMERATE),
            Some(ValueType::Float)
        );
        assert_eq!(registry.key_by_name("artist"), Some(MediaKey::ARTIST));
        assert_eq!(registry.key_by_name("no-such-key"), None);
    }

    #[test]
    fn relation_lookup_is_total_for_registered_keys() {
        let registry = KeyRegistry::with_defaults();
        let group = registry.related_keys(MediaKey::MIME).expect("group");
        assert_eq!(group, &[MediaKey::URL, MediaKey::MIME, MediaKey::BITRATE]);
        assert_eq!(registry.representative(MediaKey::BITRATE), Some(MediaKey::URL));
        // Keys without declared relations form singleton groups.
        assert_eq!(
            registry.related_keys(MediaKey::TITLE).expect("group"),
            &[MediaKey::TITLE]
        );
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut registry = KeyRegistry::with_defaults();
        assert!(registry
            .register(MediaKey::TITLE, "title2", ValueType::Str)
            .is_err());
        assert!(registry
            .register(MediaKey(100), "title", ValueType::Str)
            .is_err());
        assert!(registry
            .register(MediaKey(100), "year", ValueType::Int)
            .is_ok());
    }

    #[test]
    fn relation_members_must_be_registered() {
        let mut registry = KeyRegistry::with_defaults();
        assert!(registry
            .register_relation(&[MediaKey::TITLE, MediaKey(200)])
            .is_err());
        assert!(registry.register_relation(&[]).is_err());
    }
}
