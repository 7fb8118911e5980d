use std::collections::HashMap;
use std::sync::Arc;

use crate::{AttributeStore, GroupSnapshot, KeyRegistry, MediaKey, Value};

const RATING_MAX: f64 = 5.0;

/// Closed set of record subtypes. Each kind maps to a scheme token used by
/// the codec.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum MediaKind {
    Generic,
    Audio,
    Video,
    Image,
    Container,
}

const KIND_SCHEMES: &[(MediaKind, &str)] = &[
    (MediaKind::Generic, "lyra"),
    (MediaKind::Audio, "lyraaudio"),
    (MediaKind::Video, "lyravideo"),
    (MediaKind::Image, "lyraimage"),
    (MediaKind::Container, "lyracontainer"),
];

impl MediaKind {
    pub fn scheme(self) -> &'static str {
        KIND_SCHEMES
            .iter()
            .find(|(kind, _)| *kind == self)
            .map(|(_, scheme)| *scheme)
            .expect("every kind has a scheme")
    }

    pub fn from_scheme(scheme: &str) -> Option<Self> {
        let lowered = scheme.to_ascii_lowercase();
        KIND_SCHEMES
            .iter()
            .find(|(_, candidate)| *candidate == lowered)
            .map(|(kind, _)| *kind)
    }
}

/// A multimedia metadata record: subtype, typed attributes, and a
/// multi-value overlay for repeated relation groups.
#[derive(Clone, Debug)]
pub struct Media {
    kind: MediaKind,
    registry: Arc<KeyRegistry>,
    pub(crate) attrs: AttributeStore,
    pub(crate) extended: HashMap<MediaKey, Vec<GroupSnapshot>>,
}

impl Media {
    pub fn new(kind: MediaKind, registry: Arc<KeyRegistry>) -> Self {
        Self {
            kind,
            registry,
            attrs: AttributeStore::new(),
            extended: HashMap::new(),
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn registry(&self) -> &Arc<KeyRegistry> {
        &self.registry
    }

    pub fn set(&mut self, key: MediaKey, value: Value) {
        self.attrs.set(&self.registry, key, value);
    }

    pub fn get(&self, key: MediaKey) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn remove(&mut self, key: MediaKey) -> Option<Value> {
        self.attrs.remove(key)
    }

    pub fn get_string(&self, key: MediaKey) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_int(&self, key: MediaKey) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    pub fn get_float(&self, key: MediaKey) -> Option<f64> {
        self.get(key).and_then(Value::as_float)
    }

    pub fn attrs(&self) -> &AttributeStore {
        &self.attrs
    }

    // Identity.

    pub fn id(&self) -> Option<&str> {
        self.get_string(MediaKey::ID)
    }

    pub fn set_id(&mut self, id: &str) {
        self.set(MediaKey::ID, Value::from(id));
    }

    pub fn source(&self) -> Option<&str> {
        self.get_string(MediaKey::SOURCE)
    }

    pub fn set_source(&mut self, source: &str) {
        self.set(MediaKey::SOURCE, Value::from(source));
    }

    pub fn title(&self) -> Option<&str> {
        self.get_string(MediaKey::TITLE)
    }

    pub fn set_title(&mut self, title: &str) {
        self.set(MediaKey::TITLE, Value::from(title));
    }

    pub fn url(&self) -> Option<&str> {
        self.get_string(MediaKey::URL)
    }

    pub fn set_url(&mut self, url: &str) {
        self.set(MediaKey::URL, Value::from(url));
    }

    /// Normalizes `rating` on the caller's `max` scale to the record's
    /// fixed 0..5 scale.
    pub fn set_rating(&mut self, rating: f64, max: f64) {
        self.set(MediaKey::RATING, Value::Float((rating * RATING_MAX) / max));
    }

    /// Writes the whole URL relation group at position 0.
    pub fn set_url_data(&mut self, url: &str, mime: &str, bitrate: i64) {
        let snapshot = self.url_snapshot(url, mime, bitrate);
        self.update_related(&snapshot, 0);
    }

    /// Appends a URL relation group as a new position.
    pub fn add_url_data(&mut self, url: &str, mime: &str, bitrate: i64) {
        let snapshot = self.url_snapshot(url, mime, bitrate);
        self.add_related(snapshot);
    }

    pub fn add_artist(&mut self, artist: &str) {
        self.add_single(MediaKey::ARTIST, Value::from(artist));
    }

    pub fn add_genre(&mut self, genre: &str) {
        self.add_single(MediaKey::GENRE, Value::from(genre));
    }

    fn add_single(&mut self, key: MediaKey, value: Value) {
        let mut snapshot = GroupSnapshot::new();
        snapshot.set(&self.registry, key, value);
        self.add_related(snapshot);
    }

    fn url_snapshot(&self, url: &str, mime: &str, bitrate: i64) -> GroupSnapshot {
        let mut snapshot =
            GroupSnapshot::with_keys(&[MediaKey::URL, MediaKey::MIME, MediaKey::BITRATE]);
        snapshot.set(&self.registry, MediaKey::URL, Value::from(url));
        snapshot.set(&self.registry, MediaKey::MIME, Value::from(mime));
        snapshot.set(&self.registry, MediaKey::BITRATE, Value::from(bitrate));
        snapshot
    }
}

impl PartialEq for Media {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.attrs == other.attrs && self.extended == other.extended
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::{Media, MediaKind};
    use crate::{KeyRegistry, MediaKey};

    fn media(kind: MediaKind) -> Media {
        Media::new(kind, Arc::new(KeyRegistry::with_defaults()))
    }

    #[test]
    fn scheme_table_roundtrips() {
        for kind in [
            MediaKind::Generic,
            MediaKind::Audio,
            MediaKind::Video,
            MediaKind::Image,
            MediaKind::Container,
        ] {
            assert_eq!(MediaKind::from_scheme(kind.scheme()), Some(kind));
        }
        assert_eq!(MediaKind::from_scheme("LyraAudio"), Some(MediaKind::Audio));
        assert_eq!(MediaKind::from_scheme("http"), None);
    }

    #[test]
    fn rating_is_normalized_to_five() {
        let mut media = media(MediaKind::Audio);
        media.set_rating(8.0, 10.0);
        assert_eq!(media.get_float(MediaKey::RATING), Some(4.0));
    }

    #[test]
    fn set_url_data_writes_the_whole_group() {
        let mut media = media(MediaKind::Audio);
        media.set_url_data("http://example.org/a.ogg", "audio/ogg", 256);
        assert_eq!(media.url(), Some("http://example.org/a.ogg"));
        assert_eq!(media.get_string(MediaKey::MIME), Some("audio/ogg"));
        assert_eq!(media.get_int(MediaKey::BITRATE), Some(256));
        assert_eq!(media.related_len(MediaKey::URL), 1);
    }
}
