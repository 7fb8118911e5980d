//! Reversible textual serialization of a record.
//!
//! The wire shape is `scheme://source[/id][?key=value&...]` with every
//! segment percent-escaped. The scheme token selects the record subtype;
//! query values are rendered per the key's declared type.

use std::sync::Arc;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::{
    parse_float_lenient, parse_int_lenient, KeyRegistry, LyraError, LyraResult, Media, MediaKey,
    MediaKind, Value, ValueType,
};

// Escape everything but unreserved characters (RFC 3986).
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// Which attributes accompany the identity segments.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerializeMode {
    /// Identity only.
    Basic,
    /// Identity plus the given keys.
    Partial(Vec<MediaKey>),
    /// Identity plus every registered key with a present value.
    Full,
}

pub fn serialize(media: &Media, mode: &SerializeMode) -> LyraResult<String> {
    let source = media
        .source()
        .ok_or_else(|| LyraError::validation("cannot serialize a record without a source"))?;
    let mut serial = String::with_capacity(100);
    serial.push_str(media.kind().scheme());
    serial.push_str("://");
    serial.push_str(&utf8_percent_encode(source, COMPONENT).to_string());
    if let Some(id) = media.id() {
        serial.push('/');
        serial.push_str(&utf8_percent_encode(id, COMPONENT).to_string());
    }

    let registry = media.registry();
    let keys: Vec<MediaKey> = match mode {
        SerializeMode::Basic => Vec::new(),
        SerializeMode::Partial(keys) => keys.clone(),
        SerializeMode::Full => registry
            .keys()
            .iter()
            .copied()
            .filter(|key| *key != MediaKey::ID && *key != MediaKey::SOURCE)
            .collect(),
    };

    let mut first = true;
    for key in keys {
        let Some(value) = media.get(key) else {
            continue;
        };
        let Some(name) = registry.name(key) else {
            continue;
        };
        let rendered = match value {
            Value::Str(text) => utf8_percent_encode(text, COMPONENT).to_string(),
            Value::Int(number) => number.to_string(),
            Value::Float(number) => format!("{number:.6}"),
            // Binary values have no textual form on the wire.
            Value::Blob(_) => continue,
        };
        serial.push(if first { '?' } else { '&' });
        serial.push_str(name);
        serial.push('=');
        serial.push_str(&rendered);
        first = false;
    }

    Ok(serial)
}

pub fn deserialize(serial: &str, registry: &Arc<KeyRegistry>) -> LyraResult<Media> {
    let (scheme, rest) = serial
        .split_once("://")
        .ok_or_else(|| LyraError::validation(format!("malformed serial '{serial}'")))?;
    let kind = MediaKind::from_scheme(scheme)
        .ok_or_else(|| LyraError::validation(format!("unknown scheme '{scheme}'")))?;

    let (identity, query) = match rest.split_once('?') {
        Some((identity, query)) => (identity, Some(query)),
        None => (rest, None),
    };
    let (source_escaped, id_escaped) = match identity.split_once('/') {
        Some((source, id)) => (source, Some(id)),
        None => (identity, None),
    };
    if source_escaped.is_empty() {
        return Err(LyraError::validation(format!(
            "malformed serial '{serial}': empty source"
        )));
    }

    let mut media = Media::new(kind, registry.clone());
    media.set_source(&decode(source_escaped)?);
    if let Some(id_escaped) = id_escaped {
        if !id_escaped.is_empty() {
            media.set_id(&decode(id_escaped)?);
        }
    }

    if let Some(query) = query {
        for pair in query.split('&') {
            let Some((name_escaped, value_escaped)) = pair.split_once('=') else {
                continue;
            };
            let name = decode(name_escaped)?;
            // Unknown key names are skipped, not an error.
            let Some(key) = registry.key_by_name(&name) else {
                continue;
            };
            let value = decode(value_escaped)?;
            match registry.declared_type(key) {
                Some(ValueType::Str) => media.set(key, Value::Str(value)),
                Some(ValueType::Int) => media.set(key, Value::Int(parse_int_lenient(&value))),
                Some(ValueType::Float) => media.set(key, Value::Float(parse_float_lenient(&value))),
                Some(ValueType::Blob) | None => {}
            }
        }
    }

    Ok(media)
}

fn decode(escaped: &str) -> LyraResult<String> {
    percent_decode_str(escaped)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|err| LyraError::validation(format!("invalid escape in '{escaped}': {err}")))
}
