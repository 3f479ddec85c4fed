//! Key-case transcoding between the domain format (snake_case) and the wire
//! format (camelCase).
//!
//! Only object keys are rewritten. Leaf values are never touched, and keys
//! that are not plain snake_case identifiers (`$or`, `Id`, `foo__bar`) are
//! passed through as-is. Leading underscores (`_id`) are kept verbatim in
//! both directions.

use heck::ToLowerCamelCase;
use serde_json::{Map, Value};

/// Convert every key of `value` to camelCase, recursing into nested objects
/// and into each element of arrays.
pub fn to_wire(value: &Value) -> Value {
    transform(value, &camelize, &[])
}

/// Convert every key of `value` to snake_case. Inverse of [`to_wire`].
pub fn to_domain(value: &Value) -> Value {
    transform(value, &underscore, &[])
}

/// Map-level [`to_wire`]. Values under an `opaque` key are copied verbatim.
pub fn map_to_wire(map: &Map<String, Value>, opaque: &[&str]) -> Map<String, Value> {
    transform_map(map, &camelize, opaque)
}

/// [`to_domain`] that leaves the values under `opaque` keys untouched, at any
/// depth.
pub fn to_domain_preserving(value: &Value, opaque: &[&str]) -> Value {
    transform(value, &underscore, opaque)
}

fn transform(value: &Value, rename: &dyn Fn(&str) -> String, opaque: &[&str]) -> Value {
    match value {
        Value::Object(map) => Value::Object(transform_map(map, rename, opaque)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| transform(item, rename, opaque))
                .collect(),
        ),
        leaf => leaf.clone(),
    }
}

fn transform_map(
    map: &Map<String, Value>,
    rename: &dyn Fn(&str) -> String,
    opaque: &[&str],
) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            if opaque.contains(&key.as_str()) {
                (key.clone(), value.clone())
            } else {
                (rename(key), transform(value, rename, opaque))
            }
        })
        .collect()
}

/// `first_name` -> `firstName`. Keys without an inner underscore come back
/// unchanged.
pub fn camelize(key: &str) -> String {
    let body = key.trim_start_matches('_');
    let is_snake = body.contains('_')
        && !body.ends_with('_')
        && !body.contains("__")
        && body
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
    if !is_snake {
        return key.to_string();
    }
    let prefix = &key[..key.len() - body.len()];
    format!("{prefix}{}", body.to_lower_camel_case())
}

/// `firstName` -> `first_name`.
///
/// Every uppercase letter starts a new word. heck's snake conversion groups
/// consecutive capitals into one word (`aBC` -> `a_bc`), which would break
/// the inverse of [`camelize`] for single-letter words.
pub fn underscore(key: &str) -> String {
    if !key.bytes().any(|b| b.is_ascii_uppercase()) {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_ascii_uppercase() {
            if !out.is_empty() && !out.ends_with('_') {
                out.push('_');
            }
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
