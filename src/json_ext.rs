//! Performance oriented JSON manipulation.
//!
//! Selects the raw byte slice of a value at a key path inside a JSON
//! document, without building a value tree and without re-encoding. Borrowed
//! [`RawValue`]s keep every returned slice pointing into the input, so
//! numbers and booleans can be emitted verbatim and string bodies keep their
//! original escapes.

use std::collections::HashMap;

use serde_json::value::RawValue;

use crate::error::FetchError;

/// JSON value classification, read off the leading byte of the raw text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum JsonType {
    String,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

pub(crate) fn value_type(raw: &[u8]) -> JsonType {
    match raw.first() {
        Some(b'{') => JsonType::Object,
        Some(b'[') => JsonType::Array,
        Some(b'"') => JsonType::String,
        Some(b't') | Some(b'f') => JsonType::Boolean,
        Some(b'n') => JsonType::Null,
        _ => JsonType::Number,
    }
}

/// Select the raw text of the value under `key` in a JSON object.
pub(crate) fn get_key<'a>(data: &'a [u8], key: &str) -> Result<&'a [u8], FetchError> {
    let object: HashMap<&str, &'a RawValue> =
        serde_json::from_slice(data).map_err(|err| FetchError::ExecutionPathNotFound {
            reason: err.to_string(),
        })?;
    match object.get(key) {
        Some(value) => Ok(value.get().as_bytes()),
        None => Err(FetchError::ExecutionPathNotFound {
            reason: format!("key '{key}' not found"),
        }),
    }
}

/// Select the value at a key path.
///
/// Strings yield their *inner* bytes: the surrounding quotes are stripped but
/// escape sequences are left untouched, so wrapping the slice in quotes again
/// reproduces the source text exactly. All other types yield the raw value
/// text.
pub(crate) fn get_path<'a, S: AsRef<str>>(
    data: &'a [u8],
    path: &[S],
) -> Result<(&'a [u8], JsonType), FetchError> {
    let mut current = data;
    for key in path {
        current = get_key(current, key.as_ref())?;
    }
    let kind = value_type(current);
    if kind == JsonType::String && current.len() >= 2 {
        current = &current[1..current.len() - 1];
    }
    Ok((current, kind))
}

/// Collect the raw text of every item of the array at a key path, in source
/// order.
pub(crate) fn array_each<'a, S: AsRef<str>>(
    data: &'a [u8],
    path: &[S],
) -> Result<Vec<&'a [u8]>, FetchError> {
    let mut scoped = data;
    for key in path {
        scoped = get_key(scoped, key.as_ref())?;
    }
    let items: Vec<&'a RawValue> =
        serde_json::from_slice(scoped).map_err(|err| FetchError::ExecutionPathNotFound {
            reason: err.to_string(),
        })?;
    Ok(items.into_iter().map(|item| item.get().as_bytes()).collect())
}
