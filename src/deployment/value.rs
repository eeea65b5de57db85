// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Typed access to the generic JSON tree backing a deployment.
//!
//! Every helper here either returns the value in the expected shape or a
//! [`DeploymentError::Structure`]; nothing is coerced. Absent keys are `None` for the
//! optional readers and an error for the `require_*` readers.

use serde_json::{Map, Value};

use crate::constants::{SSL_KEY, TLS_KEY};
use crate::errors::{DeploymentError, Result};

/// A JSON object node.
pub type Object = Map<String, Value>;

/// Name of a JSON value's shape, used in structural error messages.
pub(crate) fn shape_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub(crate) fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

pub(crate) fn structure_error(path: String, expected: &'static str, found: &Value) -> DeploymentError {
    DeploymentError::Structure {
        path,
        expected,
        found: shape_of(found),
    }
}

pub(crate) fn missing_error(path: String, expected: &'static str) -> DeploymentError {
    DeploymentError::Structure {
        path,
        expected,
        found: "missing",
    }
}

/// Interpret a number as an integer; integral floats (`2.0`) are accepted.
#[allow(clippy::cast_possible_truncation)]
pub(crate) fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && f.is_finite())
                .map(|f| f as i64)
        }),
        _ => None,
    }
}

pub(crate) fn get_str<'a>(obj: &'a Object, key: &str, ctx: &str) -> Result<Option<&'a str>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(structure_error(join_path(ctx, key), "string", other)),
    }
}

pub(crate) fn require_str<'a>(obj: &'a Object, key: &str, ctx: &str) -> Result<&'a str> {
    get_str(obj, key, ctx)?.ok_or_else(|| missing_error(join_path(ctx, key), "string"))
}

pub(crate) fn get_integer(obj: &Object, key: &str, ctx: &str) -> Result<Option<i64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => as_integer(value)
            .map(Some)
            .ok_or_else(|| structure_error(join_path(ctx, key), "integer", value)),
    }
}

pub(crate) fn require_integer(obj: &Object, key: &str, ctx: &str) -> Result<i64> {
    get_integer(obj, key, ctx)?.ok_or_else(|| missing_error(join_path(ctx, key), "integer"))
}

pub(crate) fn get_f64(obj: &Object, key: &str, ctx: &str) -> Result<Option<f64>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(other) => Err(structure_error(join_path(ctx, key), "number", other)),
    }
}

pub(crate) fn get_bool(obj: &Object, key: &str, ctx: &str) -> Result<Option<bool>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(other) => Err(structure_error(join_path(ctx, key), "boolean", other)),
    }
}

pub(crate) fn get_object<'a>(obj: &'a Object, key: &str, ctx: &str) -> Result<Option<&'a Object>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(structure_error(join_path(ctx, key), "object", other)),
    }
}

pub(crate) fn get_object_mut<'a>(
    obj: &'a mut Object,
    key: &str,
    ctx: &str,
) -> Result<Option<&'a mut Object>> {
    match obj.get_mut(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(other) => Err(structure_error(join_path(ctx, key), "object", other)),
    }
}

/// Return the object stored under `key`, inserting an empty one when absent or null.
pub(crate) fn read_or_create_map<'a>(obj: &'a mut Object, key: &str, ctx: &str) -> Result<&'a mut Object> {
    let slot = obj.entry(key.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Object(Object::new());
    }
    match slot {
        Value::Object(map) => Ok(map),
        other => Err(structure_error(join_path(ctx, key), "object", other)),
    }
}

pub(crate) fn get_array<'a>(obj: &'a Object, key: &str, ctx: &str) -> Result<Option<&'a Vec<Value>>> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Array(items)) => Ok(Some(items)),
        Some(other) => Err(structure_error(join_path(ctx, key), "array", other)),
    }
}

/// Return the array stored under `key`, inserting an empty one when absent or null.
pub(crate) fn read_or_create_array<'a>(
    obj: &'a mut Object,
    key: &str,
    ctx: &str,
) -> Result<&'a mut Vec<Value>> {
    let slot = obj.entry(key.to_string()).or_insert(Value::Null);
    if slot.is_null() {
        *slot = Value::Array(Vec::new());
    }
    match slot {
        Value::Array(items) => Ok(items),
        other => Err(structure_error(join_path(ctx, key), "array", other)),
    }
}

/// View an array element as an object; `ctx` is the path of the array itself.
pub(crate) fn element_object<'a>(value: &'a Value, ctx: &str, index: usize) -> Result<&'a Object> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(structure_error(format!("{ctx}[{index}]"), "object", other)),
    }
}

pub(crate) fn element_object_mut<'a>(
    value: &'a mut Value,
    ctx: &str,
    index: usize,
) -> Result<&'a mut Object> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(structure_error(format!("{ctx}[{index}]"), "object", other)),
    }
}

/// Walk nested objects along `keys` (all but the last must be objects when present).
///
/// Returns `None` as soon as a key is absent.
pub(crate) fn get_path<'a>(obj: &'a Object, keys: &[&str], ctx: &str) -> Result<Option<&'a Value>> {
    let Some((last, parents)) = keys.split_last() else {
        return Ok(None);
    };
    let mut current = obj;
    let mut path = ctx.to_string();
    for key in parents {
        match get_object(current, key, &path)? {
            Some(next) => current = next,
            None => return Ok(None),
        }
        path = join_path(&path, key);
    }
    Ok(current.get(*last).filter(|v| !v.is_null()))
}

/// String value at a nested path.
pub(crate) fn get_path_str<'a>(obj: &'a Object, keys: &[&str], ctx: &str) -> Result<Option<&'a str>> {
    match get_path(obj, keys, ctx)? {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(other) => Err(structure_error(join_path(ctx, &keys.join(".")), "string", other)),
    }
}

/// Mutable object at a nested path, creating every missing level.
pub(crate) fn ensure_path<'a>(obj: &'a mut Object, keys: &[&str], ctx: &str) -> Result<&'a mut Object> {
    let mut current = obj;
    let mut path = ctx.to_string();
    for key in keys {
        current = read_or_create_map(current, key, &path)?;
        path = join_path(&path, key);
    }
    Ok(current)
}

/// Key holding TLS settings in `obj`: `ssl` for documents that only use the legacy name,
/// `tls` otherwise.
pub(crate) fn tls_key(obj: &Object) -> &'static str {
    if obj.contains_key(SSL_KEY) && !obj.contains_key(TLS_KEY) {
        SSL_KEY
    } else {
        TLS_KEY
    }
}

/// Recursively copy `source` into `target`. Nested objects are merged key by key, any other
/// value replaces what `target` holds.
pub(crate) fn merge_objects(target: &mut Object, source: &Object) {
    for (key, value) in source {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(nested)) => merge_objects(existing, nested),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

/// Remove from `target` every key that `previous` set but `desired` no longer does,
/// descending into objects present on all three sides.
pub(crate) fn remove_dropped_fields(target: &mut Object, desired: &Object, previous: &Object) {
    for (key, before) in previous {
        match desired.get(key) {
            None => {
                target.remove(key);
            }
            Some(Value::Object(now)) => {
                if let (Value::Object(before), Some(Value::Object(current))) = (before, target.get_mut(key)) {
                    remove_dropped_fields(current, now, before);
                }
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod value_tests;
