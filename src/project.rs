// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Rendering the selected part of a value.
//!
//! Records become objects keyed by serialized field name. Fields that hold
//! nothing worth serializing are emitted as `null` when the caller selected
//! them explicitly and are left out otherwise.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::schema::{Field, RecordSchema, Type};
use crate::selection::Selection;
use crate::structured::StructSelection;
use crate::value::{Record, Value};

/// Whether a value counts as never set.
///
/// Nil is undefined, and so are plain `false`, `0`, `""` and records whose
/// fields are all zero. A [`Value::Ref`] marks explicit intent: it is only
/// undefined when it points at nil.
pub fn is_value_undefined(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Ref(inner) => matches!(inner.as_ref(), Value::Null),
        _ => is_zero(value),
    }
}

/// Whether a value serializes to nothing: nil, an empty string, a list or map
/// of only such values, or a record whose fields are all zero.
pub fn is_value_json_null(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Ref(inner) => is_value_json_null(inner),
        Value::Bool(_) | Value::Number(_) => false,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.iter().all(is_value_json_null),
        Value::Object(entries) => entries.values().all(is_value_json_null),
        Value::Record(_) => is_zero(value),
    }
}

/// [`is_value_json_null`], also counting undefined values of omit-empty fields.
pub fn is_field_value_json_null(field: &Field, value: &Value) -> bool {
    is_value_json_null(value) || (field.is_omit_empty() && is_value_undefined(value))
}

fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Record(r) => r.values().iter().all(is_zero),
        Value::Ref(_) | Value::Array(_) | Value::Object(_) => false,
    }
}

/// Project `value` through a typed selection.
///
/// Lists and maps are projected element by element. Records must be bound to
/// the selection's record.
pub fn project(selection: &StructSelection, value: &Value) -> Result<Value> {
    match value {
        Value::Null => Ok(Value::Null),
        Value::Ref(inner) => project(selection, inner),
        Value::Array(items) => {
            let mut projected = Vec::with_capacity(items.len());
            for (idx, item) in items.iter().enumerate() {
                projected.push(project(selection, item).map_err(|e| e.register(idx.to_string()))?);
            }
            Ok(Value::from(projected))
        }
        Value::Object(entries) => {
            let mut projected = BTreeMap::new();
            for (key, item) in entries.iter() {
                projected.insert(
                    Arc::clone(key),
                    project(selection, item).map_err(|e| e.register(Arc::clone(key)))?,
                );
            }
            Ok(Value::from(projected))
        }
        Value::Record(record) if record.schema().same_type(selection.record()) => {
            project_record(selection, record)
        }
        Value::Record(record) => Err(mismatch(selection.record(), record.schema().name())),
        other => Err(mismatch(selection.record(), other.kind_name())),
    }
}

fn mismatch(expected: &RecordSchema, actual: &str) -> crate::Error {
    tracing::debug!(expected = %expected.name(), actual, "cannot project value");
    ErrorKind::TypeMismatch {
        expected: expected.name().to_string(),
        actual: actual.to_string(),
    }
    .into()
}

fn project_record(selection: &StructSelection, record: &Record) -> Result<Value> {
    let explicit = !selection.is_undefined();
    let mut projected = BTreeMap::new();
    for (field, value) in record.schema().fields().iter().zip(record.values()) {
        let index = field.index();
        if !selection.has_by_index(index) {
            continue;
        }
        let Some(name) = field.serialized_name() else {
            continue;
        };
        if is_field_value_json_null(field, value) {
            if explicit {
                projected.insert(Arc::clone(name), Value::Null);
            }
            continue;
        }
        let nested = if holds_any(field.ty()) {
            Some(project_any(value))
        } else {
            field.record().map(|r| {
                let child = selection
                    .field_selection(index)
                    .unwrap_or_else(|| StructSelection::new(&r));
                project(&child, value)
            })
        };
        let field_value = match nested {
            Some(result) => {
                let v = result.map_err(|e| e.register(Arc::clone(field.name())))?;
                if is_value_json_null(&v) {
                    if explicit {
                        projected.insert(Arc::clone(name), Value::Null);
                    }
                    continue;
                }
                v
            }
            None => plain(value),
        };
        projected.insert(Arc::clone(name), field_value);
    }
    Ok(Value::from(projected))
}

fn holds_any(ty: &Type) -> bool {
    match ty {
        Type::Any => true,
        Type::Array { items } => holds_any(items),
        Type::Map { values } => holds_any(values),
        _ => false,
    }
}

/// Values of `any` fields carry their own record, if any.
fn project_any(value: &Value) -> Result<Value> {
    match value {
        Value::Ref(inner) => project_any(inner),
        Value::Record(record) => project_record(&StructSelection::new(record.schema()), record),
        Value::Array(items) => items
            .iter()
            .map(project_any)
            .collect::<Result<Vec<_>>>()
            .map(Value::from),
        Value::Object(entries) => {
            let mut projected = BTreeMap::new();
            for (key, item) in entries.iter() {
                projected.insert(Arc::clone(key), project_any(item)?);
            }
            Ok(Value::from(projected))
        }
        _ => Ok(value.clone()),
    }
}

/// Copy of a primitive value without refs.
fn plain(value: &Value) -> Value {
    match value {
        Value::Ref(inner) => plain(inner),
        Value::Array(items) if items.iter().any(has_ref) => {
            Value::from(items.iter().map(plain).collect::<Vec<_>>())
        }
        Value::Object(entries) if entries.values().any(has_ref) => Value::from(
            entries
                .iter()
                .map(|(k, v)| (Arc::clone(k), plain(v)))
                .collect::<BTreeMap<_, _>>(),
        ),
        _ => value.clone(),
    }
}

fn has_ref(value: &Value) -> bool {
    match value {
        Value::Ref(_) => true,
        Value::Array(items) => items.iter().any(has_ref),
        Value::Object(entries) => entries.values().any(has_ref),
        _ => false,
    }
}

/// Project with a selection of either kind.
///
/// Without a selection the value is returned as is. Untyped selections are
/// bound to the record found in the value first.
pub fn project_selection(selection: Option<&Selection>, value: &Value) -> Result<Value> {
    match selection {
        None => Ok(value.clone()),
        Some(Selection::Typed(s)) => project(s, value),
        Some(Selection::Untyped(u)) if u.is_undefined() => Ok(value.clone()),
        Some(Selection::Untyped(u)) => match record_in(value) {
            Some(record) => project(&u.to_structured(&record)?, value),
            None => Ok(value.clone()),
        },
    }
}

/// The record of the first record value inside `value`.
fn record_in(value: &Value) -> Option<Arc<RecordSchema>> {
    match value {
        Value::Record(r) => Some(Arc::clone(r.schema())),
        Value::Ref(inner) => record_in(inner),
        Value::Array(items) => items.iter().find_map(record_in),
        Value::Object(entries) => entries.values().find_map(record_in),
        _ => None,
    }
}

/// Project and serialize to JSON.
pub fn to_json_string(selection: &StructSelection, value: &Value) -> Result<String> {
    let projected = project(selection, value)?;
    serde_json::to_string(&projected).map_err(|e| ErrorKind::InvalidInput(e.to_string()).into())
}
