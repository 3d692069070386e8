// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Binding selections to record schemas.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{ErrorKind, Result};
use crate::schema::{Field, RecordSchema};
use crate::selection::SelectionInput;
use crate::structured::StructSelection;
use crate::untyped::UntypedSelection;

/// Name clients may select on any record; it is never bound to a field.
pub const TYPENAME_FIELD: &str = "__typename";

lazy_static::lazy_static! {
    /// Whether a record has include-by-default fields, keyed by record id.
    /// Records live for the whole process, so entries are never evicted.
    static ref INCLUDE_DEFAULTS: Mutex<HashMap<u64, bool>> = Mutex::new(HashMap::new());
}

/// Whether any field of the record carries the include-by-default marker.
pub fn has_include_defaults(record: &RecordSchema) -> bool {
    let mut cache = INCLUDE_DEFAULTS.lock();
    *cache.entry(record.id()).or_insert_with(|| {
        let found = record.fields().iter().any(Field::is_include_default);
        tracing::trace!(record = %record.name(), include_defaults = found, "cached include-default marker");
        found
    })
}

/// Whether an undefined selection of `record` includes `field`.
pub fn is_default_field(record: &RecordSchema, field: &Field) -> bool {
    !has_include_defaults(record) || field.is_include_default()
}

/// Bind any selection input to a record.
pub fn bind_input(record: &Arc<RecordSchema>, input: SelectionInput) -> Result<StructSelection> {
    match input {
        SelectionInput::Typed(s) if s.is_undefined() => Ok(StructSelection::new(record)),
        SelectionInput::Typed(s) if s.record().same_type(record) => Ok(s),
        SelectionInput::Typed(s) => Err(ErrorKind::TypeMismatch {
            expected: record.name().to_string(),
            actual: s.record().name().to_string(),
        }
        .into()),
        input => bind_untyped(record, &input.into_untyped()?),
    }
}

/// Resolve every name of an untyped selection against a record.
///
/// Unknown names are reported together. `__typename` is ignored.
pub fn bind_untyped(record: &Arc<RecordSchema>, selection: &UntypedSelection) -> Result<StructSelection> {
    if selection.is_undefined() {
        return Ok(StructSelection::new(record));
    }
    let mut bound = StructSelection::empty(record);
    let mut unrecognized = vec![];
    for (name, child) in selection.fields() {
        let Some(field) = record.field_by_name(name) else {
            if name.as_ref() != TYPENAME_FIELD {
                unrecognized.push(Arc::clone(name));
            }
            continue;
        };
        let child = bind_field(field, SelectionInput::from(child)).map_err(|e| {
            tracing::debug!(record = %record.name(), field = %field.name(), error = %e, "failed binding selection");
            e
        })?;
        bound.insert(field.index(), child);
    }
    if !unrecognized.is_empty() {
        tracing::debug!(record = %record.name(), fields = ?unrecognized, "unrecognized fields");
        return Err(ErrorKind::UnrecognizedFields {
            fields: unrecognized,
        }
        .into());
    }
    Ok(bound)
}

/// Bind the child selection of a field.
///
/// Fields without a nested record only accept undefined selections and bind
/// to `None`. Errors carry the field name.
pub fn bind_field(field: &Field, input: SelectionInput) -> Result<Option<StructSelection>> {
    let bound = match field.record() {
        Some(record) => bind_input(&record, input).map(Some),
        None => {
            let selection = input.into_untyped();
            match selection {
                Ok(s) if s.is_undefined() => Ok(None),
                Ok(s) => Err(ErrorKind::NotFragmentable {
                    field: Arc::clone(field.name()),
                    expr: s.expr(),
                }
                .into()),
                Err(e) => Err(e),
            }
        }
    };
    bound.map_err(|e| e.register(Arc::clone(field.name())))
}

/// Materialize the default fields of a record.
///
/// Nested records with include-by-default fields are expanded too; others
/// stay undefined since that already means all of their fields. A record
/// already being expanded further up is left undefined, which stops
/// self-referential schemas.
pub fn expand_defaults(record: &Arc<RecordSchema>) -> StructSelection {
    expand_defaults_in(record, &mut vec![])
}

pub(crate) fn expand_defaults_in(record: &Arc<RecordSchema>, expanding: &mut Vec<u64>) -> StructSelection {
    if expanding.contains(&record.id()) {
        return StructSelection::new(record);
    }
    expanding.push(record.id());
    let mut expanded = StructSelection::empty(record);
    for field in record.fields() {
        if !is_default_field(record, field) {
            continue;
        }
        let child = field.record().map(|r| {
            if has_include_defaults(&r) {
                expand_defaults_in(&r, expanding)
            } else {
                StructSelection::new(&r)
            }
        });
        expanded.insert(field.index(), child);
    }
    expanding.pop();
    expanded
}
