// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Record schemas describing the shape of selectable values.
//!
//! A [`RecordSchema`] is an ordered list of [`Field`]s. Each field has a
//! declared [`Type`], a serialized name used by the projector, an `omitEmpty`
//! flag and free-form string tags. Selections bind to records by identity:
//! two schemas are the same type only if they are the same registered or
//! constructed instance.
//!
//! Schemas can be written by hand with [`RecordSchema::builder`] or loaded
//! from JSON (and YAML with the `yaml` feature):
//!
//! ```json
//! {
//!   "name": "User",
//!   "fields": [
//!     { "name": "Name", "json": "name", "type": { "type": "string" } },
//!     { "name": "Friends", "json": "friends",
//!       "type": { "type": "array", "items": { "type": "ref", "name": "User" } } },
//!     { "name": "Created", "json": "created", "omitEmpty": true,
//!       "tags": { "fragment": "includedefault" },
//!       "type": { "type": "string" } }
//!   ]
//! }
//! ```
//!
//! `ref` types are resolved through [`registry`] and behave like pointers,
//! which is how self-referential records are expressed.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Error, ErrorKind, Result};
use crate::value::{Number, Record, Value};

pub mod registry;

/// Tag key holding the include-by-default marker.
pub const FRAGMENT_TAG: &str = "fragment";
/// Tag value marking a field as included when a selection is undefined.
pub const INCLUDE_DEFAULT: &str = "includedefault";

static NEXT_RECORD_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Deserialize)]
// Use `type` when deserializing to discriminate between different types.
#[serde(tag = "type")]
#[serde(rename_all = "camelCase")]
// Raise error if unsupported fields are encountered.
#[serde(deny_unknown_fields)]
pub enum Type {
    /// Accepts any value. Records held by an `any` field are projected in full.
    Any,
    Boolean,
    Integer,
    Number,
    String,
    Array {
        items: Box<Type>,
    },
    /// String-keyed map.
    Map {
        values: Box<Type>,
    },
    Record(Arc<RecordSchema>),
    /// Named record resolved through the registry. Zero value is `null`.
    Ref {
        name: Arc<str>,
    },
}

impl Type {
    pub fn array(items: Type) -> Type {
        Type::Array {
            items: Box::new(items),
        }
    }

    pub fn map(values: Type) -> Type {
        Type::Map {
            values: Box::new(values),
        }
    }

    pub fn record(record: &Arc<RecordSchema>) -> Type {
        Type::Record(Arc::clone(record))
    }

    pub fn reference(name: impl Into<Arc<str>>) -> Type {
        Type::Ref { name: name.into() }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Boolean | Type::Integer | Type::Number | Type::String
        )
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    /// The record reachable through arrays, maps and refs, if any.
    ///
    /// A type without a nested record is not fragmentable: selections for it
    /// must stay undefined.
    pub fn record_of(&self) -> Option<Arc<RecordSchema>> {
        match self {
            Type::Record(r) => Some(Arc::clone(r)),
            Type::Array { items } => items.record_of(),
            Type::Map { values } => values.record_of(),
            Type::Ref { name } => {
                let resolved = registry::get(name);
                if resolved.is_none() {
                    tracing::warn!(record = %name, "unresolved record reference");
                }
                resolved
            }
            _ => None,
        }
    }

    /// The value a field of this type holds when it was never set.
    pub fn zero_value(&self) -> Value {
        match self {
            Type::Boolean => Value::Bool(false),
            Type::Integer | Type::Number => Value::from(0u64),
            Type::String => Value::from(""),
            Type::Record(r) => {
                let values = r.fields().iter().map(|f| f.ty().zero_value()).collect();
                Value::Record(Record::from_parts(Arc::clone(r), values))
            }
            Type::Any | Type::Array { .. } | Type::Map { .. } | Type::Ref { .. } => Value::Null,
        }
    }

    /// Convert a value into this type.
    ///
    /// JSON objects become records (keys are matched against field names and
    /// serialized names, missing fields take their zero value). Values of a
    /// `ref` type are wrapped in [`Value::Ref`].
    pub fn convert(&self, value: &Value) -> Result<Value> {
        let mismatch = || {
            Error::new(ErrorKind::Conversion {
                value: value.kind_name().to_string(),
                target: self.to_string(),
            })
        };
        match (self, value) {
            (Type::Any, _) | (_, Value::Null) => Ok(value.clone()),
            (_, Value::Ref(inner)) => Ok(Value::Ref(Arc::new(self.convert(inner)?))),
            (Type::Boolean, Value::Bool(_)) => Ok(value.clone()),
            (Type::Integer, Value::Number(n)) => {
                if n.is_i64() || n.is_u64() {
                    Ok(value.clone())
                } else {
                    match n.as_f64() {
                        Some(f) if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 => {
                            Ok(Value::Number(Number::from(f as i64)))
                        }
                        _ => Err(mismatch()),
                    }
                }
            }
            (Type::Number, Value::Number(_)) => Ok(value.clone()),
            (Type::String, Value::String(_)) => Ok(value.clone()),
            (Type::Array { items }, Value::Array(a)) => {
                let mut converted = Vec::with_capacity(a.len());
                for (idx, item) in a.iter().enumerate() {
                    converted.push(items.convert(item).map_err(|e| e.register(idx.to_string()))?);
                }
                Ok(Value::from(converted))
            }
            (Type::Map { values }, Value::Object(o)) => {
                let mut converted = BTreeMap::new();
                for (k, v) in o.iter() {
                    converted.insert(
                        Arc::clone(k),
                        values.convert(v).map_err(|e| e.register(Arc::clone(k)))?,
                    );
                }
                Ok(Value::from(converted))
            }
            (Type::Record(r), _) => r.convert(value),
            (Type::Ref { .. }, _) => match self.record_of() {
                Some(r) => Ok(Value::Ref(Arc::new(r.convert(value)?))),
                None => Err(mismatch()),
            },
            _ => Err(mismatch()),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Any => f.write_str("any"),
            Type::Boolean => f.write_str("boolean"),
            Type::Integer => f.write_str("integer"),
            Type::Number => f.write_str("number"),
            Type::String => f.write_str("string"),
            Type::Array { items } => write!(f, "array<{items}>"),
            Type::Map { values } => write!(f, "map<{values}>"),
            Type::Record(r) => f.write_str(r.name()),
            Type::Ref { name } => write!(f, "*{name}"),
        }
    }
}

/// A field of a [`RecordSchema`].
#[derive(Debug, Clone)]
pub struct Field {
    index: usize,
    name: Arc<str>,
    json: Option<Arc<str>>,
    omit_empty: bool,
    ty: Type,
    tags: BTreeMap<Arc<str>, Arc<str>>,
}

impl Field {
    pub fn new(name: impl Into<Arc<str>>, ty: Type) -> Self {
        let name = name.into();
        Self {
            index: 0,
            json: Some(Arc::clone(&name)),
            name,
            omit_empty: false,
            ty,
            tags: BTreeMap::new(),
        }
    }

    /// Set the serialized name. `"-"` or an empty name makes the field not serializable.
    #[must_use]
    pub fn json(mut self, name: &str) -> Self {
        self.json = match name {
            "" | "-" => None,
            _ => Some(name.into()),
        };
        self
    }

    #[must_use]
    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    #[must_use]
    pub fn tag(mut self, key: &str, value: &str) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn include_default(self) -> Self {
        self.tag(FRAGMENT_TAG, INCLUDE_DEFAULT)
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    /// Name used in projected output. `None` if the field is not serializable.
    pub fn serialized_name(&self) -> Option<&Arc<str>> {
        self.json.as_ref()
    }

    pub fn is_omit_empty(&self) -> bool {
        self.omit_empty
    }

    pub fn ty(&self) -> &Type {
        &self.ty
    }

    pub fn get_tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| v.as_ref())
    }

    /// Whether the field carries the include-by-default marker.
    pub fn is_include_default(&self) -> bool {
        self.get_tag(FRAGMENT_TAG)
            .and_then(|t| t.split(',').next())
            .is_some_and(|t| t.trim() == INCLUDE_DEFAULT)
    }

    /// The nested record of the field, if it is fragmentable.
    pub fn record(&self) -> Option<Arc<RecordSchema>> {
        self.ty.record_of()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.ty)
    }
}

/// An ordered list of named fields.
#[derive(Debug, Deserialize)]
#[serde(try_from = "RecordDef")]
pub struct RecordSchema {
    id: u64,
    name: Arc<str>,
    fields: Vec<Field>,
    by_name: BTreeMap<Arc<str>, usize>,
    by_json_name: BTreeMap<Arc<str>, usize>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RecordDef {
    name: Arc<str>,
    fields: Vec<FieldDef>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(deny_unknown_fields)]
struct FieldDef {
    name: Arc<str>,
    #[serde(rename = "type")]
    ty: Type,
    json: Option<String>,
    #[serde(default)]
    omit_empty: bool,
    #[serde(default)]
    tags: BTreeMap<Arc<str>, Arc<str>>,
}

impl TryFrom<RecordDef> for RecordSchema {
    type Error = String;

    fn try_from(def: RecordDef) -> core::result::Result<Self, Self::Error> {
        let mut builder = RecordSchema::builder(def.name);
        for fd in def.fields {
            let mut field = Field::new(fd.name, fd.ty);
            if let Some(json) = fd.json {
                field = field.json(&json);
            }
            field.omit_empty = fd.omit_empty;
            field.tags = fd.tags;
            builder = builder.field(field);
        }
        builder.try_build().map_err(|e| e.to_string())
    }
}

/// Builds a [`RecordSchema`] field by field. Fields are indexed in insertion order.
#[derive(Debug)]
pub struct RecordBuilder {
    name: Arc<str>,
    fields: Vec<Field>,
}

impl RecordBuilder {
    #[must_use]
    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Build the schema. Panics on an empty record name, an invalid field name
    /// or duplicate field names.
    pub fn build(self) -> Arc<RecordSchema> {
        match self.try_build() {
            Ok(r) => Arc::new(r),
            Err(e) => panic!("{e}"),
        }
    }

    fn try_build(self) -> Result<RecordSchema> {
        if self.name.trim().is_empty() {
            return Err(ErrorKind::Schema("record name must not be empty".to_string()).into());
        }
        let mut by_name = BTreeMap::new();
        let mut by_json_name = BTreeMap::new();
        let mut fields = self.fields;
        for (index, field) in fields.iter_mut().enumerate() {
            field.index = index;
            check_field_name(&self.name, &field.name)?;
            if let Some(json) = &field.json {
                check_field_name(&self.name, json)?;
            }
            if by_name.insert(Arc::clone(&field.name), index).is_some() {
                return Err(ErrorKind::Schema(format!(
                    "duplicate field \"{}\" in record {}",
                    field.name, self.name
                ))
                .into());
            }
            if let Some(json) = &field.json {
                by_json_name.entry(Arc::clone(json)).or_insert(index);
            }
        }
        Ok(RecordSchema {
            id: NEXT_RECORD_ID.fetch_add(1, Ordering::Relaxed),
            name: self.name,
            fields,
            by_name,
            by_json_name,
        })
    }
}

/// Field names must survive a round trip through a selection expression.
fn check_field_name(record: &str, name: &str) -> Result<()> {
    if name.is_empty() || name.trim() != name || name.contains(['{', '}', ',']) {
        return Err(ErrorKind::Schema(format!(
            "invalid field name {name:?} in record {record}"
        ))
        .into());
    }
    Ok(())
}

impl RecordSchema {
    pub fn builder(name: impl Into<Arc<str>>) -> RecordBuilder {
        RecordBuilder {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn from_json_str(json: &str) -> Result<Arc<RecordSchema>> {
        serde_json::from_str::<RecordSchema>(json)
            .map(Arc::new)
            .map_err(|e| ErrorKind::Schema(e.to_string()).into())
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Arc<RecordSchema>> {
        serde_yaml::from_str::<RecordSchema>(yaml)
            .map(Arc::new)
            .map_err(|e| ErrorKind::Schema(e.to_string()).into())
    }

    /// Process-unique identity of this record type.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &Arc<str> {
        &self.name
    }

    pub fn same_type(&self, other: &RecordSchema) -> bool {
        self.id == other.id
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&Field> {
        self.fields.get(index)
    }

    /// Look up a field by name, falling back to its serialized name.
    pub fn field_by_name(&self, name: &str) -> Option<&Field> {
        self.by_name
            .get(name)
            .or_else(|| self.by_json_name.get(name))
            .map(|idx| &self.fields[*idx])
    }

    pub fn field_index_by_name(&self, name: &str) -> Option<usize> {
        self.field_by_name(name).map(|f| f.index)
    }

    /// Like [`RecordSchema::field`], but an unknown index is a programming error.
    pub fn ensure_field(&self, index: usize) -> &Field {
        match self.fields.get(index) {
            Some(f) => f,
            None => panic!(
                "record {} has no field at index {index} ({} fields)",
                self.name,
                self.fields.len()
            ),
        }
    }

    /// Like [`RecordSchema::field_by_name`], but an unknown name is a programming error.
    pub fn ensure_field_by_name(&self, name: &str) -> &Field {
        match self.field_by_name(name) {
            Some(f) => f,
            None => panic!("record {} has no field named \"{name}\"", self.name),
        }
    }

    pub(crate) fn resolve_field(&self, name: &str) -> Result<&Field> {
        self.field_by_name(name).ok_or_else(|| {
            ErrorKind::UnknownField {
                field: format!("\"{name}\""),
                record: Arc::clone(&self.name),
            }
            .into()
        })
    }

    pub(crate) fn resolve_index(&self, index: usize) -> Result<&Field> {
        self.field(index).ok_or_else(|| {
            ErrorKind::UnknownField {
                field: format!("#{index}"),
                record: Arc::clone(&self.name),
            }
            .into()
        })
    }

    fn convert(self: &Arc<Self>, value: &Value) -> Result<Value> {
        match value {
            Value::Record(r) if r.schema().same_type(self) => Ok(value.clone()),
            Value::Record(r) => Err(ErrorKind::TypeMismatch {
                expected: self.name.to_string(),
                actual: r.schema().name().to_string(),
            }
            .into()),
            Value::Object(o) => {
                let mut values: Vec<Option<Value>> = vec![None; self.fields.len()];
                let mut unrecognized = Vec::new();
                for (key, v) in o.iter() {
                    match self.field_by_name(key) {
                        Some(field) => {
                            values[field.index] = Some(
                                field
                                    .ty
                                    .convert(v)
                                    .map_err(|e| e.register(Arc::clone(&field.name)))?,
                            );
                        }
                        None => unrecognized.push(Arc::clone(key)),
                    }
                }
                if !unrecognized.is_empty() {
                    return Err(ErrorKind::UnrecognizedFields {
                        fields: unrecognized,
                    }
                    .into());
                }
                let values = values
                    .into_iter()
                    .zip(self.fields.iter())
                    .map(|(v, f)| v.unwrap_or_else(|| f.ty.zero_value()))
                    .collect();
                Ok(Value::Record(Record::from_parts(Arc::clone(self), values)))
            }
            _ => Err(ErrorKind::Conversion {
                value: value.kind_name().to_string(),
                target: self.name.to_string(),
            }
            .into()),
        }
    }
}

impl fmt::Display for RecordSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
