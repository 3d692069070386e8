// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::collections::BTreeMap;
use std::ops;
use std::sync::Arc;

use serde::de::{self, Deserializer, MapAccess, SeqAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

pub use serde_json::Number;

use crate::error::{Error, ErrorKind, Result};
use crate::project;
use crate::schema::RecordSchema;

/// A generic value: projector input and output.
///
/// JSON data maps onto `Null`..`Object`. `Record` holds the positional field
/// values of a [`RecordSchema`] and `Ref` is a non-nil pointer; `Null` stands
/// for every kind of nil (pointer, container or absent value).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(Number),
    String(Arc<str>),
    Array(Arc<Vec<Value>>),
    Object(Arc<BTreeMap<Arc<str>, Value>>),
    Record(Record),
    Ref(Arc<Value>),
}

/// Field values of a record, in schema order.
#[derive(Debug, Clone)]
pub struct Record {
    schema: Arc<RecordSchema>,
    values: Arc<Vec<Value>>,
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.schema.same_type(&other.schema) && self.values == other.values
    }
}

impl Eq for Record {}

impl Record {
    /// A record with every field set to its zero value.
    pub fn new(schema: &Arc<RecordSchema>) -> Self {
        let values = schema.fields().iter().map(|f| f.ty().zero_value()).collect();
        Self::from_parts(Arc::clone(schema), values)
    }

    pub(crate) fn from_parts(schema: Arc<RecordSchema>, values: Vec<Value>) -> Self {
        debug_assert_eq!(schema.len(), values.len());
        Self {
            schema,
            values: Arc::new(values),
        }
    }

    pub fn schema(&self) -> &Arc<RecordSchema> {
        &self.schema
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn get_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Value of a field looked up by name or serialized name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.schema
            .field_index_by_name(name)
            .and_then(|idx| self.values.get(idx))
    }

    /// Set a field, converting the value to the field's declared type.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<()> {
        let field = self.schema.resolve_field(name)?;
        let index = field.index();
        let converted = field
            .ty()
            .convert(&value.into())
            .map_err(|e| e.register(Arc::clone(field.name())))?;
        Arc::make_mut(&mut self.values)[index] = converted;
        Ok(())
    }

    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Result<Self> {
        self.set(name, value)?;
        Ok(self)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(None)?;
        for (field, value) in self.schema.fields().iter().zip(self.values.iter()) {
            let Some(name) = field.serialized_name() else {
                continue;
            };
            if field.is_omit_empty() && project::is_value_undefined(value) {
                continue;
            }
            map.serialize_entry(name.as_ref(), value)?;
        }
        map.end()
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::String(s) => serializer.serialize_str(s.as_ref()),
            Value::Number(n) => n.serialize(serializer),
            Value::Array(a) => a.serialize(serializer),
            Value::Object(fields) => {
                let mut map = serializer.serialize_map(Some(fields.len()))?;
                for (k, v) in fields.iter() {
                    map.serialize_entry(k.as_ref(), v)?;
                }
                map.end()
            }
            Value::Record(r) => r.serialize(serializer),

            // pointers are transparent
            Value::Ref(v) => v.serialize(serializer),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a value")
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_none<E>(self) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> Result<Self::Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        Deserialize::deserialize(deserializer)
    }

    fn visit_bool<E>(self, v: bool) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::Bool(v))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(v))
    }

    fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(s))
    }

    fn visit_string<E>(self, s: String) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        Ok(Value::from(s))
    }

    fn visit_seq<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
    where
        V: SeqAccess<'de>,
    {
        let mut arr = vec![];
        while let Some(v) = visitor.next_element()? {
            arr.push(v);
        }
        Ok(Value::from(arr))
    }

    fn visit_map<V>(self, mut visitor: V) -> Result<Self::Value, V::Error>
    where
        V: MapAccess<'de>,
    {
        let mut map = BTreeMap::new();
        while let Some((key, value)) = visitor.next_entry::<String, Value>()? {
            map.insert(Arc::from(key), value);
        }
        Ok(Value::from(map))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D>(deserializer: D) -> Result<Value, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(ValueVisitor)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(s) => write!(f, "{s}"),
            Err(_e) => Err(fmt::Error),
        }
    }
}

impl Value {
    pub fn new_object() -> Value {
        Value::from(BTreeMap::new())
    }

    pub fn new_array() -> Value {
        Value::from(vec![])
    }

    pub fn from_json_str(json: &str) -> Result<Value> {
        serde_json::from_str(json).map_err(|e| ErrorKind::InvalidInput(e.to_string()).into())
    }

    pub fn to_json_str(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| ErrorKind::InvalidInput(e.to_string()).into())
    }

    #[cfg(feature = "yaml")]
    pub fn from_yaml_str(yaml: &str) -> Result<Value> {
        serde_yaml::from_str(yaml).map_err(|e| ErrorKind::InvalidInput(e.to_string()).into())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Record(_) => "record",
            Value::Ref(_) => "reference",
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(Number::from(n))
    }
}

impl From<f64> for Value {
    /// Non-finite numbers have no JSON representation and become `Null`.
    fn from(n: f64) -> Self {
        match Number::from_f64(n) {
            Some(n) => Value::Number(n),
            None => Value::Null,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s.into())
    }
}

impl From<Vec<Value>> for Value {
    fn from(a: Vec<Value>) -> Self {
        Value::Array(Arc::new(a))
    }
}

impl From<BTreeMap<Arc<str>, Value>> for Value {
    fn from(m: BTreeMap<Arc<str>, Value>) -> Self {
        Value::Object(Arc::new(m))
    }
}

impl From<Record> for Value {
    fn from(r: Record) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl Value {
    /// A pointer to `v`.
    pub fn new_ref(v: impl Into<Value>) -> Value {
        Value::Ref(Arc::new(v.into()))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Follow pointers to the pointee.
    pub fn deref_value(&self) -> &Value {
        let mut v = self;
        while let Value::Ref(inner) = v {
            v = inner;
        }
        v
    }

    fn mismatch(&self, expected: &str) -> Error {
        ErrorKind::TypeMismatch {
            expected: expected.to_string(),
            actual: self.kind_name().to_string(),
        }
        .into()
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self.deref_value() {
            Value::Bool(b) => Ok(*b),
            v => Err(v.mismatch("boolean")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self.deref_value() {
            Value::String(s) => Ok(s),
            v => Err(v.mismatch("string")),
        }
    }

    pub fn as_number(&self) -> Result<&Number> {
        match self.deref_value() {
            Value::Number(n) => Ok(n),
            v => Err(v.mismatch("number")),
        }
    }

    pub fn as_array(&self) -> Result<&Vec<Value>> {
        match self.deref_value() {
            Value::Array(a) => Ok(a),
            v => Err(v.mismatch("array")),
        }
    }

    pub fn as_array_mut(&mut self) -> Result<&mut Vec<Value>> {
        match self {
            Value::Array(a) => Ok(Arc::make_mut(a)),
            v => Err(v.mismatch("array")),
        }
    }

    pub fn as_object(&self) -> Result<&BTreeMap<Arc<str>, Value>> {
        match self.deref_value() {
            Value::Object(m) => Ok(m),
            v => Err(v.mismatch("object")),
        }
    }

    pub fn as_object_mut(&mut self) -> Result<&mut BTreeMap<Arc<str>, Value>> {
        match self {
            Value::Object(m) => Ok(Arc::make_mut(m)),
            v => Err(v.mismatch("object")),
        }
    }

    pub fn as_record(&self) -> Result<&Record> {
        match self.deref_value() {
            Value::Record(r) => Ok(r),
            v => Err(v.mismatch("record")),
        }
    }

    pub fn as_record_mut(&mut self) -> Result<&mut Record> {
        match self {
            Value::Record(r) => Ok(r),
            v => Err(v.mismatch("record")),
        }
    }
}

static NULL: Value = Value::Null;

impl ops::Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        match self.as_array() {
            Ok(a) if index < a.len() => &a[index],
            _ => &NULL,
        }
    }
}

impl ops::Index<&str> for Value {
    type Output = Value;

    /// Object key or record field (by name or serialized name). Missing entries index to `Null`.
    fn index(&self, key: &str) -> &Self::Output {
        match self.deref_value() {
            Value::Object(o) => o.get(key).unwrap_or(&NULL),
            Value::Record(r) => r.get(key).unwrap_or(&NULL),
            _ => &NULL,
        }
    }
}
