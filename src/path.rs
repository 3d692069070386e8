// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Field paths such as `profile.address` with an optional tail selection.
//!
//! A path compiles to the selection that includes the field at its end:
//! `profile.address { city }` becomes `{ profile { address { city } } }`.

use core::fmt;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::project::is_value_json_null;
use crate::schema::{Field, RecordSchema, Type};
use crate::selection::{Selection, SelectionInput};
use crate::structured::StructSelection;
use crate::untyped::UntypedSelection;
use crate::value::Value;

/// A piece of a path being built.
#[derive(Debug, Clone)]
pub enum PathSegment {
    /// Dot-separated field names.
    Names(String),
    /// A field index of the current record.
    Index(usize),
    Struct(StructPath),
    Untyped(UntypedPath),
    /// The selection applied at the end of the path.
    Tail(SelectionInput),
}

impl PathSegment {
    pub fn tail(input: impl Into<SelectionInput>) -> Self {
        PathSegment::Tail(input.into())
    }
}

impl From<&str> for PathSegment {
    fn from(names: &str) -> Self {
        PathSegment::Names(names.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(names: String) -> Self {
        PathSegment::Names(names)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

impl From<StructPath> for PathSegment {
    fn from(path: StructPath) -> Self {
        PathSegment::Struct(path)
    }
}

impl From<UntypedPath> for PathSegment {
    fn from(path: UntypedPath) -> Self {
        PathSegment::Untyped(path)
    }
}

fn dotted(names: &str) -> impl Iterator<Item = &str> {
    names.split('.').map(str::trim).filter(|n| !n.is_empty())
}

fn continues_after_tail(name: &str) -> crate::Error {
    ErrorKind::InvalidInput(format!("path continues with \"{name}\" after its tail selection")).into()
}

/// A path of field indices through a record schema.
#[derive(Clone)]
pub struct StructPath {
    record: Arc<RecordSchema>,
    indices: Vec<usize>,
    tail: Option<StructSelection>,
}

impl PartialEq for StructPath {
    fn eq(&self, other: &Self) -> bool {
        self.record.same_type(&other.record) && self.indices == other.indices && self.tail == other.tail
    }
}

/// Resolves segments one field at a time.
struct StructPathBuilder {
    path: StructPath,
    current: Option<Arc<RecordSchema>>,
    last: Option<Arc<str>>,
}

impl StructPathBuilder {
    fn current(&self, next: &str) -> Result<&Arc<RecordSchema>> {
        if self.path.tail.is_some() {
            return Err(continues_after_tail(next));
        }
        self.current.as_ref().ok_or_else(|| {
            ErrorKind::NotFragmentable {
                field: self.last.clone().unwrap_or_else(|| Arc::from("")),
                expr: next.to_string(),
            }
            .into()
        })
    }

    fn push(&mut self, field: &Field) {
        self.path.indices.push(field.index());
        self.current = field.record();
        self.last = Some(Arc::clone(field.name()));
    }

    fn name(&mut self, name: &str) -> Result<()> {
        let field = self.current(name)?.resolve_field(name)?.clone();
        self.push(&field);
        Ok(())
    }

    fn index(&mut self, index: usize) -> Result<()> {
        let field = self.current(&format!("#{index}"))?.resolve_index(index)?.clone();
        self.push(&field);
        Ok(())
    }

    fn tail(&mut self, input: SelectionInput) -> Result<()> {
        let tail = match &self.current {
            Some(record) => Some(crate::bind::bind_input(record, input)?),
            None => {
                let selection = input.into_untyped()?;
                if !selection.is_undefined() {
                    return Err(ErrorKind::NotFragmentable {
                        field: self.last.clone().unwrap_or_else(|| Arc::from("")),
                        expr: selection.expr(),
                    }
                    .into());
                }
                None
            }
        };
        self.path.tail = tail.filter(|t| !t.is_undefined());
        Ok(())
    }

    fn segment(&mut self, segment: PathSegment) -> Result<()> {
        match segment {
            PathSegment::Names(names) => dotted(&names).try_for_each(|n| self.name(n)),
            PathSegment::Index(index) => self.index(index),
            PathSegment::Struct(other) => {
                let current = self.current(&other.expr())?;
                if !current.same_type(&other.record) {
                    return Err(ErrorKind::TypeMismatch {
                        expected: current.name().to_string(),
                        actual: other.record.name().to_string(),
                    }
                    .into());
                }
                for index in other.indices.iter() {
                    self.index(*index)?;
                }
                if let Some(tail) = other.tail {
                    self.tail(tail.into())?;
                }
                Ok(())
            }
            PathSegment::Untyped(other) => {
                for name in other.names.iter() {
                    self.name(name)?;
                }
                match other.tail {
                    Some(tail) => self.tail(tail.into()),
                    None => Ok(()),
                }
            }
            PathSegment::Tail(input) => self.tail(input),
        }
    }
}

impl StructPath {
    /// Resolve segments against `record`.
    pub fn new<I, S>(record: &Arc<RecordSchema>, segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        let mut builder = StructPathBuilder {
            path: StructPath {
                record: Arc::clone(record),
                indices: vec![],
                tail: None,
            },
            current: Some(Arc::clone(record)),
            last: None,
        };
        for segment in segments {
            builder.segment(segment.into())?;
        }
        Ok(builder.path)
    }

    pub fn record(&self) -> &Arc<RecordSchema> {
        &self.record
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn tail(&self) -> Option<&StructSelection> {
        self.tail.as_ref()
    }

    /// The fields along the path together with the record declaring each.
    fn walk(&self) -> Vec<(Arc<RecordSchema>, Field)> {
        let mut fields = Vec::with_capacity(self.indices.len());
        let mut current = Arc::clone(&self.record);
        for index in &self.indices {
            let field = current.ensure_field(*index).clone();
            let next = field.record();
            fields.push((current, field));
            match next {
                Some(next) => current = next,
                None => break,
            }
        }
        fields
    }

    /// The record at the end of the path. `None` if the last field has no nested record.
    pub fn tail_record(&self) -> Option<Arc<RecordSchema>> {
        match self.walk().last() {
            Some((_, field)) => field.record(),
            None => Some(Arc::clone(&self.record)),
        }
    }

    pub fn field_names(&self) -> Vec<Arc<str>> {
        self.walk()
            .into_iter()
            .map(|(_, f)| Arc::clone(f.name()))
            .collect()
    }

    /// Serialized names, or `None` if a field on the path is not serializable.
    pub fn json_field_names(&self) -> Option<Vec<Arc<str>>> {
        self.walk()
            .into_iter()
            .map(|(_, f)| f.serialized_name().cloned())
            .collect()
    }

    /// Merge a selection into the tail.
    pub fn assign_tail(&self, input: impl Into<SelectionInput>) -> Result<Self> {
        let input = input.into();
        let Some(record) = self.tail_record() else {
            let selection = input.into_untyped()?;
            if selection.is_undefined() {
                return Ok(self.clone());
            }
            return Err(ErrorKind::NotFragmentable {
                field: self.field_names().pop().unwrap_or_else(|| Arc::from("")),
                expr: selection.expr(),
            }
            .into());
        };
        let current = self
            .tail
            .clone()
            .unwrap_or_else(|| StructSelection::empty(&record));
        let mut path = self.clone();
        path.tail = Some(current.assign(input)?);
        Ok(path)
    }

    /// The selection of the root record that includes the end of the path.
    ///
    /// A path without fields compiles to an empty selection.
    pub fn to_selection(&self) -> StructSelection {
        let mut child: Option<Option<StructSelection>> = None;
        for (record, field) in self.walk().into_iter().rev() {
            let inner = match child.take() {
                Some(inner) => inner,
                None => self
                    .tail
                    .clone()
                    .or_else(|| field.record().map(|r| StructSelection::new(&r))),
            };
            let mut selection = StructSelection::empty(&record);
            selection.insert(field.index(), inner);
            child = Some(Some(selection));
        }
        child
            .flatten()
            .unwrap_or_else(|| StructSelection::empty(&self.record))
    }

    /// The part of `selection` at the end of the path.
    ///
    /// `None` if the selection is bound to another record or the path ends at
    /// a field without a nested record.
    pub fn selection_at(&self, selection: &StructSelection) -> Option<StructSelection> {
        if !selection.record().same_type(&self.record) {
            return None;
        }
        let mut current = selection.clone();
        for index in &self.indices {
            current = current.field_selection(*index)?;
        }
        Some(current)
    }

    pub fn expr(&self) -> String {
        let names = self.field_names();
        join_path(&names, self.tail.as_ref().map(StructSelection::expr))
    }

    pub fn json_expr(&self) -> String {
        match self.json_field_names() {
            Some(names) => join_path(&names, self.tail.as_ref().map(StructSelection::json_expr)),
            None => String::new(),
        }
    }

    /// Every value at the end of the path. Lists and maps along the way are
    /// traversed element by element and nil values end their branch.
    pub fn values(&self, value: &Value) -> Result<Vec<Value>> {
        let mut found = vec![];
        visit(value, &self.record, &self.indices, &mut |v| {
            found.push(v.clone());
            false
        })?;
        Ok(found)
    }

    /// The first value at the end of the path accepted by `predicate`.
    pub fn find_value<F>(&self, value: &Value, mut predicate: F) -> Result<Option<Value>>
    where
        F: FnMut(&Value) -> bool,
    {
        let mut found = None;
        visit(value, &self.record, &self.indices, &mut |v| {
            if predicate(v) {
                found = Some(v.clone());
                return true;
            }
            false
        })?;
        Ok(found)
    }

    /// The first value at the end of the path that is not JSON-null.
    pub fn first_defined(&self, value: &Value) -> Result<Option<Value>> {
        self.find_value(value, |v| !is_value_json_null(v))
    }

    /// Convert the values at the end of the path into `target`.
    ///
    /// Array targets collect every non-null value; other targets take the
    /// first one. `Null` when nothing was found.
    pub fn collect_into(&self, value: &Value, target: &Type) -> Result<Value> {
        match target {
            Type::Array { items } => {
                let mut collected = vec![];
                for v in self.values(value)? {
                    if !is_value_json_null(&v) {
                        collected.push(items.convert(&v)?);
                    }
                }
                Ok(Value::from(collected))
            }
            _ => match self.first_defined(value)? {
                Some(v) => target.convert(&v),
                None => Ok(Value::Null),
            },
        }
    }
}

fn visit<F>(value: &Value, record: &Arc<RecordSchema>, path: &[usize], f: &mut F) -> Result<bool>
where
    F: FnMut(&Value) -> bool,
{
    let Some((&index, rest)) = path.split_first() else {
        return Ok(f(value));
    };
    match value {
        Value::Null => Ok(false),
        Value::Ref(inner) => visit(inner, record, path, f),
        Value::Array(items) => {
            for item in items.iter() {
                if visit(item, record, path, f)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Object(entries) => {
            for item in entries.values() {
                if visit(item, record, path, f)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Value::Record(r) if r.schema().same_type(record) => {
            let field = record.ensure_field(index);
            let Some(field_value) = r.get_index(index) else {
                return Ok(false);
            };
            if rest.is_empty() {
                return Ok(f(field_value));
            }
            match field.record() {
                Some(next) => visit(field_value, &next, rest, f)
                    .map_err(|e| e.register(Arc::clone(field.name()))),
                None => Ok(false),
            }
        }
        Value::Record(r) => Err(ErrorKind::TypeMismatch {
            expected: record.name().to_string(),
            actual: r.schema().name().to_string(),
        }
        .into()),
        other => Err(ErrorKind::TypeMismatch {
            expected: record.name().to_string(),
            actual: other.kind_name().to_string(),
        }
        .into()),
    }
}

fn join_path(names: &[Arc<str>], tail: Option<String>) -> String {
    if names.is_empty() {
        return String::new();
    }
    let mut expr = names.join(".");
    if let Some(tail) = tail.filter(|t| !t.is_empty()) {
        expr.push(' ');
        expr.push_str(&tail);
    }
    expr
}

impl fmt::Display for StructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Path({})", self.record.name(), self.expr())
    }
}

impl fmt::Debug for StructPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A path of field names without a schema.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UntypedPath {
    names: Vec<Arc<str>>,
    tail: Option<UntypedSelection>,
}

impl UntypedPath {
    pub fn new<I, S>(segments: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<PathSegment>,
    {
        let mut path = UntypedPath::default();
        for segment in segments {
            let (names, tail) = match segment.into() {
                PathSegment::Names(names) => (dotted(&names).map(Arc::from).collect(), None),
                PathSegment::Index(index) => {
                    return Err(ErrorKind::InvalidInput(format!(
                        "field index {index} needs a record schema"
                    ))
                    .into())
                }
                PathSegment::Struct(other) => (other.field_names(), other.tail.map(|t| t.to_unstructured())),
                PathSegment::Untyped(other) => (other.names, other.tail),
                PathSegment::Tail(input) => (vec![], Some(input.into_untyped()?)),
            };
            if let Some(name) = names.first() {
                if path.tail.is_some() {
                    return Err(continues_after_tail(name));
                }
            }
            path.names.extend(names);
            if let Some(tail) = tail.filter(|t| !t.is_undefined()) {
                path.tail = Some(tail);
            }
        }
        Ok(path)
    }

    pub fn field_names(&self) -> &[Arc<str>] {
        &self.names
    }

    /// Same as [`UntypedPath::field_names`].
    pub fn json_field_names(&self) -> Option<Vec<Arc<str>>> {
        Some(self.names.clone())
    }

    pub fn tail(&self) -> Option<&UntypedSelection> {
        self.tail.as_ref()
    }

    /// A path without names compiles to an empty selection.
    pub fn to_selection(&self) -> UntypedSelection {
        let mut child = self.tail.clone().unwrap_or_default();
        let Some((first, rest)) = self.names.split_first() else {
            return UntypedSelection::empty();
        };
        for name in rest.iter().rev() {
            child = UntypedSelection::empty().set(Arc::clone(name), child);
        }
        UntypedSelection::empty().set(Arc::clone(first), child)
    }

    pub fn expr(&self) -> String {
        join_path(&self.names, self.tail.as_ref().map(UntypedSelection::expr))
    }

    pub fn json_expr(&self) -> String {
        self.expr()
    }
}

impl fmt::Display for UntypedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({})", self.expr())
    }
}

impl fmt::Debug for UntypedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// A path of either kind.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldPath {
    Typed(StructPath),
    Untyped(UntypedPath),
}

impl FieldPath {
    pub fn field_names(&self) -> Vec<Arc<str>> {
        match self {
            FieldPath::Typed(p) => p.field_names(),
            FieldPath::Untyped(p) => p.field_names().to_vec(),
        }
    }

    pub fn json_field_names(&self) -> Option<Vec<Arc<str>>> {
        match self {
            FieldPath::Typed(p) => p.json_field_names(),
            FieldPath::Untyped(p) => p.json_field_names(),
        }
    }

    pub fn tail(&self) -> Option<Selection> {
        match self {
            FieldPath::Typed(p) => p.tail().cloned().map(Selection::Typed),
            FieldPath::Untyped(p) => p.tail().cloned().map(Selection::Untyped),
        }
    }

    pub fn to_selection(&self) -> Selection {
        match self {
            FieldPath::Typed(p) => Selection::Typed(p.to_selection()),
            FieldPath::Untyped(p) => Selection::Untyped(p.to_selection()),
        }
    }

    pub fn expr(&self) -> String {
        match self {
            FieldPath::Typed(p) => p.expr(),
            FieldPath::Untyped(p) => p.expr(),
        }
    }

    pub fn json_expr(&self) -> String {
        match self {
            FieldPath::Typed(p) => p.json_expr(),
            FieldPath::Untyped(p) => p.json_expr(),
        }
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Typed(p) => fmt::Display::fmt(p, f),
            FieldPath::Untyped(p) => fmt::Display::fmt(p, f),
        }
    }
}

impl From<StructPath> for FieldPath {
    fn from(p: StructPath) -> Self {
        FieldPath::Typed(p)
    }
}

impl From<UntypedPath> for FieldPath {
    fn from(p: UntypedPath) -> Self {
        FieldPath::Untyped(p)
    }
}
