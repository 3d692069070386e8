// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Selections bound to a record schema.
//!
//! A [`StructSelection`] is keyed by field index. When undefined, the fields
//! it includes follow the record's default-inclusion policy: if any field is
//! tagged `fragment = "includedefault"`, only tagged fields are included,
//! otherwise every field is. Children are bound to the nested record of their
//! field; fields without a nested record have no child.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::bind;
use crate::error::Result;
use crate::parser;
use crate::schema::{Field, RecordSchema};
use crate::selection::SelectionInput;
use crate::untyped::UntypedSelection;

type Fields = BTreeMap<usize, Option<StructSelection>>;

#[derive(Clone)]
pub struct StructSelection {
    record: Arc<RecordSchema>,
    fields: Option<Arc<Fields>>,
}

impl PartialEq for StructSelection {
    fn eq(&self, other: &Self) -> bool {
        self.record.same_type(&other.record) && self.fields == other.fields
    }
}

/// The child a field gets when it is included in full.
fn full_child(field: &Field) -> Option<StructSelection> {
    field.record().map(|r| StructSelection::new(&r))
}

impl StructSelection {
    /// An undefined selection: the record's default fields.
    pub fn new(record: &Arc<RecordSchema>) -> Self {
        Self {
            record: Arc::clone(record),
            fields: None,
        }
    }

    /// A selection of no field.
    pub fn empty(record: &Arc<RecordSchema>) -> Self {
        Self {
            record: Arc::clone(record),
            fields: Some(Arc::default()),
        }
    }

    /// Every field of the record, each included in full.
    pub fn complete(record: &Arc<RecordSchema>) -> Self {
        let mut s = Self::empty(record);
        for field in record.fields() {
            s.insert(field.index(), full_child(field));
        }
        s
    }

    /// Bind any selection input to `record`.
    pub fn parse(record: &Arc<RecordSchema>, input: impl Into<SelectionInput>) -> Result<Self> {
        bind::bind_input(record, input.into())
    }

    pub fn record(&self) -> &Arc<RecordSchema> {
        &self.record
    }

    pub fn is_undefined(&self) -> bool {
        self.fields.is_none()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.as_ref().is_some_and(|f| f.is_empty())
    }

    pub fn is_undefined_or_empty(&self) -> bool {
        self.fields.as_ref().is_none_or(|f| f.is_empty())
    }

    /// Number of included fields, counting default fields when undefined.
    pub fn len(&self) -> usize {
        match &self.fields {
            Some(f) => f.len(),
            None => self.default_fields().count(),
        }
    }

    fn default_fields(&self) -> impl Iterator<Item = &Field> {
        self.record
            .fields()
            .iter()
            .filter(|f| bind::is_default_field(&self.record, f))
    }

    fn fields_mut(&mut self) -> &mut Fields {
        Arc::make_mut(self.fields.get_or_insert_with(Arc::default))
    }

    pub(crate) fn insert(&mut self, index: usize, child: Option<StructSelection>) {
        self.fields_mut().insert(index, child);
    }

    fn remove_index(&mut self, index: usize) {
        self.fields_mut().remove(&index);
    }

    fn explicit(&self, index: usize) -> Option<&Option<StructSelection>> {
        self.fields.as_ref().and_then(|f| f.get(&index))
    }

    /// Included fields in index order with their child selection.
    pub fn fields(&self) -> Vec<(&Field, Option<StructSelection>)> {
        match &self.fields {
            Some(_) => self.explicit_fields(),
            None => self.default_fields().map(|f| (f, full_child(f))).collect(),
        }
    }

    /// Explicitly selected fields in index order. Empty when undefined.
    pub fn explicit_fields(&self) -> Vec<(&Field, Option<StructSelection>)> {
        self.fields
            .iter()
            .flat_map(|f| f.iter())
            .map(|(idx, child)| (self.record.ensure_field(*idx), child.clone()))
            .collect()
    }

    /// Whether the field at `index` is included. Unknown indices are not.
    pub fn has_by_index(&self, index: usize) -> bool {
        let Some(field) = self.record.field(index) else {
            return false;
        };
        match &self.fields {
            None => bind::is_default_field(&self.record, field),
            Some(f) => f.contains_key(&index),
        }
    }

    /// Whether the named field is included. Unknown names are not.
    pub fn has_by_name(&self, name: &str) -> bool {
        self.record
            .field_index_by_name(name)
            .is_some_and(|idx| self.has_by_index(idx))
    }

    /// The selection of a field: the explicit child, or an undefined one.
    /// `None` for fields without a nested record.
    ///
    /// Panics on an unknown index.
    pub fn field_selection(&self, index: usize) -> Option<StructSelection> {
        let field = self.record.ensure_field(index);
        match self.explicit(index) {
            Some(child) => child.clone(),
            None => full_child(field),
        }
    }

    /// Like [`StructSelection::field_selection`], by name.
    pub fn field_by_name(&self, name: &str) -> Option<StructSelection> {
        self.field_selection(self.record.ensure_field_by_name(name).index())
    }

    /// The schema field and selection at `index`.
    pub fn field(&self, index: usize) -> (&Field, Option<StructSelection>) {
        (self.record.ensure_field(index), self.field_selection(index))
    }

    /// Include fields in full. An undefined selection stops including its defaults.
    ///
    /// Panics on an unknown index.
    #[must_use]
    pub fn add(&self, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut s = self.clone();
        let mut added = false;
        for index in indices {
            let field = self.record.ensure_field(index);
            added = true;
            s.fields_mut().entry(index).or_insert_with(|| full_child(field));
        }
        if added {
            s
        } else {
            self.clone()
        }
    }

    #[must_use]
    pub fn add_by_name<S: AsRef<str>>(&self, names: impl IntoIterator<Item = S>) -> Self {
        let indices: Vec<usize> = names
            .into_iter()
            .map(|n| self.record.ensure_field_by_name(n.as_ref()).index())
            .collect();
        self.add(indices)
    }

    /// Include fields that are not already included, keeping default fields.
    #[must_use]
    pub fn add_excluded(&self, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut s = self.clone();
        for index in indices {
            let field = self.record.ensure_field(index);
            if s.has_by_index(index) {
                continue;
            }
            s = s.ensure_defined();
            s.insert(index, full_child(field));
        }
        s
    }

    #[must_use]
    pub fn add_excluded_by_name<S: AsRef<str>>(&self, names: impl IntoIterator<Item = S>) -> Self {
        let indices: Vec<usize> = names
            .into_iter()
            .map(|n| self.record.ensure_field_by_name(n.as_ref()).index())
            .collect();
        self.add_excluded(indices)
    }

    /// Exclude fields. Default fields of an undefined selection are kept.
    #[must_use]
    pub fn remove(&self, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut s = self.clone();
        for index in indices {
            self.record.ensure_field(index);
            if s.has_by_index(index) {
                s = s.ensure_defined();
                s.remove_index(index);
            }
        }
        s
    }

    #[must_use]
    pub fn remove_by_name<S: AsRef<str>>(&self, names: impl IntoIterator<Item = S>) -> Self {
        let indices: Vec<usize> = names
            .into_iter()
            .map(|n| self.record.ensure_field_by_name(n.as_ref()).index())
            .collect();
        self.remove(indices)
    }

    /// Include a field with the given child selection, replacing any existing child.
    pub fn set(&self, index: usize, child: impl Into<SelectionInput>) -> Result<Self> {
        let field = self.record.ensure_field(index);
        let child = bind::bind_field(field, child.into())?;
        let mut s = self.clone();
        s.insert(index, child);
        Ok(s)
    }

    pub fn set_by_name(&self, name: &str, child: impl Into<SelectionInput>) -> Result<Self> {
        self.set(self.record.ensure_field_by_name(name).index(), child)
    }

    /// Include a field, merging the given child into any existing child.
    pub fn assign_to_field(&self, index: usize, child: impl Into<SelectionInput>) -> Result<Self> {
        let field = self.record.ensure_field(index);
        let child = bind::bind_field(field, child.into())?;
        let merged = match self.explicit(index) {
            Some(Some(current)) => child.map(|c| merge_child(current, &c)),
            _ => child,
        };
        let mut s = self.clone();
        s.insert(index, merged);
        Ok(s)
    }

    pub fn assign_to_field_by_name(&self, name: &str, child: impl Into<SelectionInput>) -> Result<Self> {
        self.assign_to_field(self.record.ensure_field_by_name(name).index(), child)
    }

    /// Whether every field of `query` is included. Invalid queries are never included.
    pub fn has(&self, query: impl Into<SelectionInput>) -> bool {
        match bind::bind_input(&self.record, query.into()) {
            Ok(q) => self.has_selection(&q),
            Err(_) => false,
        }
    }

    /// An undefined query asks for the record's default fields.
    pub fn has_selection(&self, query: &StructSelection) -> bool {
        if !self.record.same_type(&query.record) {
            return false;
        }
        if query.is_undefined() {
            return self.is_undefined() || query.default_fields().all(|f| self.has_by_index(f.index()));
        }
        query.explicit_fields().into_iter().all(|(field, q)| {
            if !self.has_by_index(field.index()) {
                return false;
            }
            match (q, self.field_selection(field.index())) {
                (Some(q), Some(current)) if !q.is_undefined() => current.has_selection(&q),
                _ => true,
            }
        })
    }

    /// The fields of `self` that are also in `query`.
    pub fn pick(&self, query: impl Into<SelectionInput>) -> Result<Self> {
        Ok(self.pick_selection(&bind::bind_input(&self.record, query.into())?))
    }

    /// Panics if `query` is bound to another record.
    #[must_use]
    pub fn pick_selection(&self, query: &StructSelection) -> Self {
        self.expect_same_record(query);
        if query.is_undefined() {
            return self.retain_defaults();
        }
        let current = self.ensure_defined();
        let mut picked = Self::empty(&self.record);
        for (field, q) in query.explicit_fields() {
            let Some(existing) = current.explicit(field.index()) else {
                continue;
            };
            let child = match (existing, q) {
                (Some(c), Some(q)) if q.is_undefined() => Some(c.clone()),
                (Some(c), Some(q)) if c.is_undefined() => {
                    Some(c.ensure_defined().pick_selection(&q))
                }
                (Some(c), Some(q)) => Some(c.pick_selection(&q)),
                (existing, _) => existing.clone(),
            };
            picked.insert(field.index(), child);
        }
        picked
    }

    /// Explicit fields that an undefined selection would include.
    fn retain_defaults(&self) -> Self {
        let Some(fields) = &self.fields else {
            return self.clone();
        };
        let mut s = Self::empty(&self.record);
        for (idx, child) in fields.iter() {
            if bind::is_default_field(&self.record, self.record.ensure_field(*idx)) {
                s.insert(*idx, child.clone());
            }
        }
        s
    }

    /// `self` without the fields of `query`.
    pub fn omit(&self, query: impl Into<SelectionInput>) -> Result<Self> {
        Ok(self.omit_selection(&bind::bind_input(&self.record, query.into())?))
    }

    /// Panics if `query` is bound to another record.
    #[must_use]
    pub fn omit_selection(&self, query: &StructSelection) -> Self {
        self.expect_same_record(query);
        if query.is_undefined_or_empty() {
            return self.clone();
        }
        let mut s = self.ensure_defined();
        for (field, q) in query.explicit_fields() {
            let index = field.index();
            let q = match q {
                Some(q) if !q.is_undefined() => q,
                _ => {
                    s.remove_index(index);
                    continue;
                }
            };
            if q.is_empty() {
                continue;
            }
            let Some(Some(current)) = s.explicit(index) else {
                continue;
            };
            let rest = current.omit_selection(&q);
            if rest.is_empty() {
                s.remove_index(index);
            } else {
                s.insert(index, Some(rest));
            }
        }
        s
    }

    /// Deep union with `other`.
    pub fn assign(&self, other: impl Into<SelectionInput>) -> Result<Self> {
        Ok(self.assign_selection(&bind::bind_input(&self.record, other.into())?))
    }

    /// Panics if `other` is bound to another record.
    #[must_use]
    pub fn assign_selection(&self, other: &StructSelection) -> Self {
        self.expect_same_record(other);
        if other.is_undefined() {
            if self.is_undefined() {
                return self.clone();
            }
            let defaults: Vec<usize> = other.default_fields().map(Field::index).collect();
            return self.add_excluded(defaults);
        }
        let mut s = if self.is_undefined() {
            Self::empty(&self.record)
        } else {
            self.clone()
        };
        for (field, o) in other.explicit_fields() {
            let merged = match (s.explicit(field.index()), o) {
                (Some(Some(current)), Some(o)) => Some(merge_child(current, &o)),
                (Some(current), None) => current.clone(),
                (_, o) => o,
            };
            s.insert(field.index(), merged);
        }
        s
    }

    fn expect_same_record(&self, other: &StructSelection) {
        if !self.record.same_type(&other.record) {
            panic!(
                "expected selection of {} but received selection of {}",
                self.record.name(),
                other.record.name()
            );
        }
    }

    /// Materialize an undefined selection as its default fields.
    #[must_use]
    pub fn ensure_defined(&self) -> Self {
        if !self.is_undefined() {
            return self.clone();
        }
        let mut s = Self::empty(&self.record);
        for field in self.default_fields() {
            s.insert(field.index(), full_child(field));
        }
        s
    }

    /// The empty selection of the same record.
    #[must_use]
    pub fn clear(&self) -> Self {
        Self::empty(&self.record)
    }

    /// Rebind to another record through the serialized field names.
    pub fn to_type(&self, record: &Arc<RecordSchema>) -> Result<Self> {
        if self.record.same_type(record) {
            return Ok(self.clone());
        }
        if self.is_undefined() {
            return Ok(Self::new(record));
        }
        bind::bind_untyped(record, &self.to_unstructured())
    }

    /// The selection keyed by serialized names.
    ///
    /// Undefined children whose record has include-by-default fields are
    /// expanded, so the result does not depend on this record's schema.
    pub fn to_unstructured(&self) -> UntypedSelection {
        self.expand_nested_defaults(&mut vec![]).untyped_by_json_name()
    }

    fn untyped_by_json_name(&self) -> UntypedSelection {
        let Some(fields) = &self.fields else {
            return UntypedSelection::undefined();
        };
        let mut s = UntypedSelection::empty();
        for (idx, child) in fields.iter() {
            let Some(name) = self.record.ensure_field(*idx).serialized_name() else {
                continue;
            };
            let child = child
                .as_ref()
                .map(|c| c.untyped_by_json_name())
                .unwrap_or_else(UntypedSelection::undefined);
            // Two fields may share a serialized name.
            let child = match s.field(name) {
                Some(existing) => existing.assign_selection(&child),
                None => child,
            };
            s.insert(Arc::clone(name), child);
        }
        s
    }

    fn expand_nested_defaults(&self, expanding: &mut Vec<u64>) -> Self {
        let Some(fields) = &self.fields else {
            return self.clone();
        };
        expanding.push(self.record.id());
        let mut s = self.clone();
        for (idx, child) in fields.iter() {
            let Some(child) = child else {
                continue;
            };
            let expanded = if !child.is_undefined() {
                child.expand_nested_defaults(expanding)
            } else if bind::has_include_defaults(&child.record) {
                bind::expand_defaults_in(&child.record, expanding)
            } else {
                continue;
            };
            s.insert(*idx, Some(expanded));
        }
        expanding.pop();
        s
    }

    /// Canonical expression with field names: `""` when undefined, `"{}"` when empty.
    pub fn expr(&self) -> String {
        self.render(|f| Some(f.name()))
    }

    /// Canonical expression with serialized names. Fields that are not
    /// serializable are left out.
    pub fn json_expr(&self) -> String {
        self.render(Field::serialized_name)
    }

    fn render<'a, N>(&'a self, name_of: N) -> String
    where
        N: Fn(&'a Field) -> Option<&'a Arc<str>> + Copy,
    {
        let Some(fields) = &self.fields else {
            return String::new();
        };
        parser::render_fields(fields.iter().filter_map(|(idx, child)| {
            let name = name_of(self.record.ensure_field(*idx))?;
            let child = child.as_ref().map(|c| c.render(name_of)).unwrap_or_default();
            Some((Arc::clone(name), child))
        }))
    }
}

fn merge_child(current: &StructSelection, other: &StructSelection) -> StructSelection {
    if other.is_undefined() {
        current.clone()
    } else if current.is_undefined() {
        other.clone()
    } else {
        current.assign_selection(other)
    }
}

impl fmt::Display for StructSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr().as_str() {
            "" => write!(f, "{}Selection(*)", self.record.name()),
            expr => write!(f, "{}Selection({expr})", self.record.name()),
        }
    }
}

impl fmt::Debug for StructSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
