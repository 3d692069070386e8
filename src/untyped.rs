// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::Result;
use crate::parser;
use crate::schema::RecordSchema;
use crate::selection::SelectionInput;
use crate::structured::StructSelection;

type Fields = BTreeMap<Arc<str>, UntypedSelection>;

/// A schema-free selection keyed by field name.
///
/// `None` fields mean the selection is undefined (everything is included).
/// An undefined child means the field is included in full.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct UntypedSelection {
    fields: Option<Arc<Fields>>,
}

impl UntypedSelection {
    pub fn undefined() -> Self {
        Self { fields: None }
    }

    pub fn empty() -> Self {
        Self {
            fields: Some(Arc::default()),
        }
    }

    /// Parse any selection input.
    pub fn parse(input: impl Into<SelectionInput>) -> Result<Self> {
        input.into().into_untyped()
    }

    pub fn is_undefined(&self) -> bool {
        self.fields.is_none()
    }

    /// Explicitly selects no field.
    pub fn is_empty(&self) -> bool {
        self.fields.as_ref().is_some_and(|f| f.is_empty())
    }

    pub fn is_undefined_or_empty(&self) -> bool {
        self.fields.as_ref().is_none_or(|f| f.is_empty())
    }

    pub fn len(&self) -> usize {
        self.fields.as_ref().map_or(0, |f| f.len())
    }

    /// Selected fields in name order.
    pub fn fields(&self) -> impl Iterator<Item = (&Arc<str>, &UntypedSelection)> {
        self.fields.iter().flat_map(|f| f.iter())
    }

    pub fn names(&self) -> impl Iterator<Item = &Arc<str>> {
        self.fields().map(|(name, _)| name)
    }

    /// The child selection of a field. `None` if the field is not explicitly selected.
    pub fn field(&self, name: &str) -> Option<&UntypedSelection> {
        self.fields.as_ref().and_then(|f| f.get(name))
    }

    /// Whether a field is included. Everything is included in an undefined selection.
    pub fn has_by_name(&self, name: &str) -> bool {
        match &self.fields {
            None => true,
            Some(f) => f.contains_key(name),
        }
    }

    /// Whether the nested field at `path` is included.
    pub fn has_path<S: AsRef<str>>(&self, path: &[S]) -> bool {
        let Some((first, rest)) = path.split_first() else {
            return true;
        };
        match &self.fields {
            None => true,
            Some(f) => f
                .get(first.as_ref())
                .is_some_and(|child| child.has_path(rest)),
        }
    }

    fn fields_mut(&mut self) -> &mut Fields {
        Arc::make_mut(self.fields.get_or_insert_with(Arc::default))
    }

    pub(crate) fn insert(&mut self, name: Arc<str>, child: UntypedSelection) {
        self.fields_mut().insert(name, child);
    }

    /// Include fields in full. Fields already present keep their child.
    #[must_use]
    pub fn add<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Arc<str>>,
    {
        let mut s = self.clone();
        let fields = s.fields_mut();
        for name in names {
            fields.entry(name.into()).or_default();
        }
        s
    }

    /// Remove fields. The result is never undefined unless no names are given.
    #[must_use]
    pub fn remove<I, S>(&self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut names = names.into_iter().peekable();
        if names.peek().is_none() {
            return self.clone();
        }
        let mut s = self.clone();
        let fields = s.fields_mut();
        for name in names {
            fields.remove(name.as_ref());
        }
        s
    }

    /// Include a field with the given child selection, replacing any existing child.
    #[must_use]
    pub fn set(&self, name: impl Into<Arc<str>>, child: UntypedSelection) -> Self {
        let mut s = self.clone();
        s.insert(name.into(), child);
        s
    }

    /// Materialize an undefined selection as an empty one.
    #[must_use]
    pub fn ensure_defined(&self) -> Self {
        match self.fields {
            None => Self::empty(),
            Some(_) => self.clone(),
        }
    }

    /// Whether every field of `query` is included. Unparsable queries are never included.
    pub fn has(&self, query: impl Into<SelectionInput>) -> bool {
        match query.into().into_untyped() {
            Ok(q) => self.has_selection(&q),
            Err(_) => false,
        }
    }

    pub fn has_selection(&self, query: &UntypedSelection) -> bool {
        if self.is_undefined() {
            return true;
        }
        query.fields().all(|(name, q)| match self.field(name) {
            None => false,
            Some(_) if q.is_undefined() => true,
            Some(child) => child.has_selection(q),
        })
    }

    /// The fields of `self` that are also in `query`.
    pub fn pick(&self, query: impl Into<SelectionInput>) -> Result<Self> {
        Ok(self.pick_selection(&query.into().into_untyped()?))
    }

    #[must_use]
    pub fn pick_selection(&self, query: &UntypedSelection) -> Self {
        if query.is_undefined() {
            return self.clone();
        }
        if self.is_undefined() {
            return query.clone();
        }
        let mut picked = Self::empty();
        for (name, q) in query.fields() {
            let Some(current) = self.field(name) else {
                continue;
            };
            let child = if q.is_undefined() {
                current.clone()
            } else if current.is_undefined() {
                q.clone()
            } else {
                current.pick_selection(q)
            };
            picked.insert(Arc::clone(name), child);
        }
        picked
    }

    /// `self` without the fields of `query`.
    pub fn omit(&self, query: impl Into<SelectionInput>) -> Result<Self> {
        Ok(self.omit_selection(&query.into().into_untyped()?))
    }

    #[must_use]
    pub fn omit_selection(&self, query: &UntypedSelection) -> Self {
        if query.is_undefined_or_empty() {
            return self.clone();
        }
        let mut s = self.ensure_defined();
        for (name, q) in query.fields() {
            let Some(current) = s.field(name) else {
                continue;
            };
            if q.is_undefined() {
                s.fields_mut().remove(name);
                continue;
            }
            if q.is_empty() {
                continue;
            }
            // Without a schema, "everything except" cannot be expressed.
            if current.is_undefined() {
                s.fields_mut().remove(name);
                continue;
            }
            let rest = current.omit_selection(q);
            if rest.is_empty() {
                s.fields_mut().remove(name);
            } else {
                s.insert(Arc::clone(name), rest);
            }
        }
        s
    }

    /// Deep union with `other`.
    pub fn assign(&self, other: impl Into<SelectionInput>) -> Result<Self> {
        Ok(self.assign_selection(&other.into().into_untyped()?))
    }

    #[must_use]
    pub fn assign_selection(&self, other: &UntypedSelection) -> Self {
        let mut s = self.clone();
        for (name, o) in other.fields() {
            let merged = match s.field(name) {
                None => o.clone(),
                Some(current) if o.is_undefined() => current.clone(),
                Some(current) if current.is_undefined() => o.clone(),
                Some(current) => current.assign_selection(o),
            };
            s.insert(Arc::clone(name), merged);
        }
        s
    }

    /// Bind to a record schema.
    pub fn to_structured(&self, record: &Arc<RecordSchema>) -> Result<StructSelection> {
        crate::bind::bind_untyped(record, self)
    }

    /// Canonical expression: `""` when undefined, `"{}"` when empty.
    pub fn expr(&self) -> String {
        match &self.fields {
            None => String::new(),
            Some(f) => parser::render_fields(f.iter().map(|(name, child)| (name, child.expr()))),
        }
    }

    /// Same as [`UntypedSelection::expr`]: names are already serialized names.
    pub fn json_expr(&self) -> String {
        self.expr()
    }
}

impl fmt::Display for UntypedSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.expr().as_str() {
            "" => f.write_str("Selection(*)"),
            expr => write!(f, "Selection({expr})"),
        }
    }
}

impl fmt::Debug for UntypedSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
