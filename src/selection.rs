// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use core::fmt;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::parser;
use crate::schema::RecordSchema;
use crate::structured::StructSelection;
use crate::untyped::UntypedSelection;

/// Anything that can be normalized into a selection.
#[derive(Debug, Clone)]
pub enum SelectionInput {
    /// No selection: undefined.
    None,
    /// A selection expression such as `"a, b { c }"`.
    Expr(String),
    /// Field names, each included in full.
    Names(Vec<String>),
    /// Field names mapped to their child selections.
    Map(BTreeMap<String, SelectionInput>),
    Untyped(UntypedSelection),
    Typed(StructSelection),
}

impl SelectionInput {
    /// Normalize into an untyped selection.
    pub fn into_untyped(self) -> Result<UntypedSelection> {
        match self {
            SelectionInput::None => Ok(UntypedSelection::undefined()),
            SelectionInput::Expr(expr) => parser::parse(&expr),
            SelectionInput::Names(names) => Ok(UntypedSelection::undefined().add(names)),
            SelectionInput::Map(map) => {
                let mut selection = UntypedSelection::empty();
                for (name, child) in map {
                    let child = child.into_untyped().map_err(|e| e.register(name.as_str()))?;
                    selection.insert(name.into(), child);
                }
                Ok(selection)
            }
            SelectionInput::Untyped(s) => Ok(s),
            SelectionInput::Typed(s) => Ok(s.to_unstructured()),
        }
    }

    /// Bind to a record schema.
    pub fn into_structured(self, record: &Arc<RecordSchema>) -> Result<StructSelection> {
        crate::bind::bind_input(record, self)
    }
}

impl From<&str> for SelectionInput {
    fn from(expr: &str) -> Self {
        SelectionInput::Expr(expr.to_string())
    }
}

impl From<String> for SelectionInput {
    fn from(expr: String) -> Self {
        SelectionInput::Expr(expr)
    }
}

impl From<&String> for SelectionInput {
    fn from(expr: &String) -> Self {
        SelectionInput::Expr(expr.clone())
    }
}

impl From<Vec<String>> for SelectionInput {
    fn from(names: Vec<String>) -> Self {
        SelectionInput::Names(names)
    }
}

impl From<Vec<&str>> for SelectionInput {
    fn from(names: Vec<&str>) -> Self {
        SelectionInput::Names(names.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for SelectionInput {
    fn from(names: &[&str]) -> Self {
        SelectionInput::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for SelectionInput {
    fn from(names: [&str; N]) -> Self {
        SelectionInput::Names(names.iter().map(|n| n.to_string()).collect())
    }
}

impl From<BTreeMap<String, SelectionInput>> for SelectionInput {
    fn from(map: BTreeMap<String, SelectionInput>) -> Self {
        SelectionInput::Map(map)
    }
}

impl From<UntypedSelection> for SelectionInput {
    fn from(s: UntypedSelection) -> Self {
        SelectionInput::Untyped(s)
    }
}

impl From<&UntypedSelection> for SelectionInput {
    fn from(s: &UntypedSelection) -> Self {
        SelectionInput::Untyped(s.clone())
    }
}

impl From<StructSelection> for SelectionInput {
    fn from(s: StructSelection) -> Self {
        SelectionInput::Typed(s)
    }
}

impl From<&StructSelection> for SelectionInput {
    fn from(s: &StructSelection) -> Self {
        SelectionInput::Typed(s.clone())
    }
}

impl From<Selection> for SelectionInput {
    fn from(s: Selection) -> Self {
        match s {
            Selection::Typed(s) => SelectionInput::Typed(s),
            Selection::Untyped(s) => SelectionInput::Untyped(s),
        }
    }
}

impl<T: Into<SelectionInput>> From<Option<T>> for SelectionInput {
    fn from(v: Option<T>) -> Self {
        v.map_or(SelectionInput::None, Into::into)
    }
}

impl TryFrom<&serde_json::Value> for SelectionInput {
    type Error = crate::Error;

    /// `null` and `true` select everything, strings are expressions, arrays
    /// list names and objects map names to child selections.
    fn try_from(value: &serde_json::Value) -> Result<Self> {
        use serde_json::Value as Json;
        match value {
            Json::Null | Json::Bool(true) => Ok(SelectionInput::None),
            Json::String(s) => Ok(SelectionInput::Expr(s.clone())),
            Json::Array(items) => {
                let mut names = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Json::String(s) => names.push(s.clone()),
                        other => {
                            return Err(ErrorKind::InvalidInput(format!(
                                "non-string field name {other}"
                            ))
                            .into())
                        }
                    }
                }
                Ok(SelectionInput::Names(names))
            }
            Json::Object(map) => {
                let mut children = BTreeMap::new();
                for (name, child) in map {
                    let child =
                        SelectionInput::try_from(child).map_err(|e| e.register(name.as_str()))?;
                    children.insert(name.clone(), child);
                }
                Ok(SelectionInput::Map(children))
            }
            other => Err(ErrorKind::InvalidInput(other.to_string()).into()),
        }
    }
}

impl TryFrom<serde_json::Value> for SelectionInput {
    type Error = crate::Error;

    fn try_from(value: serde_json::Value) -> Result<Self> {
        SelectionInput::try_from(&value)
    }
}

/// Operations shared by both selection representations.
pub trait Fragment {
    /// No explicit selection.
    fn is_undefined(&self) -> bool;
    /// Explicitly selects no field.
    fn is_empty(&self) -> bool;
    fn is_undefined_or_empty(&self) -> bool {
        self.is_undefined() || self.is_empty()
    }
    fn len(&self) -> usize;
    fn has_by_name(&self, name: &str) -> bool;
    fn expr(&self) -> String;
    fn json_expr(&self) -> String;
}

impl Fragment for UntypedSelection {
    fn is_undefined(&self) -> bool {
        UntypedSelection::is_undefined(self)
    }

    fn is_empty(&self) -> bool {
        UntypedSelection::is_empty(self)
    }

    fn len(&self) -> usize {
        UntypedSelection::len(self)
    }

    fn has_by_name(&self, name: &str) -> bool {
        UntypedSelection::has_by_name(self, name)
    }

    fn expr(&self) -> String {
        UntypedSelection::expr(self)
    }

    fn json_expr(&self) -> String {
        UntypedSelection::json_expr(self)
    }
}

impl Fragment for StructSelection {
    fn is_undefined(&self) -> bool {
        StructSelection::is_undefined(self)
    }

    fn is_empty(&self) -> bool {
        StructSelection::is_empty(self)
    }

    fn len(&self) -> usize {
        StructSelection::len(self)
    }

    fn has_by_name(&self, name: &str) -> bool {
        StructSelection::has_by_name(self, name)
    }

    fn expr(&self) -> String {
        StructSelection::expr(self)
    }

    fn json_expr(&self) -> String {
        StructSelection::json_expr(self)
    }
}

/// A selection of either representation.
///
/// Queries are normalized against the receiver: a typed receiver binds them to
/// its record, an untyped receiver parses them by name.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Typed(StructSelection),
    Untyped(UntypedSelection),
}

impl Selection {
    pub fn parse(input: impl Into<SelectionInput>) -> Result<Self> {
        Ok(Selection::Untyped(input.into().into_untyped()?))
    }

    pub fn has(&self, query: impl Into<SelectionInput>) -> bool {
        match self {
            Selection::Typed(s) => s.has(query),
            Selection::Untyped(s) => s.has(query),
        }
    }

    pub fn pick(&self, query: impl Into<SelectionInput>) -> Result<Self> {
        Ok(match self {
            Selection::Typed(s) => Selection::Typed(s.pick(query)?),
            Selection::Untyped(s) => Selection::Untyped(s.pick(query)?),
        })
    }

    pub fn omit(&self, query: impl Into<SelectionInput>) -> Result<Self> {
        Ok(match self {
            Selection::Typed(s) => Selection::Typed(s.omit(query)?),
            Selection::Untyped(s) => Selection::Untyped(s.omit(query)?),
        })
    }

    pub fn assign(&self, other: impl Into<SelectionInput>) -> Result<Self> {
        Ok(match self {
            Selection::Typed(s) => Selection::Typed(s.assign(other)?),
            Selection::Untyped(s) => Selection::Untyped(s.assign(other)?),
        })
    }

    pub fn as_typed(&self) -> Option<&StructSelection> {
        match self {
            Selection::Typed(s) => Some(s),
            Selection::Untyped(_) => None,
        }
    }

    pub fn to_untyped(&self) -> UntypedSelection {
        match self {
            Selection::Typed(s) => s.to_unstructured(),
            Selection::Untyped(s) => s.clone(),
        }
    }

    /// Bind to a record schema. Typed selections must already be bound to it.
    pub fn to_structured(&self, record: &Arc<RecordSchema>) -> Result<StructSelection> {
        SelectionInput::from(self.clone()).into_structured(record)
    }
}

impl Fragment for Selection {
    fn is_undefined(&self) -> bool {
        match self {
            Selection::Typed(s) => s.is_undefined(),
            Selection::Untyped(s) => s.is_undefined(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Selection::Typed(s) => s.is_empty(),
            Selection::Untyped(s) => s.is_empty(),
        }
    }

    fn len(&self) -> usize {
        match self {
            Selection::Typed(s) => s.len(),
            Selection::Untyped(s) => s.len(),
        }
    }

    fn has_by_name(&self, name: &str) -> bool {
        match self {
            Selection::Typed(s) => s.has_by_name(name),
            Selection::Untyped(s) => s.has_by_name(name),
        }
    }

    fn expr(&self) -> String {
        match self {
            Selection::Typed(s) => s.expr(),
            Selection::Untyped(s) => s.expr(),
        }
    }

    fn json_expr(&self) -> String {
        match self {
            Selection::Typed(s) => s.json_expr(),
            Selection::Untyped(s) => s.json_expr(),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Typed(s) => fmt::Display::fmt(s, f),
            Selection::Untyped(s) => fmt::Display::fmt(s, f),
        }
    }
}

impl From<StructSelection> for Selection {
    fn from(s: StructSelection) -> Self {
        Selection::Typed(s)
    }
}

impl From<UntypedSelection> for Selection {
    fn from(s: UntypedSelection) -> Self {
        Selection::Untyped(s)
    }
}
