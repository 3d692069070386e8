// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

// Use README.md as crate documentation.
#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/README.md"))]

mod bind;
mod error;
mod parser;
mod path;
mod project;
pub mod schema;
mod selection;
mod structured;
mod untyped;
mod value;

pub use bind::{bind_field, expand_defaults, has_include_defaults, is_default_field, TYPENAME_FIELD};
pub use error::{Error, ErrorKind, Result};
pub use parser::parse;
pub use path::{FieldPath, PathSegment, StructPath, UntypedPath};
pub use project::{
    is_field_value_json_null, is_value_json_null, is_value_undefined, project, project_selection,
    to_json_string,
};
pub use schema::{Field, RecordSchema, Type};
pub use selection::{Fragment, Selection, SelectionInput};
pub use structured::StructSelection;
pub use untyped::UntypedSelection;
pub use value::{Number, Record, Value};
