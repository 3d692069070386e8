// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Selection expressions.
//!
//! ```text
//! expr       := field-list
//! field-list := field ( "," field )*
//! field      := name ( brace-block )?
//! brace-block:= "{" field-list? "}"
//! ```
//!
//! Names are trimmed and may contain inner whitespace. An expression wholly
//! wrapped in braces is unwrapped once, so `"{ a, b }"` and `"a, b"` are the
//! same selection. `"{}"` is the empty selection and `""` is undefined.

use std::sync::Arc;

use crate::error::{ErrorKind, Result};
use crate::untyped::UntypedSelection;

/// Parse a selection expression into an untyped selection.
pub fn parse(expr: &str) -> Result<UntypedSelection> {
    let expr = expr.trim();
    if expr.is_empty() {
        return Ok(UntypedSelection::undefined());
    }
    let body = match unwrap_braces(expr) {
        Some(inner) if inner.trim().is_empty() => return Ok(UntypedSelection::empty()),
        Some(inner) => inner,
        None => expr,
    };
    parse_fields(body)
}

/// The text between the outer braces if the first `{` is closed by the final `}`.
fn unwrap_braces(expr: &str) -> Option<&str> {
    let bytes = expr.as_bytes();
    if bytes.len() < 2 || bytes[0] != b'{' || bytes[bytes.len() - 1] != b'}' {
        return None;
    }
    let mut depth = 0usize;
    for (idx, b) in bytes.iter().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return (idx == bytes.len() - 1).then(|| &expr[1..idx]);
                }
            }
            _ => (),
        }
    }
    None
}

fn parse_fields(body: &str) -> Result<UntypedSelection> {
    let mut selection = UntypedSelection::undefined();
    for part in split_by_comma(body)? {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (name, block) = split_field(part)?;
        let Some(block) = block else {
            selection.insert(Arc::from(name), UntypedSelection::undefined());
            continue;
        };
        let child = parse_block(block).map_err(|e| e.register(name))?;
        selection.insert(Arc::from(name), child);
    }
    Ok(selection)
}

/// Parse the inside of a nested brace block.
///
/// Whitespace-only blocks are explicitly empty. Blocks that contain no
/// field (such as `{ , }`) are undefined, so the field is a bare inclusion.
fn parse_block(block: &str) -> Result<UntypedSelection> {
    let inner = &block[1..block.len() - 1];
    if inner.trim().is_empty() {
        return Ok(UntypedSelection::empty());
    }
    parse_fields(inner)
}

/// Split at depth-0 commas, validating brace balance.
fn split_by_comma(body: &str) -> Result<Vec<&str>> {
    let mut parts = vec![];
    let mut depth = 0usize;
    let mut start = 0;
    for (idx, b) in body.bytes().enumerate() {
        match b {
            b'{' => depth += 1,
            b'}' if depth == 0 => {
                return Err(ErrorKind::UnexpectedClosingBrace {
                    index: idx,
                    expr: body.to_string(),
                }
                .into())
            }
            b'}' => depth -= 1,
            b',' if depth == 0 => {
                parts.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => (),
        }
    }
    if depth != 0 {
        return Err(ErrorKind::MissingClosingBrace {
            expr: body.to_string(),
        }
        .into());
    }
    parts.push(&body[start..]);
    Ok(parts)
}

/// Split a balanced field part into its name and optional brace block.
fn split_field(part: &str) -> Result<(&str, Option<&str>)> {
    let Some(open) = part.find('{') else {
        return Ok((part, None));
    };
    let name = part[..open].trim();
    if name.is_empty() {
        return Err(ErrorKind::MissingFieldName {
            part: part.to_string(),
        }
        .into());
    }

    let mut depth = 0usize;
    let mut close = None;
    for (idx, b) in part.bytes().enumerate().skip(open) {
        match b {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    close = Some(idx);
                    break;
                }
            }
            _ => (),
        }
    }
    let Some(close) = close else {
        return Err(ErrorKind::MissingClosingBrace {
            expr: part.to_string(),
        }
        .into());
    };
    if !part[close + 1..].trim().is_empty() {
        return Err(ErrorKind::MoreThanOneSpace {
            part: part.to_string(),
        }
        .into());
    }
    Ok((name, Some(&part[open..=close])))
}

/// Render `(name, child expression)` pairs as `{ a, b { c } }`.
///
/// An empty child expression renders the bare name. No pairs render `{}`.
pub(crate) fn render_fields<I, N>(fields: I) -> String
where
    I: IntoIterator<Item = (N, String)>,
    N: AsRef<str>,
{
    let mut out = String::new();
    for (name, child) in fields {
        out.push_str(if out.is_empty() { "{ " } else { ", " });
        out.push_str(name.as_ref());
        if !child.is_empty() {
            out.push(' ');
            out.push_str(&child);
        }
    }
    if out.is_empty() {
        return "{}".to_string();
    }
    out.push_str(" }");
    out
}
