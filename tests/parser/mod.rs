// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use anyhow::{bail, Result};
use fieldsel::*;
use proptest::prelude::*;
use serde::{Deserialize, Serialize};
use test_generator::test_resources;

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Case {
    pub note: String,
    pub expr: String,
    pub render: Option<String>,
    pub fields: Option<usize>,
    pub undefined: Option<bool>,
    pub error: Option<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Debug)]
struct Test {
    cases: Vec<Case>,
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;

    for case in &test.cases {
        print!("case {} ", &case.note);

        match (parse(&case.expr), &case.error) {
            (Ok(selection), None) => {
                if let Some(render) = &case.render {
                    assert_eq!(&selection.expr(), render, "{}", case.note);
                }
                if let Some(fields) = case.fields {
                    assert_eq!(selection.len(), fields, "{}", case.note);
                }
                assert_eq!(
                    selection.is_undefined(),
                    case.undefined.unwrap_or(false),
                    "{}",
                    case.note
                );
                // Rendering is canonical.
                assert_eq!(parse(&selection.expr())?, selection, "{}", case.note);
            }
            (Ok(selection), Some(expected)) => {
                bail!("expected error `{expected}` but parsed {selection}")
            }
            (Err(actual), Some(expected)) => {
                let actual = actual.to_string();
                if !actual.contains(expected) {
                    bail!(
                        "Error message\n`{}\n`\ndoes not contain `{}`",
                        actual,
                        expected
                    );
                }
            }
            (Err(actual), None) => return Err(actual.into()),
        }

        println!("passed");
    }
    println!("{} cases passed.", test.cases.len());
    Ok(())
}

fn yaml_test(file: &str) -> Result<()> {
    match yaml_test_impl(file) {
        Ok(_) => Ok(()),
        Err(e) => {
            // If Err is returned, it doesn't always get printed by cargo test.
            // Therefore, panic with the error.
            panic!("{}", e);
        }
    }
}

#[test_resources("tests/parser/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

#[test]
fn nested_fields() -> Result<()> {
    let s = parse("a, b, c { d, f, g }, h")?;
    let names: Vec<_> = s.names().map(|n| n.to_string()).collect();
    assert_eq!(names, ["a", "b", "c", "h"]);

    let Some(c) = s.field("c") else {
        bail!("c missing from {s}");
    };
    let names: Vec<_> = c.names().map(|n| n.to_string()).collect();
    assert_eq!(names, ["d", "f", "g"]);
    assert!(s.field("a").is_some_and(UntypedSelection::is_undefined));
    Ok(())
}

#[test]
fn empty_and_undefined() -> Result<()> {
    let empty = parse("{}")?;
    assert!(!empty.is_undefined());
    assert_eq!(empty.len(), 0);
    assert!(parse("")?.is_undefined());
    Ok(())
}

#[test]
fn errors_are_typed() {
    for expr in ["fieldA {", "{"] {
        match parse(expr) {
            Err(e) => assert!(
                matches!(e.kind(), ErrorKind::MissingClosingBrace { .. }),
                "{expr}: {e}"
            ),
            Ok(s) => panic!("{expr} parsed to {s}"),
        }
    }
    let err = parse("a { b { c }").unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::MissingClosingBrace { .. }));
}

#[test]
fn selection_inputs_from_json() -> Result<()> {
    let input = SelectionInput::try_from(serde_json::json!({
        "user": ["name", "email"],
        "posts": "title",
        "meta": null,
    }))?;
    assert_eq!(
        input.into_untyped()?.expr(),
        "{ meta, posts { title }, user { email, name } }"
    );
    assert!(SelectionInput::try_from(serde_json::json!(3)).is_err());
    assert!(SelectionInput::try_from(serde_json::json!([1])).is_err());
    Ok(())
}

fn name() -> impl Strategy<Value = String> {
    "[a-z][a-zA-Z0-9_]{0,6}"
}

/// Selections with unique names at every level.
pub fn untyped_selection() -> impl Strategy<Value = UntypedSelection> {
    let leaf = Just(UntypedSelection::undefined());
    leaf.prop_recursive(4, 32, 5, |inner| {
        prop::collection::btree_map(name(), inner, 0..5).prop_map(|fields| {
            fields
                .into_iter()
                .fold(UntypedSelection::empty(), |s, (name, child)| s.set(name, child))
        })
    })
}

proptest! {
    #[test]
    fn render_round_trips(selection in untyped_selection()) {
        let rendered = selection.expr();
        let reparsed = parse(&rendered).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(&reparsed, &selection);
        prop_assert_eq!(reparsed.expr(), rendered);
    }

    #[test]
    fn parse_never_panics(expr in "[a-c{}, ]{0,16}") {
        let _ = parse(&expr);
    }
}
