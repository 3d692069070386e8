// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use fieldsel::schema::registry;
use fieldsel::*;
use serde::Deserialize;
use test_generator::test_resources;

#[derive(Deserialize, Debug)]
struct Case {
    pub note: String,
    pub record: String,
    pub selection: Option<String>,
    pub value: serde_json::Value,
    pub want: Option<serde_json::Value>,
    pub error: Option<String>,
}

#[derive(Deserialize, Debug)]
struct Test {
    #[serde(default)]
    records: Vec<RecordSchema>,
    cases: Vec<Case>,
}

fn run_case(case: &Case) -> Result<serde_json::Value> {
    let Some(record) = registry::get(&case.record) else {
        bail!("record {} is not registered", case.record);
    };
    let value: Value = serde_json::from_value(case.value.clone())?;
    let value = Type::record(&record).convert(&value)?;
    let selection = StructSelection::parse(&record, case.selection.as_deref())?;
    Ok(serde_json::to_value(project(&selection, &value)?)?)
}

fn yaml_test_impl(file: &str) -> Result<()> {
    println!("\nrunning {}", file);

    let yaml = std::fs::read_to_string(file)?;
    let test: Test = serde_yaml::from_str(&yaml)?;
    for record in test.records {
        registry::register(Arc::new(record))?;
    }

    for case in &test.cases {
        print!("case {} ", &case.note);

        match (run_case(case), &case.want, &case.error) {
            (Ok(actual), Some(want), None) => {
                assert_eq!(&actual, want, "{}", case.note);
            }
            (Err(actual), None, Some(expected)) => {
                let actual = actual.to_string();
                if !actual.contains(expected) {
                    bail!(
                        "Error message\n`{}\n`\ndoes not contain `{}`",
                        actual,
                        expected
                    );
                }
            }
            (Err(actual), Some(_), None) => return Err(actual),
            (Ok(actual), None, Some(expected)) => {
                bail!("expected error `{expected}` but projected {actual}")
            }
            _ => bail!("case {} needs exactly one of want and error", case.note),
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

#[test_resources("tests/project/cases/*.yaml")]
fn run(path: &str) {
    yaml_test(path).unwrap()
}

fn profile() -> Arc<RecordSchema> {
    RecordSchema::builder("ProjectProfile")
        .field(Field::new("Nick", Type::String).json("nick"))
        .field(Field::new("Score", Type::Integer).json("score").omit_empty())
        .field(Field::new("Verified", Type::Boolean).json("verified").omit_empty())
        .build()
}

#[test]
fn null_rule_for_omit_empty_zero_values() -> Result<()> {
    let record = profile();
    let value = Value::from(Record::new(&record).with("Nick", "n")?);

    let explicit = StructSelection::parse(&record, "score")?;
    assert_eq!(to_json_string(&explicit, &value)?, r#"{"score":null}"#);

    let undefined = StructSelection::new(&record);
    assert_eq!(to_json_string(&undefined, &value)?, r#"{"nick":"n"}"#);
    Ok(())
}

#[test]
fn refs_to_zero_are_defined() -> Result<()> {
    let record = profile();
    let mut r = Record::new(&record);
    r.set("Score", Value::new_ref(0))?;
    r.set("Verified", Value::new_ref(false))?;
    let value = Value::from(r);

    let projected = project(&StructSelection::new(&record), &value)?;
    assert_eq!(projected["score"], Value::from(0));
    assert_eq!(projected["verified"], Value::from(false));
    assert!(!is_value_undefined(&Value::new_ref(0)));
    assert!(is_value_undefined(&Value::from(0)));
    Ok(())
}

#[test]
fn lists_of_records_keep_their_length() -> Result<()> {
    let record = profile();
    let items = Value::from(vec![
        Value::from(Record::new(&record).with("Nick", "a")?),
        Value::Null,
        Value::from(Record::new(&record).with("Score", 4)?),
    ]);
    let projected = project(&StructSelection::parse(&record, "nick")?, &items)?;
    assert_eq!(
        serde_json::to_string(&projected)?,
        r#"[{"nick":"a"},null,{"nick":null}]"#
    );
    Ok(())
}

#[test]
fn mismatched_values_are_errors() -> Result<()> {
    let record = profile();
    let other = RecordSchema::builder("ProjectOther").build();
    let err = project(&StructSelection::new(&record), &Value::from(Record::new(&other)))
        .err()
        .ok_or_else(|| anyhow!("projection of another record succeeded"))?;
    assert_eq!(
        err.to_string(),
        "type mismatch: expected ProjectProfile, but received ProjectOther"
    );
    Ok(())
}

#[test]
fn untyped_selections_bind_to_the_value() -> Result<()> {
    let record = profile();
    let value = Value::from(Record::new(&record).with("Nick", "z")?);
    let selection = Selection::parse("nick")?;
    let projected = project_selection(Some(&selection), &value)?;
    assert_eq!(serde_json::to_string(&projected)?, r#"{"nick":"z"}"#);
    Ok(())
}
