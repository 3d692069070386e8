// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use anyhow::Result;
use fieldsel::schema::registry;
use fieldsel::*;
use proptest::prelude::*;

use crate::parser::untyped_selection;

// Name, Age, Info with no default markers.
fn struct_a() -> Arc<RecordSchema> {
    RecordSchema::builder("SelectionA")
        .field(Field::new("Name", Type::String).json("name"))
        .field(Field::new("Age", Type::Integer).json("age"))
        .field(Field::new("Info", Type::map(Type::Any)).json("info"))
        .build()
}

// A record field with no marker and a marked Date.
fn struct_b(a: &Arc<RecordSchema>) -> Arc<RecordSchema> {
    RecordSchema::builder("SelectionB")
        .field(Field::new("A", Type::record(a)).json("a"))
        .field(Field::new("Date", Type::String).json("date").include_default())
        .build()
}

#[test]
fn add_to_empty_selection() {
    let a = struct_a();
    let s = StructSelection::empty(&a).add_by_name(["Name"]);
    assert!(!s.has_by_name("Age"));
    assert!(s.has_by_name("Name"));
}

#[test]
fn default_inclusion_markers() {
    let a = struct_a();
    let b = struct_b(&a);
    let undefined = StructSelection::new(&b);
    assert!(!undefined.has_by_name("A"));
    assert!(undefined.has_by_name("Date"));

    let undefined = StructSelection::new(&a);
    assert!(a.fields().iter().all(|f| undefined.has_by_index(f.index())));
}

#[test]
fn undefined_selection_reaches_into_unmarked_records() -> Result<()> {
    let a = struct_a();
    let b = struct_b(&a);
    let s = StructSelection::parse(&b, "a, date")?;
    let Some(child) = s.field_by_name("A") else {
        anyhow::bail!("A is a record field");
    };
    assert!(child.is_undefined());
    assert!(child.has_by_name("info"));
    assert!(s.has("a { name, age }"));
    Ok(())
}

#[test]
fn untyped_binds_through_serialized_names() -> Result<()> {
    let a = struct_a();
    let b = struct_b(&a);
    let untyped = UntypedSelection::parse("a { name, info }, __typename")?;
    let typed = untyped.to_structured(&b)?;
    assert_eq!(typed.expr(), "{ A { Name, Info } }");
    assert_eq!(typed.json_expr(), "{ a { name, info } }");
    assert_eq!(typed.to_unstructured().expr(), "{ a { info, name } }");

    let err = UntypedSelection::parse("a { name }, when, other")?
        .to_structured(&b)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unrecognized field(s): \"other\" and \"when\""
    );
    let err = UntypedSelection::parse("a { zip, code, x }")?
        .to_structured(&b)
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "unrecognized field(s): \"code\", \"x\", and \"zip\" (A)"
    );
    Ok(())
}

#[test]
fn typed_algebra() -> Result<()> {
    let a = struct_a();
    let b = struct_b(&a);
    let s = StructSelection::parse(&b, "a { name, age }, date")?;
    assert_eq!(s.pick("a { age }")?.expr(), "{ A { Age } }");
    assert_eq!(s.omit("a { age }")?.expr(), "{ A { Name }, Date }");
    assert_eq!(
        StructSelection::parse(&b, "a { name }")?
            .assign("a { info }")?
            .expr(),
        "{ A { Name, Info } }"
    );
    assert!(s.has("a { name }"));
    assert!(!s.has("a { info }"));
    assert!(!s.has("a { nope }"));

    let undefined = StructSelection::new(&b);
    assert_eq!(undefined.omit("date")?.expr(), "{}");
    assert_eq!(undefined.assign("a")?.expr(), "{ A }");
    Ok(())
}

#[test]
fn selection_sum_type() -> Result<()> {
    let a = struct_a();
    let untyped = Selection::parse("name, age")?;
    let typed = Selection::from(untyped.to_structured(&a)?);

    assert_eq!(untyped.pick("name")?.expr(), "{ name }");
    assert_eq!(typed.pick("name")?.expr(), "{ Name }");
    assert_eq!(typed.omit("name")?.to_string(), "SelectionASelection({ Age })");
    assert_eq!(untyped.assign("info")?.to_string(), "Selection({ age, info, name })");
    assert!(typed.has("age"));
    assert!(!untyped.has("info"));
    assert!(typed.as_typed().is_some());
    assert_eq!(typed.to_untyped(), untyped.to_untyped());
    assert_eq!(typed.len(), 2);
    Ok(())
}

#[test]
fn schemas_from_documents() -> Result<()> {
    let post = RecordSchema::from_json_str(
        r#"{
            "name": "SelectionPost",
            "fields": [
                { "name": "Title", "json": "title", "tags": { "fragment": "includedefault" },
                  "type": { "type": "string" } },
                { "name": "Body", "json": "body", "type": { "type": "string" } }
            ]
        }"#,
    )?;
    registry::register(post)?;
    let user = RecordSchema::from_json_str(
        r#"{
            "name": "SelectionUser",
            "fields": [
                { "name": "Name", "json": "name", "type": { "type": "string" } },
                { "name": "Friends", "json": "friends",
                  "type": { "type": "array", "items": { "type": "ref", "name": "SelectionUser" } } },
                { "name": "Posts", "json": "posts",
                  "type": { "type": "array", "items": { "type": "ref", "name": "SelectionPost" } } },
                { "name": "Created", "json": "created", "omitEmpty": true,
                  "tags": { "fragment": "includedefault" },
                  "type": { "type": "string" } }
            ]
        }"#,
    )?;
    registry::register(Arc::clone(&user))?;

    let undefined = StructSelection::new(&user);
    assert_eq!(undefined.len(), 1);
    assert!(undefined.has_by_name("created"));

    let s = StructSelection::parse(&user, "name, friends { friends { name } }")?;
    assert_eq!(s.expr(), "{ Name, Friends { Friends { Name } } }");

    // Defaults of nested records are spelled out once the schema is gone.
    let untyped = StructSelection::parse(&user, "posts")?.to_unstructured();
    assert_eq!(untyped.expr(), "{ posts { title } }");

    let yaml = RecordSchema::from_yaml_str(
        "name: SelectionYaml\nfields:\n  - name: Id\n    type: { type: integer }\n",
    )?;
    assert_eq!(StructSelection::complete(&yaml).expr(), "{ Id }");
    Ok(())
}

#[test]
fn pick_stays_within_nested_defaults() -> Result<()> {
    let inner = RecordSchema::builder("SelectionMarkedInner")
        .field(Field::new("X", Type::Integer).json("x"))
        .field(Field::new("Y", Type::Integer).json("y").include_default())
        .build();
    let outer = RecordSchema::builder("SelectionMarkedOuter")
        .field(Field::new("Inner", Type::record(&inner)).json("inner"))
        .build();
    let s = StructSelection::parse(&outer, "inner")?;

    let picked = s.pick("inner { x }")?;
    assert!(s.has(&picked));
    assert!(picked.field_by_name("Inner").is_some_and(|c| c.is_empty()));

    let picked = s.pick("inner { x, y }")?;
    assert_eq!(picked.expr(), "{ Inner { Y } }");
    assert!(s.has(&picked));

    let value = Value::from(
        Record::new(&outer).with("Inner", Record::new(&inner).with("X", 1i64)?.with("Y", 2i64)?)?,
    );
    assert_eq!(to_json_string(&s, &value)?, r#"{"inner":{"y":2}}"#);
    assert_eq!(to_json_string(&picked, &value)?, to_json_string(&s, &value)?);
    Ok(())
}

#[test]
fn cyclic_defaults_terminate() -> Result<()> {
    let node = RecordSchema::builder("SelectionNode")
        .field(Field::new("Id", Type::String).json("id").include_default())
        .field(Field::new("Parent", Type::reference("SelectionNode")).json("parent").include_default())
        .build();
    registry::register(Arc::clone(&node))?;

    assert_eq!(expand_defaults(&node).expr(), "{ Id, Parent }");
    let s = StructSelection::parse(&node, "parent")?;
    assert_eq!(s.to_unstructured().expr(), "{ parent }");
    assert_eq!(
        StructSelection::parse(&node, "parent { parent }")?.to_unstructured().expr(),
        "{ parent { parent } }"
    );
    Ok(())
}

#[test]
fn typed_selections_convert_without_reparsing() -> Result<()> {
    let shared = RecordSchema::builder("SelectionShared")
        .field(Field::new("First", Type::String).json("name"))
        .field(Field::new("Second", Type::String).json("name"))
        .field(Field::new("Hidden", Type::String).json("-"))
        .build();
    let typed = StructSelection::complete(&shared);
    assert_eq!(typed.to_unstructured().expr(), "{ name }");
    assert!(UntypedSelection::parse("name, other")?.has(Selection::from(typed.clone())));
    assert!(!UntypedSelection::parse("other")?.has(typed));
    Ok(())
}

fn typed_query(record: &Arc<RecordSchema>) -> impl Strategy<Value = Vec<String>> {
    let names: Vec<String> = record.fields().iter().map(|f| f.name().to_string()).collect();
    prop::sample::subsequence(names.clone(), 0..=names.len())
}

proptest! {
    #[test]
    fn add_is_idempotent(selection in untyped_selection(), field in "[a-z]{1,4}") {
        let once = selection.add([field.as_str()]);
        prop_assert_eq!(once.add([field.as_str()]), once);
    }

    #[test]
    fn pick_is_idempotent(selection in untyped_selection(), query in untyped_selection()) {
        let picked = selection.pick_selection(&query);
        prop_assert_eq!(picked.pick_selection(&query), picked);
    }

    #[test]
    fn pick_and_omit_partition(selection in untyped_selection(), seed in any::<prop::sample::Index>()) {
        prop_assume!(!selection.is_undefined_or_empty());
        let names: Vec<_> = selection.names().cloned().collect();
        let count = seed.index(names.len() + 1);
        let query = UntypedSelection::undefined().add(names[..count].iter().cloned());
        let query = if count == 0 { UntypedSelection::empty() } else { query };

        let picked: Vec<_> = selection.pick_selection(&query).names().cloned().collect();
        let omitted: Vec<_> = selection.omit_selection(&query).names().cloned().collect();
        prop_assert!(picked.iter().all(|n| !omitted.contains(n)));
        let mut all: Vec<_> = picked.into_iter().chain(omitted).collect();
        all.sort();
        prop_assert_eq!(all, names);
    }

    #[test]
    fn assign_includes_what_was_assigned(selection in untyped_selection(), query in untyped_selection()) {
        prop_assert!(selection.assign_selection(&query).has_selection(&query));
    }

    #[test]
    fn typed_assign_includes_what_was_assigned(
        first in typed_query(&struct_a()),
        second in typed_query(&struct_a()),
    ) {
        let a = struct_a();
        let b = struct_b(&a);
        let receiver = StructSelection::empty(&b).set_by_name("A", first).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let query = StructSelection::empty(&b).set_by_name("A", second).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert!(receiver.assign_selection(&query).has_selection(&query));
    }

    #[test]
    fn undefined_typed_selection_follows_markers(marked in prop::collection::vec(any::<bool>(), 1..6)) {
        let mut builder = RecordSchema::builder("SelectionMarked");
        for (idx, mark) in marked.iter().enumerate() {
            let field = Field::new(format!("F{idx}"), Type::Boolean);
            builder = builder.field(if *mark { field.include_default() } else { field });
        }
        let record = builder.build();
        let undefined = StructSelection::new(&record);
        let any_marked = marked.iter().any(|m| *m);
        for (idx, mark) in marked.iter().enumerate() {
            prop_assert_eq!(undefined.has_by_index(idx), !any_marked || *mark);
        }
    }
}
