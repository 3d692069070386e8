// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::sync::Arc;

use anyhow::Result;
use fieldsel::*;

struct Records {
    a: Arc<RecordSchema>,
    b: Arc<RecordSchema>,
}

fn records() -> Records {
    let a = RecordSchema::builder("PathsA")
        .field(Field::new("Name", Type::String).json("name"))
        .field(Field::new("Age", Type::Integer).json("age"))
        .build();
    let b = RecordSchema::builder("PathsB")
        .field(Field::new("A", Type::record(&a)).json("a"))
        .field(Field::new("Others", Type::array(Type::record(&a))).json("others"))
        .field(Field::new("Date", Type::String).json("date").include_default())
        .build();
    Records { a, b }
}

#[test]
fn dotted_paths_compile_to_selections() -> Result<()> {
    let r = records();
    let path = StructPath::new(&r.b, ["A.Age"])?;
    assert_eq!(path.to_selection().expr(), "{ A { Age } }");
    assert_eq!(path.to_string(), "PathsBPath(A.Age)");

    let path = StructPath::new(&r.b, ["a", "name"])?;
    assert_eq!(path.expr(), "A.Name");
    assert_eq!(path.json_expr(), "a.name");
    Ok(())
}

#[test]
fn tails_extend_the_selection() -> Result<()> {
    let r = records();
    let path = StructPath::new(&r.b, [PathSegment::from("others"), PathSegment::tail("name")])?;
    assert_eq!(path.to_selection().expr(), "{ Others { Name } }");
    assert_eq!(path.tail_record().map(|t| t.name().to_string()), Some("PathsA".to_string()));

    let path = path.assign_tail("age")?;
    assert_eq!(path.expr(), "Others { Name, Age }");

    let err = StructPath::new(&r.b, [PathSegment::from("date"), PathSegment::tail("x")]).unwrap_err();
    assert!(matches!(err.kind(), ErrorKind::NotFragmentable { .. }));
    Ok(())
}

#[test]
fn path_selections_merge_into_larger_ones() -> Result<()> {
    let r = records();
    // Assigning into an undefined selection would drop its default fields.
    let base = StructSelection::new(&r.b).ensure_defined();
    let merged = base
        .assign(StructPath::new(&r.b, ["A.Name"])?.to_selection())?
        .assign(StructPath::new(&r.b, ["Others.Age"])?.to_selection())?;
    assert_eq!(merged.expr(), "{ A { Name }, Others { Age }, Date }");

    let at = StructPath::new(&r.b, ["A"])?.selection_at(&merged);
    assert_eq!(at.map(|s| s.expr()), Some("{ Name }".to_string()));
    Ok(())
}

#[test]
fn untyped_paths() -> Result<()> {
    let path = UntypedPath::new([PathSegment::from("user.friends"), PathSegment::tail("name, email")])?;
    assert_eq!(path.to_selection().expr(), "{ user { friends { email, name } } }");
    assert_eq!(path.to_string(), "Path(user.friends { email, name })");

    let r = records();
    let typed = StructPath::new(&r.b, [PathSegment::from(UntypedPath::new(["a.age"])?)])?;
    assert_eq!(FieldPath::from(typed).to_selection().expr(), "{ A { Age } }");
    Ok(())
}

#[test]
fn values_along_paths() -> Result<()> {
    let r = records();
    let person = |name: &str, age: i64| -> Result<Value> {
        Ok(Record::new(&r.a).with("Name", name)?.with("Age", age)?.into())
    };
    let value = Value::from(
        Record::new(&r.b)
            .with("A", person("ann", 40)?)?
            .with("Others", vec![person("bob", 0)?, Value::Null, person("cy", 7)?])?,
    );

    let ages = StructPath::new(&r.b, ["Others.Age"])?;
    assert_eq!(ages.values(&value)?, vec![Value::from(0), Value::from(7)]);
    assert_eq!(
        ages.find_value(&value, |v| v == &Value::from(7))?,
        Some(Value::from(7))
    );
    assert_eq!(
        ages.collect_into(&value, &Type::array(Type::Number))?,
        Value::from(vec![Value::from(0), Value::from(7)])
    );

    let name = StructPath::new(&r.b, ["A.Name"])?;
    assert_eq!(name.first_defined(&value)?, Some(Value::from("ann")));
    assert_eq!(name.collect_into(&value, &Type::String)?, Value::from("ann"));

    let empty = Value::from(Record::new(&r.b));
    assert_eq!(name.first_defined(&empty)?, None);
    assert_eq!(name.collect_into(&empty, &Type::String)?, Value::Null);
    Ok(())
}
