//! Placeholder/binding alignment tests.

use pretty_assertions::assert_eq;

use crate::ast::{Operand, Operator};
use crate::builder::{QueryBuilder, query};
use crate::compiler::Dialect;
use crate::error::Error;
use crate::raw::Raw;
use crate::value::Value;

fn pg() -> QueryBuilder {
    QueryBuilder::new(Dialect::Postgres)
}

/// Numbers of every `$n` placeholder in text order.
fn placeholder_numbers(sql: &str) -> Vec<usize> {
    let mut out = Vec::new();
    let bytes = sql.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'$' {
            let start = i + 1;
            let mut end = start;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
            if end > start {
                out.push(sql[start..end].parse().unwrap());
            }
            i = end;
        } else {
            i += 1;
        }
    }
    out
}

#[test]
fn test_raw_bindings_spliced_in_place() {
    let q = pg()
        .table("users")
        .where_eq("a", 1)
        .where_raw(Raw::new("?? > ?").bind("age").bind(18))
        .where_eq("b", 2)
        .to_sql()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT * FROM "users" WHERE "a" = $1 AND "age" > $2 AND "b" = $3"#);
    assert_eq!(q.bindings, vec![Value::Int(1), Value::Int(18), Value::Int(2)]);
}

#[test]
fn test_nested_raw_fragments() {
    let inner = Raw::new("lower(?)").bind("X");
    let q = pg()
        .table("users")
        .select_raw(Raw::new("coalesce(?, ?) as label").bind(inner).bind(5))
        .where_eq("id", 9)
        .to_sql()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT coalesce(lower($1), $2) as label FROM "users" WHERE "id" = $3"#
    );
    assert_eq!(q.bindings, vec![Value::from("X"), Value::Int(5), Value::Int(9)]);
}

#[test]
fn test_subquery_inside_raw() {
    let open_orders = query().table("orders").count("*").where_eq("status", "open");
    let q = pg()
        .table("users")
        .where_eq("id", 1)
        .where_raw(Raw::new("? > 3").bind(open_orders))
        .where_eq("x", 2)
        .to_sql()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT * FROM "users" WHERE "id" = $1 AND (SELECT COUNT(*) FROM "orders" WHERE "status" = $2) > 3 AND "x" = $3"#
    );
}

#[test]
fn test_escaped_question_mark() {
    let q = pg()
        .table("docs")
        .where_raw(Raw::new(r"data \? ?").bind("key"))
        .to_sql()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT * FROM "docs" WHERE data ? $1"#);
    assert_eq!(q.bindings, vec![Value::from("key")]);
}

#[test]
fn test_raw_wrap() {
    let q = pg()
        .table("users")
        .select_raw(Raw::new("select ?").bind(1).wrap("(", ") as one"))
        .to_sql()
        .unwrap();
    assert_eq!(q.sql, r#"SELECT (select $1) as one FROM "users""#);
}

#[test]
fn test_raw_column_operand() {
    let q = pg()
        .table("events")
        .where_op("starts_at", Operator::Lt, Raw::new("now()"))
        .where_op("ends_at", Operator::Gt, Operand::column("starts_at"))
        .to_sql()
        .unwrap();
    assert_eq!(
        q.sql,
        r#"SELECT * FROM "events" WHERE "starts_at" < now() AND "ends_at" > "starts_at""#
    );
    assert!(q.bindings.is_empty());
}

#[test]
fn test_binding_count_mismatch() {
    let err = pg()
        .table("users")
        .where_raw(Raw::new("a = ? and b = ?").bind(1))
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, Error::BuilderState(_)));

    let err = pg()
        .table("users")
        .where_raw(Raw::new("?? = 1").bind(5))
        .to_sql()
        .unwrap_err();
    assert!(matches!(err, Error::BuilderState(_)));
}

#[test]
fn test_placeholders_align_with_bindings() {
    let q = pg()
        .table("users")
        .select(["id"])
        .select_subquery(query().table("orders").count("*").where_eq("kind", "a").alias("n"))
        .join_with(crate::ast::JoinKind::Left, "teams", |j| {
            j.on("teams.id", Operator::Eq, "users.team_id")
                .on_val("teams.active", Operator::Eq, true)
        })
        .where_wrapped(|q| {
            q.where_raw(Raw::new("? = ?").bind(Raw::new("upper(?)").bind("b")).bind("B"))
                .or_where_in("role", query().table("roles").select(["name"]).where_eq("level", 3))
        })
        .where_between("age", 1, 99)
        .having_raw(Raw::new("count(*) > ?").bind(0))
        .group_by(["id"])
        .union(query().table("admins").select(["id"]).where_eq("z", 10))
        .to_sql()
        .unwrap();

    let numbers = placeholder_numbers(&q.sql);
    assert_eq!(numbers.len(), q.bindings.len());
    assert_eq!(numbers, (1..=q.bindings.len()).collect::<Vec<_>>());
    assert_eq!(
        q.bindings,
        vec![
            Value::from("a"),
            Value::Bool(true),
            Value::from("b"),
            Value::from("B"),
            Value::Int(3),
            Value::Int(1),
            Value::Int(99),
            Value::Int(0),
            Value::Int(10),
        ]
    );
}

#[test]
fn test_mssql_numbering_across_subqueries() {
    let q = QueryBuilder::new(Dialect::Mssql)
        .table("users")
        .where_in("id", query().table("orders").select(["user_id"]).where_eq("total", 5))
        .where_eq("active", 1)
        .to_sql()
        .unwrap();
    assert_eq!(
        q.sql,
        "SELECT * FROM [users] WHERE [id] IN (SELECT [user_id] FROM [orders] WHERE [total] = @p1) AND [active] = @p2"
    );
}
