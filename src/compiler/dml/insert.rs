//! INSERT SQL generation.

use crate::ast::Query;
use crate::compiler::Compiler;
use crate::error::{Error, Result};

/// Generate INSERT SQL. Columns are the union of every row's keys in
/// first-seen order; a row missing a column gets the dialect's filler.
pub(crate) fn build_insert(c: &mut Compiler, query: &Query) -> Result<Option<Vec<String>>> {
    let table = query
        .table
        .as_ref()
        .ok_or_else(|| Error::builder("insert has no table"))?;

    c.push("INSERT INTO ");
    c.push_table(table)?;

    let mut columns: Vec<&str> = Vec::new();
    for row in &query.rows {
        for (column, _) in row {
            if !columns.contains(&column.as_str()) {
                columns.push(column);
            }
        }
    }

    if columns.is_empty() {
        let suffix = c.generator().empty_insert();
        c.push(suffix);
    } else {
        c.push(" (");
        for (i, column) in columns.iter().enumerate() {
            if i > 0 {
                c.push(", ");
            }
            c.push_ident(column);
        }
        c.push(") VALUES ");

        let filler = c.generator().missing_insert_value();
        for (r, row) in query.rows.iter().enumerate() {
            if r > 0 {
                c.push(", ");
            }
            c.push("(");
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    c.push(", ");
                }
                match row.iter().find(|(name, _)| name.as_str() == *column) {
                    Some((_, value)) => c.push_operand(value)?,
                    None => c.push(filler),
                }
            }
            c.push(")");
        }
    }

    Ok(c.push_returning(&query.returning))
}
