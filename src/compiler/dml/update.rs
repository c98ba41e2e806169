//! UPDATE SQL generation.

use crate::ast::{AssignOp, Query};
use crate::compiler::Compiler;
use crate::error::{Error, Result};

/// Generate UPDATE SQL.
pub(crate) fn build_update(c: &mut Compiler, query: &Query) -> Result<Option<Vec<String>>> {
    let table = query
        .table
        .as_ref()
        .ok_or_else(|| Error::builder("update has no table"))?;

    c.push("UPDATE ");
    c.push_table(table)?;
    c.push(" SET ");

    for (i, assignment) in query.assignments.iter().enumerate() {
        if i > 0 {
            c.push(", ");
        }
        c.push_ident(&assignment.column);
        c.push(" = ");
        match assignment.op {
            AssignOp::Set => {}
            AssignOp::Add => {
                c.push_ident(&assignment.column);
                c.push(" + ");
            }
            AssignOp::Sub => {
                c.push_ident(&assignment.column);
                c.push(" - ");
            }
        }
        c.push_operand(&assignment.value)?;
    }

    if !query.predicate.is_empty() {
        c.push(" WHERE ");
        c.push_predicate(&query.predicate)?;
    }

    Ok(c.push_returning(&query.returning))
}
