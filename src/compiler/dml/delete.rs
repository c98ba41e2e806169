//! DELETE and TRUNCATE SQL generation.

use crate::ast::{Query, TableSource};
use crate::compiler::Compiler;
use crate::error::{Error, Result};

/// Generate DELETE SQL.
pub(crate) fn build_delete(c: &mut Compiler, query: &Query) -> Result<Option<Vec<String>>> {
    let table = query
        .table
        .as_ref()
        .ok_or_else(|| Error::builder("delete has no table"))?;

    c.push("DELETE FROM ");
    c.push_table(table)?;

    if !query.predicate.is_empty() {
        c.push(" WHERE ");
        c.push_predicate(&query.predicate)?;
    }

    Ok(c.push_returning(&query.returning))
}

/// Generate TRUNCATE SQL (a plain DELETE where the dialect has no TRUNCATE).
pub(crate) fn build_truncate(c: &mut Compiler, query: &Query) -> Result<()> {
    let table = query
        .table
        .as_ref()
        .ok_or_else(|| Error::builder("truncate has no table"))?;
    match (&table.source, &table.alias) {
        (TableSource::Named { .. }, None) => {}
        (TableSource::Named { .. }, Some(_)) => return Err(Error::mismatch("truncate", "alias")),
        (TableSource::Subquery(_), _) => return Err(Error::mismatch("truncate", "from_subquery")),
        (TableSource::Raw(_), _) => return Err(Error::mismatch("truncate", "from_raw")),
    }

    let mut inner = Compiler::new(c.dialect(), false);
    inner.push_table(table)?;
    let (quoted, _) = inner.finish();

    let sql = c.generator().truncate(&quoted);
    c.push(&sql);
    Ok(())
}
