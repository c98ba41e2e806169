//! SELECT SQL generation.

use crate::ast::{Join, JoinKind, OrderTerm, Query, Selection};
use crate::compiler::Compiler;
use crate::error::{Error, Result};

/// Generate SELECT SQL.
pub(crate) fn build_select(c: &mut Compiler, query: &Query) -> Result<()> {
    c.push("SELECT ");
    if query.distinct {
        c.push("DISTINCT ");
    }
    if let Some(top) = c.generator().select_top(query.limit, query.offset) {
        c.push(&top);
        c.push(" ");
    }

    // Columns
    if query.columns.is_empty() {
        c.push("*");
    } else {
        for (i, selection) in query.columns.iter().enumerate() {
            if i > 0 {
                c.push(", ");
            }
            push_selection(c, selection)?;
        }
    }

    // FROM
    if let Some(table) = &query.table {
        c.push(" FROM ");
        c.push_table(table)?;
    }

    // JOINS
    for join in &query.joins {
        push_join(c, join)?;
    }

    if !query.predicate.is_empty() {
        c.push(" WHERE ");
        c.push_predicate(&query.predicate)?;
    }

    if !query.group_by.is_empty() {
        c.push(" GROUP BY ");
        for (i, expr) in query.group_by.iter().enumerate() {
            if i > 0 {
                c.push(", ");
            }
            c.push_expr(expr)?;
        }
    }

    if !query.having.is_empty() {
        c.push(" HAVING ");
        c.push_predicate(&query.having)?;
    }

    for union in &query.unions {
        c.push(if union.all { " UNION ALL " } else { " UNION " });
        c.push_statement(&union.query)?;
    }

    if !query.order_by.is_empty() {
        c.push(" ORDER BY ");
        for (i, term) in query.order_by.iter().enumerate() {
            if i > 0 {
                c.push(", ");
            }
            match term {
                OrderTerm::Column(name, dir) => {
                    c.push_ident(name);
                    c.push(" ");
                    c.push(dir.as_sql());
                }
                OrderTerm::Raw(raw) => c.push_raw(raw)?,
            }
        }
    }

    let tail = c
        .generator()
        .limit_offset(query.limit, query.offset, !query.order_by.is_empty());
    c.push(&tail);

    if let Some(mode) = query.lock {
        match c.generator().lock_clause(mode) {
            Some(clause) => c.push(clause),
            None => tracing::warn!("{} has no row locks; dropping {:?} lock", c.dialect(), mode),
        }
    }

    Ok(())
}

fn push_selection(c: &mut Compiler, selection: &Selection) -> Result<()> {
    match selection {
        Selection::Column(name) => c.push_ident(name),
        Selection::Raw(raw) => c.push_raw(raw)?,
        Selection::Aggregate {
            func,
            distinct,
            column,
            alias,
        } => {
            c.push(func.as_sql());
            c.push("(");
            if *distinct {
                c.push("DISTINCT ");
            }
            c.push_ident(column);
            c.push(")");
            if let Some(alias) = alias {
                c.push_alias(alias);
            }
        }
        Selection::Subquery(query) => {
            c.push_subquery(query)?;
            if let Some(alias) = &query.alias {
                c.push_alias(alias);
            }
        }
    }
    Ok(())
}

fn push_join(c: &mut Compiler, join: &Join) -> Result<()> {
    match join {
        Join::Table { kind, table, on } => {
            if *kind == JoinKind::Full && !c.generator().supports_full_join() {
                return Err(Error::unsupported("FULL OUTER JOIN", c.dialect()));
            }
            c.push(" ");
            c.push(kind.as_sql());
            c.push(" ");
            c.push_table(table)?;
            if *kind != JoinKind::Cross && !on.is_empty() {
                c.push(" ON ");
                c.push_predicate(on)?;
            }
        }
        Join::Raw(raw) => {
            c.push(" ");
            c.push_raw(raw)?;
        }
    }
    Ok(())
}
