//! Dialect-aware compilation of a [`Query`] into SQL text plus bindings.
//!
//! Compilation is a pure function of the AST and the dialect: the same
//! input always yields byte-identical SQL and identically ordered bindings.
//! Placeholders are numbered from the binding list itself, so values
//! contributed by nested subqueries and raw fragments stay aligned with the
//! position their placeholder occupies in the text.

pub mod dialect;
pub mod dml;
pub mod predicate;
pub mod sql;
pub mod traits;

#[cfg(test)]
mod tests;

use std::time::Duration;

use serde::Serialize;

pub use dialect::Dialect;
pub use traits::SqlGenerator;

use crate::ast::{Expr, Method, Operand, Query, StatementKind, TableRef, TableSource, split_alias};
use crate::error::{Error, Result};
use crate::raw::Raw;
use crate::value::Value;

/// Per-execution options carried next to the compiled statement.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryOptions {
    pub timeout: Option<Duration>,
    pub debug: bool,
}

/// Compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub method: Method,
    pub sql: String,
    pub bindings: Vec<Value>,
    pub options: QueryOptions,
    /// Columns the statement returns through RETURNING, when the dialect
    /// rendered the clause.
    pub returning: Option<Vec<String>>,
}

impl SqlQuery {
    /// A bare statement with no bindings.
    pub fn statement(sql: impl Into<String>) -> Self {
        Self {
            method: Method::Raw,
            sql: sql.into(),
            bindings: Vec::new(),
            options: QueryOptions::default(),
            returning: None,
        }
    }

    /// Whether executing this statement yields a row set.
    pub fn returns_rows(&self) -> bool {
        match self.method {
            Method::Select | Method::First | Method::Pluck(_) => true,
            Method::Insert | Method::Update | Method::Delete => self.returning.is_some(),
            Method::Truncate => false,
            Method::Raw => {
                let sql = self.sql.to_ascii_lowercase();
                let mut words = sql
                    .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .filter(|word| !word.is_empty());
                let leading = words.next().unwrap_or_default();
                ["select", "with", "values", "show", "pragma", "explain"].contains(&leading)
                    || words.any(|word| word == "returning")
            }
        }
    }
}

/// Compile `query` for `dialect`.
pub fn compile(query: &Query, dialect: Dialect) -> Result<SqlQuery> {
    let mut compiler = Compiler::new(dialect, false);
    let returning = compiler.push_statement(query)?;
    let (sql, bindings) = compiler.finish();
    Ok(SqlQuery {
        method: query.method.clone(),
        sql,
        bindings,
        options: QueryOptions::default(),
        returning,
    })
}

/// Compile `query` with every value interpolated as a literal.
///
/// Meant for logging and debugging only; never execute the result.
pub fn compile_inline(query: &Query, dialect: Dialect) -> Result<String> {
    let mut compiler = Compiler::new(dialect, true);
    compiler.push_statement(query)?;
    Ok(compiler.finish().0)
}

/// SQL text accumulator shared by every clause builder.
pub(crate) struct Compiler {
    generator: Box<dyn SqlGenerator>,
    sql: String,
    bindings: Vec<Value>,
    inline: bool,
}

impl Compiler {
    pub(crate) fn new(dialect: Dialect, inline: bool) -> Self {
        Self {
            generator: dialect.generator(),
            sql: String::new(),
            bindings: Vec::new(),
            inline,
        }
    }

    pub(crate) fn generator(&self) -> &dyn SqlGenerator {
        self.generator.as_ref()
    }

    pub(crate) fn dialect(&self) -> Dialect {
        self.generator.dialect()
    }

    pub(crate) fn finish(self) -> (String, Vec<Value>) {
        (self.sql, self.bindings)
    }

    pub(crate) fn push(&mut self, s: &str) {
        self.sql.push_str(s);
    }

    /// Quote an identifier spec: dotted parts, `*` and `name as alias`.
    pub(crate) fn wrap_identifier(&self, spec: &str) -> String {
        let (name, alias) = split_alias(spec);
        let mut out = self.wrap_dotted(name);
        if let Some(alias) = alias {
            out.push_str(" AS ");
            out.push_str(&self.generator.quote_identifier(&alias));
        }
        out
    }

    fn wrap_dotted(&self, name: &str) -> String {
        name.split('.')
            .map(|part| {
                if part == "*" {
                    part.to_string()
                } else {
                    self.generator.quote_identifier(part)
                }
            })
            .collect::<Vec<_>>()
            .join(".")
    }

    pub(crate) fn push_ident(&mut self, spec: &str) {
        let wrapped = self.wrap_identifier(spec);
        self.sql.push_str(&wrapped);
    }

    pub(crate) fn push_alias(&mut self, alias: &str) {
        self.sql.push_str(" AS ");
        let quoted = self.generator.quote_identifier(alias);
        self.sql.push_str(&quoted);
    }

    /// Bind `value` and emit its placeholder (or its literal in inline mode).
    pub(crate) fn push_value(&mut self, value: &Value) {
        if self.inline {
            let literal = self.generator.literal(value);
            self.sql.push_str(&literal);
        } else {
            self.bindings.push(value.clone());
            let placeholder = self.generator.placeholder(self.bindings.len());
            self.sql.push_str(&placeholder);
        }
    }

    pub(crate) fn push_operand(&mut self, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Value(v) => self.push_value(v),
            Operand::Column(name) => self.push_ident(name),
            Operand::Raw(raw) => self.push_raw(raw)?,
            Operand::Subquery(query) => self.push_subquery(query)?,
        }
        Ok(())
    }

    pub(crate) fn push_expr(&mut self, expr: &Expr) -> Result<()> {
        match expr {
            Expr::Column(name) => self.push_ident(name),
            Expr::Raw(raw) => self.push_raw(raw)?,
        }
        Ok(())
    }

    /// Splice a raw fragment, expanding `?`, `??` and `\?` in text order.
    pub(crate) fn push_raw(&mut self, raw: &Raw) -> Result<()> {
        let expected = raw.placeholder_count();
        if expected != raw.bindings.len() {
            return Err(Error::builder(format!(
                "raw fragment `{}` has {} placeholders but {} bindings",
                raw.sql,
                expected,
                raw.bindings.len()
            )));
        }

        if let Some((before, _)) = &raw.wrap {
            self.sql.push_str(before);
        }

        let mut bindings = raw.bindings.iter();
        let mut chars = raw.sql.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'?') => {
                    chars.next();
                    self.sql.push('?');
                }
                '?' => {
                    let binding = bindings
                        .next()
                        .ok_or_else(|| Error::builder(format!("missing binding in `{}`", raw.sql)))?;
                    if chars.peek() == Some(&'?') {
                        chars.next();
                        self.push_identifier_binding(binding)?;
                    } else {
                        self.push_operand(binding)?;
                    }
                }
                _ => self.sql.push(c),
            }
        }

        if let Some((_, after)) = &raw.wrap {
            self.sql.push_str(after);
        }
        Ok(())
    }

    fn push_identifier_binding(&mut self, binding: &Operand) -> Result<()> {
        match binding {
            Operand::Column(name) | Operand::Value(Value::Text(name)) => {
                self.push_ident(name);
                Ok(())
            }
            Operand::Raw(raw) => self.push_raw(raw),
            other => Err(Error::builder(format!(
                "`??` expects an identifier binding, got {:?}",
                other
            ))),
        }
    }

    /// A nested statement in parentheses, sharing this binding list.
    pub(crate) fn push_subquery(&mut self, query: &Query) -> Result<()> {
        self.sql.push('(');
        self.push_statement(query)?;
        self.sql.push(')');
        Ok(())
    }

    pub(crate) fn push_table(&mut self, table: &TableRef) -> Result<()> {
        match &table.source {
            TableSource::Named { schema, name } => {
                if let Some(schema) = schema {
                    let wrapped = self.wrap_dotted(schema);
                    self.sql.push_str(&wrapped);
                    self.sql.push('.');
                }
                let quoted = self.generator.quote_identifier(name);
                self.sql.push_str(&quoted);
            }
            TableSource::Subquery(query) => self.push_subquery(query)?,
            TableSource::Raw(raw) => self.push_raw(raw)?,
        }
        if let Some(alias) = &table.alias {
            self.push_alias(alias);
        }
        Ok(())
    }

    /// Validate and render a whole statement. Returns the RETURNING columns
    /// when the clause was emitted.
    pub(crate) fn push_statement(&mut self, query: &Query) -> Result<Option<Vec<String>>> {
        validate(query)?;
        match query.kind {
            StatementKind::Select => dml::select::build_select(self, query).map(|_| None),
            StatementKind::Insert => dml::insert::build_insert(self, query),
            StatementKind::Update => dml::update::build_update(self, query),
            StatementKind::Delete => dml::delete::build_delete(self, query),
            StatementKind::Truncate => dml::delete::build_truncate(self, query).map(|_| None),
            StatementKind::Raw => {
                let raw = query
                    .raw
                    .as_ref()
                    .ok_or_else(|| Error::builder("raw statement without SQL"))?;
                self.push_raw(raw)?;
                Ok(None)
            }
        }
    }

    /// Emit ` RETURNING ...` when supported; otherwise drop it with a warning.
    pub(crate) fn push_returning(&mut self, columns: &[String]) -> Option<Vec<String>> {
        if columns.is_empty() {
            return None;
        }
        if !self.generator.supports_returning() {
            tracing::warn!(
                "{} has no RETURNING clause; dropping returning({})",
                self.dialect(),
                columns.join(", ")
            );
            return None;
        }
        self.sql.push_str(" RETURNING ");
        let list = columns
            .iter()
            .map(|c| self.wrap_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        self.sql.push_str(&list);
        Some(columns.to_vec())
    }
}

/// Reject ASTs the builder let through but no dialect can render.
fn validate(query: &Query) -> Result<()> {
    if let Some(issue) = query.issue() {
        return Err(issue.clone().into());
    }

    let kind = query.kind;
    match kind {
        StatementKind::Raw => {
            if let Some(clause) = query.select_only_clauses().first() {
                return Err(Error::mismatch(kind.as_str(), *clause));
            }
            if !query.predicate.is_empty() {
                return Err(Error::mismatch(kind.as_str(), "where"));
            }
            return Ok(());
        }
        StatementKind::Select => {
            if query.table.is_none() && query.columns.is_empty() {
                return Err(Error::builder("select has no table; call table() first"));
            }
            return Ok(());
        }
        _ => {}
    }

    if query.table.is_none() {
        return Err(Error::builder(format!(
            "{} has no table; call table() first",
            kind.as_str()
        )));
    }
    if let Some(clause) = query.select_only_clauses().first() {
        return Err(Error::mismatch(kind.as_str(), *clause));
    }
    if matches!(kind, StatementKind::Insert | StatementKind::Truncate) && !query.predicate.is_empty() {
        return Err(Error::mismatch(kind.as_str(), "where"));
    }
    if kind == StatementKind::Update && query.assignments.is_empty() {
        return Err(Error::builder("update has no assignments"));
    }
    if kind == StatementKind::Truncate && !query.returning.is_empty() {
        return Err(Error::mismatch(kind.as_str(), "returning"));
    }
    Ok(())
}
