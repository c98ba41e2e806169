//! Fluent query builder.
//!
//! Every method takes the builder by value and hands it back, so chains read
//! left to right while a single owned [`Query`] is mutated in place. `clone()`
//! is the only way to fork a chain; the copy owns an independent AST.
//!
//! Invalid calls never panic. The first one is recorded on the AST and
//! surfaced by [`QueryBuilder::to_sql`] or by execution, before any I/O.

mod clauses;
mod conditions;
mod join;
mod mutations;

pub use conditions::IntoInList;
pub use join::JoinOn;

use std::fmt;
use std::time::Duration;

use crate::ast::{
    Aggregate, BuildIssue, Method, Query, Selection, StatementKind, TableRef, TableSource,
    split_alias,
};
use crate::compiler::{self, Dialect, QueryOptions, SqlQuery};
use crate::error::Result;
use crate::execution::Runner;
use crate::raw::Raw;
use crate::transaction::Transaction;

/// Start an unbound builder, for subqueries and wrapped groups.
pub fn query() -> QueryBuilder {
    QueryBuilder::new(Dialect::default())
}

/// Chainable statement builder.
#[derive(Clone)]
pub struct QueryBuilder {
    pub(crate) ast: Query,
    pub(crate) dialect: Dialect,
    pub(crate) options: QueryOptions,
    pub(crate) runner: Option<Runner>,
    schema: Option<String>,
}

impl fmt::Debug for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("dialect", &self.dialect)
            .field("ast", &self.ast)
            .field("options", &self.options)
            .field("bound", &self.runner.is_some())
            .finish()
    }
}

impl From<&str> for TableRef {
    fn from(spec: &str) -> Self {
        TableRef::named(spec)
    }
}

impl From<String> for TableRef {
    fn from(spec: String) -> Self {
        TableRef::named(&spec)
    }
}

impl From<QueryBuilder> for TableRef {
    fn from(builder: QueryBuilder) -> Self {
        TableRef::subquery(builder.into_query())
    }
}

impl From<Raw> for TableRef {
    fn from(raw: Raw) -> Self {
        TableRef::raw(raw)
    }
}

impl From<QueryBuilder> for crate::ast::Operand {
    fn from(builder: QueryBuilder) -> Self {
        crate::ast::Operand::Subquery(Box::new(builder.into_query()))
    }
}

impl QueryBuilder {
    /// An unbound builder; it compiles but cannot execute.
    pub fn new(dialect: Dialect) -> Self {
        Self {
            ast: Query::new(),
            dialect,
            options: QueryOptions::default(),
            runner: None,
            schema: None,
        }
    }

    pub(crate) fn bound(dialect: Dialect, runner: Runner) -> Self {
        Self {
            runner: Some(runner),
            ..Self::new(dialect)
        }
    }

    pub(crate) fn from_raw_statement(mut self, raw: Raw) -> Self {
        self.ast = Query::raw(raw);
        self
    }

    /// The AST built so far.
    pub fn ast(&self) -> &Query {
        &self.ast
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Consume the builder, keeping only its AST.
    pub fn into_query(mut self) -> Query {
        self.apply_schema();
        self.ast
    }

    pub(crate) fn flag(&mut self, issue: BuildIssue) {
        self.ast.flag(issue);
    }

    /// Carry a recorded error from a nested builder into this one.
    pub(crate) fn adopt_issue(&mut self, nested: &Query) {
        if let Some(issue) = nested.issue() {
            self.ast.flag(issue.clone());
        }
    }

    fn apply_schema(&mut self) {
        if let (Some(schema), Some(table)) = (&self.schema, self.ast.table.as_mut()) {
            if let TableSource::Named { schema: slot, .. } = &mut table.source {
                if slot.is_none() {
                    *slot = Some(schema.clone());
                }
            }
        }
    }

    /// Bind the primary table: a name (`"users"`, `"public.users as u"`),
    /// a subquery builder or a raw fragment.
    pub fn table(mut self, table: impl Into<TableRef>) -> Self {
        let table = table.into();
        if let TableSource::Subquery(query) = &table.source {
            self.adopt_issue(query);
        }
        self.ast.table = Some(table);
        self.apply_schema();
        self
    }

    /// Alias of [`table`](Self::table), reads better after `select`.
    pub fn from(self, table: impl Into<TableRef>) -> Self {
        self.table(table)
    }

    /// Alias of [`table`](Self::table) for insert chains.
    pub fn into_table(self, table: impl Into<TableRef>) -> Self {
        self.table(table)
    }

    /// Select from a derived table named by the subquery's `alias`.
    pub fn from_subquery(self, sub: QueryBuilder) -> Self {
        self.table(sub)
    }

    /// Select from a raw table expression.
    pub fn from_raw(self, raw: impl Into<Raw>) -> Self {
        self.table(raw.into())
    }

    /// Qualify the table with a schema.
    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self.apply_schema();
        self
    }

    /// Name this query when it is used as a table or a selected column.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.ast.alias = Some(alias.into());
        self
    }

    /// Append selected columns; each may be `"col"`, `"t.col"` or `"col as a"`.
    pub fn select<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ast
            .columns
            .extend(columns.into_iter().map(|c| Selection::Column(c.into())));
        self
    }

    /// Alias of [`select`](Self::select).
    pub fn columns<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select(columns)
    }

    /// Append a single selected column.
    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.ast.columns.push(Selection::Column(column.into()));
        self
    }

    pub fn select_raw(mut self, raw: impl Into<Raw>) -> Self {
        self.ast.columns.push(Selection::Raw(raw.into()));
        self
    }

    /// Select a scalar subquery, aliased by the subquery's own `alias`.
    pub fn select_subquery(mut self, sub: QueryBuilder) -> Self {
        let query = sub.into_query();
        self.adopt_issue(&query);
        self.ast.columns.push(Selection::Subquery(Box::new(query)));
        self
    }

    pub fn distinct(mut self) -> Self {
        self.ast.distinct = true;
        self
    }

    fn aggregate(mut self, func: Aggregate, distinct: bool, spec: &str) -> Self {
        let (column, alias) = split_alias(spec);
        self.ast.columns.push(Selection::Aggregate {
            func,
            distinct,
            column: column.to_string(),
            alias,
        });
        self
    }

    /// `COUNT(col)`; pass `"*"` for every row, `"id as total"` to alias.
    pub fn count(self, column: &str) -> Self {
        self.aggregate(Aggregate::Count, false, column)
    }

    pub fn count_distinct(self, column: &str) -> Self {
        self.aggregate(Aggregate::Count, true, column)
    }

    pub fn min(self, column: &str) -> Self {
        self.aggregate(Aggregate::Min, false, column)
    }

    pub fn max(self, column: &str) -> Self {
        self.aggregate(Aggregate::Max, false, column)
    }

    pub fn sum(self, column: &str) -> Self {
        self.aggregate(Aggregate::Sum, false, column)
    }

    pub fn sum_distinct(self, column: &str) -> Self {
        self.aggregate(Aggregate::Sum, true, column)
    }

    pub fn avg(self, column: &str) -> Self {
        self.aggregate(Aggregate::Avg, false, column)
    }

    pub fn avg_distinct(self, column: &str) -> Self {
        self.aggregate(Aggregate::Avg, true, column)
    }

    /// Apply `f` to the chain, for reusable query fragments.
    pub fn modify<F>(self, f: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        f(self)
    }

    /// Fail execution with [`Error::QueryTimeout`](crate::Error::QueryTimeout)
    /// if the statement runs longer than `timeout`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Log this statement at `info` when it runs.
    pub fn debug(mut self, enabled: bool) -> Self {
        self.options.debug = enabled;
        self
    }

    /// Run this builder on `trx`'s reserved connection instead of the pool.
    pub fn transacting(mut self, trx: &Transaction) -> Self {
        self.runner = Some(Runner::Transaction(trx.clone()));
        self
    }

    /// Compile for the builder's dialect.
    pub fn to_sql(&self) -> Result<SqlQuery> {
        let query = self.clone().into_query();
        let mut compiled = compiler::compile(&query, self.dialect)?;
        compiled.options = self.options.clone();
        Ok(compiled)
    }

    /// SQL with values inlined as literals, for logs and debugging.
    pub fn to_query(&self) -> Result<String> {
        let query = self.clone().into_query();
        compiler::compile_inline(&query, self.dialect)
    }

    pub(crate) fn switch_kind(&mut self, kind: StatementKind, method: Method, clause: &str) {
        let current = self.ast.kind;
        if current != StatementKind::Select && current != kind {
            self.flag(BuildIssue::Mismatch {
                kind: current.as_str(),
                clause: clause.to_string(),
            });
            return;
        }
        self.ast.kind = kind;
        self.ast.method = method;
    }

    pub(crate) fn require_table(&mut self, method: &str) -> bool {
        if self.ast.table.is_none() {
            self.flag(BuildIssue::State(format!(
                "{}() called before a table was bound",
                method
            )));
            return false;
        }
        true
    }
}
