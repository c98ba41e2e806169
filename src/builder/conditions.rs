//! WHERE and HAVING clauses.

use super::QueryBuilder;
use crate::ast::{BuildIssue, Conjunction, Expr, InList, Node, Operand, Operator, Predicate, Query};
use crate::raw::Raw;

/// Right-hand side accepted by the `*_in` family: a value list or a subquery.
pub trait IntoInList {
    fn into_in_list(self) -> InList;
}

impl<T: Into<Operand>> IntoInList for Vec<T> {
    fn into_in_list(self) -> InList {
        InList::Values(self.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Operand>, const N: usize> IntoInList for [T; N] {
    fn into_in_list(self) -> InList {
        InList::Values(self.into_iter().map(Into::into).collect())
    }
}

impl IntoInList for QueryBuilder {
    fn into_in_list(self) -> InList {
        InList::Subquery(Box::new(self.into_query()))
    }
}

/// Which predicate a clause lands in.
#[derive(Clone, Copy)]
enum Target {
    Where,
    Having,
}

/// Build a comparison leaf, folding `= NULL` / `<> NULL` into null checks.
fn comparison(left: Expr, op: Operator, right: Operand, negated: bool) -> (Node, bool) {
    if right.is_null() {
        match op {
            Operator::Eq => return (Node::Null(left), negated),
            Operator::Ne => return (Node::Null(left), !negated),
            _ => {}
        }
    }
    (Node::Compare { left, op, right }, negated)
}

impl QueryBuilder {
    fn predicate_mut(&mut self, target: Target) -> &mut Predicate {
        match target {
            Target::Where => &mut self.ast.predicate,
            Target::Having => &mut self.ast.having,
        }
    }

    fn push_clause(mut self, target: Target, conjunction: Conjunction, negated: bool, node: Node) -> Self {
        match &node {
            Node::Exists(query) => self.adopt_issue(query),
            Node::In {
                list: InList::Subquery(query),
                ..
            } => self.adopt_issue(query),
            Node::Compare {
                right: Operand::Subquery(query),
                ..
            } => self.adopt_issue(query),
            _ => {}
        }
        self.predicate_mut(target).push(conjunction, negated, node);
        self
    }

    fn push_compare(
        self,
        target: Target,
        conjunction: Conjunction,
        negated: bool,
        column: Expr,
        op: Operator,
        value: Operand,
    ) -> Self {
        let (node, negated) = comparison(column, op, value, negated);
        self.push_clause(target, conjunction, negated, node)
    }

    /// Evaluate `f` against a fresh builder and attach its predicate as one
    /// parenthesized group. An empty group is dropped. Anything else the
    /// closure builds (the other predicate, columns, joins, a table, ...)
    /// is a builder error.
    fn push_group<F>(mut self, target: Target, conjunction: Conjunction, negated: bool, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        let mut nested = f(QueryBuilder::new(self.dialect));
        self.adopt_issue(&nested.ast);
        nested.ast.issue = None;

        let (group, clause) = match target {
            Target::Where => (std::mem::take(&mut nested.ast.predicate), "where_wrapped"),
            Target::Having => (std::mem::take(&mut nested.ast.having), "having_wrapped"),
        };
        let foreign = nested.ast != Query::default()
            || nested.schema.is_some()
            || nested.options != Default::default();
        if foreign {
            self.flag(BuildIssue::State(format!(
                "{}() group may only add {} conditions",
                clause,
                match target {
                    Target::Where => "where",
                    Target::Having => "having",
                }
            )));
            return self;
        }
        if group.is_empty() {
            return self;
        }
        self.push_clause(target, conjunction, negated, Node::Group(group))
    }

    // ---- where ----

    /// `column = value`. A `NULL` value compiles to `IS NULL`.
    pub fn where_eq(self, column: impl Into<Expr>, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Where, Conjunction::And, false, column.into(), Operator::Eq, value.into())
    }

    /// `column <op> value`.
    pub fn where_op(self, column: impl Into<Expr>, op: Operator, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Where, Conjunction::And, false, column.into(), op, value.into())
    }

    /// Alias of [`where_eq`](Self::where_eq).
    pub fn and_where(self, column: impl Into<Expr>, value: impl Into<Operand>) -> Self {
        self.where_eq(column, value)
    }

    pub fn and_where_op(self, column: impl Into<Expr>, op: Operator, value: impl Into<Operand>) -> Self {
        self.where_op(column, op, value)
    }

    pub fn or_where(self, column: impl Into<Expr>, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Where, Conjunction::Or, false, column.into(), Operator::Eq, value.into())
    }

    pub fn or_where_op(self, column: impl Into<Expr>, op: Operator, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Where, Conjunction::Or, false, column.into(), op, value.into())
    }

    pub fn where_not(self, column: impl Into<Expr>, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Where, Conjunction::And, true, column.into(), Operator::Eq, value.into())
    }

    pub fn or_where_not(self, column: impl Into<Expr>, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Where, Conjunction::Or, true, column.into(), Operator::Eq, value.into())
    }

    /// Equality on every `(column, value)` pair, AND-ed together.
    pub fn where_all<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        for (column, value) in pairs {
            self = self.where_eq(Expr::Column(column.into()), value);
        }
        self
    }

    /// Like [`where_all`](Self::where_all), OR-ed in as one group.
    pub fn or_where_all<I, K, V>(self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        self.push_group(Target::Where, Conjunction::Or, false, |q| q.where_all(pairs))
    }

    /// Compare two columns.
    pub fn where_column(self, left: impl Into<Expr>, op: Operator, right: impl Into<String>) -> Self {
        self.push_compare(
            Target::Where,
            Conjunction::And,
            false,
            left.into(),
            op,
            Operand::Column(right.into()),
        )
    }

    pub fn or_where_column(self, left: impl Into<Expr>, op: Operator, right: impl Into<String>) -> Self {
        self.push_compare(
            Target::Where,
            Conjunction::Or,
            false,
            left.into(),
            op,
            Operand::Column(right.into()),
        )
    }

    pub fn where_raw(self, raw: impl Into<Raw>) -> Self {
        self.push_clause(Target::Where, Conjunction::And, false, Node::Raw(raw.into()))
    }

    pub fn or_where_raw(self, raw: impl Into<Raw>) -> Self {
        self.push_clause(Target::Where, Conjunction::Or, false, Node::Raw(raw.into()))
    }

    /// Parenthesized group built by `f`:
    ///
    /// ```
    /// use quarry::{Dialect, QueryBuilder};
    ///
    /// let sql = QueryBuilder::new(Dialect::Sqlite)
    ///     .table("users")
    ///     .where_wrapped(|q| q.where_eq("a", 1).or_where("b", 2))
    ///     .and_where("c", 3)
    ///     .to_sql()
    ///     .unwrap();
    /// assert_eq!(sql.sql, r#"SELECT * FROM "users" WHERE ("a" = ? OR "b" = ?) AND "c" = ?"#);
    /// ```
    pub fn where_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_group(Target::Where, Conjunction::And, false, f)
    }

    pub fn or_where_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_group(Target::Where, Conjunction::Or, false, f)
    }

    pub fn where_not_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_group(Target::Where, Conjunction::And, true, f)
    }

    pub fn or_where_not_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_group(Target::Where, Conjunction::Or, true, f)
    }

    fn push_in(self, target: Target, conjunction: Conjunction, negated: bool, column: Expr, list: InList) -> Self {
        self.push_clause(target, conjunction, negated, Node::In { expr: column, list })
    }

    /// `column IN (...)` over a value list or a subquery. An empty list
    /// matches no rows.
    pub fn where_in(self, column: impl Into<Expr>, list: impl IntoInList) -> Self {
        self.push_in(Target::Where, Conjunction::And, false, column.into(), list.into_in_list())
    }

    pub fn or_where_in(self, column: impl Into<Expr>, list: impl IntoInList) -> Self {
        self.push_in(Target::Where, Conjunction::Or, false, column.into(), list.into_in_list())
    }

    pub fn where_not_in(self, column: impl Into<Expr>, list: impl IntoInList) -> Self {
        self.push_in(Target::Where, Conjunction::And, true, column.into(), list.into_in_list())
    }

    pub fn or_where_not_in(self, column: impl Into<Expr>, list: impl IntoInList) -> Self {
        self.push_in(Target::Where, Conjunction::Or, true, column.into(), list.into_in_list())
    }

    pub fn where_null(self, column: impl Into<Expr>) -> Self {
        self.push_clause(Target::Where, Conjunction::And, false, Node::Null(column.into()))
    }

    pub fn or_where_null(self, column: impl Into<Expr>) -> Self {
        self.push_clause(Target::Where, Conjunction::Or, false, Node::Null(column.into()))
    }

    pub fn where_not_null(self, column: impl Into<Expr>) -> Self {
        self.push_clause(Target::Where, Conjunction::And, true, Node::Null(column.into()))
    }

    pub fn or_where_not_null(self, column: impl Into<Expr>) -> Self {
        self.push_clause(Target::Where, Conjunction::Or, true, Node::Null(column.into()))
    }

    fn push_between(
        self,
        target: Target,
        conjunction: Conjunction,
        negated: bool,
        column: Expr,
        low: Operand,
        high: Operand,
    ) -> Self {
        self.push_clause(
            target,
            conjunction,
            negated,
            Node::Between {
                expr: column,
                low,
                high,
            },
        )
    }

    pub fn where_between(self, column: impl Into<Expr>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.push_between(Target::Where, Conjunction::And, false, column.into(), low.into(), high.into())
    }

    pub fn or_where_between(self, column: impl Into<Expr>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.push_between(Target::Where, Conjunction::Or, false, column.into(), low.into(), high.into())
    }

    pub fn where_not_between(self, column: impl Into<Expr>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.push_between(Target::Where, Conjunction::And, true, column.into(), low.into(), high.into())
    }

    pub fn or_where_not_between(
        self,
        column: impl Into<Expr>,
        low: impl Into<Operand>,
        high: impl Into<Operand>,
    ) -> Self {
        self.push_between(Target::Where, Conjunction::Or, true, column.into(), low.into(), high.into())
    }

    pub fn where_exists(self, sub: QueryBuilder) -> Self {
        self.push_clause(Target::Where, Conjunction::And, false, Node::Exists(Box::new(sub.into_query())))
    }

    pub fn or_where_exists(self, sub: QueryBuilder) -> Self {
        self.push_clause(Target::Where, Conjunction::Or, false, Node::Exists(Box::new(sub.into_query())))
    }

    pub fn where_not_exists(self, sub: QueryBuilder) -> Self {
        self.push_clause(Target::Where, Conjunction::And, true, Node::Exists(Box::new(sub.into_query())))
    }

    pub fn or_where_not_exists(self, sub: QueryBuilder) -> Self {
        self.push_clause(Target::Where, Conjunction::Or, true, Node::Exists(Box::new(sub.into_query())))
    }

    // ---- having ----

    pub fn having(self, column: impl Into<Expr>, op: Operator, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Having, Conjunction::And, false, column.into(), op, value.into())
    }

    pub fn and_having(self, column: impl Into<Expr>, op: Operator, value: impl Into<Operand>) -> Self {
        self.having(column, op, value)
    }

    pub fn or_having(self, column: impl Into<Expr>, op: Operator, value: impl Into<Operand>) -> Self {
        self.push_compare(Target::Having, Conjunction::Or, false, column.into(), op, value.into())
    }

    pub fn having_raw(self, raw: impl Into<Raw>) -> Self {
        self.push_clause(Target::Having, Conjunction::And, false, Node::Raw(raw.into()))
    }

    pub fn or_having_raw(self, raw: impl Into<Raw>) -> Self {
        self.push_clause(Target::Having, Conjunction::Or, false, Node::Raw(raw.into()))
    }

    /// Parenthesized HAVING group; `f` adds clauses with the `having*` methods.
    pub fn having_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_group(Target::Having, Conjunction::And, false, f)
    }

    pub fn or_having_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(QueryBuilder) -> QueryBuilder,
    {
        self.push_group(Target::Having, Conjunction::Or, false, f)
    }

    pub fn having_in(self, column: impl Into<Expr>, list: impl IntoInList) -> Self {
        self.push_in(Target::Having, Conjunction::And, false, column.into(), list.into_in_list())
    }

    pub fn having_not_in(self, column: impl Into<Expr>, list: impl IntoInList) -> Self {
        self.push_in(Target::Having, Conjunction::And, true, column.into(), list.into_in_list())
    }

    pub fn having_null(self, column: impl Into<Expr>) -> Self {
        self.push_clause(Target::Having, Conjunction::And, false, Node::Null(column.into()))
    }

    pub fn having_not_null(self, column: impl Into<Expr>) -> Self {
        self.push_clause(Target::Having, Conjunction::And, true, Node::Null(column.into()))
    }

    pub fn having_between(self, column: impl Into<Expr>, low: impl Into<Operand>, high: impl Into<Operand>) -> Self {
        self.push_between(Target::Having, Conjunction::And, false, column.into(), low.into(), high.into())
    }
}
