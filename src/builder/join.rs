//! JOIN clauses.

use super::QueryBuilder;
use crate::ast::{Conjunction, Expr, Join, JoinKind, Node, Operand, Operator, Predicate, TableRef};
use crate::raw::Raw;

/// ON-clause builder handed to [`QueryBuilder::join_with`].
#[derive(Debug, Clone, Default)]
pub struct JoinOn {
    predicate: Predicate,
}

impl JoinOn {
    fn push(mut self, conjunction: Conjunction, negated: bool, node: Node) -> Self {
        self.predicate.push(conjunction, negated, node);
        self
    }

    fn columns(first: &str, op: Operator, second: &str) -> Node {
        Node::Compare {
            left: Expr::Column(first.to_string()),
            op,
            right: Operand::Column(second.to_string()),
        }
    }

    /// `first <op> second`, both columns.
    pub fn on(self, first: &str, op: Operator, second: &str) -> Self {
        self.push(Conjunction::And, false, Self::columns(first, op, second))
    }

    pub fn and_on(self, first: &str, op: Operator, second: &str) -> Self {
        self.on(first, op, second)
    }

    pub fn or_on(self, first: &str, op: Operator, second: &str) -> Self {
        self.push(Conjunction::Or, false, Self::columns(first, op, second))
    }

    /// `column <op> ?` with a bound value.
    pub fn on_val(self, column: &str, op: Operator, value: impl Into<Operand>) -> Self {
        let node = Node::Compare {
            left: Expr::Column(column.to_string()),
            op,
            right: value.into(),
        };
        self.push(Conjunction::And, false, node)
    }

    pub fn or_on_val(self, column: &str, op: Operator, value: impl Into<Operand>) -> Self {
        let node = Node::Compare {
            left: Expr::Column(column.to_string()),
            op,
            right: value.into(),
        };
        self.push(Conjunction::Or, false, node)
    }

    pub fn on_null(self, column: &str) -> Self {
        self.push(Conjunction::And, false, Node::Null(Expr::Column(column.to_string())))
    }

    pub fn on_not_null(self, column: &str) -> Self {
        self.push(Conjunction::And, true, Node::Null(Expr::Column(column.to_string())))
    }

    /// Parenthesized group of ON conditions.
    pub fn on_wrapped<F>(self, f: F) -> Self
    where
        F: FnOnce(JoinOn) -> JoinOn,
    {
        let nested = f(JoinOn::default());
        if nested.predicate.is_empty() {
            return self;
        }
        self.push(Conjunction::And, false, Node::Group(nested.predicate))
    }
}

impl QueryBuilder {
    fn push_join(mut self, kind: JoinKind, table: TableRef, on: Predicate) -> Self {
        if let crate::ast::TableSource::Subquery(query) = &table.source {
            self.adopt_issue(query);
        }
        self.ast.joins.push(Join::Table { kind, table, on });
        self
    }

    fn join_columns(self, kind: JoinKind, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        let on = JoinOn::default().on(first, Operator::Eq, second).predicate;
        self.push_join(kind, table.into(), on)
    }

    /// `INNER JOIN table ON first = second`.
    pub fn join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Inner, table, first, second)
    }

    pub fn inner_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Inner, table, first, second)
    }

    pub fn left_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Left, table, first, second)
    }

    pub fn left_outer_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Left, table, first, second)
    }

    pub fn right_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Right, table, first, second)
    }

    pub fn right_outer_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Right, table, first, second)
    }

    /// `FULL OUTER JOIN`; not available on MySQL.
    pub fn full_outer_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Full, table, first, second)
    }

    pub fn outer_join(self, table: impl Into<TableRef>, first: &str, second: &str) -> Self {
        self.join_columns(JoinKind::Full, table, first, second)
    }

    pub fn cross_join(self, table: impl Into<TableRef>) -> Self {
        self.push_join(JoinKind::Cross, table.into(), Predicate::default())
    }

    /// Join with an arbitrary ON clause.
    ///
    /// ```
    /// use quarry::{Dialect, JoinKind, Operator, QueryBuilder};
    ///
    /// let q = QueryBuilder::new(Dialect::Postgres)
    ///     .table("users")
    ///     .join_with(JoinKind::Left, "accounts", |on| {
    ///         on.on("users.id", Operator::Eq, "accounts.user_id")
    ///             .on_val("accounts.kind", Operator::Eq, "main")
    ///     })
    ///     .to_sql()
    ///     .unwrap();
    /// assert_eq!(
    ///     q.sql,
    ///     r#"SELECT * FROM "users" LEFT JOIN "accounts" ON "users"."id" = "accounts"."user_id" AND "accounts"."kind" = $1"#
    /// );
    /// ```
    pub fn join_with<F>(self, kind: JoinKind, table: impl Into<TableRef>, f: F) -> Self
    where
        F: FnOnce(JoinOn) -> JoinOn,
    {
        let on = f(JoinOn::default()).predicate;
        self.push_join(kind, table.into(), on)
    }

    /// A verbatim join clause, e.g. `NATURAL FULL JOIN table1`.
    pub fn join_raw(mut self, raw: impl Into<Raw>) -> Self {
        self.ast.joins.push(Join::Raw(raw.into()));
        self
    }
}
