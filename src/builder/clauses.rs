//! Grouping, ordering, paging, unions, locks and result shaping.

use super::QueryBuilder;
use crate::ast::{Expr, LockMode, Method, OrderTerm, SortDir, StatementKind, Union, BuildIssue};
use crate::raw::Raw;

impl QueryBuilder {
    pub fn group_by<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ast
            .group_by
            .extend(columns.into_iter().map(|c| Expr::Column(c.into())));
        self
    }

    pub fn group_by_raw(mut self, raw: impl Into<Raw>) -> Self {
        self.ast.group_by.push(Expr::Raw(raw.into()));
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, dir: SortDir) -> Self {
        self.ast.order_by.push(OrderTerm::Column(column.into(), dir));
        self
    }

    pub fn order_by_raw(mut self, raw: impl Into<Raw>) -> Self {
        self.ast.order_by.push(OrderTerm::Raw(raw.into()));
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.ast.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.ast.offset = Some(offset);
        self
    }

    fn push_union(mut self, sub: QueryBuilder, all: bool) -> Self {
        let query = sub.into_query();
        self.adopt_issue(&query);
        self.ast.unions.push(Union {
            all,
            query: Box::new(query),
        });
        self
    }

    pub fn union(self, sub: QueryBuilder) -> Self {
        self.push_union(sub, false)
    }

    pub fn union_all(self, sub: QueryBuilder) -> Self {
        self.push_union(sub, true)
    }

    /// `FOR UPDATE`; dropped with a warning on dialects without row locks.
    pub fn for_update(mut self) -> Self {
        self.ast.lock = Some(LockMode::Update);
        self
    }

    /// `FOR SHARE` (`LOCK IN SHARE MODE` on MySQL).
    pub fn for_share(mut self) -> Self {
        self.ast.lock = Some(LockMode::Share);
        self
    }

    fn shape(mut self, method: Method, clause: &str) -> Self {
        if self.ast.kind != StatementKind::Select {
            self.flag(BuildIssue::Mismatch {
                kind: self.ast.kind.as_str(),
                clause: clause.to_string(),
            });
            return self;
        }
        self.ast.method = method;
        self
    }

    /// Resolve to the first row only (or `None`).
    pub fn first(self) -> Self {
        self.limit(1).shape(Method::First, "first")
    }

    /// Resolve to the values of one column.
    pub fn pluck(mut self, column: impl Into<String>) -> Self {
        let column = column.into();
        self.ast.columns = vec![crate::ast::Selection::Column(column.clone())];
        self.shape(Method::Pluck(column), "pluck")
    }
}
