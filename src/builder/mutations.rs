//! INSERT, UPDATE, DELETE and TRUNCATE payloads.

use super::QueryBuilder;
use crate::ast::{AssignOp, Assignment, Method, Operand, StatementKind};

impl QueryBuilder {
    /// Insert one row of `(column, value)` pairs.
    ///
    /// Requires a bound table; calling it first records a builder state error.
    pub fn insert<I, K, V>(self, row: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        self.insert_many([row])
    }

    /// Insert several rows in one statement. Columns missing from a row
    /// compile to `DEFAULT` (`NULL` on SQLite).
    pub fn insert_many<R, I, K, V>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        if !self.require_table("insert") {
            return self;
        }
        self.switch_kind(StatementKind::Insert, Method::Insert, "insert");
        for row in rows {
            let row = row
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect::<Vec<(String, Operand)>>();
            for (_, value) in &row {
                if let Operand::Subquery(query) = value {
                    self.adopt_issue(query);
                }
            }
            self.ast.rows.push(row);
        }
        self
    }

    fn push_assignment(mut self, column: String, op: AssignOp, value: Operand, method: &str) -> Self {
        if !self.require_table(method) {
            return self;
        }
        self.switch_kind(StatementKind::Update, Method::Update, method);
        if let Operand::Subquery(query) = &value {
            self.adopt_issue(query);
        }
        self.ast.assignments.push(Assignment { column, op, value });
        self
    }

    /// Update every `(column, value)` pair on the matching rows.
    pub fn update<I, K, V>(mut self, assignments: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Operand>,
    {
        if !self.require_table("update") {
            return self;
        }
        self.switch_kind(StatementKind::Update, Method::Update, "update");
        for (column, value) in assignments {
            self = self.push_assignment(column.into(), AssignOp::Set, value.into(), "update");
        }
        self
    }

    /// Update a single column.
    pub fn set(self, column: impl Into<String>, value: impl Into<Operand>) -> Self {
        self.push_assignment(column.into(), AssignOp::Set, value.into(), "set")
    }

    /// `column = column + amount`.
    pub fn increment(self, column: impl Into<String>, amount: impl Into<Operand>) -> Self {
        self.push_assignment(column.into(), AssignOp::Add, amount.into(), "increment")
    }

    /// `column = column - amount`.
    pub fn decrement(self, column: impl Into<String>, amount: impl Into<Operand>) -> Self {
        self.push_assignment(column.into(), AssignOp::Sub, amount.into(), "decrement")
    }

    pub fn delete(mut self) -> Self {
        if !self.require_table("delete") {
            return self;
        }
        self.switch_kind(StatementKind::Delete, Method::Delete, "delete");
        self
    }

    /// Alias of [`delete`](Self::delete).
    pub fn del(self) -> Self {
        self.delete()
    }

    /// Remove every row and reset identity counters where supported.
    pub fn truncate(mut self) -> Self {
        if !self.require_table("truncate") {
            return self;
        }
        self.switch_kind(StatementKind::Truncate, Method::Truncate, "truncate");
        self
    }

    /// Columns to hand back from INSERT/UPDATE/DELETE. Dropped with a warning
    /// on dialects without RETURNING; use the affected-row metadata there.
    pub fn returning<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ast.returning.extend(columns.into_iter().map(Into::into));
        self
    }
}
