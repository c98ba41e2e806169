//! Query AST.
//!
//! A [`Query`] is the plain-data description of one statement. The
//! [`QueryBuilder`](crate::QueryBuilder) owns and mutates it; the compiler
//! only ever reads it.

pub mod operators;
pub mod predicate;

pub use operators::*;
pub use predicate::*;

use crate::error::Error;
use crate::raw::Raw;

/// Statement kind of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    #[default]
    Select,
    Insert,
    Update,
    Delete,
    Truncate,
    Raw,
}

impl StatementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Truncate => "truncate",
            StatementKind::Raw => "raw",
        }
    }
}

/// How the result of a statement is shaped once executed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Select,
    /// First row only (`LIMIT 1`).
    First,
    /// One column of every row.
    Pluck(String),
    Insert,
    Update,
    Delete,
    Truncate,
    Raw,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Select => "select",
            Method::First => "first",
            Method::Pluck(_) => "pluck",
            Method::Insert => "insert",
            Method::Update => "update",
            Method::Delete => "del",
            Method::Truncate => "truncate",
            Method::Raw => "raw",
        }
    }
}

/// A table reference: name, subquery or raw SQL, optionally aliased.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub source: TableSource,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TableSource {
    Named {
        schema: Option<String>,
        name: String,
    },
    Subquery(Box<Query>),
    Raw(Raw),
}

impl TableRef {
    /// Parse `"name"`, `"schema.name"` or `"name as alias"`.
    pub fn named(spec: &str) -> Self {
        let (name, alias) = split_alias(spec);
        let (schema, name) = match name.rsplit_once('.') {
            Some((schema, name)) => (Some(schema.to_string()), name.to_string()),
            None => (None, name.to_string()),
        };
        Self {
            source: TableSource::Named { schema, name },
            alias,
        }
    }

    pub fn subquery(query: Query) -> Self {
        let alias = query.alias.clone();
        Self {
            source: TableSource::Subquery(Box::new(query)),
            alias,
        }
    }

    pub fn raw(raw: Raw) -> Self {
        Self {
            source: TableSource::Raw(raw),
            alias: None,
        }
    }
}

/// Split `"expr as alias"` (case-insensitive) into its parts.
pub(crate) fn split_alias(spec: &str) -> (&str, Option<String>) {
    let lower = spec.to_ascii_lowercase();
    match lower.rfind(" as ") {
        Some(pos) => (
            spec[..pos].trim(),
            Some(spec[pos + 4..].trim().to_string()),
        ),
        None => (spec.trim(), None),
    }
}

/// One entry of the select list.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Column(String),
    Raw(Raw),
    Aggregate {
        func: Aggregate,
        distinct: bool,
        column: String,
        alias: Option<String>,
    },
    Subquery(Box<Query>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Join {
    Table {
        kind: JoinKind,
        table: TableRef,
        on: Predicate,
    },
    Raw(Raw),
}

#[derive(Debug, Clone, PartialEq)]
pub enum OrderTerm {
    Column(String, SortDir),
    Raw(Raw),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Union {
    pub all: bool,
    pub query: Box<Query>,
}

/// Assignment operator for UPDATE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub column: String,
    pub op: AssignOp,
    pub value: Operand,
}

/// An invalid builder call, recorded when it happens and reported by
/// [`compile`](crate::compiler::compile).
#[derive(Debug, Clone, PartialEq)]
pub enum BuildIssue {
    State(String),
    Mismatch { kind: &'static str, clause: String },
}

impl From<BuildIssue> for Error {
    fn from(issue: BuildIssue) -> Self {
        match issue {
            BuildIssue::State(message) => Error::BuilderState(message),
            BuildIssue::Mismatch { kind, clause } => Error::StatementKindMismatch { kind, clause },
        }
    }
}

/// A statement under construction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub kind: StatementKind,
    pub method: Method,
    pub table: Option<TableRef>,
    pub distinct: bool,
    pub columns: Vec<Selection>,
    pub joins: Vec<Join>,
    pub predicate: Predicate,
    pub group_by: Vec<Expr>,
    pub having: Predicate,
    pub order_by: Vec<OrderTerm>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub unions: Vec<Union>,
    pub lock: Option<LockMode>,
    pub returning: Vec<String>,
    /// Insert rows, each an ordered column → value list.
    pub rows: Vec<Vec<(String, Operand)>>,
    pub assignments: Vec<Assignment>,
    /// Body of a raw statement.
    pub raw: Option<Raw>,
    /// Alias used when this query is embedded as a table or column.
    pub alias: Option<String>,
    pub(crate) issue: Option<BuildIssue>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// A raw statement.
    pub fn raw(raw: Raw) -> Self {
        Self {
            kind: StatementKind::Raw,
            method: Method::Raw,
            raw: Some(raw),
            ..Self::default()
        }
    }

    /// First recorded builder error, if any.
    pub fn issue(&self) -> Option<&BuildIssue> {
        self.issue.as_ref()
    }

    /// Record `issue` unless an earlier one is already pending.
    pub(crate) fn flag(&mut self, issue: BuildIssue) {
        if self.issue.is_none() {
            self.issue = Some(issue);
        }
    }

    /// Names of the select-only clauses currently set.
    pub(crate) fn select_only_clauses(&self) -> Vec<&'static str> {
        let mut found = Vec::new();
        if !self.columns.is_empty() {
            found.push("select");
        }
        if self.distinct {
            found.push("distinct");
        }
        if !self.joins.is_empty() {
            found.push("join");
        }
        if !self.group_by.is_empty() {
            found.push("group_by");
        }
        if !self.having.is_empty() {
            found.push("having");
        }
        if !self.order_by.is_empty() {
            found.push("order_by");
        }
        if self.limit.is_some() {
            found.push("limit");
        }
        if self.offset.is_some() {
            found.push("offset");
        }
        if !self.unions.is_empty() {
            found.push("union");
        }
        if self.lock.is_some() {
            found.push("lock");
        }
        found
    }
}
