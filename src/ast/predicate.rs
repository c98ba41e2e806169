//! Boolean predicate trees for WHERE, HAVING and join ON clauses.
//!
//! A [`Predicate`] is a flat list of clauses joined left to right by their
//! [`Conjunction`]. Nesting only happens through [`Node::Group`], which the
//! compiler always renders in parentheses, so `(a OR b) AND c` and
//! `a OR (b AND c)` stay distinct.

use super::Query;
use super::operators::{Conjunction, Operator};
use crate::raw::Raw;
use crate::value::Value;

/// An ordered list of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Predicate {
    pub clauses: Vec<Clause>,
}

impl Predicate {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn push(&mut self, conjunction: Conjunction, negated: bool, node: Node) {
        self.clauses.push(Clause {
            conjunction,
            negated,
            node,
        });
    }
}

/// One leaf or group, with how it attaches to its left sibling.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub conjunction: Conjunction,
    pub negated: bool,
    pub node: Node,
}

/// The closed set of predicate node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Compare {
        left: Expr,
        op: Operator,
        right: Operand,
    },
    Between {
        expr: Expr,
        low: Operand,
        high: Operand,
    },
    In {
        expr: Expr,
        list: InList,
    },
    Null(Expr),
    Exists(Box<Query>),
    Raw(Raw),
    Group(Predicate),
}

/// Right-hand side of an IN leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum InList {
    Values(Vec<Operand>),
    Subquery(Box<Query>),
}

/// Left-hand side of a leaf: a column or raw SQL.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Column(String),
    Raw(Raw),
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::Column(name.to_string())
    }
}

impl From<String> for Expr {
    fn from(name: String) -> Self {
        Expr::Column(name)
    }
}

impl From<&String> for Expr {
    fn from(name: &String) -> Self {
        Expr::Column(name.clone())
    }
}

impl From<Raw> for Expr {
    fn from(raw: Raw) -> Self {
        Expr::Raw(raw)
    }
}

/// Anything that can stand in a value position.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Value(Value),
    Column(String),
    Raw(Raw),
    Subquery(Box<Query>),
}

impl Operand {
    /// A column reference, rendered as a quoted identifier instead of a binding.
    pub fn column(name: impl Into<String>) -> Self {
        Operand::Column(name.into())
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Operand::Value(Value::Null))
    }
}

macro_rules! operand_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Value(Value::from(v))
                }
            }
        )*
    };
}

operand_from_value!(bool, i32, i64, u32, f64, &str, String, &String, Vec<u8>);

impl<T: Into<Value>> From<Option<T>> for Operand {
    fn from(v: Option<T>) -> Self {
        Operand::Value(Value::from(v))
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Value(v)
    }
}

impl From<Raw> for Operand {
    fn from(raw: Raw) -> Self {
        Operand::Raw(raw)
    }
}

impl From<Query> for Operand {
    fn from(query: Query) -> Self {
        Operand::Subquery(Box::new(query))
    }
}
