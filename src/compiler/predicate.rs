//! Predicate tree rendering.

use super::Compiler;
use crate::ast::{InList, Node, Operator, Predicate};
use crate::error::Result;

impl Compiler {
    pub(crate) fn push_predicate(&mut self, predicate: &Predicate) -> Result<()> {
        if predicate.is_empty() {
            self.push("1 = 1");
            return Ok(());
        }
        for (i, clause) in predicate.clauses.iter().enumerate() {
            if i > 0 {
                self.push(" ");
                self.push(clause.conjunction.as_sql());
                self.push(" ");
            }
            self.push_node(&clause.node, clause.negated)?;
        }
        Ok(())
    }

    fn push_node(&mut self, node: &Node, negated: bool) -> Result<()> {
        match node {
            Node::Compare { left, op, right } => {
                if negated {
                    self.push("NOT ");
                }
                self.push_expr(left)?;
                self.push(" ");
                let symbol = match op {
                    Operator::ILike => self.generator().ilike_operator(),
                    other => other.sql_symbol(),
                };
                self.push(symbol);
                self.push(" ");
                self.push_operand(right)?;
            }
            Node::Between { expr, low, high } => {
                self.push_expr(expr)?;
                self.push(if negated { " NOT BETWEEN " } else { " BETWEEN " });
                self.push_operand(low)?;
                self.push(" AND ");
                self.push_operand(high)?;
            }
            Node::In { expr, list } => match list {
                // An empty list matches nothing (everything when negated).
                InList::Values(values) if values.is_empty() => {
                    self.push(if negated { "1 = 1" } else { "1 = 0" });
                }
                InList::Values(values) => {
                    self.push_expr(expr)?;
                    self.push(if negated { " NOT IN (" } else { " IN (" });
                    for (i, value) in values.iter().enumerate() {
                        if i > 0 {
                            self.push(", ");
                        }
                        self.push_operand(value)?;
                    }
                    self.push(")");
                }
                InList::Subquery(query) => {
                    self.push_expr(expr)?;
                    self.push(if negated { " NOT IN " } else { " IN " });
                    self.push_subquery(query)?;
                }
            },
            Node::Null(expr) => {
                self.push_expr(expr)?;
                self.push(if negated { " IS NOT NULL" } else { " IS NULL" });
            }
            Node::Exists(query) => {
                self.push(if negated { "NOT EXISTS " } else { "EXISTS " });
                self.push_subquery(query)?;
            }
            Node::Raw(raw) => {
                if negated {
                    self.push("NOT ");
                }
                self.push_raw(raw)?;
            }
            Node::Group(inner) => {
                if negated {
                    self.push("NOT ");
                }
                self.push("(");
                self.push_predicate(inner)?;
                self.push(")");
            }
        }
        Ok(())
    }
}
