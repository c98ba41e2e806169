//! Raw SQL fragments.
//!
//! A [`Raw`] carries verbatim SQL and its own bindings. Inside the text:
//!
//! - `?` is replaced by the next binding as a value placeholder,
//! - `??` is replaced by the next binding rendered as a quoted identifier,
//! - `\?` is emitted as a literal question mark.
//!
//! Bindings are [`Operand`]s, so a raw fragment may itself embed column
//! references, other raw fragments or whole subqueries.

use crate::ast::Operand;

/// Verbatim SQL plus its bindings.
#[derive(Debug, Clone, PartialEq)]
pub struct Raw {
    pub sql: String,
    pub bindings: Vec<Operand>,
    pub(crate) wrap: Option<(String, String)>,
}

impl Raw {
    /// Raw SQL with no bindings.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            bindings: Vec::new(),
            wrap: None,
        }
    }

    /// Raw SQL with positional bindings.
    ///
    /// ```
    /// use quarry::Raw;
    ///
    /// let raw = Raw::with_bindings("?? = ?", vec!["id".into(), 5.into()]);
    /// assert_eq!(raw.bindings.len(), 2);
    /// ```
    pub fn with_bindings(sql: impl Into<String>, bindings: Vec<Operand>) -> Self {
        Self {
            sql: sql.into(),
            bindings,
            wrap: None,
        }
    }

    /// Append one binding.
    pub fn bind(mut self, value: impl Into<Operand>) -> Self {
        self.bindings.push(value.into());
        self
    }

    /// Surround the compiled fragment with `before` and `after`.
    pub fn wrap(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.wrap = Some((before.into(), after.into()));
        self
    }

    /// Number of `?` / `??` markers in the text.
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut chars = self.sql.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'?') => {
                    chars.next();
                }
                '?' => {
                    if chars.peek() == Some(&'?') {
                        chars.next();
                    }
                    count += 1;
                }
                _ => {}
            }
        }
        count
    }
}

impl From<&str> for Raw {
    fn from(sql: &str) -> Self {
        Raw::new(sql)
    }
}

impl From<String> for Raw {
    fn from(sql: String) -> Self {
        Raw::new(sql)
    }
}
