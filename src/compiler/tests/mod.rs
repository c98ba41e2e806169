//! Compiler test modules.
//!
//! - `core`: SELECT, INSERT, UPDATE, DELETE and builder error reporting
//! - `dialects`: quoting, placeholders and per-dialect degradation
//! - `bindings`: placeholder/binding alignment across raw fragments and subqueries

mod bindings;
