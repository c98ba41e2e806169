//! Statement builders, one per statement kind.

pub mod delete;
pub mod insert;
pub mod select;
pub mod update;
