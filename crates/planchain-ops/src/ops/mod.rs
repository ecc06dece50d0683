//! Builtin operation implementations, grouped by category.
//!
//! To add an operation: implement the Operation trait in the matching
//! module and register it in `builtin_operations()` in ../lib.rs.

pub mod comm;
pub mod data;
pub mod datetime;
pub mod file;
pub mod math;
pub mod system;
pub mod text;
pub mod web;
