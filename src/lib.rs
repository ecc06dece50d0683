//! planchain: plan, validate, and execute chains of operations.
//!
//! The binary is a thin clap layer over [`app`]; [`report`] renders results
//! for the terminal.

pub mod app;
pub mod report;
