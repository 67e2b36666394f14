//! Report output
//!
//! - `text`: console report
//! - `json`: JSON report file
//! - `csv`: one row per run, appended to a results table

pub mod csv;
pub mod json;
pub mod text;
