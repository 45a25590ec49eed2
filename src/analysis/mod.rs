//! Descriptive and exploratory analysis
//!
//! Diagnostic computations over the loaded table: missing-value accounting,
//! per-column summary statistics, class-frequency distributions, and pairwise
//! correlation/covariance matrices. Nothing here feeds the modeling stage.

mod matrix;
mod stats;

pub use matrix::{correlation_matrix, covariance_matrix};
pub use stats::{class_distribution, describe, missing_cell_count, ColumnSummary};
