//! Model fitting and evaluation
//!
//! Multinomial logistic regression with interchangeable solvers, plus the
//! metrics used to judge it.

mod logistic;
mod metrics;

pub use logistic::{LogisticConfig, LogisticRegression, Penalty, Solver};
pub use metrics::{
    accuracy, confusion_matrix, normalize_rows, ClassMetrics, ClassificationReport,
};
