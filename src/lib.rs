//! iris-lab — exploratory analysis and classification of the Iris dataset
//!
//! A single-run pipeline over the classic 150-row Iris table:
//!
//! - [`data`] - Dataset acquisition (remote or local CSV) and typed access
//! - [`analysis`] - Missing-value accounting, summary statistics,
//!   correlation and covariance matrices
//! - [`model_selection`] - Stratified train/test splitting, k-fold
//!   cross-validation, exhaustive hyperparameter grid search
//! - [`training`] - Multinomial logistic regression with multiple solvers
//!   and penalties, plus classification metrics
//! - [`viz`] - Terminal renders: bar charts, pairwise plots, heatmaps
//! - [`pipeline`] - The fixed end-to-end run (seed 42, 80/20 split,
//!   5-fold CV, the full hyperparameter grid)
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod analysis;
pub mod model_selection;
pub mod training;
pub mod viz;
pub mod pipeline;
pub mod cli;

pub use error::{IrisError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{IrisError, Result};

    pub use crate::data::{Dataset, FEATURE_NAMES, IRIS_URL, TARGET_COLUMN};

    pub use crate::analysis::{
        class_distribution, correlation_matrix, covariance_matrix, describe, missing_cell_count,
    };

    pub use crate::model_selection::{
        CrossValidator, CvStrategy, GridSearch, ParamGrid, SearchOutcome, TrainTestSplit,
        stratified_split,
    };

    pub use crate::training::{
        ClassificationReport, LogisticConfig, LogisticRegression, Penalty, Solver,
        accuracy, confusion_matrix, normalize_rows,
    };

    pub use crate::pipeline::{CV_FOLDS, RANDOM_STATE, TEST_FRACTION};
}
