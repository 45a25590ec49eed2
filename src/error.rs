//! Error types for the iris-lab pipeline

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, IrisError>;

/// Errors produced by the analysis and modeling pipeline
#[derive(Error, Debug)]
pub enum IrisError {
    /// Data acquisition or parsing failure
    #[error("Data error: {0}")]
    DataError(String),

    /// A named column is missing from the table
    #[error("Column not found: {0}")]
    FeatureNotFound(String),

    /// Array shape mismatch
    #[error("Shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    /// Invalid argument outside of hyperparameter space
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Numerical failure (singular system, non-finite loss)
    #[error("Computation error: {0}")]
    ComputationError(String),

    /// Model fitting failure
    #[error("Training error: {0}")]
    TrainingError(String),

    /// Unsupported solver/penalty combination or missing grid parameter
    #[error("Invalid hyperparameters: {0}")]
    InvalidHyperparameters(String),

    /// Predict/score called before fit
    #[error("Model has not been fitted")]
    ModelNotFitted,
}
