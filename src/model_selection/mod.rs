//! Splitting and hyperparameter search
//!
//! Stratified train/test partitioning with a fixed seed, k-fold
//! cross-validation, and the exhaustive grid search over the logistic
//! regression hyperparameter space.

mod cross_validation;
mod grid_search;
mod split;

pub use cross_validation::{CrossValidator, CvSplit, CvStrategy};
pub use grid_search::{CandidateScore, FailedCandidate, GridSearch, ParamGrid, SearchOutcome};
pub use split::{stratified_split, TrainTestSplit};
