//! The fixed end-to-end run
//!
//! Everything downstream of data loading is deterministic: the same seed
//! drives both the exploratory train/test partition and the modeling
//! partition. Those are two independent draws over the same table; they
//! happen to coincide because the seed and strata match, but each stage
//! performs its own split rather than sharing one.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::analysis::{
    class_distribution, correlation_matrix, covariance_matrix, describe, missing_cell_count,
    ColumnSummary,
};
use crate::data::{Dataset, FEATURE_NAMES};
use crate::error::Result;
use crate::model_selection::{stratified_split, GridSearch, ParamGrid, SearchOutcome, TrainTestSplit};
use crate::training::{
    confusion_matrix, normalize_rows, ClassificationReport, LogisticConfig, LogisticRegression,
    Penalty, Solver,
};

/// Seed shared by every randomized stage
pub const RANDOM_STATE: u64 = 42;
/// Held-out fraction for both partitions
pub const TEST_FRACTION: f64 = 0.2;
/// Folds used to score each grid candidate
pub const CV_FOLDS: usize = 5;

/// The full hyperparameter space: every C, penalty and solver combination.
/// No l1_ratio is supplied, so the elasticnet candidates are rejected at
/// validation and show up in the failure list.
pub fn hyperparameter_grid() -> ParamGrid {
    ParamGrid {
        c_values: vec![0.1, 1.0, 10.0, 100.0],
        penalties: vec![Penalty::None, Penalty::L1, Penalty::L2, Penalty::ElasticNet],
        solvers: vec![
            Solver::NewtonCg,
            Solver::Lbfgs,
            Solver::Liblinear,
            Solver::Sag,
            Solver::Saga,
        ],
        l1_ratios: vec![],
    }
}

/// Shared optimizer settings for every candidate
pub fn base_config() -> LogisticConfig {
    LogisticConfig::default()
        .with_tol(1e-6)
        .with_max_iter(100)
}

/// Exploratory findings, computed on the training portion only
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdaReport {
    pub n_rows: usize,
    pub n_cols: usize,
    pub missing_cells: usize,
    pub distribution_full: Vec<(String, f64)>,
    pub distribution_train: Vec<(String, f64)>,
    pub distribution_test: Vec<(String, f64)>,
    pub summaries: Vec<ColumnSummary>,
    pub correlation: Array2<f64>,
    pub covariance: Array2<f64>,
    pub split: TrainTestSplit,
}

/// Stratified partition for the exploratory stage
pub fn split_records(dataset: &Dataset) -> Result<TrainTestSplit> {
    stratified_split(
        dataset.targets(),
        dataset.n_classes(),
        TEST_FRACTION,
        RANDOM_STATE,
    )
}

/// Run the exploratory stage: missing-value audit over the whole table,
/// then distribution, summary statistics and pairwise matrices on the
/// training rows only so the held-out rows never leak into them.
pub fn explore(dataset: &Dataset) -> Result<EdaReport> {
    let missing_cells = missing_cell_count(dataset.frame())?;
    let split = split_records(dataset)?;

    let x_train = dataset.feature_rows(&split.train_indices);
    let y_train = dataset.target_rows(&split.train_indices);
    let y_test = dataset.target_rows(&split.test_indices);

    let summaries = describe(&x_train, &FEATURE_NAMES);
    let distribution_full = class_distribution(dataset.targets(), dataset.classes());
    let distribution_train = class_distribution(&y_train, dataset.classes());
    let distribution_test = class_distribution(&y_test, dataset.classes());
    let correlation = correlation_matrix(&x_train);
    let covariance = covariance_matrix(&x_train);

    info!(
        rows = dataset.n_samples(),
        train = split.n_train(),
        test = split.n_test(),
        missing = missing_cells,
        "exploratory stage complete"
    );

    Ok(EdaReport {
        n_rows: dataset.n_samples(),
        n_cols: dataset.frame().width(),
        missing_cells,
        distribution_full,
        distribution_train,
        distribution_test,
        summaries,
        correlation,
        covariance,
        split,
    })
}

/// Materialized train/test arrays for the modeling stage
#[derive(Debug, Clone)]
pub struct ModelingSplit {
    pub x_train: Array2<f64>,
    pub y_train: Vec<usize>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<usize>,
    pub class_names: Vec<String>,
    pub split: TrainTestSplit,
}

impl ModelingSplit {
    pub fn n_classes(&self) -> usize {
        self.class_names.len()
    }
}

/// Stratified partition for the modeling stage, drawn independently of the
/// exploratory one.
pub fn split_features(dataset: &Dataset) -> Result<ModelingSplit> {
    let split = stratified_split(
        dataset.targets(),
        dataset.n_classes(),
        TEST_FRACTION,
        RANDOM_STATE,
    )?;

    Ok(ModelingSplit {
        x_train: dataset.feature_rows(&split.train_indices),
        y_train: dataset.target_rows(&split.train_indices),
        x_test: dataset.feature_rows(&split.test_indices),
        y_test: dataset.target_rows(&split.test_indices),
        class_names: dataset.classes().to_vec(),
        split,
    })
}

/// Sweep the full grid over the training rows
pub fn search(modeling: &ModelingSplit) -> Result<SearchOutcome> {
    let grid_search = GridSearch::new(hyperparameter_grid(), base_config(), CV_FOLDS);
    let outcome = grid_search.run(&modeling.x_train, &modeling.y_train, modeling.n_classes())?;
    info!(
        scored = outcome.results.len(),
        failed = outcome.failures.len(),
        best_c = outcome.best.config.c,
        best_penalty = %outcome.best.config.penalty,
        best_solver = %outcome.best.config.solver,
        best_score = outcome.best.mean_score,
        "grid search complete"
    );
    Ok(outcome)
}

/// Refit the winning configuration on the full training partition
pub fn refit_best(outcome: &SearchOutcome, modeling: &ModelingSplit) -> Result<LogisticRegression> {
    let mut model = LogisticRegression::new(outcome.best.config.clone());
    model.fit(&modeling.x_train, &modeling.y_train, modeling.n_classes())?;
    Ok(model)
}

/// Held-out evaluation of the refitted model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub accuracy: f64,
    pub confusion: Array2<f64>,
    pub confusion_normalized: Array2<f64>,
    pub report: ClassificationReport,
    pub predictions: Vec<usize>,
}

pub fn evaluate(model: &LogisticRegression, modeling: &ModelingSplit) -> Result<Evaluation> {
    let predictions = model.predict(&modeling.x_test)?;
    let confusion = confusion_matrix(&modeling.y_test, &predictions, modeling.n_classes())?;
    let confusion_normalized = normalize_rows(&confusion);
    let report =
        ClassificationReport::compute(&modeling.y_test, &predictions, &modeling.class_names)?;

    info!(accuracy = report.accuracy, "holdout evaluation complete");

    Ok(Evaluation {
        accuracy: report.accuracy,
        confusion,
        confusion_normalized,
        report,
        predictions,
    })
}

/// Everything one full run produces
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub eda: EdaReport,
    pub search: SearchOutcome,
    pub evaluation: Evaluation,
}

/// Explore, sweep, refit, evaluate.
pub fn run(dataset: &Dataset) -> Result<RunReport> {
    let eda = explore(dataset)?;
    let modeling = split_features(dataset)?;
    let outcome = search(&modeling)?;
    let model = refit_best(&outcome, &modeling)?;
    let evaluation = evaluate(&model, &modeling)?;

    Ok(RunReport {
        eda,
        search: outcome,
        evaluation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn tiny_dataset() -> Dataset {
        // 10 rows per class, linearly separable on petal_length
        let n = 10;
        let mut sl = Vec::new();
        let mut sw = Vec::new();
        let mut pl = Vec::new();
        let mut pw = Vec::new();
        let mut sp: Vec<&str> = Vec::new();
        for i in 0..n {
            let jitter = i as f64 * 0.01;
            sl.extend([5.0 + jitter, 6.0 + jitter, 6.5 + jitter]);
            sw.extend([3.4 + jitter, 2.8 + jitter, 3.0 + jitter]);
            pl.extend([1.4 + jitter, 4.3 + jitter, 5.8 + jitter]);
            pw.extend([0.2 + jitter, 1.3 + jitter, 2.2 + jitter]);
            sp.extend(["Iris-setosa", "Iris-versicolor", "Iris-virginica"]);
        }
        let frame = df!(
            "sepal_length" => &sl,
            "sepal_width" => &sw,
            "petal_length" => &pl,
            "petal_width" => &pw,
            "species" => &sp
        )
        .unwrap();
        Dataset::from_frame(frame).unwrap()
    }

    #[test]
    fn test_two_partitions_coincide_under_shared_seed() {
        let ds = tiny_dataset();
        let records = split_records(&ds).unwrap();
        let modeling = split_features(&ds).unwrap();
        assert_eq!(records, modeling.split);
    }

    #[test]
    fn test_explore_uses_training_rows_only() {
        let ds = tiny_dataset();
        let eda = explore(&ds).unwrap();
        assert_eq!(eda.missing_cells, 0);
        assert_eq!(eda.summaries[0].count, eda.split.n_train());
        assert_eq!(eda.correlation.shape(), &[4, 4]);
    }

    #[test]
    fn test_grid_candidate_counts() {
        let grid = hyperparameter_grid();
        assert_eq!(grid.n_candidates(), 80);
        let candidates = grid.candidates(&base_config());
        let valid = candidates.iter().filter(|c| c.validate().is_ok()).count();
        // elasticnet lacks l1_ratio, and several solver/penalty pairs clash
        assert_eq!(valid, 44);
        assert_eq!(candidates.len() - valid, 36);
    }

    #[test]
    fn test_modeling_split_shapes() {
        let ds = tiny_dataset();
        let modeling = split_features(&ds).unwrap();
        assert_eq!(modeling.x_train.nrows(), modeling.y_train.len());
        assert_eq!(modeling.x_test.nrows(), modeling.y_test.len());
        assert_eq!(modeling.x_train.nrows() + modeling.x_test.nrows(), 30);
        assert_eq!(modeling.n_classes(), 3);
    }
}
