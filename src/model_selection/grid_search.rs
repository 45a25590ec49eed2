//! Exhaustive hyperparameter grid search with stratified k-fold scoring
//!
//! Every combination in the grid is attempted. Combinations the chosen
//! solver cannot optimize are recorded as failures and skipped rather than
//! aborting the sweep, so the outcome reports both the scored candidates
//! and the rejected ones.

use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{IrisError, Result};
use crate::model_selection::{CrossValidator, CvStrategy};
use crate::training::{LogisticConfig, LogisticRegression, Penalty, Solver};

/// The hyperparameter space to sweep, expanded in C -> penalty -> solver order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamGrid {
    pub c_values: Vec<f64>,
    pub penalties: Vec<Penalty>,
    pub solvers: Vec<Solver>,
    /// ElasticNet mixing values; empty leaves l1_ratio unset
    pub l1_ratios: Vec<f64>,
}

impl ParamGrid {
    /// Expand into concrete configurations on top of `base` (tol, max_iter,
    /// intercept and seed come from there).
    pub fn candidates(&self, base: &LogisticConfig) -> Vec<LogisticConfig> {
        let mut out = Vec::new();
        for &c in &self.c_values {
            for &penalty in &self.penalties {
                for &solver in &self.solvers {
                    let config = base
                        .clone()
                        .with_c(c)
                        .with_penalty(penalty)
                        .with_solver(solver);
                    if penalty == Penalty::ElasticNet && !self.l1_ratios.is_empty() {
                        for &r in &self.l1_ratios {
                            out.push(config.clone().with_l1_ratio(r));
                        }
                    } else {
                        out.push(config);
                    }
                }
            }
        }
        out
    }

    pub fn n_candidates(&self) -> usize {
        let en_factor = self.l1_ratios.len().max(1);
        self.c_values.len()
            * self.solvers.len()
            * self
                .penalties
                .iter()
                .map(|p| {
                    if *p == Penalty::ElasticNet {
                        en_factor
                    } else {
                        1
                    }
                })
                .sum::<usize>()
    }
}

/// Cross-validated score of one candidate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateScore {
    pub config: LogisticConfig,
    pub fold_scores: Vec<f64>,
    pub mean_score: f64,
    pub std_score: f64,
}

/// A candidate that could not be scored, with the reason
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedCandidate {
    pub config: LogisticConfig,
    pub error: String,
}

/// Result of a full sweep: the winner, every scored candidate in grid
/// order, and the rejected combinations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub best: CandidateScore,
    pub results: Vec<CandidateScore>,
    pub failures: Vec<FailedCandidate>,
}

impl SearchOutcome {
    pub fn n_attempted(&self) -> usize {
        self.results.len() + self.failures.len()
    }
}

/// Exhaustive grid search scored by stratified k-fold accuracy
pub struct GridSearch {
    grid: ParamGrid,
    base: LogisticConfig,
    n_folds: usize,
}

impl GridSearch {
    pub fn new(grid: ParamGrid, base: LogisticConfig, n_folds: usize) -> Self {
        Self {
            grid,
            base,
            n_folds,
        }
    }

    /// Run the sweep over `x`/`y`. Ties on mean score keep the candidate
    /// encountered first in grid order.
    pub fn run(&self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<SearchOutcome> {
        let cv = CrossValidator::new(CvStrategy::StratifiedKFold {
            n_splits: self.n_folds,
        });
        let folds = cv.split(x.nrows(), Some(y))?;

        let candidates = self.grid.candidates(&self.base);
        debug!(n_candidates = candidates.len(), "starting grid search");

        let mut results: Vec<CandidateScore> = Vec::new();
        let mut failures: Vec<FailedCandidate> = Vec::new();
        let mut best_idx: Option<usize> = None;

        for config in candidates {
            match Self::score_candidate(&config, x, y, n_classes, &folds) {
                Ok(score) => {
                    debug!(
                        c = config.c,
                        penalty = %config.penalty,
                        solver = %config.solver,
                        mean = score.mean_score,
                        "candidate scored"
                    );
                    let better = match best_idx {
                        Some(i) => score.mean_score > results[i].mean_score,
                        None => true,
                    };
                    results.push(score);
                    if better {
                        best_idx = Some(results.len() - 1);
                    }
                }
                Err(err) => {
                    warn!(
                        c = config.c,
                        penalty = %config.penalty,
                        solver = %config.solver,
                        %err,
                        "candidate failed"
                    );
                    failures.push(FailedCandidate {
                        config,
                        error: err.to_string(),
                    });
                }
            }
        }

        let best_idx = best_idx.ok_or_else(|| {
            IrisError::TrainingError("every grid candidate failed".to_string())
        })?;
        let best = results[best_idx].clone();

        Ok(SearchOutcome {
            best,
            results,
            failures,
        })
    }

    fn score_candidate(
        config: &LogisticConfig,
        x: &Array2<f64>,
        y: &[usize],
        n_classes: usize,
        folds: &[crate::model_selection::CvSplit],
    ) -> Result<CandidateScore> {
        config.validate()?;

        let mut fold_scores = Vec::with_capacity(folds.len());
        for fold in folds {
            let x_train = select_rows(x, &fold.train_indices);
            let y_train = select_targets(y, &fold.train_indices);
            let x_val = select_rows(x, &fold.test_indices);
            let y_val = select_targets(y, &fold.test_indices);

            let mut model = LogisticRegression::new(config.clone());
            model.fit(&x_train, &y_train, n_classes)?;
            fold_scores.push(model.score(&x_val, &y_val)?);
        }

        let n = fold_scores.len() as f64;
        let mean_score = fold_scores.iter().sum::<f64>() / n;
        let std_score = (fold_scores
            .iter()
            .map(|s| (s - mean_score).powi(2))
            .sum::<f64>()
            / n)
            .sqrt();

        Ok(CandidateScore {
            config: config.clone(),
            fold_scores,
            mean_score,
            std_score,
        })
    }
}

fn select_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
    Array2::from_shape_fn((indices.len(), x.ncols()), |(i, j)| x[[indices[i], j]])
}

fn select_targets(y: &[usize], indices: &[usize]) -> Vec<usize> {
    indices.iter().map(|&i| y[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    /// 30 points per class in three separated 2-d blobs
    fn blobs() -> (Array2<f64>, Vec<usize>) {
        let centers = [(0.0, 0.0), (6.0, 0.0), (0.0, 6.0)];
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut rows = Vec::new();
        let mut y = Vec::new();
        for (class, &(cx, cy)) in centers.iter().enumerate() {
            for _ in 0..30 {
                rows.push([
                    cx + rng.gen_range(-0.5..0.5),
                    cy + rng.gen_range(-0.5..0.5),
                ]);
                y.push(class);
            }
        }
        let x = Array2::from_shape_fn((rows.len(), 2), |(i, j)| rows[i][j]);
        (x, y)
    }

    fn small_grid() -> ParamGrid {
        ParamGrid {
            c_values: vec![1.0, 10.0],
            penalties: vec![Penalty::None, Penalty::L2],
            solvers: vec![Solver::Lbfgs, Solver::Liblinear],
            l1_ratios: vec![],
        }
    }

    #[test]
    fn test_candidates_expand_in_grid_order() {
        let grid = small_grid();
        let candidates = grid.candidates(&LogisticConfig::default());
        assert_eq!(candidates.len(), 8);
        assert_eq!(grid.n_candidates(), 8);
        // C varies slowest, solver fastest
        assert_eq!(candidates[0].c, 1.0);
        assert_eq!(candidates[0].penalty, Penalty::None);
        assert_eq!(candidates[0].solver, Solver::Lbfgs);
        assert_eq!(candidates[1].solver, Solver::Liblinear);
        assert_eq!(candidates[4].c, 10.0);
    }

    #[test]
    fn test_search_skips_unsupported_combinations() {
        let (x, y) = blobs();
        let search = GridSearch::new(small_grid(), LogisticConfig::default(), 3);
        let outcome = search.run(&x, &y, 3).unwrap();

        // liblinear cannot fit penalty=none, one per C value
        assert_eq!(outcome.failures.len(), 2);
        assert_eq!(outcome.results.len(), 6);
        assert_eq!(outcome.n_attempted(), 8);
        for failure in &outcome.failures {
            assert_eq!(failure.config.solver, Solver::Liblinear);
            assert_eq!(failure.config.penalty, Penalty::None);
        }
    }

    #[test]
    fn test_search_best_has_max_mean_score() {
        let (x, y) = blobs();
        let search = GridSearch::new(small_grid(), LogisticConfig::default(), 3);
        let outcome = search.run(&x, &y, 3).unwrap();

        let max = outcome
            .results
            .iter()
            .map(|r| r.mean_score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.best.mean_score, max);
        assert!(outcome.best.mean_score > 0.9);
        assert_eq!(outcome.best.fold_scores.len(), 3);
    }

    #[test]
    fn test_search_deterministic() {
        let (x, y) = blobs();
        let search = GridSearch::new(small_grid(), LogisticConfig::default(), 3);
        let a = search.run(&x, &y, 3).unwrap();
        let b = search.run(&x, &y, 3).unwrap();
        assert_eq!(a.best.mean_score, b.best.mean_score);
        assert_eq!(a.best.config.solver, b.best.config.solver);
        for (ra, rb) in a.results.iter().zip(&b.results) {
            assert_eq!(ra.fold_scores, rb.fold_scores);
        }
    }

    #[test]
    fn test_search_fails_when_all_candidates_invalid() {
        let (x, y) = blobs();
        let grid = ParamGrid {
            c_values: vec![1.0],
            penalties: vec![Penalty::ElasticNet],
            solvers: vec![Solver::Lbfgs],
            l1_ratios: vec![],
        };
        let search = GridSearch::new(grid, LogisticConfig::default(), 3);
        assert!(matches!(
            search.run(&x, &y, 3),
            Err(IrisError::TrainingError(_))
        ));
    }
}
