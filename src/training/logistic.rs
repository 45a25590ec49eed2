//! Multinomial logistic regression
//!
//! One model family, several optimizers. The softmax parameterization keeps a
//! full weight row per class; `liblinear` instead fits one-vs-rest binary
//! problems, matching its reference behavior. Penalty support varies by
//! solver and incompatible combinations are rejected at fit time so an
//! exhaustive grid search can skip them.

use ndarray::{s, Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use tracing::debug;

use crate::error::{IrisError, Result};

/// Solve symmetric positive-definite system Ax = b using Cholesky decomposition.
/// Falls back to a regularized solve if the matrix is near-singular.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }

            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    // Not positive definite: add a small ridge and retry once
                    let mut a_reg = a.clone();
                    let ridge = 1e-8 * a.diag().iter().map(|v| v.abs()).sum::<f64>() / n as f64;
                    let ridge = ridge.max(1e-10);
                    for k in 0..n {
                        a_reg[[k, k]] += ridge;
                    }
                    return cholesky_solve_inner(&a_reg, b);
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(back_substitute(&l, b))
}

/// Inner Cholesky solve (no retry) for the regularized matrix
fn cholesky_solve_inner(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut l = Array2::zeros((n, n));

    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= 0.0 {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    Some(back_substitute(&l, b))
}

/// Forward then backward substitution given the Cholesky factor L
fn back_substitute(l: &Array2<f64>, b: &Array1<f64>) -> Array1<f64> {
    let n = b.len();

    let mut y = Array1::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    let mut x = Array1::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    x
}

/// Matrix inversion via Gauss-Jordan elimination (fallback path)
fn matrix_inverse(m: &Array2<f64>) -> Option<Array2<f64>> {
    let n = m.nrows();
    if n != m.ncols() {
        return None;
    }

    let mut aug = Array2::zeros((n, 2 * n));
    for i in 0..n {
        for j in 0..n {
            aug[[i, j]] = m[[i, j]];
        }
        aug[[i, n + i]] = 1.0;
    }

    for col in 0..n {
        let mut max_row = col;
        for row in col + 1..n {
            if aug[[row, col]].abs() > aug[[max_row, col]].abs() {
                max_row = row;
            }
        }

        if max_row != col {
            for j in 0..2 * n {
                let tmp = aug[[col, j]];
                aug[[col, j]] = aug[[max_row, j]];
                aug[[max_row, j]] = tmp;
            }
        }

        if aug[[col, col]].abs() < 1e-10 {
            return None;
        }

        let pivot = aug[[col, col]];
        for j in 0..2 * n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                for j in 0..2 * n {
                    aug[[row, j]] -= factor * aug[[col, j]];
                }
            }
        }
    }

    let mut inv = Array2::zeros((n, n));
    for i in 0..n {
        for j in 0..n {
            inv[[i, j]] = aug[[i, n + j]];
        }
    }

    Some(inv)
}

/// Soft-threshold operator for L1 proximal steps
fn soft_threshold(val: f64, threshold: f64) -> f64 {
    if val > threshold {
        val - threshold
    } else if val < -threshold {
        val + threshold
    } else {
        0.0
    }
}

/// Regularization penalty applied to the weights (never the intercept)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Penalty {
    None,
    L1,
    L2,
    ElasticNet,
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Penalty::None => "none",
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
            Penalty::ElasticNet => "elasticnet",
        };
        write!(f, "{}", name)
    }
}

/// Optimization algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Solver {
    /// Damped Newton iterations with exact multinomial Hessian
    NewtonCg,
    /// Limited-memory BFGS with backtracking line search
    Lbfgs,
    /// One-vs-rest binary fits (Newton for l2, proximal gradient for l1)
    Liblinear,
    /// Stochastic average gradient
    Sag,
    /// SAGA variant of SAG with a proximal step for sparse penalties
    Saga,
}

impl Solver {
    /// Which penalties this solver can optimize
    pub fn supports(&self, penalty: Penalty) -> bool {
        match (self, penalty) {
            (Solver::Liblinear, Penalty::None | Penalty::ElasticNet) => false,
            (Solver::NewtonCg | Solver::Lbfgs | Solver::Sag, Penalty::L1 | Penalty::ElasticNet) => {
                false
            }
            _ => true,
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Solver::NewtonCg => "newton-cg",
            Solver::Lbfgs => "lbfgs",
            Solver::Liblinear => "liblinear",
            Solver::Sag => "sag",
            Solver::Saga => "saga",
        };
        write!(f, "{}", name)
    }
}

/// Hyperparameters for one logistic regression fit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    /// Inverse regularization strength
    pub c: f64,
    pub penalty: Penalty,
    pub solver: Solver,
    /// ElasticNet mixing (required when penalty is elasticnet)
    pub l1_ratio: Option<f64>,
    /// Convergence tolerance
    pub tol: f64,
    /// Iteration cap (epochs for the stochastic solvers)
    pub max_iter: usize,
    pub fit_intercept: bool,
    /// Seed for the stochastic solvers
    pub random_state: Option<u64>,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::L2,
            solver: Solver::Lbfgs,
            l1_ratio: None,
            tol: 1e-6,
            max_iter: 100,
            fit_intercept: true,
            random_state: Some(42),
        }
    }
}

impl LogisticConfig {
    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_l1_ratio(mut self, l1_ratio: f64) -> Self {
        self.l1_ratio = Some(l1_ratio);
        self
    }

    pub fn with_tol(mut self, tol: f64) -> Self {
        self.tol = tol;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Reject combinations the chosen solver cannot optimize.
    pub fn validate(&self) -> Result<()> {
        if !self.c.is_finite() || self.c <= 0.0 {
            return Err(IrisError::InvalidHyperparameters(format!(
                "C must be positive, got {}",
                self.c
            )));
        }
        if !self.solver.supports(self.penalty) {
            return Err(IrisError::InvalidHyperparameters(format!(
                "penalty '{}' is not supported by solver '{}'",
                self.penalty, self.solver
            )));
        }
        if self.penalty == Penalty::ElasticNet {
            match self.l1_ratio {
                None => {
                    return Err(IrisError::InvalidHyperparameters(
                        "elasticnet penalty requires l1_ratio".to_string(),
                    ))
                }
                Some(r) if !(0.0..=1.0).contains(&r) => {
                    return Err(IrisError::InvalidHyperparameters(format!(
                        "l1_ratio must be in [0, 1], got {}",
                        r
                    )))
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// (l1, l2) coefficients of the penalty term at sum-loss scale
    fn penalty_coefficients(&self) -> (f64, f64) {
        match self.penalty {
            Penalty::None => (0.0, 0.0),
            Penalty::L1 => (1.0 / self.c, 0.0),
            Penalty::L2 => (0.0, 1.0 / self.c),
            Penalty::ElasticNet => {
                let r = self.l1_ratio.unwrap_or(0.5);
                (r / self.c, (1.0 - r) / self.c)
            }
        }
    }
}

/// Multinomial logistic regression classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub config: LogisticConfig,
    /// Fitted `k x d` weight matrix (one row per class)
    pub weights: Option<Array2<f64>>,
    /// Fitted per-class intercepts
    pub intercept: Option<Array1<f64>>,
    pub n_classes: usize,
    pub is_fitted: bool,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            weights: None,
            intercept: None,
            n_classes: 0,
            is_fitted: false,
        }
    }

    /// Fit on `x` (n x d) against class indices `y` in `0..n_classes`.
    pub fn fit(&mut self, x: &Array2<f64>, y: &[usize], n_classes: usize) -> Result<&mut Self> {
        self.config.validate()?;

        let n = x.nrows();
        if n != y.len() {
            return Err(IrisError::ShapeError {
                expected: format!("{} targets", n),
                actual: format!("{} targets", y.len()),
            });
        }
        if n_classes < 2 {
            return Err(IrisError::ValidationError(
                "need at least 2 classes".to_string(),
            ));
        }
        if let Some(&bad) = y.iter().find(|&&t| t >= n_classes) {
            return Err(IrisError::ValidationError(format!(
                "target {} out of range for {} classes",
                bad, n_classes
            )));
        }

        let problem = Problem::new(x, y, n_classes, &self.config);

        let w_full = match self.config.solver {
            Solver::NewtonCg => newton_fit(&problem)?,
            Solver::Lbfgs => lbfgs_fit(&problem)?,
            Solver::Liblinear => ovr_fit(&problem)?,
            Solver::Sag => sag_fit(&problem, false)?,
            Solver::Saga => sag_fit(&problem, true)?,
        };

        let d = x.ncols();
        let weights = w_full.slice(s![.., ..d]).to_owned();
        let intercept = if self.config.fit_intercept {
            w_full.column(d).to_owned()
        } else {
            Array1::zeros(n_classes)
        };

        self.weights = Some(weights);
        self.intercept = Some(intercept);
        self.n_classes = n_classes;
        self.is_fitted = true;
        Ok(self)
    }

    /// Raw per-class scores (n x k)
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(IrisError::ModelNotFitted);
        }
        let weights = self.weights.as_ref().unwrap();
        let intercept = self.intercept.as_ref().unwrap();
        if x.ncols() != weights.ncols() {
            return Err(IrisError::ShapeError {
                expected: format!("{} features", weights.ncols()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(&weights.t()) + intercept)
    }

    /// Class-membership probabilities (rows sum to 1)
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let mut z = self.decision_function(x)?;
        match self.config.solver {
            Solver::Liblinear => {
                // One-vs-rest: per-class sigmoids, normalized
                z.mapv_inplace(|v| 1.0 / (1.0 + (-v).exp()));
                for mut row in z.axis_iter_mut(Axis(0)) {
                    let sum: f64 = row.iter().sum();
                    if sum > 0.0 {
                        row.mapv_inplace(|v| v / sum);
                    }
                }
            }
            _ => softmax_rows(&mut z),
        }
        Ok(z)
    }

    /// Predicted class index per row
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let z = self.decision_function(x)?;
        Ok(z.axis_iter(Axis(0))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                    .map(|(i, _)| i)
                    .unwrap_or(0)
            })
            .collect())
    }

    /// Mean accuracy on the given data
    pub fn score(&self, x: &Array2<f64>, y: &[usize]) -> Result<f64> {
        let pred = self.predict(x)?;
        let correct = pred.iter().zip(y.iter()).filter(|(p, t)| p == t).count();
        Ok(correct as f64 / y.len().max(1) as f64)
    }
}

fn softmax_rows(z: &mut Array2<f64>) {
    for mut row in z.axis_iter_mut(Axis(0)) {
        let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let mut sum = 0.0;
        for v in row.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }
        for v in row.iter_mut() {
            *v /= sum;
        }
    }
}

/// The optimization problem a solver sees: design matrix with intercept
/// column appended, class indices, and penalty coefficients. The intercept
/// column (when present) is excluded from regularization.
struct Problem<'a> {
    xt: Array2<f64>,
    y: &'a [usize],
    k: usize,
    /// leading columns subject to penalty
    n_penalized: usize,
    l1: f64,
    l2: f64,
    tol: f64,
    max_iter: usize,
    seed: u64,
}

impl<'a> Problem<'a> {
    fn new(x: &Array2<f64>, y: &'a [usize], n_classes: usize, config: &LogisticConfig) -> Self {
        let n = x.nrows();
        let d = x.ncols();
        let xt = if config.fit_intercept {
            let mut xt = Array2::ones((n, d + 1));
            xt.slice_mut(s![.., ..d]).assign(x);
            xt
        } else {
            x.clone()
        };
        let (l1, l2) = config.penalty_coefficients();
        Self {
            xt,
            y,
            k: n_classes,
            n_penalized: d,
            l1,
            l2,
            tol: config.tol,
            max_iter: config.max_iter,
            seed: config.random_state.unwrap_or(42),
        }
    }

    fn n_samples(&self) -> usize {
        self.xt.nrows()
    }

    fn n_params_per_class(&self) -> usize {
        self.xt.ncols()
    }

    /// Softmax probabilities (n x k) under weights `w` (k x p)
    fn probabilities(&self, w: &Array2<f64>) -> Array2<f64> {
        let mut z = self.xt.dot(&w.t());
        softmax_rows(&mut z);
        z
    }

    /// Smooth objective (cross-entropy + l2 term) and its gradient (k x p).
    /// The l1 term is handled by proximal steps in the solvers that use it.
    fn loss_grad(&self, w: &Array2<f64>) -> (f64, Array2<f64>) {
        let z = self.xt.dot(&w.t());
        let mut probs = z.clone();
        let mut loss = 0.0;

        for (i, mut row) in probs.axis_iter_mut(Axis(0)).enumerate() {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max).exp();
                sum += *v;
            }
            loss += sum.ln() + max - z[[i, self.y[i]]];
            for v in row.iter_mut() {
                *v /= sum;
            }
        }

        // grad = (P - Y)^T X
        let mut resid = probs;
        for (i, &yi) in self.y.iter().enumerate() {
            resid[[i, yi]] -= 1.0;
        }
        let mut grad = resid.t().dot(&self.xt);

        if self.l2 > 0.0 {
            let wp = w.slice(s![.., ..self.n_penalized]);
            loss += 0.5 * self.l2 * wp.iter().map(|v| v * v).sum::<f64>();
            let mut gp = grad.slice_mut(s![.., ..self.n_penalized]);
            gp.zip_mut_with(&wp, |g, &v| *g += self.l2 * v);
        }

        (loss, grad)
    }
}

/// Damped Newton iterations on the full multinomial objective.
/// Linear solves go through Cholesky with a Gauss-Jordan fallback.
fn newton_fit(prob: &Problem) -> Result<Array2<f64>> {
    let k = prob.k;
    let p = prob.n_params_per_class();
    let np = k * p;
    let n = prob.n_samples();
    let mut w: Array2<f64> = Array2::zeros((k, p));

    for iter in 0..prob.max_iter {
        let (loss, grad) = prob.loss_grad(&w);
        if !loss.is_finite() {
            return Err(IrisError::ComputationError(
                "non-finite loss in newton solver".to_string(),
            ));
        }
        let gmax = grad.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if gmax < prob.tol {
            debug!(iter, "newton converged");
            break;
        }

        let probs = prob.probabilities(&w);

        // H[(a,i),(b,j)] = sum_n x_ni x_nj p_na (delta_ab - p_nb) + l2 on the diagonal
        let mut h: Array2<f64> = Array2::zeros((np, np));
        for row in 0..n {
            let xr = prob.xt.row(row);
            for a in 0..k {
                let pa = probs[[row, a]];
                for b in a..k {
                    let coef = if a == b {
                        pa * (1.0 - pa)
                    } else {
                        -pa * probs[[row, b]]
                    };
                    if coef == 0.0 {
                        continue;
                    }
                    for i in 0..p {
                        let xi = coef * xr[i];
                        if xi == 0.0 {
                            continue;
                        }
                        for j in 0..p {
                            let v = xi * xr[j];
                            h[[a * p + i, b * p + j]] += v;
                            if a != b {
                                h[[b * p + j, a * p + i]] += v;
                            }
                        }
                    }
                }
            }
        }
        for a in 0..k {
            for i in 0..prob.n_penalized {
                h[[a * p + i, a * p + i]] += prob.l2;
            }
        }

        let g_flat = Array1::from_iter(grad.iter().copied());
        let step = match cholesky_solve(&h, &g_flat) {
            Some(step) => step,
            None => matrix_inverse(&h).map(|inv| inv.dot(&g_flat)).ok_or_else(|| {
                IrisError::ComputationError("singular Hessian in newton solver".to_string())
            })?,
        };

        // Halve the step until the objective decreases
        let mut t = 1.0;
        let mut accepted = false;
        for _ in 0..30 {
            let mut w_new = w.clone();
            for a in 0..k {
                for i in 0..p {
                    w_new[[a, i]] -= t * step[a * p + i];
                }
            }
            let (new_loss, _) = prob.loss_grad(&w_new);
            if new_loss.is_finite() && new_loss < loss {
                w = w_new;
                accepted = true;
                break;
            }
            t *= 0.5;
        }
        if !accepted {
            debug!(iter, "newton stalled");
            break;
        }
    }

    Ok(w)
}

/// Limited-memory BFGS: two-loop recursion, Armijo backtracking, history 10.
fn lbfgs_fit(prob: &Problem) -> Result<Array2<f64>> {
    const HISTORY: usize = 10;
    const C1: f64 = 1e-4;

    let k = prob.k;
    let p = prob.n_params_per_class();
    let np = k * p;

    let unflatten = |theta: &Array1<f64>| {
        Array2::from_shape_fn((k, p), |(a, i)| theta[a * p + i])
    };
    let value_grad = |theta: &Array1<f64>| -> (f64, Array1<f64>) {
        let (loss, grad) = prob.loss_grad(&unflatten(theta));
        (loss, Array1::from_iter(grad.iter().copied()))
    };

    let mut theta: Array1<f64> = Array1::zeros(np);
    let (mut loss, mut grad) = value_grad(&theta);
    let mut history: VecDeque<(Array1<f64>, Array1<f64>, f64)> = VecDeque::new();

    for iter in 0..prob.max_iter {
        if !loss.is_finite() {
            return Err(IrisError::ComputationError(
                "non-finite loss in lbfgs solver".to_string(),
            ));
        }
        let gmax = grad.iter().fold(0.0f64, |m, v| m.max(v.abs()));
        if gmax < prob.tol {
            debug!(iter, "lbfgs converged");
            break;
        }

        // Two-loop recursion: d = -H g
        let mut q = grad.clone();
        let mut alphas = Vec::with_capacity(history.len());
        for (s_vec, y_vec, rho) in history.iter().rev() {
            let alpha = rho * s_vec.dot(&q);
            q.zip_mut_with(y_vec, |qv, &yv| *qv -= alpha * yv);
            alphas.push(alpha);
        }
        if let Some((s_vec, y_vec, _)) = history.back() {
            let gamma = s_vec.dot(y_vec) / y_vec.dot(y_vec);
            q.mapv_inplace(|v| v * gamma);
        }
        for ((s_vec, y_vec, rho), alpha) in history.iter().zip(alphas.into_iter().rev()) {
            let beta = rho * y_vec.dot(&q);
            q.zip_mut_with(s_vec, |qv, &sv| *qv += (alpha - beta) * sv);
        }
        let mut dir = -q;

        let mut gd = grad.dot(&dir);
        if gd >= 0.0 {
            // Curvature went bad; restart from steepest descent
            history.clear();
            dir = grad.mapv(|v| -v);
            gd = grad.dot(&dir);
        }

        let mut t = if history.is_empty() {
            1.0 / gmax.max(1.0)
        } else {
            1.0
        };
        let mut theta_new = theta.clone();
        let mut loss_new = loss;
        let mut accepted = false;
        for _ in 0..40 {
            theta_new = &theta + &(dir.mapv(|v| v * t));
            let (l, _) = value_grad(&theta_new);
            if l.is_finite() && l <= loss + C1 * t * gd {
                loss_new = l;
                accepted = true;
                break;
            }
            t *= 0.5;
        }
        if !accepted {
            debug!(iter, "lbfgs line search stalled");
            break;
        }

        let (_, grad_new) = value_grad(&theta_new);
        let s_vec = &theta_new - &theta;
        let y_vec = &grad_new - &grad;
        let sy = s_vec.dot(&y_vec);
        if sy > 1e-10 {
            history.push_back((s_vec, y_vec, 1.0 / sy));
            if history.len() > HISTORY {
                history.pop_front();
            }
        }

        theta = theta_new;
        grad = grad_new;
        loss = loss_new;
    }

    Ok(unflatten(&theta))
}

/// Stochastic average gradient, optionally the SAGA variant.
/// Keeps a per-sample residual memory so each step uses the running average
/// of all sample gradients; SAGA adds the unbiased correction and a proximal
/// step that enables l1/elasticnet.
fn sag_fit(prob: &Problem, saga: bool) -> Result<Array2<f64>> {
    let n = prob.n_samples();
    let k = prob.k;
    let p = prob.n_params_per_class();

    let mut w: Array2<f64> = Array2::zeros((k, p));
    let mut memory: Array2<f64> = Array2::zeros((n, k));
    let mut seen = vec![false; n];
    let mut n_seen = 0usize;
    // grad_sum[a][j] = sum_i memory[i][a] * x[i][j]
    let mut grad_sum: Array2<f64> = Array2::zeros((k, p));

    // Mean-objective scaling keeps the step size sample-count free
    let l2 = prob.l2 / n as f64;
    let l1 = prob.l1 / n as f64;
    let max_sq_norm = (0..n)
        .map(|i| prob.xt.row(i).iter().map(|v| v * v).sum::<f64>())
        .fold(0.0f64, f64::max);
    let lr = 1.0 / (0.25 * max_sq_norm + l2).max(1e-12);

    let mut rng = ChaCha8Rng::seed_from_u64(prob.seed);
    let mut order: Vec<usize> = (0..n).collect();
    let mut z = Array1::zeros(k);

    for epoch in 0..prob.max_iter {
        order.shuffle(&mut rng);
        let mut max_change = 0.0f64;

        for &i in &order {
            if !seen[i] {
                seen[i] = true;
                n_seen += 1;
            }
            let xi = prob.xt.row(i);

            // Fresh residual p_i - y_i at the current weights
            z.assign(&w.dot(&xi));
            let zmax = z.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for v in z.iter_mut() {
                *v = (*v - zmax).exp();
                sum += *v;
            }
            for v in z.iter_mut() {
                *v /= sum;
            }
            z[prob.y[i]] -= 1.0;

            if saga {
                // w <- prox(w - lr (grad_i - memory_i + avg_memory + l2 w))
                let inv_seen = 1.0 / n_seen as f64;
                for a in 0..k {
                    let delta = z[a] - memory[[i, a]];
                    for j in 0..p {
                        let mut dir = delta * xi[j] + grad_sum[[a, j]] * inv_seen;
                        if j < prob.n_penalized {
                            dir += l2 * w[[a, j]];
                        }
                        let old = w[[a, j]];
                        let mut new = old - lr * dir;
                        if l1 > 0.0 && j < prob.n_penalized {
                            new = soft_threshold(new, lr * l1);
                        }
                        w[[a, j]] = new;
                        max_change = max_change.max((new - old).abs());
                    }
                }
                for a in 0..k {
                    let delta = z[a] - memory[[i, a]];
                    if delta != 0.0 {
                        for j in 0..p {
                            grad_sum[[a, j]] += delta * xi[j];
                        }
                    }
                    memory[[i, a]] = z[a];
                }
            } else {
                // SAG: refresh the memory first, step along the average
                for a in 0..k {
                    let delta = z[a] - memory[[i, a]];
                    if delta != 0.0 {
                        for j in 0..p {
                            grad_sum[[a, j]] += delta * xi[j];
                        }
                    }
                    memory[[i, a]] = z[a];
                }
                let inv_seen = 1.0 / n_seen as f64;
                for a in 0..k {
                    for j in 0..p {
                        let mut dir = grad_sum[[a, j]] * inv_seen;
                        if j < prob.n_penalized {
                            dir += l2 * w[[a, j]];
                        }
                        let old = w[[a, j]];
                        let new = old - lr * dir;
                        w[[a, j]] = new;
                        max_change = max_change.max((new - old).abs());
                    }
                }
            }
        }

        if max_change < prob.tol {
            debug!(epoch, saga, "sag converged");
            break;
        }
    }

    Ok(w)
}

/// One-vs-rest fits in the manner of liblinear: one binary problem per class,
/// Newton for l2, proximal gradient (ISTA with backtracking) for l1.
fn ovr_fit(prob: &Problem) -> Result<Array2<f64>> {
    let k = prob.k;
    let p = prob.n_params_per_class();
    let mut w = Array2::zeros((k, p));

    for class in 0..k {
        let targets: Vec<f64> = prob
            .y
            .iter()
            .map(|&t| if t == class { 1.0 } else { 0.0 })
            .collect();
        let row = if prob.l1 > 0.0 {
            binary_proximal_fit(prob, &targets)?
        } else {
            binary_newton_fit(prob, &targets)?
        };
        w.row_mut(class).assign(&row);
    }

    Ok(w)
}

/// Binary logistic objective: sum_n [ln(1 + e^z) - t z] + l2/2 ||v_pen||^2
fn binary_loss_grad(prob: &Problem, targets: &[f64], v: &Array1<f64>) -> (f64, Array1<f64>) {
    let n = prob.n_samples();
    let mut loss = 0.0;
    let mut grad = Array1::zeros(v.len());

    for i in 0..n {
        let xi = prob.xt.row(i);
        let z: f64 = xi.dot(v);
        let t = targets[i];
        // ln(1 + e^z) computed stably
        loss += if z > 0.0 { z + (-z).exp().ln_1p() } else { z.exp().ln_1p() } - t * z;
        let sigma = 1.0 / (1.0 + (-z).exp());
        let r = sigma - t;
        grad.zip_mut_with(&xi, |g, &x| *g += r * x);
    }

    if prob.l2 > 0.0 {
        for j in 0..prob.n_penalized {
            loss += 0.5 * prob.l2 * v[j] * v[j];
            grad[j] += prob.l2 * v[j];
        }
    }

    (loss, grad)
}

fn binary_newton_fit(prob: &Problem, targets: &[f64]) -> Result<Array1<f64>> {
    let n = prob.n_samples();
    let p = prob.n_params_per_class();
    let mut v: Array1<f64> = Array1::zeros(p);

    for iter in 0..prob.max_iter {
        let (loss, grad) = binary_loss_grad(prob, targets, &v);
        let gmax = grad.iter().fold(0.0f64, |m, g| m.max(g.abs()));
        if gmax < prob.tol {
            debug!(iter, "ovr newton converged");
            break;
        }

        let mut h: Array2<f64> = Array2::zeros((p, p));
        for i in 0..n {
            let xi = prob.xt.row(i);
            let z: f64 = xi.dot(&v);
            let sigma = 1.0 / (1.0 + (-z).exp());
            let coef = sigma * (1.0 - sigma);
            if coef == 0.0 {
                continue;
            }
            for a in 0..p {
                let xa = coef * xi[a];
                for b in 0..p {
                    h[[a, b]] += xa * xi[b];
                }
            }
        }
        for j in 0..prob.n_penalized {
            h[[j, j]] += prob.l2;
        }

        let step = match cholesky_solve(&h, &grad) {
            Some(step) => step,
            None => matrix_inverse(&h).map(|inv| inv.dot(&grad)).ok_or_else(|| {
                IrisError::ComputationError("singular Hessian in ovr solver".to_string())
            })?,
        };

        let mut t = 1.0;
        let mut accepted = false;
        for _ in 0..30 {
            let v_new = &v - &(step.mapv(|s| s * t));
            let (new_loss, _) = binary_loss_grad(prob, targets, &v_new);
            if new_loss.is_finite() && new_loss < loss {
                v = v_new;
                accepted = true;
                break;
            }
            t *= 0.5;
        }
        if !accepted {
            break;
        }
    }

    Ok(v)
}

/// ISTA with backtracking for the l1-penalized binary problem
fn binary_proximal_fit(prob: &Problem, targets: &[f64]) -> Result<Array1<f64>> {
    let p = prob.n_params_per_class();
    let mut v: Array1<f64> = Array1::zeros(p);
    let mut step = 1.0f64;

    for iter in 0..prob.max_iter {
        let (loss, grad) = binary_loss_grad(prob, targets, &v);
        if !loss.is_finite() {
            return Err(IrisError::ComputationError(
                "non-finite loss in ovr proximal solver".to_string(),
            ));
        }

        // Backtrack on the proximal step until the quadratic model holds
        let mut v_new = v.clone();
        let mut accepted = false;
        for _ in 0..40 {
            v_new = &v - &(grad.mapv(|g| g * step));
            for j in 0..prob.n_penalized {
                v_new[j] = soft_threshold(v_new[j], step * prob.l1);
            }
            let diff = &v_new - &v;
            let (new_loss, _) = binary_loss_grad(prob, targets, &v_new);
            let model = loss + grad.dot(&diff) + diff.dot(&diff) / (2.0 * step);
            if new_loss.is_finite() && new_loss <= model {
                accepted = true;
                break;
            }
            step *= 0.5;
        }
        if !accepted {
            break;
        }

        let max_change = v_new
            .iter()
            .zip(v.iter())
            .fold(0.0f64, |m, (a, b)| m.max((a - b).abs()));
        v = v_new;
        if max_change < prob.tol {
            debug!(iter, "ovr proximal converged");
            break;
        }
        // Allow the step to grow back between iterations
        step = (step * 2.0).min(1.0);
    }

    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Three well-separated 2-d blobs, four points each
    fn blobs() -> (Array2<f64>, Vec<usize>) {
        let x = array![
            [0.0, 0.0],
            [0.2, 0.1],
            [0.1, 0.3],
            [0.3, 0.2],
            [5.0, 0.0],
            [5.2, 0.1],
            [5.1, 0.3],
            [4.9, 0.2],
            [0.0, 5.0],
            [0.2, 5.1],
            [0.1, 4.9],
            [0.3, 5.2],
        ];
        let y = vec![0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2];
        (x, y)
    }

    fn fit_and_score(config: LogisticConfig) -> f64 {
        let (x, y) = blobs();
        let mut model = LogisticRegression::new(config);
        model.fit(&x, &y, 3).unwrap();
        model.score(&x, &y).unwrap()
    }

    #[test]
    fn test_newton_separates_blobs() {
        let config = LogisticConfig::default()
            .with_solver(Solver::NewtonCg)
            .with_c(10.0);
        assert_eq!(fit_and_score(config), 1.0);
    }

    #[test]
    fn test_lbfgs_separates_blobs() {
        let config = LogisticConfig::default().with_c(10.0);
        assert_eq!(fit_and_score(config), 1.0);
    }

    #[test]
    fn test_liblinear_l2_separates_blobs() {
        let config = LogisticConfig::default()
            .with_solver(Solver::Liblinear)
            .with_c(10.0);
        assert_eq!(fit_and_score(config), 1.0);
    }

    #[test]
    fn test_liblinear_l1_separates_blobs() {
        let config = LogisticConfig::default()
            .with_solver(Solver::Liblinear)
            .with_penalty(Penalty::L1)
            .with_c(10.0)
            .with_max_iter(500);
        assert_eq!(fit_and_score(config), 1.0);
    }

    #[test]
    fn test_saga_separates_blobs() {
        let config = LogisticConfig::default()
            .with_solver(Solver::Saga)
            .with_c(10.0)
            .with_max_iter(300);
        assert_eq!(fit_and_score(config), 1.0);
    }

    #[test]
    fn test_sag_separates_blobs() {
        let config = LogisticConfig::default()
            .with_solver(Solver::Sag)
            .with_c(10.0)
            .with_max_iter(300);
        assert_eq!(fit_and_score(config), 1.0);
    }

    #[test]
    fn test_predict_proba_rows_sum_to_one() {
        let (x, y) = blobs();
        let mut model = LogisticRegression::new(LogisticConfig::default());
        model.fit(&x, &y, 3).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        for row in proba.axis_iter(Axis(0)) {
            let sum: f64 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_solver_penalty_compatibility() {
        assert!(Solver::NewtonCg.supports(Penalty::None));
        assert!(Solver::NewtonCg.supports(Penalty::L2));
        assert!(!Solver::NewtonCg.supports(Penalty::L1));
        assert!(!Solver::Lbfgs.supports(Penalty::ElasticNet));
        assert!(!Solver::Liblinear.supports(Penalty::None));
        assert!(Solver::Liblinear.supports(Penalty::L1));
        assert!(!Solver::Sag.supports(Penalty::L1));
        assert!(Solver::Saga.supports(Penalty::L1));
        assert!(Solver::Saga.supports(Penalty::ElasticNet));
    }

    #[test]
    fn test_elasticnet_requires_l1_ratio() {
        let config = LogisticConfig::default()
            .with_solver(Solver::Saga)
            .with_penalty(Penalty::ElasticNet);
        let err = config.validate().unwrap_err();
        assert!(matches!(err, IrisError::InvalidHyperparameters(_)));

        let config = config.with_l1_ratio(0.5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_combination_fails_fit() {
        let (x, y) = blobs();
        let config = LogisticConfig::default()
            .with_solver(Solver::Liblinear)
            .with_penalty(Penalty::None);
        let mut model = LogisticRegression::new(config);
        assert!(matches!(
            model.fit(&x, &y, 3),
            Err(IrisError::InvalidHyperparameters(_))
        ));
    }

    #[test]
    fn test_unfitted_model_rejects_predict() {
        let (x, _) = blobs();
        let model = LogisticRegression::new(LogisticConfig::default());
        assert!(matches!(
            model.predict(&x),
            Err(IrisError::ModelNotFitted)
        ));
    }

    #[test]
    fn test_sag_deterministic() {
        let (x, y) = blobs();
        let config = LogisticConfig::default()
            .with_solver(Solver::Sag)
            .with_max_iter(50);
        let mut a = LogisticRegression::new(config.clone());
        let mut b = LogisticRegression::new(config);
        a.fit(&x, &y, 3).unwrap();
        b.fit(&x, &y, 3).unwrap();
        assert_eq!(a.weights.as_ref().unwrap(), b.weights.as_ref().unwrap());
    }

    #[test]
    fn test_cholesky_solve_identity() {
        let a = array![[2.0, 0.0], [0.0, 4.0]];
        let b = array![2.0, 8.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert!((x[0] - 1.0).abs() < 1e-12);
        assert!((x[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_matrix_inverse_2x2() {
        let m = array![[4.0, 7.0], [2.0, 6.0]];
        let inv = matrix_inverse(&m).unwrap();
        let prod = m.dot(&inv);
        assert!((prod[[0, 0]] - 1.0).abs() < 1e-9);
        assert!((prod[[1, 1]] - 1.0).abs() < 1e-9);
        assert!(prod[[0, 1]].abs() < 1e-9);
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }
}
