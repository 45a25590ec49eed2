//! Pairwise correlation and covariance matrices

use ndarray::{Array1, Array2, Axis};

/// Sample covariance matrix (ddof = 1) of the feature columns
pub fn covariance_matrix(x: &Array2<f64>) -> Array2<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let means: Array1<f64> = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(p));

    let mut cov = Array2::zeros((p, p));
    if n < 2 {
        return cov;
    }

    for i in 0..p {
        for j in i..p {
            let mut sum = 0.0;
            for r in 0..n {
                sum += (x[[r, i]] - means[i]) * (x[[r, j]] - means[j]);
            }
            let c = sum / (n - 1) as f64;
            cov[[i, j]] = c;
            cov[[j, i]] = c;
        }
    }
    cov
}

/// Pearson correlation matrix of the feature columns.
/// Symmetric with an exact 1.0 diagonal; zero-variance columns correlate as 0.
pub fn correlation_matrix(x: &Array2<f64>) -> Array2<f64> {
    let cov = covariance_matrix(x);
    let p = cov.nrows();
    let stds: Vec<f64> = (0..p).map(|i| cov[[i, i]].sqrt()).collect();

    let mut corr = Array2::zeros((p, p));
    for i in 0..p {
        for j in 0..p {
            if i == j {
                corr[[i, j]] = 1.0;
            } else if stds[i] > 0.0 && stds[j] > 0.0 {
                corr[[i, j]] = cov[[i, j]] / (stds[i] * stds[j]);
            }
        }
    }
    corr
}
