//! Missing-value accounting and summary statistics

use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::{FEATURE_NAMES, TARGET_COLUMN};
use crate::error::{IrisError, Result};

/// Count missing cells across the whole table.
///
/// Fails closed: a measurement cell that is blank or does not parse as a
/// number is counted as missing, as is a null label.
pub fn missing_cell_count(df: &DataFrame) -> Result<usize> {
    let mut missing = 0usize;

    for col_name in FEATURE_NAMES {
        let series = df
            .column(col_name)
            .map_err(|_| IrisError::FeatureNotFound(col_name.to_string()))?;
        let as_f64 = series
            .cast(&DataType::Float64)
            .map_err(|e| IrisError::DataError(e.to_string()))?;
        missing += as_f64.null_count();
    }

    let labels = df
        .column(TARGET_COLUMN)
        .map_err(|_| IrisError::FeatureNotFound(TARGET_COLUMN.to_string()))?;
    missing += labels.null_count();

    Ok(missing)
}

/// Summary statistics for one numeric column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Per-column count/mean/std/min/quartiles/max over a feature matrix.
/// Std uses the sample estimator (ddof = 1); NaN cells are skipped.
pub fn describe(x: &Array2<f64>, names: &[&str]) -> Vec<ColumnSummary> {
    (0..x.ncols())
        .map(|j| {
            let mut values: Vec<f64> = x.column(j).iter().copied().filter(|v| v.is_finite()).collect();
            values.sort_by(|a, b| a.partial_cmp(b).unwrap());

            let count = values.len();
            if count == 0 {
                return ColumnSummary {
                    column: names.get(j).copied().unwrap_or("").to_string(),
                    count: 0,
                    mean: f64::NAN,
                    std: f64::NAN,
                    min: f64::NAN,
                    q25: f64::NAN,
                    median: f64::NAN,
                    q75: f64::NAN,
                    max: f64::NAN,
                };
            }
            let mean = values.iter().sum::<f64>() / count as f64;
            let std = if count > 1 {
                let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
                (ss / (count - 1) as f64).sqrt()
            } else {
                0.0
            };

            ColumnSummary {
                column: names.get(j).copied().unwrap_or("").to_string(),
                count,
                mean,
                std,
                min: values[0],
                q25: quantile(&values, 0.25),
                median: quantile(&values, 0.5),
                q75: quantile(&values, 0.75),
                max: values[count - 1],
            }
        })
        .collect()
}

/// Linear-interpolation quantile over a sorted slice
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let pos = q * (n - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + (sorted[hi] - sorted[lo]) * frac
}

/// Normalized class frequencies, indexed like `classes`
pub fn class_distribution(targets: &[usize], classes: &[String]) -> Vec<(String, f64)> {
    let mut counts = vec![0usize; classes.len()];
    for &t in targets {
        counts[t] += 1;
    }
    let total = targets.len().max(1) as f64;
    classes
        .iter()
        .zip(counts)
        .map(|(name, c)| (name.clone(), c as f64 / total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_missing_count_clean_table() {
        let df = df!(
            "sepal_length" => &[5.1, 4.9],
            "sepal_width" => &[3.5, 3.0],
            "petal_length" => &[1.4, 1.4],
            "petal_width" => &[0.2, 0.2],
            "species" => &["Iris-setosa", "Iris-setosa"]
        )
        .unwrap();
        assert_eq!(missing_cell_count(&df).unwrap(), 0);
    }

    #[test]
    fn test_missing_count_non_numeric_cell() {
        // A stringly-typed measurement column: the unparseable cell counts as missing
        let df = df!(
            "sepal_length" => &["5.1", "oops"],
            "sepal_width" => &["3.5", "3.0"],
            "petal_length" => &["1.4", "1.4"],
            "petal_width" => &["0.2", "0.2"],
            "species" => &["Iris-setosa", "Iris-setosa"]
        )
        .unwrap();
        assert_eq!(missing_cell_count(&df).unwrap(), 1);
    }

    #[test]
    fn test_describe_quartiles() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [5.0]];
        let summary = &describe(&x, &["v"])[0];
        assert_eq!(summary.count, 5);
        assert!((summary.mean - 3.0).abs() < 1e-12);
        assert!((summary.q25 - 2.0).abs() < 1e-12);
        assert!((summary.median - 3.0).abs() < 1e-12);
        assert!((summary.q75 - 4.0).abs() < 1e-12);
        assert_eq!(summary.min, 1.0);
        assert_eq!(summary.max, 5.0);
        // sample std of 1..5 is sqrt(2.5)
        assert!((summary.std - 2.5f64.sqrt()).abs() < 1e-12);
    }

    #[test]
    fn test_describe_all_nan_column() {
        let x = array![[f64::NAN], [f64::NAN]];
        let summary = &describe(&x, &["v"])[0];
        assert_eq!(summary.count, 0);
        assert!(summary.mean.is_nan());
        assert!(summary.max.is_nan());
    }

    #[test]
    fn test_quantile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert!((quantile(&sorted, 0.5) - 2.5).abs() < 1e-12);
        assert!((quantile(&sorted, 0.25) - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_class_distribution_sums_to_one() {
        let classes = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let dist = class_distribution(&[0, 0, 1, 1, 2, 2], &classes);
        let total: f64 = dist.iter().map(|(_, f)| f).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!((dist[0].1 - 1.0 / 3.0).abs() < 1e-12);
    }
}
