//! Dataset acquisition and typed access
//!
//! The Iris table is loaded once (remote fetch or local file), given its five
//! semantic column names, and never mutated afterwards. Downstream stages work
//! on derived views: an `ndarray` feature matrix, string labels, and integer
//! class indices in first-seen label order.

mod loader;

pub use loader::{fetch_remote, load_file, parse_csv};

use crate::error::{IrisError, Result};
use ndarray::Array2;
use polars::prelude::*;

/// Fixed remote location of the dataset
pub const IRIS_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/iris/iris.data";

/// The four continuous measurement columns, in table order
pub const FEATURE_NAMES: [&str; 4] = [
    "sepal_length",
    "sepal_width",
    "petal_length",
    "petal_width",
];

/// The categorical label column
pub const TARGET_COLUMN: &str = "species";

/// An immutable labeled table plus numeric views derived from it.
///
/// `features` is row-major `n x 4`; non-numeric or blank measurement cells
/// become NaN so they surface in the missing-value count rather than silently
/// reading as zero. `classes` holds the distinct labels in first-seen order
/// and `targets[i]` indexes into it.
#[derive(Debug, Clone)]
pub struct Dataset {
    frame: DataFrame,
    features: Array2<f64>,
    labels: Vec<String>,
    classes: Vec<String>,
    targets: Vec<usize>,
}

impl Dataset {
    /// Build the dataset views from a parsed frame.
    pub fn from_frame(frame: DataFrame) -> Result<Self> {
        let n_rows = frame.height();
        if n_rows == 0 {
            return Err(IrisError::DataError("empty table".to_string()));
        }

        let features = feature_matrix(&frame)?;
        let labels = label_column(&frame)?;

        let mut classes: Vec<String> = Vec::new();
        let mut targets = Vec::with_capacity(n_rows);
        for label in &labels {
            let idx = match classes.iter().position(|c| c == label) {
                Some(idx) => idx,
                None => {
                    classes.push(label.clone());
                    classes.len() - 1
                }
            };
            targets.push(idx);
        }

        Ok(Self {
            frame,
            features,
            labels,
            classes,
            targets,
        })
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// Row-major `n x 4` measurement matrix
    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Distinct class labels in first-seen order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    /// Per-row class index into [`Self::classes`]
    pub fn targets(&self) -> &[usize] {
        &self.targets
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }

    /// Per-class row counts, indexed like [`Self::classes`]
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0usize; self.classes.len()];
        for &t in &self.targets {
            counts[t] += 1;
        }
        counts
    }

    /// Copy of the feature rows selected by `indices`
    pub fn feature_rows(&self, indices: &[usize]) -> Array2<f64> {
        let n_cols = self.features.ncols();
        Array2::from_shape_fn((indices.len(), n_cols), |(r, c)| {
            self.features[[indices[r], c]]
        })
    }

    /// Class indices for the rows selected by `indices`
    pub fn target_rows(&self, indices: &[usize]) -> Vec<usize> {
        indices.iter().map(|&i| self.targets[i]).collect()
    }
}

/// Extract the four measurement columns into a row-major Array2<f64>.
/// Casts are permissive: unparseable cells become null and map to NaN.
fn feature_matrix(df: &DataFrame) -> Result<Array2<f64>> {
    let n_rows = df.height();
    let n_cols = FEATURE_NAMES.len();

    let col_data: Vec<Vec<f64>> = FEATURE_NAMES
        .iter()
        .map(|col_name| {
            let series = df
                .column(col_name)
                .map_err(|_| IrisError::FeatureNotFound(col_name.to_string()))?;
            let series_f64 = series
                .cast(&DataType::Float64)
                .map_err(|e| IrisError::DataError(e.to_string()))?;
            let values: Vec<f64> = series_f64
                .f64()
                .map_err(|e| IrisError::DataError(e.to_string()))?
                .into_iter()
                .map(|v| v.unwrap_or(f64::NAN))
                .collect();
            Ok(values)
        })
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((n_rows, n_cols), |(r, c)| {
        col_data[c][r]
    }))
}

fn label_column(df: &DataFrame) -> Result<Vec<String>> {
    let series = df
        .column(TARGET_COLUMN)
        .map_err(|_| IrisError::FeatureNotFound(TARGET_COLUMN.to_string()))?;
    let chunked = series
        .str()
        .map_err(|e| IrisError::DataError(e.to_string()))?;

    chunked
        .into_iter()
        .enumerate()
        .map(|(row, v)| {
            v.map(|s| s.to_string()).ok_or_else(|| {
                IrisError::DataError(format!("missing species label at row {}", row))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny_frame() -> DataFrame {
        df!(
            "sepal_length" => &[5.1, 4.9, 6.3, 5.8],
            "sepal_width" => &[3.5, 3.0, 3.3, 2.7],
            "petal_length" => &[1.4, 1.4, 6.0, 5.1],
            "petal_width" => &[0.2, 0.2, 2.5, 1.9],
            "species" => &["Iris-setosa", "Iris-setosa", "Iris-virginica", "Iris-virginica"]
        )
        .unwrap()
    }

    #[test]
    fn test_from_frame_classes_first_seen_order() {
        let ds = Dataset::from_frame(tiny_frame()).unwrap();
        assert_eq!(ds.classes(), &["Iris-setosa", "Iris-virginica"]);
        assert_eq!(ds.targets(), &[0, 0, 1, 1]);
        assert_eq!(ds.class_counts(), vec![2, 2]);
    }

    #[test]
    fn test_feature_matrix_shape() {
        let ds = Dataset::from_frame(tiny_frame()).unwrap();
        assert_eq!(ds.features().shape(), &[4, 4]);
        assert_eq!(ds.features()[[2, 2]], 6.0);
    }

    #[test]
    fn test_feature_rows_selection() {
        let ds = Dataset::from_frame(tiny_frame()).unwrap();
        let rows = ds.feature_rows(&[3, 0]);
        assert_eq!(rows.shape(), &[2, 4]);
        assert_eq!(rows[[0, 0]], 5.8);
        assert_eq!(rows[[1, 0]], 5.1);
        assert_eq!(ds.target_rows(&[3, 0]), vec![1, 0]);
    }

    #[test]
    fn test_empty_frame_rejected() {
        let df = df!(
            "sepal_length" => &[] as &[f64],
            "sepal_width" => &[] as &[f64],
            "petal_length" => &[] as &[f64],
            "petal_width" => &[] as &[f64],
            "species" => &[] as &[&str]
        )
        .unwrap();
        assert!(Dataset::from_frame(df).is_err());
    }
}
