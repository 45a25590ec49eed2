//! Classification metrics: confusion matrix, accuracy, per-class report

use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{IrisError, Result};

/// Fraction of predictions matching the true labels
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(IrisError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(IrisError::ValidationError("empty label array".to_string()));
    }
    let correct = y_true.iter().zip(y_pred).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}

/// Confusion counts: rows are true classes, columns predicted classes
pub fn confusion_matrix(y_true: &[usize], y_pred: &[usize], n_classes: usize) -> Result<Array2<f64>> {
    if y_true.len() != y_pred.len() {
        return Err(IrisError::ShapeError {
            expected: format!("{} predictions", y_true.len()),
            actual: format!("{} predictions", y_pred.len()),
        });
    }
    let mut cm = Array2::zeros((n_classes, n_classes));
    for (&t, &p) in y_true.iter().zip(y_pred) {
        if t >= n_classes || p >= n_classes {
            return Err(IrisError::ValidationError(format!(
                "label {} out of range for {} classes",
                t.max(p),
                n_classes
            )));
        }
        cm[[t, p]] += 1.0;
    }
    Ok(cm)
}

/// Row-normalize a matrix so each row sums to 1. Zero rows stay zero.
pub fn normalize_rows(m: &Array2<f64>) -> Array2<f64> {
    let mut out = m.clone();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let sum: f64 = row.iter().sum();
        if sum > 0.0 {
            row.mapv_inplace(|v| v / sum);
        }
    }
    out
}

/// Per-class precision, recall, F1 and support
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Per-class metrics with macro and weighted averages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub weighted_precision: f64,
    pub weighted_recall: f64,
    pub weighted_f1: f64,
    pub total_support: usize,
}

impl ClassificationReport {
    /// Build the report from labels. `class_names` maps class index to name.
    pub fn compute(
        y_true: &[usize],
        y_pred: &[usize],
        class_names: &[String],
    ) -> Result<Self> {
        let n_classes = class_names.len();
        let cm = confusion_matrix(y_true, y_pred, n_classes)?;
        let acc = accuracy(y_true, y_pred)?;

        let mut classes = Vec::with_capacity(n_classes);
        for c in 0..n_classes {
            let tp = cm[[c, c]];
            let predicted: f64 = cm.column(c).sum();
            let actual: f64 = cm.row(c).sum();
            let precision = if predicted > 0.0 { tp / predicted } else { 0.0 };
            let recall = if actual > 0.0 { tp / actual } else { 0.0 };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            classes.push(ClassMetrics {
                label: class_names[c].clone(),
                precision,
                recall,
                f1,
                support: actual as usize,
            });
        }

        let total = y_true.len() as f64;
        let n = n_classes as f64;
        let macro_precision = classes.iter().map(|m| m.precision).sum::<f64>() / n;
        let macro_recall = classes.iter().map(|m| m.recall).sum::<f64>() / n;
        let macro_f1 = classes.iter().map(|m| m.f1).sum::<f64>() / n;
        let weighted_precision = classes
            .iter()
            .map(|m| m.precision * m.support as f64)
            .sum::<f64>()
            / total;
        let weighted_recall = classes
            .iter()
            .map(|m| m.recall * m.support as f64)
            .sum::<f64>()
            / total;
        let weighted_f1 = classes.iter().map(|m| m.f1 * m.support as f64).sum::<f64>() / total;

        Ok(Self {
            classes,
            accuracy: acc,
            macro_precision,
            macro_recall,
            macro_f1,
            weighted_precision,
            weighted_recall,
            weighted_f1,
            total_support: y_true.len(),
        })
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .classes
            .iter()
            .map(|m| m.label.len())
            .max()
            .unwrap_or(12)
            .max(12);

        writeln!(
            f,
            "{:>w$}  {:>9}  {:>9}  {:>9}  {:>9}",
            "", "precision", "recall", "f1-score", "support",
            w = width
        )?;
        writeln!(f)?;
        for m in &self.classes {
            writeln!(
                f,
                "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
                m.label,
                m.precision,
                m.recall,
                m.f1,
                m.support,
                w = width
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>w$}  {:>9}  {:>9}  {:>9.2}  {:>9}",
            "accuracy", "", "", self.accuracy, self.total_support,
            w = width
        )?;
        writeln!(
            f,
            "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
            "macro avg",
            self.macro_precision,
            self.macro_recall,
            self.macro_f1,
            self.total_support,
            w = width
        )?;
        writeln!(
            f,
            "{:>w$}  {:>9.2}  {:>9.2}  {:>9.2}  {:>9}",
            "weighted avg",
            self.weighted_precision,
            self.weighted_recall,
            self.weighted_f1,
            self.total_support,
            w = width
        )
    }
}
