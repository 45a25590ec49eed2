//! Seeded stratified train/test partitioning

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::error::{IrisError, Result};

/// A disjoint, exhaustive partition of row indices
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
}

impl TrainTestSplit {
    pub fn n_train(&self) -> usize {
        self.train_indices.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_indices.len()
    }
}

/// Stratified split: each class contributes `test_fraction` of its rows
/// (rounded per class) to the test set, sampled with a seeded RNG.
///
/// Same targets + same seed always produce the same partition, so two
/// independent calls over the same table yield identical membership.
pub fn stratified_split(
    targets: &[usize],
    n_classes: usize,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit> {
    if targets.is_empty() {
        return Err(IrisError::ValidationError("empty target array".to_string()));
    }
    if !(0.0..1.0).contains(&test_fraction) || test_fraction == 0.0 {
        return Err(IrisError::ValidationError(format!(
            "test_fraction must be in (0, 1), got {}",
            test_fraction
        )));
    }

    // Group row indices by class, preserving row order within each group
    let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
    for (idx, &t) in targets.iter().enumerate() {
        if t >= n_classes {
            return Err(IrisError::ValidationError(format!(
                "target {} out of range for {} classes",
                t, n_classes
            )));
        }
        class_indices[t].push(idx);
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::new();
    let mut test_indices = Vec::new();

    for indices in class_indices.iter_mut() {
        if indices.is_empty() {
            continue;
        }
        indices.shuffle(&mut rng);

        let n_test = ((indices.len() as f64) * test_fraction).round() as usize;
        let n_test = n_test.min(indices.len().saturating_sub(1)).max(1);

        test_indices.extend_from_slice(&indices[..n_test]);
        train_indices.extend_from_slice(&indices[n_test..]);
    }

    Ok(TrainTestSplit {
        train_indices,
        test_indices,
    })
}
