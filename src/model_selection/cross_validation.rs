//! K-fold cross-validation splitters

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use crate::error::{IrisError, Result};

/// Cross-validation strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CvStrategy {
    /// Plain k-fold over row order
    KFold { n_splits: usize, shuffle: bool },
    /// K-fold preserving per-class proportions in every fold.
    /// Deterministic: folds are filled round-robin per class in row order.
    StratifiedKFold { n_splits: usize },
}

/// A single train/validation fold
#[derive(Debug, Clone)]
pub struct CvSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Cross-validation splitter
pub struct CrossValidator {
    strategy: CvStrategy,
    random_state: Option<u64>,
}

impl CrossValidator {
    pub fn new(strategy: CvStrategy) -> Self {
        Self {
            strategy,
            random_state: None,
        }
    }

    /// Seed the shuffling KFold variant for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Generate folds. `targets` is required for the stratified strategy.
    pub fn split(&self, n_samples: usize, targets: Option<&[usize]>) -> Result<Vec<CvSplit>> {
        match self.strategy {
            CvStrategy::KFold { n_splits, shuffle } => {
                self.k_fold(n_samples, n_splits, shuffle)
            }
            CvStrategy::StratifiedKFold { n_splits } => {
                let targets = targets.ok_or_else(|| {
                    IrisError::ValidationError(
                        "StratifiedKFold requires a target array".to_string(),
                    )
                })?;
                if targets.len() != n_samples {
                    return Err(IrisError::ShapeError {
                        expected: format!("{} targets", n_samples),
                        actual: format!("{} targets", targets.len()),
                    });
                }
                self.stratified_k_fold(targets, n_splits)
            }
        }
    }

    fn check_n_splits(n_samples: usize, n_splits: usize) -> Result<()> {
        if n_splits < 2 {
            return Err(IrisError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(IrisError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }
        Ok(())
    }

    fn k_fold(&self, n_samples: usize, n_splits: usize, shuffle: bool) -> Result<Vec<CvSplit>> {
        Self::check_n_splits(n_samples, n_splits)?;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        if shuffle {
            let mut rng = match self.random_state {
                Some(seed) => ChaCha8Rng::seed_from_u64(seed),
                None => ChaCha8Rng::from_entropy(),
            };
            indices.shuffle(&mut rng);
        }

        // Earlier folds absorb the remainder
        let fold_sizes: Vec<usize> = (0..n_splits)
            .map(|i| {
                let base = n_samples / n_splits;
                if i < n_samples % n_splits {
                    base + 1
                } else {
                    base
                }
            })
            .collect();

        let mut splits = Vec::with_capacity(n_splits);
        let mut current = 0;
        for (fold_idx, &fold_size) in fold_sizes.iter().enumerate() {
            let test_indices: Vec<usize> = indices[current..current + fold_size].to_vec();
            let train_indices: Vec<usize> = indices[..current]
                .iter()
                .chain(indices[current + fold_size..].iter())
                .copied()
                .collect();
            splits.push(CvSplit {
                train_indices,
                test_indices,
                fold_idx,
            });
            current += fold_size;
        }

        Ok(splits)
    }

    fn stratified_k_fold(&self, targets: &[usize], n_splits: usize) -> Result<Vec<CvSplit>> {
        Self::check_n_splits(targets.len(), n_splits)?;

        let n_classes = targets.iter().copied().max().map_or(0, |m| m + 1);
        let mut class_indices: Vec<Vec<usize>> = vec![Vec::new(); n_classes];
        for (idx, &t) in targets.iter().enumerate() {
            class_indices[t].push(idx);
        }

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        for indices in &class_indices {
            for (i, &idx) in indices.iter().enumerate() {
                folds[i % n_splits].push(idx);
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let test_indices = folds[fold_idx].clone();
                let train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                CvSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_k_fold_partitions() {
        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 5,
            shuffle: false,
        });
        let splits = cv.split(100, None).unwrap();
        assert_eq!(splits.len(), 5);

        for split in &splits {
            assert_eq!(split.test_indices.len(), 20);
            assert_eq!(split.train_indices.len(), 80);
        }

        let mut all_test: Vec<usize> = splits
            .iter()
            .flat_map(|s| s.test_indices.clone())
            .collect();
        all_test.sort_unstable();
        assert_eq!(all_test, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_stratified_k_fold_class_balance() {
        // 10 of class 0, 10 of class 1
        let targets: Vec<usize> = std::iter::repeat(0)
            .take(10)
            .chain(std::iter::repeat(1).take(10))
            .collect();

        let cv = CrossValidator::new(CvStrategy::StratifiedKFold { n_splits: 5 });
        let splits = cv.split(20, Some(&targets)).unwrap();
        assert_eq!(splits.len(), 5);

        for split in &splits {
            assert_eq!(split.test_indices.len(), 4);
            let class0 = split
                .test_indices
                .iter()
                .filter(|&&i| targets[i] == 0)
                .count();
            assert_eq!(class0, 2, "each fold holds 2 rows of each class");
        }
    }

    #[test]
    fn test_stratified_k_fold_deterministic() {
        let targets: Vec<usize> = (0..30).map(|i| i % 3).collect();
        let cv = CrossValidator::new(CvStrategy::StratifiedKFold { n_splits: 5 });
        let a = cv.split(30, Some(&targets)).unwrap();
        let b = cv.split(30, Some(&targets)).unwrap();
        for (sa, sb) in a.iter().zip(&b) {
            assert_eq!(sa.test_indices, sb.test_indices);
        }
    }

    #[test]
    fn test_stratified_requires_targets() {
        let cv = CrossValidator::new(CvStrategy::StratifiedKFold { n_splits: 5 });
        assert!(cv.split(20, None).is_err());
    }

    #[test]
    fn test_too_few_samples() {
        let cv = CrossValidator::new(CvStrategy::KFold {
            n_splits: 5,
            shuffle: false,
        });
        assert!(cv.split(3, None).is_err());
    }
}
