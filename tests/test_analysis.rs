//! Exploratory-analysis checks against the bundled 150-row table

use std::path::PathBuf;

use iris_lab::analysis::{correlation_matrix, covariance_matrix, describe, missing_cell_count};
use iris_lab::data::{load_file, parse_csv, Dataset, FEATURE_NAMES};

fn fixture() -> Dataset {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/iris.csv");
    let body = load_file(&path).unwrap();
    let frame = parse_csv(&body).unwrap();
    Dataset::from_frame(frame).unwrap()
}

#[test]
fn test_fixture_shape_and_classes() {
    let ds = fixture();
    assert_eq!(ds.n_samples(), 150);
    assert_eq!(ds.n_classes(), 3);
    assert_eq!(ds.class_counts(), vec![50, 50, 50]);
    assert_eq!(
        ds.classes(),
        &["Iris-setosa", "Iris-versicolor", "Iris-virginica"]
    );
}

#[test]
fn test_fixture_has_no_missing_cells() {
    let ds = fixture();
    assert_eq!(missing_cell_count(ds.frame()).unwrap(), 0);
}

#[test]
fn test_describe_plausible_ranges() {
    let ds = fixture();
    let summaries = describe(ds.features(), &FEATURE_NAMES);
    assert_eq!(summaries.len(), 4);

    for s in &summaries {
        assert_eq!(s.count, 150);
        assert!(s.min <= s.q25 && s.q25 <= s.median);
        assert!(s.median <= s.q75 && s.q75 <= s.max);
        assert!(s.std > 0.0);
    }

    // Sepal lengths live in the 4-8 cm band
    let sl = &summaries[0];
    assert!(sl.min >= 4.0 && sl.max <= 8.0);
    assert!((sl.mean - 5.843).abs() < 0.01);
}

#[test]
fn test_correlation_structure() {
    let ds = fixture();
    let corr = correlation_matrix(ds.features());

    for i in 0..4 {
        assert_eq!(corr[[i, i]], 1.0);
        for j in 0..4 {
            assert_eq!(corr[[i, j]], corr[[j, i]]);
            assert!(corr[[i, j]].abs() <= 1.0 + 1e-12);
        }
    }

    // Petal length and petal width move together
    assert!(corr[[2, 3]] > 0.9);
    // Sepal width runs against the petal measurements
    assert!(corr[[1, 2]] < 0.0);
}

#[test]
fn test_covariance_diagonal_matches_variance() {
    let ds = fixture();
    let cov = covariance_matrix(ds.features());
    let summaries = describe(ds.features(), &FEATURE_NAMES);
    for (i, s) in summaries.iter().enumerate() {
        assert!((cov[[i, i]] - s.std * s.std).abs() < 1e-9);
    }
}
