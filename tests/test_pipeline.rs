//! End-to-end run over the bundled table

use std::path::PathBuf;

use ndarray::Axis;

use iris_lab::data::{load_file, parse_csv, Dataset};
use iris_lab::pipeline;

fn fixture() -> Dataset {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data/iris.csv");
    let body = load_file(&path).unwrap();
    let frame = parse_csv(&body).unwrap();
    Dataset::from_frame(frame).unwrap()
}

#[test]
fn test_full_run_reaches_high_holdout_accuracy() {
    let ds = fixture();
    let report = pipeline::run(&ds).unwrap();

    assert!(
        report.evaluation.accuracy >= 0.9,
        "holdout accuracy {} below expectation",
        report.evaluation.accuracy
    );
    assert!(report.search.best.mean_score >= 0.9);
    assert_eq!(report.evaluation.predictions.len(), 30);
}

#[test]
fn test_eda_statistics_cover_training_rows_only() {
    let ds = fixture();
    let report = pipeline::run(&ds).unwrap();

    assert_eq!(report.eda.missing_cells, 0);
    assert_eq!(report.eda.n_rows, 150);
    for s in &report.eda.summaries {
        assert_eq!(s.count, 120);
    }

    for dist in [
        &report.eda.distribution_full,
        &report.eda.distribution_train,
        &report.eda.distribution_test,
    ] {
        let total: f64 = dist.iter().map(|(_, f)| f).sum();
        assert!((total - 1.0).abs() < 1e-12);
        // Balanced table: each class holds a third in every partition
        for (_, f) in dist.iter() {
            assert!((f - 1.0 / 3.0).abs() < 1e-12);
        }
    }
}

#[test]
fn test_confusion_matrix_consistency() {
    let ds = fixture();
    let report = pipeline::run(&ds).unwrap();

    let confusion = &report.evaluation.confusion;
    assert_eq!(confusion.shape(), &[3, 3]);
    assert_eq!(confusion.sum(), 30.0);
    // 10 true rows per class
    for row in confusion.axis_iter(Axis(0)) {
        assert_eq!(row.sum(), 10.0);
    }

    for row in report.evaluation.confusion_normalized.axis_iter(Axis(0)) {
        let sum: f64 = row.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_report_aggregates_match_accuracy() {
    let ds = fixture();
    let report = pipeline::run(&ds).unwrap();
    let cls = &report.evaluation.report;

    assert_eq!(cls.classes.len(), 3);
    assert_eq!(cls.total_support, 30);
    assert!((cls.accuracy - report.evaluation.accuracy).abs() < 1e-12);
    for m in &cls.classes {
        assert_eq!(m.support, 10);
        assert!(m.f1 >= 0.0 && m.f1 <= 1.0);
    }
}

#[test]
fn test_run_report_serializes() {
    let ds = fixture();
    let report = pipeline::run(&ds).unwrap();
    let json = serde_json::to_string(&report).unwrap();
    assert!(json.contains("\"accuracy\""));
    assert!(json.contains("\"best\""));
    assert!(json.contains("\"failures\""));
}
