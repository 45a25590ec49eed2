//! Command-line interface
//!
//! One binary, four subcommands. Running with no subcommand performs the
//! full pipeline: exploratory analysis, grid search, refit, holdout
//! evaluation.

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::time::Instant;

use crate::data::{fetch_remote, load_file, parse_csv, Dataset, FEATURE_NAMES, IRIS_URL};
use crate::pipeline::{self, EdaReport, Evaluation, ModelingSplit, CV_FOLDS, RANDOM_STATE, TEST_FRACTION};
use crate::model_selection::SearchOutcome;
use crate::viz::{
    render_bar_chart, render_confusion, render_density, render_heatmap, render_histogram,
    render_pairwise,
};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString {
    s.truecolor(100, 100, 100)
}
fn accent(s: &str) -> ColoredString {
    s.truecolor(120, 170, 255)
}
fn muted(s: &str) -> ColoredString {
    s.truecolor(140, 140, 140)
}
fn ok(s: &str) -> ColoredString {
    s.truecolor(100, 210, 120)
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

/// Indent a multi-line render by two spaces
fn print_block(block: &str) {
    for line in block.lines() {
        println!("  {}", line);
    }
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "iris-lab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Exploratory analysis and classification of the Iris dataset")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Full pipeline: explore, grid search, refit, evaluate
    Run {
        /// Local CSV file (fetched remotely when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Emit the full report as JSON instead of rendering it
        #[arg(long)]
        json: bool,
    },

    /// Exploratory analysis only
    Eda {
        /// Local CSV file (fetched remotely when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },

    /// Hyperparameter grid search only
    Search {
        /// Local CSV file (fetched remotely when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// Emit the search outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show table shape, dtypes and null counts
    Info {
        /// Local CSV file (fetched remotely when omitted)
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

// ─── Data loading ──────────────────────────────────────────────────────────────

pub fn load_dataset(data: Option<&PathBuf>) -> anyhow::Result<Dataset> {
    let body = match data {
        Some(path) => load_file(path)?,
        None => fetch_remote(IRIS_URL)?,
    };
    let frame = parse_csv(&body)?;
    Ok(Dataset::from_frame(frame)?)
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_run(data: Option<&PathBuf>, json: bool) -> anyhow::Result<()> {
    if json {
        let dataset = load_dataset(data)?;
        let report = pipeline::run(&dataset)?;
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    section("Iris Pipeline");
    let dataset = load_and_announce(data)?;

    let eda = pipeline::explore(&dataset)?;
    print_eda(&dataset, &eda);

    let modeling = pipeline::split_features(&dataset)?;
    let outcome = run_search(&modeling)?;
    print_search(&outcome);

    step_run("Refitting best candidate on the training partition");
    let start = Instant::now();
    let model = pipeline::refit_best(&outcome, &modeling)?;
    step_done(&format!("{:?}", start.elapsed()));

    let evaluation = pipeline::evaluate(&model, &modeling)?;
    print_evaluation(&evaluation, &modeling);

    Ok(())
}

pub fn cmd_eda(data: Option<&PathBuf>) -> anyhow::Result<()> {
    section("Exploratory Analysis");
    let dataset = load_and_announce(data)?;
    let eda = pipeline::explore(&dataset)?;
    print_eda(&dataset, &eda);
    Ok(())
}

pub fn cmd_search(data: Option<&PathBuf>, json: bool) -> anyhow::Result<()> {
    if json {
        let dataset = load_dataset(data)?;
        let modeling = pipeline::split_features(&dataset)?;
        let outcome = pipeline::search(&modeling)?;
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    section("Grid Search");
    let dataset = load_and_announce(data)?;
    let modeling = pipeline::split_features(&dataset)?;
    let outcome = run_search(&modeling)?;
    print_search(&outcome);
    Ok(())
}

pub fn cmd_info(data: Option<&PathBuf>) -> anyhow::Result<()> {
    section("Data Info");
    let dataset = load_and_announce(data)?;
    let df = dataset.frame();

    println!("  {:<12} {}", muted("Rows"), df.height());
    println!("  {:<12} {}", muted("Columns"), df.width());
    println!("  {:<12} {}", muted("Classes"), dataset.n_classes());
    println!();

    println!(
        "  {:<16} {:<12} {:>6}",
        muted("Column"),
        muted("Type"),
        muted("Nulls")
    );
    println!("  {}", dim(&"─".repeat(40)));
    for col in df.get_columns() {
        println!(
            "  {:<16} {:<12} {:>6}",
            col.name(),
            format!("{:?}", col.dtype()).truecolor(140, 140, 140),
            col.null_count()
        );
    }
    println!();
    Ok(())
}

// ─── Shared rendering ──────────────────────────────────────────────────────────

fn load_and_announce(data: Option<&PathBuf>) -> anyhow::Result<Dataset> {
    let label = match data {
        Some(path) => format!("Loading {}", path.display()),
        None => "Fetching dataset".to_string(),
    };
    step_run(&label);
    let start = Instant::now();
    let dataset = load_dataset(data)?;
    step_done(&format!(
        "{} rows × {} cols in {:?}",
        dataset.n_samples(),
        dataset.frame().width(),
        start.elapsed()
    ));
    Ok(dataset)
}

fn run_search(modeling: &ModelingSplit) -> anyhow::Result<SearchOutcome> {
    step_run(&format!(
        "Sweeping grid ({}-fold CV, seed {}, test fraction {})",
        CV_FOLDS, RANDOM_STATE, TEST_FRACTION
    ));
    let start = Instant::now();
    let outcome = pipeline::search(modeling)?;
    step_done(&format!(
        "{} scored, {} failed in {:?}",
        outcome.results.len(),
        outcome.failures.len(),
        start.elapsed()
    ));
    Ok(outcome)
}

fn print_eda(dataset: &Dataset, eda: &EdaReport) {
    println!();
    println!("  {:<16} {}", muted("Missing cells"), eda.missing_cells);
    println!(
        "  {:<16} {} train / {} test",
        muted("Partition"),
        eda.split.n_train(),
        eda.split.n_test()
    );

    let distributions = [
        ("Class Distribution (full)", &eda.distribution_full),
        ("Class Distribution (train)", &eda.distribution_train),
        ("Class Distribution (test)", &eda.distribution_test),
    ];
    for (title, dist) in distributions {
        section(title);
        let labels: Vec<String> = dist.iter().map(|(l, _)| l.clone()).collect();
        let fractions: Vec<f64> = dist.iter().map(|(_, f)| *f).collect();
        print_block(&render_bar_chart(&labels, &fractions));
    }

    section("Summary Statistics (train)");
    println!(
        "  {:<14} {:>6} {:>8} {:>8} {:>7} {:>7} {:>7} {:>7} {:>7}",
        muted("column"),
        muted("count"),
        muted("mean"),
        muted("std"),
        muted("min"),
        muted("25%"),
        muted("50%"),
        muted("75%"),
        muted("max")
    );
    println!("  {}", dim(&"─".repeat(76)));
    for s in &eda.summaries {
        println!(
            "  {:<14} {:>6} {:>8.3} {:>8.3} {:>7.2} {:>7.2} {:>7.2} {:>7.2} {:>7.2}",
            s.column, s.count, s.mean, s.std, s.min, s.q25, s.median, s.q75, s.max
        );
    }

    let names: Vec<String> = FEATURE_NAMES.iter().map(|s| s.to_string()).collect();

    section("Correlation (train)");
    print_block(&render_heatmap(&eda.correlation, &names));

    section("Covariance (train)");
    print_block(&render_heatmap(&eda.covariance, &names));

    let x_train = dataset.feature_rows(&eda.split.train_indices);
    let y_train = dataset.target_rows(&eda.split.train_indices);

    section("Feature Histograms (train)");
    for (j, name) in names.iter().enumerate() {
        let values: Vec<f64> = x_train.column(j).to_vec();
        print_block(&render_histogram(&values, 10, name));
        println!();
    }

    section("Pairwise Density (train)");
    for fy in 0..names.len() {
        for fx in 0..fy {
            print_block(&render_density(&x_train, fx, fy, &names[fx], &names[fy]));
            println!();
        }
    }

    section("Pairwise Features by Species (train)");
    print_block(&render_pairwise(
        &x_train,
        &y_train,
        &names,
        dataset.classes(),
    ));
}

fn print_search(outcome: &SearchOutcome) {
    section("Candidates");
    println!(
        "  {:>8} {:<12} {:<10} {:>10} {:>8}",
        muted("C"),
        muted("penalty"),
        muted("solver"),
        muted("mean acc"),
        muted("std")
    );
    println!("  {}", dim(&"─".repeat(54)));
    for r in &outcome.results {
        println!(
            "  {:>8} {:<12} {:<10} {:>10.4} {:>8.4}",
            r.config.c,
            r.config.penalty.to_string(),
            r.config.solver.to_string(),
            r.mean_score,
            r.std_score
        );
    }
    if !outcome.failures.is_empty() {
        println!("  {}", dim(&"─".repeat(54)));
        println!(
            "  {} {}",
            muted("rejected"),
            format!("{} combinations", outcome.failures.len()).truecolor(140, 140, 140)
        );
    }

    println!();
    println!(
        "  {} C={} penalty={} solver={} {} {:.4}",
        ok("best"),
        outcome.best.config.c,
        outcome.best.config.penalty,
        outcome.best.config.solver,
        muted("cv accuracy:"),
        outcome.best.mean_score
    );
}

fn print_evaluation(evaluation: &Evaluation, modeling: &ModelingSplit) {
    section("Holdout Evaluation");
    println!(
        "  {:<16} {}",
        muted("Accuracy"),
        format!("{:.4}", evaluation.accuracy).white().bold()
    );

    section("Confusion Matrix (row-normalized)");
    print_block(&render_confusion(
        &evaluation.confusion_normalized,
        &modeling.class_names,
    ));

    section("Classification Report");
    print_block(&evaluation.report.to_string());
    println!();
}

/// Dispatch a parsed command line
pub fn dispatch(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Run { data, json }) => cmd_run(data.as_ref(), json),
        Some(Commands::Eda { data }) => cmd_eda(data.as_ref()),
        Some(Commands::Search { data, json }) => cmd_search(data.as_ref(), json),
        Some(Commands::Info { data }) => cmd_info(data.as_ref()),
        None => cmd_run(None, false),
    }
}
