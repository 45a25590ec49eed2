//! Bar charts, histograms and pairwise scatter grids

use colored::Colorize;
use ndarray::Array2;

use crate::viz::CLASS_COLORS;

/// Scatter marks per class, cycled past three classes
pub const CLASS_GLYPHS: [char; 3] = ['●', '▲', '■'];

const BAR_WIDTH: usize = 40;
const SCATTER_COLS: usize = 44;
const SCATTER_ROWS: usize = 14;

/// Horizontal bar chart of labeled fractions. Bars scale to the largest
/// fraction; annotations show the fraction itself.
pub fn render_bar_chart(labels: &[String], fractions: &[f64]) -> String {
    let max = fractions
        .iter()
        .copied()
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);
    let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (i, (label, &fraction)) in labels.iter().zip(fractions).enumerate() {
        let filled = ((fraction / max) * BAR_WIDTH as f64).round() as usize;
        let (r, g, b) = CLASS_COLORS[i % CLASS_COLORS.len()];
        let bar: String = "█".repeat(filled);
        out.push_str(&format!(
            "{:>width$}  {} {:.3}\n",
            label,
            bar.truecolor(r, g, b),
            fraction,
            width = label_width
        ));
    }
    out
}

/// Horizontal histogram: fixed bin count, shaded bars
pub fn render_histogram(values: &[f64], bins: usize, title: &str) -> String {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let mut out = format!("{}\n", title.white().bold());
    if finite.is_empty() || bins == 0 {
        return out;
    }

    let min = finite.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = finite.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let span = (max - min).max(f64::MIN_POSITIVE);

    let mut counts = vec![0usize; bins];
    for &v in &finite {
        let idx = (((v - min) / span) * bins as f64) as usize;
        counts[idx.min(bins - 1)] += 1;
    }

    let peak = counts.iter().copied().max().unwrap_or(1).max(1);
    for (i, &count) in counts.iter().enumerate() {
        let lo = min + span * i as f64 / bins as f64;
        let hi = min + span * (i + 1) as f64 / bins as f64;
        let filled = (count * BAR_WIDTH + peak / 2) / peak;
        let bar: String = "▓".repeat(filled);
        out.push_str(&format!(
            "{:>6.2} – {:<6.2} {} {}\n",
            lo,
            hi,
            bar.truecolor(140, 140, 140),
            count
        ));
    }
    out
}

/// Ungrouped density panel: cell occupancy shaded from light to heavy
pub fn render_density(
    features: &Array2<f64>,
    fx: usize,
    fy: usize,
    x_name: &str,
    y_name: &str,
) -> String {
    const SHADES: [char; 4] = ['░', '▒', '▓', '█'];

    let xs: Vec<f64> = features.column(fx).to_vec();
    let ys: Vec<f64> = features.column(fy).to_vec();
    let (x_min, x_max) = bounds(&xs);
    let (y_min, y_max) = bounds(&ys);
    let x_span = (x_max - x_min).max(f64::MIN_POSITIVE);
    let y_span = (y_max - y_min).max(f64::MIN_POSITIVE);

    let mut counts = vec![0usize; SCATTER_COLS * SCATTER_ROWS];
    for (&x, &y) in xs.iter().zip(&ys) {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let col = (((x - x_min) / x_span) * (SCATTER_COLS - 1) as f64).round() as usize;
        let row = (((y_max - y) / y_span) * (SCATTER_ROWS - 1) as f64).round() as usize;
        counts[row * SCATTER_COLS + col] += 1;
    }

    let peak = counts.iter().copied().max().unwrap_or(1).max(1);
    let mut out = format!(
        "{}\n",
        format!("{} vs {} (density)", y_name, x_name).white().bold()
    );
    for row in 0..SCATTER_ROWS {
        out.push_str(&"│".truecolor(100, 100, 100).to_string());
        for col in 0..SCATTER_COLS {
            let count = counts[row * SCATTER_COLS + col];
            if count == 0 {
                out.push(' ');
            } else {
                let level = count * (SHADES.len() - 1) / peak;
                let shade = SHADES[level.min(SHADES.len() - 1)];
                out.push_str(&shade.to_string().truecolor(140, 140, 140).to_string());
            }
        }
        out.push('\n');
    }
    out.push_str(
        &format!("└{}", "─".repeat(SCATTER_COLS))
            .truecolor(100, 100, 100)
            .to_string(),
    );
    out.push('\n');
    out
}

/// One scatter panel: feature `fx` against feature `fy`, marks per class
fn render_scatter(
    features: &Array2<f64>,
    targets: &[usize],
    fx: usize,
    fy: usize,
    x_name: &str,
    y_name: &str,
) -> String {
    let xs: Vec<f64> = features.column(fx).to_vec();
    let ys: Vec<f64> = features.column(fy).to_vec();

    let (x_min, x_max) = bounds(&xs);
    let (y_min, y_max) = bounds(&ys);
    let x_span = (x_max - x_min).max(f64::MIN_POSITIVE);
    let y_span = (y_max - y_min).max(f64::MIN_POSITIVE);

    // class index per cell, empty cells stay None
    let mut grid: Vec<Option<usize>> = vec![None; SCATTER_COLS * SCATTER_ROWS];
    for ((&x, &y), &class) in xs.iter().zip(&ys).zip(targets) {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        let col = (((x - x_min) / x_span) * (SCATTER_COLS - 1) as f64).round() as usize;
        let row = (((y_max - y) / y_span) * (SCATTER_ROWS - 1) as f64).round() as usize;
        grid[row * SCATTER_COLS + col] = Some(class);
    }

    let mut out = format!(
        "{} {}\n",
        format!("{} vs {}", y_name, x_name).white().bold(),
        format!("[{:.1}-{:.1}] x [{:.1}-{:.1}]", x_min, x_max, y_min, y_max).truecolor(100, 100, 100)
    );
    for row in 0..SCATTER_ROWS {
        out.push_str(&"│".truecolor(100, 100, 100).to_string());
        for col in 0..SCATTER_COLS {
            match grid[row * SCATTER_COLS + col] {
                Some(class) => {
                    let glyph = CLASS_GLYPHS[class % CLASS_GLYPHS.len()];
                    let (r, g, b) = CLASS_COLORS[class % CLASS_COLORS.len()];
                    out.push_str(&glyph.to_string().truecolor(r, g, b).to_string());
                }
                None => out.push(' '),
            }
        }
        out.push('\n');
    }
    out.push_str(
        &format!("└{}", "─".repeat(SCATTER_COLS))
            .truecolor(100, 100, 100)
            .to_string(),
    );
    out.push('\n');
    out
}

fn bounds(values: &[f64]) -> (f64, f64) {
    let finite = values.iter().copied().filter(|v| v.is_finite());
    let min = finite.clone().fold(f64::INFINITY, f64::min);
    let max = finite.fold(f64::NEG_INFINITY, f64::max);
    if min.is_finite() && max.is_finite() {
        (min, max)
    } else {
        (0.0, 1.0)
    }
}

/// Pairwise view of the feature table: a scatter panel for each feature
/// pair, preceded by a glyph legend.
pub fn render_pairwise(
    features: &Array2<f64>,
    targets: &[usize],
    feature_names: &[String],
    class_names: &[String],
) -> String {
    let mut out = String::new();

    for (i, name) in class_names.iter().enumerate() {
        let glyph = CLASS_GLYPHS[i % CLASS_GLYPHS.len()];
        let (r, g, b) = CLASS_COLORS[i % CLASS_COLORS.len()];
        out.push_str(&format!(
            "  {} {}",
            glyph.to_string().truecolor(r, g, b),
            name
        ));
    }
    out.push_str("\n\n");

    let p = features.ncols();
    for fy in 0..p {
        for fx in 0..p {
            if fx == fy {
                continue;
            }
            if fx < fy {
                out.push_str(&render_scatter(
                    features,
                    targets,
                    fx,
                    fy,
                    &feature_names[fx],
                    &feature_names[fy],
                ));
                out.push('\n');
            }
        }
    }
    out
}
