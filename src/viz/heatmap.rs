//! Annotated matrix heatmap with a diverging palette centered at zero

use colored::Colorize;
use ndarray::Array2;

const CELL_WIDTH: usize = 7;

/// Blue through white to red, position `t` in [-1, 1]
fn diverging_color(t: f64) -> (u8, u8, u8) {
    let t = t.clamp(-1.0, 1.0);
    let lerp = |a: f64, b: f64, f: f64| (a + (b - a) * f) as u8;
    if t < 0.0 {
        let f = t + 1.0; // 0 at full blue, 1 at white
        (
            lerp(59.0, 240.0, f),
            lerp(76.0, 240.0, f),
            lerp(192.0, 240.0, f),
        )
    } else {
        let f = t; // 0 at white, 1 at full red
        (
            lerp(240.0, 180.0, f),
            lerp(240.0, 4.0, f),
            lerp(240.0, 38.0, f),
        )
    }
}

/// Render a square matrix as a colored heatmap. The palette is centered at
/// zero and scaled to the largest magnitude. Cells whose magnitude falls in
/// [0.5, 1.0) carry a numeric annotation; the rest stay as plain color.
pub fn render_heatmap(matrix: &Array2<f64>, labels: &[String]) -> String {
    render(matrix, labels, false)
}

/// Confusion-matrix render: same palette, but every cell is annotated.
pub fn render_confusion(matrix: &Array2<f64>, labels: &[String]) -> String {
    render(matrix, labels, true)
}

fn render(matrix: &Array2<f64>, labels: &[String], annotate_all: bool) -> String {
    let n = matrix.nrows();
    let label_width = labels.iter().map(|l| l.len()).max().unwrap_or(0).max(4);
    let vmax = matrix
        .iter()
        .fold(0.0f64, |m, v| m.max(v.abs()))
        .max(f64::MIN_POSITIVE);

    let mut out = String::new();

    // Column headers, truncated to the cell width
    out.push_str(&" ".repeat(label_width + 2));
    for label in labels {
        let short: String = label.chars().take(CELL_WIDTH - 1).collect();
        out.push_str(&format!("{:^width$}", short, width = CELL_WIDTH));
    }
    out.push('\n');

    for i in 0..n {
        out.push_str(&format!("{:>width$}  ", labels[i], width = label_width));
        for j in 0..matrix.ncols() {
            let v = matrix[[i, j]];
            let (r, g, b) = diverging_color(v / vmax);
            let magnitude = v.abs();
            let text = if annotate_all {
                format!("{:^width$}", format!("{:.2}", v), width = CELL_WIDTH)
            } else if (0.5..1.0).contains(&magnitude) {
                format!("{:^width$}", format!("{:+.2}", v), width = CELL_WIDTH)
            } else {
                " ".repeat(CELL_WIDTH)
            };
            // Dark text on light cells, light text on saturated ones
            let luminance = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
            let styled = if luminance > 140.0 {
                text.on_truecolor(r, g, b).truecolor(40, 40, 40)
            } else {
                text.on_truecolor(r, g, b).truecolor(230, 230, 230)
            };
            out.push_str(&styled.to_string());
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viz::strip_ansi;
    use ndarray::array;

    #[test]
    fn test_heatmap_annotates_mid_range_values() {
        let m = array![[1.0, 0.87], [0.87, 1.0]];
        let labels = vec!["a".to_string(), "b".to_string()];
        let plain = strip_ansi(&render_heatmap(&m, &labels));
        // 0.87 falls in the annotated band, 1.0 does not
        assert!(plain.contains("+0.87"));
        assert!(!plain.contains("+1.00"));
    }

    #[test]
    fn test_heatmap_skips_weak_values() {
        let m = array![[1.0, 0.12], [0.12, 1.0]];
        let labels = vec!["a".to_string(), "b".to_string()];
        let plain = strip_ansi(&render_heatmap(&m, &labels));
        assert!(!plain.contains("0.12"));
    }

    #[test]
    fn test_heatmap_annotates_negative_values() {
        let m = array![[1.0, -0.66], [-0.66, 1.0]];
        let labels = vec!["a".to_string(), "b".to_string()];
        let plain = strip_ansi(&render_heatmap(&m, &labels));
        assert!(plain.contains("-0.66"));
    }

    #[test]
    fn test_heatmap_contains_labels() {
        let m = array![[1.0, 0.5], [0.5, 1.0]];
        let labels = vec!["sepal_length".to_string(), "petal_width".to_string()];
        let plain = strip_ansi(&render_heatmap(&m, &labels));
        assert!(plain.contains("sepal_length"));
        assert!(plain.contains("petal_width"));
    }

    #[test]
    fn test_confusion_render_annotates_every_cell() {
        // Perfect row-normalized confusion matrix: 1.0 diagonal, 0.0 elsewhere
        let m = array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        let labels = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let plain = strip_ansi(&render_confusion(&m, &labels));
        assert_eq!(plain.matches("1.00").count(), 3);
        assert_eq!(plain.matches("0.00").count(), 6);
    }

    #[test]
    fn test_confusion_render_shows_off_diagonal_rates() {
        let m = array![[0.9, 0.1], [0.2, 0.8]];
        let labels = vec!["a".to_string(), "b".to_string()];
        let plain = strip_ansi(&render_confusion(&m, &labels));
        assert!(plain.contains("0.90"));
        assert!(plain.contains("0.10"));
        assert!(plain.contains("0.20"));
        assert!(plain.contains("0.80"));
    }

    #[test]
    fn test_diverging_color_endpoints() {
        assert_eq!(diverging_color(0.0), (240, 240, 240));
        assert_eq!(diverging_color(1.0), (180, 4, 38));
        assert_eq!(diverging_color(-1.0), (59, 76, 192));
    }
}
