//! Terminal renders of the exploratory plots
//!
//! Everything draws into a `String` with ANSI truecolor, in the same visual
//! language as the CLI: dim frames, muted labels, glyph scatter marks.

mod charts;
mod heatmap;

pub use charts::{
    render_bar_chart, render_density, render_histogram, render_pairwise, CLASS_GLYPHS,
};
pub use heatmap::{render_confusion, render_heatmap};

/// Truecolor marks per class, cycled when there are more classes than entries
pub(crate) const CLASS_COLORS: [(u8, u8, u8); 3] =
    [(120, 170, 255), (100, 210, 120), (240, 160, 80)];

/// Remove ANSI escape sequences, leaving the visible characters
pub fn strip_ansi(s: &str) -> String {
    let mut out = String::new();
    let mut in_escape = false;
    for c in s.chars() {
        if c == '\x1b' {
            in_escape = true;
            continue;
        }
        if in_escape {
            if c == 'm' {
                in_escape = false;
            }
            continue;
        }
        out.push(c);
    }
    out
}
