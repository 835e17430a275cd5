//! Chart layouts and their plotters renderings.
//!
//! Each chart is computed as a plain layout struct first (panels, bar
//! segments, boxes, brackets) and only then drawn, so a layout can be
//! inspected without a drawing backend.

pub mod boxplot;
pub mod stacked_bar;

use std::fmt::Display;
use std::fs;
use std::path::Path;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_bitmap::BitMapBackend;
use plotters_svg::SVGBackend;
use polars::prelude::*;
use tracing::info;

use crate::models::polars_err;

/// Okabe-Ito palette, used for stack fills.
pub const CATEGORY_PALETTE: [RGBColor; 8] = [
    RGBColor(0, 114, 178),
    RGBColor(230, 159, 0),
    RGBColor(0, 158, 115),
    RGBColor(213, 94, 0),
    RGBColor(204, 121, 167),
    RGBColor(86, 180, 233),
    RGBColor(240, 228, 66),
    RGBColor(128, 128, 128),
];

/// Box fills, one per phenotype level.
pub const GROUP_PALETTE: [RGBColor; 6] = [
    RGBColor(248, 118, 109),
    RGBColor(0, 186, 56),
    RGBColor(97, 156, 255),
    RGBColor(183, 159, 0),
    RGBColor(0, 191, 196),
    RGBColor(245, 100, 227),
];

pub fn palette_colour(palette: &[RGBColor], idx: usize) -> RGBColor {
    palette[idx % palette.len()]
}

pub(crate) fn draw_err<E: Display>(e: E) -> PolarsError {
    PolarsError::ComputeError(format!("drawing failed: {e}").into())
}

/// A layout that can draw itself onto any plotters backend.
pub trait Figure {
    fn draw_on<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()>;
}

/// Render `figure` to `path`; `.svg` selects the SVG backend, anything
/// else the bitmap backend.
pub fn save_figure<F: Figure>(figure: &F, path: &Path, size: (u32, u32)) -> PolarsResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| polars_err(Box::new(e)))?;
    }
    let is_svg = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("svg"));

    if is_svg {
        let root = SVGBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        figure.draw_on(&root)?;
        root.present().map_err(draw_err)?;
    } else {
        let root = BitMapBackend::new(path, size).into_drawing_area();
        root.fill(&WHITE).map_err(draw_err)?;
        figure.draw_on(&root)?;
        root.present().map_err(draw_err)?;
    }
    info!("Saved plot to {}", path.display());
    Ok(())
}

/// Map a fractional axis position back to a category label.
pub(crate) fn category_tick(labels: &[String], v: f64) -> String {
    let idx = v.round();
    if (v - idx).abs() > 1e-6 || idx < 0.0 {
        return String::new();
    }
    labels.get(idx as usize).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn palette_cycles() {
        assert_eq!(palette_colour(&CATEGORY_PALETTE, 0), CATEGORY_PALETTE[0]);
        assert_eq!(palette_colour(&CATEGORY_PALETTE, 9), CATEGORY_PALETTE[1]);
    }

    #[test]
    fn ticks_only_on_integer_positions() {
        let labels = vec!["A".to_string(), "B".to_string()];
        assert_eq!(category_tick(&labels, 1.0), "B");
        assert_eq!(category_tick(&labels, 0.5), "");
        assert_eq!(category_tick(&labels, -1.0), "");
        assert_eq!(category_tick(&labels, 2.0), "");
    }
}
