//! Boxplots faceted by partition, with significance brackets overlaid at
//! precomputed heights.

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use polars::prelude::*;
use tracing::info;

use crate::analysis::comparator::partition_values;
use crate::analysis::describe::{quantile_sorted, sorted_copy};
use crate::helper_functions::expand_range;
use crate::models::{AesMapping, ComparisonResult, PhenotypeLevels};
use crate::plotting::{category_tick, draw_err, palette_colour, Figure, GROUP_PALETTE};

const BOX_HALF_WIDTH: f64 = 0.3;
const WHISKER_COEF: f64 = 1.5;

/// Five-number box with 1.5 x IQR whiskers.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxStats {
    /// Position on the shared x axis (phenotype level index).
    pub level: usize,
    pub label: String,
    pub n: usize,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: Vec<f64>,
}

impl BoxStats {
    pub fn from_values(level: usize, label: &str, values: &[f64]) -> Self {
        let sorted = sorted_copy(values);
        let q1 = quantile_sorted(&sorted, 0.25);
        let median = quantile_sorted(&sorted, 0.5);
        let q3 = quantile_sorted(&sorted, 0.75);
        let reach = WHISKER_COEF * (q3 - q1);
        let (lo_fence, hi_fence) = (q1 - reach, q3 + reach);

        let inside: Vec<f64> = sorted
            .iter()
            .copied()
            .filter(|v| *v >= lo_fence && *v <= hi_fence)
            .collect();
        let outliers = sorted
            .iter()
            .copied()
            .filter(|v| *v < lo_fence || *v > hi_fence)
            .collect();

        Self {
            level,
            label: label.to_string(),
            n: sorted.len(),
            q1,
            median,
            q3,
            lower_whisker: inside.first().copied().unwrap_or(q1),
            upper_whisker: inside.last().copied().unwrap_or(q3),
            outliers,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bracket {
    pub x_a: usize,
    pub x_b: usize,
    pub y: f64,
    pub label: String,
}

#[derive(Debug, Clone)]
pub struct BoxPanel {
    pub key: String,
    pub boxes: Vec<BoxStats>,
    pub brackets: Vec<Bracket>,
    pub y_range: (f64, f64),
}

#[derive(Debug, Clone)]
pub struct BoxplotLayout {
    pub levels: PhenotypeLevels,
    pub panels: Vec<BoxPanel>,
    pub title: String,
    pub y_label: String,
}

/// Lay out one panel per partition of `mapping.category` (a single
/// placeholder panel when unset). Comparison rows are matched to panels by
/// partition key and to x positions by group label.
pub fn boxplot_layout(
    df: &DataFrame,
    mapping: &AesMapping,
    levels: Option<&PhenotypeLevels>,
    comparisons: Option<&[ComparisonResult]>,
    title: &str,
) -> PolarsResult<BoxplotLayout> {
    let (levels, partitions) = partition_values(df, mapping, levels)?;

    let mut panels = Vec::with_capacity(partitions.len());
    for part in &partitions {
        let boxes: Vec<BoxStats> = part
            .groups
            .iter()
            .map(|g| BoxStats::from_values(g.level, &g.label, &g.values))
            .collect();

        let mut brackets = Vec::new();
        for c in comparisons
            .unwrap_or(&[])
            .iter()
            .filter(|c| c.partition == part.key)
        {
            let locate = |label: &str| {
                levels.position(label).ok_or_else(|| {
                    PolarsError::ComputeError(
                        format!("comparison refers to unknown group `{label}`").into(),
                    )
                })
            };
            brackets.push(Bracket {
                x_a: locate(&c.group_a)?,
                x_b: locate(&c.group_b)?,
                y: c.bracket_y_position,
                label: c.significance_label.clone(),
            });
        }

        let (lo, hi) = part.value_range();
        let top = brackets.iter().map(|b| b.y).fold(hi, f64::max);
        // Headroom so the topmost label is not clipped.
        let headroom = if brackets.is_empty() { 0.05 } else { 0.12 };
        let y_range = expand_range(lo, top, headroom);

        panels.push(BoxPanel {
            key: part.display_key().to_string(),
            boxes,
            brackets,
            y_range,
        });
    }

    info!(
        "Boxplot layout: {} panel(s), {} bracket(s)",
        panels.len(),
        panels.iter().map(|p| p.brackets.len()).sum::<usize>()
    );

    Ok(BoxplotLayout {
        levels,
        panels,
        title: title.to_string(),
        y_label: mapping.value.clone(),
    })
}

impl Figure for BoxplotLayout {
    fn draw_on<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        let body = root
            .titled(&self.title, ("sans-serif", 24))
            .map_err(draw_err)?;
        if self.panels.is_empty() {
            return Ok(());
        }
        let areas = body.split_evenly((1, self.panels.len()));
        let labels = self.levels.as_slice();
        let k = labels.len();
        let tick = |v: &f64| category_tick(labels, *v);
        let label_style = TextStyle::from(("sans-serif", 16).into_font())
            .pos(Pos::new(HPos::Center, VPos::Bottom));

        for (p, (panel, area)) in self.panels.iter().zip(areas.iter()).enumerate() {
            let (y_lo, y_hi) = panel.y_range;
            let tick_len = (y_hi - y_lo) * 0.015;

            let mut chart = ChartBuilder::on(area)
                .caption(&panel.key, ("sans-serif", 18))
                .margin(10)
                .x_label_area_size(40)
                .y_label_area_size(if p == 0 { 60 } else { 40 })
                .build_cartesian_2d(-0.5..(k as f64 - 0.5), y_lo..y_hi)
                .map_err(draw_err)?;

            let mut mesh = chart.configure_mesh();
            mesh.disable_x_mesh().x_labels(k).x_label_formatter(&tick);
            if p == 0 {
                mesh.y_desc(self.y_label.as_str());
            }
            mesh.draw().map_err(draw_err)?;

            for b in &panel.boxes {
                let x = b.level as f64;
                let colour = palette_colour(&GROUP_PALETTE, b.level);
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [(x - BOX_HALF_WIDTH, b.q1), (x + BOX_HALF_WIDTH, b.q3)],
                        colour.mix(0.6).filled(),
                    )))
                    .map_err(draw_err)?;
                chart
                    .draw_series(std::iter::once(Rectangle::new(
                        [(x - BOX_HALF_WIDTH, b.q1), (x + BOX_HALF_WIDTH, b.q3)],
                        BLACK.stroke_width(1),
                    )))
                    .map_err(draw_err)?;
                chart
                    .draw_series([
                        PathElement::new(
                            vec![(x - BOX_HALF_WIDTH, b.median), (x + BOX_HALF_WIDTH, b.median)],
                            BLACK.stroke_width(2),
                        ),
                        PathElement::new(vec![(x, b.q3), (x, b.upper_whisker)], BLACK.stroke_width(1)),
                        PathElement::new(vec![(x, b.q1), (x, b.lower_whisker)], BLACK.stroke_width(1)),
                    ])
                    .map_err(draw_err)?;
                chart
                    .draw_series(
                        b.outliers
                            .iter()
                            .map(|&y| Circle::new((x, y), 3, BLACK.filled())),
                    )
                    .map_err(draw_err)?;
            }

            for br in &panel.brackets {
                let (xa, xb) = (br.x_a as f64, br.x_b as f64);
                chart
                    .draw_series(std::iter::once(PathElement::new(
                        vec![
                            (xa, br.y - tick_len),
                            (xa, br.y),
                            (xb, br.y),
                            (xb, br.y - tick_len),
                        ],
                        BLACK.stroke_width(1),
                    )))
                    .map_err(draw_err)?;
                chart
                    .draw_series(std::iter::once(Text::new(
                        br.label.clone(),
                        ((xa + xb) * 0.5, br.y + tick_len * 0.5),
                        label_style.clone(),
                    )))
                    .map_err(draw_err)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::comparator::compare_groups;
    use crate::data_handling::mock_immune::{MockImmuneInfiltration, CELL_TYPE_COL};
    use crate::models::{Dataset, GROUP_COL, SAMPLE_COL, VALUE_COL};

    #[test]
    fn box_stats_match_r_boxplot() {
        // boxplot.stats-like values with quantile type 7
        let b = BoxStats::from_values(0, "A", &[1.0, 2.0, 3.0, 4.0, 5.0, 100.0]);
        assert_eq!(b.n, 6);
        assert!((b.q1 - 2.25).abs() < 1e-12);
        assert!((b.median - 3.5).abs() < 1e-12);
        assert!((b.q3 - 4.75).abs() < 1e-12);
        assert_eq!(b.upper_whisker, 5.0);
        assert_eq!(b.lower_whisker, 1.0);
        assert_eq!(b.outliers, vec![100.0]);
    }

    #[test]
    fn panels_per_cell_type_with_brackets() {
        let df = MockImmuneInfiltration::example(42).load().unwrap();
        let mapping = AesMapping::new(SAMPLE_COL, GROUP_COL, Some(CELL_TYPE_COL), VALUE_COL);
        let report = compare_groups(&df, &mapping, None).unwrap();
        let layout =
            boxplot_layout(&df, &mapping, None, Some(&report.comparisons), "Immune").unwrap();

        assert_eq!(layout.panels.len(), 2);
        assert_eq!(layout.panels[0].key, "CD8 T cells");
        for panel in &layout.panels {
            assert_eq!(panel.boxes.len(), 3);
            assert_eq!(panel.brackets.len(), 3);
            let top = panel.brackets.iter().map(|b| b.y).fold(f64::MIN, f64::max);
            assert!(panel.y_range.1 > top);
            for b in &panel.boxes {
                assert!(b.lower_whisker <= b.q1 && b.q1 <= b.median);
                assert!(b.median <= b.q3 && b.q3 <= b.upper_whisker);
            }
        }
    }

    #[test]
    fn layout_without_comparisons_has_no_brackets() {
        let df = MockImmuneInfiltration::example(1).load().unwrap();
        let mapping = AesMapping::new(SAMPLE_COL, GROUP_COL, None, VALUE_COL);
        let layout = boxplot_layout(&df, &mapping, None, None, "").unwrap();
        assert_eq!(layout.panels.len(), 1);
        assert_eq!(layout.panels[0].key, "all");
        assert!(layout.panels[0].brackets.is_empty());
    }

    #[test]
    fn bracket_with_unknown_group_fails() {
        let df = MockImmuneInfiltration::example(1).load().unwrap();
        let mapping = AesMapping::new(SAMPLE_COL, GROUP_COL, None, VALUE_COL);
        let bogus = ComparisonResult {
            partition: None,
            group_a: "Desert".into(),
            group_b: "Unknown".into(),
            n_a: 1,
            n_b: 1,
            estimate: 0.0,
            conf_low: 0.0,
            conf_high: 0.0,
            raw_p: 1.0,
            adjusted_p: 1.0,
            significance_label: "ns".into(),
            bracket_y_position: 1.0,
        };
        assert!(boxplot_layout(&df, &mapping, None, Some(&[bogus]), "").is_err());
    }
}
