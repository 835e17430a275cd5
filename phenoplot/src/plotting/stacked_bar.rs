//! Stacked composition bars, one facet panel per phenotype group.

use std::cmp::Ordering;
use std::collections::HashMap;

use plotters::coord::Shift;
use plotters::prelude::*;
use plotters_backend::FontTransform;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::helper_functions::{f64_values, require_columns, str_values};
use crate::models::{AesMapping, PhenotypeLevels};
use crate::plotting::{category_tick, draw_err, palette_colour, Figure, CATEGORY_PALETTE};

const BAR_HALF_WIDTH: f64 = 0.4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BarPosition {
    /// Absolute values stacked on top of each other.
    Stack,
    /// Each bar scaled to sum to one.
    Fill,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleOrder {
    AsLoaded,
    ById,
    ByTotalDescending,
    /// Descending by one category's value.
    ByCategory(String),
}

#[derive(Debug, Clone)]
pub struct StackedBarOptions {
    pub position: BarPosition,
    pub order: SampleOrder,
    pub title: String,
    pub y_label: String,
}

impl Default for StackedBarOptions {
    fn default() -> Self {
        Self {
            position: BarPosition::Stack,
            order: SampleOrder::ById,
            title: "Signature exposures".to_string(),
            y_label: "Exposure".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BarSegment {
    pub sample: String,
    pub category: usize,
    pub y0: f64,
    pub y1: f64,
}

#[derive(Debug, Clone)]
pub struct FacetPanel {
    pub group: String,
    pub samples: Vec<String>,
    pub segments: Vec<BarSegment>,
}

#[derive(Debug, Clone)]
pub struct StackedBarLayout {
    pub categories: Vec<String>,
    pub panels: Vec<FacetPanel>,
    pub y_max: f64,
    pub title: String,
    pub y_label: String,
}

struct SampleBar {
    id: String,
    group: String,
    first_row: usize,
    values: Vec<f64>,
}

impl SampleBar {
    fn total(&self) -> f64 {
        self.values.iter().sum()
    }
}

fn order_samples(bars: &mut [&SampleBar], order: &SampleOrder, categories: &[String]) -> PolarsResult<()> {
    match order {
        SampleOrder::AsLoaded => bars.sort_by_key(|b| b.first_row),
        SampleOrder::ById => bars.sort_by(|a, b| a.id.cmp(&b.id)),
        SampleOrder::ByTotalDescending => bars.sort_by(|a, b| {
            b.total()
                .partial_cmp(&a.total())
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        }),
        SampleOrder::ByCategory(name) => {
            let c = categories.iter().position(|c| c == name).ok_or_else(|| {
                PolarsError::ComputeError(format!("cannot order by unknown category `{name}`").into())
            })?;
            bars.sort_by(|a, b| {
                b.values[c]
                    .partial_cmp(&a.values[c])
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| a.id.cmp(&b.id))
            });
        }
    }
    Ok(())
}

/// Lay out one bar per sample and one segment per (sample, category).
///
/// Repeated (sample, category) rows are summed. A sample must belong to a
/// single phenotype group. Groups without samples get no panel.
pub fn stacked_bar_layout(
    df: &DataFrame,
    mapping: &AesMapping,
    levels: Option<&PhenotypeLevels>,
    options: &StackedBarOptions,
) -> PolarsResult<StackedBarLayout> {
    let category_col = mapping.category.as_deref().ok_or_else(|| {
        PolarsError::ComputeError("stacked bars need a category column to fill by".into())
    })?;
    require_columns(df, &mapping.columns())?;

    let samples = str_values(df, &mapping.sample)?;
    let groups = str_values(df, &mapping.group)?;
    let cats = str_values(df, category_col)?;
    let values = f64_values(df, &mapping.value)?;

    let mut categories: Vec<String> = Vec::new();
    for c in &cats {
        if !categories.contains(c) {
            categories.push(c.clone());
        }
    }
    let levels = match levels {
        Some(l) => l.clone(),
        None => PhenotypeLevels::from_appearance(groups.iter().map(String::as_str)),
    };

    let mut bars: Vec<SampleBar> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    for row in 0..df.height() {
        let v = values[row];
        if !v.is_finite() || v < 0.0 {
            return Err(PolarsError::ComputeError(
                format!("row {row}: stacked value must be finite and non-negative, got {v}").into(),
            ));
        }
        let c = categories.iter().position(|x| *x == cats[row]).unwrap_or(0);
        let i = match index.get(samples[row].as_str()) {
            Some(&i) => {
                if bars[i].group != groups[row] {
                    return Err(PolarsError::ComputeError(
                        format!(
                            "sample `{}` appears in groups `{}` and `{}`",
                            samples[row], bars[i].group, groups[row]
                        )
                        .into(),
                    ));
                }
                i
            }
            None => {
                bars.push(SampleBar {
                    id: samples[row].clone(),
                    group: groups[row].clone(),
                    first_row: row,
                    values: vec![0.0; categories.len()],
                });
                index.insert(samples[row].as_str(), bars.len() - 1);
                bars.len() - 1
            }
        };
        bars[i].values[c] += v;
    }

    if let Some(unknown) = bars.iter().find(|b| levels.position(&b.group).is_none()) {
        return Err(PolarsError::ComputeError(
            format!("group `{}` is not one of {:?}", unknown.group, levels.as_slice()).into(),
        ));
    }

    let mut panels = Vec::new();
    let mut y_max: f64 = 0.0;
    for level in levels.iter() {
        let mut members: Vec<&SampleBar> = bars.iter().filter(|b| b.group == level).collect();
        if members.is_empty() {
            debug!("No samples in group {level}; skipping panel");
            continue;
        }
        order_samples(&mut members, &options.order, &categories)?;

        let mut segments = Vec::with_capacity(members.len() * categories.len());
        for bar in &members {
            let scale = match options.position {
                BarPosition::Stack => 1.0,
                BarPosition::Fill => {
                    let t = bar.total();
                    if t > 0.0 {
                        1.0 / t
                    } else {
                        0.0
                    }
                }
            };
            let mut y = 0.0;
            for (c, v) in bar.values.iter().enumerate() {
                let top = y + v * scale;
                segments.push(BarSegment {
                    sample: bar.id.clone(),
                    category: c,
                    y0: y,
                    y1: top,
                });
                y = top;
            }
            y_max = y_max.max(y);
        }
        panels.push(FacetPanel {
            group: level.to_string(),
            samples: members.iter().map(|b| b.id.clone()).collect(),
            segments,
        });
    }

    info!(
        "Stacked layout: {} samples, {} categories, {} panels",
        bars.len(),
        categories.len(),
        panels.len()
    );

    Ok(StackedBarLayout {
        categories,
        panels,
        y_max: match options.position {
            BarPosition::Fill => 1.0,
            BarPosition::Stack => y_max,
        },
        title: options.title.clone(),
        y_label: options.y_label.clone(),
    })
}

impl Figure for StackedBarLayout {
    fn draw_on<DB: DrawingBackend>(&self, root: &DrawingArea<DB, Shift>) -> PolarsResult<()> {
        let body = root
            .titled(&self.title, ("sans-serif", 24))
            .map_err(draw_err)?;
        if self.panels.is_empty() {
            return Ok(());
        }
        let areas = body.split_evenly((1, self.panels.len()));
        let y_top = if self.y_max > 0.0 { self.y_max * 1.05 } else { 1.0 };
        let x_label_style = TextStyle::from(("sans-serif", 12).into_font())
            .transform(FontTransform::Rotate90);

        for (p, (panel, area)) in self.panels.iter().zip(areas.iter()).enumerate() {
            let n = panel.samples.len();
            let mut chart = ChartBuilder::on(area)
                .caption(&panel.group, ("sans-serif", 18))
                .margin(8)
                .x_label_area_size(60)
                .y_label_area_size(if p == 0 { 60 } else { 30 })
                .build_cartesian_2d(-0.5..(n as f64 - 0.5), 0.0..y_top)
                .map_err(draw_err)?;

            let samples = &panel.samples;
            let tick = |v: &f64| category_tick(samples, *v);
            let mut mesh = chart.configure_mesh();
            mesh.disable_x_mesh()
                .x_labels(n)
                .x_label_style(x_label_style.clone())
                .x_label_formatter(&tick);
            if p == 0 {
                mesh.y_desc(self.y_label.as_str());
            }
            mesh.draw().map_err(draw_err)?;

            chart
                .draw_series(panel.segments.iter().map(|s| {
                    let x = samples.iter().position(|id| *id == s.sample).unwrap_or(0) as f64;
                    Rectangle::new(
                        [(x - BAR_HALF_WIDTH, s.y0), (x + BAR_HALF_WIDTH, s.y1)],
                        palette_colour(&CATEGORY_PALETTE, s.category).filled(),
                    )
                }))
                .map_err(draw_err)?;

            if p + 1 == self.panels.len() {
                for (c, name) in self.categories.iter().enumerate() {
                    let colour = palette_colour(&CATEGORY_PALETTE, c);
                    chart
                        .draw_series(std::iter::empty::<Rectangle<(f64, f64)>>())
                        .map_err(draw_err)?
                        .label(name.as_str())
                        .legend(move |(x, y)| {
                            Rectangle::new([(x, y - 5), (x + 10, y + 5)], colour.filled())
                        });
                }
                chart
                    .configure_series_labels()
                    .background_style(WHITE.mix(0.8))
                    .border_style(&BLACK)
                    .position(SeriesLabelPosition::UpperRight)
                    .draw()
                    .map_err(draw_err)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_handling::mock_signatures::{
        MockSignatureExposures, EXPOSURE_COL, SIGNATURE_COL,
    };
    use crate::models::{Dataset, GROUP_COL, SAMPLE_COL};

    fn mapping() -> AesMapping {
        AesMapping::new(SAMPLE_COL, GROUP_COL, Some(SIGNATURE_COL), EXPOSURE_COL)
    }

    #[test]
    fn example_gives_one_segment_per_pair_and_three_panels() {
        let df = MockSignatureExposures::example(42).load().unwrap();
        let layout =
            stacked_bar_layout(&df, &mapping(), None, &StackedBarOptions::default()).unwrap();
        assert_eq!(layout.panels.len(), 3);
        let segments: usize = layout.panels.iter().map(|p| p.segments.len()).sum();
        assert_eq!(segments, 30);

        let mut pairs: Vec<(String, usize)> = layout
            .panels
            .iter()
            .flat_map(|p| p.segments.iter().map(|s| (s.sample.clone(), s.category)))
            .collect();
        pairs.sort();
        pairs.dedup();
        assert_eq!(pairs.len(), 30);
    }

    #[test]
    fn panels_follow_level_order() {
        let df = MockSignatureExposures::example(42).load().unwrap();
        let levels = PhenotypeLevels::new(&["POLE", "MSS", "MSI"]).unwrap();
        let layout =
            stacked_bar_layout(&df, &mapping(), Some(&levels), &StackedBarOptions::default())
                .unwrap();
        let names: Vec<&str> = layout.panels.iter().map(|p| p.group.as_str()).collect();
        assert_eq!(names, vec!["POLE", "MSS", "MSI"]);
        // 10 samples round-robin: MSS gets S01, S04, S07, S10
        assert_eq!(layout.panels[1].samples, vec!["S01", "S04", "S07", "S10"]);
    }

    #[test]
    fn segments_stack_contiguously() {
        let df = MockSignatureExposures::example(3).load().unwrap();
        let layout =
            stacked_bar_layout(&df, &mapping(), None, &StackedBarOptions::default()).unwrap();
        for panel in &layout.panels {
            for chunk in panel.segments.chunks(3) {
                assert_eq!(chunk[0].y0, 0.0);
                assert_eq!(chunk[0].y1, chunk[1].y0);
                assert_eq!(chunk[1].y1, chunk[2].y0);
                assert!(chunk[2].y1 <= layout.y_max);
            }
        }
    }

    #[test]
    fn fill_bars_reach_one() {
        let df = MockSignatureExposures::example(5).load().unwrap();
        let opts = StackedBarOptions {
            position: BarPosition::Fill,
            ..StackedBarOptions::default()
        };
        let layout = stacked_bar_layout(&df, &mapping(), None, &opts).unwrap();
        assert_eq!(layout.y_max, 1.0);
        for panel in &layout.panels {
            for chunk in panel.segments.chunks(3) {
                assert!((chunk[2].y1 - 1.0).abs() < 1e-12);
            }
        }
    }

    fn small_table() -> DataFrame {
        df!(
            "sample" => &["b", "b", "a", "a", "c", "c"],
            "group" => &["G", "G", "G", "G", "G", "G"],
            "signature" => &["x", "y", "x", "y", "x", "y"],
            "exposure" => &[1.0, 5.0, 3.0, 0.5, 2.0, 2.0],
        )
        .unwrap()
    }

    fn order_of(order: SampleOrder) -> Vec<String> {
        let opts = StackedBarOptions {
            order,
            ..StackedBarOptions::default()
        };
        let layout = stacked_bar_layout(&small_table(), &mapping_small(), None, &opts).unwrap();
        layout.panels[0].samples.clone()
    }

    fn mapping_small() -> AesMapping {
        AesMapping::new("sample", "group", Some("signature"), "exposure")
    }

    #[test]
    fn sample_orderings() {
        assert_eq!(order_of(SampleOrder::AsLoaded), vec!["b", "a", "c"]);
        assert_eq!(order_of(SampleOrder::ById), vec!["a", "b", "c"]);
        // totals: b 6, a 3.5, c 4
        assert_eq!(order_of(SampleOrder::ByTotalDescending), vec!["b", "c", "a"]);
        assert_eq!(order_of(SampleOrder::ByCategory("x".into())), vec!["a", "c", "b"]);
    }

    #[test]
    fn unknown_order_category_fails() {
        let opts = StackedBarOptions {
            order: SampleOrder::ByCategory("z".into()),
            ..StackedBarOptions::default()
        };
        assert!(stacked_bar_layout(&small_table(), &mapping_small(), None, &opts).is_err());
    }

    #[test]
    fn duplicate_rows_are_summed() {
        let df = df!(
            "sample" => &["a", "a", "a"],
            "group" => &["G", "G", "G"],
            "signature" => &["x", "x", "y"],
            "exposure" => &[1.0, 2.0, 4.0],
        )
        .unwrap();
        let layout =
            stacked_bar_layout(&df, &mapping_small(), None, &StackedBarOptions::default()).unwrap();
        let segs = &layout.panels[0].segments;
        assert_eq!(segs.len(), 2);
        assert_eq!(segs[0].y1, 3.0);
        assert_eq!(segs[1].y1, 7.0);
    }

    #[test]
    fn sample_in_two_groups_fails() {
        let df = df!(
            "sample" => &["a", "a"],
            "group" => &["G", "H"],
            "signature" => &["x", "y"],
            "exposure" => &[1.0, 2.0],
        )
        .unwrap();
        assert!(
            stacked_bar_layout(&df, &mapping_small(), None, &StackedBarOptions::default())
                .is_err()
        );
    }

    #[test]
    fn negative_exposure_fails() {
        let df = df!(
            "sample" => &["a"],
            "group" => &["G"],
            "signature" => &["x"],
            "exposure" => &[-1.0],
        )
        .unwrap();
        assert!(
            stacked_bar_layout(&df, &mapping_small(), None, &StackedBarOptions::default())
                .is_err()
        );
    }

    #[test]
    fn missing_category_mapping_fails() {
        let df = small_table();
        let m = AesMapping::new("sample", "group", None, "exposure");
        assert!(stacked_bar_layout(&df, &m, None, &StackedBarOptions::default()).is_err());
    }
}
