//! The two chart pipelines: Load -> Transform -> Statistic -> Render.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::info;

use crate::analysis::comparator::{compare_groups, ComparisonReport};
use crate::config::RunConfig;
use crate::data_handling::any_dataset::TableDataset;
use crate::data_handling::mock_immune::{MockImmuneInfiltration, CELL_TYPE_COL};
use crate::data_handling::mock_signatures::{MockSignatureExposures, EXPOSURE_COL, SIGNATURE_COL};
use crate::helper_functions::dataframe_to_csv;
use crate::models::{
    anova_to_dataframe, comparisons_to_dataframe, AesMapping, Dataset, PhenotypeLevels, GROUP_COL,
    SAMPLE_COL, VALUE_COL,
};
use crate::plotting::boxplot::boxplot_layout;
use crate::plotting::save_figure;
use crate::plotting::stacked_bar::{stacked_bar_layout, StackedBarOptions};

/// Pipeline A on a caller-supplied table.
pub fn plot_composition(
    df: &DataFrame,
    mapping: &AesMapping,
    levels: Option<&PhenotypeLevels>,
    options: &StackedBarOptions,
    path: &Path,
    size: (u32, u32),
) -> PolarsResult<()> {
    let layout = stacked_bar_layout(df, mapping, levels, options)?;
    save_figure(&layout, path, size)
}

/// Pipeline B on a caller-supplied table. Returns the statistics that were
/// drawn.
pub fn plot_comparison(
    df: &DataFrame,
    mapping: &AesMapping,
    levels: Option<&PhenotypeLevels>,
    title: &str,
    path: &Path,
    size: (u32, u32),
) -> PolarsResult<ComparisonReport> {
    let report = compare_groups(df, mapping, levels)?;
    let layout = boxplot_layout(df, mapping, Some(&report.levels), Some(&report.comparisons), title)?;
    save_figure(&layout, path, size)?;
    Ok(report)
}

pub fn write_comparison_tables(report: &ComparisonReport, dir: &Path) -> PolarsResult<Vec<PathBuf>> {
    let tables = [
        ("comparisons.csv", comparisons_to_dataframe(&report.comparisons)?),
        ("anova.csv", anova_to_dataframe(&report.anova)?),
        ("group_summary.csv", report.summary.clone()),
    ];
    let mut written = Vec::with_capacity(tables.len());
    for (name, mut df) in tables {
        let path = dir.join(name);
        dataframe_to_csv(&mut df, &path)?;
        written.push(path);
    }
    Ok(written)
}

/// Load `csv` when given, otherwise fall back to the mock source and its
/// fixed level order.
fn load_source(
    csv: Option<&Path>,
    required: &[&str],
    mock: &dyn Dataset,
    mock_levels: &[String],
) -> PolarsResult<(DataFrame, Option<PhenotypeLevels>)> {
    match csv {
        Some(path) => {
            let df = TableDataset::new(&path.to_string_lossy(), required).load()?;
            Ok((df, None))
        }
        None => Ok((mock.load()?, Some(PhenotypeLevels::new(mock_levels)?))),
    }
}

/// Stacked signature exposures, from `signature_csv` or the mock dataset.
pub fn run_signature_composition(cfg: &RunConfig) -> PolarsResult<PathBuf> {
    info!("Pipeline A: signature composition");
    let mapping = AesMapping::new(SAMPLE_COL, GROUP_COL, Some(SIGNATURE_COL), EXPOSURE_COL);
    let mock = MockSignatureExposures::example(cfg.seed);
    let (df, levels) = load_source(
        cfg.signature_csv.as_deref(),
        &mapping.columns(),
        &mock,
        &mock.groups,
    )?;
    let options = StackedBarOptions {
        position: cfg.stacked_position,
        order: cfg.sample_order.clone(),
        ..StackedBarOptions::default()
    };
    let path = cfg.figure_path("signature_composition");
    plot_composition(&df, &mapping, levels.as_ref(), &options, &path, (cfg.width, cfg.height))?;
    Ok(path)
}

/// Immune cell-type comparison, from `immune_csv` or the mock dataset.
pub fn run_immune_comparison(cfg: &RunConfig) -> PolarsResult<ComparisonReport> {
    info!("Pipeline B: immune cell-type comparison");
    let mapping = AesMapping::new(SAMPLE_COL, GROUP_COL, Some(CELL_TYPE_COL), VALUE_COL);
    let mock = MockImmuneInfiltration::example(cfg.seed);
    let (df, levels) = load_source(
        cfg.immune_csv.as_deref(),
        &mapping.columns(),
        &mock,
        &mock.groups,
    )?;
    let path = cfg.figure_path("immune_comparison");
    let report = plot_comparison(
        &df,
        &mapping,
        levels.as_ref(),
        "Immune infiltration by phenotype",
        &path,
        (cfg.width, cfg.height),
    )?;
    write_comparison_tables(&report, &cfg.output_dir)?;
    Ok(report)
}
