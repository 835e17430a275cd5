//! Per-partition group comparison: one-way ANOVA, Tukey HSD, Bonferroni
//! adjustment, significance labels and bracket positions.

use polars::prelude::*;
use tracing::{debug, error, info};

use crate::analysis::anova::one_way_anova;
use crate::analysis::brackets::{bracket_positions, BracketSpan};
use crate::analysis::describe::group_summary;
use crate::analysis::pvalue::{bonferroni, significance_label};
use crate::analysis::tukey::tukey_hsd;
use crate::helper_functions::{f64_values, require_columns, str_values};
use crate::models::{
    AesMapping, AnovaTable, ComparisonResult, PhenotypeLevels, ALL_PARTITION,
};

pub const CONF_LEVEL: f64 = 0.95;

/// Observations of one phenotype level inside a partition.
#[derive(Debug, Clone)]
pub struct LevelValues {
    pub level: usize,
    pub label: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone)]
pub struct Partition {
    /// `None` when the table is not partitioned.
    pub key: Option<String>,
    pub groups: Vec<LevelValues>,
}

impl Partition {
    pub fn display_key(&self) -> &str {
        self.key.as_deref().unwrap_or(ALL_PARTITION)
    }

    pub fn value_range(&self) -> (f64, f64) {
        self.groups
            .iter()
            .flat_map(|g| g.values.iter().copied())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            })
    }
}

/// Split a long table into partitions (first-appearance order) and, inside
/// each, into phenotype levels (level order). Levels absent from a
/// partition are left out of it.
pub fn partition_values(
    df: &DataFrame,
    mapping: &AesMapping,
    levels: Option<&PhenotypeLevels>,
) -> PolarsResult<(PhenotypeLevels, Vec<Partition>)> {
    require_columns(df, &mapping.columns())?;
    let group_vals = str_values(df, &mapping.group)?;
    let values = f64_values(df, &mapping.value)?;
    let part_vals = match &mapping.category {
        Some(c) => Some(str_values(df, c)?),
        None => None,
    };

    let levels = match levels {
        Some(l) => l.clone(),
        None => PhenotypeLevels::from_appearance(group_vals.iter().map(String::as_str)),
    };

    let mut partitions: Vec<Partition> = Vec::new();
    for (row, (group, value)) in group_vals.iter().zip(&values).enumerate() {
        let level = levels.position(group).ok_or_else(|| {
            PolarsError::ComputeError(
                format!("row {row}: group `{group}` is not one of {:?}", levels.as_slice()).into(),
            )
        })?;
        let key = part_vals.as_ref().map(|p| p[row].clone());
        let idx = match partitions.iter().position(|p| p.key == key) {
            Some(i) => i,
            None => {
                partitions.push(Partition {
                    key,
                    groups: Vec::new(),
                });
                partitions.len() - 1
            }
        };
        let part = &mut partitions[idx];
        match part.groups.iter_mut().find(|g| g.level == level) {
            Some(g) => g.values.push(*value),
            None => part.groups.push(LevelValues {
                level,
                label: group.clone(),
                values: vec![*value],
            }),
        }
    }
    for p in &mut partitions {
        p.groups.sort_by_key(|g| g.level);
    }
    Ok((levels, partitions))
}

#[derive(Debug, Clone)]
pub struct ComparisonReport {
    pub levels: PhenotypeLevels,
    pub partitions: Vec<Partition>,
    pub anova: Vec<AnovaTable>,
    pub comparisons: Vec<ComparisonResult>,
    /// Per (partition, group) counts, means, sds, medians and extremes.
    pub summary: DataFrame,
}

impl ComparisonReport {
    pub fn comparisons_for<'a>(
        &'a self,
        key: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ComparisonResult> + 'a {
        self.comparisons
            .iter()
            .filter(move |c| c.partition.as_deref() == key)
    }
}

pub fn compare_partition(
    part: &Partition,
) -> PolarsResult<(AnovaTable, Vec<ComparisonResult>)> {
    let groups: Vec<(String, Vec<f64>)> = part
        .groups
        .iter()
        .map(|g| (g.label.clone(), g.values.clone()))
        .collect();

    let mut anova = one_way_anova(&groups)?;
    anova.partition = part.key.clone();

    let contrasts = tukey_hsd(&groups, anova.ms_within(), anova.df_within, CONF_LEVEL)?;
    let raw: Vec<f64> = contrasts.iter().map(|c| c.p_adj).collect();
    let adjusted = bonferroni(&raw);

    let group_max: Vec<f64> = groups
        .iter()
        .map(|(_, xs)| xs.iter().copied().fold(f64::NEG_INFINITY, f64::max))
        .collect();
    let spans: Vec<BracketSpan> = contrasts
        .iter()
        .map(|c| BracketSpan {
            a: c.a,
            b: c.b,
            local_max: group_max[c.a].max(group_max[c.b]),
        })
        .collect();
    let (lo, hi) = part.value_range();
    let ys = bracket_positions(&spans, lo, hi);

    let comparisons: Vec<ComparisonResult> = contrasts
        .iter()
        .zip(adjusted)
        .zip(ys)
        .map(|((c, adj), y)| ComparisonResult {
            partition: part.key.clone(),
            group_a: groups[c.a].0.clone(),
            group_b: groups[c.b].0.clone(),
            n_a: groups[c.a].1.len(),
            n_b: groups[c.b].1.len(),
            estimate: c.diff,
            conf_low: c.lwr,
            conf_high: c.upr,
            raw_p: c.p_adj,
            adjusted_p: adj,
            significance_label: significance_label(adj).to_string(),
            bracket_y_position: y,
        })
        .collect();

    for c in &comparisons {
        debug!(
            "{}: {} vs {} diff={:.3} p={:.3e} p.adj={:.3e} {}",
            part.display_key(),
            c.group_a,
            c.group_b,
            c.estimate,
            c.raw_p,
            c.adjusted_p,
            c.significance_label
        );
    }

    Ok((anova, comparisons))
}

/// Run the full comparison for every partition of `df`. The first
/// degenerate partition aborts the whole run.
pub fn compare_groups(
    df: &DataFrame,
    mapping: &AesMapping,
    levels: Option<&PhenotypeLevels>,
) -> PolarsResult<ComparisonReport> {
    let (levels, partitions) = partition_values(df, mapping, levels)?;
    info!(
        "Comparing {} phenotype levels across {} partition(s)",
        levels.len(),
        partitions.len()
    );

    let mut anova = Vec::with_capacity(partitions.len());
    let mut comparisons = Vec::new();
    for part in &partitions {
        let (a, c) = compare_partition(part).map_err(|e| {
            error!("Comparison failed in partition `{}`: {}", part.display_key(), e);
            e
        })?;
        info!(
            "{}: F({}, {}) = {:.3}, p = {:.3e}",
            part.display_key(),
            a.df_between,
            a.df_within,
            a.f_value,
            a.p_value
        );
        anova.push(a);
        comparisons.extend(c);
    }

    let summary = group_summary(df, mapping)?;

    Ok(ComparisonReport {
        levels,
        partitions,
        anova,
        comparisons,
        summary,
    })
}
