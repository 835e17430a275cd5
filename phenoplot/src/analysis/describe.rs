//! Descriptive statistics: the per-group summary table, plus the few
//! slice helpers the tests and box hinges need.

use polars::prelude::*;

use crate::helper_functions::require_columns;
use crate::models::AesMapping;

pub fn mean(xs: &[f64]) -> f64 {
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Linear-interpolation quantile on sorted data (Hyndman-Fan type 7).
pub fn quantile_sorted(sorted: &[f64], prob: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let h = (n - 1) as f64 * prob.clamp(0.0, 1.0);
            let lo = h.floor() as usize;
            let hi = h.ceil() as usize;
            sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
        }
    }
}

pub fn sorted_copy(xs: &[f64]) -> Vec<f64> {
    let mut v = xs.to_vec();
    v.sort_by(|a, b| a.total_cmp(b));
    v
}

/// `partition, group, n, mean, sd, median, min, max`, one row per
/// (partition, group) in first-appearance order. `partition` is null when
/// the mapping has no category column.
pub fn group_summary(df: &DataFrame, mapping: &AesMapping) -> PolarsResult<DataFrame> {
    require_columns(df, &mapping.columns())?;
    let partition = match &mapping.category {
        Some(c) => col(c.as_str()).cast(DataType::String),
        None => lit(NULL).cast(DataType::String),
    };
    let v = col("value");

    df.clone()
        .lazy()
        .select([
            partition.alias("partition"),
            col(mapping.group.as_str()).cast(DataType::String).alias("group"),
            col(mapping.value.as_str()).cast(DataType::Float64).alias("value"),
        ])
        .group_by_stable([col("partition"), col("group")])
        .agg([
            v.clone().count().alias("n"),
            v.clone().mean().alias("mean"),
            v.clone().std(1).alias("sd"),
            v.clone().median().alias("median"),
            v.clone().min().alias("min"),
            v.max().alias("max"),
        ])
        .collect()
}
