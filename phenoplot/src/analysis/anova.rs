//! One-way analysis of variance of a value against a grouping factor.

use polars::prelude::*;
use statrs::distribution::{ContinuousCDF, FisherSnedecor};
use tracing::debug;

use crate::analysis::describe::mean;
use crate::models::{polars_err, AnovaTable};

/// Check the preconditions shared by ANOVA and Tukey HSD: at least two
/// groups, at least two finite observations in each.
pub fn validate_groups(groups: &[(String, Vec<f64>)]) -> PolarsResult<()> {
    if groups.len() < 2 {
        return Err(PolarsError::ComputeError(
            format!("ANOVA needs at least 2 groups, got {}", groups.len()).into(),
        ));
    }
    for (label, xs) in groups {
        if xs.len() < 2 {
            return Err(PolarsError::ComputeError(
                format!(
                    "group `{label}` has {} observation(s); at least 2 are required",
                    xs.len()
                )
                .into(),
            ));
        }
        if let Some(bad) = xs.iter().find(|v| !v.is_finite()) {
            return Err(PolarsError::ComputeError(
                format!("group `{label}` contains non-finite value {bad}").into(),
            ));
        }
    }
    Ok(())
}

pub fn one_way_anova(groups: &[(String, Vec<f64>)]) -> PolarsResult<AnovaTable> {
    validate_groups(groups)?;

    let n_total: usize = groups.iter().map(|(_, xs)| xs.len()).sum();
    let k = groups.len();
    let grand_mean = groups.iter().flat_map(|(_, xs)| xs.iter()).sum::<f64>() / n_total as f64;

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for (_, xs) in groups {
        let m = mean(xs);
        ss_between += xs.len() as f64 * (m - grand_mean).powi(2);
        ss_within += xs.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    }

    let df_between = k - 1;
    let df_within = n_total - k;
    if ss_within <= 0.0 {
        return Err(PolarsError::ComputeError(
            "residual sum of squares is zero; groups have no within-group variance".into(),
        ));
    }

    let f_value = (ss_between / df_between as f64) / (ss_within / df_within as f64);
    let f_dist = FisherSnedecor::new(df_between as f64, df_within as f64)
        .map_err(|e| polars_err(Box::new(e)))?;
    let p_value = f_dist.sf(f_value);

    debug!(
        "ANOVA: F({df_between}, {df_within}) = {f_value:.4}, p = {p_value:.4e}"
    );

    Ok(AnovaTable {
        partition: None,
        df_between,
        df_within,
        ss_between,
        ss_within,
        f_value,
        p_value,
    })
}
