//! Multiple-testing adjustment and significance symbols.

/// Bonferroni-adjust the pairwise p-values of one partition.
///
/// `m` counts the finite entries only, so a NaN contrast neither inflates
/// the others nor gets a value of its own.
pub fn bonferroni(raw: &[f64]) -> Vec<f64> {
    let m = raw.iter().filter(|p| p.is_finite()).count() as f64;
    raw.iter()
        .map(|&p| if m == 0.0 || p.is_nan() { f64::NAN } else { (p * m).min(1.0) })
        .collect()
}

/// `***` below 0.001, `**` below 0.01, `*` below 0.05, `ns` otherwise.
pub fn significance_label(p: f64) -> &'static str {
    if p < 0.001 {
        "***"
    } else if p < 0.01 {
        "**"
    } else if p < 0.05 {
        "*"
    } else {
        "ns"
    }
}
