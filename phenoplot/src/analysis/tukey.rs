//! Studentized range distribution and Tukey's honest significant
//! difference test.
//!
//! The distribution function integrates the range of `k` standard normals
//! (`range_prob`) against the chi distribution of the variance estimate
//! with Gauss-Legendre quadrature (Copenhaver & Holland, 1988).

use polars::prelude::*;
use statrs::function::erf::erf;
use statrs::function::gamma::ln_gamma;

use crate::analysis::describe::mean;

const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

// Abscissae/weights of the 12-point rule, positive half.
const LEG12_X: [f64; 6] = [
    0.981_560_634_246_719_3,
    0.904_117_256_370_474_9,
    0.769_902_674_194_304_7,
    0.587_317_954_286_617_4,
    0.367_831_498_998_180_2,
    0.125_233_408_511_468_9,
];
const LEG12_W: [f64; 6] = [
    0.047_175_336_386_511_83,
    0.106_939_325_995_318_4,
    0.160_078_328_543_346_2,
    0.203_167_426_723_065_9,
    0.233_492_536_538_354_8,
    0.249_147_045_813_402_8,
];

// Abscissae/weights of the 16-point rule, positive half.
const LEG16_X: [f64; 8] = [
    0.989_400_934_991_649_9,
    0.944_575_023_073_232_6,
    0.865_631_202_387_831_7,
    0.755_404_408_355_003,
    0.617_876_244_402_643_7,
    0.458_016_777_657_227_4,
    0.281_603_550_779_258_9,
    0.095_012_509_837_637_44,
];
const LEG16_W: [f64; 8] = [
    0.027_152_459_411_754_09,
    0.062_253_523_938_647_89,
    0.095_158_511_682_492_78,
    0.124_628_971_255_533_9,
    0.149_595_988_816_576_7,
    0.169_156_519_395_002_5,
    0.182_603_415_044_923_6,
    0.189_450_610_455_068_5,
];

fn pnorm(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// P(range of `k` iid standard normals < `w`).
fn range_prob(w: f64, k: f64) -> f64 {
    const UPPER: f64 = 8.0;
    const LOG_FLOOR: f64 = -30.0;
    const EXP_CAP: f64 = 60.0;

    let half = w * 0.5;
    if half >= UPPER {
        return 1.0;
    }

    // Probability that all k fall in (-w/2, w/2).
    let mut pr = erf(half / std::f64::consts::SQRT_2);
    pr = if pr >= 1.0 { 1.0 } else { pr.powf(k) };

    let intervals = if w > 3.0 { 2 } else { 3 };
    let width = (UPPER - half) / intervals as f64;
    let km1 = k - 1.0;
    let floor = (LOG_FLOOR / km1).exp();

    let mut lo = half;
    let mut tail = 0.0;
    for _ in 0..intervals {
        let hi = lo + width;
        let centre = 0.5 * (hi + lo);
        let radius = 0.5 * (hi - lo);
        let mut acc = 0.0;
        for jj in 0..12 {
            let (x, wt) = if jj < 6 {
                (-LEG12_X[jj], LEG12_W[jj])
            } else {
                (LEG12_X[11 - jj], LEG12_W[11 - jj])
            };
            let u = centre + radius * x;
            let u2 = u * u;
            if u2 > EXP_CAP {
                break;
            }
            let inner = pnorm(u) - pnorm(u - w);
            if inner >= floor {
                acc += wt * (-0.5 * u2).exp() * inner.powf(km1);
            }
        }
        tail += acc * (2.0 * radius) * k * INV_SQRT_2PI;
        lo = hi;
    }

    pr += tail;
    if pr <= (LOG_FLOOR).exp() {
        return 0.0;
    }
    pr.min(1.0)
}

/// Lower-tail distribution function of the studentized range for `k`
/// means and `df` residual degrees of freedom.
pub fn ptukey(q: f64, k: usize, df: f64) -> f64 {
    if q.is_nan() || k < 2 || df < 2.0 {
        return f64::NAN;
    }
    if q <= 0.0 {
        return 0.0;
    }
    if q.is_infinite() {
        return 1.0;
    }
    let k = k as f64;
    if df > 25_000.0 {
        return range_prob(q, k);
    }

    let half_df = df * 0.5;
    let step: f64 = if df <= 100.0 {
        1.0
    } else if df <= 800.0 {
        0.5
    } else if df <= 5_000.0 {
        0.25
    } else {
        0.125
    };
    let log_norm = half_df * df.ln() - df * std::f64::consts::LN_2 - ln_gamma(half_df) + step.ln();
    let hdm1 = half_df - 1.0;
    let quarter_df = df * 0.25;

    let mut total = 0.0;
    for i in 1..=50 {
        let mid = (2 * i - 1) as f64 * step;
        let mut block = 0.0;
        for jj in 0..16 {
            let (offset, wt) = if jj < 8 {
                (-LEG16_X[jj] * step, LEG16_W[jj])
            } else {
                (LEG16_X[jj - 8] * step, LEG16_W[jj - 8])
            };
            let u = mid + offset;
            let log_dens = log_norm + hdm1 * u.ln() - u * quarter_df;
            if log_dens >= -30.0 {
                let scaled = q * (u * 0.5).sqrt();
                block += range_prob(scaled, k) * wt * log_dens.exp();
            }
        }
        if i as f64 * step >= 1.0 && block <= 1e-14 {
            break;
        }
        total += block;
    }
    total.min(1.0)
}

/// Quantile of the studentized range, found by bisection on `ptukey`.
pub fn qtukey(p: f64, k: usize, df: f64) -> f64 {
    if !(0.0..1.0).contains(&p) || k < 2 || df < 2.0 {
        return f64::NAN;
    }
    if p == 0.0 {
        return 0.0;
    }
    let mut hi = 1.0;
    while ptukey(hi, k, df) < p {
        hi *= 2.0;
        if hi > 1e6 {
            return f64::INFINITY;
        }
    }
    let mut lo = 0.0;
    for _ in 0..60 {
        let mid = 0.5 * (lo + hi);
        if ptukey(mid, k, df) < p {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    0.5 * (lo + hi)
}

/// One Tukey HSD contrast: `diff = mean(b) - mean(a)`.
#[derive(Debug, Clone, PartialEq)]
pub struct TukeyContrast {
    pub a: usize,
    pub b: usize,
    pub diff: f64,
    pub lwr: f64,
    pub upr: f64,
    pub p_adj: f64,
}

/// All pairwise contrasts in level order (`(0,1), (0,2), ..., (k-2,k-1)`),
/// with Tukey-Kramer standard errors for unequal group sizes.
pub fn tukey_hsd(
    groups: &[(String, Vec<f64>)],
    ms_within: f64,
    df_within: usize,
    conf_level: f64,
) -> PolarsResult<Vec<TukeyContrast>> {
    let k = groups.len();
    if k < 2 || df_within < 2 || !(ms_within.is_finite() && ms_within > 0.0) {
        return Err(PolarsError::ComputeError(
            format!("Tukey HSD undefined for k = {k}, df = {df_within}, MSE = {ms_within}").into(),
        ));
    }
    let df = df_within as f64;
    let crit = qtukey(conf_level, k, df);
    let means: Vec<f64> = groups.iter().map(|(_, xs)| mean(xs)).collect();

    let mut out = Vec::with_capacity(k * (k - 1) / 2);
    for a in 0..k {
        for b in (a + 1)..k {
            let na = groups[a].1.len() as f64;
            let nb = groups[b].1.len() as f64;
            let se = (ms_within * 0.5 * (1.0 / na + 1.0 / nb)).sqrt();
            let diff = means[b] - means[a];
            let p_adj = (1.0 - ptukey(diff.abs() / se, k, df)).clamp(0.0, 1.0);
            out.push(TukeyContrast {
                a,
                b,
                diff,
                lwr: diff - crit * se,
                upr: diff + crit * se,
                p_adj,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

    #[test]
    fn two_means_reduce_to_students_t() {
        // Range of two means: q = sqrt(2) * |t|
        for &(q, df) in &[(1.0, 5.0), (2.5, 10.0), (3.151064, 10.0), (4.0, 40.0)] {
            let t = StudentsT::new(0.0, 1.0, df).unwrap();
            let expected = 2.0 * t.cdf(q / 2f64.sqrt()) - 1.0;
            assert!(
                (ptukey(q, 2, df) - expected).abs() < 1e-5,
                "q = {q}, df = {df}"
            );
        }
    }

    #[test]
    fn large_df_uses_normal_range() {
        let n = Normal::new(0.0, 1.0).unwrap();
        let q = 2.77;
        let expected = 2.0 * n.cdf(q / 2f64.sqrt()) - 1.0;
        assert!((ptukey(q, 2, 1e6) - expected).abs() < 1e-6);
    }

    #[test]
    fn critical_values_match_tables() {
        // q(0.95; k, df) from standard studentized range tables
        assert!((qtukey(0.95, 3, 10.0) - 3.877).abs() < 5e-3);
        assert!((qtukey(0.95, 3, 20.0) - 3.578).abs() < 5e-3);
        assert!((qtukey(0.95, 4, 20.0) - 3.958).abs() < 5e-3);
        assert!((qtukey(0.95, 2, 10.0) - 3.151).abs() < 5e-3);
        assert!((qtukey(0.95, 3, 12.0) - 3.773).abs() < 1e-3);
        assert!((qtukey(0.99, 4, 5.0) - 7.804).abs() < 1e-3);
    }

    #[test]
    fn every_integration_step_width_agrees_with_t() {
        // df tiers 100 / 800 / 5000 / 25000 use different outer step sizes
        for &df in &[60.0, 300.0, 2_000.0, 10_000.0] {
            let t = StudentsT::new(0.0, 1.0, df).unwrap();
            let q = 2.9;
            let expected = 2.0 * t.cdf(q / 2f64.sqrt()) - 1.0;
            assert!((ptukey(q, 2, df) - expected).abs() < 1e-5, "df = {df}");
        }
    }

    #[test]
    fn cdf_is_monotone_and_bounded() {
        let mut prev = 0.0;
        for i in 0..40 {
            let p = ptukey(i as f64 * 0.25, 3, 12.0);
            assert!(p >= prev - 1e-12);
            assert!((0.0..=1.0).contains(&p));
            prev = p;
        }
        assert_eq!(ptukey(-1.0, 3, 12.0), 0.0);
        assert!(ptukey(1.0, 1, 12.0).is_nan());
    }

    #[test]
    fn hsd_contrasts_in_level_order() {
        let groups = vec![
            ("A".to_string(), vec![1.0, 2.0, 3.0]),
            ("B".to_string(), vec![2.0, 3.0, 4.0]),
            ("C".to_string(), vec![5.0, 6.0, 7.0]),
        ];
        let out = tukey_hsd(&groups, 1.0, 6, 0.95).unwrap();
        let pairs: Vec<(usize, usize)> = out.iter().map(|c| (c.a, c.b)).collect();
        assert_eq!(pairs, vec![(0, 1), (0, 2), (1, 2)]);
        assert!((out[1].diff - 4.0).abs() < 1e-12);
        // The A-C difference is the largest, so it is the most significant.
        assert!(out[1].p_adj < out[2].p_adj && out[2].p_adj < out[0].p_adj);
        for c in &out {
            assert!(c.lwr < c.diff && c.diff < c.upr);
        }
    }

    #[test]
    fn hsd_rejects_degenerate_error_term() {
        let groups = vec![
            ("A".to_string(), vec![1.0, 2.0]),
            ("B".to_string(), vec![2.0, 3.0]),
        ];
        assert!(tukey_hsd(&groups, 0.0, 2, 0.95).is_err());
    }
}
