//! Studentized range distribution.
//!
//! Cumulative distribution of the range of `n_means` standard normal
//! variables divided by an independent chi estimate with `df` degrees of
//! freedom, integrated with Gauss-Legendre quadrature
//! (Copenhaver & Holland, 1988).

use crate::stats::normal_cdf;
use statrs::function::gamma::ln_gamma;

const SQRT_2PI: f64 = 2.506_628_274_631_000_5;

const XLEG: [f64; 6] = [
    0.981_560_634_246_719_25,
    0.904_117_256_370_474_86,
    0.769_902_674_194_304_69,
    0.587_317_954_286_617_45,
    0.367_831_498_998_180_19,
    0.125_233_408_511_468_92,
];
const ALEG: [f64; 6] = [
    0.047_175_336_386_511_827,
    0.106_939_325_995_318_43,
    0.160_078_328_543_346_23,
    0.203_167_426_723_065_92,
    0.233_492_536_538_354_81,
    0.249_147_045_813_402_79,
];

const XLEGQ: [f64; 8] = [
    0.989_400_934_991_649_93,
    0.944_575_023_073_232_58,
    0.865_631_202_387_831_74,
    0.755_404_408_355_003_03,
    0.617_876_244_402_643_75,
    0.458_016_777_657_227_39,
    0.281_603_550_779_258_91,
    0.095_012_509_837_637_440,
];
const ALEGQ: [f64; 8] = [
    0.027_152_459_411_754_095,
    0.062_253_523_938_647_893,
    0.095_158_511_682_492_785,
    0.124_628_971_255_533_87,
    0.149_595_988_816_576_73,
    0.169_156_519_395_002_54,
    0.182_603_415_044_923_59,
    0.189_450_610_455_068_50,
];

/// Probability that the range of `n_means` standard normals is below `w`.
fn range_prob(w: f64, n_means: f64) -> f64 {
    const C1: f64 = -30.0;
    const C2: f64 = -50.0;
    const C3: f64 = 60.0;
    const UPPER: f64 = 8.0;
    const W_LARGE: f64 = 3.0;

    let half_w = w * 0.5;
    if half_w >= UPPER {
        return 1.0;
    }

    // First term of Hartley's form: (2 * Phi(w/2) - 1)^n_means.
    let mut prob = 2.0 * normal_cdf(half_w) - 1.0;
    prob = if prob >= (C2 / n_means).exp() {
        prob.powf(n_means)
    } else {
        0.0
    };

    // Second term, integrated over (w/2, 8) in two or three equal intervals.
    let n_intervals = if w > W_LARGE { 2 } else { 3 };
    let step = (UPPER - half_w) / n_intervals as f64;
    let exponent = n_means - 1.0;
    let mut lower = half_w;
    let mut integral = 0.0;
    for _ in 0..n_intervals {
        let upper = lower + step;
        let center = 0.5 * (upper + lower);
        let half_len = 0.5 * (upper - lower);

        let mut partial = 0.0;
        let nodes = XLEG
            .iter()
            .zip(&ALEG)
            .map(|(&x, &a)| (-x, a))
            .chain(XLEG.iter().zip(&ALEG).rev().map(|(&x, &a)| (x, a)));
        for (x, a) in nodes {
            let point = center + half_len * x;
            let point_2 = point * point;
            // Nodes are increasing, so the rest contribute nothing either.
            if point_2 > C3 {
                break;
            }
            let inner = normal_cdf(point) - normal_cdf(point - w);
            if inner >= (C1 / exponent).exp() {
                partial += a * (-0.5 * point_2).exp() * inner.powf(exponent);
            }
        }
        integral += partial * 2.0 * half_len * n_means / SQRT_2PI;
        lower = upper;
    }

    prob += integral;
    if prob <= C1.exp() {
        return 0.0;
    }
    prob.min(1.0)
}

/// Cumulative distribution function of the studentized range.
///
/// Returns `NaN` when `n_means < 2` or `df < 2`.
pub fn ptukey(q: f64, n_means: f64, df: f64) -> f64 {
    const EPS1: f64 = -30.0;
    const EPS2: f64 = 1.0e-14;
    const DF_LARGE: f64 = 25_000.0;
    const MAX_INTERVALS: usize = 50;

    if q.is_nan() || n_means < 2.0 || df < 2.0 {
        return f64::NAN;
    }
    if q <= 0.0 {
        return 0.0;
    }
    if q.is_infinite() {
        return 1.0;
    }
    if df > DF_LARGE {
        return range_prob(q, n_means);
    }

    let half_df = df * 0.5;
    let unit_len: f64 = if df <= 100.0 {
        1.0
    } else if df <= 800.0 {
        0.5
    } else if df <= 5000.0 {
        0.25
    } else {
        0.125
    };
    let log_const = half_df * df.ln() - df * std::f64::consts::LN_2 - ln_gamma(half_df)
        + unit_len.ln();
    let log_exp = half_df - 1.0;
    let quarter_df = df * 0.25;

    let mut total = 0.0;
    for i_interval in 1..=MAX_INTERVALS {
        let center = (2 * i_interval - 1) as f64 * unit_len;

        let mut partial = 0.0;
        for (&x, &a) in XLEGQ.iter().zip(&ALEGQ) {
            for offset in [-x * unit_len, x * unit_len] {
                let point = center + offset;
                let log_weight = log_const + log_exp * point.ln() - point * quarter_df;
                if log_weight >= EPS1 {
                    let w = q * (point * 0.5).sqrt();
                    partial += range_prob(w, n_means) * a * log_weight.exp();
                }
            }
        }

        // At least 1 / unit_len intervals to cover the left tail.
        if i_interval as f64 * unit_len >= 1.0 && partial <= EPS2 {
            break;
        }
        total += partial;
    }

    total.min(1.0)
}

/// Quantile function of the studentized range, found by bisection.
pub fn qtukey(prob: f64, n_means: f64, df: f64) -> f64 {
    if !(0.0..1.0).contains(&prob) || n_means < 2.0 || df < 2.0 {
        return f64::NAN;
    }

    let mut lower = 0.0;
    let mut upper = 1.0;
    while ptukey(upper, n_means, df) < prob {
        lower = upper;
        upper *= 2.0;
        if upper > 1.0e6 {
            return f64::NAN;
        }
    }

    for _ in 0..100 {
        let mid = 0.5 * (lower + upper);
        if ptukey(mid, n_means, df) < prob {
            lower = mid;
        } else {
            upper = mid;
        }
        if upper - lower < 1.0e-10 {
            break;
        }
    }
    0.5 * (lower + upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use statrs::distribution::{ContinuousCDF, StudentsT};

    #[test]
    fn two_means_reduce_to_students_t() {
        // The range of two normals is sqrt(2) times a |t| variable.
        for (q, df) in [(1.5, 5.0), (3.0, 12.0), (4.2, 40.0)] {
            let t_dist = StudentsT::new(0.0, 1.0, df).unwrap();
            let expected = 1.0 - 2.0 * t_dist.sf(q / std::f64::consts::SQRT_2);
            let actual = ptukey(q, 2.0, df);
            assert!(
                (actual - expected).abs() < 1e-5,
                "q = {q}, df = {df}: {actual} != {expected}"
            );
        }
    }

    #[test]
    fn matches_tabulated_critical_values() {
        // Upper 5% points of the studentized range.
        for (n_means, df, q_crit) in [(3.0, 10.0, 3.877), (4.0, 20.0, 3.958), (5.0, 60.0, 3.977)] {
            let prob = ptukey(q_crit, n_means, df);
            assert!((prob - 0.95).abs() < 1e-3, "k = {n_means}, df = {df}: {prob}");
        }
    }

    #[test]
    fn large_degrees_of_freedom_use_shorter_intervals() {
        for df in [150.0, 1_000.0, 6_000.0] {
            let t_dist = StudentsT::new(0.0, 1.0, df).unwrap();
            let expected = 1.0 - 2.0 * t_dist.sf(2.5 / std::f64::consts::SQRT_2);
            let actual = ptukey(2.5, 2.0, df);
            assert!((actual - expected).abs() < 1e-5, "df = {df}: {actual} != {expected}");
        }
        let prob = ptukey(3.356, 3.0, 120.0);
        assert!((prob - 0.95).abs() < 1e-3, "{prob}");
    }

    #[test]
    fn quantile_inverts_cdf() {
        let q_crit = qtukey(0.95, 3.0, 10.0);
        assert!((q_crit - 3.877).abs() < 1e-2);
        assert!((ptukey(q_crit, 3.0, 10.0) - 0.95).abs() < 1e-8);
    }

    #[test]
    fn edge_values() {
        assert_eq!(ptukey(0.0, 3.0, 10.0), 0.0);
        assert_eq!(ptukey(f64::INFINITY, 3.0, 10.0), 1.0);
        assert!(ptukey(1.0, 1.0, 10.0).is_nan());
        assert!(ptukey(50.0, 4.0, 30.0) > 0.999_999);
    }
}
