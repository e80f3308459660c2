use statrs::function::erf::erfc;

/// Running mean and variance (Welford's algorithm) plus extrema.
pub struct Accumulator {
    n_vals: usize,
    mean: f64,
    diff_2_sum: f64,
    min: f64,
    max: f64,
}

impl Accumulator {
    pub fn new() -> Self {
        Self {
            n_vals: 0,
            mean: 0.0,
            diff_2_sum: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn from_vals(vals: &[f64]) -> Self {
        let mut acc = Self::new();
        vals.iter().for_each(|&val| acc.add(val));
        acc
    }

    pub fn add(&mut self, val: f64) {
        self.n_vals += 1;

        let diff_a = val - self.mean;
        self.mean += diff_a / self.n_vals as f64;

        let diff_b = val - self.mean;
        self.diff_2_sum += diff_a * diff_b;

        self.min = self.min.min(val);
        self.max = self.max.max(val);
    }

    pub fn n_vals(&self) -> usize {
        self.n_vals
    }

    pub fn mean(&self) -> f64 {
        if self.n_vals > 0 { self.mean } else { f64::NAN }
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sum of squared deviations from the mean.
    pub fn sum_sq_dev(&self) -> f64 {
        self.diff_2_sum
    }

    /// Variance with an `n - 1` denominator.
    pub fn sample_var(&self) -> Option<f64> {
        (self.n_vals > 1).then(|| self.diff_2_sum / (self.n_vals as f64 - 1.0))
    }

    /// Variance with an `n` denominator.
    pub fn pop_var(&self) -> Option<f64> {
        (self.n_vals > 0).then(|| self.diff_2_sum / self.n_vals as f64)
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

/// Percentile of sorted values, interpolating linearly between order statistics.
pub fn compute_percentile(sorted: &[f64], frac: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n_vals => {
            let pos = frac.clamp(0.0, 1.0) * (n_vals - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

pub fn compute_median(vals: &[f64]) -> f64 {
    let mut sorted = vals.to_vec();
    sorted.sort_by(f64::total_cmp);
    compute_percentile(&sorted, 0.5)
}

/// Ranks starting at 1, ties sharing their average rank.
///
/// Also returns the tie term `sum(t^3 - t)` over every run of `t` equal values.
pub fn compute_ranks(vals: &[f64]) -> (Vec<f64>, f64) {
    let mut order: Vec<usize> = (0..vals.len()).collect();
    order.sort_by(|&a, &b| vals[a].total_cmp(&vals[b]));

    let mut ranks = vec![0.0; vals.len()];
    let mut tie_term = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && vals[order[end]] == vals[order[start]] {
            end += 1;
        }
        // Positions start..end hold equal values.
        let avg_rank = (start + end + 1) as f64 / 2.0;
        for &idx in &order[start..end] {
            ranks[idx] = avg_rank;
        }
        let run = (end - start) as f64;
        tie_term += run.powi(3) - run;
        start = end;
    }

    (ranks, tie_term)
}

/// Standard normal cumulative distribution function.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulator_matches_two_pass() {
        let vals = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let acc = Accumulator::from_vals(&vals);
        assert_eq!(acc.n_vals(), 8);
        assert!((acc.mean() - 5.0).abs() < 1e-12);
        assert!((acc.pop_var().unwrap() - 4.0).abs() < 1e-12);
        assert!((acc.sample_var().unwrap() - 32.0 / 7.0).abs() < 1e-12);
        assert_eq!(acc.min(), 2.0);
        assert_eq!(acc.max(), 9.0);
    }

    #[test]
    fn single_value_has_no_sample_variance() {
        let acc = Accumulator::from_vals(&[3.0]);
        assert_eq!(acc.sample_var(), None);
        assert_eq!(acc.pop_var(), Some(0.0));
    }

    #[test]
    fn percentiles_interpolate() {
        let sorted = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(compute_percentile(&sorted, 0.25), 1.75);
        assert_eq!(compute_percentile(&sorted, 0.5), 2.5);
        assert_eq!(compute_percentile(&sorted, 0.75), 3.25);
        assert_eq!(compute_median(&[5.0, 1.0, 3.0]), 3.0);
    }

    #[test]
    fn ranks_average_ties() {
        let (ranks, tie_term) = compute_ranks(&[10.0, 20.0, 10.0, 30.0]);
        assert_eq!(ranks, vec![1.5, 3.0, 1.5, 4.0]);
        assert_eq!(tie_term, 6.0);
    }

    #[test]
    fn normal_cdf_reference_values() {
        assert!((normal_cdf(0.0) - 0.5).abs() < 1e-12);
        assert!((normal_cdf(1.959963984540054) - 0.975).abs() < 1e-9);
    }
}
