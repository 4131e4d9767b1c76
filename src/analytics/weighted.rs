//! Weighted ensemble statistics and the running accumulator used per lag.
//!
//! These are pure functions over parallel value/weight slices. Values and
//! weights are paired positionally; extra elements of the longer slice are
//! ignored.

/// Weighted mean `Σ(x·w) / Σw`.
///
/// Returns `f64::NAN` when the inputs are empty or the weights sum to zero;
/// callers drop such lags instead of emitting them.
pub fn weighted_mean(x: &[f64], w: &[f64]) -> f64 {
    let (sum_xw, sum_w) = x
        .iter()
        .zip(w)
        .fold((0.0, 0.0), |(sxw, sw), (&xi, &wi)| (sxw + xi * wi, sw + wi));

    if sum_w == 0.0 {
        return f64::NAN;
    }
    sum_xw / sum_w
}

/// Standard error of the weighted mean.
///
/// Uses the closed-form estimator
///
/// ```text
/// se² = n / ((n-1)·(Σw)²) · [ Σ(w·x − w̄·x̄)² − 2·x̄·Σ((w−w̄)·(w·x − w̄·x̄)) + x̄²·Σ(w−w̄)² ]
/// ```
///
/// with `w̄` the plain mean of the weights and `x̄` the weighted mean.
///
/// # Behavior
/// - A single observation has a standard error of `0.0`
/// - Empty input or zero total weight returns `f64::NAN`
/// - The bracket is a sum of squares; cancellation can leave it a hair below
///   zero, so it is clamped and the result is never negative
pub fn weighted_standard_error(x: &[f64], w: &[f64]) -> f64 {
    let n = x.len().min(w.len());
    if n == 0 {
        return f64::NAN;
    }

    let sum_w: f64 = w[..n].iter().sum();
    if sum_w == 0.0 {
        return f64::NAN;
    }
    if n == 1 {
        return 0.0;
    }

    let n_f = n as f64;
    let x_bar = weighted_mean(x, w);
    let w_bar = sum_w / n_f;

    let mut sum_wx_sq = 0.0;
    let mut sum_cross = 0.0;
    let mut sum_w_sq = 0.0;
    for (&xi, &wi) in x.iter().zip(w) {
        let wx = wi * xi - w_bar * x_bar;
        let dw = wi - w_bar;
        sum_wx_sq += wx * wx;
        sum_cross += dw * wx;
        sum_w_sq += dw * dw;
    }

    let bracket = sum_wx_sq - 2.0 * x_bar * sum_cross + x_bar * x_bar * sum_w_sq;
    let variance = n_f / ((n_f - 1.0) * sum_w * sum_w) * bracket;
    variance.max(0.0).sqrt()
}

/// Weighted standard deviation with the reliability-weight correction
/// `Σw / ((Σw)² − Σw²)`.
///
/// Returns `0.0` when the correction is undefined (a single non-zero weight).
pub fn weighted_std(x: &[f64], w: &[f64]) -> f64 {
    let mean = weighted_mean(x, w);
    if mean.is_nan() {
        return f64::NAN;
    }

    let (sum_w, sum_w2, sum_dev) =
        x.iter()
            .zip(w)
            .fold((0.0, 0.0, 0.0), |(sw, sw2, sd), (&xi, &wi)| {
                (sw + wi, sw2 + wi * wi, sd + wi * (xi - mean).powi(2))
            });

    let denominator = sum_w * sum_w - sum_w2;
    if denominator <= 0.0 {
        return 0.0;
    }
    (sum_w / denominator * sum_dev).max(0.0).sqrt()
}

/// Welford running mean and second moment.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Running mean, `NaN` before the first value.
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Population standard deviation of the pushed values.
    pub fn std_dev(&self) -> f64 {
        if self.count == 0 {
            return f64::NAN;
        }
        (self.m2 / self.count as f64).max(0.0).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn weighted_mean_with_equal_weights_is_arithmetic_mean() {
        let x = [1.0, 2.0, 6.0];
        assert!((weighted_mean(&x, &[2.0, 2.0, 2.0]) - 3.0).abs() < 1e-12);
        assert_eq!(weighted_mean(&[7.5], &[1.0]), 7.5);
    }

    #[test]
    fn weighted_mean_zero_weight_is_nan() {
        assert!(weighted_mean(&[1.0, 2.0], &[0.0, 0.0]).is_nan());
        assert!(weighted_mean(&[], &[]).is_nan());
    }

    #[test]
    fn weighted_mean_favors_heavier_observations() {
        let result = weighted_mean(&[1.0, 4.0], &[3.0, 1.0]);
        assert!((result - 1.75).abs() < 1e-12);
    }

    #[test]
    fn standard_error_single_observation_is_zero() {
        assert_eq!(weighted_standard_error(&[3.0], &[5.0]), 0.0);
    }

    #[test]
    fn standard_error_of_identical_values_is_zero() {
        let se = weighted_standard_error(&[4.0, 4.0, 4.0], &[1.0, 2.0, 5.0]);
        assert!(se.abs() < 1e-12);
    }

    #[test]
    fn standard_error_matches_closed_form() {
        // Bracket reduces to Σ w²(x − x̄)²: x̄ = 1.75, terms 9·0.5625 + 1·5.0625
        let x = [1.0, 4.0];
        let w = [3.0, 1.0];
        let expected = (2.0 / (1.0 * 16.0) * (9.0 * 0.5625 + 5.0625_f64)).sqrt();
        assert!((weighted_standard_error(&x, &w) - expected).abs() < 1e-12);
    }

    #[test]
    fn standard_error_with_equal_weights_is_sample_sem() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let w = [1.0; 4];
        // sample std = sqrt(5/3), sem = std / sqrt(4)
        let expected = (5.0_f64 / 3.0).sqrt() / 2.0;
        assert!((weighted_standard_error(&x, &w) - expected).abs() < 1e-12);
    }

    #[test]
    fn weighted_std_single_weight_is_zero() {
        assert_eq!(weighted_std(&[2.0], &[4.0]), 0.0);
    }

    #[test]
    fn weighted_std_equal_unit_weights_is_sample_std() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let result = weighted_std(&x, &[1.0; 4]);
        assert!((result - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn running_stats_tracks_mean_and_population_std() {
        let mut stats = RunningStats::new();
        assert!(stats.mean().is_nan());
        for value in [1.0, 2.0, 3.0] {
            stats.push(value);
        }
        assert_eq!(stats.count(), 3);
        assert!((stats.mean() - 2.0).abs() < 1e-12);
        assert!((stats.std_dev() - 0.816496580927726).abs() < 1e-12);
    }

    fn observations(max_len: usize) -> impl Strategy<Value = Vec<(f64, f64)>> {
        proptest::collection::vec((-1e6_f64..1e6, 1e-3_f64..1e4), 2..=max_len)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn standard_error_is_never_negative(pairs in observations(60)) {
            let (x, w): (Vec<f64>, Vec<f64>) = pairs.into_iter().unzip();
            let se = weighted_standard_error(&x, &w);
            prop_assert!(se >= 0.0, "standard error must be >= 0, got {}", se);
        }

        #[test]
        fn equal_weights_reduce_to_arithmetic_mean(
            x in proptest::collection::vec(-1e6_f64..1e6, 1..50),
            weight in 1e-3_f64..1e3,
        ) {
            let w = vec![weight; x.len()];
            let arithmetic = x.iter().sum::<f64>() / x.len() as f64;
            let weighted = weighted_mean(&x, &w);
            let scale = x.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
            prop_assert!((weighted - arithmetic).abs() <= 1e-9 * scale);
        }
    }
}
