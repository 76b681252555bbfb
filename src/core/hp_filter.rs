//! Hodrick-Prescott trend/cycle decomposition
//!
//! The trend `tau` minimizes
//!
//! ```text
//! sum_t (y_t - tau_t)^2 + lambda * sum_t (tau_{t+1} - 2 tau_t + tau_{t-1})^2
//! ```
//!
//! which is the solution of `(I + lambda * K'K) tau = y`, where `K` is the
//! `(n-2) x n` second-difference operator. The system matrix is symmetric,
//! positive definite and pentadiagonal, so it is factored with a banded
//! Cholesky decomposition in O(n).

use crate::error::{CycleError, CycleResult};
use crate::types::{Decomposition, Series};
use serde::{Deserialize, Serialize};

/// Smoothing parameter for quarterly data
pub const QUARTERLY_LAMBDA: f64 = 1600.0;
/// Smoothing parameter for annual data (Ravn-Uhlig)
pub const ANNUAL_LAMBDA: f64 = 6.25;
/// Smoothing parameter for monthly data
pub const MONTHLY_LAMBDA: f64 = 129_600.0;

/// Sampling frequency of a series, which sets the conventional lambda
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Annual,
    #[default]
    Quarterly,
    Monthly,
}

impl Frequency {
    pub fn lambda(self) -> f64 {
        match self {
            Frequency::Annual => ANNUAL_LAMBDA,
            Frequency::Quarterly => QUARTERLY_LAMBDA,
            Frequency::Monthly => MONTHLY_LAMBDA,
        }
    }
}

/// Minimum number of observations for a second difference to exist
pub const MIN_POINTS: usize = 3;

/// Split a gap-free series into trend and cycle
pub fn hp_filter(series: &Series, lambda: f64) -> CycleResult<Decomposition> {
    if series.len() < MIN_POINTS {
        return Err(CycleError::InsufficientData {
            series: series.name.clone(),
            len: series.len(),
            required: MIN_POINTS,
        });
    }
    let values = series.complete_values()?;
    let trend = hp_trend(&values, lambda)?;

    let periods = series.periods();
    let cycle: Vec<f64> = values.iter().zip(&trend).map(|(y, t)| y - t).collect();
    Ok(Decomposition {
        trend: Series::from_values(format!("{} trend", series.name), &periods, &trend),
        cycle: Series::from_values(format!("{} cycle", series.name), &periods, &cycle),
        lambda,
    })
}

/// HP trend of raw values
pub fn hp_trend(y: &[f64], lambda: f64) -> CycleResult<Vec<f64>> {
    if !lambda.is_finite() || lambda < 0.0 {
        return Err(CycleError::Numerical(format!(
            "smoothing parameter must be finite and non-negative, got {lambda}"
        )));
    }
    if y.iter().any(|v| !v.is_finite()) {
        return Err(CycleError::Numerical(
            "HP filter input contains a non-finite value".to_string(),
        ));
    }
    let n = y.len();
    if n < MIN_POINTS {
        return Err(CycleError::InsufficientData {
            series: "hp input".to_string(),
            len: n,
            required: MIN_POINTS,
        });
    }

    let (diag, sup1, sup2) = system_bands(n, lambda);
    let factor = BandedCholesky::factor(&diag, &sup1, &sup2)?;
    Ok(factor.solve(y))
}

/// Bands of `I + lambda * K'K`: main diagonal and the two superdiagonals
fn system_bands(n: usize, lambda: f64) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let mut diag = vec![0.0; n];
    let mut sup1 = vec![0.0; n - 1];
    let mut sup2 = vec![0.0; n - 2];

    // Each row of K is (1, -2, 1) starting at column i
    const STENCIL: [f64; 3] = [1.0, -2.0, 1.0];
    for i in 0..n - 2 {
        for a in 0..3 {
            for b in a..3 {
                let v = STENCIL[a] * STENCIL[b];
                match b - a {
                    0 => diag[i + a] += v,
                    1 => sup1[i + a] += v,
                    _ => sup2[i + a] += v,
                }
            }
        }
    }

    for d in &mut diag {
        *d = 1.0 + lambda * *d;
    }
    for e in &mut sup1 {
        *e *= lambda;
    }
    for f in &mut sup2 {
        *f *= lambda;
    }
    (diag, sup1, sup2)
}

/// `A = L L'` for a symmetric pentadiagonal `A`; row `i` of `L` holds
/// `l2[i]` at column i-2, `l1[i]` at i-1 and `l0[i]` on the diagonal
struct BandedCholesky {
    l0: Vec<f64>,
    l1: Vec<f64>,
    l2: Vec<f64>,
}

impl BandedCholesky {
    fn factor(diag: &[f64], sup1: &[f64], sup2: &[f64]) -> CycleResult<Self> {
        let n = diag.len();
        let mut l0 = vec![0.0; n];
        let mut l1 = vec![0.0; n];
        let mut l2 = vec![0.0; n];

        for i in 0..n {
            if i >= 2 {
                l2[i] = sup2[i - 2] / l0[i - 2];
            }
            if i >= 1 {
                l1[i] = (sup1[i - 1] - l2[i] * l1[i - 1]) / l0[i - 1];
            }
            let pivot = diag[i] - l1[i] * l1[i] - l2[i] * l2[i];
            if !(pivot > 0.0) {
                return Err(CycleError::Numerical(format!(
                    "HP system is not positive definite at row {i}"
                )));
            }
            l0[i] = pivot.sqrt();
        }
        Ok(Self { l0, l1, l2 })
    }

    fn solve(&self, rhs: &[f64]) -> Vec<f64> {
        let n = rhs.len();

        // L z = rhs
        let mut z = vec![0.0; n];
        for i in 0..n {
            let mut acc = rhs[i];
            if i >= 1 {
                acc -= self.l1[i] * z[i - 1];
            }
            if i >= 2 {
                acc -= self.l2[i] * z[i - 2];
            }
            z[i] = acc / self.l0[i];
        }

        // L' x = z
        let mut x = vec![0.0; n];
        for i in (0..n).rev() {
            let mut acc = z[i];
            if i + 1 < n {
                acc -= self.l1[i + 1] * x[i + 1];
            }
            if i + 2 < n {
                acc -= self.l2[i + 2] * x[i + 2];
            }
            x[i] = acc / self.l0[i];
        }
        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::periods;

    fn series(values: &[f64]) -> Series {
        let labels: Vec<String> = (0..values.len()).map(|i| format!("t{i}")).collect();
        Series::from_values("y", &periods(&labels), values)
    }

    #[test]
    fn test_three_points_matches_hand_solution() {
        // (I + K'K) tau = (0, 1, 0) gives tau = (2/7, 3/7, 2/7)
        let trend = hp_trend(&[0.0, 1.0, 0.0], 1.0).unwrap();
        assert!((trend[0] - 2.0 / 7.0).abs() < 1e-12);
        assert!((trend[1] - 3.0 / 7.0).abs() < 1e-12);
        assert!((trend[2] - 2.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_linear_series_is_its_own_trend() {
        let y: Vec<f64> = (0..40).map(|t| 3.0 + 0.5 * t as f64).collect();
        let d = hp_filter(&series(&y), QUARTERLY_LAMBDA).unwrap();
        for c in d.cycle.complete_values().unwrap() {
            assert!(c.abs() < 1e-6, "cycle {c} should vanish");
        }
    }

    #[test]
    fn test_trend_plus_cycle_reconstructs_series() {
        let y: Vec<f64> = (0..60)
            .map(|t| 100.0 + t as f64 + 5.0 * (t as f64 / 3.0).sin())
            .collect();
        let d = hp_filter(&series(&y), QUARTERLY_LAMBDA).unwrap();
        let trend = d.trend.complete_values().unwrap();
        let cycle = d.cycle.complete_values().unwrap();
        for i in 0..y.len() {
            assert!(((trend[i] + cycle[i]) - y[i]).abs() <= 1e-6 * y[i].abs());
        }
        assert_eq!(d.trend.periods(), d.cycle.periods());
        assert_eq!(d.len(), y.len());
    }

    #[test]
    fn test_cycle_sums_to_zero() {
        let y: Vec<f64> = (0..25).map(|t| ((t * 7) % 5) as f64 + t as f64).collect();
        let d = hp_filter(&series(&y), 100.0).unwrap();
        let total: f64 = d.cycle.complete_values().unwrap().iter().sum();
        assert!(total.abs() < 1e-8);
    }

    #[test]
    fn test_zero_lambda_keeps_series() {
        let y = [4.0, 1.0, 7.0, 2.0];
        let trend = hp_trend(&y, 0.0).unwrap();
        for (a, b) in trend.iter().zip(y) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_short_series_rejected() {
        match hp_filter(&series(&[1.0, 2.0]), QUARTERLY_LAMBDA) {
            Err(CycleError::InsufficientData { len, required, .. }) => {
                assert_eq!((len, required), (2, 3));
            }
            other => panic!("Expected InsufficientData, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_values_rejected() {
        let s = Series::from_options("y", &periods(&["a", "b", "c"]), vec![Some(1.0), None, Some(2.0)]);
        assert!(matches!(
            hp_filter(&s, QUARTERLY_LAMBDA),
            Err(CycleError::MissingValues { .. })
        ));
    }

    #[test]
    fn test_frequency_lambdas() {
        assert_eq!(Frequency::default().lambda(), 1600.0);
        assert_eq!(Frequency::Annual.lambda(), 6.25);
        assert_eq!(Frequency::Monthly.lambda(), 129_600.0);
    }

    #[test]
    fn test_negative_lambda_rejected() {
        assert!(matches!(
            hp_trend(&[1.0, 2.0, 3.0], -1.0),
            Err(CycleError::Numerical(_))
        ));
    }
}
