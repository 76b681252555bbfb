//! Cyclical volatility and volatility relative to a base variable

use crate::error::{CycleError, CycleResult};
use crate::types::{Series, VolatilityRow, VolatilityTable};

/// Sample standard deviation (n - 1 denominator) of a gap-free series
pub fn sample_std(series: &Series) -> CycleResult<f64> {
    let values = series.complete_values()?;
    let n = values.len();
    if n < 2 {
        return Err(CycleError::InsufficientData {
            series: series.name.clone(),
            len: n,
            required: 2,
        });
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    Ok((ss / (n - 1) as f64).sqrt())
}

/// Absolute volatility of each `(variable, cycle)` pair, in input order
pub fn absolute_volatilities(cycles: &[(String, Series)]) -> CycleResult<Vec<(String, f64)>> {
    cycles
        .iter()
        .map(|(name, cycle)| Ok((name.clone(), sample_std(cycle)?)))
        .collect()
}

/// Divide each volatility by the base variable's volatility.
///
/// Fails with `DegenerateBase` when the base is absent or its volatility is
/// exactly zero.
pub fn relative_volatility(volatilities: &[(String, f64)], base: &str) -> CycleResult<VolatilityTable> {
    let base_vol = volatilities
        .iter()
        .find(|(name, _)| name == base)
        .map(|(_, v)| *v)
        .ok_or_else(|| CycleError::degenerate_base(base, "is not among the analyzed variables"))?;
    if base_vol == 0.0 {
        return Err(CycleError::degenerate_base(base, "has zero cyclical volatility"));
    }

    let rows = volatilities
        .iter()
        .map(|(name, vol)| VolatilityRow {
            variable: name.clone(),
            absolute: *vol,
            relative: if name == base { 1.0 } else { vol / base_vol },
        })
        .collect();
    Ok(VolatilityTable {
        base: base.to_string(),
        rows,
    })
}

/// Absolute and relative volatility of a set of cycles in one step
pub fn volatility_table(cycles: &[(String, Series)], base: &str) -> CycleResult<VolatilityTable> {
    relative_volatility(&absolute_volatilities(cycles)?, base)
}
