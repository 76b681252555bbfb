//! Deflators, real series, log growth rates and related summaries

use crate::error::{CycleError, CycleResult};
use crate::types::{IdentityCheck, Period, RegionTable, Series};

/// Implicit deflator: `nominal / real * 100`
pub fn deflator(nominal: &RegionTable, real: &RegionTable) -> CycleResult<RegionTable> {
    let name = format!("{} deflator", nominal.name);
    nominal.combine(real, &name, |n, r| ratio(n, r).map(|q| q * 100.0))
}

/// Real series from a price index: `nominal / (deflator / 100)`
pub fn real_from_deflator(nominal: &RegionTable, deflator: &RegionTable) -> CycleResult<RegionTable> {
    let name = format!("{} real", nominal.name);
    nominal.combine(deflator, &name, |n, d| ratio(n, d / 100.0))
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let q = numerator / denominator;
    q.is_finite().then_some(q)
}

/// Number of value pairs whose quotient is undefined
pub fn invalid_quotients(numerator: &RegionTable, denominator: &RegionTable) -> usize {
    numerator
        .columns()
        .iter()
        .filter_map(|c| denominator.column(&c.region).map(|d| (&c.values, d)))
        .map(|(n, d)| n.iter().zip(d).filter(|(a, b)| ratio(**a, **b).is_none()).count())
        .sum()
}

/// Number of values the logarithm is undefined for
pub fn invalid_log_inputs(table: &RegionTable) -> usize {
    table
        .columns()
        .iter()
        .map(|c| c.values.iter().filter(|v| !(**v > 0.0 && v.is_finite())).count())
        .sum()
}

/// First difference of the natural log: `ln(v[t]) - ln(v[t-1])` for t >= 1.
///
/// Non-positive and missing values are invalid for the logarithm; they are
/// replaced by the nearest valid value (forward, then backward) first.
pub fn log_growth(series: &Series) -> CycleResult<Series> {
    let mut cleaned = series.clone();
    for obs in &mut cleaned.observations {
        obs.value = obs.value.filter(|v| *v > 0.0 && v.is_finite());
    }
    cleaned.fill_gaps();
    let values = cleaned.complete_values()?;

    let mut growth = Series::new(format!("{} growth", series.name));
    for (i, obs) in cleaned.observations.iter().enumerate().skip(1) {
        growth.push(obs.period.clone(), Some(values[i].ln() - values[i - 1].ln()));
    }
    Ok(growth)
}

/// [`log_growth`] applied to every region of a table
pub fn table_growth(table: &RegionTable) -> CycleResult<RegionTable> {
    let axis: Vec<Period> = table.periods().iter().skip(1).cloned().collect();
    let mut growth = RegionTable::new(format!("{} growth", table.name), axis);
    for column in table.columns() {
        let series = Series::from_values(column.region.clone(), table.periods(), &column.values);
        let g = log_growth(&series)?;
        growth.push_region(column.region.clone(), g.complete_values()?)?;
    }
    Ok(growth)
}

/// Largest |dlog(nominal) - (dlog(real) + dlog(deflator))| over all periods
/// and regions
pub fn identity_check(
    nominal: &RegionTable,
    real: &RegionTable,
    deflator: &RegionTable,
) -> CycleResult<IdentityCheck> {
    if nominal.periods() != real.periods() || nominal.periods() != deflator.periods() {
        return Err(CycleError::Validation(
            "growth identity needs three series on one period axis".to_string(),
        ));
    }
    let mut max_abs_deviation = 0.0f64;
    for column in nominal.columns() {
        let missing = |t: &RegionTable| {
            CycleError::Validation(format!("Region '{}' missing from '{}'", column.region, t.name))
        };
        let r = real.column(&column.region).ok_or_else(|| missing(real))?;
        let d = deflator.column(&column.region).ok_or_else(|| missing(deflator))?;
        for i in 0..column.values.len() {
            let deviation = (column.values[i] - (r[i] + d[i])).abs();
            max_abs_deviation = max_abs_deviation.max(deviation);
        }
    }
    Ok(IdentityCheck {
        max_abs_deviation,
        periods: nominal.len(),
    })
}

/// Period at which nominal and real are closest, i.e. the base year of a
/// chain-linked or constant-price series
pub fn base_period(nominal: &Series, real: &Series) -> Option<Period> {
    nominal
        .observations
        .iter()
        .zip(&real.observations)
        .filter_map(|(n, r)| Some((n.period.clone(), (n.value? - r.value?).abs())))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(p, _)| p)
}

/// Rescale so that the value at `base` equals 100.
///
/// Falls back to the first period when `base` is not part of the series.
pub fn rebase(series: &Series, base: &Period) -> CycleResult<Series> {
    let reference = series
        .get(base)
        .or_else(|| series.observations.first().and_then(|o| o.value))
        .ok_or_else(|| CycleError::InsufficientData {
            series: series.name.clone(),
            len: series.len(),
            required: 1,
        })?;
    if reference == 0.0 {
        return Err(CycleError::Numerical(format!(
            "cannot rebase '{}' on a zero value",
            series.name
        )));
    }
    let mut rebased = series.clone();
    for obs in &mut rebased.observations {
        obs.value = obs.value.map(|v| v / reference * 100.0);
    }
    Ok(rebased)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::periods;

    fn one_region(name: &str, values: Vec<f64>) -> RegionTable {
        let labels: Vec<String> = (0..values.len()).map(|i| format!("{}", 2000 + i)).collect();
        let mut t = RegionTable::new(name, periods(&labels));
        t.push_region("Euro", values).unwrap();
        t
    }

    fn assert_close(a: f64, b: f64, tol: f64) {
        assert!((a - b).abs() < tol, "{a} != {b}");
    }

    #[test]
    fn test_end_to_end_deflator_and_growth() {
        let nominal = one_region("gdp", vec![100.0, 110.0, 121.0]);
        let real = one_region("gdp real", vec![100.0, 105.0, 110.25]);

        let defl = deflator(&nominal, &real).unwrap();
        let d = defl.column("Euro").unwrap();
        assert_close(d[0], 100.0, 1e-9);
        assert_close(d[1], 104.7619, 1e-4);
        assert_close(d[2], 109.7506, 1e-4);

        let g_nom = table_growth(&nominal).unwrap();
        let g = g_nom.column("Euro").unwrap();
        assert_eq!(g.len(), 2);
        assert_close(g[0], 1.1f64.ln(), 1e-12);
        assert_close(g[1], 1.1f64.ln(), 1e-12);
        assert_eq!(g_nom.periods()[0], Period::new("2001"));

        let check = identity_check(&g_nom, &table_growth(&real).unwrap(), &table_growth(&defl).unwrap()).unwrap();
        assert!(check.max_abs_deviation < 1e-6);
        assert_eq!(check.periods, 2);
    }

    #[test]
    fn test_real_from_deflator_inverts_deflator() {
        let nominal = one_region("c", vec![200.0, 250.0]);
        let index = one_region("c index", vec![100.0, 125.0]);
        let real = real_from_deflator(&nominal, &index).unwrap();
        assert_eq!(real.column("Euro").unwrap(), &[200.0, 200.0]);
    }

    #[test]
    fn test_log_growth_fills_non_positive_values() {
        let s = Series::from_values("x", &periods(&["a", "b", "c"]), &[0.0, 2.0, -1.0]);
        let g = log_growth(&s).unwrap();
        // 0.0 -> 2.0 (backward fill), -1.0 -> 2.0 (forward fill)
        assert_eq!(g.values(), vec![Some(0.0), Some(0.0)]);
    }

    #[test]
    fn test_invalid_inputs_are_counted() {
        let nominal = one_region("n", vec![100.0, 0.0, 120.0]);
        let real = one_region("r", vec![100.0, 0.0, f64::NAN]);
        assert_eq!(invalid_quotients(&nominal, &real), 2);
        assert_eq!(invalid_log_inputs(&nominal), 1);
        assert_eq!(invalid_log_inputs(&real), 2);
        assert_eq!(invalid_quotients(&nominal, &nominal.clone()), 1);
    }

    #[test]
    fn test_log_growth_without_valid_values_fails() {
        let s = Series::from_values("x", &periods(&["a", "b"]), &[0.0, -1.0]);
        assert!(matches!(log_growth(&s), Err(CycleError::MissingValues { .. })));
    }

    #[test]
    fn test_base_period_is_closest_match() {
        let axis = periods(&["2013", "2014", "2015", "2016"]);
        let nominal = Series::from_values("n", &axis, &[90.0, 95.0, 100.0, 104.0]);
        let real = Series::from_values("r", &axis, &[97.0, 98.0, 100.2, 101.0]);
        assert_eq!(base_period(&nominal, &real), Some(Period::new("2015")));
    }

    #[test]
    fn test_rebase_with_fallback() {
        let axis = periods(&["2014", "2015"]);
        let s = Series::from_values("s", &axis, &[50.0, 80.0]);
        let r = rebase(&s, &Period::new("2015")).unwrap();
        assert_eq!(r.values(), vec![Some(62.5), Some(100.0)]);
        let fallback = rebase(&s, &Period::new("1990")).unwrap();
        assert_eq!(fallback.values(), vec![Some(100.0), Some(160.0)]);
    }
}
