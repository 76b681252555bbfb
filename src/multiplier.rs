//! Keynesian income-expenditure model with a one-period spending lag
//!
//! ```text
//! C_t = C_bar + c (Y_{t-1} - T)
//! I_t = I_bar + alpha Y_{t-1} - b i
//! Y_t = C_t + I_t + G = D + beta Y_{t-1}
//! ```
//!
//! with autonomous demand `D = C_bar + I_bar + G - c T - b i` and
//! `beta = c + alpha`. A steady state exists when `beta < 1`; the path then
//! converges to `Y* = D / (1 - beta)` from any starting income.

use crate::error::{CycleError, CycleResult};
use csv::Writer;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Employment per unit of output used for the employment path
pub const EMPLOYMENT_SHARE: f64 = 0.7;

/// Default number of periods after the starting one
pub const DEFAULT_PERIODS: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    /// Autonomous consumption
    pub c_bar: f64,
    /// Autonomous investment
    pub i_bar: f64,
    /// Marginal propensity to consume
    pub c: f64,
    /// Investment sensitivity to income
    pub alpha: f64,
    /// Investment sensitivity to the interest rate
    pub b: f64,
    /// Government spending
    pub g: f64,
    /// Taxes
    pub t: f64,
    /// Interest rate
    pub i: f64,
}

impl Default for ModelParams {
    fn default() -> Self {
        Self {
            c_bar: 0.6,
            i_bar: 0.2,
            c: 0.5,
            alpha: 0.1,
            b: 0.1,
            g: 1.7,
            t: 1.7,
            i: 0.04,
        }
    }
}

impl ModelParams {
    pub fn with_propensity(self, c: f64) -> Self {
        Self { c, ..self }
    }

    /// `D = C_bar + I_bar + G - c T - b i`
    pub fn autonomous_demand(&self) -> f64 {
        self.c_bar + self.i_bar + self.g - self.c * self.t - self.b * self.i
    }

    /// `beta = c + alpha`, the slope of income on lagged income
    pub fn propensity(&self) -> f64 {
        self.c + self.alpha
    }

    /// `1 / (1 - beta)`
    pub fn multiplier(&self) -> CycleResult<f64> {
        self.check()?;
        Ok(1.0 / (1.0 - self.propensity()))
    }

    fn check(&self) -> CycleResult<()> {
        let values = [
            self.c_bar, self.i_bar, self.c, self.alpha, self.b, self.g, self.t, self.i,
        ];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(CycleError::Validation(
                "model parameters must be finite".to_string(),
            ));
        }
        let beta = self.propensity();
        if beta >= 1.0 {
            return Err(CycleError::Numerical(format!(
                "c + alpha = {beta} must stay below 1 for a steady state to exist"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SteadyState {
    pub output: f64,
    pub consumption: f64,
    pub investment: f64,
    pub autonomous_demand: f64,
    pub propensity: f64,
}

pub fn steady_state(params: &ModelParams) -> CycleResult<SteadyState> {
    let output = params.autonomous_demand() * params.multiplier()?;
    Ok(SteadyState {
        output,
        consumption: params.c_bar + params.c * (output - params.t),
        investment: params.i_bar + params.alpha * output - params.b * params.i,
        autonomous_demand: params.autonomous_demand(),
        propensity: params.propensity(),
    })
}

/// Output, consumption and investment for `t = 0..=periods`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DynamicPath {
    pub output: Vec<f64>,
    pub consumption: Vec<f64>,
    pub investment: Vec<f64>,
}

impl DynamicPath {
    pub fn len(&self) -> usize {
        self.output.len()
    }

    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Employment as a fixed share of output
    pub fn employment(&self, share: f64) -> Vec<f64> {
        self.output.iter().map(|y| share * y).collect()
    }
}

/// Iterate the model from last period's income `y_prev` (Y at t = -1)
pub fn dynamic_path(y_prev: f64, params: &ModelParams, periods: usize) -> CycleResult<DynamicPath> {
    params.check()?;
    let d = params.autonomous_demand();
    let beta = params.propensity();

    let mut path = DynamicPath {
        output: Vec::with_capacity(periods + 1),
        consumption: Vec::with_capacity(periods + 1),
        investment: Vec::with_capacity(periods + 1),
    };
    let mut lagged = y_prev;
    for _ in 0..=periods {
        path.consumption.push(params.c_bar + params.c * (lagged - params.t));
        let investment = params.i_bar + params.alpha * lagged - params.b * params.i;
        path.investment.push(investment);
        let y = d + beta * lagged;
        path.output.push(y);
        lagged = y;
    }
    Ok(path)
}

/// A change to fiscal or monetary policy, applied to the base parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyScenario {
    pub name: String,
    pub g: f64,
    pub t: f64,
    pub i: f64,
}

impl PolicyScenario {
    pub fn apply(&self, base: &ModelParams) -> ModelParams {
        ModelParams {
            g: self.g,
            t: self.t,
            i: self.i,
            ..*base
        }
    }
}

/// Spending +50%, taxes +30% and a 100 basis point rate rise
pub fn standard_scenarios(base: &ModelParams) -> Vec<PolicyScenario> {
    vec![
        PolicyScenario {
            name: "Gov Spending +50%".to_string(),
            g: base.g * 1.5,
            t: base.t,
            i: base.i,
        },
        PolicyScenario {
            name: "Taxes +30%".to_string(),
            g: base.g,
            t: base.t * 1.3,
            i: base.i,
        },
        PolicyScenario {
            name: "Interest Rate +100bps".to_string(),
            g: base.g,
            t: base.t,
            i: base.i + 0.01,
        },
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioOutcome {
    pub name: String,
    pub before: SteadyState,
    pub after: SteadyState,
    /// Transition starting from the old steady state
    pub path: DynamicPath,
    pub employment: Vec<f64>,
}

pub fn run_scenario(
    base: &ModelParams,
    scenario: &PolicyScenario,
    periods: usize,
) -> CycleResult<ScenarioOutcome> {
    let before = steady_state(base)?;
    let params = scenario.apply(base);
    let after = steady_state(&params)?;
    let path = dynamic_path(before.output, &params, periods)?;
    let employment = path.employment(EMPLOYMENT_SHARE);
    Ok(ScenarioOutcome {
        name: scenario.name.clone(),
        before,
        after,
        path,
        employment,
    })
}

/// `path,period,output,consumption,investment`, one row per period of each path
pub fn write_paths_csv(paths: &[(String, &DynamicPath)], path: &Path) -> CycleResult<()> {
    let mut writer = Writer::from_path(path)?;
    writer.write_record(["path", "period", "output", "consumption", "investment"])?;
    for (name, p) in paths {
        for t in 0..p.len() {
            writer.write_record([
                name.clone(),
                t.to_string(),
                p.output[t].to_string(),
                p.consumption[t].to_string(),
                p.investment[t].to_string(),
            ])?;
        }
    }
    writer.flush()?;
    Ok(())
}
