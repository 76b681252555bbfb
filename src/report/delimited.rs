//! CSV tables: relative volatility per region, growth and HP components per variable

use super::{file_stem, Emitter};
use crate::core::pipeline::{AnalysisReport, RegionVolatility, VariableAnalysis};
use crate::error::CycleResult;
use crate::types::{Period, RegionTable, Series};
use csv::Writer;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Clone, Copy)]
pub struct CsvEmitter;

impl Emitter for CsvEmitter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn emit(&self, report: &AnalysisReport, out_dir: &Path) -> CycleResult<Vec<PathBuf>> {
        let mut files = Vec::new();
        for region in &report.volatility {
            if region.table.is_none() {
                continue;
            }
            let path = out_dir.join(format!("relative_volatility_{}.csv", file_stem(&region.region)));
            write_volatility_csv(region, &path)?;
            files.push(path);
        }
        for variable in &report.variables {
            let stem = file_stem(&variable.name);

            let path = out_dir.join(format!("{stem}_growth.csv"));
            write_growth_csv(variable, &path)?;
            files.push(path);

            if !variable.decompositions.is_empty() {
                let path = out_dir.join(format!("{stem}_hp.csv"));
                write_hp_csv(variable, &path)?;
                files.push(path);
            }
        }
        Ok(files)
    }
}

fn cell(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn table_value(table: &RegionTable, region: &str, index: usize) -> Option<f64> {
    table.column(region).and_then(|values| values.get(index).copied())
}

/// `variable,volatility,relative_volatility`, one row per variable
pub fn write_volatility_csv(region: &RegionVolatility, path: &Path) -> CycleResult<()> {
    let mut writer = Writer::from_path(path)?;
    match &region.table {
        Some(table) => {
            for row in &table.rows {
                writer.serialize(row)?;
            }
        }
        None => {
            writer.write_record(["variable", "volatility", "relative_volatility"])?;
            for (name, absolute) in &region.absolute {
                writer.write_record([name.as_str(), &absolute.to_string(), ""])?;
            }
        }
    }
    writer.flush()?;
    Ok(())
}

/// `period` then nominal, real and deflator growth for each region
pub fn write_growth_csv(variable: &VariableAnalysis, path: &Path) -> CycleResult<()> {
    let growth = &variable.growth;
    let regions = growth.nominal.regions();

    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["period".to_string()];
    for region in &regions {
        header.push(format!("{region} nominal"));
        header.push(format!("{region} real"));
        header.push(format!("{region} deflator"));
    }
    writer.write_record(&header)?;

    for (i, period) in growth.nominal.periods().iter().enumerate() {
        let mut record = vec![period.to_string()];
        for region in &regions {
            record.push(cell(table_value(&growth.nominal, region, i)));
            record.push(cell(table_value(&growth.real, region, i)));
            record.push(cell(table_value(&growth.deflator, region, i)));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// `period` then actual, trend and cycle for each region
pub fn write_hp_csv(variable: &VariableAnalysis, path: &Path) -> CycleResult<()> {
    let axis: Vec<Period> = variable
        .decompositions
        .first()
        .map(|d| d.actual.periods())
        .unwrap_or_default();

    let mut writer = Writer::from_path(path)?;
    let mut header = vec!["period".to_string()];
    for d in &variable.decompositions {
        header.push(format!("{} actual", d.region));
        header.push(format!("{} trend", d.region));
        header.push(format!("{} cycle", d.region));
    }
    writer.write_record(&header)?;

    for period in &axis {
        let mut record = vec![period.to_string()];
        for d in &variable.decompositions {
            let series: [&Series; 3] = [&d.actual, &d.decomposition.trend, &d.decomposition.cycle];
            record.extend(series.iter().map(|s| cell(s.get(period))));
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}
