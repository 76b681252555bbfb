//! MATLAB level-5 `.mat` input
//!
//! A numeric 2-D array of shape `(periods, regions)` becomes a
//! [`RegionTable`]. MAT arrays carry no time axis, so periods are numbered
//! from a caller-supplied first period.

use crate::core::pipeline::{derive_variable, Priced, VariableAnalysis};
use crate::error::{CycleError, CycleResult};
use crate::types::{Period, RegionTable};
use matfile::{MatFile, NumericData};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Default array names of a nominal/real GDP file
pub const NOMINAL_ARRAY: &str = "nominal_gdp";
pub const REAL_ARRAY: &str = "real_gdp";

pub struct MatSource {
    path: PathBuf,
    file: MatFile,
}

impl MatSource {
    pub fn open<P: AsRef<Path>>(path: P) -> CycleResult<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = BufReader::new(File::open(&path)?);
        let file = MatFile::parse(reader).map_err(|e| {
            CycleError::Import(format!("Failed to parse MAT file {}: {:?}", path.display(), e))
        })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Names of all arrays in the file
    pub fn names(&self) -> Vec<String> {
        self.file.arrays().iter().map(|a| a.name().to_string()).collect()
    }

    /// `(rows, cols, column-major values)` of a numeric 2-D array
    pub fn matrix(&self, name: &str) -> CycleResult<(usize, usize, Vec<f64>)> {
        let array = self.file.find_by_name(name).ok_or_else(|| {
            CycleError::Import(format!(
                "Array '{}' not found in {} (available: {})",
                name,
                self.path.display(),
                self.names().join(", ")
            ))
        })?;
        let size = array.size();
        let (rows, cols) = match size.as_slice() {
            [rows, cols] => (*rows, *cols),
            other => {
                return Err(CycleError::Import(format!(
                    "Array '{}' must be 2-D, found {} dimensions",
                    name,
                    other.len()
                )))
            }
        };
        let values = numeric_values(array.data());
        debug!(array = name, rows, cols, "read MAT array");
        Ok((rows, cols, values))
    }

    /// Read an array as a table, one column per region
    pub fn table(&self, name: &str, regions: &[String], first_period: i64) -> CycleResult<RegionTable> {
        let (rows, cols, values) = self.matrix(name)?;
        table_from_matrix(name, rows, cols, &values, regions, first_period)
    }
}

fn numeric_values(data: &NumericData) -> Vec<f64> {
    match data {
        NumericData::Double { real, .. } => real.clone(),
        NumericData::Single { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::Int8 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::UInt8 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::Int16 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::UInt16 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::Int32 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::UInt32 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::Int64 { real, .. } => real.iter().map(|v| *v as f64).collect(),
        NumericData::UInt64 { real, .. } => real.iter().map(|v| *v as f64).collect(),
    }
}

/// Build a table from column-major values.
///
/// With no region names, columns are called `Region 1`, `Region 2`, ...
pub fn table_from_matrix(
    name: &str,
    rows: usize,
    cols: usize,
    values: &[f64],
    regions: &[String],
    first_period: i64,
) -> CycleResult<RegionTable> {
    if values.len() != rows * cols {
        return Err(CycleError::Import(format!(
            "Array '{}' holds {} values, expected {} x {}",
            name,
            values.len(),
            rows,
            cols
        )));
    }
    let names: Vec<String> = if regions.is_empty() {
        (1..=cols).map(|i| format!("Region {i}")).collect()
    } else if regions.len() == cols {
        regions.to_vec()
    } else {
        return Err(CycleError::Validation(format!(
            "Array '{}' has {} columns but {} region names were given",
            name,
            cols,
            regions.len()
        )));
    };

    let axis: Vec<Period> = (0..rows).map(|i| Period::ordinal(first_period, i)).collect();
    let mut table = RegionTable::new(name, axis);
    for (c, region) in names.into_iter().enumerate() {
        table.push_region(region, values[c * rows..(c + 1) * rows].to_vec())?;
    }
    Ok(table)
}

/// Deflator, growth rates, growth identity and base periods from a pair of
/// nominal/real arrays
pub fn identity_analysis(
    source: &MatSource,
    nominal: &str,
    real: &str,
    regions: &[String],
    first_period: i64,
) -> CycleResult<VariableAnalysis> {
    let nominal_table = source.table(nominal, regions, first_period)?;
    let real_table = source.table(real, regions, first_period)?;
    derive_variable("GDP", &nominal_table, Priced::Real(real_table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_major_layout() {
        // 3 periods x 2 regions
        let values = [1.0, 2.0, 3.0, 10.0, 20.0, 30.0];
        let regions = vec!["Euro Area".to_string(), "Greece".to_string()];
        let table = table_from_matrix("nominal_gdp", 3, 2, &values, &regions, 1995).unwrap();
        assert_eq!(table.column("Euro Area").unwrap(), &[1.0, 2.0, 3.0]);
        assert_eq!(table.column("Greece").unwrap(), &[10.0, 20.0, 30.0]);
        assert_eq!(table.periods()[2], Period::new("1997"));
    }

    #[test]
    fn test_default_region_names() {
        let table = table_from_matrix("x", 2, 2, &[1.0, 2.0, 3.0, 4.0], &[], 2000).unwrap();
        assert_eq!(table.regions(), vec!["Region 1", "Region 2"]);
    }

    #[test]
    fn test_region_count_mismatch() {
        let regions = vec!["Euro Area".to_string()];
        assert!(matches!(
            table_from_matrix("x", 2, 2, &[1.0, 2.0, 3.0, 4.0], &regions, 2000),
            Err(CycleError::Validation(_))
        ));
    }

    #[test]
    fn test_value_count_mismatch() {
        assert!(table_from_matrix("x", 2, 2, &[1.0, 2.0, 3.0], &[], 2000).is_err());
    }

    #[test]
    fn test_open_missing_file() {
        assert!(matches!(MatSource::open("no/such/file.mat"), Err(CycleError::Io(_))));
    }
}
