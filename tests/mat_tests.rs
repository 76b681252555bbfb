//! MAT file input and the growth-identity workflow

mod common;

use macrocycle::error::CycleError;
use macrocycle::mat::{identity_analysis, MatSource, NOMINAL_ARRAY, REAL_ARRAY};
use macrocycle::types::Period;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn gdp_file(dir: &TempDir) -> MatSource {
    let path = dir.path().join("GDP_data.mat");
    common::write_mat(&path, &common::gdp_arrays());
    MatSource::open(&path).unwrap()
}

fn regions() -> Vec<String> {
    vec!["Euro Area".to_string(), "Greece".to_string()]
}

#[test]
fn test_lists_arrays() {
    let dir = TempDir::new().unwrap();
    let source = gdp_file(&dir);
    assert_eq!(source.names(), vec![NOMINAL_ARRAY, REAL_ARRAY]);
}

#[test]
fn test_reads_column_major_matrix() {
    let dir = TempDir::new().unwrap();
    let source = gdp_file(&dir);
    let (rows, cols, values) = source.matrix(REAL_ARRAY).unwrap();
    assert_eq!((rows, cols), (28, 2));
    assert_eq!(values[0], 6000.0);
    assert_eq!(values[28], 120.0);

    let table = source.table(REAL_ARRAY, &regions(), 1995).unwrap();
    assert_eq!(table.len(), 28);
    assert_eq!(table.periods()[27], Period::new("2022"));
    assert_eq!(table.column("Greece").unwrap()[0], 120.0);
}

#[test]
fn test_identity_and_base_year() {
    let dir = TempDir::new().unwrap();
    let source = gdp_file(&dir);
    let analysis = identity_analysis(&source, NOMINAL_ARRAY, REAL_ARRAY, &regions(), 1995).unwrap();

    assert!(analysis.identity.max_abs_deviation < 1e-9);
    assert_eq!(analysis.identity.periods, 27);
    for summary in &analysis.summaries {
        // prices are 1 in the tenth year of the sample
        assert_eq!(summary.base_period, Some(Period::new("2005")));
    }
    let euro = &analysis.summaries[0];
    assert!((euro.mean_deflator_growth.unwrap() - 1.02f64.ln()).abs() < 1e-9);
    assert!(analysis.decompositions.is_empty());
}

#[test]
fn test_missing_array_lists_available_names() {
    let dir = TempDir::new().unwrap();
    let source = gdp_file(&dir);
    match source.matrix("gdp_index") {
        Err(CycleError::Import(msg)) => {
            assert!(msg.contains("gdp_index"));
            assert!(msg.contains(NOMINAL_ARRAY));
        }
        other => panic!("Expected import error, got {:?}", other.map(|(r, c, _)| (r, c))),
    }
}

#[test]
fn test_garbage_file_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.mat");
    std::fs::write(&path, b"not a mat file").unwrap();
    assert!(matches!(MatSource::open(&path), Err(CycleError::Import(_))));
}
