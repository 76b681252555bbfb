//! Fixtures shared by the integration tests: a small quarterly workbook,
//! a matching run file and a level-5 MAT file writer.

#![allow(dead_code)]

use rust_xlsxwriter::Workbook;
use std::path::{Path, PathBuf};

/// Quarters in the fixture sheets, the first one before the start label
pub const QUARTERS: usize = 24;
pub const LABEL_ROW: u32 = 10;
pub const EURO_ROW: u32 = 12;
pub const GREECE_ROW: u32 = 13;

pub fn quarter(i: usize) -> String {
    // column 0 is 1994-Q4
    let q = i + 3;
    format!("{}-Q{}", 1994 + q / 4, q % 4 + 1)
}

fn wave(i: usize) -> f64 {
    (i as f64 * 1.1).sin()
}

fn gdp_nominal(i: usize) -> (f64, f64) {
    (1000.0 + 12.0 * i as f64 + 15.0 * wave(i), 50.0 + 0.4 * i as f64 + 2.0 * wave(i + 2))
}

fn gdp_deflator(i: usize) -> (f64, f64) {
    (95.0 + 0.5 * i as f64, 98.0 + 0.4 * i as f64)
}

fn cons_nominal(i: usize) -> (f64, f64) {
    (600.0 + 8.0 * i as f64 + 6.0 * wave(i), 35.0 + 0.3 * i as f64 + 0.5 * wave(i))
}

fn cons_real(i: usize) -> (f64, f64) {
    (590.0 + 5.0 * i as f64 + 5.0 * wave(i), 34.0 + 0.2 * i as f64 + 0.4 * wave(i))
}

/// Write one sheet in the statistical-office layout: a title in A1, period
/// labels in row 10 from column B, region names in column A
fn write_sheet(
    workbook: &mut Workbook,
    name: &str,
    values: impl Fn(usize) -> (f64, f64),
    flagged: Option<usize>,
) {
    let ws = workbook.add_worksheet();
    ws.set_name(name).unwrap();
    ws.write_string(0, 0, format!("{name}: national accounts, quarterly")).unwrap();
    ws.write_string(LABEL_ROW - 1, 0, "TIME").unwrap();
    ws.write_string(EURO_ROW - 1, 0, "Euro area").unwrap();
    ws.write_string(GREECE_ROW - 1, 0, "Greece").unwrap();
    for i in 0..QUARTERS {
        let col = i as u16 + 1;
        let (euro, greece) = values(i);
        ws.write_string(LABEL_ROW - 1, col, quarter(i)).unwrap();
        if flagged == Some(i) {
            // unavailable in the source, plus a provisional flag on the next cell
            ws.write_string(EURO_ROW - 1, col, ":").unwrap();
        } else if flagged.map(|f| f + 1) == Some(i) {
            ws.write_string(EURO_ROW - 1, col, format!("{euro} p")).unwrap();
        } else {
            ws.write_number(EURO_ROW - 1, col, euro).unwrap();
        }
        if flagged == Some(i) {
            // confidential, cannot be parsed
            ws.write_string(GREECE_ROW - 1, col, "c").unwrap();
        } else {
            ws.write_number(GREECE_ROW - 1, col, greece).unwrap();
        }
    }
}

/// Workbook with GDP (nominal + deflator) and Consumption (nominal + real)
pub fn write_workbook(dir: &Path) -> PathBuf {
    let path = dir.join("Quarterly_Data.xlsx");
    let mut workbook = Workbook::new();
    write_sheet(&mut workbook, "Sheet 41", gdp_nominal, Some(6));
    write_sheet(&mut workbook, "Sheet 80", gdp_deflator, None);
    write_sheet(&mut workbook, "Sheet 42", cons_nominal, None);
    write_sheet(&mut workbook, "Sheet 81", cons_real, None);
    workbook.save(&path).unwrap();
    path
}

pub const RUN_FILE: &str = r#"
workbook: Quarterly_Data.xlsx
output_dir: output
base_variable: GDP
layout:
  label_row: 10
  start_label: "1995-Q1"
  regions:
    - { name: Euro area, row: 12 }
    - { name: Greece, row: 13 }
variables:
  - { name: GDP, nominal: "Sheet 41", deflator: "Sheet 80" }
  - { name: Consumption, nominal: "Sheet 42", real: "Sheet 81" }
report:
  title: Euro area and Greece
"#;

/// Workbook plus run file in `dir`; returns the run file path
pub fn write_fixture(dir: &Path) -> PathBuf {
    write_workbook(dir);
    let run = dir.join("run.yaml");
    std::fs::write(&run, RUN_FILE).unwrap();
    run
}

/// Minimal uncompressed MAT level-5 writer for double 2-D arrays
pub fn write_mat(path: &Path, arrays: &[(&str, usize, usize, Vec<f64>)]) {
    let mut bytes = Vec::new();

    let mut text = b"MATLAB 5.0 MAT-file, created by macrocycle tests".to_vec();
    text.resize(116, b' ');
    bytes.extend_from_slice(&text);
    bytes.extend_from_slice(&[0u8; 8]);
    bytes.extend_from_slice(&0x0100u16.to_le_bytes());
    bytes.extend_from_slice(b"IM");

    for (name, rows, cols, values) in arrays {
        assert_eq!(values.len(), rows * cols);
        let name_len = name.len();
        let name_padded = name_len.div_ceil(8) * 8;

        let mut body = Vec::new();
        // array flags: miUINT32, class mxDOUBLE_CLASS
        body.extend_from_slice(&6u32.to_le_bytes());
        body.extend_from_slice(&8u32.to_le_bytes());
        body.extend_from_slice(&6u32.to_le_bytes());
        body.extend_from_slice(&0u32.to_le_bytes());
        // dimensions: miINT32
        body.extend_from_slice(&5u32.to_le_bytes());
        body.extend_from_slice(&8u32.to_le_bytes());
        body.extend_from_slice(&(*rows as i32).to_le_bytes());
        body.extend_from_slice(&(*cols as i32).to_le_bytes());
        // name: miINT8
        body.extend_from_slice(&1u32.to_le_bytes());
        body.extend_from_slice(&(name_len as u32).to_le_bytes());
        body.extend_from_slice(name.as_bytes());
        body.resize(body.len() + name_padded - name_len, 0);
        // real part: miDOUBLE
        body.extend_from_slice(&9u32.to_le_bytes());
        body.extend_from_slice(&((values.len() * 8) as u32).to_le_bytes());
        for v in values {
            body.extend_from_slice(&v.to_le_bytes());
        }

        // miMATRIX
        bytes.extend_from_slice(&14u32.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
    }
    std::fs::write(path, bytes).unwrap();
}

/// 28 years x 2 regions of nominal and real GDP, column-major
pub fn gdp_arrays() -> Vec<(&'static str, usize, usize, Vec<f64>)> {
    let years = 28;
    let mut nominal = Vec::new();
    let mut real = Vec::new();
    for (level, growth, inflation) in [(6000.0, 0.015, 0.02), (120.0, 0.01, 0.03)] {
        for t in 0..years {
            let r = level * (1.0f64 + growth).powi(t as i32) * (1.0 + 0.01 * (t as f64).sin());
            // prices equal 1 in the tenth year
            let p = (1.0f64 + inflation).powi(t as i32 - 10);
            real.push(r);
            nominal.push(r * p);
        }
    }
    vec![("nominal_gdp", years, 2, nominal), ("real_gdp", years, 2, real)]
}
