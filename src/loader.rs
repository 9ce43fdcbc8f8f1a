use crate::error::{ReportError, Result};
use crate::types::{RawRow, SalesRecord, REQUIRED_COLUMNS};
use crate::util::{parse_f64_safe, parse_i32_safe};
use csv::{ReaderBuilder, Trim};
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    /// Rows whose Sales_Volume was unparseable or negative and was counted as 0.
    pub coerced_sales: usize,
}

pub fn load_records(path: &Path) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let file = std::fs::File::open(path).map_err(|e| {
        ReportError::InputData(format!("cannot open dataset {}: {}", path.display(), e))
    })?;
    debug!(path = %path.display(), "loading dataset");
    load_from_reader(file)
}

/// Parse sales rows from any CSV source.
///
/// Year, Region and Model must be present and well-formed on every row; a
/// malformed Sales_Volume is coerced to zero instead of aborting the load.
pub fn load_from_reader<R: Read>(reader: R) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    for col in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h.trim() == col) {
            return Err(ReportError::InputData(format!(
                "required column '{}' is missing",
                col
            )));
        }
    }

    let mut report = LoadReport::default();
    let mut records = Vec::new();

    for (idx, result) in rdr.deserialize::<RawRow>().enumerate() {
        let row_no = idx + 1;
        report.total_rows += 1;
        let row = result?;

        let year = parse_i32_safe(row.year.as_deref()).ok_or_else(|| {
            ReportError::InputData(format!(
                "row {}: Year '{}' is not an integer",
                row_no,
                row.year.as_deref().unwrap_or("")
            ))
        })?;
        let region = required_label(row.region, "Region", row_no)?;
        let model = required_label(row.model, "Model", row_no)?;

        let sales_volume = match parse_f64_safe(row.sales_volume.as_deref()) {
            Some(v) if v >= 0.0 => v,
            _ => {
                report.coerced_sales += 1;
                0.0
            }
        };

        records.push(SalesRecord {
            year,
            region,
            model,
            sales_volume,
        });
    }

    if report.coerced_sales > 0 {
        warn!(
            rows = report.coerced_sales,
            "Sales_Volume values could not be parsed and were counted as 0"
        );
    }
    Ok((records, report))
}

fn required_label(value: Option<String>, column: &str, row_no: usize) -> Result<String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ReportError::InputData(format!(
            "row {}: {} is empty",
            row_no, column
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_well_formed_rows() {
        let csv = "Model,Year,Region,Color,Sales_Volume\n\
                   X5,2020,Europe,Blue,100\n\
                   X3,2020.0,Asia,Red,\"1,500\"\n";
        let (records, report) = load_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.coerced_sales, 0);
        assert_eq!(records[0], SalesRecord::new(2020, "Europe", "X5", 100.0));
        assert_eq!(records[1], SalesRecord::new(2020, "Asia", "X3", 1500.0));
    }

    #[test]
    fn missing_column_is_input_error() {
        let csv = "Year,Region,Model\n2020,Europe,X5\n";
        let err = load_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ReportError::InputData(ref m) if m.contains("Sales_Volume")));
    }

    #[test]
    fn bad_year_is_input_error() {
        let csv = "Year,Region,Model,Sales_Volume\nsoon,Europe,X5,1\n";
        let err = load_from_reader(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, ReportError::InputData(ref m) if m.contains("row 1")));
    }

    #[test]
    fn bad_sales_volume_is_coerced_to_zero() {
        let csv = "Year,Region,Model,Sales_Volume\n\
                   2020,Europe,X5,lots\n\
                   2020,Europe,X5,-4\n\
                   2020,Europe,X5,7\n";
        let (records, report) = load_from_reader(csv.as_bytes()).unwrap();
        assert_eq!(report.coerced_sales, 2);
        let volumes: Vec<f64> = records.iter().map(|r| r.sales_volume).collect();
        assert_eq!(volumes, vec![0.0, 0.0, 7.0]);
    }
}
