use crate::error::{ReportError, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;
use tabled::{settings::Style, Table, Tabled};
use tempfile::NamedTempFile;
use tracing::debug;

/// Write `value` as pretty JSON (2-space indent).
///
/// The bytes go to a temporary file in the destination directory which is
/// then renamed over `path`, so a failed write never leaves a truncated file
/// behind.
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;
    let body = serde_json::to_string_pretty(value)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body.as_bytes())?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| ReportError::Io(e.error))?;
    debug!(path = %path.display(), "wrote json");
    Ok(())
}

pub fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

pub fn preview_table<T>(title: &str, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("{}\n", title);
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::{rank_models_by_year, summarize_sales};
    use crate::types::{ModelRanking, SalesRecord, SalesSummary};

    fn sample() -> Vec<SalesRecord> {
        vec![
            SalesRecord::new(2020, "Europe", "X5", 100.0),
            SalesRecord::new(2020, "Asia", "X3", 150.0),
            SalesRecord::new(2021, "Europe", "X5", 200.0),
        ]
    }

    #[test]
    fn summary_round_trips_with_string_year_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sales_summary.json");
        let summary = summarize_sales(&sample());
        write_json(&path, &summary).unwrap();

        let raw: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(raw["sales_by_year"]["2020"], 250);
        assert_eq!(raw["sales_by_region_year"]["Europe"]["2020"], 100);

        let back: SalesSummary = read_json(&path).unwrap();
        assert_eq!(back, summary);
    }

    #[test]
    fn ranking_json_uses_model_and_total_sales_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("models_by_year_summary.json");
        let ranking = rank_models_by_year(&sample());
        write_json(&path, &ranking).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.contains("\n  \"2020\": ["));
        assert!(text.contains("\"Total_Sales\": 150"));
        let back: ModelRanking = read_json(&path).unwrap();
        assert_eq!(back, ranking);
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        write_json(&path, &vec![1, 2, 3]).unwrap();
        write_json(&path, &vec![4]).unwrap();
        let back: Vec<i32> = read_json(&path).unwrap();
        assert_eq!(back, vec![4]);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
