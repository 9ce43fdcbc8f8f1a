use crate::types::{
    FeatureCorrelation, ModelRanking, ModelSales, RegionModelRanking, RegionYearSummary,
    SalesRecord, SalesSummary, YearlySummary, COL_MODEL, COL_REGION, COL_SALES, COL_YEAR,
};
use crate::util::pearson;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// Totals are summed as `f64` and truncated to whole units.
pub fn summarize_by_year(records: &[SalesRecord]) -> YearlySummary {
    let mut sums: BTreeMap<i32, f64> = BTreeMap::new();
    for r in records {
        *sums.entry(r.year).or_default() += r.sales_volume;
    }
    sums.into_iter().map(|(y, v)| (y, v as i64)).collect()
}

pub fn summarize_by_region_year(records: &[SalesRecord]) -> RegionYearSummary {
    let mut sums: BTreeMap<&str, BTreeMap<i32, f64>> = BTreeMap::new();
    for r in records {
        *sums
            .entry(r.region.as_str())
            .or_default()
            .entry(r.year)
            .or_default() += r.sales_volume;
    }
    sums.into_iter()
        .map(|(region, years)| {
            let years = years.into_iter().map(|(y, v)| (y, v as i64)).collect();
            (region.to_string(), years)
        })
        .collect()
}

/// Both yearly views together, in the shape persisted as `sales_summary.json`.
pub fn summarize_sales(records: &[SalesRecord]) -> SalesSummary {
    SalesSummary {
        sales_by_year: summarize_by_year(records),
        sales_by_region_year: summarize_by_region_year(records),
    }
}

pub fn rank_models_by_year(records: &[SalesRecord]) -> ModelRanking {
    let mut sums: BTreeMap<i32, BTreeMap<&str, f64>> = BTreeMap::new();
    for r in records {
        *sums
            .entry(r.year)
            .or_default()
            .entry(r.model.as_str())
            .or_default() += r.sales_volume;
    }
    sums.into_iter()
        .map(|(year, models)| (year, ranked(models)))
        .collect()
}

pub fn rank_models_by_region_year(records: &[SalesRecord]) -> RegionModelRanking {
    let mut by_region: BTreeMap<&str, Vec<&SalesRecord>> = BTreeMap::new();
    for r in records {
        by_region.entry(r.region.as_str()).or_default().push(r);
    }
    by_region
        .into_iter()
        .map(|(region, rows)| {
            let mut sums: BTreeMap<i32, BTreeMap<&str, f64>> = BTreeMap::new();
            for r in rows {
                *sums
                    .entry(r.year)
                    .or_default()
                    .entry(r.model.as_str())
                    .or_default() += r.sales_volume;
            }
            let years = sums
                .into_iter()
                .map(|(year, models)| (year, ranked(models)))
                .collect();
            (region.to_string(), years)
        })
        .collect()
}

/// Sort by total descending; equal totals fall back to model name ascending.
fn ranked(models: BTreeMap<&str, f64>) -> Vec<ModelSales> {
    let mut rows: Vec<ModelSales> = models
        .into_iter()
        .map(|(model, total)| ModelSales {
            model: model.to_string(),
            total_sales: total as i64,
        })
        .collect();
    rows.sort_by(|a, b| {
        b.total_sales
            .cmp(&a.total_sales)
            .then_with(|| a.model.cmp(&b.model))
    });
    rows
}

/// Pearson correlation of every one-hot encoded feature against sales volume.
///
/// Year, Region and Model are each expanded into indicator columns named
/// `<Column>_<value>`; `Sales_Volume` itself is included and scores 1.0.
/// Only those four schema columns reach a `SalesRecord`, so any other CSV
/// column (`Color`, `Fuel_Type`, ...) takes no part in the ranking.
/// Columns with zero variance have no defined correlation and are dropped,
/// which also empties the result when every row has the same sales volume.
/// Ordered by signed coefficient descending, then feature name.
pub fn correlate_features_with_sales(records: &[SalesRecord]) -> Vec<FeatureCorrelation> {
    let sales: Vec<f64> = records.iter().map(|r| r.sales_volume).collect();

    let mut out = Vec::new();
    if let Some(c) = pearson(&sales, &sales) {
        out.push(FeatureCorrelation {
            feature: COL_SALES.to_string(),
            correlation: c,
        });
    }

    let columns: [(&str, Vec<String>); 3] = [
        (COL_YEAR, records.iter().map(|r| r.year.to_string()).collect()),
        (COL_REGION, records.iter().map(|r| r.region.clone()).collect()),
        (COL_MODEL, records.iter().map(|r| r.model.clone()).collect()),
    ];
    for (column, labels) in &columns {
        let levels: BTreeSet<&str> = labels.iter().map(String::as_str).collect();
        for level in levels {
            let indicator: Vec<f64> = labels
                .iter()
                .map(|l| if l == level { 1.0 } else { 0.0 })
                .collect();
            if let Some(c) = pearson(&indicator, &sales) {
                out.push(FeatureCorrelation {
                    feature: format!("{}_{}", column, level),
                    correlation: c,
                });
            }
        }
    }

    out.sort_by(|a, b| {
        b.correlation
            .partial_cmp(&a.correlation)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.feature.cmp(&b.feature))
    });
    out
}
