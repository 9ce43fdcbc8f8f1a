use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tabled::Tabled;

pub const COL_YEAR: &str = "Year";
pub const COL_REGION: &str = "Region";
pub const COL_MODEL: &str = "Model";
pub const COL_SALES: &str = "Sales_Volume";

pub const REQUIRED_COLUMNS: [&str; 4] = [COL_YEAR, COL_REGION, COL_MODEL, COL_SALES];

#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "Year")]
    pub year: Option<String>,
    #[serde(rename = "Region")]
    pub region: Option<String>,
    #[serde(rename = "Model")]
    pub model: Option<String>,
    #[serde(rename = "Sales_Volume")]
    pub sales_volume: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SalesRecord {
    pub year: i32,
    pub region: String,
    pub model: String,
    pub sales_volume: f64,
}

impl SalesRecord {
    pub fn new(year: i32, region: &str, model: &str, sales_volume: f64) -> Self {
        Self {
            year,
            region: region.to_string(),
            model: model.to_string(),
            sales_volume,
        }
    }
}

/// Year -> total sales volume.
pub type YearlySummary = BTreeMap<i32, i64>;

/// Region -> year -> total sales volume. Absent pairs mean "no sales recorded".
pub type RegionYearSummary = BTreeMap<String, BTreeMap<i32, i64>>;

/// Year -> models sorted by total sales, best first.
pub type ModelRanking = BTreeMap<i32, Vec<ModelSales>>;

/// Region -> year -> models sorted by total sales, best first.
pub type RegionModelRanking = BTreeMap<String, ModelRanking>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SalesSummary {
    pub sales_by_year: YearlySummary,
    pub sales_by_region_year: RegionYearSummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSales {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Total_Sales")]
    pub total_sales: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCorrelation {
    #[serde(rename = "Feature")]
    pub feature: String,
    #[serde(rename = "Correlation_with_Sales_Volume")]
    pub correlation: f64,
}

#[derive(Debug, Tabled, Clone)]
pub struct YearTotalRow {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "TotalSales")]
    pub total_sales: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct TopModelRow {
    #[tabled(rename = "Year")]
    pub year: i32,
    #[tabled(rename = "Rank")]
    pub rank: usize,
    #[tabled(rename = "Model")]
    pub model: String,
    #[tabled(rename = "TotalSales")]
    pub total_sales: String,
}

#[derive(Debug, Tabled, Clone)]
pub struct DriverRow {
    #[tabled(rename = "Feature")]
    pub feature: String,
    #[tabled(rename = "Correlation")]
    pub correlation: String,
}
