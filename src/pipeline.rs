//! End-to-end run: load, aggregate, chart, narrate, assemble.

use crate::aggregate::{
    correlate_features_with_sales, rank_models_by_region_year, rank_models_by_year,
    summarize_sales,
};
use crate::charts::ChartRenderer;
use crate::config::{Config, RunDirs, FIGURES_DIR};
use crate::error::Result;
use crate::generator::TextGenerator;
use crate::loader::{load_records, LoadReport};
use crate::narrative::NarrativeAssembler;
use crate::output::{preview_table, write_json};
use crate::progress::Spinner;
use crate::report::{build_report, evaluate_report, export_html, ReportEvaluation};
use crate::types::{
    DriverRow, FeatureCorrelation, ModelRanking, RegionModelRanking, SalesRecord, SalesSummary,
    TopModelRow, YearTotalRow,
};
use crate::util::{format_int, format_number};
use std::path::{Path, PathBuf};
use tracing::info;

pub const SALES_SUMMARY_FILE: &str = "sales_summary.json";
pub const MODELS_BY_YEAR_FILE: &str = "models_by_year_summary.json";
pub const MODELS_BY_REGION_FILE: &str = "models_by_region_summary.json";
pub const SALES_DRIVERS_FILE: &str = "sales_drivers.json";
pub const ALL_REGIONS_TITLE: &str = "All Regions";

#[derive(Debug, Clone)]
pub struct Summaries {
    pub sales: SalesSummary,
    pub models_by_year: ModelRanking,
    pub models_by_region: RegionModelRanking,
    pub drivers: Vec<FeatureCorrelation>,
}

impl Summaries {
    pub fn from_records(records: &[SalesRecord]) -> Self {
        Self {
            sales: summarize_sales(records),
            models_by_year: rank_models_by_year(records),
            models_by_region: rank_models_by_region_year(records),
            drivers: correlate_features_with_sales(records),
        }
    }

    pub fn persist(&self, dir: &Path) -> Result<()> {
        write_json(&dir.join(SALES_SUMMARY_FILE), &self.sales)?;
        write_json(&dir.join(MODELS_BY_YEAR_FILE), &self.models_by_year)?;
        write_json(&dir.join(MODELS_BY_REGION_FILE), &self.models_by_region)?;
        write_json(&dir.join(SALES_DRIVERS_FILE), &self.drivers)?;
        info!(dir = %dir.display(), "summaries written");
        Ok(())
    }

    pub fn print_previews(&self, max_rows: usize) {
        let yearly: Vec<YearTotalRow> = self
            .sales
            .sales_by_year
            .iter()
            .map(|(year, total)| YearTotalRow {
                year: *year,
                total_sales: format_int(*total),
            })
            .collect();
        preview_table("Sales by Year", &yearly, max_rows);

        let top: Vec<TopModelRow> = self
            .models_by_year
            .iter()
            .flat_map(|(year, models)| {
                models.iter().take(3).enumerate().map(move |(i, m)| TopModelRow {
                    year: *year,
                    rank: i + 1,
                    model: m.model.clone(),
                    total_sales: format_int(m.total_sales),
                })
            })
            .collect();
        preview_table("Top Models per Year", &top, max_rows * 3);

        let drivers: Vec<DriverRow> = self
            .drivers
            .iter()
            .map(|d| DriverRow {
                feature: d.feature.clone(),
                correlation: format_number(d.correlation, 3),
            })
            .collect();
        preview_table("Key Drivers of Sales Volume", &drivers, max_rows);
    }
}

pub fn load(config: &Config) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let (records, report) = load_records(&config.dataset_path)?;
    println!(
        "Processing dataset... ({} rows loaded)",
        format_int(report.total_rows)
    );
    if report.coerced_sales > 0 {
        println!(
            "Note: {} rows had an unreadable Sales_Volume and were counted as 0.",
            format_int(report.coerced_sales)
        );
    }
    Ok((records, report))
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_dir: PathBuf,
    pub report_path: PathBuf,
    pub html_path: Option<PathBuf>,
    pub charts: Vec<PathBuf>,
    pub evaluation: ReportEvaluation,
}

/// Run the whole pipeline into a fresh timestamped directory under
/// `config.reports_root`.
pub fn run<G: TextGenerator + ?Sized>(config: &Config, generator: &G) -> Result<RunOutcome> {
    let dirs = RunDirs::create(&config.reports_root)?;
    run_in(config, &dirs, generator)
}

pub fn run_in<G: TextGenerator + ?Sized>(
    config: &Config,
    dirs: &RunDirs,
    generator: &G,
) -> Result<RunOutcome> {
    info!(run_dir = %dirs.root.display(), "starting run");
    let (records, _) = load(config)?;

    let summaries = Summaries::from_records(&records);
    summaries.persist(&dirs.root)?;

    let renderer = ChartRenderer::new(&dirs.figures).with_size(config.chart_width, config.chart_height);
    let yearly_chart = renderer.render_yearly(&summaries.sales.sales_by_year)?;
    let regional_chart = renderer.render_region_year(&summaries.sales.sales_by_region_year)?;
    let models_chart = renderer.render_models_over_years(&summaries.models_by_year, ALL_REGIONS_TITLE)?;
    let region_charts = renderer.render_all_regions(&summaries.models_by_region)?;
    let drivers_chart = renderer.render_correlation(&summaries.drivers)?;

    let mut charts = vec![
        yearly_chart.clone(),
        regional_chart.clone(),
        models_chart.clone(),
    ];
    charts.extend(region_charts.values().cloned());
    charts.push(drivers_chart.clone());
    info!(count = charts.len(), "charts rendered");

    let assembler = NarrativeAssembler::new(generator, FIGURES_DIR);
    let quiet = config.quiet;

    let spinner = Spinner::start("Analyzing overall and regional sales trends", quiet);
    let sales_md = assembler.analyze_sales_trend(&summaries.sales, &yearly_chart, &regional_chart);
    spinner.stop();
    let sales_md = sales_md?;

    let spinner = Spinner::start("Analyzing model performance trends across years", quiet);
    let models_md = assembler.analyze_models_over_years(&summaries.models_by_year, &models_chart);
    spinner.stop();
    let models_md = models_md?;

    let spinner = Spinner::start("Analyzing regional model sales performance", quiet);
    let regions_md = assembler.analyze_models_by_region(&summaries.models_by_region, &region_charts);
    spinner.stop();
    let regions_md = regions_md?;

    let spinner = Spinner::start("Analyzing key drivers of sales (correlations)", quiet);
    let drivers_md = assembler.analyze_correlation(&summaries.drivers, &drivers_chart);
    spinner.stop();
    let drivers_md = drivers_md?;

    let spinner = Spinner::start("Generating final report", quiet);
    let combined = assembler.combine_sections(
        &[sales_md, models_md, regions_md, drivers_md],
        &config.report_title,
    );
    spinner.stop();
    let combined = combined?;

    let report_path = build_report(&[combined], &dirs.root, &config.report_title)?;
    let html_path = if config.html {
        Some(export_html(&report_path, &dirs.root, &config.report_title)?)
    } else {
        None
    };

    let evaluation = evaluate_report(&std::fs::read_to_string(&report_path)?);
    info!(
        words = evaluation.word_count,
        images = evaluation.image_count,
        executive_summary = evaluation.has_executive_summary,
        "report evaluation"
    );

    Ok(RunOutcome {
        run_dir: dirs.root.clone(),
        report_path,
        html_path,
        charts,
        evaluation,
    })
}
