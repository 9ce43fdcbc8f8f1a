use sales_report::config::{Config, RunDirs};
use sales_report::generator::{GenerateResponse, TextGenerator};
use sales_report::pipeline::{self, MODELS_BY_REGION_FILE, MODELS_BY_YEAR_FILE, SALES_SUMMARY_FILE};
use sales_report::types::SalesSummary;
use sales_report::{GeneratorError, ReportError};
use std::cell::{Cell, RefCell};
use std::path::Path;

const DATASET: &str = "\
Model,Year,Region,Color,Fuel_Type,Sales_Volume
X5,2020,Europe,Blue,Petrol,100
X3,2020,Asia,Red,Diesel,150
X5,2021,Europe,Black,Hybrid,200
X3,2021,Asia,White,Petrol,250
i4,2021,North America,Grey,Electric,not-a-number
";

/// Answers every section prompt with a short markdown block and the merge
/// prompt with a fixed consolidated document.
struct ScriptedGenerator {
    prompts: RefCell<Vec<String>>,
    fail_on_call: Option<usize>,
    calls: Cell<usize>,
}

impl ScriptedGenerator {
    fn new(fail_on_call: Option<usize>) -> Self {
        Self {
            prompts: RefCell::new(Vec::new()),
            fail_on_call,
            calls: Cell::new(0),
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, prompt: &str) -> Result<GenerateResponse, GeneratorError> {
        let call = self.calls.get() + 1;
        self.calls.set(call);
        self.prompts.borrow_mut().push(prompt.to_string());
        if self.fail_on_call == Some(call) {
            return Err(GeneratorError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        if prompt.contains("Merge the analysis sections") {
            return Ok(GenerateResponse::from_text(
                "## Executive Summary\n\nSales grew.\n\n\
                 ![Sales by Year](figures/sales_by_year.png)\n*Figure 1: Sales by year*\n\n\
                 ## Recommendations\n\nKeep going.",
            ));
        }
        Ok(GenerateResponse::from_text(format!("## Section {}\n\nAnalysis.", call)))
    }
}

fn setup(dir: &Path) -> (Config, RunDirs) {
    let dataset = dir.join("sales.csv");
    std::fs::write(&dataset, DATASET).unwrap();
    let config = Config {
        dataset_path: dataset,
        reports_root: dir.join("reports"),
        quiet: true,
        ..Config::default()
    };
    let dirs = RunDirs::create_named(&config.reports_root, "run_test").unwrap();
    (config, dirs)
}

#[test]
fn full_run_writes_summaries_charts_and_report() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, dirs) = setup(tmp.path());
    let generator = ScriptedGenerator::new(None);

    let outcome = pipeline::run_in(&config, &dirs, &generator).unwrap();

    for file in [SALES_SUMMARY_FILE, MODELS_BY_YEAR_FILE, MODELS_BY_REGION_FILE] {
        assert!(dirs.root.join(file).is_file(), "missing {}", file);
    }
    let summary: SalesSummary =
        serde_json::from_str(&std::fs::read_to_string(dirs.root.join(SALES_SUMMARY_FILE)).unwrap())
            .unwrap();
    assert_eq!(summary.sales_by_year[&2020], 250);
    assert_eq!(summary.sales_by_year[&2021], 450);
    assert_eq!(summary.sales_by_region_year["North America"][&2021], 0);

    // yearly, regional, models over years, three regions, correlation
    assert_eq!(outcome.charts.len(), 7);
    for chart in &outcome.charts {
        assert!(chart.starts_with(std::fs::canonicalize(&dirs.figures).unwrap()));
        assert!(std::fs::metadata(chart).unwrap().len() > 0);
    }

    // four sections then the merge
    let prompts = generator.prompts.borrow();
    assert_eq!(prompts.len(), 5);
    assert!(prompts[0].contains("![Sales by Year](figures/sales_by_year.png)"));
    assert!(prompts[2].contains("figures/models_by_region_north_america.png"));
    assert!(prompts[4].contains("## Section 1"));
    assert!(prompts[4].contains("## Section 4"));

    let report = std::fs::read_to_string(&outcome.report_path).unwrap();
    assert!(report.starts_with("# BMW Sales Analysis Report\n"));
    assert!(report.contains("_Generated: "));
    assert!(report.contains("*Figure 1: Sales by year*"));
    assert!(outcome.evaluation.has_executive_summary);
    assert_eq!(outcome.evaluation.image_count, 1);

    let html = outcome.html_path.expect("html enabled by default");
    assert!(std::fs::read_to_string(html)
        .unwrap()
        .contains("<img src=\"figures/sales_by_year.png\""));
}

#[test]
fn generation_failure_aborts_without_report() {
    let tmp = tempfile::tempdir().unwrap();
    let (config, dirs) = setup(tmp.path());
    let generator = ScriptedGenerator::new(Some(3));

    let err = pipeline::run_in(&config, &dirs, &generator).unwrap_err();
    match err {
        ReportError::Generation { section, .. } => assert_eq!(section, "models by region"),
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(generator.calls.get(), 3);
    assert!(!dirs.root.join("report.md").exists());
}

#[test]
fn missing_column_aborts_before_any_output() {
    let tmp = tempfile::tempdir().unwrap();
    let (mut config, dirs) = setup(tmp.path());
    let bad = tmp.path().join("bad.csv");
    std::fs::write(&bad, "Year,Region,Model\n2020,Europe,X5\n").unwrap();
    config.dataset_path = bad;

    let generator = ScriptedGenerator::new(None);
    let err = pipeline::run_in(&config, &dirs, &generator).unwrap_err();
    assert!(matches!(err, ReportError::InputData(_)));
    assert_eq!(generator.calls.get(), 0);
    assert!(!dirs.root.join(SALES_SUMMARY_FILE).exists());
}
