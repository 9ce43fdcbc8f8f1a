// Entry point and high-level CLI flow.
//
// - `run` executes the full pipeline into a fresh timestamped folder.
// - `summarize` stops after aggregation: JSON summaries plus console previews,
//   no network access.
// - `chart` re-renders one chart from a previously written JSON summary.
use anyhow::Context;
use clap::{Parser, Subcommand};
use sales_report::charts::{ChartKind, ChartRenderer};
use sales_report::config::Config;
use sales_report::generator::GeminiClient;
use sales_report::output::read_json;
use sales_report::pipeline::{self, Summaries, ALL_REGIONS_TITLE};
use sales_report::types::{FeatureCorrelation, ModelRanking, RegionModelRanking, SalesSummary};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "sales_report", version, about = "Sales analysis report generator")]
struct Cli {
    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Dataset CSV (overrides the config file).
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Folder that receives one `run_*` directory per invocation.
    #[arg(long, global = true)]
    reports_root: Option<PathBuf>,

    /// Text generation model name.
    #[arg(long, global = true)]
    model: Option<String>,

    /// Suppress spinners.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline and write the final report.
    Run {
        /// Skip the HTML rendering of the report.
        #[arg(long)]
        no_html: bool,
    },
    /// Aggregate the dataset and write the JSON summaries only.
    Summarize {
        /// Output folder for the summaries.
        #[arg(long, default_value = ".")]
        out: PathBuf,
        /// Rows shown per console preview table.
        #[arg(long, default_value_t = 5)]
        preview_rows: usize,
    },
    /// Render one chart from a JSON summary written by `summarize` or `run`.
    Chart {
        /// sales_by_year, sales_by_region_year, models_over_years, models_by_region or correlation.
        kind: ChartKind,
        #[arg(long)]
        summary: PathBuf,
        #[arg(long, default_value = "figures")]
        out: PathBuf,
        /// Restrict `models_by_region` to one region (default: every region).
        #[arg(long)]
        region: Option<String>,
        /// Title suffix for `models_over_years`.
        #[arg(long, default_value = ALL_REGIONS_TITLE)]
        title: String,
    },
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "sales_report=info",
        1 => "sales_report=debug",
        _ => "sales_report=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(d) = &cli.dataset {
        config.dataset_path = d.clone();
    }
    if let Some(r) = &cli.reports_root {
        config.reports_root = r.clone();
    }
    if let Some(m) = &cli.model {
        config.model = m.clone();
    }
    config.quiet |= cli.quiet;
    Ok(config)
}

fn render_chart(
    kind: ChartKind,
    summary: &Path,
    renderer: &ChartRenderer,
    region: Option<&str>,
    title: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    let context = || format!("reading {} summary {}", kind, summary.display());
    let paths = match kind {
        ChartKind::Yearly => {
            let s: SalesSummary = read_json(summary).with_context(context)?;
            vec![renderer.render_yearly(&s.sales_by_year)?]
        }
        ChartKind::RegionYear => {
            let s: SalesSummary = read_json(summary).with_context(context)?;
            vec![renderer.render_region_year(&s.sales_by_region_year)?]
        }
        ChartKind::ModelsOverYears => {
            let r: ModelRanking = read_json(summary).with_context(context)?;
            vec![renderer.render_models_over_years(&r, title)?]
        }
        ChartKind::ModelsByRegion => {
            let r: RegionModelRanking = read_json(summary).with_context(context)?;
            match region {
                Some(name) => vec![renderer.render_models_by_region(&r, name)?],
                None => renderer.render_all_regions(&r)?.into_values().collect(),
            }
        }
        ChartKind::Correlation => {
            let c: Vec<FeatureCorrelation> = read_json(summary).with_context(context)?;
            vec![renderer.render_correlation(&c)?]
        }
    };
    Ok(paths)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let mut config = build_config(&cli)?;

    match &cli.command {
        Command::Run { no_html } => {
            config.html &= !*no_html;
            let client = GeminiClient::new(config.gemini()).context("creating text generation client")?;
            let outcome = pipeline::run(&config, &client).context("pipeline run failed")?;
            println!("Charts written: {}", outcome.charts.len());
            if let Some(html) = &outcome.html_path {
                println!("HTML report saved to: {}", html.display());
            }
            println!("Final report saved to: {}", outcome.report_path.display());
        }
        Command::Summarize { out, preview_rows } => {
            let (records, _) = pipeline::load(&config).context("loading dataset")?;
            let summaries = Summaries::from_records(&records);
            summaries.persist(out).context("writing summaries")?;
            summaries.print_previews(*preview_rows);
            println!("Summaries saved to: {}", out.display());
        }
        Command::Chart {
            kind,
            summary,
            out,
            region,
            title,
        } => {
            let renderer = ChartRenderer::new(out).with_size(config.chart_width, config.chart_height);
            for path in render_chart(*kind, summary, &renderer, region.as_deref(), title)? {
                println!("{}", path.display());
            }
        }
    }
    Ok(())
}
