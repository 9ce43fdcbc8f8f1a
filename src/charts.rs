use crate::error::{BoxedCause, ReportError, Result};
use crate::types::{
    FeatureCorrelation, ModelRanking, RegionModelRanking, RegionYearSummary, YearlySummary,
};
use crate::util::{format_int, slugify};
use once_cell::sync::Lazy;
use plotters::prelude::*;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

pub const DEFAULT_WIDTH: u32 = 1000;
pub const DEFAULT_HEIGHT: u32 = 560;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChartKind {
    Yearly,
    RegionYear,
    ModelsOverYears,
    ModelsByRegion,
    Correlation,
}

impl ChartKind {
    pub const ALL: [ChartKind; 5] = [
        ChartKind::Yearly,
        ChartKind::RegionYear,
        ChartKind::ModelsOverYears,
        ChartKind::ModelsByRegion,
        ChartKind::Correlation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChartKind::Yearly => "sales_by_year",
            ChartKind::RegionYear => "sales_by_region_year",
            ChartKind::ModelsOverYears => "models_over_years",
            ChartKind::ModelsByRegion => "models_by_region",
            ChartKind::Correlation => "correlation",
        }
    }
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static CHART_KINDS: Lazy<BTreeMap<&'static str, ChartKind>> =
    Lazy::new(|| ChartKind::ALL.iter().map(|k| (k.name(), *k)).collect());

impl FromStr for ChartKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        CHART_KINDS
            .get(s.trim())
            .copied()
            .ok_or_else(|| ReportError::UnknownChart {
                name: s.to_string(),
                available: CHART_KINDS.keys().copied().collect::<Vec<_>>().join(", "),
            })
    }
}

/// Strength buckets used to colour the correlation bars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CorrelationBand {
    StrongPositive,
    MediumPositive,
    WeakPositive,
    Negligible,
    WeakNegative,
    MediumNegative,
    StrongNegative,
}

impl CorrelationBand {
    pub fn classify(r: f64) -> Self {
        if r >= 0.6 {
            Self::StrongPositive
        } else if r >= 0.3 {
            Self::MediumPositive
        } else if r >= 0.1 {
            Self::WeakPositive
        } else if r > -0.1 {
            Self::Negligible
        } else if r > -0.3 {
            Self::WeakNegative
        } else if r > -0.6 {
            Self::MediumNegative
        } else {
            Self::StrongNegative
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::StrongPositive => "Strong positive (>= 0.6)",
            Self::MediumPositive => "Medium positive (0.3 to 0.6)",
            Self::WeakPositive => "Weak positive (0.1 to 0.3)",
            Self::Negligible => "Negligible (-0.1 to 0.1)",
            Self::WeakNegative => "Weak negative (-0.3 to -0.1)",
            Self::MediumNegative => "Medium negative (-0.6 to -0.3)",
            Self::StrongNegative => "Strong negative (<= -0.6)",
        }
    }

    pub fn color(self) -> RGBColor {
        match self {
            Self::StrongPositive => RGBColor(0, 100, 0),
            Self::MediumPositive => RGBColor(46, 160, 67),
            Self::WeakPositive => RGBColor(144, 210, 140),
            Self::Negligible => RGBColor(170, 170, 170),
            Self::WeakNegative => RGBColor(244, 165, 130),
            Self::MediumNegative => RGBColor(214, 96, 77),
            Self::StrongNegative => RGBColor(160, 20, 30),
        }
    }
}

type DrawResult = std::result::Result<(), BoxedCause>;

struct Line {
    label: String,
    points: Vec<(i32, i64)>,
}

/// Each `render_*` writes one PNG into `out_dir` (created on demand) and
/// returns its absolute path. Empty inputs are rejected before drawing.
#[derive(Debug, Clone)]
pub struct ChartRenderer {
    out_dir: PathBuf,
    width: u32,
    height: u32,
}

impl ChartRenderer {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width.max(200);
        self.height = height.max(150);
        self
    }

    fn target(&self, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.out_dir)?;
        Ok(std::fs::canonicalize(&self.out_dir)?.join(file_name))
    }

    /// Line chart of total sales per year.
    pub fn render_yearly(&self, summary: &YearlySummary) -> Result<PathBuf> {
        if summary.is_empty() {
            return Err(ReportError::empty("yearly sales"));
        }
        let path = self.target("sales_by_year.png")?;
        let lines = [Line {
            label: "Total sales".to_string(),
            points: summary.iter().map(|(y, v)| (*y, *v)).collect(),
        }];
        draw_lines(&path, (self.width, self.height), "Sales by Year", "Sales volume", &lines)
            .map_err(|e| ReportError::render(ChartKind::Yearly, e))?;
        debug!(path = %path.display(), "rendered yearly chart");
        Ok(path)
    }

    /// One line per region over the union of all years; gaps plot as zero.
    pub fn render_region_year(&self, summary: &RegionYearSummary) -> Result<PathBuf> {
        let years: BTreeSet<i32> = summary.values().flat_map(|ys| ys.keys().copied()).collect();
        if years.is_empty() {
            return Err(ReportError::empty("regional sales"));
        }
        let path = self.target("sales_by_region_year.png")?;
        let lines: Vec<Line> = summary
            .iter()
            .map(|(region, by_year)| Line {
                label: region.clone(),
                points: years
                    .iter()
                    .map(|y| (*y, by_year.get(y).copied().unwrap_or(0)))
                    .collect(),
            })
            .collect();
        draw_lines(
            &path,
            (self.width, self.height),
            "Sales by Region and Year",
            "Sales volume",
            &lines,
        )
        .map_err(|e| ReportError::render(ChartKind::RegionYear, e))?;
        debug!(path = %path.display(), "rendered region/year chart");
        Ok(path)
    }

    /// One line per model seen in any year of `ranking`.
    pub fn render_models_over_years(&self, ranking: &ModelRanking, title: &str) -> Result<PathBuf> {
        if ranking.values().all(|models| models.is_empty()) {
            return Err(ReportError::empty(format!("models over years ({})", title)));
        }
        let path = self.target(&format!("models_over_years_{}.png", slugify(title)))?;
        draw_lines(
            &path,
            (self.width, self.height),
            &format!("Model Sales Over Years ({})", title),
            "Total sales",
            &model_lines(ranking),
        )
        .map_err(|e| ReportError::render(ChartKind::ModelsOverYears, e))?;
        debug!(path = %path.display(), "rendered models-over-years chart");
        Ok(path)
    }

    /// Model sales over years restricted to `region`.
    pub fn render_models_by_region(
        &self,
        ranking: &RegionModelRanking,
        region: &str,
    ) -> Result<PathBuf> {
        self.render_region_as(ranking, region, &slugify(region))
    }

    fn render_region_as(
        &self,
        ranking: &RegionModelRanking,
        region: &str,
        stem: &str,
    ) -> Result<PathBuf> {
        let by_year = ranking
            .get(region)
            .filter(|years| years.values().any(|models| !models.is_empty()))
            .ok_or_else(|| ReportError::empty(format!("region {}", region)))?;
        let path = self.target(&format!("models_by_region_{}.png", stem))?;
        draw_lines(
            &path,
            (self.width, self.height),
            &format!("Model Sales Over Years in {}", region),
            "Total sales",
            &model_lines(by_year),
        )
        .map_err(|e| ReportError::render(ChartKind::ModelsByRegion, e))?;
        debug!(path = %path.display(), region, "rendered regional model chart");
        Ok(path)
    }

    /// One chart per region in the ranking, each in its own file. Regions
    /// whose names share a slug (`"North America"`, `"North-America"`) are
    /// numbered in map order: `north_america`, `north_america_2`, ...
    pub fn render_all_regions(&self, ranking: &RegionModelRanking) -> Result<BTreeMap<String, PathBuf>> {
        let mut used: BTreeSet<String> = BTreeSet::new();
        let mut paths = BTreeMap::new();
        for region in ranking.keys() {
            let base = slugify(region);
            let mut stem = base.clone();
            let mut n = 1;
            while !used.insert(stem.clone()) {
                n += 1;
                stem = format!("{}_{}", base, n);
            }
            paths.insert(region.clone(), self.render_region_as(ranking, region, &stem)?);
        }
        Ok(paths)
    }

    /// Horizontal bars sorted by |r| (largest on top), coloured by band.
    pub fn render_correlation(&self, ranking: &[FeatureCorrelation]) -> Result<PathBuf> {
        if ranking.is_empty() {
            return Err(ReportError::empty("correlation ranking"));
        }
        let bars = bars_by_magnitude(ranking);
        let path = self.target("correlation_with_sales.png")?;
        let height = self.height.max(120 + 26 * bars.len() as u32);
        draw_correlation(&path, (self.width, height), &bars)
            .map_err(|e| ReportError::render(ChartKind::Correlation, e))?;
        debug!(path = %path.display(), bars = bars.len(), "rendered correlation chart");
        Ok(path)
    }
}

/// Largest |r| first; equal magnitudes fall back to feature name.
fn bars_by_magnitude(ranking: &[FeatureCorrelation]) -> Vec<&FeatureCorrelation> {
    let mut bars: Vec<&FeatureCorrelation> = ranking.iter().collect();
    bars.sort_by(|a, b| {
        b.correlation
            .abs()
            .total_cmp(&a.correlation.abs())
            .then_with(|| a.feature.cmp(&b.feature))
    });
    bars
}

fn model_lines(ranking: &ModelRanking) -> Vec<Line> {
    let models: BTreeSet<&str> = ranking
        .values()
        .flat_map(|ms| ms.iter().map(|m| m.model.as_str()))
        .collect();
    models
        .into_iter()
        .map(|model| Line {
            label: model.to_string(),
            points: ranking
                .iter()
                .map(|(year, ms)| {
                    let total = ms
                        .iter()
                        .find(|m| m.model == model)
                        .map_or(0, |m| m.total_sales);
                    (*year, total)
                })
                .collect(),
        })
        .collect()
}

fn draw_lines(path: &Path, size: (u32, u32), title: &str, y_desc: &str, lines: &[Line]) -> DrawResult {
    let years: BTreeSet<i32> = lines
        .iter()
        .flat_map(|l| l.points.iter().map(|p| p.0))
        .collect();
    let (first, last) = match (years.first(), years.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return Err("no points to plot".into()),
    };
    // A single year still needs a non-empty axis. Years span all of i32.
    let (x_min, x_max) = if first == last {
        (first.saturating_sub(1), last.saturating_add(1))
    } else {
        (first, last)
    };
    let x_labels = (i64::from(x_max) - i64::from(x_min) + 1).min(12) as usize;
    let y_peak = lines
        .iter()
        .flat_map(|l| l.points.iter().map(|p| p.1))
        .max()
        .unwrap_or(0)
        .max(1);
    let y_top = (y_peak as f64 * 1.1).ceil() as i64;

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(90)
        .build_cartesian_2d(x_min..x_max, 0i64..y_top)?;

    chart
        .configure_mesh()
        .x_labels(x_labels)
        .x_label_formatter(&|y| y.to_string())
        .y_label_formatter(&|v| format_int(*v))
        .x_desc("Year")
        .y_desc(y_desc)
        .draw()?;

    for (idx, line) in lines.iter().enumerate() {
        let style = Palette99::pick(idx).stroke_width(2);
        chart
            .draw_series(LineSeries::new(line.points.iter().copied(), style))?
            .label(line.label.as_str())
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style));
        chart.draw_series(
            line.points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, style.filled())),
        )?;
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn draw_correlation(path: &Path, size: (u32, u32), bars: &[&FeatureCorrelation]) -> DrawResult {
    let n = bars.len() as i32;
    // Row 0 is drawn at the bottom, so the first bar gets the top row.
    let row_of = |i: usize| n - 1 - i as i32;
    let label_width = bars
        .iter()
        .map(|b| b.feature.chars().count())
        .max()
        .unwrap_or(0) as u32
        * 8
        + 20;

    let root = BitMapBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Feature Correlation with Sales Volume", ("sans-serif", 28))
        .margin(15)
        .x_label_area_size(40)
        .y_label_area_size(label_width.clamp(80, 320))
        .build_cartesian_2d(-1.0f64..1.0f64, (0..n).into_segmented())?;

    let label_at = |v: &SegmentValue<i32>| match v {
        SegmentValue::CenterOf(row) if (0..n).contains(row) => {
            bars[(n - 1 - row) as usize].feature.clone()
        }
        _ => String::new(),
    };
    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(bars.len())
        .y_label_formatter(&label_at)
        .x_label_formatter(&|v| format!("{:.1}", v))
        .x_desc("Pearson correlation")
        .draw()?;

    chart.draw_series(bars.iter().enumerate().map(|(i, bar)| {
        let row = row_of(i);
        let color = CorrelationBand::classify(bar.correlation).color();
        let mut rect = Rectangle::new(
            [
                (0.0, SegmentValue::Exact(row)),
                (bar.correlation, SegmentValue::Exact(row + 1)),
            ],
            color.filled(),
        );
        rect.set_margin(3, 3, 0, 0);
        rect
    }))?;

    chart.draw_series(LineSeries::new(
        vec![(0.0, SegmentValue::Exact(0)), (0.0, SegmentValue::Exact(n))],
        BLACK.stroke_width(1),
    ))?;

    let bands: BTreeSet<CorrelationBand> = bars
        .iter()
        .map(|b| CorrelationBand::classify(b.correlation))
        .collect();
    for band in bands {
        let color = band.color();
        chart
            .draw_series(std::iter::empty::<Rectangle<(f64, SegmentValue<i32>)>>())?
            .label(band.label())
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 15, y + 5)], color.filled()));
    }
    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(WHITE.mix(0.85))
        .border_style(BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}
