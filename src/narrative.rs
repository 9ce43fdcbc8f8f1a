use crate::error::{ReportError, Result};
use crate::generator::{response_text, TextGenerator};
use crate::types::{FeatureCorrelation, ModelRanking, RegionModelRanking, SalesSummary};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub const SECTION_SALES_TREND: &str = "sales trend";
pub const SECTION_MODELS_OVER_YEARS: &str = "models over years";
pub const SECTION_MODELS_BY_REGION: &str = "models by region";
pub const SECTION_SALES_DRIVERS: &str = "sales drivers";
pub const SECTION_COMBINED: &str = "combined report";

const ANALYST_ROLE: &str = "You are a senior automotive sales analyst writing one section \
of a BMW sales analysis report.";

const FORMAT_RULES: &str = "Formatting rules:
- Write GitHub-flavoured Markdown. Start the section with a level-2 heading.
- Insert each image with the syntax ![<alt text>](<path>) using exactly the path given below.
- Place every image immediately BEFORE the paragraph that discusses it.
- Only quote figures that appear in the data; do not invent numbers.
- Keep paragraphs short and concrete.";

/// An image to reference from generated text: alt text plus the path
/// relative to the report document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    pub alt: String,
    pub path: String,
}

impl ImageRef {
    pub fn markdown(&self) -> String {
        format!("![{}]({})", self.alt, self.path)
    }
}

fn bullet_list(items: &[&str]) -> String {
    items
        .iter()
        .map(|i| format!("- {}", i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn section_prompt<T: Serialize>(
    topic: &str,
    goals: &[&str],
    images: &[ImageRef],
    data: &T,
) -> Result<String> {
    let data = serde_json::to_string_pretty(data)?;
    let images = if images.is_empty() {
        "(no images for this section)".to_string()
    } else {
        images
            .iter()
            .map(|i| format!("- {}", i.markdown()))
            .collect::<Vec<_>>()
            .join("\n")
    };
    Ok(format!(
        "{role}\n\nSection topic: {topic}\n\nSection goals:\n{goals}\n\n{rules}\n\n\
         Images available for this section:\n{images}\n\nData (JSON):\n```json\n{data}\n```\n",
        role = ANALYST_ROLE,
        topic = topic,
        goals = bullet_list(goals),
        rules = FORMAT_RULES,
        images = images,
        data = data,
    ))
}

pub fn sales_trend_prompt(summary: &SalesSummary, images: &[ImageRef]) -> Result<String> {
    section_prompt(
        "Overall and regional sales trends",
        &[
            "Describe how total sales volume moved year over year, naming peak and trough years.",
            "Compare regions: which grew, which declined, and which dominate volume.",
            "Call out any year where regional trends diverge from the global trend.",
        ],
        images,
        summary,
    )
}

pub fn models_over_years_prompt(ranking: &ModelRanking, images: &[ImageRef]) -> Result<String> {
    section_prompt(
        "Model performance across years",
        &[
            "Identify the best-selling models each year and how their ranking changed.",
            "Point out models with sustained growth or decline.",
            "Note any model whose share shifted sharply between consecutive years.",
        ],
        images,
        ranking,
    )
}

pub fn models_by_region_prompt(
    ranking: &RegionModelRanking,
    images: &[ImageRef],
) -> Result<String> {
    section_prompt(
        "Regional model performance",
        &[
            "For each region, name the leading models and how they evolved over the years.",
            "Contrast model preferences between regions.",
            "Highlight regions where an otherwise strong model underperforms.",
        ],
        images,
        ranking,
    )
}

pub fn correlation_prompt(ranking: &[FeatureCorrelation], images: &[ImageRef]) -> Result<String> {
    section_prompt(
        "Key drivers of sales volume",
        &[
            "Explain which one-hot encoded features (years, regions, models) correlate most with sales volume.",
            "Distinguish positive from negative drivers and mention weak or negligible ones briefly.",
            "Remind the reader that correlation does not imply causation.",
        ],
        images,
        &ranking,
    )
}

pub fn combine_prompt(sections: &[String], title: &str) -> String {
    let body = sections
        .iter()
        .enumerate()
        .map(|(i, s)| format!("### Input section {}\n\n{}", i + 1, s.trim()))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");
    format!(
        "You are the editor of the \"{title}\". Merge the analysis sections below into one \
         consolidated, non-repetitive document.\n\n\
         Required structure:\n\
         - ## Executive Summary\n\
         - ## Analysis, with one ### subsection per topic covered by the inputs\n\
         - ## Recommendations\n\n\
         Rules:\n\
         - Preserve every image reference of the form ![alt](path) exactly as written, \
         including its path, and keep it before the paragraph that discusses it.\n\
         - Immediately after each image reference insert a caption line \
         `*Figure N: <short description>*`, numbering figures sequentially from 1 \
         in order of appearance.\n\
         - Do not add a document title; it is added separately.\n\
         - Do not invent numbers that are not in the inputs.\n\n\
         {body}\n",
        title = title,
        body = body,
    )
}

pub struct NarrativeAssembler<'a, G: TextGenerator + ?Sized> {
    generator: &'a G,
    figures_rel: String,
}

impl<'a, G: TextGenerator + ?Sized> NarrativeAssembler<'a, G> {
    /// `figures_rel` is the figures directory as seen from the report file,
    /// normally `figures`.
    pub fn new(generator: &'a G, figures_rel: impl Into<String>) -> Self {
        Self {
            generator,
            figures_rel: figures_rel.into(),
        }
    }

    pub fn image_ref(&self, alt: &str, chart: &Path) -> ImageRef {
        let file = chart
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_default();
        let path = if self.figures_rel.is_empty() {
            file
        } else {
            format!("{}/{}", self.figures_rel.trim_end_matches('/'), file)
        };
        ImageRef {
            alt: alt.to_string(),
            path,
        }
    }

    fn generate(&self, section: &str, prompt: &str) -> Result<String> {
        info!(section, "generating narrative");
        let response = self
            .generator
            .generate(prompt)
            .map_err(|source| ReportError::Generation {
                section: section.to_string(),
                source,
            })?;
        let text = response_text(&response);
        if text.is_empty() {
            warn!(section, "generator returned no text");
        }
        Ok(text)
    }

    pub fn analyze_sales_trend(
        &self,
        summary: &SalesSummary,
        yearly_chart: &Path,
        regional_chart: &Path,
    ) -> Result<String> {
        let images = [
            self.image_ref("Sales by Year", yearly_chart),
            self.image_ref("Sales by Region and Year", regional_chart),
        ];
        let prompt = sales_trend_prompt(summary, &images)?;
        self.generate(SECTION_SALES_TREND, &prompt)
    }

    pub fn analyze_models_over_years(&self, ranking: &ModelRanking, chart: &Path) -> Result<String> {
        let images = [self.image_ref("Model Sales Over Years", chart)];
        let prompt = models_over_years_prompt(ranking, &images)?;
        self.generate(SECTION_MODELS_OVER_YEARS, &prompt)
    }

    pub fn analyze_models_by_region(
        &self,
        ranking: &RegionModelRanking,
        charts: &BTreeMap<String, PathBuf>,
    ) -> Result<String> {
        let images: Vec<ImageRef> = charts
            .iter()
            .map(|(region, path)| self.image_ref(&format!("Model Sales in {}", region), path))
            .collect();
        let prompt = models_by_region_prompt(ranking, &images)?;
        self.generate(SECTION_MODELS_BY_REGION, &prompt)
    }

    pub fn analyze_correlation(&self, ranking: &[FeatureCorrelation], chart: &Path) -> Result<String> {
        let images = [self.image_ref("Feature Correlation with Sales Volume", chart)];
        let prompt = correlation_prompt(ranking, &images)?;
        self.generate(SECTION_SALES_DRIVERS, &prompt)
    }

    pub fn combine_sections(&self, sections: &[String], title: &str) -> Result<String> {
        let prompt = combine_prompt(sections, title);
        self.generate(SECTION_COMBINED, &prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::summarize_sales;
    use crate::error::GeneratorError;
    use crate::generator::{GeminiClient, GeminiConfig, GenerateResponse};
    use crate::types::SalesRecord;
    use std::cell::RefCell;
    use std::net::TcpListener;
    use std::time::Duration;

    struct Recording {
        reply: Option<GenerateResponse>,
        prompts: RefCell<Vec<String>>,
    }

    impl Recording {
        fn replying(reply: Option<GenerateResponse>) -> Self {
            Self {
                reply,
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    impl TextGenerator for Recording {
        fn generate(&self, prompt: &str) -> std::result::Result<GenerateResponse, GeneratorError> {
            self.prompts.borrow_mut().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| GeneratorError::Status {
                status: 429,
                body: "quota exceeded".into(),
            })
        }
    }

    fn summary() -> SalesSummary {
        summarize_sales(&[
            SalesRecord::new(2020, "Europe", "X5", 100.0),
            SalesRecord::new(2021, "Asia", "X3", 150.0),
        ])
    }

    #[test]
    fn prompt_embeds_images_and_data() {
        let gen = Recording::replying(Some(GenerateResponse::from_text("## Trends")));
        let assembler = NarrativeAssembler::new(&gen, "figures");
        let text = assembler
            .analyze_sales_trend(
                &summary(),
                Path::new("/tmp/run/figures/sales_by_year.png"),
                Path::new("/tmp/run/figures/sales_by_region_year.png"),
            )
            .unwrap();
        assert_eq!(text, "## Trends");

        let prompts = gen.prompts.borrow();
        let prompt = &prompts[0];
        assert!(prompt.contains("![Sales by Year](figures/sales_by_year.png)"));
        assert!(prompt.contains("![Sales by Region and Year](figures/sales_by_region_year.png)"));
        assert!(prompt.contains("\"sales_by_region_year\""));
        assert!(prompt.contains("\"2020\": 100"));
        assert!(!prompt.contains("/tmp/run"));
    }

    #[test]
    fn zero_candidates_gives_empty_section() {
        let gen = Recording::replying(Some(GenerateResponse::default()));
        let assembler = NarrativeAssembler::new(&gen, "figures");
        let text = assembler
            .analyze_correlation(&[], Path::new("correlation_with_sales.png"))
            .unwrap();
        assert_eq!(text, "");
    }

    #[test]
    fn generator_failure_names_section() {
        let gen = Recording::replying(None);
        let assembler = NarrativeAssembler::new(&gen, "figures");
        let err = assembler
            .analyze_models_over_years(&ModelRanking::new(), Path::new("m.png"))
            .unwrap_err();
        match err {
            ReportError::Generation { section, source } => {
                assert_eq!(section, SECTION_MODELS_OVER_YEARS);
                assert!(matches!(source, GeneratorError::Status { status: 429, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn expired_timeout_is_a_generation_error() {
        // Accepted by the kernel backlog but never read or answered.
        let silent = TcpListener::bind("127.0.0.1:0").unwrap();
        let client = GeminiClient::new(GeminiConfig {
            api_key: Some("test-key".into()),
            base_url: format!("http://{}", silent.local_addr().unwrap()),
            timeout: Duration::from_secs(1),
            ..GeminiConfig::default()
        })
        .unwrap();
        let assembler = NarrativeAssembler::new(&client, "figures");

        let err = assembler
            .combine_sections(&["## A".to_string()], "Report")
            .unwrap_err();
        match err {
            ReportError::Generation {
                section,
                source: GeneratorError::Transport(e),
            } => {
                assert_eq!(section, SECTION_COMBINED);
                assert!(e.is_timeout(), "{e}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        drop(silent);
    }

    #[test]
    fn region_prompt_lists_every_region_chart() {
        let gen = Recording::replying(Some(GenerateResponse::from_text("ok")));
        let assembler = NarrativeAssembler::new(&gen, "figures/");
        let charts = BTreeMap::from([
            ("Asia".to_string(), PathBuf::from("/x/models_by_region_asia.png")),
            ("Europe".to_string(), PathBuf::from("/x/models_by_region_europe.png")),
        ]);
        assembler
            .analyze_models_by_region(&RegionModelRanking::new(), &charts)
            .unwrap();
        let prompt = gen.prompts.borrow()[0].clone();
        assert!(prompt.contains("![Model Sales in Asia](figures/models_by_region_asia.png)"));
        assert!(prompt.contains("![Model Sales in Europe](figures/models_by_region_europe.png)"));
    }

    #[test]
    fn combine_prompt_keeps_sections_in_order() {
        let sections = vec![
            "## A\n![a](figures/a.png)".to_string(),
            "## B".to_string(),
        ];
        let prompt = combine_prompt(&sections, "BMW Sales Analysis Report");
        let a = prompt.find("### Input section 1").unwrap();
        let b = prompt.find("### Input section 2").unwrap();
        assert!(a < b);
        assert!(prompt.contains("![a](figures/a.png)"));
        assert!(prompt.contains("Executive Summary"));
        assert!(prompt.contains("Recommendations"));
        assert!(prompt.contains("*Figure N:"));
    }
}
