use crate::charts::ChartKind;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReportError>;

/// Boxed cause from a collaborator we do not own (plotters backends).
pub type BoxedCause = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Input data error: {0}")]
    InputData(String),

    #[error("No data available for {scope}")]
    EmptyInput { scope: String },

    #[error("Failed to render {chart} chart: {source}")]
    Render {
        chart: ChartKind,
        #[source]
        source: BoxedCause,
    },

    #[error("Text generation failed for section '{section}': {source}")]
    Generation {
        section: String,
        #[source]
        source: GeneratorError,
    },

    #[error("Unknown chart type '{name}' (available: {available})")]
    UnknownChart { name: String, available: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ReportError {
    pub fn empty(scope: impl Into<String>) -> Self {
        Self::EmptyInput {
            scope: scope.into(),
        }
    }

    pub fn render(chart: ChartKind, source: impl Into<BoxedCause>) -> Self {
        Self::Render {
            chart,
            source: source.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum GeneratorError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("no API key configured (set GEMINI_API_KEY)")]
    MissingApiKey,
}
