use crate::charts::{DEFAULT_HEIGHT, DEFAULT_WIDTH};
use crate::error::{ReportError, Result};
use crate::generator::{GeminiConfig, DEFAULT_BASE_URL, DEFAULT_MODEL};
use chrono::Local;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const FIGURES_DIR: &str = "figures";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub dataset_path: PathBuf,
    pub reports_root: PathBuf,
    pub report_title: String,
    pub model: String,
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub chart_width: u32,
    pub chart_height: u32,
    pub html: bool,
    pub quiet: bool,
    #[serde(skip)]
    pub api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("datasets/bmw_sales_2020_2024.csv"),
            reports_root: PathBuf::from("reports"),
            report_title: "BMW Sales Analysis Report".to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 120,
            chart_width: DEFAULT_WIDTH,
            chart_height: DEFAULT_HEIGHT,
            html: true,
            quiet: false,
            api_key: None,
        }
    }
}

impl Config {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| ReportError::Config(e.to_string()))
    }

    /// Load `path` if given, otherwise start from defaults. The API key is
    /// always taken from the environment, never from the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|e| {
                    ReportError::Config(format!("cannot read {}: {}", p.display(), e))
                })?;
                Self::from_toml_str(&text)?
            }
            None => Self::default(),
        };
        config.api_key = std::env::var(API_KEY_ENV).ok().filter(|k| !k.is_empty());
        Ok(config)
    }

    pub fn gemini(&self) -> GeminiConfig {
        GeminiConfig {
            api_key: self.api_key.clone(),
            model: self.model.clone(),
            base_url: self.api_base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Output directories for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunDirs {
    pub root: PathBuf,
    pub figures: PathBuf,
}

impl RunDirs {
    /// Create `reports_root/run_%Y_%m_%d_%H_%M_%S` and its `figures/` child.
    pub fn create(reports_root: &Path) -> Result<Self> {
        let stamp = Local::now().format("run_%Y_%m_%d_%H_%M_%S").to_string();
        Self::create_named(reports_root, &stamp)
    }

    pub fn create_named(reports_root: &Path, name: &str) -> Result<Self> {
        let root = reports_root.join(name);
        let figures = root.join(FIGURES_DIR);
        std::fs::create_dir_all(&figures)?;
        Ok(Self { root, figures })
    }
}
