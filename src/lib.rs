//! Sales analysis reports: aggregate a Year/Region/Model/Sales_Volume
//! dataset, chart the aggregates, have a text generator narrate them, and
//! assemble everything into one markdown (and HTML) report.

pub mod aggregate;
pub mod charts;
pub mod config;
pub mod error;
pub mod generator;
pub mod loader;
pub mod narrative;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod types;
pub mod util;

pub use error::{GeneratorError, ReportError, Result};
