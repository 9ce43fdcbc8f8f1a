use crate::error::Result;
use chrono::Local;
use pulldown_cmark::{html, Options, Parser};
use std::path::{Path, PathBuf};
use tracing::info;

pub const REPORT_FILE: &str = "report.md";
pub const HTML_FILE: &str = "report.html";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Compose the markdown document from its title, generation timestamp and
/// sections.
pub fn render_markdown(sections: &[String], title: &str, generated_at: &str) -> String {
    let mut md = format!("# {}\n\n_Generated: {}_\n\n", title, generated_at);
    let body = sections
        .iter()
        .map(|s| s.trim())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR);
    md.push_str(&body);
    md.push('\n');
    md
}

/// Write `report.md` into `out_dir`, replacing any previous report there.
pub fn build_report(sections: &[String], out_dir: &Path, title: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(out_dir)?;
    let generated_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    let md = render_markdown(sections, title, &generated_at);
    let path = out_dir.join(REPORT_FILE);
    std::fs::write(&path, md)?;
    info!(path = %path.display(), sections = sections.len(), "report written");
    Ok(path)
}

/// Render the markdown report as a standalone `report.html` next to it.
/// Relative image paths keep working because both files share a directory.
pub fn export_html(md_path: &Path, out_dir: &Path, title: &str) -> Result<PathBuf> {
    let text = std::fs::read_to_string(md_path)?;
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    let parser = Parser::new_ext(&text, options);
    let mut body = String::new();
    html::push_html(&mut body, parser);

    let page = format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n<style>\nbody {{ font-family: sans-serif; max-width: 960px; margin: 2em auto; line-height: 1.5; }}\n\
         img {{ max-width: 100%; }}\n</style>\n</head>\n<body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    );
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(HTML_FILE);
    std::fs::write(&path, page)?;
    info!(path = %path.display(), "html report written");
    Ok(path)
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportEvaluation {
    pub word_count: usize,
    pub has_executive_summary: bool,
    pub image_count: usize,
}

/// Cheap sanity checks on the final document.
pub fn evaluate_report(text: &str) -> ReportEvaluation {
    ReportEvaluation {
        word_count: text.split_whitespace().count(),
        has_executive_summary: text.to_lowercase().contains("executive summary"),
        image_count: text.matches("![").count(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_layout() {
        let md = render_markdown(
            &["## One\ntext".to_string(), "## Two\n".to_string()],
            "BMW Sales Analysis Report",
            "2024-01-02 03:04:05",
        );
        assert!(md.starts_with("# BMW Sales Analysis Report\n\n_Generated: 2024-01-02 03:04:05_\n\n"));
        assert!(md.contains("## One\ntext\n\n---\n\n## Two\n"));
    }

    #[test]
    fn build_report_creates_dir_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("run");
        let first = build_report(&["FIRST-ONLY content".to_string()], &out, "T").unwrap();
        let second = build_report(&["second".to_string()], &out, "T").unwrap();
        assert_eq!(first, second);
        let text = std::fs::read_to_string(&second).unwrap();
        assert!(text.contains("second"));
        assert!(!text.contains("FIRST-ONLY"));
    }

    #[test]
    fn html_export_renders_images() {
        let dir = tempfile::tempdir().unwrap();
        let md = build_report(
            &["## Trends\n\n![Sales by Year](figures/sales_by_year.png)\n\nUp.".to_string()],
            dir.path(),
            "Sales <Report>",
        )
        .unwrap();
        let html = export_html(&md, dir.path(), "Sales <Report>").unwrap();
        let page = std::fs::read_to_string(html).unwrap();
        assert!(page.contains("<title>Sales &lt;Report&gt;</title>"));
        assert!(page.contains("<img src=\"figures/sales_by_year.png\" alt=\"Sales by Year\""));
        assert!(page.contains("<h2>Trends</h2>"));
    }

    #[test]
    fn evaluation_counts() {
        let eval = evaluate_report("## Executive Summary\nSales rose.\n![a](b.png)");
        assert_eq!(
            eval,
            ReportEvaluation {
                word_count: 6,
                has_executive_summary: true,
                image_count: 1,
            }
        );
    }
}
