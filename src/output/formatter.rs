//! Output formatters for recommendation reports

use crate::config::OutputFormat;
use crate::error::Result;
use crate::input::store::write_atomic;
use crate::output::report::UserReport;
use colored::Colorize;
use log::info;
use std::path::PathBuf;

/// Trait for formatting a user's recommendations
pub trait OutputFormatter {
    fn format_report(&self, report: &UserReport) -> Result<String>;
    fn supports_format(&self) -> OutputFormat;
}

/// Markdown table, the format sent to job seekers
pub struct MarkdownFormatter;

/// JSON list of report rows
pub struct JsonFormatter {
    pretty: bool,
}

/// Terminal listing for the `recommend` command
pub struct ConsoleFormatter {
    use_colors: bool,
}

const MARKDOWN_HEADER: &str = "# 🚀 Latest Job Offers Recommendations!\n\
| 🗃️ **Job offer** | 🌡️**Score** | 🗓️ **publication_date** |\n\
|---|---|---|\n";

impl OutputFormatter for MarkdownFormatter {
    fn format_report(&self, report: &UserReport) -> Result<String> {
        let mut markdown = String::from(MARKDOWN_HEADER);
        for row in report.rows() {
            markdown.push_str(&format!(
                "| [{}]({}) | {:.2}% | {} |\n",
                escape_cell(&row.job_offer),
                row.link,
                row.score * 100.0,
                row.publication_date.format("%Y-%m-%d")
            ));
        }
        Ok(markdown)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Markdown
    }
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }
}

impl OutputFormatter for JsonFormatter {
    fn format_report(&self, report: &UserReport) -> Result<String> {
        let rows = report.rows();
        let json = if self.pretty {
            serde_json::to_string_pretty(&rows)?
        } else {
            serde_json::to_string(&rows)?
        };
        Ok(json)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Json
    }
}

impl ConsoleFormatter {
    pub fn new(use_colors: bool) -> Self {
        Self { use_colors }
    }

    fn score_badge(&self, score: f64) -> String {
        let text = format!("{:>6.2}%", score * 100.0);
        if !self.use_colors {
            return text;
        }
        if score >= 0.8 {
            text.green().bold().to_string()
        } else if score >= 0.6 {
            text.yellow().to_string()
        } else {
            text.red().to_string()
        }
    }
}

impl OutputFormatter for ConsoleFormatter {
    fn format_report(&self, report: &UserReport) -> Result<String> {
        let title = format!("Recommendations for {}", report.user_id);
        let mut output = if self.use_colors {
            format!("{}\n", title.bold().blue())
        } else {
            format!("{}\n", title)
        };

        if report.is_empty() {
            output.push_str("  No matches from the last run\n");
            return Ok(output);
        }

        for rec in &report.recommendations {
            output.push_str(&format!(
                "  {}  {}  {} @ {}\n      {}\n",
                self.score_badge(rec.score),
                rec.publication_date,
                rec.vacancy_name,
                rec.company,
                rec.link
            ));
        }
        Ok(output)
    }

    fn supports_format(&self) -> OutputFormat {
        OutputFormat::Console
    }
}

/// Writes one report file per user under the output directory
pub struct ReportWriter {
    output_dir: PathBuf,
    format: OutputFormat,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        Self {
            output_dir: output_dir.into(),
            format,
        }
    }

    pub fn report_path(&self, user_id: &str) -> PathBuf {
        let extension = match self.format {
            OutputFormat::Markdown => "md",
            OutputFormat::Json => "json",
            OutputFormat::Console => "txt",
        };
        self.output_dir.join(format!("{}.{}", user_id, extension))
    }

    pub fn render(&self, report: &UserReport) -> Result<String> {
        match self.format {
            OutputFormat::Markdown => MarkdownFormatter.format_report(report),
            OutputFormat::Json => JsonFormatter::new(true).format_report(report),
            OutputFormat::Console => ConsoleFormatter::new(false).format_report(report),
        }
    }

    pub fn save(&self, report: &UserReport) -> Result<PathBuf> {
        let path = self.report_path(&report.user_id);
        let content = self.render(report)?;
        write_atomic(&path, content.as_bytes())?;
        info!("Report saved to: {}", path.display());
        Ok(path)
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|")
}
