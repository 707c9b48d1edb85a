//! Report generation for ranked recommendations

pub mod formatter;
pub mod report;

pub use formatter::{ConsoleFormatter, JsonFormatter, MarkdownFormatter, OutputFormatter, ReportWriter};
pub use report::{ReportRow, UserReport};
