use colored::Colorize;
use miette::Result;

use super::{MergeResult, MergingReport, ReportRecord, Severity};

/// Terminal reporter with colored output
pub struct TerminalReporter {
    /// Print INFO records too
    show_info: bool,
}

impl TerminalReporter {
    pub fn new() -> Self {
        Self { show_info: true }
    }

    pub fn with_info(mut self, show: bool) -> Self {
        self.show_info = show;
        self
    }

    pub fn report(&self, report: &MergingReport) -> Result<()> {
        print!("{}", self.render(report));
        Ok(())
    }

    /// Full text of the report, grouped by severity
    pub fn render(&self, report: &MergingReport) -> String {
        let mut out = String::new();
        let result = match report.result() {
            MergeResult::Success => "SUCCESS".green().bold(),
            MergeResult::Warning => "WARNING".yellow().bold(),
            MergeResult::Error => "ERROR".red().bold(),
        };
        out.push_str(&format!("Merging result: {}\n", result));

        for severity in [Severity::Error, Severity::Warning, Severity::Info] {
            if severity == Severity::Info && !self.show_info {
                continue;
            }
            let records: Vec<&ReportRecord> = report.records_with(severity).collect();
            if records.is_empty() {
                continue;
            }
            out.push('\n');
            let header = match severity {
                Severity::Error => format!("{} errors:", records.len()).red().bold(),
                Severity::Warning => format!("{} warnings:", records.len()).yellow().bold(),
                Severity::Info => format!("{} info:", records.len()).blue().bold(),
            };
            out.push_str(&format!("{}\n", header));
            for record in records {
                out.push_str(&self.render_record(record, report.simple_filenames()));
            }
        }

        if !report.intermediary_stages().is_empty() {
            out.push_str(&format!(
                "\n{}\n",
                format!("{} intermediary stages kept", report.intermediary_stages().len()).dimmed()
            ));
        }
        out
    }

    fn render_record(&self, record: &ReportRecord, short: bool) -> String {
        let severity = match record.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
        };
        format!(
            "  {} {}\n    {} {}\n",
            record.location.print(short).cyan(),
            severity,
            "→".dimmed(),
            record.message.replace("\n\t", "\n      ")
        )
    }
}

impl Default for TerminalReporter {
    fn default() -> Self {
        Self::new()
    }
}
