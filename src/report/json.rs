use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::PathBuf;

use super::{MergingReport, Severity};

/// JSON reporter for programmatic output
pub struct JsonReporter {
    output_path: Option<PathBuf>,
}

impl JsonReporter {
    pub fn new(output_path: Option<PathBuf>) -> Self {
        Self { output_path }
    }

    pub fn report(&self, report: &MergingReport) -> Result<()> {
        let json = Self::render(report)?;

        if let Some(path) = &self.output_path {
            std::fs::write(path, &json).into_diagnostic()?;
            println!("Report written to: {}", path.display());
        } else {
            println!("{}", json);
        }

        Ok(())
    }

    pub fn render(report: &MergingReport) -> Result<String> {
        let json = JsonReport::from_report(report);
        serde_json::to_string_pretty(&json).into_diagnostic()
    }
}

#[derive(Serialize)]
struct JsonReport {
    version: &'static str,
    result: &'static str,
    records: Vec<JsonRecord>,
    summary: JsonSummary,
    merged_manifest: Option<String>,
    intermediary_stages: usize,
}

#[derive(Serialize)]
struct JsonRecord {
    severity: Severity,
    file: String,
    line: usize,
    column: usize,
    message: String,
}

#[derive(Serialize)]
struct JsonSummary {
    errors: usize,
    warnings: usize,
    infos: usize,
    actions: usize,
}

impl JsonReport {
    fn from_report(report: &MergingReport) -> Self {
        let short = report.simple_filenames();
        let records = report
            .records()
            .iter()
            .map(|record| JsonRecord {
                severity: record.severity,
                file: record.location.file.print(short),
                line: record.location.position.start_line,
                column: record.location.position.start_column,
                message: record.message.clone(),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION"),
            result: report.result().as_str(),
            records,
            summary: JsonSummary {
                errors: report.records_with(Severity::Error).count(),
                warnings: report.records_with(Severity::Warning).count(),
                infos: report.records_with(Severity::Info).count(),
                actions: report.actions().node_keys().count(),
            },
            merged_manifest: report.merged_xml(),
            intermediary_stages: report.intermediary_stages().len(),
        }
    }
}
