use serde::Serialize;
use tracing::{error, info, warn};

use crate::actions::{ActionRecorder, Actions};
use crate::document::{SourceFile, SourceFilePosition, SourcePosition, XmlDocument};

/// Severity of a report record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "Info",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall outcome, derived from the worst record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MergeResult {
    Success,
    Warning,
    Error,
}

impl MergeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeResult::Success => "SUCCESS",
            MergeResult::Warning => "WARNING",
            MergeResult::Error => "ERROR",
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, MergeResult::Error)
    }
}

impl std::fmt::Display for MergeResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One diagnostic message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRecord {
    pub severity: Severity,
    pub location: SourceFilePosition,
    pub message: String,
}

impl ReportRecord {
    pub fn print(&self, short: bool) -> String {
        format!(
            "{} {}:\n\t{}",
            self.location.print(short),
            self.severity,
            self.message
        )
    }
}

impl std::fmt::Display for ReportRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.print(false))
    }
}

/// Outcome of a merge: result, records, merged document and decision log
#[derive(Debug, Clone)]
pub struct MergingReport {
    result: MergeResult,
    records: Vec<ReportRecord>,
    merged_document: Option<XmlDocument>,
    actions: Actions,
    intermediary_stages: Vec<String>,
    simple_filenames: bool,
}

impl MergingReport {
    pub fn result(&self) -> MergeResult {
        self.result
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn records_with(&self, severity: Severity) -> impl Iterator<Item = &ReportRecord> {
        self.records
            .iter()
            .filter(move |record| record.severity == severity)
    }

    pub fn merged_document(&self) -> Option<&XmlDocument> {
        self.merged_document.as_ref()
    }

    /// Pretty printed merged manifest, absent when the merge failed
    pub fn merged_xml(&self) -> Option<String> {
        self.merged_document.as_ref().map(XmlDocument::pretty_print)
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    pub fn intermediary_stages(&self) -> &[String] {
        &self.intermediary_stages
    }

    /// Whether locations are printed with file names only
    pub fn simple_filenames(&self) -> bool {
        self.simple_filenames
    }

    /// Log every record at its matching level
    pub fn log(&self) {
        for record in &self.records {
            let text = record.print(self.simple_filenames);
            match record.severity {
                Severity::Error => error!("{}", text),
                Severity::Warning => warn!("{}", text),
                Severity::Info => info!("{}", text),
            }
        }
    }
}

/// Collects records and actions while a pipeline runs
#[derive(Debug, Default)]
pub struct ReportBuilder {
    records: Vec<ReportRecord>,
    merged_document: Option<XmlDocument>,
    recorder: ActionRecorder,
    intermediary_stages: Vec<String>,
    simple_filenames: bool,
}

impl ReportBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_simple_filenames(mut self, simple: bool) -> Self {
        self.simple_filenames = simple;
        self
    }

    pub fn add_message(&mut self, location: SourceFilePosition, severity: Severity, message: impl Into<String>) {
        let record = ReportRecord {
            severity,
            location,
            message: message.into(),
        };
        let text = record.print(self.simple_filenames);
        match severity {
            Severity::Error => error!("{}", text),
            Severity::Warning => warn!("{}", text),
            Severity::Info => info!("{}", text),
        }
        self.records.push(record);
    }

    /// Message without a specific position inside `file`
    pub fn add_file_message(&mut self, file: &SourceFile, severity: Severity, message: impl Into<String>) {
        self.add_message(
            SourceFilePosition::new(file.clone(), SourcePosition::UNKNOWN),
            severity,
            message,
        );
    }

    pub fn has_errors(&self) -> bool {
        self.records
            .iter()
            .any(|record| record.severity == Severity::Error)
    }

    pub fn records(&self) -> &[ReportRecord] {
        &self.records
    }

    pub fn recorder(&mut self) -> &mut ActionRecorder {
        &mut self.recorder
    }

    pub fn actions(&self) -> &Actions {
        self.recorder.actions()
    }

    pub fn set_merged_document(&mut self, document: XmlDocument) {
        self.merged_document = Some(document);
    }

    pub fn add_merging_stage(&mut self, xml: String) {
        self.intermediary_stages.push(xml);
    }

    pub fn build(self) -> MergingReport {
        let result = if self.has_errors() {
            MergeResult::Error
        } else if self
            .records
            .iter()
            .any(|record| record.severity == Severity::Warning)
        {
            MergeResult::Warning
        } else {
            MergeResult::Success
        };
        let actions = self.recorder.build();
        actions.log();
        MergingReport {
            result,
            // a failed merge never exposes a document
            merged_document: if result == MergeResult::Error {
                None
            } else {
                self.merged_document
            },
            records: self.records,
            actions,
            intermediary_stages: self.intermediary_stages,
            simple_filenames: self.simple_filenames,
        }
    }
}
