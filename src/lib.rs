//! manifestmerger - Android manifest merging
//!
//! This library merges the manifest of an application or library module with
//! the manifests of its overlays and of the libraries it depends on, driven
//! by the `tools:` instructions those manifests carry.
//!
//! # Architecture
//!
//! The merging pipeline consists of:
//! 1. **Loading** - Parse every input into an [`XmlDocument`] with node types, keys and instructions
//! 2. **Pre-validation** - Reject misused instructions before a document is merged
//! 3. **Folding** - Merge overlays, then the main manifest, then libraries, one pair at a time
//! 4. **Trimming** - Drop redundant OpenGL ES requirements
//! 5. **Injection** - Substitute placeholders and write system property overrides
//! 6. **Post-validation** - Fix element order and report unused instructions
//! 7. **Cleaning** - Remove tools instructions from application manifests
//! 8. **Reporting** - Records, merged document and the decision log of every action

pub mod actions;
pub mod config;
pub mod document;
pub mod merge;
pub mod model;
pub mod report;
pub mod resolver;
pub mod validate;

pub use actions::{ActionType, Actions, ActionsError};
pub use config::Config;
pub use document::{DocumentType, LoadError, SourceFile, XmlDocument, XmlLoader};
pub use merge::{Feature, ManifestInput, ManifestMerger, MergeFailure, MergeType, SystemProperty};
pub use report::{MergeResult, MergingReport, ReportFormat, Reporter, Severity};
