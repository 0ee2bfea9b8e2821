//! Merge engine
//!
//! A merge is a sequence of folds. Each fold reconciles one lower priority
//! document into a copy of the accumulated higher priority result:
//!
//! 1. SDK compatibility gate ([`sdk`])
//! 2. Root namespaces, then element matching and reconciliation
//!    ([`element`], [`attribute`])
//! 3. Implied permissions for libraries built against older SDKs
//!    ([`implied`])
//!
//! [`ManifestMerger`] drives the folds over every input and runs the
//! surrounding passes: trimming, placeholders, system properties,
//! validation and cleaning.

mod attribute;
mod element;
mod implied;
mod invoker;
mod placeholder;
mod properties;
mod sdk;

pub use implied::{default_rules, ImpliedPermissionRule, MIN_TARGET_FOR_IMPLIED};
pub use invoker::{ManifestInput, ManifestMerger};
pub use placeholder::{PlaceholderValues, PACKAGE_PLACEHOLDERS};
pub use properties::SystemProperty;
pub use sdk::{is_codename, sdk_levels, SdkCodenames, DEFAULT_SDK_VERSION, HIGHEST_KNOWN_API};

pub(crate) use element::ElementMerger;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

use crate::document::{LoadError, XmlDocument};
use crate::report::ReportBuilder;

/// What the merged manifest is for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeType {
    /// Final application manifest: instructions are consumed and missing
    /// placeholder values are errors
    #[default]
    Application,
    /// Library manifest, merged again later by its consumers
    Library,
}

impl MergeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeType::Application => "application",
            MergeType::Library => "library",
        }
    }
}

impl FromStr for MergeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "application" | "app" => Ok(MergeType::Application),
            "library" | "lib" => Ok(MergeType::Library),
            _ => Err(format!("Unknown merge type: {}", s)),
        }
    }
}

/// Optional pipeline behaviours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    /// Keep a pretty print of the document after every fold
    KeepIntermediaryStages,
    /// Leave `${...}` placeholders untouched
    NoPlaceholderReplacement,
    /// Strip tools instructions even from a library merge
    RemoveToolsDeclarations,
    /// Shorten class names inside the package back to `.Name`
    ExtractFqcns,
    /// Locations in records use file names rather than paths
    PrintSimpleFilenames,
}

impl Feature {
    pub const ALL: [Feature; 5] = [
        Feature::KeepIntermediaryStages,
        Feature::NoPlaceholderReplacement,
        Feature::RemoveToolsDeclarations,
        Feature::ExtractFqcns,
        Feature::PrintSimpleFilenames,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::KeepIntermediaryStages => "KEEP_INTERMEDIARY_STAGES",
            Feature::NoPlaceholderReplacement => "NO_PLACEHOLDER_REPLACEMENT",
            Feature::RemoveToolsDeclarations => "REMOVE_TOOLS_DECLARATIONS",
            Feature::ExtractFqcns => "EXTRACT_FQCNS",
            Feature::PrintSimpleFilenames => "PRINT_SIMPLE_FILENAMES",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Feature {
    type Err = String;

    /// Accepts `KEEP_INTERMEDIARY_STAGES` as well as `keep-intermediary-stages`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().replace('-', "_").to_ascii_uppercase();
        Feature::ALL
            .into_iter()
            .find(|feature| feature.as_str() == normalized)
            .ok_or_else(|| format!("Unknown feature: {}", s))
    }
}

/// An input of the pipeline that could not be turned into a document
#[derive(Error, Debug)]
pub enum MergeFailure {
    #[error("Failed to load {}: {source}", .path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: LoadError,
    },

    #[error("{0}")]
    Document(#[from] LoadError),
}

/// Collaborators shared by every fold of one merge
#[derive(Debug, Clone)]
pub struct MergeContext {
    pub codenames: SdkCodenames,
    pub implied_permissions: Vec<ImpliedPermissionRule>,
}

impl MergeContext {
    pub fn new() -> Self {
        Self {
            codenames: SdkCodenames::default(),
            implied_permissions: default_rules(),
        }
    }
}

impl Default for MergeContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Fold `lower` into a copy of `higher`.
///
/// Returns `None` when the fold logged an error; `higher` and `lower` are
/// never modified.
pub fn merge_documents(
    higher: &XmlDocument,
    lower: &XmlDocument,
    context: &MergeContext,
    report: &mut ReportBuilder,
) -> Option<XmlDocument> {
    let mut merged = higher.clone();
    report
        .recorder()
        .record_default_node_action(&merged, merged.root());

    if !sdk::check_compatibility(higher, lower, &context.codenames, report) {
        return None;
    }

    debug!("Merging {} into {}", lower.source(), higher.source());
    ElementMerger::new(&mut merged, lower, report).merge_root();

    implied::add_implied_permissions(
        &mut merged,
        higher,
        lower,
        &context.codenames,
        &context.implied_permissions,
        report,
    );

    if report.has_errors() {
        None
    } else {
        Some(merged)
    }
}

pub(crate) use placeholder::replace_placeholders;
pub(crate) use properties::inject_properties;
