use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use super::{
    inject_properties, merge_documents, replace_placeholders, Feature, ImpliedPermissionRule,
    MergeContext, MergeFailure, MergeType, PlaceholderValues, SdkCodenames, SystemProperty,
};
use crate::document::{DocumentType, SharedSelectors, SourceFile, XmlDocument, XmlLoader};
use crate::model::extract_class_name;
use crate::report::{MergeResult, MergingReport, ReportBuilder, Severity};
use crate::resolver::{KeyBasedValueResolver, MapValueResolver, SelectorResolver};
use crate::validate::{ElementsTrimmer, PostValidator, PreValidator, ToolsInstructionsCleaner};

/// A manifest handed to the merger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestInput {
    File(PathBuf),
    /// In-memory manifest; `name` identifies it in records
    Text { name: String, text: String },
}

impl ManifestInput {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        ManifestInput::File(path.into())
    }

    pub fn text(name: impl Into<String>, text: impl Into<String>) -> Self {
        ManifestInput::Text {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn source(&self) -> SourceFile {
        match self {
            ManifestInput::File(path) => SourceFile::new(path),
            ManifestInput::Text { name, .. } => SourceFile::named(name.clone()),
        }
    }

    fn load(
        &self,
        loader: &XmlLoader<'_>,
        doc_type: DocumentType,
        package_override: Option<&str>,
    ) -> Result<XmlDocument, MergeFailure> {
        match self {
            ManifestInput::File(path) => loader
                .load_file(path, doc_type, package_override)
                .map_err(|source| MergeFailure::Load {
                    path: path.clone(),
                    source,
                }),
            ManifestInput::Text { name, text } => Ok(loader.load(
                SourceFile::named(name.clone()),
                text,
                doc_type,
                package_override,
            )?),
        }
    }
}

impl From<PathBuf> for ManifestInput {
    fn from(path: PathBuf) -> Self {
        ManifestInput::File(path)
    }
}

impl From<&Path> for ManifestInput {
    fn from(path: &Path) -> Self {
        ManifestInput::File(path.to_path_buf())
    }
}

/// Merges a main manifest with its overlays and libraries
///
/// Priority order is overlays (first added wins), then the main manifest,
/// then libraries in the order they were added.
pub struct ManifestMerger {
    main: ManifestInput,
    merge_type: MergeType,
    libraries: Vec<ManifestInput>,
    overlays: Vec<ManifestInput>,
    features: BTreeSet<Feature>,
    placeholders: MapValueResolver<String>,
    properties: MapValueResolver<SystemProperty>,
    context: MergeContext,
}

impl ManifestMerger {
    pub fn new(main: impl Into<ManifestInput>, merge_type: MergeType) -> Self {
        Self {
            main: main.into(),
            merge_type,
            libraries: Vec::new(),
            overlays: Vec::new(),
            features: BTreeSet::new(),
            placeholders: MapValueResolver::default(),
            properties: MapValueResolver::default(),
            context: MergeContext::new(),
        }
    }

    pub fn add_library(mut self, library: impl Into<ManifestInput>) -> Self {
        self.libraries.push(library.into());
        self
    }

    pub fn add_libraries<I>(mut self, libraries: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<ManifestInput>,
    {
        self.libraries.extend(libraries.into_iter().map(Into::into));
        self
    }

    pub fn add_overlay(mut self, overlay: impl Into<ManifestInput>) -> Self {
        self.overlays.push(overlay.into());
        self
    }

    pub fn with_features(mut self, features: impl IntoIterator<Item = Feature>) -> Self {
        self.features.extend(features);
        self
    }

    pub fn with_placeholder(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.placeholders.insert(name.into(), value);
        self
    }

    pub fn with_placeholders<I, K, V>(mut self, placeholders: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        for (name, value) in placeholders {
            self.placeholders.insert(name.into(), value);
        }
        self
    }

    pub fn with_property(mut self, property: SystemProperty, value: impl Into<String>) -> Self {
        self.properties.insert(property, value);
        self
    }

    pub fn with_codenames(mut self, codenames: SdkCodenames) -> Self {
        self.context.codenames = codenames;
        self
    }

    pub fn with_implied_permissions(mut self, rules: Vec<ImpliedPermissionRule>) -> Self {
        self.context.implied_permissions = rules;
        self
    }

    fn has(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }

    /// Run the whole pipeline; failures are reported, never returned
    pub fn merge(self) -> MergingReport {
        let mut report =
            ReportBuilder::new().with_simple_filenames(self.has(Feature::PrintSimpleFilenames));
        info!(
            "Merging {} with {} libraries and {} overlays ({})",
            self.main.source(),
            self.libraries.len(),
            self.overlays.len(),
            self.merge_type.as_str()
        );

        if let Some(merged) = self.run(&mut report) {
            report.set_merged_document(merged);
        }
        report.build()
    }

    fn run(&self, report: &mut ReportBuilder) -> Option<XmlDocument> {
        let documents = self.load_documents(report)?;
        let merged = self.fold(documents, report)?;
        self.finish(merged, report)
    }

    /// Libraries are loaded first so their packages can validate
    /// `tools:selector` values everywhere
    fn load_documents(&self, report: &mut ReportBuilder) -> Option<Vec<XmlDocument>> {
        let plain = XmlLoader::new();
        let mut libraries = Vec::with_capacity(self.libraries.len());
        for input in &self.libraries {
            libraries.push(load_reported(&plain, input, DocumentType::Library, None, report)?);
        }

        let mut resolver = SelectorResolver::new();
        for library in &libraries {
            if let Some(package) = library.package_name() {
                resolver.add(package, library.source().print(true));
            }
        }
        let selectors: SharedSelectors = Arc::new(resolver);

        let loader = XmlLoader::new()
            .with_selectors(selectors.clone())
            .with_properties(&self.properties);
        let package_override = self.properties.value(&SystemProperty::Package);
        let main = load_reported(
            &loader,
            &self.main,
            DocumentType::Main,
            package_override.as_deref(),
            report,
        )?;
        let main_package = main.package_name().map(str::to_string);

        let mut documents = Vec::with_capacity(self.overlays.len() + 1 + libraries.len());
        for input in &self.overlays {
            documents.push(load_reported(
                &loader,
                input,
                DocumentType::Overlay,
                main_package.as_deref(),
                report,
            )?);
        }
        documents.push(main);
        documents.extend(
            libraries
                .into_iter()
                .map(|library| library.with_selectors(selectors.clone())),
        );
        Some(documents)
    }

    fn fold(&self, documents: Vec<XmlDocument>, report: &mut ReportBuilder) -> Option<XmlDocument> {
        let mut documents = documents.into_iter();
        let first = documents.next()?;
        if !pre_validate(&first, report) {
            return None;
        }
        report
            .recorder()
            .record_default_node_action(&first, first.root());
        self.snapshot(&first, report);

        let mut merged = first;
        for lower in documents {
            if !pre_validate(&lower, report) {
                return None;
            }
            merged = merge_documents(&merged, &lower, &self.context, report)?;
            self.snapshot(&merged, report);
        }
        Some(merged)
    }

    fn snapshot(&self, document: &XmlDocument, report: &mut ReportBuilder) {
        if self.has(Feature::KeepIntermediaryStages) {
            report.add_merging_stage(document.pretty_print());
        }
    }

    fn finish(&self, mut merged: XmlDocument, report: &mut ReportBuilder) -> Option<XmlDocument> {
        ElementsTrimmer::trim(&mut merged, report);

        if !self.has(Feature::NoPlaceholderReplacement) {
            let package = merged.package_name().map(str::to_string);
            let values = PlaceholderValues::new(&self.placeholders, package);
            replace_placeholders(&mut merged, &values, self.merge_type, report);
        }

        inject_properties(&mut merged, &self.properties, report);
        PostValidator::validate(&mut merged, report);

        if self.merge_type == MergeType::Application || self.has(Feature::RemoveToolsDeclarations) {
            merged = ToolsInstructionsCleaner::clean_tools_references(merged, report)?;
        }

        if self.has(Feature::ExtractFqcns) {
            extract_fqcns(&mut merged);
        }
        Some(merged)
    }
}

fn load_reported(
    loader: &XmlLoader<'_>,
    input: &ManifestInput,
    doc_type: DocumentType,
    package_override: Option<&str>,
    report: &mut ReportBuilder,
) -> Option<XmlDocument> {
    match input.load(loader, doc_type, package_override) {
        Ok(document) => Some(document),
        Err(failure) => {
            report.add_file_message(&input.source(), Severity::Error, failure.to_string());
            None
        }
    }
}

fn pre_validate(document: &XmlDocument, report: &mut ReportBuilder) -> bool {
    if PreValidator::validate(report, document) == MergeResult::Error {
        report.add_file_message(document.source(), Severity::Error, "Validation failed, exiting");
        return false;
    }
    true
}

/// Shorten package dependent values inside the effective package to `.Name`
fn extract_fqcns(document: &mut XmlDocument) {
    let Some(package) = document.package_name().map(str::to_string) else {
        return;
    };
    for id in document.descendants(document.root()) {
        let element = document.element(id);
        let node_type = element.node_type();
        let shortened: Vec<_> = element
            .attributes()
            .iter()
            .filter(|attribute| attribute.model(node_type).is_some_and(|model| model.package_dependent))
            .map(|attribute| {
                (
                    attribute.name().clone(),
                    extract_class_name(attribute.value(), &package),
                )
            })
            .collect();
        for (name, value) in shortened {
            document.set_attribute_value(id, &name, &value);
        }
    }
    debug!("Extracted class names relative to {}", package);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionType;
    use crate::model::{NodeKey, NodeType, QualifiedName};

    const MAIN: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.app">
    <application android:label="${appName}" android:name=".App">
        <activity android:name=".Main" tools:replace="label" android:label="main"/>
    </application>
</manifest>"#;

    const LIBRARY: &str = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.lib1">
    <application>
        <activity android:name="com.example.app.Main" android:label="lib"/>
        <service android:name=".Sync"/>
    </application>
</manifest>"#;

    fn merger() -> ManifestMerger {
        ManifestMerger::new(ManifestInput::text("main", MAIN), MergeType::Application)
            .add_library(ManifestInput::text("lib1", LIBRARY))
            .with_placeholder("appName", "Demo")
    }

    fn attribute(report: &MergingReport, node_type: NodeType, name: &str) -> Option<String> {
        let document = report.merged_document()?;
        let id = document.elements_of_type(node_type).into_iter().next()?;
        document
            .element(id)
            .attribute_value(&QualifiedName::android(name))
            .map(str::to_string)
    }

    #[test]
    fn test_application_merge() {
        let report = merger().merge();
        assert_eq!(report.result(), MergeResult::Success);
        assert_eq!(attribute(&report, NodeType::Application, "label").as_deref(), Some("Demo"));
        assert_eq!(attribute(&report, NodeType::Activity, "label").as_deref(), Some("main"));
        assert_eq!(
            attribute(&report, NodeType::Service, "name").as_deref(),
            Some("com.example.lib1.Sync")
        );
        let xml = report.merged_xml().unwrap();
        assert!(!xml.contains("tools:"));
        assert!(report
            .actions()
            .node_records(&NodeKey::new("service#com.example.lib1.Sync"))
            .iter()
            .any(|record| record.record.action_type == ActionType::Added));
    }

    #[test]
    fn test_library_merge_keeps_instructions() {
        let report = ManifestMerger::new(ManifestInput::text("main", MAIN), MergeType::Library)
            .add_library(ManifestInput::text("lib1", LIBRARY))
            .merge();
        assert_eq!(report.result(), MergeResult::Success);
        let xml = report.merged_xml().unwrap();
        assert!(xml.contains("tools:replace=\"label\""));
        // unresolved placeholders are only noted for libraries
        assert!(xml.contains("${appName}"));
        assert_eq!(report.records_with(Severity::Info).count(), 1);
    }

    #[test]
    fn test_features() {
        let report = merger()
            .with_features([
                Feature::KeepIntermediaryStages,
                Feature::NoPlaceholderReplacement,
                Feature::ExtractFqcns,
            ])
            .merge();
        assert_eq!(report.intermediary_stages().len(), 2);
        assert_eq!(
            attribute(&report, NodeType::Application, "label").as_deref(),
            Some("${appName}")
        );
        assert_eq!(attribute(&report, NodeType::Application, "name").as_deref(), Some(".App"));
    }

    #[test]
    fn test_properties_are_injected() {
        let report = merger()
            .with_property(SystemProperty::Package, "com.example.renamed")
            .with_property(SystemProperty::VersionCode, "42")
            .with_property(SystemProperty::MinSdkVersion, "21")
            .merge();
        assert!(report.result().is_success());
        let document = report.merged_document().unwrap();
        let root = document.root_element();
        assert_eq!(
            root.attribute_value(&QualifiedName::local("package")),
            Some("com.example.renamed")
        );
        assert_eq!(root.attribute_value(&QualifiedName::android("versionCode")), Some("42"));
        assert_eq!(document.min_sdk_version(), Some("21"));
        assert_eq!(
            attribute(&report, NodeType::Application, "name").as_deref(),
            Some("com.example.renamed.App")
        );
    }

    #[test]
    fn test_overlay_wins_over_main() {
        let overlay = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools">
    <application android:label="Overlay" tools:replace="label"/>
</manifest>"#;
        let report = merger()
            .add_overlay(ManifestInput::text("overlay", overlay))
            .merge();
        assert_eq!(report.result(), MergeResult::Success);
        assert_eq!(attribute(&report, NodeType::Application, "label").as_deref(), Some("Overlay"));
        let root = report.merged_document().unwrap().root_element();
        assert_eq!(
            root.attribute_value(&QualifiedName::local("package")),
            Some("com.example.app")
        );
    }

    #[test]
    fn test_load_failure_is_reported() {
        let report = ManifestMerger::new(ManifestInput::text("main", "<manifest>"), MergeType::Application)
            .merge();
        assert_eq!(report.result(), MergeResult::Error);
        assert!(report.merged_document().is_none());
        assert_eq!(report.records().len(), 1);

        let report = ManifestMerger::new(
            ManifestInput::file("/nonexistent/AndroidManifest.xml"),
            MergeType::Application,
        )
        .merge();
        assert!(report.records()[0].message.starts_with("Failed to load /nonexistent/AndroidManifest.xml"));
    }

    #[test]
    fn test_validation_failure_stops_the_pipeline() {
        let invalid = r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools" package="com.example.lib2">
    <activity android:name=".Broken" tools:replace="exported"/>
</manifest>"#;
        let report = merger()
            .add_library(ManifestInput::text("lib2", invalid))
            .merge();
        assert_eq!(report.result(), MergeResult::Error);
        assert!(report
            .records()
            .iter()
            .any(|record| record.message == "Validation failed, exiting"));
    }
}
