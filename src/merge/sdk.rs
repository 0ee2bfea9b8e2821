use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::document::{SourceFilePosition, SourcePosition, XmlDocument};
use crate::model::{AttributeOperationType, NodeType, QualifiedName};
use crate::report::{ReportBuilder, Severity};
use crate::resolver::KeyResolver;

/// Level assumed when a document declares no `minSdkVersion`
pub const DEFAULT_SDK_VERSION: &str = "1";

/// Highest released API level known to this build
pub const HIGHEST_KNOWN_API: u32 = 35;

/// Preview codename to API level table
///
/// A codename that is not in the table resolves to the level following the
/// highest known release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SdkCodenames {
    /// Codename to API level
    pub codenames: BTreeMap<String, u32>,

    /// Highest released API level
    pub highest_known_api: u32,
}

impl Default for SdkCodenames {
    fn default() -> Self {
        Self {
            codenames: BTreeMap::new(),
            highest_known_api: HIGHEST_KNOWN_API,
        }
    }
}

impl SdkCodenames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_codename(mut self, codename: impl Into<String>, level: u32) -> Self {
        self.codenames.insert(codename.into(), level);
        self
    }

    pub fn with_highest_known_api(mut self, level: u32) -> Self {
        self.highest_known_api = level;
        self
    }

    /// Numeric API level of a raw `minSdkVersion`/`targetSdkVersion` value
    pub fn api_level(&self, raw: &str) -> u32 {
        let raw = raw.trim();
        match raw.parse::<u32>() {
            Ok(level) => level,
            Err(_) => self
                .resolve(raw)
                .unwrap_or(self.highest_known_api + 1),
        }
    }
}

impl KeyResolver<u32> for SdkCodenames {
    fn resolve(&self, key: &str) -> Option<u32> {
        self.codenames.get(key).copied()
    }

    fn keys(&self) -> Vec<String> {
        self.codenames.keys().cloned().collect()
    }
}

/// A preview release is named rather than numbered
pub fn is_codename(raw: &str) -> bool {
    raw.trim().parse::<u32>().is_err()
}

/// Effective `(min, target)` levels of a document before any merge
pub fn sdk_levels(document: &XmlDocument, codenames: &SdkCodenames) -> (u32, u32) {
    let min = document.min_sdk_version().unwrap_or(DEFAULT_SDK_VERSION);
    let target = document.target_sdk_version().unwrap_or(min);
    (codenames.api_level(min), codenames.api_level(target))
}

/// Check that `lower` can be merged into an application declaring the
/// `higher` SDK levels.
///
/// Logs exactly one ERROR and returns false on the first incompatibility.
pub(crate) fn check_compatibility(
    higher: &XmlDocument,
    lower: &XmlDocument,
    codenames: &SdkCodenames,
    report: &mut ReportBuilder,
) -> bool {
    let uses_sdk = higher.by_type_and_key(NodeType::UsesSdk, None);
    let location = match uses_sdk {
        Some(id) => higher.element(id).location(),
        None => SourceFilePosition::new(higher.source().clone(), SourcePosition::UNKNOWN),
    };
    let library = lower.source().print(true);

    let app_min = higher.min_sdk_version().unwrap_or(DEFAULT_SDK_VERSION);
    let lib_min = lower.min_sdk_version().unwrap_or(DEFAULT_SDK_VERSION);

    if is_codename(lib_min) {
        if app_min.trim() != lib_min.trim() {
            report.add_message(
                location,
                Severity::Error,
                format!(
                    "uses-sdk:minSdkVersion {} cannot be different than version {} declared in library {}",
                    app_min, lib_min, library
                ),
            );
            return false;
        }
    } else if codenames.api_level(app_min) < codenames.api_level(lib_min)
        && !min_version_overridden(higher, lower)
    {
        report.add_message(
            location,
            Severity::Error,
            format!(
                "uses-sdk:minSdkVersion {} cannot be smaller than version {} declared in library {}",
                app_min, lib_min, library
            ),
        );
        return false;
    }

    if let Some(lib_target) = lower.target_sdk_version() {
        let app_target = higher.target_sdk_version().unwrap_or(app_min);
        if is_codename(lib_target) && app_target.trim() != lib_target.trim() {
            report.add_message(
                location,
                Severity::Error,
                format!(
                    "uses-sdk:targetSdkVersion {} cannot be different than version {} declared in library {}",
                    app_target, lib_target, library
                ),
            );
            return false;
        }
    }
    true
}

/// An application may accept a library with a higher minimum by overriding
/// its `uses-sdk` element or by listing the library in `tools:overrideLibrary`,
/// unless it marks `minSdkVersion` as strict
fn min_version_overridden(higher: &XmlDocument, lower: &XmlDocument) -> bool {
    let Some(id) = higher.by_type_and_key(NodeType::UsesSdk, None) else {
        return false;
    };
    let uses_sdk = higher.element(id);
    let min_sdk = QualifiedName::android("minSdkVersion");
    if uses_sdk.attribute_operation(&min_sdk) == Some(AttributeOperationType::Strict) {
        return false;
    }
    if uses_sdk.operation_type().is_overriding() {
        return true;
    }
    let Some(package) = lower.package_name() else {
        return false;
    };
    uses_sdk
        .attribute_value(&QualifiedName::tools("overrideLibrary"))
        .map_or(false, |libraries| {
            libraries.split(',').any(|library| library.trim() == package)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, SourceFile, XmlLoader};

    fn document(name: &str, doc_type: DocumentType, uses_sdk: &str) -> XmlDocument {
        let xml = format!(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.{}">
    {}
</manifest>"#,
            name, uses_sdk
        );
        XmlLoader::new()
            .load(SourceFile::named(name), &xml, doc_type, None)
            .unwrap()
    }

    fn app(uses_sdk: &str) -> XmlDocument {
        document("app", DocumentType::Main, uses_sdk)
    }

    fn lib(uses_sdk: &str) -> XmlDocument {
        document("lib", DocumentType::Library, uses_sdk)
    }

    fn check(higher: &XmlDocument, lower: &XmlDocument, codenames: &SdkCodenames) -> (bool, Vec<String>) {
        let mut report = ReportBuilder::new();
        let ok = check_compatibility(higher, lower, codenames, &mut report);
        let messages = report.records().iter().map(|r| r.message.clone()).collect();
        (ok, messages)
    }

    #[test]
    fn test_api_level() {
        let codenames = SdkCodenames::new().with_codename("Tiramisu", 33);
        assert_eq!(codenames.api_level("21"), 21);
        assert_eq!(codenames.api_level("Tiramisu"), 33);
        assert_eq!(codenames.api_level("Unknown"), HIGHEST_KNOWN_API + 1);
        assert_eq!(codenames.with_highest_known_api(36).api_level("Unknown"), 37);
    }

    #[test]
    fn test_smaller_min_sdk_fails() {
        let (ok, messages) = check(
            &app(r#"<uses-sdk android:minSdkVersion="4"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="19"/>"#),
            &SdkCodenames::new(),
        );
        assert!(!ok);
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains("uses-sdk:minSdkVersion 4"));
        assert!(messages[0].contains("version 19 declared in library lib"));
    }

    #[test]
    fn test_missing_app_uses_sdk_defaults_to_one() {
        let (ok, messages) = check(
            &app(""),
            &lib(r#"<uses-sdk android:minSdkVersion="3"/>"#),
            &SdkCodenames::new(),
        );
        assert!(!ok);
        assert!(messages[0].contains("uses-sdk:minSdkVersion 1"));
    }

    #[test]
    fn test_compatible_levels() {
        let (ok, messages) = check(
            &app(r#"<uses-sdk android:minSdkVersion="21"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="14" android:targetSdkVersion="16"/>"#),
            &SdkCodenames::new(),
        );
        assert!(ok);
        assert!(messages.is_empty());
    }

    #[test]
    fn test_library_codename_must_match() {
        let (ok, messages) = check(
            &app(r#"<uses-sdk android:minSdkVersion="20"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="L"/>"#),
            &SdkCodenames::new(),
        );
        assert!(!ok);
        assert!(messages[0].contains("cannot be different than version L"));

        let (ok, _) = check(
            &app(r#"<uses-sdk android:minSdkVersion="L"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="L"/>"#),
            &SdkCodenames::new(),
        );
        assert!(ok);
    }

    #[test]
    fn test_application_codename_resolves_through_table() {
        let codenames = SdkCodenames::new().with_codename("Tiramisu", 33);
        let (ok, _) = check(
            &app(r#"<uses-sdk android:minSdkVersion="Tiramisu"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="30"/>"#),
            &codenames,
        );
        assert!(ok);

        let codenames = SdkCodenames::new().with_codename("Tiramisu", 29);
        let (ok, _) = check(
            &app(r#"<uses-sdk android:minSdkVersion="Tiramisu"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="30"/>"#),
            &codenames,
        );
        assert!(!ok);
    }

    #[test]
    fn test_library_target_codename_must_match() {
        let (ok, messages) = check(
            &app(r#"<uses-sdk android:minSdkVersion="21" android:targetSdkVersion="30"/>"#),
            &lib(r#"<uses-sdk android:minSdkVersion="14" android:targetSdkVersion="Q"/>"#),
            &SdkCodenames::new(),
        );
        assert!(!ok);
        assert!(messages[0].starts_with("uses-sdk:targetSdkVersion 30"));
    }

    #[test]
    fn test_override_instructions() {
        let lower = lib(r#"<uses-sdk android:minSdkVersion="19"/>"#);
        let (ok, _) = check(
            &app(r#"<uses-sdk android:minSdkVersion="4" tools:node="replace"/>"#),
            &lower,
            &SdkCodenames::new(),
        );
        assert!(ok);

        let (ok, _) = check(
            &app(r#"<uses-sdk android:minSdkVersion="4" tools:overrideLibrary="com.example.lib"/>"#),
            &lower,
            &SdkCodenames::new(),
        );
        assert!(ok);

        let (ok, _) = check(
            &app(r#"<uses-sdk android:minSdkVersion="4" tools:node="replace" tools:strict="minSdkVersion"/>"#),
            &lower,
            &SdkCodenames::new(),
        );
        assert!(!ok);
    }
}
