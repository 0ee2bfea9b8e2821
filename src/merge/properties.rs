use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::actions::ActionType;
use crate::document::{ElementId, SourcePosition, XmlAttribute, XmlChild, XmlDocument, XmlElement};
use crate::model::{NodeType, QualifiedName};
use crate::report::ReportBuilder;
use crate::resolver::KeyBasedValueResolver;

/// Values the caller can force onto the merged manifest, overriding
/// whatever the inputs declare
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemProperty {
    Package,
    VersionCode,
    VersionName,
    MinSdkVersion,
    TargetSdkVersion,
    MaxSdkVersion,
}

impl SystemProperty {
    pub const ALL: [SystemProperty; 6] = [
        SystemProperty::Package,
        SystemProperty::VersionCode,
        SystemProperty::VersionName,
        SystemProperty::MinSdkVersion,
        SystemProperty::TargetSdkVersion,
        SystemProperty::MaxSdkVersion,
    ];

    /// Attribute local name the property is written to
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemProperty::Package => "package",
            SystemProperty::VersionCode => "versionCode",
            SystemProperty::VersionName => "versionName",
            SystemProperty::MinSdkVersion => "minSdkVersion",
            SystemProperty::TargetSdkVersion => "targetSdkVersion",
            SystemProperty::MaxSdkVersion => "maxSdkVersion",
        }
    }

    /// `package` lives outside the android namespace
    pub fn attribute_name(&self) -> QualifiedName {
        match self {
            SystemProperty::Package => QualifiedName::local(self.as_str()),
            _ => QualifiedName::android(self.as_str()),
        }
    }

    /// Whether the property is an attribute of `uses-sdk` rather than of
    /// the root element
    pub fn on_uses_sdk(&self) -> bool {
        matches!(
            self,
            SystemProperty::MinSdkVersion
                | SystemProperty::TargetSdkVersion
                | SystemProperty::MaxSdkVersion
        )
    }
}

impl std::fmt::Display for SystemProperty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SystemProperty {
    type Err = String;

    /// Accepts `versionCode`, `version_code`, `VERSION_CODE` and `version-code`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        SystemProperty::ALL
            .into_iter()
            .find(|property| property.as_str().to_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown system property: {}", s))
    }
}

/// Write every provided property value onto `document`, creating `uses-sdk`
/// when an SDK value is provided and the element is absent
pub(crate) fn inject_properties(
    document: &mut XmlDocument,
    properties: &dyn KeyBasedValueResolver<SystemProperty>,
    report: &mut ReportBuilder,
) {
    for property in SystemProperty::ALL {
        let Some(value) = properties.value(&property) else {
            continue;
        };
        let target = if property.on_uses_sdk() {
            uses_sdk_or_create(document, report)
        } else {
            document.root()
        };
        let attribute = XmlAttribute::new(
            property.attribute_name(),
            value,
            SourcePosition::UNKNOWN,
            document.source().clone(),
        );
        document.set_attribute(target, attribute.clone());
        report
            .recorder()
            .record_attribute_action(document, target, &attribute, ActionType::Injected, None);
    }
}

fn uses_sdk_or_create(document: &mut XmlDocument, report: &mut ReportBuilder) -> ElementId {
    if let Some(existing) = document.by_type_and_key(NodeType::UsesSdk, None) {
        return existing;
    }
    let element = XmlElement::new(
        QualifiedName::local(NodeType::UsesSdk.xml_name()),
        Vec::new(),
        SourcePosition::UNKNOWN,
        document.source().clone(),
    );
    let id = document.create_element(element);
    let root = document.root();
    document.insert_child(root, 0, XmlChild::Element(id));
    report
        .recorder()
        .record_node_action(document, id, ActionType::Injected);
    id
}
