use serde::{Deserialize, Serialize};

use crate::actions::ActionType;
use crate::document::{SourcePosition, XmlAttribute, XmlDocument, XmlElement};
use crate::model::{NodeType, QualifiedName};
use crate::report::ReportBuilder;

use super::sdk::{sdk_levels, SdkCodenames};

/// Applications targeting a lower level never get implied permissions
pub const MIN_TARGET_FOR_IMPLIED: u32 = 4;

/// One platform rule granting a permission implicitly to libraries built
/// against an older SDK
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImpliedPermissionRule {
    /// Fully qualified permission to add
    pub permission: String,

    /// Rule applies only when the library targets a level below this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub below_target: Option<u32>,

    /// Permission the library must request itself; when an earlier rule of
    /// the same pass targets it, that rule must have added it instead
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires: Option<String>,

    /// `android:maxSdkVersion` written on the added element
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_sdk_version: Option<String>,

    /// Appended to the library package in the recorded reason
    pub reason: String,
}

impl ImpliedPermissionRule {
    pub fn new(permission: &str, reason: &str) -> Self {
        Self {
            permission: permission.to_string(),
            below_target: None,
            requires: None,
            max_sdk_version: None,
            reason: reason.to_string(),
        }
    }

    pub fn below_target(mut self, level: u32) -> Self {
        self.below_target = Some(level);
        self
    }

    pub fn requires(mut self, permission: &str) -> Self {
        self.requires = Some(permission.to_string());
        self
    }

    pub fn max_sdk_version(mut self, level: &str) -> Self {
        self.max_sdk_version = Some(level.to_string());
        self
    }

    fn applies_to(&self, library_target: u32) -> bool {
        self.below_target.map_or(true, |level| library_target < level)
    }
}

fn permission(name: &str) -> String {
    format!("android.permission.{}", name)
}

/// The platform table, in evaluation order
pub fn default_rules() -> Vec<ImpliedPermissionRule> {
    let write_storage = permission("WRITE_EXTERNAL_STORAGE");
    vec![
        ImpliedPermissionRule::new(&write_storage, "has a targetSdkVersion < 4")
            .below_target(4)
            .max_sdk_version("18"),
        ImpliedPermissionRule::new(&permission("READ_PHONE_STATE"), "has a targetSdkVersion < 4")
            .below_target(4),
        ImpliedPermissionRule::new(
            &permission("READ_EXTERNAL_STORAGE"),
            "requested WRITE_EXTERNAL_STORAGE",
        )
        .below_target(16)
        .requires(&write_storage)
        .max_sdk_version("18"),
        ImpliedPermissionRule::new(
            &permission("READ_CALL_LOG"),
            "has a targetSdkVersion < 16 and requested READ_CONTACTS",
        )
        .below_target(16)
        .requires(&permission("READ_CONTACTS")),
        ImpliedPermissionRule::new(
            &permission("WRITE_CALL_LOG"),
            "has a targetSdkVersion < 16 and requested WRITE_CONTACTS",
        )
        .below_target(16)
        .requires(&permission("WRITE_CONTACTS")),
    ]
}

/// Add the permissions `lower` implicitly holds on older platforms to
/// `merged`, comparing the levels `higher` and `lower` declared before the
/// fold
pub(crate) fn add_implied_permissions(
    merged: &mut XmlDocument,
    higher: &XmlDocument,
    lower: &XmlDocument,
    codenames: &SdkCodenames,
    rules: &[ImpliedPermissionRule],
    report: &mut ReportBuilder,
) {
    let (_, this_target) = sdk_levels(higher, codenames);
    let (_, library_target) = sdk_levels(lower, codenames);
    if this_target <= library_target || this_target < MIN_TARGET_FOR_IMPLIED {
        return;
    }
    let package = lower.package_name().unwrap_or("library");

    // permission of every rule that applied, and whether it was added
    let mut applied: Vec<(&str, bool)> = Vec::new();
    for rule in rules {
        if !rule.applies_to(library_target) {
            continue;
        }
        if let Some(required) = &rule.requires {
            let granted = applied
                .iter()
                .find(|(permission, _)| *permission == required.as_str())
                .map_or_else(|| is_requested(lower, required), |(_, added)| *added);
            if !granted {
                continue;
            }
        }
        if is_requested(merged, &rule.permission) {
            applied.push((rule.permission.as_str(), false));
            continue;
        }

        let mut attributes = vec![XmlAttribute::new(
            QualifiedName::android("name"),
            rule.permission.clone(),
            SourcePosition::UNKNOWN,
            lower.source().clone(),
        )];
        if let Some(max) = &rule.max_sdk_version {
            attributes.push(XmlAttribute::new(
                QualifiedName::android("maxSdkVersion"),
                max.clone(),
                SourcePosition::UNKNOWN,
                lower.source().clone(),
            ));
        }
        let element = XmlElement::new(
            QualifiedName::local(NodeType::UsesPermission.xml_name()),
            attributes,
            SourcePosition::UNKNOWN,
            lower.source().clone(),
        );
        let id = merged.create_element(element);
        let root = merged.root();
        merged.append_child(root, id);
        report.recorder().record_node_action_with_reason(
            merged,
            id,
            ActionType::Added,
            Some(format!("{} {}", package, rule.reason)),
        );
        applied.push((rule.permission.as_str(), true));
    }
}

fn is_requested(document: &XmlDocument, permission: &str) -> bool {
    document
        .by_type_and_key(NodeType::UsesPermission, Some(permission))
        .is_some()
}
