use tracing::debug;

use crate::document::{ElementId, XmlAttribute, XmlChild, XmlDocument};
use crate::model::{AttributeOperationType, NodeType, QualifiedName, ANDROID_URI};
use crate::report::{ReportBuilder, Severity};

/// Platform structure checks on the merged document
///
/// Misplaced elements are moved, together with the comment right above
/// them, and each move is reported as a WARNING.
pub struct PostValidator;

impl PostValidator {
    pub fn validate(document: &mut XmlDocument, report: &mut ReportBuilder) {
        ensure_android_namespace(document);
        reorder(document, report, NodeType::Application, Placement::Last);
        reorder(document, report, NodeType::UsesSdk, Placement::First);
        check_unused_instructions(document, report);
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Placement {
    First,
    Last,
}

fn ensure_android_namespace(document: &mut XmlDocument) {
    let root = document.root();
    let declared = document.root_element().attributes().iter().any(|attribute| {
        attribute.name().is_namespace_declaration() && attribute.value() == ANDROID_URI
    });
    if !declared {
        debug!("Adding the android namespace declaration to {}", document.source());
        document.set_attribute(
            root,
            XmlAttribute::injected(QualifiedName::xmlns("android"), ANDROID_URI),
        );
    }
}

fn reorder(document: &mut XmlDocument, report: &mut ReportBuilder, node_type: NodeType, placement: Placement) {
    let root = document.root();
    let elements = document.mergeable_elements(root);
    let Some(target) = document.by_type_and_key(node_type, None) else {
        return;
    };
    let in_place = match placement {
        Placement::First => elements.first() == Some(&target),
        Placement::Last => elements.last() == Some(&target),
    };
    if in_place {
        return;
    }

    let comment = detach_preceding_comment(document, root, target);
    document.remove_element(target);
    match placement {
        Placement::First => {
            document.insert_child(root, 0, XmlChild::Element(target));
            if let Some(text) = comment {
                document.insert_child(root, 0, XmlChild::Comment(text));
            }
        }
        Placement::Last => {
            if let Some(text) = comment {
                document.push_comment(root, &text);
            }
            document.append_child(root, target);
        }
    }

    let element = document.element(target);
    let position = match placement {
        Placement::First => "first",
        Placement::Last => "last",
    };
    report.add_message(
        element.location(),
        Severity::Warning,
        format!(
            "<{}> element at {} was not the {} element of <manifest>, moved to the {} position",
            node_type.xml_name(),
            element.location(),
            position,
            position
        ),
    );
}

/// Detach the comment directly above `id`, skipping whitespace
fn detach_preceding_comment(document: &mut XmlDocument, parent: ElementId, id: ElementId) -> Option<String> {
    let index = document.child_index(parent, id)?;
    let children = document.element(parent).children();
    let comment_index = children[..index]
        .iter()
        .rposition(|child| !matches!(child, XmlChild::Text(_)))?;
    document.remove_comment_at(parent, comment_index)
}

/// `tools:remove` and `tools:replace` that never found a lower priority
/// declaration are most likely stale
fn check_unused_instructions(document: &XmlDocument, report: &mut ReportBuilder) {
    for id in document.descendants(document.root()) {
        let element = document.element(id);
        let key = element.id();
        for (name, operation) in &element.instructions().attributes {
            let verb = match operation {
                AttributeOperationType::Remove => "remove",
                AttributeOperationType::Replace => "replace",
                AttributeOperationType::Strict => continue,
            };
            let used = report
                .actions()
                .attribute_records(&key, name)
                .iter()
                .any(|record| record.operation == Some(*operation));
            if used {
                continue;
            }
            let message = format!(
                "{}@{} was tagged at {}:{} to {} other declarations but no other declaration present",
                key,
                document.display_name(name),
                element.source().print(true),
                element.position().start_line,
                verb
            );
            report.add_message(element.location(), Severity::Warning, message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentType, SourceFile, XmlLoader};
    use crate::merge::{merge_documents, MergeContext};

    fn load(name: &str, xml: &str) -> XmlDocument {
        XmlLoader::new()
            .load(SourceFile::named(name), xml, DocumentType::Main, None)
            .unwrap()
    }

    fn element_types(document: &XmlDocument) -> Vec<NodeType> {
        document
            .mergeable_elements(document.root())
            .into_iter()
            .map(|id| document.element(id).node_type())
            .collect()
    }

    const LIBRARY: &str = r#"<manifest
    xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.lib3">

    <application android:label="@string/lib_name" />

        <activity android:name="activityOne"/>
</manifest>"#;

    fn merge_and_validate(main: &str) -> ReportBuilder {
        let main = load("main", main);
        let library = XmlLoader::new()
            .load(SourceFile::named("lib"), LIBRARY, DocumentType::Library, None)
            .unwrap();
        let mut report = ReportBuilder::new();
        let mut merged = merge_documents(&main, &library, &MergeContext::new(), &mut report).unwrap();
        PostValidator::validate(&mut merged, &mut report);
        report
    }

    #[test]
    fn test_unused_remove() {
        let report = merge_and_validate(
            r#"<manifest
    xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.lib3">

    <application android:label="@string/lib_name" />

        <activity android:name="activityOne" tools:remove="exported"/>

</manifest>"#,
        );
        let warning = report
            .records()
            .iter()
            .find(|record| record.message.contains("was tagged"))
            .unwrap();
        assert_eq!(warning.severity, Severity::Warning);
        assert!(warning.print(true).contains("main:8"));
        assert!(warning
            .message
            .contains("to remove other declarations but no other declaration present"));
    }

    #[test]
    fn test_unused_replace() {
        let report = merge_and_validate(
            r#"<manifest
    xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.lib3">

    <application android:label="@string/lib_name" />

        <activity android:name="activityOne" android:exported="false"
             tools:replace="exported"/>

</manifest>"#,
        );
        assert!(report.records().iter().any(|record| record.severity == Severity::Warning
            && record.message.starts_with("activity#com.example.lib3.activityOne@android:exported was tagged at main:8")));
    }

    #[test]
    fn test_application_moved_last_with_comment() {
        let mut document = load(
            "main",
            r#"<manifest
    xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.lib3">

    <activity android:name="activityOne"/>
    <!-- with comments ! -->    <application android:label="@string/lib_name" />

    <uses-sdk android:minSdkVersion="14"/>
</manifest>"#,
        );
        let mut report = ReportBuilder::new();
        PostValidator::validate(&mut document, &mut report);

        assert_eq!(
            element_types(&document),
            vec![NodeType::UsesSdk, NodeType::Activity, NodeType::Application]
        );
        let application = document.by_type_and_key(NodeType::Application, None).unwrap();
        assert_eq!(document.preceding_comment(application), Some(" with comments ! "));
        assert_eq!(
            report
                .records()
                .iter()
                .filter(|record| record.severity == Severity::Warning)
                .count(),
            2
        );
    }

    #[test]
    fn test_valid_order_is_untouched() {
        let mut document = load(
            "main",
            r#"<manifest
    xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.lib3">
    <uses-sdk android:minSdkVersion="14"/>
    <activity android:name="activityOne"/>
    <application android:label="@string/lib_name" />
</manifest>"#,
        );
        let before = document.pretty_print();
        let mut report = ReportBuilder::new();
        PostValidator::validate(&mut document, &mut report);
        assert!(report.records().is_empty());
        assert_eq!(document.pretty_print(), before);
    }

    #[test]
    fn test_android_namespace_added_when_missing() {
        let mut document = load(
            "main",
            r#"<manifest package="com.example.lib3">
    <application />
</manifest>"#,
        );
        PostValidator::validate(&mut document, &mut ReportBuilder::new());
        assert_eq!(
            document
                .root_element()
                .attribute_value(&QualifiedName::xmlns("android")),
            Some(ANDROID_URI)
        );
    }

    #[test]
    fn test_android_namespace_under_other_prefix() {
        let mut document = load(
            "main",
            r#"<manifest xmlns:A="http://schemas.android.com/apk/res/android" package="com.example.lib3">
    <uses-sdk A:minSdkVersion="14"/>
    <application A:label="@string/lib_name" />
</manifest>"#,
        );
        PostValidator::validate(&mut document, &mut ReportBuilder::new());
        let root = document.root_element();
        assert_eq!(root.attribute_value(&QualifiedName::xmlns("A")), Some(ANDROID_URI));
        assert!(root.attribute(&QualifiedName::xmlns("android")).is_none());
    }
}
