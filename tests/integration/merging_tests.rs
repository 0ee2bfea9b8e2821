//! End to end merge tests
//!
//! These tests run the whole pipeline on in-memory manifests and check the
//! merged document, the report records and the recorded actions.

use manifestmerger::actions::ActionType;
use manifestmerger::model::{
    expand_class_name, AttributeOperationType, NodeKey, NodeOperationType, NodeType, QualifiedName,
};
use manifestmerger::{ManifestInput, ManifestMerger, MergeResult, MergeType, MergingReport, XmlDocument};

fn manifest(package: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="{}">
{}
</manifest>"#,
        package, body
    )
}

fn merge(merge_type: MergeType, main: &str, libraries: &[(&str, String)]) -> MergingReport {
    let mut merger = ManifestMerger::new(ManifestInput::text("main", main), merge_type);
    for (name, text) in libraries {
        merger = merger.add_library(ManifestInput::text(*name, text.clone()));
    }
    merger.merge()
}

fn merge_with_overlay(main: &str, overlay: &str, libraries: &[(&str, String)]) -> MergingReport {
    let mut merger = ManifestMerger::new(ManifestInput::text("main", main), MergeType::Application)
        .add_overlay(ManifestInput::text("overlay", overlay));
    for (name, text) in libraries {
        merger = merger.add_library(ManifestInput::text(*name, text.clone()));
    }
    merger.merge()
}

fn added_count(report: &MergingReport, key: &str) -> usize {
    report
        .actions()
        .node_records(&NodeKey::new(key))
        .iter()
        .filter(|record| record.record.action_type == ActionType::Added)
        .count()
}

fn keys_of(document: &XmlDocument, node_type: NodeType) -> Vec<String> {
    let mut keys: Vec<String> = document
        .elements_of_type(node_type)
        .into_iter()
        .filter_map(|id| document.element(id).key().map(str::to_string))
        .collect();
    keys.sort();
    keys
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_library_activity_is_added() {
    let main = manifest("com.example.app", "    <application android:label=\"@string/app\"/>");
    let library = manifest(
        "com.example.lib1",
        r#"    <application>
        <activity android:name="activityOne"/>
    </application>"#,
    );

    let report = merge(MergeType::Application, &main, &[("lib1", library)]);
    assert_eq!(report.result(), MergeResult::Success);

    let document = report.merged_document().unwrap();
    assert!(document.by_type_and_key(NodeType::Application, None).is_some());
    assert_eq!(
        keys_of(document, NodeType::Activity),
        vec!["com.example.lib1.activityOne"]
    );
    assert_eq!(added_count(&report, "application"), 1);
    assert_eq!(added_count(&report, "activity#com.example.lib1.activityOne"), 1);
}

#[test]
fn test_tools_remove_rejects_lower_attribute() {
    let main = manifest(
        "com.example.app",
        r#"    <application>
        <activity android:name="com.example.app.activityOne" tools:remove="theme"/>
    </application>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <application>
        <activity android:name="com.example.app.activityOne" android:theme="@oldtheme"/>
    </application>"#,
    );

    let report = merge(MergeType::Library, &main, &[("lib1", library)]);
    assert!(report.result().is_success());

    let document = report.merged_document().unwrap();
    let activities = document.elements_of_type(NodeType::Activity);
    assert_eq!(activities.len(), 1);
    let activity = document.element(activities[0]);
    let mut names: Vec<String> = activity
        .attributes()
        .iter()
        .map(|attribute| attribute.name().to_string())
        .collect();
    names.sort();
    assert_eq!(names, vec!["android:name", "tools:remove"]);

    let records = report.actions().attribute_records(
        &NodeKey::new("activity#com.example.app.activityOne"),
        &QualifiedName::android("theme"),
    );
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].record.action_type, ActionType::Rejected);
    assert_eq!(records[0].operation, Some(AttributeOperationType::Remove));
}

#[test]
fn test_min_sdk_higher_in_library_fails() {
    let main = manifest(
        "com.example.app",
        r#"    <uses-sdk android:minSdkVersion="4"/>
    <application/>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <uses-sdk android:minSdkVersion="19"/>
    <application/>"#,
    );

    let report = merge(MergeType::Application, &main, &[("lib1", library)]);
    assert_eq!(report.result(), MergeResult::Error);
    assert!(report.merged_document().is_none());
    let matching: Vec<_> = report
        .records()
        .iter()
        .filter(|record| record.message.contains("uses-sdk:minSdkVersion 4"))
        .collect();
    assert_eq!(matching.len(), 1);
}

#[test]
fn test_old_library_implies_permissions() {
    let main = manifest(
        "com.example.app",
        r#"    <uses-sdk android:minSdkVersion="1" android:targetSdkVersion="14"/>
    <application/>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <uses-sdk android:minSdkVersion="1" android:targetSdkVersion="3"/>
    <application/>"#,
    );

    let report = merge(MergeType::Application, &main, &[("lib1", library)]);
    assert!(report.result().is_success());
    let document = report.merged_document().unwrap();
    let permissions = keys_of(document, NodeType::UsesPermission);
    assert_eq!(
        permissions,
        vec![
            "android.permission.READ_EXTERNAL_STORAGE",
            "android.permission.READ_PHONE_STATE",
            "android.permission.WRITE_EXTERNAL_STORAGE",
        ]
    );

    for permission in ["WRITE_EXTERNAL_STORAGE", "READ_PHONE_STATE"] {
        let key = NodeKey::new(format!("uses-permission#android.permission.{}", permission));
        let records = report.actions().node_records(&key);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.action_type, ActionType::Added);
        assert!(records[0]
            .record
            .reason
            .as_deref()
            .unwrap_or_default()
            .contains("targetSdkVersion < 4"));
    }
}

#[test]
fn test_remove_all_with_selector() {
    let main = manifest(
        "com.example.app",
        r#"    <permission android:name="permissionOne" tools:node="merge"/>
    <permission tools:node="removeAll" tools:selector="com.example.lib1"/>
    <application/>"#,
    );
    let library_one = manifest(
        "com.example.lib1",
        r#"    <permission android:name="lib1First"/>
    <permission android:name="lib1Second"/>"#,
    );
    let library_two = manifest(
        "com.example.lib2",
        r#"    <permission android:name="lib2First"/>
    <permission android:name="lib2Second"/>"#,
    );

    let report = merge(
        MergeType::Application,
        &main,
        &[("lib1", library_one), ("lib2", library_two)],
    );
    assert!(report.result().is_success());
    let document = report.merged_document().unwrap();
    assert_eq!(
        keys_of(document, NodeType::Permission),
        vec!["lib2First", "lib2Second", "permissionOne"]
    );

    let rejected = report.actions().node_records(&NodeKey::new("permission#lib1First"));
    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].record.action_type, ActionType::Rejected);
    assert_eq!(rejected[0].operation, NodeOperationType::RemoveAll);
}

// ============================================================================
// Sequential folds
// ============================================================================

#[test]
fn test_node_remove_survives_overlay_fold() {
    let overlay = manifest(
        "com.example.app",
        r#"    <application>
        <activity android:name=".Foo" android:label="x"/>
    </application>"#,
    );
    let main = manifest(
        "com.example.app",
        r#"    <application>
        <activity android:name=".Foo" tools:node="remove"/>
    </application>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <application>
        <activity android:name="com.example.app.Foo" android:exported="true"/>
    </application>"#,
    );

    let report = merge_with_overlay(&main, &overlay, &[("lib1", library)]);
    assert!(report.result().is_success());
    let document = report.merged_document().unwrap();
    assert!(keys_of(document, NodeType::Activity).is_empty());

    let records = report
        .actions()
        .node_records(&NodeKey::new("activity#com.example.app.Foo"));
    assert!(records.iter().any(|record| record.record.action_type == ActionType::Rejected
        && record.operation == NodeOperationType::Remove));
}

#[test]
fn test_remove_all_selector_survives_overlay_fold() {
    let overlay = manifest(
        "com.example.app",
        r#"    <permission android:name="overlayPermission"/>"#,
    );
    let main = manifest(
        "com.example.app",
        r#"    <permission tools:node="removeAll" tools:selector="com.example.lib1"/>
    <application/>"#,
    );
    let library_one = manifest(
        "com.example.lib1",
        r#"    <permission android:name="lib1First"/>
    <permission android:name="lib1Second"/>"#,
    );
    let library_two = manifest(
        "com.example.lib2",
        r#"    <permission android:name="lib2First"/>"#,
    );

    let report = merge_with_overlay(
        &main,
        &overlay,
        &[("lib1", library_one), ("lib2", library_two)],
    );
    assert!(report.result().is_success());
    let document = report.merged_document().unwrap();
    assert_eq!(
        keys_of(document, NodeType::Permission),
        vec!["lib2First", "overlayPermission"]
    );

    for key in ["permission#lib1First", "permission#lib1Second"] {
        let records = report.actions().node_records(&NodeKey::new(key));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].record.action_type, ActionType::Rejected);
        assert_eq!(records[0].operation, NodeOperationType::RemoveAll);
    }
}

#[test]
fn test_attribute_remove_survives_overlay_fold() {
    let overlay = manifest(
        "com.example.app",
        r#"    <application>
        <activity android:name=".Foo" android:label="x"/>
    </application>"#,
    );
    let main = manifest(
        "com.example.app",
        r#"    <application>
        <activity android:name=".Foo" tools:remove="theme"/>
    </application>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <application>
        <activity android:name="com.example.app.Foo" android:theme="@style/Lib"/>
    </application>"#,
    );

    let report = merge_with_overlay(&main, &overlay, &[("lib1", library)]);
    assert!(report.result().is_success());
    let document = report.merged_document().unwrap();
    let activity = document.element(
        document
            .by_type_and_key(NodeType::Activity, Some("com.example.app.Foo"))
            .unwrap(),
    );
    assert_eq!(activity.attribute_value(&QualifiedName::android("theme")), None);
    assert_eq!(activity.attribute_value(&QualifiedName::android("label")), Some("x"));

    let records = report.actions().attribute_records(
        &NodeKey::new("activity#com.example.app.Foo"),
        &QualifiedName::android("theme"),
    );
    assert!(records.iter().any(|record| record.record.action_type == ActionType::Rejected
        && record.operation == Some(AttributeOperationType::Remove)));
}

// ============================================================================
// Properties
// ============================================================================

#[test]
fn test_identity_is_stable_across_merge() {
    let main = manifest(
        "com.example.app",
        r#"    <uses-permission android:name="android.permission.INTERNET"/>
    <application>
        <service android:name=".Sync"/>
        <provider android:name=".Data" android:authorities="com.example.app.data"/>
    </application>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <uses-permission android:name="android.permission.INTERNET"/>
    <application>
        <receiver android:name=".Boot"/>
    </application>"#,
    );

    let original = manifestmerger::XmlLoader::new()
        .load(
            manifestmerger::SourceFile::named("main"),
            &main,
            manifestmerger::DocumentType::Main,
            None,
        )
        .unwrap();
    let report = merge(MergeType::Application, &main, &[("lib1", library)]);
    let merged = report.merged_document().unwrap();

    for node_type in [NodeType::UsesPermission, NodeType::Service, NodeType::Provider] {
        for key in keys_of(&original, node_type) {
            assert!(
                merged.by_type_and_key(node_type, Some(&key)).is_some(),
                "{} lost during merge",
                key
            );
        }
    }
}

#[test]
fn test_higher_only_attributes_win() {
    let main = manifest(
        "com.example.app",
        r#"    <uses-sdk android:minSdkVersion="21" android:targetSdkVersion="30"/>
    <uses-feature android:name="android.hardware.camera" android:required="false"/>
    <application android:label="@string/app" android:icon="@drawable/icon">
        <activity android:name=".Main" android:exported="true"/>
    </application>"#,
    );
    let library = manifest(
        "com.example.lib1",
        r#"    <uses-sdk android:minSdkVersion="14"/>
    <uses-feature android:name="android.hardware.camera"/>
    <application>
        <activity android:name="com.example.app.Main"/>
    </application>"#,
    );

    let report = merge(MergeType::Application, &main, &[("lib1", library)]);
    assert!(report.result().is_success());
    let document = report.merged_document().unwrap();

    let application = document.element(document.by_type_and_key(NodeType::Application, None).unwrap());
    assert_eq!(application.attribute_value(&QualifiedName::android("label")), Some("@string/app"));
    assert_eq!(application.attribute_value(&QualifiedName::android("icon")), Some("@drawable/icon"));

    let activity = document.element(
        document
            .by_type_and_key(NodeType::Activity, Some("com.example.app.Main"))
            .unwrap(),
    );
    assert_eq!(activity.attribute_value(&QualifiedName::android("exported")), Some("true"));
    assert_eq!(document.min_sdk_version(), Some("21"));
}

#[test]
fn test_strict_identical_subtrees() {
    let body = r#"    <application>
        <activity android:name="com.example.shared.Viewer" android:exported="true" tools:node="strict">
            <intent-filter>
                <action android:name="android.intent.action.VIEW"/>
                <category android:name="android.intent.category.DEFAULT"/>
            </intent-filter>
        </activity>
    </application>"#;
    let main = manifest("com.example.app", body);
    let library = manifest("com.example.lib1", &body.replace(" tools:node=\"strict\"", ""));

    let report = merge(MergeType::Application, &main, &[("lib1", library)]);
    assert_eq!(report.result(), MergeResult::Success);

    let alone = merge(MergeType::Application, &main, &[]);
    assert_eq!(report.merged_xml(), alone.merged_xml());
}

#[test]
fn test_package_expansion_is_idempotent() {
    assert_eq!(expand_class_name("com.a.B", "com.a"), "com.a.B");
    assert_eq!(expand_class_name(&expand_class_name(".B", "com.a"), "com.a"), "com.a.B");
}
