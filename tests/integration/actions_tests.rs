//! Action log tests
//!
//! These tests check that the decision log of a real merge survives
//! persistence and that the blame output points back at the inputs.

use std::collections::BTreeSet;
use std::path::Path;

use manifestmerger::actions::{ActionType, Actions, ActionsError};
use manifestmerger::document::SourceFilePosition;
use manifestmerger::{ManifestInput, ManifestMerger, MergeType, MergingReport};

const MAIN: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    xmlns:tools="http://schemas.android.com/tools"
    package="com.example.app">
    <uses-permission android:name="android.permission.INTERNET"/>
    <application android:label="@string/app" android:theme="@style/App">
        <activity android:name=".Main" tools:replace="label" android:label="main"/>
    </application>
</manifest>"#;

const LIBRARY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<manifest xmlns:android="http://schemas.android.com/apk/res/android"
    package="com.example.lib1">
    <uses-permission android:name="android.permission.CAMERA"/>
    <application android:theme="@style/App">
        <activity android:name="com.example.app.Main" android:label="lib"/>
        <service android:name=".Sync"/>
    </application>
</manifest>"#;

fn merge_files(dir: &Path) -> MergingReport {
    let main = dir.join("AndroidManifest.xml");
    let library = dir.join("lib1.xml");
    std::fs::write(&main, MAIN).unwrap();
    std::fs::write(&library, LIBRARY).unwrap();
    ManifestMerger::new(main, MergeType::Application)
        .add_library(ManifestInput::file(library))
        .merge()
}

fn node_pairs(actions: &Actions) -> Vec<(String, BTreeSet<(String, String)>)> {
    actions
        .node_keys()
        .map(|key| {
            let pairs = actions
                .node_records(key)
                .iter()
                .map(|record| (record.record.action_type.to_string(), printed(&record.record.location)))
                .collect();
            (key.to_string(), pairs)
        })
        .collect()
}

fn printed(location: &SourceFilePosition) -> String {
    location.print(false)
}

#[test]
fn test_persisted_log_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let report = merge_files(dir.path());
    assert!(report.result().is_success());
    let actions = report.actions();
    assert!(!actions.is_empty());

    let text = actions.persist();
    assert!(text.starts_with("manifest-merger-actions v1\n"));

    let loaded = Actions::load(&text).unwrap();
    assert_eq!(node_pairs(&loaded), node_pairs(actions));
    assert_eq!(loaded.persist(), text);
}

#[test]
fn test_replaced_attribute_survives_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let report = merge_files(dir.path());
    let loaded = Actions::load(&report.actions().persist()).unwrap();

    let key = report
        .actions()
        .node_keys()
        .find(|key| key.as_str() == "activity#com.example.app.Main")
        .cloned()
        .unwrap();
    let names = loaded.record_attribute_names(&key);
    assert!(names.iter().any(|name| name.local_name() == "label"));
    assert!(loaded
        .attribute_records(&key, names.iter().find(|name| name.local_name() == "label").unwrap())
        .iter()
        .any(|record| record.record.action_type == ActionType::Replaced));
}

#[test]
fn test_malformed_log_is_rejected() {
    assert_eq!(Actions::load("not a log"), Err(ActionsError::MissingHeader));
    assert!(matches!(
        Actions::load("manifest-merger-actions v1\n  record action=ADDED\n"),
        Err(ActionsError::Malformed { line: 2, .. })
    ));
}

#[test]
fn test_blame_points_at_inputs() {
    let dir = tempfile::tempdir().unwrap();
    let report = merge_files(dir.path());
    let document = report.merged_document().unwrap();
    let blame = report.actions().blame(document).unwrap();

    let printed = document.pretty_print();
    let plain_lines: Vec<&str> = blame.lines().filter(|line| !line.contains("-->")).collect();
    assert_eq!(plain_lines.len(), printed.lines().count());
    for (index, line) in printed.lines().enumerate() {
        assert_eq!(plain_lines[index], format!("{}{}", index + 1, line));
    }

    let main = dir.path().join("AndroidManifest.xml").display().to_string();
    let library = dir.path().join("lib1.xml").display().to_string();
    assert!(blame.lines().any(|line| line.contains(&format!("-->{}", main))));
    assert!(blame.lines().any(|line| line.contains(&format!("-->{}", library))));
}
