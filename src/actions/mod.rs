//! Merge decision log
//!
//! Every decision the merger takes about an element or an attribute is kept
//! as a record keyed by the element's [`NodeKey`]. The log is built through an
//! [`ActionRecorder`] and frozen into [`Actions`] once the pipeline finishes.

mod persist;
mod recorder;

pub use persist::ActionsError;
pub use recorder::ActionRecorder;

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::document::{ElementId, LoadError, SourceFile, SourceFilePosition, XmlDocument, XmlLoader};
use crate::model::{AttributeOperationType, NodeKey, NodeOperationType, QualifiedName};

/// Kind of decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    /// Present in the output because an input declared it
    Added,
    /// Created or rewritten by the merger itself
    Injected,
    /// Reconciled from several inputs
    Merged,
    /// Dropped from the output
    Rejected,
    /// Overridden by a higher priority declaration
    Replaced,
    /// Duplicate of something already present
    Ignored,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Added => "ADDED",
            ActionType::Injected => "INJECTED",
            ActionType::Merged => "MERGED",
            ActionType::Rejected => "REJECTED",
            ActionType::Replaced => "REPLACED",
            ActionType::Ignored => "IGNORED",
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ADDED" => Ok(ActionType::Added),
            "INJECTED" => Ok(ActionType::Injected),
            "MERGED" => Ok(ActionType::Merged),
            "REJECTED" => Ok(ActionType::Rejected),
            "REPLACED" => Ok(ActionType::Replaced),
            "IGNORED" => Ok(ActionType::Ignored),
            other => Err(format!("unknown action type {}", other)),
        }
    }
}

/// Fields shared by node and attribute records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub action_type: ActionType,
    pub location: SourceFilePosition,
    /// Identity of the node the decision was about
    pub target_id: NodeKey,
    pub reason: Option<String>,
}

impl std::fmt::Display for Record {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} from {}", self.action_type, self.location.print(false))?;
        if let Some(reason) = &self.reason {
            write!(f, " reason: {}", reason)?;
        }
        Ok(())
    }
}

/// Decision about an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    pub record: Record,
    pub operation: NodeOperationType,
}

/// Decision about one attribute of an element
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRecord {
    pub record: Record,
    pub operation: Option<AttributeOperationType>,
}

/// Every record of one node key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionTreeRecord {
    node_records: Vec<NodeRecord>,
    attribute_records: Vec<(QualifiedName, Vec<AttributeRecord>)>,
}

impl DecisionTreeRecord {
    pub fn node_records(&self) -> &[NodeRecord] {
        &self.node_records
    }

    pub fn attribute_records(&self, name: &QualifiedName) -> &[AttributeRecord] {
        self.attribute_records
            .iter()
            .find(|(candidate, _)| candidate == name)
            .map(|(_, records)| records.as_slice())
            .unwrap_or(&[])
    }

    /// Attribute names in first-recorded order
    pub fn attribute_names(&self) -> impl Iterator<Item = &QualifiedName> {
        self.attribute_records.iter().map(|(name, _)| name)
    }

    fn add_attribute_record(&mut self, name: &QualifiedName, record: AttributeRecord) {
        match self
            .attribute_records
            .iter_mut()
            .find(|(candidate, _)| candidate == name)
        {
            Some((_, records)) => records.push(record),
            None => self.attribute_records.push((name.clone(), vec![record])),
        }
    }
}

/// Immutable decision log produced by a merge
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Actions {
    records: Vec<(NodeKey, DecisionTreeRecord)>,
    index: HashMap<NodeKey, usize>,
}

pub(crate) const HEADER: &str = "-- Merging decision tree log ---\n";

impl Actions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node keys in first-recorded order
    pub fn node_keys(&self) -> impl Iterator<Item = &NodeKey> {
        self.records.iter().map(|(key, _)| key)
    }

    pub fn decision_tree(&self, key: &NodeKey) -> Option<&DecisionTreeRecord> {
        self.index.get(key).map(|index| &self.records[*index].1)
    }

    pub fn node_records(&self, key: &NodeKey) -> &[NodeRecord] {
        self.decision_tree(key)
            .map(DecisionTreeRecord::node_records)
            .unwrap_or(&[])
    }

    pub fn attribute_records(&self, key: &NodeKey, name: &QualifiedName) -> &[AttributeRecord] {
        self.decision_tree(key)
            .map(|tree| tree.attribute_records(name))
            .unwrap_or(&[])
    }

    pub fn record_attribute_names(&self, key: &NodeKey) -> Vec<&QualifiedName> {
        self.decision_tree(key)
            .map(|tree| tree.attribute_names().collect())
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn tree_mut(&mut self, key: &NodeKey) -> &mut DecisionTreeRecord {
        let index = match self.index.get(key) {
            Some(index) => *index,
            None => {
                self.records.push((key.clone(), DecisionTreeRecord::default()));
                self.index.insert(key.clone(), self.records.len() - 1);
                self.records.len() - 1
            }
        };
        &mut self.records[index].1
    }

    pub(crate) fn add_node_record(&mut self, key: &NodeKey, record: NodeRecord) {
        self.tree_mut(key).node_records.push(record);
    }

    pub(crate) fn add_attribute_record(
        &mut self,
        key: &NodeKey,
        name: &QualifiedName,
        record: AttributeRecord,
    ) {
        self.tree_mut(key).add_attribute_record(name, record);
    }

    /// Human readable decision tree
    pub fn log(&self) -> String {
        let mut out = String::from(HEADER);
        for (key, tree) in &self.records {
            out.push_str(&format!("{}\n", key));
            for record in &tree.node_records {
                out.push_str(&format!("{}\n", record.record));
            }
            for (name, records) in &tree.attribute_records {
                out.push_str(&format!("\t{}\n", name));
                for record in records {
                    out.push_str(&format!("\t\t{}\n", record.record));
                }
            }
        }
        debug!("{}", out);
        out
    }

    /// Annotate each line of the printed document with where its content came from
    pub fn blame(&self, document: &XmlDocument) -> Result<String, LoadError> {
        let printed = document.pretty_print();
        let reloaded = XmlLoader::new().load(
            SourceFile::unknown(),
            &printed,
            document.doc_type(),
            None,
        )?;

        let mut mappings: Vec<(usize, &Record)> = Vec::new();
        for child in reloaded.mergeable_elements(reloaded.root()) {
            self.collect_mappings(&reloaded, child, &mut mappings);
        }

        let mut out = String::new();
        for (index, line) in printed.lines().enumerate() {
            let count = index + 1;
            out.push_str(&format!("{}{}\n", count, line));
            for (_, record) in mappings.iter().filter(|(line, _)| *line == count) {
                out.push_str(&format!("{}-->{}\n", count, record.location.print(false)));
            }
        }
        Ok(out)
    }

    fn collect_mappings<'a>(
        &'a self,
        document: &XmlDocument,
        id: ElementId,
        mappings: &mut Vec<(usize, &'a Record)>,
    ) {
        let element = document.element(id);
        if let Some(tree) = self.decision_tree(&element.id()) {
            if let Some(added) = tree
                .node_records
                .iter()
                .find(|record| record.record.action_type == ActionType::Added)
            {
                mappings.push((element.position().start_line, &added.record));
            }
            for attribute in element.attributes() {
                if let Some(added) = tree
                    .attribute_records(attribute.name())
                    .iter()
                    .find(|record| record.record.action_type == ActionType::Added)
                {
                    mappings.push((attribute.position().start_line, &added.record));
                }
            }
        }
        for child in document.mergeable_elements(id) {
            self.collect_mappings(document, child, mappings);
        }
    }
}
