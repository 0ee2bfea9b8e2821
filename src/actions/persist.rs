use std::collections::HashMap;

use thiserror::Error;

use super::{ActionType, Actions, AttributeRecord, NodeRecord, Record};
use crate::document::{SourceFile, SourceFilePosition, SourcePosition};
use crate::model::{NodeKey, QualifiedName};

const FORMAT_HEADER: &str = "manifest-merger-actions v1";

/// A persisted action log that cannot be read back
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionsError {
    #[error("Not an action log: expected header 'manifest-merger-actions v1'")]
    MissingHeader,

    #[error("Line {line}: {message}")]
    Malformed { line: usize, message: String },
}

impl Actions {
    /// Line oriented serialization, read back by [`Actions::load`]
    pub fn persist(&self) -> String {
        let mut out = String::from(FORMAT_HEADER);
        out.push('\n');
        for (key, tree) in &self.records {
            out.push_str(&format!("node {}\n", escape(key.as_str())));
            for record in &tree.node_records {
                out.push_str("  record ");
                out.push_str(&record_fields(&record.record, Some(record.operation.as_str())));
                out.push('\n');
            }
            for (name, records) in &tree.attribute_records {
                let mut fields = Vec::new();
                if let Some(namespace) = name.namespace() {
                    fields.push(("namespace", namespace.to_string()));
                }
                fields.push(("name", name.local_name().to_string()));
                out.push_str("  attribute ");
                out.push_str(&join_fields(&fields));
                out.push('\n');
                for record in records {
                    out.push_str("    record ");
                    out.push_str(&record_fields(
                        &record.record,
                        record.operation.as_ref().map(|op| op.as_str()),
                    ));
                    out.push('\n');
                }
            }
        }
        out
    }

    pub fn load(text: &str) -> Result<Actions, ActionsError> {
        let mut lines = text.lines().enumerate();
        match lines.next() {
            Some((_, header)) if header.trim_end() == FORMAT_HEADER => {}
            _ => return Err(ActionsError::MissingHeader),
        }

        let mut actions = Actions::new();
        let mut node: Option<NodeKey> = None;
        let mut attribute: Option<QualifiedName> = None;

        for (index, line) in lines {
            let line_number = index + 1;
            let malformed = |message: &str| ActionsError::Malformed {
                line: line_number,
                message: message.to_string(),
            };

            if line.trim().is_empty() {
                continue;
            } else if let Some(key) = line.strip_prefix("node ") {
                node = Some(NodeKey::new(unescape(key)));
                attribute = None;
            } else if let Some(fields) = line.strip_prefix("  attribute ") {
                if node.is_none() {
                    return Err(malformed("attribute outside of a node"));
                }
                let fields = parse_fields(fields).map_err(|m| malformed(&m))?;
                let local = fields.get("name").ok_or_else(|| malformed("missing name"))?;
                attribute = Some(QualifiedName::new(
                    fields.get("namespace").map(String::as_str),
                    local,
                ));
            } else if let Some(fields) = line.strip_prefix("    record ") {
                let (Some(key), Some(name)) = (&node, &attribute) else {
                    return Err(malformed("attribute record outside of an attribute"));
                };
                let fields = parse_fields(fields).map_err(|m| malformed(&m))?;
                let record = parse_record(&fields).map_err(|m| malformed(&m))?;
                let operation = fields
                    .get("operation")
                    .map(|op| op.parse())
                    .transpose()
                    .map_err(|m: String| malformed(&m))?;
                actions.add_attribute_record(key, name, AttributeRecord { record, operation });
            } else if let Some(fields) = line.strip_prefix("  record ") {
                let Some(key) = &node else {
                    return Err(malformed("record outside of a node"));
                };
                let fields = parse_fields(fields).map_err(|m| malformed(&m))?;
                let record = parse_record(&fields).map_err(|m| malformed(&m))?;
                let operation = fields
                    .get("operation")
                    .ok_or_else(|| malformed("missing operation"))?
                    .parse()
                    .map_err(|m: String| malformed(&m))?;
                actions.add_node_record(key, NodeRecord { record, operation });
            } else {
                return Err(malformed(&format!("unexpected line '{}'", line)));
            }
        }
        Ok(actions)
    }
}

fn record_fields(record: &Record, operation: Option<&str>) -> String {
    let mut fields = vec![("action", record.action_type.as_str().to_string())];
    if let Some(path) = record.location.file.path() {
        fields.push(("path", path.display().to_string()));
    }
    if let Some(description) = record.location.file.description() {
        fields.push(("description", description.to_string()));
    }
    if !record.location.position.is_unknown() {
        fields.push(("position", record.location.position.to_string()));
    }
    fields.push(("target", record.target_id.to_string()));
    if let Some(operation) = operation {
        fields.push(("operation", operation.to_string()));
    }
    if let Some(reason) = &record.reason {
        fields.push(("reason", reason.clone()));
    }
    join_fields(&fields)
}

fn parse_record(fields: &HashMap<String, String>) -> Result<Record, String> {
    let action_type = fields
        .get("action")
        .ok_or("missing action")?
        .parse::<ActionType>()?;
    let file = match (fields.get("path"), fields.get("description")) {
        (_, Some(description)) => SourceFile::named(description.clone()),
        (Some(path), None) => SourceFile::new(path),
        (None, None) => SourceFile::unknown(),
    };
    let position = match fields.get("position") {
        Some(text) => SourcePosition::parse(text).ok_or_else(|| format!("bad position {}", text))?,
        None => SourcePosition::UNKNOWN,
    };
    let target_id = NodeKey::new(fields.get("target").ok_or("missing target")?.clone());
    Ok(Record {
        action_type,
        location: SourceFilePosition::new(file, position),
        target_id,
        reason: fields.get("reason").cloned(),
    })
}

fn join_fields(fields: &[(&str, String)]) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{}={}", key, escape(value)))
        .collect::<Vec<_>>()
        .join("\t")
}

fn parse_fields(text: &str) -> Result<HashMap<String, String>, String> {
    text.split('\t')
        .map(|field| {
            field
                .split_once('=')
                .map(|(key, value)| (key.to_string(), unescape(value)))
                .ok_or_else(|| format!("field without value '{}'", field))
        })
        .collect()
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            other => out.push(other),
        }
    }
    out
}

fn unescape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
