use std::str::FromStr;

use thiserror::Error;

use super::name::QualifiedName;
use super::ANDROID_URI;
use crate::resolver::KeyResolver;

/// Malformed `tools:` instruction found while loading a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InstructionError {
    #[error("Invalid instruction tools:node=\"{0}\", valid values are merge, remove, removeAll, replace, strict, mergeOnlyAttributes")]
    InvalidNodeOperation(String),
    #[error("Unknown instruction tools:{0}")]
    UnknownInstruction(String),
    #[error("Malformed attribute list in tools:{instruction}=\"{value}\"")]
    MalformedAttributeList { instruction: String, value: String },
    #[error("Empty selector in tools:selector")]
    EmptySelector,
}

/// Element level instruction carried by `tools:node`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeOperationType {
    #[default]
    Merge,
    Remove,
    RemoveAll,
    Replace,
    Strict,
    MergeOnlyAttributes,
}

impl NodeOperationType {
    /// Parse the `tools:node` attribute value
    pub fn from_xml_value(value: &str) -> Option<Self> {
        match value {
            "merge" => Some(NodeOperationType::Merge),
            "remove" => Some(NodeOperationType::Remove),
            "removeAll" => Some(NodeOperationType::RemoveAll),
            "replace" => Some(NodeOperationType::Replace),
            "strict" => Some(NodeOperationType::Strict),
            "mergeOnlyAttributes" => Some(NodeOperationType::MergeOnlyAttributes),
            _ => None,
        }
    }

    pub fn xml_value(&self) -> &'static str {
        match self {
            NodeOperationType::Merge => "merge",
            NodeOperationType::Remove => "remove",
            NodeOperationType::RemoveAll => "removeAll",
            NodeOperationType::Replace => "replace",
            NodeOperationType::Strict => "strict",
            NodeOperationType::MergeOnlyAttributes => "mergeOnlyAttributes",
        }
    }

    /// Instructions that discard whatever the lower priority side declares
    pub fn is_overriding(&self) -> bool {
        matches!(
            self,
            NodeOperationType::Replace | NodeOperationType::Remove | NodeOperationType::RemoveAll
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeOperationType::Merge => "MERGE",
            NodeOperationType::Remove => "REMOVE",
            NodeOperationType::RemoveAll => "REMOVE_ALL",
            NodeOperationType::Replace => "REPLACE",
            NodeOperationType::Strict => "STRICT",
            NodeOperationType::MergeOnlyAttributes => "MERGE_ONLY_ATTRIBUTES",
        }
    }
}

impl std::fmt::Display for NodeOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeOperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MERGE" => Ok(NodeOperationType::Merge),
            "REMOVE" => Ok(NodeOperationType::Remove),
            "REMOVE_ALL" => Ok(NodeOperationType::RemoveAll),
            "REPLACE" => Ok(NodeOperationType::Replace),
            "STRICT" => Ok(NodeOperationType::Strict),
            "MERGE_ONLY_ATTRIBUTES" => Ok(NodeOperationType::MergeOnlyAttributes),
            other => Err(format!("unknown node operation {}", other)),
        }
    }
}

/// Attribute level instruction carried by `tools:remove`, `tools:replace`
/// and `tools:strict`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeOperationType {
    Remove,
    Replace,
    Strict,
}

impl AttributeOperationType {
    pub fn xml_name(&self) -> &'static str {
        match self {
            AttributeOperationType::Remove => "remove",
            AttributeOperationType::Replace => "replace",
            AttributeOperationType::Strict => "strict",
        }
    }

    pub fn from_xml_name(name: &str) -> Option<Self> {
        match name {
            "remove" => Some(AttributeOperationType::Remove),
            "replace" => Some(AttributeOperationType::Replace),
            "strict" => Some(AttributeOperationType::Strict),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AttributeOperationType::Remove => "REMOVE",
            AttributeOperationType::Replace => "REPLACE",
            AttributeOperationType::Strict => "STRICT",
        }
    }
}

impl std::fmt::Display for AttributeOperationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttributeOperationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REMOVE" => Ok(AttributeOperationType::Remove),
            "REPLACE" => Ok(AttributeOperationType::Replace),
            "STRICT" => Ok(AttributeOperationType::Strict),
            other => Err(format!("unknown attribute operation {}", other)),
        }
    }
}

/// `tools:selector` value: restricts an instruction to elements that
/// originate from the document with this package
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Selector(String);

impl Selector {
    pub fn new(package: impl Into<String>) -> Self {
        Self(package.into())
    }

    pub fn value(&self) -> &str {
        &self.0
    }

    pub fn is_resolvable(&self, resolver: &dyn KeyResolver<String>) -> bool {
        resolver.resolve(&self.0).is_some()
    }

    /// Whether an element loaded from a document with `package` is targeted
    pub fn applies_to(&self, package: Option<&str>) -> bool {
        package == Some(self.0.as_str())
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Instructions recognised in the tools namespace; anything else is an error
const KNOWN_INSTRUCTIONS: &[&str] = &[
    "node",
    "selector",
    "remove",
    "replace",
    "strict",
    "ignore",
    "targetApi",
    "overrideLibrary",
];

/// Parsed `tools:` instructions of one element
///
/// These stay attached to the element (and the raw attributes stay in the
/// tree) until the cleaning pass, so a later fold can still apply them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolsInstructions {
    pub node: Option<NodeOperationType>,
    pub selector: Option<Selector>,
    pub attributes: Vec<(QualifiedName, AttributeOperationType)>,
}

impl ToolsInstructions {
    /// Parse from an element's attributes; `lookup` resolves prefixes used
    /// inside attribute lists such as `tools:remove="a:label"`
    pub fn parse<'a, I, F>(attributes: I, lookup: F) -> Result<Self, InstructionError>
    where
        I: IntoIterator<Item = (&'a QualifiedName, &'a str)>,
        F: Fn(&str) -> Option<String>,
    {
        let mut instructions = ToolsInstructions::default();
        for (name, value) in attributes {
            if !name.is_tools() {
                continue;
            }
            let local = name.local_name();
            if !KNOWN_INSTRUCTIONS.contains(&local) {
                return Err(InstructionError::UnknownInstruction(local.to_string()));
            }
            if local == "node" {
                let op = NodeOperationType::from_xml_value(value.trim())
                    .ok_or_else(|| InstructionError::InvalidNodeOperation(value.to_string()))?;
                instructions.node = Some(op);
            } else if local == "selector" {
                let value = value.trim();
                if value.is_empty() {
                    return Err(InstructionError::EmptySelector);
                }
                instructions.selector = Some(Selector::new(value));
            } else if let Some(op) = AttributeOperationType::from_xml_name(local) {
                for target in parse_attribute_list(local, value, &lookup)? {
                    instructions.add_attribute_operation(target, op);
                }
            }
        }
        Ok(instructions)
    }

    pub fn node_operation(&self) -> NodeOperationType {
        self.node.unwrap_or_default()
    }

    pub fn attribute_operation(&self, name: &QualifiedName) -> Option<AttributeOperationType> {
        self.attributes
            .iter()
            .find(|(target, _)| target == name)
            .map(|(_, op)| *op)
    }

    /// Names targeted by one kind of attribute instruction
    pub fn attributes_with(&self, op: AttributeOperationType) -> Vec<&QualifiedName> {
        self.attributes
            .iter()
            .filter(|(_, candidate)| *candidate == op)
            .map(|(name, _)| name)
            .collect()
    }

    /// First instruction for a name wins, matching the priority order
    pub fn add_attribute_operation(&mut self, name: QualifiedName, op: AttributeOperationType) {
        if self.attribute_operation(&name).is_none() {
            self.attributes.push((name, op));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.node.is_none() && self.selector.is_none() && self.attributes.is_empty()
    }
}

/// Parse a comma separated attribute list; unprefixed names are android
/// attributes
fn parse_attribute_list<F>(
    instruction: &str,
    value: &str,
    lookup: &F,
) -> Result<Vec<QualifiedName>, InstructionError>
where
    F: Fn(&str) -> Option<String>,
{
    let malformed = || InstructionError::MalformedAttributeList {
        instruction: instruction.to_string(),
        value: value.to_string(),
    };

    let mut names = Vec::new();
    for raw in value.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let name = if raw.contains(':') {
            QualifiedName::resolve(raw, |prefix| lookup(prefix)).ok_or_else(malformed)?
        } else {
            QualifiedName::new(Some(ANDROID_URI), raw)
        };
        if name.is_namespace_declaration() || name.local_name().contains(char::is_whitespace) {
            return Err(malformed());
        }
        names.push(name);
    }
    if names.is_empty() {
        return Err(malformed());
    }
    Ok(names)
}
