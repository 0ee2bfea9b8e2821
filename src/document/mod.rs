//! Document tree
//!
//! An [`XmlDocument`] owns an arena of [`XmlElement`]s addressed by
//! [`ElementId`]. Parent links are ids into the same arena, so copying a
//! document is a plain clone and merging never touches its inputs: the
//! merger clones the higher priority document and imports subtrees from the
//! lower priority one.

mod compare;
mod loader;
mod position;
mod printer;

pub use loader::{LoadError, XmlLoader};
pub use position::{SourceFile, SourceFilePosition, SourcePosition};

pub(crate) use position::LineIndex;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::model::{
    conventional_prefix, AttributeModel, AttributeOperationType, KeyStrategy, NodeKey,
    NodeOperationType, NodeType, QualifiedName, Selector, ToolsInstructions,
};
use crate::resolver::KeyResolver;

/// Shared selector resolver attached to loaded documents
pub type SharedSelectors = Arc<dyn KeyResolver<String> + Send + Sync>;

/// Index of an element inside its document's arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(usize);

/// Role of an input document in the merge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentType {
    Main,
    Library,
    Overlay,
}

impl DocumentType {
    pub fn display_name(&self) -> &'static str {
        match self {
            DocumentType::Main => "main",
            DocumentType::Library => "library",
            DocumentType::Overlay => "overlay",
        }
    }
}

/// Child node of an element, in document order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmlChild {
    Element(ElementId),
    Comment(String),
    Text(String),
}

impl XmlChild {
    /// Element id when this child is an element
    pub fn as_element(&self) -> Option<ElementId> {
        match self {
            XmlChild::Element(id) => Some(*id),
            _ => None,
        }
    }
}

/// One attribute occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlAttribute {
    name: QualifiedName,
    value: String,
    position: SourcePosition,
    source: SourceFile,
}

impl XmlAttribute {
    pub fn new(
        name: QualifiedName,
        value: impl Into<String>,
        position: SourcePosition,
        source: SourceFile,
    ) -> Self {
        Self {
            name,
            value: value.into(),
            position,
            source,
        }
    }

    /// Attribute created by the merger rather than read from an input
    pub fn injected(name: QualifiedName, value: impl Into<String>) -> Self {
        Self::new(name, value, SourcePosition::UNKNOWN, SourceFile::unknown())
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn position(&self) -> SourcePosition {
        self.position
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn location(&self) -> SourceFilePosition {
        SourceFilePosition::new(self.source.clone(), self.position)
    }

    /// Model of this attribute for an element of `node_type`
    pub fn model(&self, node_type: NodeType) -> Option<&'static AttributeModel> {
        node_type.attribute_model(&self.name)
    }
}

/// One element of a document
#[derive(Debug, Clone)]
pub struct XmlElement {
    name: QualifiedName,
    node_type: NodeType,
    key: Option<String>,
    attributes: Vec<XmlAttribute>,
    children: Vec<XmlChild>,
    parent: Option<ElementId>,
    position: SourcePosition,
    source: SourceFile,
    origin_package: Option<String>,
    instructions: ToolsInstructions,
}

impl XmlElement {
    pub fn new(
        name: QualifiedName,
        attributes: Vec<XmlAttribute>,
        position: SourcePosition,
        source: SourceFile,
    ) -> Self {
        let node_type = NodeType::from_tag(&name);
        Self {
            name,
            node_type,
            key: None,
            attributes,
            children: Vec::new(),
            parent: None,
            position,
            source,
            origin_package: None,
            instructions: ToolsInstructions::default(),
        }
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn node_type(&self) -> NodeType {
        self.node_type
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// Cross-document identity, e.g. `activity#com.example.Main`
    pub fn id(&self) -> NodeKey {
        let tag = match self.node_type {
            NodeType::Custom => self.name.local_name(),
            known => known.xml_name(),
        };
        NodeKey::from_parts(tag, self.key.as_deref())
    }

    pub fn attributes(&self) -> &[XmlAttribute] {
        &self.attributes
    }

    pub fn attribute(&self, name: &QualifiedName) -> Option<&XmlAttribute> {
        self.attributes.iter().find(|attr| &attr.name == name)
    }

    pub fn attribute_value(&self, name: &QualifiedName) -> Option<&str> {
        self.attribute(name).map(XmlAttribute::value)
    }

    pub fn children(&self) -> &[XmlChild] {
        &self.children
    }

    pub fn parent(&self) -> Option<ElementId> {
        self.parent
    }

    pub fn position(&self) -> SourcePosition {
        self.position
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn location(&self) -> SourceFilePosition {
        SourceFilePosition::new(self.source.clone(), self.position)
    }

    /// Package of the document this element was loaded from
    pub fn origin_package(&self) -> Option<&str> {
        self.origin_package.as_deref()
    }

    pub fn instructions(&self) -> &ToolsInstructions {
        &self.instructions
    }

    pub fn operation_type(&self) -> NodeOperationType {
        self.instructions.node_operation()
    }

    pub fn selector(&self) -> Option<&Selector> {
        self.instructions.selector.as_ref()
    }

    pub fn attribute_operation(&self, name: &QualifiedName) -> Option<AttributeOperationType> {
        self.instructions.attribute_operation(name)
    }

    /// Whether `package` is targeted by this element's selector (no selector targets all)
    pub fn is_selected(&self, package: Option<&str>) -> bool {
        self.selector()
            .map_or(true, |selector| selector.applies_to(package))
    }

    pub(crate) fn set_origin_package(&mut self, package: Option<String>) {
        self.origin_package = package;
    }

    pub(crate) fn set_instructions(&mut self, instructions: ToolsInstructions) {
        self.instructions = instructions;
    }

    pub(crate) fn instructions_mut(&mut self) -> &mut ToolsInstructions {
        &mut self.instructions
    }
}

/// A loaded manifest
#[derive(Clone)]
pub struct XmlDocument {
    source: SourceFile,
    doc_type: DocumentType,
    package_override: Option<String>,
    elements: Vec<XmlElement>,
    root: ElementId,
    selectors: Option<SharedSelectors>,
}

impl std::fmt::Debug for XmlDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XmlDocument")
            .field("source", &self.source)
            .field("doc_type", &self.doc_type)
            .field("package", &self.package_name())
            .field("elements", &self.elements.len())
            .finish()
    }
}

impl XmlDocument {
    pub(crate) fn from_parts(
        source: SourceFile,
        doc_type: DocumentType,
        package_override: Option<String>,
        root: XmlElement,
    ) -> Self {
        Self {
            source,
            doc_type,
            package_override,
            elements: vec![root],
            root: ElementId(0),
            selectors: None,
        }
    }

    /// Attach a selector resolver without validating existing selectors
    pub fn with_selectors(mut self, selectors: SharedSelectors) -> Self {
        self.selectors = Some(selectors);
        self
    }

    pub fn selectors(&self) -> Option<&SharedSelectors> {
        self.selectors.as_ref()
    }

    pub fn source(&self) -> &SourceFile {
        &self.source
    }

    pub fn doc_type(&self) -> DocumentType {
        self.doc_type
    }

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn root_element(&self) -> &XmlElement {
        self.element(self.root)
    }

    pub fn element(&self, id: ElementId) -> &XmlElement {
        &self.elements[id.0]
    }

    pub(crate) fn element_mut(&mut self, id: ElementId) -> &mut XmlElement {
        &mut self.elements[id.0]
    }

    /// Package override for the main document, else the declared `package`
    pub fn package_name(&self) -> Option<&str> {
        self.package_override.as_deref().or_else(|| {
            self.root_element()
                .attribute_value(&QualifiedName::local("package"))
        })
    }

    pub(crate) fn package_override(&self) -> Option<&str> {
        self.package_override.as_deref()
    }

    /// Element children of `id`, skipping comments and text
    pub fn mergeable_elements(&self, id: ElementId) -> Vec<ElementId> {
        self.element(id)
            .children
            .iter()
            .filter_map(|child| match child {
                XmlChild::Element(child) => Some(*child),
                _ => None,
            })
            .collect()
    }

    /// Exact match on type and key among the direct children of `parent`;
    /// a `None` key only matches keyless elements
    pub fn node_by_type_and_key(
        &self,
        parent: ElementId,
        node_type: NodeType,
        key: Option<&str>,
    ) -> Option<ElementId> {
        self.mergeable_elements(parent).into_iter().find(|child| {
            let element = self.element(*child);
            element.node_type == node_type && element.key.as_deref() == key
        })
    }

    /// [`Self::node_by_type_and_key`] on the root's children
    pub fn by_type_and_key(&self, node_type: NodeType, key: Option<&str>) -> Option<ElementId> {
        self.node_by_type_and_key(self.root, node_type, key)
    }

    /// `id` and all its attached descendants, pre-order
    pub fn descendants(&self, id: ElementId) -> Vec<ElementId> {
        let mut result = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            result.push(current);
            let children = self.mergeable_elements(current);
            stack.extend(children.into_iter().rev());
        }
        result
    }

    /// Every attached element of a type, in document order
    pub fn elements_of_type(&self, node_type: NodeType) -> Vec<ElementId> {
        self.descendants(self.root)
            .into_iter()
            .filter(|id| self.element(*id).node_type == node_type)
            .collect()
    }

    /// Comment immediately preceding `id` in its parent, ignoring text
    pub fn preceding_comment(&self, id: ElementId) -> Option<&str> {
        let parent = self.element(id).parent?;
        let children = &self.element(parent).children;
        let index = self.child_index(parent, id)?;
        children[..index]
            .iter()
            .rev()
            .find(|child| !matches!(child, XmlChild::Text(_)))
            .and_then(|child| match child {
                XmlChild::Comment(text) => Some(text.as_str()),
                _ => None,
            })
    }

    pub(crate) fn child_index(&self, parent: ElementId, id: ElementId) -> Option<usize> {
        self.element(parent)
            .children
            .iter()
            .position(|child| *child == XmlChild::Element(id))
    }

    /// Prefix declared for a namespace anywhere in the document, root first
    pub fn prefix_for(&self, uri: &str) -> Option<String> {
        self.descendants(self.root).into_iter().find_map(|id| {
            self.element(id).attributes.iter().find_map(|attr| {
                (attr.name.is_namespace_declaration() && attr.value == uri)
                    .then(|| attr.name.local_name().to_string())
            })
        })
    }

    /// Display form of a name using this document's prefixes
    pub fn display_name(&self, name: &QualifiedName) -> String {
        match name.namespace() {
            None => name.local_name().to_string(),
            Some(_) if name.is_namespace_declaration() => name.with_prefix(None),
            Some(uri) => match self.prefix_for(uri) {
                Some(prefix) => name.with_prefix(Some(&prefix)),
                None => match conventional_prefix(uri) {
                    Some(prefix) => name.with_prefix(Some(prefix)),
                    None => name.to_string(),
                },
            },
        }
    }

    /// Raw `minSdkVersion` of the top level `uses-sdk`, if declared
    pub fn min_sdk_version(&self) -> Option<&str> {
        self.uses_sdk_attribute("minSdkVersion")
    }

    /// Raw `targetSdkVersion` of the top level `uses-sdk`, if declared
    pub fn target_sdk_version(&self) -> Option<&str> {
        self.uses_sdk_attribute("targetSdkVersion")
    }

    fn uses_sdk_attribute(&self, local: &str) -> Option<&str> {
        let uses_sdk = self.by_type_and_key(NodeType::UsesSdk, None)?;
        self.element(uses_sdk)
            .attribute_value(&QualifiedName::android(local))
    }

    // ------------------------------------------------------------------
    // Mutation, used while building a merged document
    // ------------------------------------------------------------------

    /// Add a detached element to the arena
    pub(crate) fn create_element(&mut self, element: XmlElement) -> ElementId {
        let id = ElementId(self.elements.len());
        self.elements.push(element);
        self.refresh_key(id);
        id
    }

    pub(crate) fn append_child(&mut self, parent: ElementId, child: ElementId) {
        self.element_mut(child).parent = Some(parent);
        self.element_mut(parent).children.push(XmlChild::Element(child));
        self.refresh_key(parent);
    }

    pub(crate) fn insert_child(&mut self, parent: ElementId, index: usize, child: XmlChild) {
        if let XmlChild::Element(id) = child {
            self.element_mut(id).parent = Some(parent);
        }
        let children = &mut self.element_mut(parent).children;
        let index = index.min(children.len());
        children.insert(index, child);
        self.refresh_key(parent);
    }

    pub(crate) fn push_comment(&mut self, parent: ElementId, text: &str) {
        self.element_mut(parent)
            .children
            .push(XmlChild::Comment(text.to_string()));
    }

    pub(crate) fn push_text(&mut self, parent: ElementId, text: &str) {
        self.element_mut(parent)
            .children
            .push(XmlChild::Text(text.to_string()));
    }

    /// Detach `id` from its parent; the element stays in the arena as an orphan
    pub(crate) fn remove_element(&mut self, id: ElementId) {
        let Some(parent) = self.element(id).parent else {
            return;
        };
        self.element_mut(parent)
            .children
            .retain(|child| *child != XmlChild::Element(id));
        self.element_mut(id).parent = None;
        self.refresh_key(parent);
    }

    /// Detach a comment child at `index` of `parent`, returning its text
    pub(crate) fn remove_comment_at(&mut self, parent: ElementId, index: usize) -> Option<String> {
        let children = &mut self.element_mut(parent).children;
        if !matches!(children.get(index), Some(XmlChild::Comment(_))) {
            return None;
        }
        match children.remove(index) {
            XmlChild::Comment(text) => Some(text),
            _ => None,
        }
    }

    /// Set or replace an attribute, keeping its slot when it already exists
    pub(crate) fn set_attribute(&mut self, id: ElementId, attribute: XmlAttribute) {
        let element = self.element_mut(id);
        match element
            .attributes
            .iter_mut()
            .find(|existing| existing.name == attribute.name)
        {
            Some(existing) => *existing = attribute,
            None => element.attributes.push(attribute),
        }
        self.refresh_key(id);
    }

    /// Change the value of an existing attribute, keeping its provenance
    pub(crate) fn set_attribute_value(&mut self, id: ElementId, name: &QualifiedName, value: &str) {
        if let Some(attribute) = self
            .element_mut(id)
            .attributes
            .iter_mut()
            .find(|attr| &attr.name == name)
        {
            attribute.value = value.to_string();
        }
        self.refresh_key(id);
    }

    pub(crate) fn remove_attribute(
        &mut self,
        id: ElementId,
        name: &QualifiedName,
    ) -> Option<XmlAttribute> {
        let attributes = &mut self.element_mut(id).attributes;
        let index = attributes.iter().position(|attr| &attr.name == name)?;
        let removed = attributes.remove(index);
        self.refresh_key(id);
        Some(removed)
    }

    /// Deep copy `id` of `other` into this arena, detached
    pub(crate) fn import_element(&mut self, other: &XmlDocument, id: ElementId) -> ElementId {
        let source = other.element(id);
        let mut copy = source.clone();
        copy.children = Vec::new();
        copy.parent = None;
        let new_id = ElementId(self.elements.len());
        self.elements.push(copy);

        for child in &source.children {
            match child {
                XmlChild::Element(child) => {
                    let imported = self.import_element(other, *child);
                    self.element_mut(imported).parent = Some(new_id);
                    self.element_mut(new_id)
                        .children
                        .push(XmlChild::Element(imported));
                }
                other_child => self.element_mut(new_id).children.push(other_child.clone()),
            }
        }
        self.refresh_key(new_id);
        new_id
    }

    /// Recompute every key bottom-up
    pub(crate) fn refresh_all_keys(&mut self) {
        for id in self.descendants(self.root).into_iter().rev() {
            let key = self.compute_key(id);
            self.element_mut(id).key = key;
        }
    }

    /// Recompute the key of `id` and of ancestors whose key depends on children
    fn refresh_key(&mut self, id: ElementId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let key = self.compute_key(id);
            self.element_mut(id).key = key;
            current = self
                .element(id)
                .parent
                .filter(|parent| self.element(*parent).node_type.key_strategy() == KeyStrategy::Children);
        }
    }

    fn compute_key(&self, id: ElementId) -> Option<String> {
        let element = self.element(id);
        match element.node_type.key_strategy() {
            KeyStrategy::None => None,
            KeyStrategy::FirstOf(names) => names.iter().find_map(|name| {
                element
                    .attribute_value(&QualifiedName::android(name))
                    .map(str::to_string)
            }),
            KeyStrategy::Composite(names) => {
                let values: Vec<&str> = names
                    .iter()
                    .filter_map(|name| element.attribute_value(&QualifiedName::android(name)))
                    .collect();
                (!values.is_empty()).then(|| values.join("+"))
            }
            KeyStrategy::Children => {
                let mut ids: Vec<String> = self
                    .mergeable_elements(id)
                    .into_iter()
                    .map(|child| self.element(child))
                    .filter(|child| {
                        matches!(child.node_type, NodeType::Action | NodeType::Category)
                    })
                    .map(|child| child.id().to_string())
                    .collect();
                ids.sort();
                (!ids.is_empty()).then(|| ids.join("+"))
            }
        }
    }
}
