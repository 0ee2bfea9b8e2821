use tracing::debug;

use crate::actions::ActionType;
use crate::document::{DocumentType, ElementId, XmlChild, XmlDocument};
use crate::model::{NodeMergeType, NodeOperationType, NodeType};
use crate::report::{ReportBuilder, Severity};

/// Reconciles one lower priority document into a copy of the higher
/// priority one
pub(crate) struct ElementMerger<'a> {
    pub(super) merged: &'a mut XmlDocument,
    pub(super) lower: &'a XmlDocument,
    pub(super) report: &'a mut ReportBuilder,
}

impl<'a> ElementMerger<'a> {
    pub fn new(
        merged: &'a mut XmlDocument,
        lower: &'a XmlDocument,
        report: &'a mut ReportBuilder,
    ) -> Self {
        Self {
            merged,
            lower,
            report,
        }
    }

    /// The root contributes its namespace declarations and, when the lower
    /// document is the main manifest below an overlay, the attributes the
    /// overlay leaves unset. Its children are merged as usual.
    pub fn merge_root(&mut self) {
        let lower = self.lower;
        let root = self.merged.root();
        let lower_root = lower.root();
        let carry_attributes = lower.doc_type() == DocumentType::Main;

        for attribute in lower.element(lower_root).attributes() {
            let name = attribute.name();
            if name.is_tools() || self.merged.element(root).attribute(name).is_some() {
                continue;
            }
            if name.is_namespace_declaration() {
                self.merged.set_attribute(root, attribute.clone());
            } else if carry_attributes {
                self.merged.set_attribute(root, attribute.clone());
                self.report.recorder().record_attribute_action(
                    self.merged,
                    root,
                    attribute,
                    ActionType::Added,
                    None,
                );
            }
        }
        self.merge_children(root, lower_root);
    }

    pub(super) fn merge_children(&mut self, parent: ElementId, lower_parent: ElementId) {
        for lower_child in self.lower.mergeable_elements(lower_parent) {
            self.merge_child(parent, lower_child);
        }
    }

    fn merge_child(&mut self, parent: ElementId, lower_child: ElementId) {
        let lower = self.lower;
        let child = lower.element(lower_child);

        if self.remove_all_sibling(parent, lower_child).is_some() {
            debug!("{} removed by a removeAll instruction", child.id());
            self.record_rejected(lower_child, NodeOperationType::RemoveAll);
            return;
        }

        let Some(higher) = self.find_match(parent, lower_child) else {
            self.import(parent, lower_child);
            return;
        };

        let element = self.merged.element(higher);
        if element.operation_type() == NodeOperationType::Remove
            && element.is_selected(child.origin_package())
        {
            debug!("{} removed by {}", child.id(), element.location());
            self.record_rejected(lower_child, NodeOperationType::Remove);
            return;
        }

        if child.node_type().merge_type() == NodeMergeType::Always {
            match self.identical_sibling(parent, lower_child) {
                Some(_) => {
                    self.report
                        .recorder()
                        .record_node_action(lower, lower_child, ActionType::Ignored);
                }
                None => self.import(parent, lower_child),
            }
            return;
        }

        self.merge_element(higher, lower_child);
    }

    /// Same type and key; custom elements must also share their tag
    fn find_match(&self, parent: ElementId, lower_child: ElementId) -> Option<ElementId> {
        let child = self.lower.element(lower_child);
        self.merged
            .mergeable_elements(parent)
            .into_iter()
            .find(|candidate| {
                let candidate = self.merged.element(*candidate);
                candidate.node_type() == child.node_type()
                    && candidate.key() == child.key()
                    && (child.node_type() != NodeType::Custom || candidate.name() == child.name())
            })
    }

    /// A higher priority `removeAll` sibling of the same type whose selector
    /// targets the lower child's origin
    fn remove_all_sibling(&self, parent: ElementId, lower_child: ElementId) -> Option<ElementId> {
        let child = self.lower.element(lower_child);
        self.merged
            .mergeable_elements(parent)
            .into_iter()
            .find(|candidate| {
                let candidate = self.merged.element(*candidate);
                candidate.node_type() == child.node_type()
                    && (child.node_type() != NodeType::Custom || candidate.name() == child.name())
                    && candidate.operation_type() == NodeOperationType::RemoveAll
                    && candidate.is_selected(child.origin_package())
            })
    }

    fn identical_sibling(&self, parent: ElementId, lower_child: ElementId) -> Option<ElementId> {
        self.merged
            .mergeable_elements(parent)
            .into_iter()
            .find(|candidate| {
                self.merged
                    .compare_elements(*candidate, self.lower, lower_child)
                    .is_none()
            })
    }

    fn record_rejected(&mut self, lower_child: ElementId, operation: NodeOperationType) {
        let child = self.lower.element(lower_child);
        let key = child.id();
        self.report.recorder().record_node_action_for(
            &key,
            &key,
            child.location(),
            ActionType::Rejected,
            operation,
        );
    }

    /// Copy a lower priority subtree, with its leading comment, under `parent`
    fn import(&mut self, parent: ElementId, lower_child: ElementId) {
        let lower = self.lower;
        let imported = self.merged.import_element(lower, lower_child);
        let comment = lower.preceding_comment(lower_child);

        match self.insertion_index(parent) {
            Some(mut index) => {
                if let Some(comment) = comment {
                    self.merged
                        .insert_child(parent, index, XmlChild::Comment(comment.to_string()));
                    index += 1;
                }
                self.merged
                    .insert_child(parent, index, XmlChild::Element(imported));
            }
            None => {
                if let Some(comment) = comment {
                    self.merged.push_comment(parent, comment);
                }
                self.merged.append_child(parent, imported);
            }
        }
        debug!(
            "Added {} from {}",
            self.merged.element(imported).id(),
            lower.source()
        );
        self.report
            .recorder()
            .record_added_subtree(self.merged, imported);
    }

    /// New top level elements go before `application` and its comment so
    /// that it stays the last child
    fn insertion_index(&self, parent: ElementId) -> Option<usize> {
        if parent != self.merged.root() {
            return None;
        }
        let application = self
            .merged
            .node_by_type_and_key(parent, NodeType::Application, None)?;
        let index = self.merged.child_index(parent, application)?;
        let children = self.merged.element(parent).children();
        let mut start = index;
        while start > 0 {
            match &children[start - 1] {
                XmlChild::Text(_) => start -= 1,
                XmlChild::Comment(_) => return Some(start - 1),
                XmlChild::Element(_) => break,
            }
        }
        Some(index)
    }

    /// Reconcile two elements of the same identity according to the higher
    /// priority element's node operation
    fn merge_element(&mut self, higher: ElementId, lower_id: ElementId) {
        let lower = self.lower;
        let element = self.merged.element(higher);

        if let (Some(selector), Some(selectors)) = (element.selector(), self.merged.selectors()) {
            if !selector.is_resolvable(selectors.as_ref()) {
                let message = format!(
                    "tools:selector=\"{}\" is not a valid library identifier, valid identifiers are : {}",
                    selector,
                    selectors.keys().join(",")
                );
                let location = element.location();
                self.report.add_message(location, Severity::Error, message);
                return;
            }
        }

        match element.operation_type() {
            NodeOperationType::Replace => self.replace(higher, lower_id),
            NodeOperationType::Strict => {
                match self.merged.compare_elements(higher, lower, lower_id) {
                    Some(difference) => {
                        let location = element.location();
                        let message = format!(
                            "Element {} at {} is marked tools:node=\"strict\" but differs from the declaration at {}\n\t{}",
                            element.id(),
                            location,
                            lower.element(lower_id).location(),
                            difference
                        );
                        self.report.add_message(location, Severity::Error, message);
                    }
                    None => self
                        .report
                        .recorder()
                        .record_node_action(lower, lower_id, ActionType::Merged),
                }
            }
            NodeOperationType::MergeOnlyAttributes => {
                let key = element.id();
                self.report
                    .recorder()
                    .record_node_action(lower, lower_id, ActionType::Merged);
                self.merge_attributes(higher, lower_id);
                for child in lower.mergeable_elements(lower_id) {
                    let child = lower.element(child);
                    self.report.recorder().record_node_action_for(
                        &key,
                        &child.id(),
                        child.location(),
                        ActionType::Rejected,
                        NodeOperationType::MergeOnlyAttributes,
                    );
                }
            }
            // remove markers reach this point only when their selector
            // does not target the lower document
            NodeOperationType::Merge | NodeOperationType::Remove | NodeOperationType::RemoveAll => {
                self.report
                    .recorder()
                    .record_node_action(lower, lower_id, ActionType::Merged);
                self.merge_attributes(higher, lower_id);
                self.merge_children(higher, lower_id);
            }
        }
    }

    /// The higher element wins as is; everything the lower one declares is
    /// discarded
    fn replace(&mut self, higher: ElementId, lower_id: ElementId) {
        let lower = self.lower;
        let key = self.merged.element(higher).id();
        let element = lower.element(lower_id);
        let recorder = self.report.recorder();

        recorder.record_node_action_for(
            &key,
            &element.id(),
            element.location(),
            ActionType::Replaced,
            NodeOperationType::Replace,
        );
        for attribute in element
            .attributes()
            .iter()
            .filter(|attribute| !attribute.name().is_namespace_declaration())
        {
            recorder.record_attribute_action_at(
                &key,
                attribute,
                attribute.location(),
                ActionType::Rejected,
                None,
            );
        }
        for child in lower.mergeable_elements(lower_id) {
            let child = lower.element(child);
            recorder.record_node_action_for(
                &key,
                &child.id(),
                child.location(),
                ActionType::Rejected,
                NodeOperationType::Replace,
            );
        }
    }
}
