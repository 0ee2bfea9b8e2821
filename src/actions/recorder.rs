use super::{ActionType, Actions, AttributeRecord, NodeRecord, Record};
use crate::document::{ElementId, SourceFilePosition, XmlAttribute, XmlDocument};
use crate::model::{AttributeOperationType, NodeKey, NodeOperationType};

/// Mutable side of [`Actions`], owned by one pipeline run
#[derive(Debug, Default)]
pub struct ActionRecorder {
    actions: Actions,
}

impl ActionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> &Actions {
        &self.actions
    }

    /// Record ADDED for `id`, its attributes and its descendants, unless the
    /// node already has a record
    pub fn record_default_node_action(&mut self, document: &XmlDocument, id: ElementId) {
        let element = document.element(id);
        let key = element.id();
        if self.actions.decision_tree(&key).is_none() {
            self.record_node_action(document, id, ActionType::Added);
            for attribute in element.attributes() {
                if !attribute.name().is_namespace_declaration() {
                    self.record_attribute_action(document, id, attribute, ActionType::Added, None);
                }
            }
        }
        for child in document.mergeable_elements(id) {
            self.record_default_node_action(document, child);
        }
    }

    /// Record ADDED for an imported subtree, unconditionally
    pub fn record_added_subtree(&mut self, document: &XmlDocument, id: ElementId) {
        self.record_node_action(document, id, ActionType::Added);
        let element = document.element(id);
        for attribute in element.attributes() {
            if !attribute.name().is_namespace_declaration() {
                self.record_attribute_action(document, id, attribute, ActionType::Added, None);
            }
        }
        for child in document.mergeable_elements(id) {
            self.record_added_subtree(document, child);
        }
    }

    pub fn record_node_action(&mut self, document: &XmlDocument, id: ElementId, action: ActionType) {
        self.record_node_action_with_reason(document, id, action, None);
    }

    pub fn record_node_action_with_reason(
        &mut self,
        document: &XmlDocument,
        id: ElementId,
        action: ActionType,
        reason: Option<String>,
    ) {
        let element = document.element(id);
        let key = element.id();
        self.actions.add_node_record(
            &key,
            NodeRecord {
                record: Record {
                    action_type: action,
                    location: element.location(),
                    target_id: key.clone(),
                    reason,
                },
                operation: element.operation_type(),
            },
        );
    }

    /// Record a decision about `target` filed under another node's key, as
    /// done for children rejected on behalf of their parent
    pub fn record_node_action_for(
        &mut self,
        key: &NodeKey,
        target: &NodeKey,
        location: SourceFilePosition,
        action: ActionType,
        operation: NodeOperationType,
    ) {
        self.actions.add_node_record(
            key,
            NodeRecord {
                record: Record {
                    action_type: action,
                    location,
                    target_id: target.clone(),
                    reason: None,
                },
                operation,
            },
        );
    }

    pub fn record_attribute_action(
        &mut self,
        document: &XmlDocument,
        id: ElementId,
        attribute: &XmlAttribute,
        action: ActionType,
        operation: Option<AttributeOperationType>,
    ) {
        let key = document.element(id).id();
        self.record_attribute_action_at(&key, attribute, attribute.location(), action, operation);
    }

    /// Attribute decision with an explicit location, such as the lower
    /// priority attribute that was rejected
    pub fn record_attribute_action_at(
        &mut self,
        key: &NodeKey,
        attribute: &XmlAttribute,
        location: SourceFilePosition,
        action: ActionType,
        operation: Option<AttributeOperationType>,
    ) {
        self.actions.add_attribute_record(
            key,
            attribute.name(),
            AttributeRecord {
                record: Record {
                    action_type: action,
                    location,
                    target_id: key.attribute(attribute.name()),
                    reason: None,
                },
                operation,
            },
        );
    }

    /// Freeze the log
    pub fn build(self) -> Actions {
        self.actions
    }
}
