use crate::actions::ActionType;
use crate::document::{ElementId, XmlAttribute};
use crate::model::{AttributeModel, AttributeOperationType, MergingPolicy, QualifiedName};
use crate::report::Severity;

use super::element::ElementMerger;

impl ElementMerger<'_> {
    /// Reconcile every attribute of the lower element into the higher one
    pub(super) fn merge_attributes(&mut self, higher: ElementId, lower_id: ElementId) {
        let lower = self.lower;
        for attribute in lower.element(lower_id).attributes() {
            let name = attribute.name();
            if name.is_namespace_declaration() {
                if self.merged.element(higher).attribute(name).is_none() {
                    self.merged.set_attribute(higher, attribute.clone());
                }
            } else if name.is_tools() {
                self.merge_tools_attribute(higher, lower_id, attribute);
            } else {
                self.merge_attribute(higher, attribute);
            }
        }
    }

    /// Attribute instruction lists accumulate so a later fold still applies
    /// them; other instructions, `tools:node` and `tools:selector` included,
    /// are carried only when the higher element has none.
    fn merge_tools_attribute(&mut self, higher: ElementId, lower_id: ElementId, attribute: &XmlAttribute) {
        let name = attribute.name();
        let local = name.local_name();

        if let Some(operation) = AttributeOperationType::from_xml_name(local) {
            match self.merged.element(higher).attribute_value(name) {
                Some(existing) => {
                    let combined = union_list(existing, attribute.value());
                    self.merged.set_attribute_value(higher, name, &combined);
                }
                None => self.merged.set_attribute(higher, attribute.clone()),
            }
            let targets: Vec<QualifiedName> = self
                .lower
                .element(lower_id)
                .instructions()
                .attributes_with(operation)
                .into_iter()
                .cloned()
                .collect();
            let instructions = self.merged.element_mut(higher).instructions_mut();
            for target in targets {
                instructions.add_attribute_operation(target, operation);
            }
        } else if self.merged.element(higher).attribute(name).is_none() {
            self.merged.set_attribute(higher, attribute.clone());
            let carried = self.lower.element(lower_id).instructions();
            let (node, selector) = (carried.node, carried.selector.clone());
            let instructions = self.merged.element_mut(higher).instructions_mut();
            match local {
                "node" => instructions.node = instructions.node.or(node),
                "selector" => instructions.selector = instructions.selector.take().or(selector),
                _ => {}
            }
        }
    }

    fn merge_attribute(&mut self, higher: ElementId, attribute: &XmlAttribute) {
        let element = self.merged.element(higher);
        let name = attribute.name();
        let operation = element.attribute_operation(name);
        let model = element.node_type().attribute_model(name);

        let Some(existing) = element.attribute(name).cloned() else {
            self.merge_absent_attribute(higher, attribute, operation, model);
            return;
        };
        let key = element.id();

        match operation {
            Some(AttributeOperationType::Remove) => {
                self.report.recorder().record_attribute_action_at(
                    &key,
                    attribute,
                    attribute.location(),
                    ActionType::Rejected,
                    operation,
                );
            }
            Some(AttributeOperationType::Replace) => {
                self.report.recorder().record_attribute_action_at(
                    &key,
                    attribute,
                    attribute.location(),
                    ActionType::Replaced,
                    operation,
                );
            }
            Some(AttributeOperationType::Strict) => {
                if existing.value() == attribute.value() {
                    self.record_merged(higher, attribute, operation);
                } else {
                    let message = format!(
                        "{}\n\tAttribute {} is marked tools:strict and cannot be overridden.",
                        self.conflict_message(higher, &existing, attribute),
                        self.merged.display_name(name)
                    );
                    self.report
                        .add_message(existing.location(), Severity::Error, message);
                }
            }
            None => {
                if existing.value() == attribute.value() {
                    self.record_merged(higher, attribute, None);
                    return;
                }
                let policy = model.map_or(MergingPolicy::Strict, |model| model.policy);
                match policy.merge(existing.value(), attribute.value()) {
                    Some(value) => {
                        if value == attribute.value() {
                            self.merged.set_attribute(higher, attribute.clone());
                        }
                        self.record_merged(higher, attribute, None);
                    }
                    None => {
                        let element = self.merged.element(higher);
                        let message = format!(
                            "{}\n\tSuggestion: add 'tools:replace=\"{}\"' to <{}> element at {} to override.",
                            self.conflict_message(higher, &existing, attribute),
                            self.merged.display_name(name),
                            self.merged.display_name(element.name()),
                            element.location()
                        );
                        self.report
                            .add_message(existing.location(), Severity::Error, message);
                    }
                }
            }
        }
    }

    /// Only the lower element declares the attribute
    fn merge_absent_attribute(
        &mut self,
        higher: ElementId,
        attribute: &XmlAttribute,
        operation: Option<AttributeOperationType>,
        model: Option<&'static AttributeModel>,
    ) {
        let key = self.merged.element(higher).id();
        if operation == Some(AttributeOperationType::Remove) {
            self.report.recorder().record_attribute_action_at(
                &key,
                attribute,
                attribute.location(),
                ActionType::Rejected,
                operation,
            );
            return;
        }

        // an implicit default on the higher side takes part in the merge
        if let Some((policy, default)) = model
            .filter(|model| model.policy.merges_with_default())
            .and_then(|model| model.default_value.map(|default| (model.policy, default)))
        {
            if policy.merge(default, attribute.value()).as_deref() != Some(attribute.value()) {
                self.report.recorder().record_attribute_action_at(
                    &key,
                    attribute,
                    attribute.location(),
                    ActionType::Rejected,
                    None,
                );
                return;
            }
        }

        self.merged.set_attribute(higher, attribute.clone());
        self.report.recorder().record_attribute_action(
            self.merged,
            higher,
            attribute,
            ActionType::Added,
            None,
        );
    }

    fn record_merged(
        &mut self,
        higher: ElementId,
        attribute: &XmlAttribute,
        operation: Option<AttributeOperationType>,
    ) {
        let key = self.merged.element(higher).id();
        self.report.recorder().record_attribute_action_at(
            &key,
            attribute,
            attribute.location(),
            ActionType::Merged,
            operation,
        );
    }

    fn conflict_message(&self, higher: ElementId, existing: &XmlAttribute, lower: &XmlAttribute) -> String {
        format!(
            "Attribute {}@{} value=({}) from {}\n\tis also present at {} value=({}).",
            self.merged.element(higher).id(),
            existing.name().local_name(),
            existing.value(),
            existing.location(),
            lower.location(),
            lower.value()
        )
    }
}

/// Comma separated union, higher priority entries first
fn union_list(higher: &str, lower: &str) -> String {
    let mut entries: Vec<&str> = Vec::new();
    for entry in higher.split(',').chain(lower.split(',')) {
        let entry = entry.trim();
        if !entry.is_empty() && !entries.contains(&entry) {
            entries.push(entry);
        }
    }
    entries.join(",")
}
