use std::collections::HashMap;

use crate::document::{ElementId, XmlDocument};
use crate::model::{AttributeOperationType, NodeMergeType, NodeOperationType, QualifiedName};
use crate::report::{MergeResult, ReportBuilder, Severity};

/// Well-formedness checks on one loaded document before it enters a fold
///
/// Every violation becomes an ERROR record; validation goes on so the caller
/// sees all of them at once.
pub struct PreValidator;

impl PreValidator {
    pub fn validate(report: &mut ReportBuilder, document: &XmlDocument) -> MergeResult {
        let mut failed = false;
        for id in document.descendants(document.root()) {
            failed |= check_attribute_instructions(report, document, id);
            failed |= check_node_instruction(report, document, id);
            failed |= check_selector(report, document, id);
            failed |= check_attribute_values(report, document, id);
        }
        failed |= check_duplicates(report, document);

        if failed {
            MergeResult::Error
        } else {
            MergeResult::Success
        }
    }
}

/// `tools:replace` needs a value to replace with; `tools:remove` cannot target
/// a value declared right there
fn check_attribute_instructions(
    report: &mut ReportBuilder,
    document: &XmlDocument,
    id: ElementId,
) -> bool {
    let element = document.element(id);
    let line = element.position().start_line;
    let mut failed = false;

    for (name, operation) in &element.instructions().attributes {
        let declared = element.attribute(name);
        let message = match (operation, declared) {
            (AttributeOperationType::Replace, None) => format!(
                "tools:replace specified at line:{} for attribute {}, but no new value specified",
                line,
                document.display_name(name)
            ),
            (AttributeOperationType::Remove, Some(attribute)) => format!(
                "tools:remove specified at line:{} for attribute {}, but attribute also declared at line:{}, do you want to use tools:replace instead ?",
                line,
                document.display_name(name),
                attribute.position().start_line
            ),
            _ => continue,
        };
        report.add_message(element.location(), Severity::Error, message);
        failed = true;
    }
    failed
}

/// `removeAll` targets every element of a type, a key makes it ambiguous
fn check_node_instruction(report: &mut ReportBuilder, document: &XmlDocument, id: ElementId) -> bool {
    let element = document.element(id);
    if element.operation_type() != NodeOperationType::RemoveAll || element.key().is_none() {
        return false;
    }
    let key_attributes: Vec<String> = element
        .node_type()
        .key_strategy()
        .key_attributes()
        .iter()
        .map(|local| document.display_name(&QualifiedName::android(local)))
        .collect();
    report.add_message(
        element.location(),
        Severity::Error,
        format!(
            "Element {} at {} cannot use tools:node=\"removeAll\" together with the key attribute(s) {}, remove the key to target all <{}> elements",
            element.id(),
            element.location(),
            key_attributes.join(","),
            document.display_name(element.name())
        ),
    );
    true
}

fn check_selector(report: &mut ReportBuilder, document: &XmlDocument, id: ElementId) -> bool {
    let element = document.element(id);
    let (Some(selector), Some(selectors)) = (element.selector(), document.selectors()) else {
        return false;
    };
    if selector.is_resolvable(selectors.as_ref()) {
        return false;
    }
    report.add_message(
        element.location(),
        Severity::Error,
        format!(
            "tools:selector=\"{}\" is not a valid library identifier, valid identifiers are : {}",
            selector,
            selectors.keys().join(",")
        ),
    );
    true
}

fn check_attribute_values(report: &mut ReportBuilder, document: &XmlDocument, id: ElementId) -> bool {
    let element = document.element(id);
    let mut failed = false;
    for attribute in element.attributes() {
        let Some(validator) = attribute
            .model(element.node_type())
            .and_then(|model| model.validator)
        else {
            continue;
        };
        let at = attribute.location().to_string();
        if let Err(message) = validator.validate(attribute.name().local_name(), &at, attribute.value()) {
            report.add_message(attribute.location(), Severity::Error, message);
            failed = true;
        }
    }
    failed
}

/// Siblings sharing a type and key may repeat, but not with different
/// `tools:node` instructions: the merge could not tell which one applies.
/// Always-imported elements such as intent filters are exempt.
fn check_duplicates(report: &mut ReportBuilder, document: &XmlDocument) -> bool {
    let mut failed = false;
    for parent in document.descendants(document.root()) {
        let mut seen: HashMap<_, ElementId> = HashMap::new();
        for child in document.mergeable_elements(parent) {
            let element = document.element(child);
            if element.key().is_none() || element.node_type().merge_type() == NodeMergeType::Always {
                continue;
            }
            let Some(first) = seen.get(&element.id()).copied() else {
                seen.insert(element.id(), child);
                continue;
            };
            let first = document.element(first);
            if first.operation_type() != element.operation_type() {
                report.add_message(
                    element.location(),
                    Severity::Error,
                    format!(
                        "Element {} at {} duplicated with element declared at {} with a different tools:node instruction ({} and {})",
                        element.id(),
                        element.location(),
                        first.location(),
                        first.operation_type().xml_value(),
                        element.operation_type().xml_value()
                    ),
                );
                failed = true;
            }
        }
    }
    failed
}
