use tracing::debug;

use crate::document::XmlDocument;
use crate::model::{NodeOperationType, QualifiedName, ToolsInstructions, TOOLS_URI};
use crate::report::{ReportBuilder, Severity};

/// Final pass removing every trace of the tools namespace
pub struct ToolsInstructionsCleaner;

impl ToolsInstructionsCleaner {
    /// Elements still marked `remove` (without a selector) or `removeAll`
    /// are dropped; every other element loses its tools attributes.
    ///
    /// Returns `None` after logging an ERROR when the root element carries a
    /// removal instruction.
    pub fn clean_tools_references(
        mut document: XmlDocument,
        report: &mut ReportBuilder,
    ) -> Option<XmlDocument> {
        let root = document.root_element();
        if matches!(
            root.operation_type(),
            NodeOperationType::Remove | NodeOperationType::RemoveAll
        ) {
            report.add_message(
                root.location(),
                Severity::Error,
                format!(
                    "tools:node=\"{}\" is not allowed on the root <{}> element",
                    root.operation_type().xml_value(),
                    document.display_name(root.name())
                ),
            );
            return None;
        }

        for id in document.descendants(document.root()) {
            let element = document.element(id);
            let removed = match element.operation_type() {
                NodeOperationType::RemoveAll => true,
                NodeOperationType::Remove => element.selector().is_none(),
                _ => false,
            };
            if removed {
                debug!("Removing {} marked tools:node=\"{}\"", element.id(), element.operation_type().xml_value());
                document.remove_element(id);
                continue;
            }

            let tools_attributes: Vec<QualifiedName> = element
                .attributes()
                .iter()
                .filter(|attribute| {
                    let name = attribute.name();
                    name.is_tools()
                        || (name.is_namespace_declaration() && attribute.value() == TOOLS_URI)
                })
                .map(|attribute| attribute.name().clone())
                .collect();
            for name in tools_attributes {
                document.remove_attribute(id, &name);
            }
            document
                .element_mut(id)
                .set_instructions(ToolsInstructions::default());
        }
        Some(document)
    }
}
