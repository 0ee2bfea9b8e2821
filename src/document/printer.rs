use quick_xml::escape::escape;

use super::{ElementId, XmlAttribute, XmlChild, XmlDocument};

const INDENT: &str = "    ";

impl XmlDocument {
    /// Deterministic serialization used for output, snapshots and blame
    pub fn pretty_print(&self) -> String {
        let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        self.print_element(self.root(), 0, &mut out);
        out
    }

    fn print_element(&self, id: ElementId, depth: usize, out: &mut String) {
        let element = self.element(id);
        let indent = INDENT.repeat(depth);
        let tag = self.display_name(element.name());

        // namespace declarations first, then document order
        let mut attributes: Vec<&XmlAttribute> = element
            .attributes()
            .iter()
            .filter(|attr| attr.name().is_namespace_declaration())
            .collect();
        attributes.extend(
            element
                .attributes()
                .iter()
                .filter(|attr| !attr.name().is_namespace_declaration()),
        );

        out.push_str(&indent);
        out.push('<');
        out.push_str(&tag);
        let is_root = id == self.root();
        for (index, attribute) in attributes.iter().enumerate() {
            let inline = attributes.len() == 1 || (is_root && index == 0);
            if inline {
                out.push(' ');
            } else {
                out.push('\n');
                out.push_str(&indent);
                out.push_str(INDENT);
            }
            out.push_str(&self.display_name(attribute.name()));
            out.push_str("=\"");
            out.push_str(&escape(attribute.value()));
            out.push('"');
        }

        if element.children().is_empty() {
            out.push_str(" />\n");
            return;
        }
        out.push_str(if attributes.is_empty() { ">\n" } else { " >\n" });

        for child in element.children() {
            match child {
                XmlChild::Element(child) => self.print_element(*child, depth + 1, out),
                XmlChild::Comment(text) => {
                    out.push_str(&indent);
                    out.push_str(INDENT);
                    out.push_str("<!--");
                    out.push_str(text);
                    out.push_str("-->\n");
                }
                XmlChild::Text(text) => {
                    out.push_str(&indent);
                    out.push_str(INDENT);
                    out.push_str(&escape(text.trim()));
                    out.push('\n');
                }
            }
        }

        out.push_str(&indent);
        out.push_str("</");
        out.push_str(&tag);
        out.push_str(">\n");
    }
}
