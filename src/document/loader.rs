use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;
use tracing::debug;

use super::{
    DocumentType, ElementId, LineIndex, SharedSelectors, SourceFile, SourceFilePosition,
    SourcePosition, XmlAttribute, XmlDocument, XmlElement,
};
use crate::merge::SystemProperty;
use crate::model::{expand_class_name, InstructionError, NodeType, QualifiedName, ToolsInstructions};
use crate::resolver::KeyBasedValueResolver;

/// Failure to turn an input text into a document
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to read manifest: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("{location} Malformed XML: {message}")]
    Malformed {
        location: SourceFilePosition,
        message: String,
    },

    #[error("{location} Unbound namespace prefix in {name}")]
    UnboundPrefix {
        location: SourceFilePosition,
        name: String,
    },

    #[error("{location} {source}")]
    Instruction {
        location: SourceFilePosition,
        #[source]
        source: InstructionError,
    },

    #[error("{location} tools:selector=\"{selector}\" is not a valid library identifier, valid identifiers are : {valid}")]
    UnresolvableSelector {
        location: SourceFilePosition,
        selector: String,
        valid: String,
    },

    #[error("{0} does not contain a root element")]
    NoRootElement(SourceFile),
}

/// Builds [`XmlDocument`]s from text
///
/// Namespaces are resolved while reading; keys, instructions and package
/// dependent values are computed once the whole tree is known.
#[derive(Default)]
pub struct XmlLoader<'a> {
    selectors: Option<SharedSelectors>,
    properties: Option<&'a dyn KeyBasedValueResolver<SystemProperty>>,
}

struct OpenElement {
    id: ElementId,
    namespaces: Vec<(String, String)>,
}

impl<'a> XmlLoader<'a> {
    pub fn new() -> Self {
        Self {
            selectors: None,
            properties: None,
        }
    }

    /// Validate `tools:selector` values against these library identifiers
    pub fn with_selectors(mut self, selectors: SharedSelectors) -> Self {
        self.selectors = Some(selectors);
        self
    }

    /// Property values consulted for the package of a main document
    pub fn with_properties(mut self, properties: &'a dyn KeyBasedValueResolver<SystemProperty>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn load_file(
        &self,
        path: &Path,
        doc_type: DocumentType,
        package_override: Option<&str>,
    ) -> Result<XmlDocument, LoadError> {
        let text = std::fs::read_to_string(path)?;
        self.load(SourceFile::new(path), &text, doc_type, package_override)
    }

    pub fn load(
        &self,
        source: SourceFile,
        text: &str,
        doc_type: DocumentType,
        package_override: Option<&str>,
    ) -> Result<XmlDocument, LoadError> {
        let lines = LineIndex::new(text);
        let mut reader = Reader::from_str(text);
        reader.trim_text(false);

        let mut document: Option<XmlDocument> = None;
        let mut open: Vec<OpenElement> = Vec::new();
        let mut buf = Vec::new();

        loop {
            let start = reader.buffer_position();
            let event = reader.read_event_into(&mut buf);
            let end = reader.buffer_position();
            let location = || SourceFilePosition::new(source.clone(), lines.span(start, end));

            match event {
                Ok(Event::Start(ref tag)) | Ok(Event::Empty(ref tag)) => {
                    let is_empty = matches!(event, Ok(Event::Empty(_)));
                    let raw_tag = &text[start..end];
                    let (element, namespaces) =
                        self.read_element(tag, raw_tag, start, &lines, &source, &open, location)?;

                    let id = match document.as_mut() {
                        None => {
                            if !open.is_empty() {
                                return Err(malformed(location(), "unexpected element"));
                            }
                            let created = XmlDocument::from_parts(
                                source.clone(),
                                doc_type,
                                package_override.map(str::to_string),
                                element,
                            );
                            let root = created.root();
                            document = Some(created);
                            root
                        }
                        Some(existing) => {
                            let Some(parent) = open.last() else {
                                return Err(malformed(location(), "multiple root elements"));
                            };
                            let id = existing.create_element(element);
                            existing.append_child(parent.id, id);
                            id
                        }
                    };
                    if !is_empty {
                        open.push(OpenElement { id, namespaces });
                    }
                }
                Ok(Event::End(_)) => {
                    if let (Some(closed), Some(document)) = (open.pop(), document.as_mut()) {
                        let element = document.element_mut(closed.id);
                        let (end_line, end_column) = lines.locate(end);
                        element.position.end_line = end_line;
                        element.position.end_column = end_column;
                    }
                }
                Ok(Event::Comment(comment)) => {
                    if let (Some(parent), Some(document)) = (open.last(), document.as_mut()) {
                        let text = String::from_utf8_lossy(&comment.into_inner()).into_owned();
                        document.push_comment(parent.id, &text);
                    }
                }
                Ok(Event::Text(content)) => {
                    let value = content
                        .unescape()
                        .map_err(|e| malformed(location(), &e.to_string()))?;
                    if let (Some(parent), Some(document)) = (open.last(), document.as_mut()) {
                        if !value.trim().is_empty() {
                            document.push_text(parent.id, &value);
                        }
                    }
                }
                Ok(Event::CData(content)) => {
                    if let (Some(parent), Some(document)) = (open.last(), document.as_mut()) {
                        let value = String::from_utf8_lossy(&content.into_inner()).into_owned();
                        document.push_text(parent.id, &value);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => return Err(malformed(location(), &e.to_string())),
            }
            buf.clear();
        }

        if !open.is_empty() {
            let at = SourceFilePosition::new(source.clone(), lines.span(text.len(), text.len()));
            return Err(malformed(at, "unclosed element"));
        }
        let mut document = document.ok_or_else(|| LoadError::NoRootElement(source.clone()))?;
        self.finish(&mut document);
        if let Some(selectors) = &self.selectors {
            document = document.with_selectors(selectors.clone());
        }

        debug!(
            "Loaded {} ({}), package {:?}",
            document.source(),
            doc_type.display_name(),
            document.package_name()
        );
        Ok(document)
    }

    #[allow(clippy::too_many_arguments)]
    fn read_element(
        &self,
        tag: &BytesStart<'_>,
        raw_tag: &str,
        offset: usize,
        lines: &LineIndex,
        source: &SourceFile,
        open: &[OpenElement],
        location: impl Fn() -> SourceFilePosition,
    ) -> Result<(XmlElement, Vec<(String, String)>), LoadError> {
        let mut raw_attributes = Vec::new();
        let mut namespaces = Vec::new();
        for attribute in tag.attributes() {
            let attribute = attribute.map_err(|e| malformed(location(), &e.to_string()))?;
            let key = String::from_utf8_lossy(attribute.key.as_ref()).into_owned();
            let value = attribute
                .unescape_value()
                .map_err(|e| malformed(location(), &e.to_string()))?
                .into_owned();
            if key == "xmlns" {
                namespaces.push((String::new(), value.clone()));
            } else if let Some(prefix) = key.strip_prefix("xmlns:") {
                namespaces.push((prefix.to_string(), value.clone()));
            }
            let position = locate_attribute(raw_tag, &key)
                .map(|(from, to)| lines.span(offset + from, offset + to))
                .unwrap_or(SourcePosition::UNKNOWN);
            raw_attributes.push((key, value, position));
        }

        let lookup = |prefix: &str| -> Option<String> {
            namespaces
                .iter()
                .rev()
                .chain(open.iter().rev().flat_map(|scope| scope.namespaces.iter().rev()))
                .find(|(bound, _)| bound == prefix)
                .map(|(_, uri)| uri.clone())
        };

        let raw_name = String::from_utf8_lossy(tag.name().as_ref()).into_owned();
        let resolved = if raw_name.contains(':') {
            QualifiedName::resolve(&raw_name, lookup)
        } else {
            let default_namespace = lookup("").filter(|uri| !uri.is_empty());
            Some(QualifiedName::new(default_namespace.as_deref(), &raw_name))
        };
        let name = resolved.ok_or_else(|| LoadError::UnboundPrefix {
            location: location(),
            name: raw_name.clone(),
        })?;

        let mut attributes = Vec::with_capacity(raw_attributes.len());
        for (key, value, position) in raw_attributes {
            let attribute_name = QualifiedName::resolve(&key, lookup).ok_or_else(|| {
                LoadError::UnboundPrefix {
                    location: SourceFilePosition::new(source.clone(), position),
                    name: key.clone(),
                }
            })?;
            attributes.push(XmlAttribute::new(attribute_name, value, position, source.clone()));
        }

        let instructions = ToolsInstructions::parse(
            attributes.iter().map(|attr| (attr.name(), attr.value())),
            lookup,
        )
        .map_err(|source| LoadError::Instruction {
            location: location(),
            source,
        })?;

        if let (Some(selector), Some(selectors)) = (&instructions.selector, &self.selectors) {
            if !selector.is_resolvable(selectors.as_ref()) {
                return Err(LoadError::UnresolvableSelector {
                    location: location(),
                    selector: selector.value().to_string(),
                    valid: selectors.keys().join(","),
                });
            }
        }

        let position = lines.span(offset, offset + raw_tag.len());
        let mut element = XmlElement::new(name, attributes, position, source.clone());
        element.set_instructions(instructions);
        Ok((element, namespaces))
    }

    /// Post-build pass: package dependent values, provenance and keys
    fn finish(&self, document: &mut XmlDocument) {
        let declared = document
            .root_element()
            .attribute_value(&QualifiedName::local("package"))
            .map(str::to_string);
        let effective = document
            .package_override()
            .map(str::to_string)
            .or_else(|| {
                (document.doc_type() == DocumentType::Main)
                    .then(|| self.properties.and_then(|p| p.value(&SystemProperty::Package)))
                    .flatten()
            })
            .or_else(|| declared.clone());

        for id in document.descendants(document.root()) {
            let element = document.element_mut(id);
            element.set_origin_package(declared.clone());
            if let Some(package) = effective.as_deref() {
                let node_type = element.node_type();
                for attribute in element.attributes.iter_mut() {
                    let dependent = node_type
                        .attribute_model(&attribute.name)
                        .is_some_and(|model| model.package_dependent);
                    if dependent {
                        attribute.value = expand_class_name(&attribute.value, package);
                    }
                }
            }
        }

        if document.root_element().node_type() != NodeType::Manifest {
            debug!(
                "{}: root element is <{}>, not <manifest>",
                document.source(),
                document.root_element().name()
            );
        }
        document.refresh_all_keys();
    }
}

fn malformed(location: SourceFilePosition, message: &str) -> LoadError {
    LoadError::Malformed {
        location,
        message: message.to_string(),
    }
}

/// Byte span of `key="value"` inside a raw start tag
fn locate_attribute(raw_tag: &str, key: &str) -> Option<(usize, usize)> {
    let bytes = raw_tag.as_bytes();
    let mut search_from = 0;
    while let Some(found) = raw_tag[search_from..].find(key) {
        let from = search_from + found;
        search_from = from + key.len();
        let preceded_by_space = from > 0 && bytes[from - 1].is_ascii_whitespace();
        let rest = raw_tag[search_from..].trim_start();
        if !preceded_by_space || !rest.starts_with('=') {
            continue;
        }
        let after_equals = raw_tag.len() - rest.len() + 1;
        let value_part = raw_tag[after_equals..].trim_start();
        let quote_at = raw_tag.len() - value_part.len();
        let quote = value_part.chars().next()?;
        if quote != '"' && quote != '\'' {
            return None;
        }
        let closing = raw_tag[quote_at + 1..].find(quote)?;
        return Some((from, quote_at + 1 + closing + 1));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::XmlChild;
    use crate::model::{NodeOperationType, ANDROID_URI};
    use crate::resolver::SelectorResolver;
    use std::sync::Arc;

    fn load(xml: &str) -> Result<XmlDocument, LoadError> {
        XmlLoader::new().load(SourceFile::named("test"), xml, DocumentType::Library, None)
    }

    #[test]
    fn test_element_and_attribute_positions() {
        let xml = "<manifest\n    xmlns:android=\"http://schemas.android.com/apk/res/android\"\n    package=\"com.example\">\n    <activity android:name=\".Main\" />\n</manifest>\n";
        let document = load(xml).unwrap();
        let root = document.root_element();
        assert_eq!(root.position().start_line, 1);
        assert_eq!(root.position().end_line, 5);

        let package = root.attribute(&QualifiedName::local("package")).unwrap();
        assert_eq!(package.position(), SourcePosition::new(3, 5, 3, 26));

        let activity = document.mergeable_elements(document.root())[0];
        assert_eq!(document.element(activity).position().to_string(), "4:5-38");
    }

    #[test]
    fn test_package_dependent_values_are_expanded() {
        let document = load(
            r#"<manifest xmlns:android="http://schemas.android.com/apk/res/android" package="com.example">
                <application android:name=".App" android:label="app">
                    <activity android:name="Main" android:parentActivityName=".Home" />
                    <service android:name="com.other.Service" />
                </application>
            </manifest>"#,
        )
        .unwrap();
        let application = document.by_type_and_key(NodeType::Application, None).unwrap();
        assert_eq!(
            document.element(application).attribute_value(&QualifiedName::android("name")),
            Some("com.example.App")
        );
        let children = document.mergeable_elements(application);
        assert_eq!(document.element(children[0]).key(), Some("com.example.Main"));
        assert_eq!(
            document.element(children[0]).attribute_value(&QualifiedName::android("parentActivityName")),
            Some("com.example.Home")
        );
        assert_eq!(document.element(children[1]).key(), Some("com.other.Service"));
    }

    #[test]
    fn test_non_conventional_prefixes() {
        let document = load(
            r#"<manifest xmlns:x="http://schemas.android.com/apk/res/android" xmlns:t="http://schemas.android.com/tools" package="p">
                <activity x:name="p.A" t:node="remove" />
            </manifest>"#,
        )
        .unwrap();
        let activity = document.mergeable_elements(document.root())[0];
        let element = document.element(activity);
        assert_eq!(element.key(), Some("p.A"));
        assert_eq!(element.operation_type(), NodeOperationType::Remove);
        assert!(element.attributes()[0].name().is_android());
        assert_eq!(element.attributes()[0].name().namespace(), Some(ANDROID_URI));
    }

    #[test]
    fn test_comments_are_kept() {
        let document = load("<manifest package=\"p\"><!-- hello --><application/></manifest>").unwrap();
        let children = document.root_element().children();
        assert_eq!(children[0], XmlChild::Comment(" hello ".to_string()));
        assert!(children[1].as_element().is_some());
    }

    #[test]
    fn test_malformed_xml() {
        assert!(matches!(
            load("<manifest><application></manifest>"),
            Err(LoadError::Malformed { .. })
        ));
        assert!(matches!(load("   "), Err(LoadError::NoRootElement(_))));
    }

    #[test]
    fn test_unbound_prefix() {
        assert!(matches!(
            load("<manifest><activity android:name=\"A\"/></manifest>"),
            Err(LoadError::UnboundPrefix { .. })
        ));
    }

    #[test]
    fn test_invalid_instruction_aborts_load() {
        let result = load(
            r#"<manifest xmlns:tools="http://schemas.android.com/tools">
                <application tools:node="destroy"/>
            </manifest>"#,
        );
        let error = result.unwrap_err();
        assert!(matches!(error, LoadError::Instruction { .. }));
        assert!(error.to_string().contains("tools:node=\"destroy\""));
    }

    #[test]
    fn test_unresolvable_selector() {
        let mut selectors = SelectorResolver::new();
        selectors.add("com.example.lib1", "lib1");
        let xml = r#"<manifest xmlns:tools="http://schemas.android.com/tools">
                <activity tools:node="remove" tools:selector="foo"/>
            </manifest>"#;
        let error = XmlLoader::new()
            .with_selectors(Arc::new(selectors))
            .load(SourceFile::named("main"), xml, DocumentType::Main, None)
            .unwrap_err();
        assert!(error.to_string().contains("tools:selector=\"foo\""));

        // without a resolver the selector is accepted and checked later
        assert!(load(xml).is_ok());
    }

    #[test]
    fn test_locate_attribute() {
        let raw = "<activity android:name=\"a\" name='b' />";
        assert_eq!(locate_attribute(raw, "android:name"), Some((10, 26)));
        assert_eq!(locate_attribute(raw, "name"), Some((27, 35)));
        assert_eq!(locate_attribute(raw, "label"), None);
    }
}
