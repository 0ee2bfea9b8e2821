use regex::{Captures, Regex};
use std::sync::OnceLock;

use crate::actions::ActionType;
use crate::report::{ReportBuilder, Severity};
use crate::resolver::KeyBasedValueResolver;
use crate::document::XmlDocument;

use super::MergeType;

/// Placeholders always bound to the effective package name
pub const PACKAGE_PLACEHOLDERS: [&str; 2] = ["packageName", "applicationId"];

fn placeholder_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$\{([^\}]*)\}").expect("placeholder pattern is valid"))
}

/// Caller supplied placeholder values, with the package placeholders
/// falling back to the effective package
pub struct PlaceholderValues<'a> {
    values: &'a dyn KeyBasedValueResolver<String>,
    package: Option<String>,
}

impl<'a> PlaceholderValues<'a> {
    pub fn new(values: &'a dyn KeyBasedValueResolver<String>, package: Option<String>) -> Self {
        Self { values, package }
    }
}

impl KeyBasedValueResolver<String> for PlaceholderValues<'_> {
    fn value(&self, key: &String) -> Option<String> {
        self.values.value(key).or_else(|| {
            PACKAGE_PLACEHOLDERS
                .contains(&key.as_str())
                .then(|| self.package.clone())
                .flatten()
        })
    }
}

/// Substitute every `${name}` in attribute values.
///
/// Each changed attribute is recorded INJECTED. A placeholder without a
/// value is left in place and reported, as an ERROR for applications and as
/// INFO for libraries whose placeholders may be bound later.
pub(crate) fn replace_placeholders(
    document: &mut XmlDocument,
    values: &dyn KeyBasedValueResolver<String>,
    merge_type: MergeType,
    report: &mut ReportBuilder,
) {
    let severity = match merge_type {
        MergeType::Application => Severity::Error,
        MergeType::Library => Severity::Info,
    };

    for id in document.descendants(document.root()) {
        let candidates: Vec<_> = document
            .element(id)
            .attributes()
            .iter()
            .filter(|attribute| attribute.value().contains("${"))
            .cloned()
            .collect();

        for attribute in candidates {
            let mut missing = Vec::new();
            let replaced = placeholder_pattern().replace_all(attribute.value(), |caps: &Captures| {
                let name = &caps[1];
                match values.value(&name.to_string()) {
                    Some(value) => value,
                    None => {
                        missing.push(name.to_string());
                        caps[0].to_string()
                    }
                }
            });
            let replaced = replaced.into_owned();

            for name in missing {
                let element = document.element(id);
                report.add_message(
                    attribute.location(),
                    severity,
                    format!(
                        "Attribute {}@{} at {} requires a placeholder substitution but no value for <{}> is provided.",
                        element.id(),
                        document.display_name(attribute.name()),
                        attribute.location(),
                        name
                    ),
                );
            }

            if replaced != attribute.value() {
                document.set_attribute_value(id, attribute.name(), &replaced);
                if let Some(updated) = document.element(id).attribute(attribute.name()).cloned() {
                    report.recorder().record_attribute_action(
                        document,
                        id,
                        &updated,
                        ActionType::Injected,
                        None,
                    );
                }
            }
        }
    }
}
