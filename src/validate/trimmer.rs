use tracing::debug;

use crate::actions::ActionType;
use crate::document::{ElementId, XmlDocument};
use crate::model::{NodeType, QualifiedName};
use crate::report::ReportBuilder;

/// First OpenGL ES version of the second range
const GL_ES_2: u32 = 0x0002_0000;

struct GlEsFeature {
    id: ElementId,
    version: u32,
    required: bool,
}

/// Drops `uses-feature` OpenGL ES requirements made redundant by a higher
/// version
pub struct ElementsTrimmer;

impl ElementsTrimmer {
    /// Versions below 2.0 and from 2.0 on are trimmed separately. In each
    /// range the highest required version stays, and the highest optional
    /// version stays only when above it.
    pub fn trim(document: &mut XmlDocument, report: &mut ReportBuilder) {
        let gl_es_version = QualifiedName::android("glEsVersion");
        let features: Vec<GlEsFeature> = document
            .mergeable_elements(document.root())
            .into_iter()
            .filter_map(|id| {
                let element = document.element(id);
                if element.node_type() != NodeType::UsesFeature {
                    return None;
                }
                let version = parse_version(element.attribute_value(&gl_es_version)?)?;
                let required = element
                    .attribute_value(&QualifiedName::android("required"))
                    .map_or(true, |value| !value.trim().eq_ignore_ascii_case("false"));
                Some(GlEsFeature { id, version, required })
            })
            .collect();

        let (lower, upper): (Vec<GlEsFeature>, Vec<GlEsFeature>) =
            features.into_iter().partition(|feature| feature.version < GL_ES_2);
        for range in [lower, upper] {
            for loser in losers(&range) {
                reject(document, report, loser, &gl_es_version);
            }
        }
    }
}

fn losers(range: &[GlEsFeature]) -> Vec<ElementId> {
    let highest = |required: bool| {
        range
            .iter()
            .filter(|feature| feature.required == required)
            .fold(None::<&GlEsFeature>, |best, feature| match best {
                Some(best) if best.version >= feature.version => Some(best),
                _ => Some(feature),
            })
    };
    let required = highest(true);
    let optional = highest(false)
        .filter(|optional| required.map_or(true, |required| optional.version > required.version));

    range
        .iter()
        .filter(|feature| {
            Some(feature.id) != required.map(|kept| kept.id)
                && Some(feature.id) != optional.map(|kept| kept.id)
        })
        .map(|feature| feature.id)
        .collect()
}

/// Remove the whole element, or only its version when it also names a
/// feature
fn reject(document: &mut XmlDocument, report: &mut ReportBuilder, id: ElementId, gl_es_version: &QualifiedName) {
    let element = document.element(id);
    debug!("Trimming {} at {}", element.id(), element.location());
    if element.attribute(&QualifiedName::android("name")).is_some() {
        if let Some(attribute) = element.attribute(gl_es_version).cloned() {
            report
                .recorder()
                .record_attribute_action(document, id, &attribute, ActionType::Rejected, None);
            document.remove_attribute(id, gl_es_version);
        }
    } else {
        report
            .recorder()
            .record_node_action(document, id, ActionType::Rejected);
        document.remove_element(id);
    }
}

fn parse_version(value: &str) -> Option<u32> {
    let value = value.trim();
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))?;
    u32::from_str_radix(digits, 16).ok()
}
