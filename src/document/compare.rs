use super::{ElementId, XmlDocument};

impl XmlDocument {
    /// Structural comparison ignoring tools attributes, comments and child order.
    ///
    /// Returns a description of the first difference, `None` when equivalent.
    pub fn compare_to(&self, other: &XmlDocument) -> Option<String> {
        self.compare_elements(self.root(), other, other.root())
    }

    /// [`Self::compare_to`] restricted to one element of each document
    pub fn compare_elements(
        &self,
        id: ElementId,
        other: &XmlDocument,
        other_id: ElementId,
    ) -> Option<String> {
        let element = self.element(id);
        let candidate = other.element(other_id);

        if element.name() != candidate.name() {
            return Some(format!(
                "Element {} at {} differs from element {} at {}",
                element.name(),
                element.location(),
                candidate.name(),
                candidate.location()
            ));
        }

        let compared = |attr: &&super::XmlAttribute| !attr.name().is_tools();
        for attribute in element.attributes().iter().filter(compared) {
            match candidate.attribute(attribute.name()) {
                None => {
                    return Some(format!(
                        "Attribute {} from {} not found in element {} at {}",
                        attribute.name(),
                        attribute.location(),
                        candidate.id(),
                        candidate.location()
                    ))
                }
                Some(other_attribute) if other_attribute.value() != attribute.value() => {
                    return Some(format!(
                        "Attribute {} value={} from {} differs from value={} at {}",
                        attribute.name(),
                        attribute.value(),
                        attribute.location(),
                        other_attribute.value(),
                        other_attribute.location()
                    ))
                }
                Some(_) => {}
            }
        }
        for other_attribute in candidate.attributes().iter().filter(compared) {
            if element.attribute(other_attribute.name()).is_none() {
                return Some(format!(
                    "Attribute {} from {} not found in element {} at {}",
                    other_attribute.name(),
                    other_attribute.location(),
                    element.id(),
                    element.location()
                ));
            }
        }

        let children = self.mergeable_elements(id);
        let mut remaining = other.mergeable_elements(other_id);
        if children.len() != remaining.len() {
            return Some(format!(
                "Element {} at {} has {} children, element at {} has {}",
                element.id(),
                element.location(),
                children.len(),
                candidate.location(),
                remaining.len()
            ));
        }

        for child in children {
            let child_element = self.element(child);
            let same_identity: Vec<usize> = remaining
                .iter()
                .enumerate()
                .filter(|(_, candidate)| other.element(**candidate).id() == child_element.id())
                .map(|(index, _)| index)
                .collect();
            if same_identity.is_empty() {
                return Some(format!(
                    "Element {} at {} not found in {}",
                    child_element.id(),
                    child_element.location(),
                    candidate.location()
                ));
            }

            let mut first_difference = None;
            let mut matched = None;
            for index in same_identity {
                match self.compare_elements(child, other, remaining[index]) {
                    None => {
                        matched = Some(index);
                        break;
                    }
                    Some(difference) => {
                        first_difference.get_or_insert(difference);
                    }
                }
            }
            match matched {
                Some(index) => {
                    remaining.remove(index);
                }
                None => return first_difference,
            }
        }
        None
    }
}
