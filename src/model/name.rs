use serde::{Deserialize, Serialize};

use super::{conventional_prefix, ANDROID_URI, TOOLS_URI, XMLNS_URI, XML_URI};

/// Namespace-qualified name of an element or attribute
///
/// Equality and hashing only consider the namespace URI and the local name,
/// so `android:name` and `a:name` are the same name when both prefixes are
/// bound to the android namespace. The prefix is never stored; printing
/// re-derives it from the owning document's declarations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    namespace: Option<String>,
    local: String,
}

impl QualifiedName {
    pub fn new(namespace: Option<&str>, local: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            local: local.to_string(),
        }
    }

    /// A name without namespace, such as the `package` attribute
    pub fn local(local: &str) -> Self {
        Self::new(None, local)
    }

    pub fn android(local: &str) -> Self {
        Self::new(Some(ANDROID_URI), local)
    }

    pub fn tools(local: &str) -> Self {
        Self::new(Some(TOOLS_URI), local)
    }

    /// Name of an `xmlns:prefix` declaration (`xmlns` alone uses an empty local name)
    pub fn xmlns(prefix: &str) -> Self {
        Self::new(Some(XMLNS_URI), prefix)
    }

    /// Resolve a raw `prefix:local` name
    ///
    /// `lookup` maps a prefix to its namespace URI. Unprefixed names stay
    /// without namespace. Returns `None` when the prefix is not bound.
    pub fn resolve<F>(raw: &str, lookup: F) -> Option<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if raw == "xmlns" {
            return Some(Self::xmlns(""));
        }
        match raw.split_once(':') {
            None => Some(Self::local(raw)),
            Some(("xmlns", prefix)) => Some(Self::xmlns(prefix)),
            Some(("xml", local)) => Some(Self::new(Some(XML_URI), local)),
            Some((prefix, local)) => {
                if prefix.is_empty() || local.is_empty() || local.contains(':') {
                    return None;
                }
                lookup(prefix).map(|uri| Self::new(Some(&uri), local))
            }
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn local_name(&self) -> &str {
        &self.local
    }

    pub fn is_tools(&self) -> bool {
        self.namespace.as_deref() == Some(TOOLS_URI)
    }

    pub fn is_android(&self) -> bool {
        self.namespace.as_deref() == Some(ANDROID_URI)
    }

    pub fn is_namespace_declaration(&self) -> bool {
        self.namespace.as_deref() == Some(XMLNS_URI)
    }

    /// Render with an explicit prefix for the namespace, if any
    pub fn with_prefix(&self, prefix: Option<&str>) -> String {
        if self.is_namespace_declaration() {
            return if self.local.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{}", self.local)
            };
        }
        match prefix {
            Some(prefix) if !prefix.is_empty() => format!("{}:{}", prefix, self.local),
            _ => self.local.clone(),
        }
    }
}

impl std::fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.namespace.as_deref() {
            None => write!(f, "{}", self.local),
            Some(uri) => match conventional_prefix(uri) {
                Some(_) if self.is_namespace_declaration() => {
                    write!(f, "{}", self.with_prefix(None))
                }
                Some(prefix) => write!(f, "{}:{}", prefix, self.local),
                None => write!(f, "{{{}}}{}", uri, self.local),
            },
        }
    }
}

/// Cross-document identity of an element: `<tag>#<key>`, or the bare tag
/// for keyless elements
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeKey(String);

impl NodeKey {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn from_parts(tag: &str, key: Option<&str>) -> Self {
        match key {
            Some(key) => Self(format!("{}#{}", tag, key)),
            None => Self(tag.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Identity of an attribute owned by the element with this key
    pub fn attribute(&self, name: &QualifiedName) -> NodeKey {
        NodeKey(format!("{}@{}", self.0, name.local_name()))
    }
}

impl std::fmt::Display for NodeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeKey {
    fn from(value: &str) -> Self {
        NodeKey::new(value)
    }
}
