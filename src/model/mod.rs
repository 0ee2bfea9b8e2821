//! Manifest data model
//!
//! Names, the closed node type table, per-attribute merge policies and the
//! `tools:` instruction vocabulary. Everything in here is pure data plus the
//! small functions that interpret it; the tree itself lives in `document`.

mod attribute;
mod name;
mod node_type;
mod operation;

pub use attribute::{expand_class_name, extract_class_name, AttributeModel, MergingPolicy, Validator};
pub use name::{NodeKey, QualifiedName};
pub use node_type::{KeyStrategy, NodeMergeType, NodeType};
pub use operation::{
    AttributeOperationType, InstructionError, NodeOperationType, Selector, ToolsInstructions,
};

/// Android resource namespace
pub const ANDROID_URI: &str = "http://schemas.android.com/apk/res/android";

/// Merger instruction namespace, stripped from the final output
pub const TOOLS_URI: &str = "http://schemas.android.com/tools";

/// Namespace of `xmlns` declarations
pub const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns/";

/// Namespace bound to the reserved `xml` prefix
pub const XML_URI: &str = "http://www.w3.org/XML/1998/namespace";

/// Returns the conventional prefix for the well known namespaces
pub fn conventional_prefix(uri: &str) -> Option<&'static str> {
    match uri {
        ANDROID_URI => Some("android"),
        TOOLS_URI => Some("tools"),
        XMLNS_URI => Some("xmlns"),
        XML_URI => Some("xml"),
        _ => None,
    }
}
